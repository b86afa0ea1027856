use crate::{GcObject, GcString, Heap};

/// Largest integer magnitude the runtime represents exactly as [`Value::Int`].
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// A guest runtime value.
///
/// Heap-allocated values are represented using GC-managed handles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
  /// The `undefined` value.
  Undefined,
  /// The `null` value.
  Null,
  /// A boolean.
  Bool(bool),
  /// An integer in `-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER`.
  ///
  /// Integers and doubles are both of kind [`TypeOf::Number`]; the split only records whether the
  /// value is known to be exact.
  Int(i64),
  /// An IEEE-754 double.
  Number(f64),
  /// A GC-managed string.
  String(GcString),
  /// A GC-managed object.
  Object(GcObject),
}

impl Value {
  /// Creates a numeric value from an integer, falling back to a double outside the exact-integer
  /// range.
  pub fn from_i64(n: i64) -> Self {
    if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&n) {
      Value::Int(n)
    } else {
      Value::Number(n as f64)
    }
  }

  /// The numeric value of `Int`/`Number` values.
  pub fn as_number(self) -> Option<f64> {
    match self {
      Value::Int(n) => Some(n as f64),
      Value::Number(n) => Some(n),
      _ => None,
    }
  }

  pub fn as_object(self) -> Option<GcObject> {
    match self {
      Value::Object(o) => Some(o),
      _ => None,
    }
  }

  pub fn as_string(self) -> Option<GcString> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  /// `SameValue(x, y)`, treating `Int` and `Number` as one numeric type.
  ///
  /// - `NaN` is the same as `NaN`
  /// - `+0` and `-0` are distinct
  pub fn same_value(self, other: Self, heap: &Heap) -> bool {
    match (self, other) {
      (Value::Undefined, Value::Undefined) => true,
      (Value::Null, Value::Null) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Int(a), Value::Int(b)) => a == b,
      (a @ (Value::Int(_) | Value::Number(_)), b @ (Value::Int(_) | Value::Number(_))) => {
        let (Some(a), Some(b)) = (a.as_number(), b.as_number()) else {
          return false;
        };
        if a.is_nan() && b.is_nan() {
          return true;
        }
        if a == 0.0 && b == 0.0 {
          // Distinguish +0 and -0.
          return a.to_bits() == b.to_bits();
        }
        a == b
      }
      (Value::String(a), Value::String(b)) => {
        let Ok(a) = heap.get_string(a) else {
          return false;
        };
        let Ok(b) = heap.get_string(b) else {
          return false;
        };
        a.as_bytes() == b.as_bytes()
      }
      (Value::Object(a), Value::Object(b)) => a == b,
      _ => false,
    }
  }
}

impl From<GcString> for Value {
  fn from(value: GcString) -> Self {
    Self::String(value)
  }
}

impl From<GcObject> for Value {
  fn from(value: GcObject) -> Self {
    Self::Object(value)
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

/// The runtime-reported kind of a value (the result of `typeof`).
///
/// `null` reports [`TypeOf::Object`]; embedders that need to distinguish it check for
/// [`Value::Null`] first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeOf {
  Undefined,
  Boolean,
  Number,
  String,
  Object,
  Function,
}

impl TypeOf {
  pub fn as_str(self) -> &'static str {
    match self {
      TypeOf::Undefined => "undefined",
      TypeOf::Boolean => "boolean",
      TypeOf::Number => "number",
      TypeOf::String => "string",
      TypeOf::Object => "object",
      TypeOf::Function => "function",
    }
  }
}
