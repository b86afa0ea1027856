use crate::{HostRef, SymbolId};

/// A host runtime value.
///
/// Immediates (`nil`, booleans, fixnums, symbols) are stored inline; everything else lives on the
/// [`Heap`](crate::Heap) behind a [`HostRef`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostValue {
  Nil,
  True,
  False,
  Fixnum(i64),
  Symbol(SymbolId),
  Ref(HostRef),
}

impl HostValue {
  #[inline]
  pub fn from_bool(b: bool) -> Self {
    if b {
      HostValue::True
    } else {
      HostValue::False
    }
  }

  /// Everything except `nil` and `false` is truthy.
  #[inline]
  pub fn is_truthy(self) -> bool {
    !matches!(self, HostValue::Nil | HostValue::False)
  }

  #[inline]
  pub fn as_ref(self) -> Option<HostRef> {
    match self {
      HostValue::Ref(r) => Some(r),
      _ => None,
    }
  }
}

impl From<HostRef> for HostValue {
  fn from(r: HostRef) -> Self {
    HostValue::Ref(r)
  }
}

impl From<bool> for HostValue {
  fn from(b: bool) -> Self {
    HostValue::from_bool(b)
  }
}

/// The runtime-reported type tag of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostKind {
  Nil,
  True,
  False,
  Fixnum,
  Float,
  Bignum,
  String,
  Symbol,
  Regexp,
  Class,
  Module,
  Array,
  Hash,
  Struct,
  File,
  Object,
  /// Native payloads: procs, foreign proxies and opaque blobs.
  Data,
  /// Interpreter-internal cells. These never reach ordinary code.
  Internal,
}

impl HostKind {
  pub fn as_str(self) -> &'static str {
    match self {
      HostKind::Nil => "nil",
      HostKind::True => "true",
      HostKind::False => "false",
      HostKind::Fixnum => "fixnum",
      HostKind::Float => "float",
      HostKind::Bignum => "bignum",
      HostKind::String => "string",
      HostKind::Symbol => "symbol",
      HostKind::Regexp => "regexp",
      HostKind::Class => "class",
      HostKind::Module => "module",
      HostKind::Array => "array",
      HostKind::Hash => "hash",
      HostKind::Struct => "struct",
      HostKind::File => "file",
      HostKind::Object => "object",
      HostKind::Data => "data",
      HostKind::Internal => "internal",
    }
  }
}
