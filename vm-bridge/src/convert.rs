use crate::{special, BridgeCx, BridgeError};
use guest_vm::{GcObject, Value};
use host_vm::{HostKind, HostValue};

impl BridgeCx<'_> {
  /// Converts a host value into its guest representation.
  ///
  /// | host | guest |
  /// |---|---|
  /// | `nil`, `true`, `false` | `null`, `true`, `false` |
  /// | `Integer` within ±(2^53 - 1) | `Int` |
  /// | larger `Integer`, `Float` | `Number` (lossy past 2^53) |
  /// | `String` | string with the same bytes |
  /// | `Symbol` | `symbolize(name)` from the prelude |
  /// | `Regexp` | RegExp with the same source and flag bits |
  /// | anything else | a proxy, or the original guest object if the value is a proxy itself |
  ///
  /// The returned value is not rooted.
  pub fn to_guest(&mut self, value: HostValue) -> Result<Value, BridgeError> {
    let mut scope = self.root_scope();
    let value = scope.protect_host(value);
    let kind = scope.host.kind(value)?;
    tracing::trace!(kind = kind.as_str(), "to_guest");
    match (kind, value) {
      (HostKind::Nil, _) => Ok(Value::Null),
      (HostKind::True, _) => Ok(Value::Bool(true)),
      (HostKind::False, _) => Ok(Value::Bool(false)),
      (HostKind::Fixnum, HostValue::Fixnum(n)) => Ok(Value::from_i64(n)),
      (HostKind::Float, _) => Ok(Value::Number(scope.host.float_value(value)?)),
      (HostKind::Bignum, _) => Ok(Value::Number(scope.host.bignum_to_f64(value)?)),
      (HostKind::String, _) => {
        let cx = &mut *scope;
        let bytes = cx.host.string_bytes(value)?;
        Ok(Value::String(cx.guest.scope().alloc_string(bytes)?))
      }
      (HostKind::Symbol, HostValue::Symbol(sym)) => special::symbol_to_guest(&mut scope, sym),
      (HostKind::Regexp, _) => special::regexp_to_guest(&mut scope, value),
      (
        HostKind::Class
        | HostKind::Module
        | HostKind::Array
        | HostKind::Hash
        | HostKind::Struct
        | HostKind::File
        | HostKind::Object
        | HostKind::Data,
        _,
      ) => scope.wrap_host(value),
      (HostKind::Internal | HostKind::Fixnum | HostKind::Symbol, _) => {
        Err(BridgeError::UnknownKind(kind.as_str()))
      }
    }
  }

  /// Converts a guest value into its host representation.
  ///
  /// `undefined` and `null` become `nil`, `Int` an `Integer`, `Number` a `Float` and strings
  /// copy byte for byte. Objects are checked in order: the global object is always proxied,
  /// prelude symbols become host symbols, proxies unwrap to the host value they wrap, RegExps
  /// become host regexps, and everything else is proxied.
  ///
  /// The returned value is not rooted.
  pub fn to_host(&mut self, value: Value) -> Result<HostValue, BridgeError> {
    match value {
      Value::Undefined | Value::Null => Ok(HostValue::Nil),
      Value::Bool(b) => Ok(HostValue::from_bool(b)),
      Value::Int(n) => Ok(HostValue::Fixnum(n)),
      Value::Number(n) => Ok(self.host.float_new(n)?),
      Value::String(s) => {
        let bytes = self.guest.string_bytes(s)?;
        Ok(self.host.str_new(bytes)?)
      }
      Value::Object(obj) => {
        let mut scope = self.root_scope();
        scope.protect_guest(value);
        scope.object_to_host(obj)
      }
    }
  }

  fn object_to_host(&mut self, obj: GcObject) -> Result<HostValue, BridgeError> {
    // The prelude lives on the global object, so classifying it would need the prelude.
    if obj == self.guest.global_object() {
      return self.wrap_guest(obj);
    }
    if special::is_symbol(self, obj)? {
      return special::symbol_to_host(self, obj);
    }
    if let Some(value) = self.unwrap_guest_proxy(obj) {
      return Ok(value);
    }
    if self.guest.is_regexp(Value::Object(obj)) {
      return special::regexp_to_host(self, obj);
    }
    self.wrap_guest(obj)
  }
}
