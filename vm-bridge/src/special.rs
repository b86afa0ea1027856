//! Symbols and regular expressions, which have no direct counterpart on the other side.

use crate::{BridgeCx, BridgeError};
use guest_vm::{GcObject, RegExpFlags, Value};
use host_vm::{HostValue, SymbolId, REGEXP_IGNORECASE, REGEXP_MULTILINE};

/// The prelude namespace object on the guest global object.
pub(crate) fn namespace(cx: &mut BridgeCx<'_>) -> Result<GcObject, BridgeError> {
  let global = cx.guest.global_object();
  let name = cx.state.namespace.clone();
  match cx.guest_get(global, name.as_bytes())? {
    Value::Object(ns) => Ok(ns),
    _ => Err(BridgeError::BootstrapMissing(name)),
  }
}

fn member(cx: &mut BridgeCx<'_>, ns: GcObject, key: &str) -> Result<GcObject, BridgeError> {
  match cx.guest_get(ns, key.as_bytes())? {
    Value::Object(obj) if cx.guest.heap().is_callable(Value::Object(obj)) => Ok(obj),
    _ => Err(BridgeError::BootstrapMissing(format!(
      "{}.{key}",
      cx.state.namespace
    ))),
  }
}

/// `symbolize(name)` for the symbol's name.
pub(crate) fn symbol_to_guest(cx: &mut BridgeCx<'_>, sym: SymbolId) -> Result<Value, BridgeError> {
  let ns = namespace(cx)?;
  let symbolize = member(cx, ns, "symbolize")?;
  let name = cx.host.symbol_name(sym).to_vec();
  let name = cx.guest.scope().alloc_string(&name)?;
  cx.guest_call(
    Value::Object(symbolize),
    Value::Object(ns),
    &[Value::String(name)],
  )
}

/// Whether `obj` is an instance of the prelude's `Symbol` class.
pub(crate) fn is_symbol(cx: &mut BridgeCx<'_>, obj: GcObject) -> Result<bool, BridgeError> {
  let ns = namespace(cx)?;
  let class = member(cx, ns, "Symbol")?;
  cx.guest_instance_of(Value::Object(obj), class)
}

pub(crate) fn symbol_to_host(cx: &mut BridgeCx<'_>, obj: GcObject) -> Result<HostValue, BridgeError> {
  let name = cx.guest_get(obj, b"string")?;
  let name = cx.guest_to_string(name)?;
  Ok(HostValue::Symbol(cx.host.intern(&name)))
}

/// Host option bits and the guest flags they correspond to.
///
/// `REGEXP_EXTENDED` has no guest flag and is dropped on the way in; `GLOBAL` and `STICKY` have no
/// host option and are dropped on the way out.
const REGEXP_BITS: [(u32, u32); 2] = [
  (REGEXP_IGNORECASE, RegExpFlags::FOLD),
  (REGEXP_MULTILINE, RegExpFlags::MULTILINE),
];

fn guest_flags(options: u32) -> u32 {
  REGEXP_BITS
    .iter()
    .filter(|(host, _)| options & host != 0)
    .fold(0, |flags, (_, guest)| flags | guest)
}

fn host_options(flags: u32) -> u32 {
  REGEXP_BITS
    .iter()
    .filter(|(_, guest)| flags & guest != 0)
    .fold(0, |options, (host, _)| options | host)
}

/// Rebuilds a host regexp on the guest side with the corresponding flags.
pub(crate) fn regexp_to_guest(cx: &mut BridgeCx<'_>, value: HostValue) -> Result<Value, BridgeError> {
  let (source, options) = cx.host.regexp_parts(value)?;
  let source = source.to_vec();
  let flags = guest_flags(options);
  Ok(Value::Object(cx.guest.new_regexp(&source, flags)?))
}

pub(crate) fn regexp_to_host(cx: &mut BridgeCx<'_>, obj: GcObject) -> Result<HostValue, BridgeError> {
  let (source, flags) = cx.guest.regexp_parts(obj)?;
  let source = cx.guest.string_bytes(source)?;
  Ok(cx.host.regexp_new(source, host_options(flags))?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use host_vm::REGEXP_EXTENDED;

  #[test]
  fn regexp_bits_map_by_meaning() {
    assert_eq!(guest_flags(REGEXP_IGNORECASE), RegExpFlags::FOLD);
    assert_eq!(guest_flags(REGEXP_EXTENDED), 0);
    assert_eq!(
      guest_flags(REGEXP_IGNORECASE | REGEXP_EXTENDED | REGEXP_MULTILINE),
      RegExpFlags::FOLD | RegExpFlags::MULTILINE
    );
    assert_eq!(host_options(RegExpFlags::GLOBAL | RegExpFlags::STICKY), 0);
    assert_eq!(
      host_options(RegExpFlags::FOLD | RegExpFlags::GLOBAL),
      REGEXP_IGNORECASE
    );
  }
}
