//! Guest-side helpers the bridge relies on for symbols, installed natively under a namespace
//! object on the global object:
//!
//! - `Symbol(name)` creates a symbol object; its prototype has `toString` and `inspect`
//! - `symbolCache` maps names to the symbol objects created so far
//! - `symbolize(name)` returns the cached symbol for `name`, creating it on first use

use guest_vm::{GcObject, GuestRuntime, Value, VmError, VmHost};

/// Installs the prelude as `globalThis[namespace]`, replacing any previous one.
pub fn install(rt: &mut GuestRuntime, namespace: &[u8]) -> Result<(), VmError> {
  // Every object is linked into the global object's graph as soon as it exists.
  let global = rt.global_object();
  let ns = rt.new_object()?;
  rt.define(global, namespace, Value::Object(ns))?;

  let ctor = rt.new_function(b"Symbol", symbol_call, &[])?;
  rt.define(ns, b"Symbol", Value::Object(ctor))?;
  let proto = rt.new_object()?;
  rt.define(ctor, b"prototype", Value::Object(proto))?;
  rt.define(proto, b"constructor", Value::Object(ctor))?;
  let to_string = rt.new_function(b"toString", symbol_to_string, &[])?;
  rt.define(proto, b"toString", Value::Object(to_string))?;
  let inspect = rt.new_function(b"inspect", symbol_inspect, &[])?;
  rt.define(proto, b"inspect", Value::Object(inspect))?;

  // No prototype, so names like `toString` are not found on the cache.
  let cache = rt.scope().alloc_object_with_prototype(None)?;
  rt.define(ns, b"symbolCache", Value::Object(cache))?;
  let symbolize = rt.new_function(
    b"symbolize",
    symbolize_call,
    &[Value::Object(ctor), Value::Object(cache)],
  )?;
  rt.define(ns, b"symbolize", Value::Object(symbolize))?;

  tracing::debug!(namespace = %String::from_utf8_lossy(namespace), "installed prelude");
  Ok(())
}

/// `Symbol(name)`: a fresh symbol object named `ToString(name)`.
fn symbol_call(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  callee: GcObject,
  _this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  let proto = rt.get(host, callee, b"prototype")?.as_object();
  let name = rt.to_string(host, args.first().copied().unwrap_or(Value::Undefined))?;
  let mut scope = rt.scope();
  scope.push_root(Value::String(name));
  let sym = scope.alloc_object_with_prototype(proto)?;
  scope.define_property(sym, b"string", Value::String(name))?;
  Ok(Value::Object(sym))
}

fn symbol_name(rt: &mut GuestRuntime, host: &mut dyn VmHost, this: Value) -> Result<Value, VmError> {
  let Value::Object(obj) = this else {
    return Err(VmError::TypeError("Symbol method called on a non-object"));
  };
  rt.get(host, obj, b"string")
}

fn symbol_to_string(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  this: Value,
  _args: &[Value],
) -> Result<Value, VmError> {
  symbol_name(rt, host, this)
}

/// `":" + name`
fn symbol_inspect(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  this: Value,
  _args: &[Value],
) -> Result<Value, VmError> {
  let name = symbol_name(rt, host, this)?;
  let name = rt.to_string(host, name)?;
  let mut text = b":".to_vec();
  text.extend_from_slice(rt.string_bytes(name)?);
  Ok(Value::String(rt.scope().alloc_string(&text)?))
}

fn symbolize_call(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  callee: GcObject,
  _this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  let (ctor, cache) = match rt.function_slots(callee)? {
    [ctor, Value::Object(cache)] => (*ctor, *cache),
    _ => return Err(VmError::TypeError("symbolize is missing its helpers")),
  };
  let name = rt.to_string(host, args.first().copied().unwrap_or(Value::Undefined))?;
  let key = rt.string_bytes(name)?.to_vec();
  let cached = rt.get(host, cache, &key)?;
  if let Value::Object(_) = cached {
    return Ok(cached);
  }
  let sym = rt.call_function(host, ctor, Value::Undefined, &[Value::String(name)])?;
  rt.define(cache, &key, sym)?;
  Ok(sym)
}
