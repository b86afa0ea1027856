//! The hooks through which each runtime reaches values owned by the other.

use crate::cx::BridgeState;
use crate::root::RootScope;
use crate::{BridgeCx, BridgeError};
use guest_vm::{GcObject, GuestRuntime, HostSlots, Value, VmError, VmHost};
use host_vm::{HostHooks, HostKind, HostRef, HostRuntime, HostValue, SymbolId, Unwind};

/// [`VmHost`] for guest code touching guest proxies.
pub(crate) struct HostSide<'a> {
  host: &'a mut HostRuntime,
  state: &'a mut BridgeState,
}

impl<'a> HostSide<'a> {
  pub(crate) fn new(host: &'a mut HostRuntime, state: &'a mut BridgeState) -> Self {
    Self { host, state }
  }

  fn cx<'b>(&'b mut self, guest: &'b mut GuestRuntime) -> BridgeCx<'b> {
    BridgeCx {
      guest,
      host: &mut *self.host,
      state: &mut *self.state,
    }
  }
}

impl VmHost for HostSide<'_> {
  fn host_get(
    &mut self,
    rt: &mut GuestRuntime,
    _obj: GcObject,
    slots: HostSlots,
    key: &[u8],
  ) -> Result<Value, VmError> {
    let mut cx = self.cx(rt);
    let result = proxy_get(&mut cx, slots, key);
    result.map_err(|err| err.into_guest_error(&mut cx))
  }

  fn host_set(
    &mut self,
    rt: &mut GuestRuntime,
    _obj: GcObject,
    slots: HostSlots,
    key: &[u8],
    value: Value,
  ) -> Result<(), VmError> {
    let mut cx = self.cx(rt);
    let result = proxy_set(&mut cx, slots, key, value);
    result.map_err(|err| err.into_guest_error(&mut cx))
  }

  fn host_call(
    &mut self,
    rt: &mut GuestRuntime,
    _obj: GcObject,
    slots: HostSlots,
    _this: Value,
    args: &[Value],
  ) -> Result<Value, VmError> {
    let _span = tracing::debug_span!("guest_to_host_call", argc = args.len()).entered();
    let mut cx = self.cx(rt);
    let result = proxy_call(&mut cx, slots, args);
    result.map_err(|err| err.into_guest_error(&mut cx))
  }
}

/// [`HostHooks`] for host code calling methods on host proxies.
pub(crate) struct GuestSide<'a> {
  guest: &'a mut GuestRuntime,
  state: &'a mut BridgeState,
}

impl<'a> GuestSide<'a> {
  pub(crate) fn new(guest: &'a mut GuestRuntime, state: &'a mut BridgeState) -> Self {
    Self { guest, state }
  }
}

impl HostHooks for GuestSide<'_> {
  fn call_proxy_method(
    &mut self,
    rt: &mut HostRuntime,
    proxy: HostRef,
    slot: u64,
    name: SymbolId,
    args: &[HostValue],
  ) -> Result<HostValue, Unwind> {
    let _span = tracing::debug_span!("host_to_guest_call", argc = args.len()).entered();
    let mut cx = BridgeCx {
      guest: &mut *self.guest,
      host: rt,
      state: &mut *self.state,
    };
    let result = method_call(&mut cx, proxy, slot, name, args);
    result.map_err(|err| err.into_host_unwind(&mut cx))
  }
}

fn proxy_target(cx: &BridgeCx<'_>, slots: HostSlots) -> Result<HostValue, BridgeError> {
  cx.state
    .proxies
    .host_target(slots.a)
    .map(HostValue::Ref)
    .ok_or_else(|| BridgeError::Conversion("proxy no longer refers to a host value".to_string()))
}

/// Parses a canonical non-negative array index.
fn array_index(key: &[u8]) -> Option<i64> {
  if key.is_empty() || (key.len() > 1 && key[0] == b'0') || !key.iter().all(u8::is_ascii_digit) {
    return None;
  }
  std::str::from_utf8(key).ok()?.parse().ok()
}

/// `[[Get]]` on a guest proxy.
///
/// Hashes answer by string key, then symbol key. Arrays answer `length` and indices. Anything
/// else (including keys a hash or array lacks) calls the host method named `key` without
/// arguments, if there is one.
fn proxy_get(cx: &mut BridgeCx<'_>, slots: HostSlots, key: &[u8]) -> Result<Value, BridgeError> {
  let target = proxy_target(cx, slots)?;
  match cx.host.kind(target)? {
    HostKind::Hash => {
      let string_key = cx.host.str_new(key)?;
      let mut found = cx.host.hash_get(target, string_key)?;
      if found.is_none() {
        if let Some(sym) = cx.host.lookup_symbol(key) {
          found = cx.host.hash_get(target, HostValue::Symbol(sym))?;
        }
      }
      if let Some(value) = found {
        return cx.to_guest(value);
      }
    }
    HostKind::Array => {
      if key == b"length" {
        return Ok(Value::from_i64(cx.host.array_len(target)? as i64));
      }
      if let Some(index) = array_index(key) {
        let value = cx.host.array_get(target, index)?;
        return cx.to_guest(value);
      }
    }
    _ => {}
  }

  if let Some(name) = cx.host.lookup_symbol(key) {
    if cx.host.respond_to(target, name)? {
      let mut scope = cx.root_scope();
      let result = scope.host_funcall(target, name, &[])?;
      scope.protect_host(result);
      return scope.to_guest(result);
    }
  }
  if key == b"toString" {
    return to_string_function(cx, target);
  }
  Ok(Value::Undefined)
}

/// A guest function returning the host value's `to_s`, so stringifying a proxy on the guest side
/// shows the host value.
fn to_string_function(cx: &mut BridgeCx<'_>, target: HostValue) -> Result<Value, BridgeError> {
  let to_s = cx.host.intern(b"to_s");
  let mut scope = cx.root_scope();
  let text = scope.host_funcall(target, to_s, &[])?;
  scope.protect_host(text);
  let text = scope.to_guest(text)?;
  scope.protect_guest(text);
  let func = scope.guest.new_function(b"toString", return_first_slot, &[text])?;
  Ok(Value::Object(func))
}

fn return_first_slot(
  rt: &mut GuestRuntime,
  _host: &mut dyn VmHost,
  callee: GcObject,
  _this: Value,
  _args: &[Value],
) -> Result<Value, VmError> {
  Ok(
    rt.function_slots(callee)?
      .first()
      .copied()
      .unwrap_or(Value::Undefined),
  )
}

/// `[[Set]]` on a guest proxy: hash entries and array elements are written in place, anything else
/// goes through the host writer method `key=`.
fn proxy_set(
  cx: &mut BridgeCx<'_>,
  slots: HostSlots,
  key: &[u8],
  value: Value,
) -> Result<(), BridgeError> {
  let target = proxy_target(cx, slots)?;
  let mut scope = cx.root_scope();
  let value = scope.to_host(value)?;
  let value = scope.protect_host(value);
  match scope.host.kind(target)? {
    HostKind::Hash => {
      let string_key = scope.host.str_new(key)?;
      scope.host.hash_set(target, string_key, value)?;
      return Ok(());
    }
    HostKind::Array => {
      if let Some(index) = array_index(key) {
        scope.host.array_set(target, index, value)?;
        return Ok(());
      }
    }
    _ => {}
  }
  let mut writer = key.to_vec();
  writer.push(b'=');
  let writer = scope.host.intern(&writer);
  scope.host_funcall(target, writer, &[value])?;
  Ok(())
}

/// `[[Call]]` on a guest proxy: sends `call` to the host value.
fn proxy_call(cx: &mut BridgeCx<'_>, slots: HostSlots, args: &[Value]) -> Result<Value, BridgeError> {
  let target = proxy_target(cx, slots)?;
  let mut scope = cx.root_scope();
  let mut host_args = Vec::with_capacity(args.len());
  for arg in args {
    let value = scope.to_host(*arg)?;
    host_args.push(scope.protect_host(value));
  }
  let call = scope.host.intern(b"call");
  let result = scope.host_funcall(target, call, &host_args)?;
  scope.protect_host(result);
  scope.to_guest(result)
}

fn guest_args(scope: &mut RootScope<'_, '_>, args: &[HostValue]) -> Result<Vec<Value>, BridgeError> {
  let mut out = Vec::with_capacity(args.len());
  for arg in args {
    let value = scope.to_guest(*arg)?;
    out.push(scope.protect_guest(value));
  }
  Ok(out)
}

/// The property key a host value names: string bytes, symbol names, or `to_s` otherwise.
fn property_key(cx: &BridgeCx<'_>, key: HostValue) -> Result<Vec<u8>, BridgeError> {
  Ok(cx.host.to_s(key)?)
}

/// A method call on a host proxy.
///
/// - `call` calls the guest function with the global object as `this`
/// - `[]` and `[]=` read and write properties, as does `name=` with one argument
/// - `to_s` and `inspect` stringify the guest object
/// - `to_proc` returns a host proc that sends `call` to the proxy
/// - `size` reads `length`
/// - any other name reads that property, then calls it with the object as `this` if it is
///   callable or returns it if no arguments were given
///
/// Names the guest object has no property for raise `NoMethodError`.
fn method_call(
  cx: &mut BridgeCx<'_>,
  proxy: HostRef,
  slot: u64,
  name: SymbolId,
  args: &[HostValue],
) -> Result<HostValue, BridgeError> {
  let Some(target) = cx.state.proxies.guest_target(slot) else {
    return Err(BridgeError::Conversion(
      "proxy no longer refers to a guest object".to_string(),
    ));
  };
  let this = Value::Object(target);
  let name_bytes = cx.host.symbol_name(name).to_vec();
  let mut scope = cx.root_scope();

  match (&name_bytes[..], args) {
    (b"call", _) => {
      let args = guest_args(&mut scope, args)?;
      let global = Value::Object(scope.guest.global_object());
      let result = scope.guest_call(this, global, &args)?;
      scope.protect_guest(result);
      scope.to_host(result)
    }
    (b"[]", [key]) => {
      let key = property_key(&scope, *key)?;
      let value = scope.guest_get(target, &key)?;
      scope.protect_guest(value);
      scope.to_host(value)
    }
    (b"[]=", [key, value]) => {
      let key = property_key(&scope, *key)?;
      let converted = scope.to_guest(*value)?;
      scope.protect_guest(converted);
      scope.guest_set(target, &key, converted)?;
      Ok(*value)
    }
    (b"to_s" | b"inspect", []) => {
      let text = scope.guest_to_string(this)?;
      Ok(scope.host.str_new(&text)?)
    }
    (b"to_proc", []) => Ok(scope.host.proc_new(call_captured_proxy, &[HostValue::Ref(proxy)])?),
    ([key @ .., b'='], [value]) => {
      let converted = scope.to_guest(*value)?;
      scope.protect_guest(converted);
      scope.guest_set(target, key, converted)?;
      Ok(*value)
    }
    (name, _) => {
      let key = if name == b"size" { &b"length"[..] } else { name };
      if !scope.guest_has_property(target, key)? {
        return Err(no_method_error(&mut scope, name));
      }
      let property = scope.guest_get(target, key)?;
      scope.protect_guest(property);
      if scope.guest.heap().is_callable(property) {
        let args = guest_args(&mut scope, args)?;
        let result = scope.guest_call(property, this, &args)?;
        scope.protect_guest(result);
        scope.to_host(result)
      } else if args.is_empty() {
        scope.to_host(property)
      } else {
        Err(no_method_error(&mut scope, name))
      }
    }
  }
}

fn no_method_error(cx: &mut BridgeCx<'_>, name: &[u8]) -> BridgeError {
  let mut message = b"undefined method `".to_vec();
  message.extend_from_slice(name);
  message.extend_from_slice(b"' for guest object");
  let class = cx.host.builtins().no_method_error;
  BridgeError::HostUnwind(cx.host.raise_new(class, &message))
}

/// Body of the procs `to_proc` returns: the only capture is the proxy.
fn call_captured_proxy(
  rt: &mut HostRuntime,
  hooks: &mut dyn HostHooks,
  captures: &[HostValue],
  args: &[HostValue],
) -> Result<HostValue, Unwind> {
  let proxy = captures.first().copied().unwrap_or(HostValue::Nil);
  let call = rt.intern(b"call");
  rt.funcall(hooks, proxy, call, args)
}
