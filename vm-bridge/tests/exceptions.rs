use guest_vm::{GcObject, GuestRuntime, NativeCallFn, Value, VmError, VmHost};
use host_vm::{HostHooks, HostRef, HostRuntime, HostValue, Unwind};
use vm_bridge::{
  BridgeError, BridgeOptions, Context, HeapConfig, ThrowPolicy, GUEST_ERROR_CLASS, PAYLOAD_IVAR,
  UNKNOWN_SCRIPT_ERROR,
};

fn stress_context(throw_policy: ThrowPolicy) -> Context {
  Context::new(BridgeOptions {
    throw_policy,
    guest_heap: HeapConfig::new(8 * 1024 * 1024, 0),
    host_heap: HeapConfig::new(8 * 1024 * 1024, 0),
    ..BridgeOptions::default()
  })
  .expect("context")
}

fn guest_function(
  context: &mut Context,
  name: &str,
  call: NativeCallFn,
) -> Result<HostValue, BridgeError> {
  let global = context.guest().global_object();
  let func = context.guest_mut().new_function(name.as_bytes(), call, &[])?;
  context
    .guest_mut()
    .define(global, name.as_bytes(), Value::Object(func))?;
  let proxy = context.get_global(name)?;
  context.host_mut().add_root(proxy);
  Ok(proxy)
}

fn rooted_proc(
  context: &mut Context,
  func: host_vm::HostProcFn,
  captures: &[HostValue],
) -> Result<HostValue, BridgeError> {
  let proc = context.host_mut().proc_new(func, captures)?;
  context.host_mut().add_root(proc);
  Ok(proc)
}

fn guest_error_class(context: &Context) -> HostRef {
  match context.host().get_global(GUEST_ERROR_CLASS) {
    Ok(Some(HostValue::Ref(class))) => class,
    other => panic!("GuestError is not defined: {other:?}"),
  }
}

/// Takes and roots the exception being raised on the host.
fn take_errinfo(context: &mut Context) -> HostValue {
  let exc = context.host_mut().take_errinfo().expect("errinfo");
  context.host_mut().add_root(exc);
  exc
}

fn first_arg(args: &[Value]) -> Value {
  args.first().copied().unwrap_or(Value::Undefined)
}

/// `() => { throw new Error("kaboom") }`
fn throw_error(
  rt: &mut GuestRuntime,
  _host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  _args: &[Value],
) -> Result<Value, VmError> {
  let err = rt.new_error(b"kaboom")?;
  Err(VmError::Throw(Value::Object(err)))
}

/// `() => { throw "oops" }`
fn throw_string(
  rt: &mut GuestRuntime,
  _host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  _args: &[Value],
) -> Result<Value, VmError> {
  let s = rt.scope().alloc_string(b"oops")?;
  Err(VmError::Throw(Value::String(s)))
}

/// `() => { throw theError }`
fn throw_the_error(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  _args: &[Value],
) -> Result<Value, VmError> {
  let global = rt.global_object();
  Err(VmError::Throw(rt.get(host, global, b"theError")?))
}

/// Fails without leaving an exception behind.
fn fail_silently(
  _rt: &mut GuestRuntime,
  _host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  _args: &[Value],
) -> Result<Value, VmError> {
  Err(VmError::ExceptionPending)
}

/// `(f) => f()`
fn rethrow(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  rt.call_function(host, first_arg(args), Value::Undefined, &[])
}

/// `(f) => { try { f() } catch (e) { return e } }`
fn catch_value(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  match rt.call_function(host, first_arg(args), Value::Undefined, &[]) {
    Err(VmError::ExceptionPending) => rt
      .take_pending_exception()
      .ok_or(VmError::TypeError("exception pending without a value")),
    Ok(_) => Err(VmError::TypeError("expected the call to fail")),
    Err(err) => Err(err),
  }
}

/// `(f) => { try { f() } catch (e) { return e.message } }`
fn catch_message(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  callee: GcObject,
  this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  let Value::Object(exc) = catch_value(rt, host, callee, this, args)? else {
    return Err(VmError::TypeError("expected an exception object"));
  };
  rt.get(host, exc, b"message")
}

/// `() => inner()`
fn call_inner(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  _args: &[Value],
) -> Result<Value, VmError> {
  let global = rt.global_object();
  let inner = rt.get(host, global, b"inner")?;
  rt.call_function(host, inner, Value::Undefined, &[])
}

/// `() => outer()`
fn call_outer(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  _args: &[Value],
) -> Result<Value, VmError> {
  let global = rt.global_object();
  let outer = rt.get(host, global, b"outer")?;
  rt.call_function(host, outer, Value::Undefined, &[])
}

fn raise_boom(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  _captures: &[HostValue],
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  let class = rt.builtins().runtime_error;
  Err(rt.raise_new(class, b"boom"))
}

fn raise_captured(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  captures: &[HostValue],
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  Err(rt.raise(captures[0]))
}

fn call_captured(
  rt: &mut HostRuntime,
  hooks: &mut dyn HostHooks,
  captures: &[HostValue],
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  rt.send(hooks, captures[0], b"call", &[])
}

fn throw_done(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  _captures: &[HostValue],
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  let tag = HostValue::Symbol(rt.intern(b"done"));
  Err(rt.throw(tag, HostValue::Fixnum(5)))
}

#[test]
fn host_exceptions_are_catchable_in_the_guest() -> Result<(), BridgeError> {
  let mut context = stress_context(ThrowPolicy::Propagate);
  let catch_message = guest_function(&mut context, "catchMessage", catch_message)?;
  let boom = rooted_proc(&mut context, raise_boom, &[])?;

  let message = context.call(catch_message, &[boom]).expect("caught");
  assert_eq!(context.host().string_bytes(message)?, b"boom");
  assert_eq!(context.host().errinfo(), None);
  assert!(!context.guest().is_exception_pending());
  Ok(())
}

#[test]
fn guest_errors_are_raised_as_guest_error() -> Result<(), BridgeError> {
  let mut context = stress_context(ThrowPolicy::Propagate);
  let kaboom = guest_function(&mut context, "kaboom", throw_error)?;

  assert_eq!(context.call(kaboom, &[]), Err(Unwind::Raise));
  let exc = take_errinfo(&mut context);
  let guest_error = guest_error_class(&context);
  let standard_error = context.host().builtins().standard_error;
  assert!(context.host().is_kind_of(exc, guest_error)?);
  assert!(context.host().is_kind_of(exc, standard_error)?);
  assert_eq!(context.host().exception_message(exc)?, b"kaboom");

  let payload_ivar = context.host_mut().intern(PAYLOAD_IVAR);
  let payload = context.host().ivar_get(exc, payload_ivar)?;
  assert!(context.cx().is_host_proxy(payload));
  assert!(!context.guest().is_exception_pending());
  Ok(())
}

#[test]
fn thrown_primitives_become_the_message() -> Result<(), BridgeError> {
  let mut context = stress_context(ThrowPolicy::Propagate);
  let oops = guest_function(&mut context, "oops", throw_string)?;

  assert_eq!(context.call(oops, &[]), Err(Unwind::Raise));
  let exc = take_errinfo(&mut context);
  assert_eq!(context.host().exception_message(exc)?, b"oops");
  let payload_ivar = context.host_mut().intern(PAYLOAD_IVAR);
  let payload = context.host().ivar_get(exc, payload_ivar)?;
  assert_eq!(context.host().string_bytes(payload)?, b"oops");
  Ok(())
}

#[test]
fn failures_without_an_exception_are_reported() -> Result<(), BridgeError> {
  let mut context = stress_context(ThrowPolicy::Propagate);
  let silent = guest_function(&mut context, "silent", fail_silently)?;

  assert_eq!(context.call(silent, &[]), Err(Unwind::Raise));
  let exc = take_errinfo(&mut context);
  let guest_error = guest_error_class(&context);
  assert!(context.host().is_kind_of(exc, guest_error)?);
  assert_eq!(context.host().exception_message(exc)?, UNKNOWN_SCRIPT_ERROR);
  Ok(())
}

#[test]
fn host_exceptions_keep_their_identity() -> Result<(), BridgeError> {
  let mut context = stress_context(ThrowPolicy::Propagate);
  let rethrow = guest_function(&mut context, "rethrow", rethrow)?;
  let argument_error = context.host().builtins().argument_error;
  let original = context.host_mut().new_exception(argument_error, b"bad")?;
  context.host_mut().add_root(original);
  let raiser = rooted_proc(&mut context, raise_captured, &[original])?;

  assert_eq!(context.call(rethrow, &[raiser]), Err(Unwind::Raise));
  assert_eq!(context.host_mut().take_errinfo(), Some(original));
  Ok(())
}

#[test]
fn guest_exceptions_keep_their_identity() -> Result<(), BridgeError> {
  let mut context = stress_context(ThrowPolicy::Propagate);
  let global = context.guest().global_object();
  let the_error = context.guest_mut().new_error(b"original")?;
  context
    .guest_mut()
    .define(global, b"theError", Value::Object(the_error))?;
  let catch_value = guest_function(&mut context, "catchValue", catch_value)?;
  let thrower = guest_function(&mut context, "thrower", throw_the_error)?;
  let relay = rooted_proc(&mut context, call_captured, &[thrower])?;

  // host -> guest (catchValue) -> host (relay) -> guest (thrower)
  let caught = context.call(catch_value, &[relay]).expect("caught");
  assert_eq!(context.cx().unwrap_host_proxy(caught), Some(the_error));
  assert_eq!(context.root_set_len(), 0);
  Ok(())
}

#[test]
fn nested_crossings_unwind_cleanly() -> Result<(), BridgeError> {
  let mut context = stress_context(ThrowPolicy::Propagate);
  let guest_roots = context.guest().heap().root_stack_len();
  let host_roots = context.host().heap().root_stack_len();

  let runtime_error = context.host().builtins().runtime_error;
  let deep = context.host_mut().new_exception(runtime_error, b"deep")?;
  context.host_mut().add_root(deep);
  let inner = rooted_proc(&mut context, raise_captured, &[deep])?;
  context.set_global("inner", inner)?;
  let middle = guest_function(&mut context, "middle", call_inner)?;
  let outer = rooted_proc(&mut context, call_captured, &[middle])?;
  context.set_global("outer", outer)?;
  let top = guest_function(&mut context, "top", call_outer)?;

  // host -> guest (top) -> host (outer) -> guest (middle) -> host (inner) raises.
  assert_eq!(context.call(top, &[]), Err(Unwind::Raise));
  assert_eq!(context.host_mut().take_errinfo(), Some(deep));

  assert_eq!(context.root_set_len(), 0);
  assert_eq!(context.guest().heap().root_stack_len(), guest_roots);
  assert_eq!(context.host().heap().root_stack_len(), host_roots);
  assert_eq!(context.guest().call_depth(), 0);
  assert_eq!(context.host().call_depth(), 0);
  assert!(!context.guest().is_exception_pending());
  Ok(())
}

#[test]
fn propagated_throws_are_catchable_in_the_guest() -> Result<(), BridgeError> {
  let mut context = stress_context(ThrowPolicy::Propagate);
  let catch_value = guest_function(&mut context, "catchValue", catch_value)?;
  let done = rooted_proc(&mut context, throw_done, &[])?;

  let caught = context.call(catch_value, &[done]).expect("caught");
  context.host_mut().add_root(caught);
  let uncaught_throw_error = context.host().builtins().uncaught_throw_error;
  assert!(context.host().is_kind_of(caught, uncaught_throw_error)?);
  assert_eq!(
    context.host().exception_message(caught)?,
    b"uncaught throw :done"
  );
  assert_eq!(context.host_mut().take_pending_throw(), None);
  Ok(())
}

#[test]
fn propagated_throws_resume_on_the_host() -> Result<(), BridgeError> {
  let mut context = stress_context(ThrowPolicy::Propagate);
  let rethrow = guest_function(&mut context, "rethrow", rethrow)?;
  let done = rooted_proc(&mut context, throw_done, &[])?;

  let tag = HostValue::Symbol(context.host_mut().intern(b"done"));
  assert_eq!(
    context.call(rethrow, &[done]),
    Err(Unwind::Throw {
      tag,
      value: HostValue::Fixnum(5)
    })
  );
  assert_eq!(
    context.host_mut().take_pending_throw(),
    Some((tag, HostValue::Fixnum(5)))
  );
  assert_eq!(context.host().errinfo(), None);
  Ok(())
}

#[test]
fn degraded_throws_become_errors() -> Result<(), BridgeError> {
  let mut context = stress_context(ThrowPolicy::Degrade);
  let rethrow = guest_function(&mut context, "rethrow", rethrow)?;
  let done = rooted_proc(&mut context, throw_done, &[])?;

  assert_eq!(context.call(rethrow, &[done]), Err(Unwind::Raise));
  let exc = take_errinfo(&mut context);
  let guest_error = guest_error_class(&context);
  assert!(context.host().is_kind_of(exc, guest_error)?);
  assert_eq!(
    context.host().exception_message(exc)?,
    b"unexpected non-local exit: uncaught throw :done"
  );
  assert_eq!(context.host_mut().take_pending_throw(), None);
  Ok(())
}

#[test]
fn bridge_errors_raise_type_error() -> Result<(), BridgeError> {
  let mut context = stress_context(ThrowPolicy::Propagate);
  let type_error = context.host().builtins().type_error;

  assert_eq!(context.call(HostValue::Fixnum(1), &[]), Err(Unwind::Raise));
  let exc = take_errinfo(&mut context);
  assert!(context.host().is_kind_of(exc, type_error)?);

  let rethrow = guest_function(&mut context, "rethrow", rethrow)?;
  let internal = context.host_mut().internal_new()?;
  assert_eq!(context.call(rethrow, &[internal]), Err(Unwind::Raise));
  let exc = take_errinfo(&mut context);
  assert!(context.host().is_kind_of(exc, type_error)?);
  assert_eq!(context.root_set_len(), 0);
  Ok(())
}
