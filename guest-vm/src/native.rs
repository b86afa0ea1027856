use crate::{GcObject, GuestRuntime, HostSlots, Value, VmError};

/// A native `[[Call]]` entrypoint implemented in Rust.
///
/// `callee` is the function object being invoked; natives read per-function data through
/// [`GuestRuntime::function_slots`].
///
/// # GC / rooting expectations
///
/// The caller roots `callee`, `this` and `args` for the duration of the call. A native that
/// allocates while holding any *other* handle in a local must root it first (see
/// [`Scope::push_root`](crate::Scope::push_root)).
pub type NativeCallFn = fn(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  callee: GcObject,
  this: Value,
  args: &[Value],
) -> Result<Value, VmError>;

/// Embedder hooks for host objects.
///
/// Objects allocated with [`Scope::alloc_host_object`](crate::Scope::alloc_host_object) carry
/// [`HostSlots`] and have no properties of their own: every `[[Get]]`, `[[Set]]` and `[[Call]]` on
/// them is forwarded here. The runtime passes itself back in so hooks can allocate and convert.
///
/// `obj` is rooted by the caller for the duration of the hook.
pub trait VmHost {
  fn host_get(
    &mut self,
    rt: &mut GuestRuntime,
    obj: GcObject,
    slots: HostSlots,
    key: &[u8],
  ) -> Result<Value, VmError>;

  fn host_set(
    &mut self,
    rt: &mut GuestRuntime,
    obj: GcObject,
    slots: HostSlots,
    key: &[u8],
    value: Value,
  ) -> Result<(), VmError>;

  fn host_call(
    &mut self,
    rt: &mut GuestRuntime,
    obj: GcObject,
    slots: HostSlots,
    this: Value,
    args: &[Value],
  ) -> Result<Value, VmError>;
}

/// A [`VmHost`] for embeddings without host objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHost;

impl VmHost for NoHost {
  fn host_get(
    &mut self,
    _rt: &mut GuestRuntime,
    _obj: GcObject,
    _slots: HostSlots,
    _key: &[u8],
  ) -> Result<Value, VmError> {
    Ok(Value::Undefined)
  }

  fn host_set(
    &mut self,
    _rt: &mut GuestRuntime,
    _obj: GcObject,
    _slots: HostSlots,
    _key: &[u8],
    _value: Value,
  ) -> Result<(), VmError> {
    Err(VmError::TypeError("host object is read-only"))
  }

  fn host_call(
    &mut self,
    _rt: &mut GuestRuntime,
    _obj: GcObject,
    _slots: HostSlots,
    _this: Value,
    _args: &[Value],
  ) -> Result<Value, VmError> {
    Err(VmError::NotCallable)
  }
}
