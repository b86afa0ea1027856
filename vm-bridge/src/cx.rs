use crate::forward::{GuestSide, HostSide};
use crate::proxy::ProxyTables;
use crate::root::{RootScope, RootSet};
use crate::{BridgeError, ThrowPolicy};
use guest_vm::{GcObject, GuestRuntime, Value, VmError};
use host_vm::{HostRef, HostRuntime, HostValue, SymbolId};

/// Host classes the bridge defines on context creation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BridgeClasses {
  /// Raised on the host for guest exceptions that were not host exceptions to begin with.
  pub(crate) guest_error: HostRef,
  /// Class of host proxies wrapping guest objects.
  pub(crate) guest_object: HostRef,
}

/// Everything the bridge keeps between crossings.
#[derive(Debug)]
pub(crate) struct BridgeState {
  pub(crate) namespace: String,
  pub(crate) throw_policy: ThrowPolicy,
  pub(crate) roots: RootSet,
  pub(crate) proxies: ProxyTables,
  pub(crate) classes: BridgeClasses,
  pub(crate) class_roots: Vec<host_vm::RootId>,
  /// Set by [`Context::teardown`](crate::Context::teardown); no proxies are created afterwards.
  pub(crate) torn_down: bool,
}

/// Both runtimes plus the bridge state, borrowed for one crossing.
///
/// Handed out by [`Context::cx`](crate::Context::cx), and rebuilt inside every hook through which
/// one runtime calls into the other.
pub struct BridgeCx<'a> {
  pub guest: &'a mut GuestRuntime,
  pub host: &'a mut HostRuntime,
  pub(crate) state: &'a mut BridgeState,
}

impl<'a> BridgeCx<'a> {
  pub fn reborrow(&mut self) -> BridgeCx<'_> {
    BridgeCx {
      guest: &mut *self.guest,
      host: &mut *self.host,
      state: &mut *self.state,
    }
  }

  /// Opens a protection scope; see [`RootScope`].
  pub fn root_scope(&mut self) -> RootScope<'_, 'a> {
    RootScope::new(self)
  }

  /// Number of distinct values currently protected by open [`RootScope`]s.
  pub fn root_set_len(&self) -> usize {
    self.state.roots.len()
  }

  pub fn throw_policy(&self) -> ThrowPolicy {
    self.state.throw_policy
  }

  /// Turns a guest failure into a bridge error, moving a thrown value into the pending slot so it
  /// stays rooted.
  pub(crate) fn guest_error(&mut self, err: VmError) -> BridgeError {
    match err {
      VmError::Throw(value) => {
        self.guest.set_pending_exception(value);
        BridgeError::GuestException
      }
      other => other.into(),
    }
  }

  pub(crate) fn guest_get(&mut self, obj: GcObject, key: &[u8]) -> Result<Value, BridgeError> {
    let mut host = HostSide::new(&mut *self.host, &mut *self.state);
    let result = self.guest.get(&mut host, obj, key);
    result.map_err(|err| self.guest_error(err))
  }

  pub(crate) fn guest_set(
    &mut self,
    obj: GcObject,
    key: &[u8],
    value: Value,
  ) -> Result<(), BridgeError> {
    let mut host = HostSide::new(&mut *self.host, &mut *self.state);
    let result = self.guest.set(&mut host, obj, key, value);
    result.map_err(|err| self.guest_error(err))
  }

  pub(crate) fn guest_call(
    &mut self,
    callee: Value,
    this: Value,
    args: &[Value],
  ) -> Result<Value, BridgeError> {
    let mut host = HostSide::new(&mut *self.host, &mut *self.state);
    let result = self.guest.call_function(&mut host, callee, this, args);
    result.map_err(|err| self.guest_error(err))
  }

  pub(crate) fn guest_has_property(&mut self, obj: GcObject, key: &[u8]) -> Result<bool, BridgeError> {
    let mut host = HostSide::new(&mut *self.host, &mut *self.state);
    let result = self.guest.has_property(&mut host, obj, key);
    result.map_err(|err| self.guest_error(err))
  }

  pub(crate) fn guest_instance_of(
    &mut self,
    value: Value,
    ctor: GcObject,
  ) -> Result<bool, BridgeError> {
    let mut host = HostSide::new(&mut *self.host, &mut *self.state);
    let result = self.guest.instance_of(&mut host, value, ctor);
    result.map_err(|err| self.guest_error(err))
  }

  /// `ToString(value)`, as bytes.
  pub(crate) fn guest_to_string(&mut self, value: Value) -> Result<Vec<u8>, BridgeError> {
    let mut host = HostSide::new(&mut *self.host, &mut *self.state);
    let result = self.guest.to_string(&mut host, value);
    match result {
      Ok(s) => Ok(self.guest.string_bytes(s)?.to_vec()),
      Err(err) => Err(self.guest_error(err)),
    }
  }

  pub(crate) fn host_funcall(
    &mut self,
    recv: HostValue,
    name: SymbolId,
    args: &[HostValue],
  ) -> Result<HostValue, BridgeError> {
    let mut hooks = GuestSide::new(&mut *self.guest, &mut *self.state);
    Ok(self.host.funcall(&mut hooks, recv, name, args)?)
  }
}

impl std::fmt::Debug for BridgeCx<'_> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BridgeCx")
      .field("guest", &self.guest)
      .field("host", &self.host)
      .field("roots", &self.state.roots.len())
      .finish()
  }
}
