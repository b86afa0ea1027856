use crate::{BridgeCx, BridgeError};
use ahash::AHashMap;
use guest_vm::{GcObject, GuestRuntime, HostSlots, Value, WeakGcObject};
use host_vm::{HostRef, HostRuntime, HostValue, WeakHostRef};

/// [`HostSlots::b`] bit marking a guest proxy whose host value responds to `call`.
pub(crate) const CALLABLE: u64 = 1;

/// A guest object standing in for a host value.
#[derive(Debug)]
struct GuestProxy {
  wrapper: WeakGcObject,
  slot: u64,
  /// Keeps the host value alive while the wrapper is.
  root: host_vm::RootId,
}

/// A host object standing in for a guest object.
#[derive(Debug)]
struct HostProxy {
  wrapper: WeakHostRef,
  slot: u64,
  /// Keeps the guest object alive while the wrapper is.
  root: guest_vm::RootId,
}

/// Live proxies per direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProxyCount {
  /// Guest objects wrapping host values.
  pub in_guest: usize,
  /// Host objects wrapping guest objects.
  pub in_host: usize,
}

/// Identity maps for both proxy directions.
///
/// Each map is keyed by the wrapped value's handle and only holds a weak handle to the wrapper, so
/// wrapping the same value again returns the same wrapper for as long as it lives. Slots number
/// wrappers uniquely over the lifetime of the tables and are never reused.
#[derive(Debug, Default)]
pub(crate) struct ProxyTables {
  next_slot: u64,
  in_guest: AHashMap<HostRef, GuestProxy>,
  in_guest_targets: AHashMap<u64, HostRef>,
  in_host: AHashMap<GcObject, HostProxy>,
  in_host_targets: AHashMap<u64, GcObject>,
}

impl ProxyTables {
  fn next_slot(&mut self) -> u64 {
    self.next_slot += 1;
    self.next_slot
  }

  /// The host value wrapped by the guest proxy with `slot`.
  pub(crate) fn host_target(&self, slot: u64) -> Option<HostRef> {
    self.in_guest_targets.get(&slot).copied()
  }

  /// The guest object wrapped by the host proxy with `slot`.
  pub(crate) fn guest_target(&self, slot: u64) -> Option<GcObject> {
    self.in_host_targets.get(&slot).copied()
  }

  pub(crate) fn count(&self) -> ProxyCount {
    ProxyCount {
      in_guest: self.in_guest.len(),
      in_host: self.in_host.len(),
    }
  }

  fn forget_in_guest(&mut self, target: HostRef, host: &mut HostRuntime) {
    if let Some(entry) = self.in_guest.remove(&target) {
      self.in_guest_targets.remove(&entry.slot);
      host.remove_root(entry.root);
    }
  }

  fn forget_in_host(&mut self, target: GcObject, guest: &mut GuestRuntime) {
    if let Some(entry) = self.in_host.remove(&target) {
      self.in_host_targets.remove(&entry.slot);
      guest.remove_root(entry.root);
    }
  }

  /// Drops the entries of wrappers either collector has freed, releasing what they kept alive.
  pub(crate) fn sweep(&mut self, guest: &mut GuestRuntime, host: &mut HostRuntime) -> usize {
    let mut released = 0;
    for slots in guest.take_finalized_host_slots() {
      if let Some(target) = self.in_guest_targets.remove(&slots.a) {
        if let Some(entry) = self.in_guest.remove(&target) {
          host.remove_root(entry.root);
          released += 1;
        }
      }
    }
    for slot in host.take_finalized_proxy_slots() {
      if let Some(target) = self.in_host_targets.remove(&slot) {
        if let Some(entry) = self.in_host.remove(&target) {
          guest.remove_root(entry.root);
          released += 1;
        }
      }
    }
    if released > 0 {
      tracing::debug!(released, "swept proxies");
    }
    released
  }

  /// Forgets every proxy. Wrappers that are still alive keep their slot but no longer resolve.
  pub(crate) fn clear(&mut self, guest: &mut GuestRuntime, host: &mut HostRuntime) {
    for (_, entry) in self.in_guest.drain() {
      host.remove_root(entry.root);
    }
    for (_, entry) in self.in_host.drain() {
      guest.remove_root(entry.root);
    }
    self.in_guest_targets.clear();
    self.in_host_targets.clear();
    guest.take_finalized_host_slots();
    host.take_finalized_proxy_slots();
  }
}

impl BridgeCx<'_> {
  /// Wraps a host heap value in a guest proxy. Fails with [`BridgeError::TornDown`] once the
  /// context is torn down.
  ///
  /// Host proxies unwrap to the guest object they stand for instead of being wrapped again.
  pub fn wrap_host(&mut self, value: HostValue) -> Result<Value, BridgeError> {
    let HostValue::Ref(target) = value else {
      return Err(BridgeError::Conversion(
        "immediate values are converted, not proxied".to_string(),
      ));
    };
    if let Some(obj) = self.unwrap_host_proxy(value) {
      return Ok(Value::Object(obj));
    }
    if self.state.torn_down {
      return Err(BridgeError::TornDown);
    }
    if let Some(entry) = self.state.proxies.in_guest.get(&target) {
      if let Some(wrapper) = entry.wrapper.upgrade(self.guest.heap()) {
        return Ok(Value::Object(wrapper));
      }
    }
    // Collected but not swept yet.
    self.state.proxies.forget_in_guest(target, self.host);

    let call = self.host.intern(b"call");
    let callable = self.host.respond_to(value, call)?;
    let slot = self.state.proxies.next_slot();
    let slots = HostSlots {
      a: slot,
      b: if callable { CALLABLE } else { 0 },
    };
    let wrapper = self.guest.new_host_object(slots, callable)?;
    let root = self.host.add_root(value);
    let proxies = &mut self.state.proxies;
    proxies.in_guest_targets.insert(slot, target);
    proxies.in_guest.insert(
      target,
      GuestProxy {
        wrapper: WeakGcObject::new(wrapper),
        slot,
        root,
      },
    );
    tracing::debug!(slot, callable, ?target, "wrapped host value for the guest");
    Ok(Value::Object(wrapper))
  }

  /// Wraps a guest object in a host proxy. Fails with [`BridgeError::TornDown`] once the context
  /// is torn down.
  ///
  /// Guest proxies unwrap to the host value they stand for instead of being wrapped again.
  pub fn wrap_guest(&mut self, obj: GcObject) -> Result<HostValue, BridgeError> {
    if let Some(value) = self.unwrap_guest_proxy(obj) {
      return Ok(value);
    }
    if let Some(entry) = self.state.proxies.in_host.get(&obj) {
      if let Some(wrapper) = entry.wrapper.upgrade(self.host.heap()) {
        return Ok(HostValue::Ref(wrapper));
      }
    }
    if self.state.torn_down {
      return Err(BridgeError::TornDown);
    }
    self.state.proxies.forget_in_host(obj, self.guest);

    let slot = self.state.proxies.next_slot();
    let class = self.state.classes.guest_object;
    let root = self.guest.add_root(Value::Object(obj));
    let wrapper = match self.host.foreign_proxy_new(class, slot) {
      Ok(HostValue::Ref(r)) => r,
      Ok(_) => {
        self.guest.remove_root(root);
        return Err(BridgeError::Conversion("host proxy is not a heap object".to_string()));
      }
      Err(err) => {
        self.guest.remove_root(root);
        return Err(err.into());
      }
    };
    let proxies = &mut self.state.proxies;
    proxies.in_host_targets.insert(slot, obj);
    proxies.in_host.insert(
      obj,
      HostProxy {
        wrapper: WeakHostRef::new(wrapper),
        slot,
        root,
      },
    );
    tracing::debug!(slot, ?obj, "wrapped guest object for the host");
    Ok(HostValue::Ref(wrapper))
  }

  /// The host value a guest proxy stands for, or `None` if `obj` is not one of this bridge's
  /// proxies.
  pub fn unwrap_guest_proxy(&self, obj: GcObject) -> Option<HostValue> {
    let slots = self.guest.host_slots(obj).ok().flatten()?;
    self.state.proxies.host_target(slots.a).map(HostValue::Ref)
  }

  /// The guest object a host proxy stands for, or `None` if `value` is not one of this bridge's
  /// proxies.
  pub fn unwrap_host_proxy(&self, value: HostValue) -> Option<GcObject> {
    let slot = self.host.foreign_proxy_slot(value)?;
    self.state.proxies.guest_target(slot)
  }

  pub fn is_guest_proxy(&self, value: Value) -> bool {
    matches!(value, Value::Object(obj) if self.unwrap_guest_proxy(obj).is_some())
  }

  pub fn is_host_proxy(&self, value: HostValue) -> bool {
    self.unwrap_host_proxy(value).is_some()
  }

  pub fn proxy_count(&self) -> ProxyCount {
    self.state.proxies.count()
  }

  /// Releases the proxies whose wrappers have been collected. Returns how many were released.
  pub fn sweep(&mut self) -> usize {
    self.state.proxies.sweep(self.guest, self.host)
  }
}
