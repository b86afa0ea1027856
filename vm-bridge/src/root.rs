use crate::BridgeCx;
use ahash::AHashMap;
use guest_vm::{GcObject, GcString, GuestRuntime, Value};
use host_vm::{HostRef, HostRuntime, HostValue};
use std::ops::{Deref, DerefMut};

/// Identity of a protected value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum RootKey {
  Host(HostRef),
  GuestString(GcString),
  GuestObject(GcObject),
}

#[derive(Clone, Copy, Debug)]
enum Pin {
  Host(host_vm::RootId),
  Guest(guest_vm::RootId),
}

#[derive(Debug)]
struct Entry {
  count: usize,
  pin: Pin,
}

/// Values currently protected by an active [`RootScope`], across both runtimes.
///
/// Each distinct value holds one persistent root in its own runtime, shared by every scope that
/// protects it and released when the last of them exits.
#[derive(Debug, Default)]
pub(crate) struct RootSet {
  entries: AHashMap<RootKey, Entry>,
  stack: Vec<RootKey>,
}

impl RootSet {
  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  fn depth(&self) -> usize {
    self.stack.len()
  }

  fn protect(&mut self, key: RootKey, pin: impl FnOnce() -> Pin) {
    self.stack.push(key);
    match self.entries.get_mut(&key) {
      Some(entry) => entry.count += 1,
      None => {
        tracing::trace!(?key, "protect");
        self.entries.insert(key, Entry { count: 1, pin: pin() });
      }
    }
  }

  /// Pops protections down to `depth`, releasing values no scope protects anymore.
  fn release_to(&mut self, depth: usize, guest: &mut GuestRuntime, host: &mut HostRuntime) {
    while self.stack.len() > depth {
      let Some(key) = self.stack.pop() else {
        break;
      };
      let Some(entry) = self.entries.get_mut(&key) else {
        debug_assert!(false, "root stack entry without a root set entry");
        continue;
      };
      entry.count -= 1;
      if entry.count == 0 {
        tracing::trace!(?key, "release");
        if let Some(entry) = self.entries.remove(&key) {
          unpin(entry.pin, guest, host);
        }
      }
    }
  }

  /// Releases every protection. Used at teardown.
  pub(crate) fn clear(&mut self, guest: &mut GuestRuntime, host: &mut HostRuntime) {
    self.stack.clear();
    for (_, entry) in self.entries.drain() {
      unpin(entry.pin, guest, host);
    }
  }
}

fn unpin(pin: Pin, guest: &mut GuestRuntime, host: &mut HostRuntime) {
  match pin {
    Pin::Host(id) => host.remove_root(id),
    Pin::Guest(id) => guest.remove_root(id),
  }
}

/// A lexical protection scope.
///
/// Values protected through a `RootScope` survive collections in their runtime until the scope is
/// dropped, on every exit path. Scopes nest: an inner scope may protect a value an outer scope
/// already protects.
///
/// A `RootScope` dereferences to the [`BridgeCx`] it was opened on, so conversions and calls can
/// be made while it is alive.
pub struct RootScope<'s, 'a> {
  cx: &'s mut BridgeCx<'a>,
  depth_at_entry: usize,
}

impl<'s, 'a> RootScope<'s, 'a> {
  pub(crate) fn new(cx: &'s mut BridgeCx<'a>) -> Self {
    let depth_at_entry = cx.state.roots.depth();
    Self { cx, depth_at_entry }
  }

  /// Protects a host value until this scope exits. Immediates need no protection.
  pub fn protect_host(&mut self, value: HostValue) -> HostValue {
    if let HostValue::Ref(r) = value {
      let host = &mut *self.cx.host;
      self
        .cx
        .state
        .roots
        .protect(RootKey::Host(r), || Pin::Host(host.add_root(value)));
    }
    value
  }

  /// Protects a guest value until this scope exits. Only strings and objects need protection.
  pub fn protect_guest(&mut self, value: Value) -> Value {
    let key = match value {
      Value::String(s) => RootKey::GuestString(s),
      Value::Object(o) => RootKey::GuestObject(o),
      Value::Undefined | Value::Null | Value::Bool(_) | Value::Int(_) | Value::Number(_) => {
        return value;
      }
    };
    let guest = &mut *self.cx.guest;
    self
      .cx
      .state
      .roots
      .protect(key, || Pin::Guest(guest.add_root(value)));
    value
  }
}

impl<'a> Deref for RootScope<'_, 'a> {
  type Target = BridgeCx<'a>;

  fn deref(&self) -> &Self::Target {
    &*self.cx
  }
}

impl DerefMut for RootScope<'_, '_> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut *self.cx
  }
}

impl Drop for RootScope<'_, '_> {
  fn drop(&mut self) {
    let cx = &mut *self.cx;
    cx.state
      .roots
      .release_to(self.depth_at_entry, cx.guest, cx.host);
  }
}
