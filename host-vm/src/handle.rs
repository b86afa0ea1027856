use core::fmt;

use crate::Heap;

/// A reference to a host heap allocation.
///
/// Packed `{ index: u32, generation: u32 }`. The generation is bumped every time the slot is
/// freed, so a `HostRef` that outlives its allocation is detected instead of aliasing whatever
/// reuses the slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct HostRef(pub(crate) u64);

impl HostRef {
  pub(crate) fn from_parts(index: u32, generation: u32) -> Self {
    Self((index as u64) | ((generation as u64) << 32))
  }

  #[inline]
  pub fn index(self) -> u32 {
    self.0 as u32
  }

  #[inline]
  pub fn generation(self) -> u32 {
    (self.0 >> 32) as u32
  }
}

impl fmt::Debug for HostRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "HostRef({}@{})", self.index(), self.generation())
  }
}

/// A weak reference that does not keep its target alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct WeakHostRef(HostRef);

impl WeakHostRef {
  #[inline]
  pub fn new(r: HostRef) -> Self {
    Self(r)
  }

  /// Returns the target if it has not been collected.
  #[inline]
  pub fn upgrade(self, heap: &Heap) -> Option<HostRef> {
    heap.is_valid(self.0).then_some(self.0)
  }
}

impl From<HostRef> for WeakHostRef {
  #[inline]
  fn from(r: HostRef) -> Self {
    Self::new(r)
  }
}

/// An interned symbol. Symbols are immortal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
  #[inline]
  pub fn as_u32(self) -> u32 {
    self.0
  }
}

/// An ID for a persistent root, returned by [`Heap::add_root`](crate::Heap::add_root).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct RootId(pub(crate) u32);
