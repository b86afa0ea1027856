use core::fmt;

use crate::Heap;

/// Slot address in the guest [`Heap`]: the low 32 bits are the slot index, the high 32 bits the
/// slot's generation at allocation time.
///
/// Freeing a slot bumps its generation, so a stale id never resolves to whatever reuses the slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct HeapId(pub(crate) u64);

impl HeapId {
  pub(crate) fn from_parts(index: u32, generation: u32) -> Self {
    Self(u64::from(index) | (u64::from(generation) << 32))
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

impl fmt::Debug for HeapId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}@{}", self.index(), self.generation())
  }
}

macro_rules! strong_handle {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    #[repr(transparent)]
    pub struct $name(pub(crate) HeapId);

    impl $name {
      #[inline]
      pub fn id(self) -> HeapId {
        self.0
      }

      #[inline]
      pub fn index(self) -> u32 {
        self.0.index()
      }

      #[inline]
      pub fn generation(self) -> u32 {
        self.0.generation()
      }
    }
  };
}

strong_handle!(
  /// An object, function, RegExp or host object. Only valid while rooted or reachable.
  GcObject
);

strong_handle!(
  /// An immutable byte string.
  GcString
);

/// An object handle that does not keep its target alive.
///
/// Proxy identity maps hold these for their wrappers; [`WeakGcObject::upgrade`] answers `None`
/// once the wrapper has been collected.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct WeakGcObject(HeapId);

impl WeakGcObject {
  #[inline]
  pub fn new(obj: GcObject) -> Self {
    Self(obj.id())
  }

  #[inline]
  pub fn upgrade(self, heap: &Heap) -> Option<GcObject> {
    let obj = GcObject(self.0);
    heap.is_valid_object(obj).then_some(obj)
  }
}

impl From<GcObject> for WeakGcObject {
  fn from(obj: GcObject) -> Self {
    Self::new(obj)
  }
}

/// Index of a persistent root, from [`Heap::add_root`](crate::Heap::add_root).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct RootId(pub(crate) u32);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ids_pack_index_and_generation() {
    let id = HeapId::from_parts(7, 3);
    assert_eq!(id.index(), 7);
    assert_eq!(id.generation(), 3);
    assert_eq!(format!("{id:?}"), "#7@3");
    assert_ne!(id, HeapId::from_parts(7, 4));
    assert_eq!(GcObject(id).index(), GcString(id).index());
  }
}
