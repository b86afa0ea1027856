use crate::object::HostObject;
use crate::{HostError, HostRef, HostValue, RootId};
use core::mem;

/// Heap configuration and memory limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapLimits {
  /// Hard memory limit for live heap allocations, in bytes.
  pub max_bytes: usize,
  /// When an allocation would push `used_bytes` past this threshold, a GC cycle runs first.
  pub gc_threshold: usize,
}

impl HeapLimits {
  pub fn new(max_bytes: usize, gc_threshold: usize) -> Self {
    Self {
      max_bytes,
      gc_threshold,
    }
  }
}

impl Default for HeapLimits {
  fn default() -> Self {
    Self::new(64 * 1024 * 1024, 8 * 1024 * 1024)
  }
}

/// The host runtime's non-moving mark/sweep heap.
pub struct Heap {
  limits: HeapLimits,
  used_bytes: usize,
  gc_runs: u64,

  slots: Vec<Slot>,
  marks: Vec<u8>,
  free_list: Vec<u32>,

  pub(crate) root_stack: Vec<HostValue>,
  persistent_roots: Vec<Option<HostValue>>,
  persistent_roots_free: Vec<u32>,
  /// `$!`: the exception currently being raised.
  pub(crate) errinfo: Option<HostValue>,
  /// `(tag, value)` of a `throw` still looking for its `catch`.
  pub(crate) pending_throw: Option<(HostValue, HostValue)>,

  finalized_proxy_slots: Vec<u64>,
}

struct Slot {
  generation: u32,
  value: Option<HostObject>,
  bytes: usize,
}

impl Heap {
  pub fn new(limits: HeapLimits) -> Self {
    Self {
      limits,
      used_bytes: 0,
      gc_runs: 0,
      slots: Vec::new(),
      marks: Vec::new(),
      free_list: Vec::new(),
      root_stack: Vec::new(),
      persistent_roots: Vec::new(),
      persistent_roots_free: Vec::new(),
      errinfo: None,
      pending_throw: None,
      finalized_proxy_slots: Vec::new(),
    }
  }

  /// Enters a stack-rooting scope.
  pub fn scope(&mut self) -> Scope<'_> {
    let root_stack_len_at_entry = self.root_stack.len();
    Scope {
      heap: self,
      root_stack_len_at_entry,
    }
  }

  pub fn limits(&self) -> HeapLimits {
    self.limits
  }

  pub fn used_bytes(&self) -> usize {
    self.used_bytes
  }

  pub fn gc_runs(&self) -> u64 {
    self.gc_runs
  }

  pub fn root_stack_len(&self) -> usize {
    self.root_stack.len()
  }

  pub fn persistent_root_count(&self) -> usize {
    self.persistent_roots.iter().filter(|r| r.is_some()).count()
  }

  pub fn is_valid(&self, r: HostRef) -> bool {
    self.validate(r).is_some()
  }

  /// Runs a full GC cycle.
  pub fn collect_garbage(&mut self) {
    self.gc_runs += 1;

    let mut work: Vec<HostRef> = Vec::new();
    let mut push = |v: HostValue| {
      if let HostValue::Ref(r) = v {
        work.push(r);
      }
    };
    self.root_stack.iter().copied().for_each(&mut push);
    self.persistent_roots.iter().flatten().copied().for_each(&mut push);
    self.errinfo.into_iter().for_each(&mut push);
    if let Some((tag, value)) = self.pending_throw {
      push(tag);
      push(value);
    }

    while let Some(r) = work.pop() {
      let Some(idx) = self.validate(r) else {
        continue;
      };
      if self.marks[idx] != 0 {
        continue;
      }
      self.marks[idx] = 1;
      if let Some(obj) = self.slots[idx].value.as_ref() {
        obj.for_each_child(&mut |v| {
          if let HostValue::Ref(child) = v {
            work.push(child);
          }
        });
      }
    }

    let mut freed = 0usize;
    for (idx, slot) in self.slots.iter_mut().enumerate() {
      let marked = mem::replace(&mut self.marks[idx], 0) != 0;
      if marked || slot.value.is_none() {
        continue;
      }
      if let Some(proxy_slot) = slot.value.as_ref().and_then(|o| o.foreign_proxy_slot()) {
        self.finalized_proxy_slots.push(proxy_slot);
      }
      self.used_bytes = self.used_bytes.saturating_sub(slot.bytes);
      slot.value = None;
      slot.bytes = 0;
      slot.generation = slot.generation.wrapping_add(1);
      self.free_list.push(idx as u32);
      freed += 1;
    }

    tracing::trace!(
      gc_runs = self.gc_runs,
      freed,
      used_bytes = self.used_bytes,
      "host gc cycle"
    );
  }

  /// Adds a persistent root, keeping `value` live until the returned [`RootId`] is removed.
  pub fn add_root(&mut self, value: HostValue) -> RootId {
    let idx = match self.persistent_roots_free.pop() {
      Some(idx) => idx as usize,
      None => {
        self.persistent_roots.push(None);
        self.persistent_roots.len() - 1
      }
    };
    self.persistent_roots[idx] = Some(value);
    RootId(idx as u32)
  }

  pub fn get_root(&self, id: RootId) -> Option<HostValue> {
    self
      .persistent_roots
      .get(id.0 as usize)
      .and_then(|slot| *slot)
  }

  pub fn remove_root(&mut self, id: RootId) {
    let Some(slot) = self.persistent_roots.get_mut(id.0 as usize) else {
      debug_assert!(false, "invalid RootId");
      return;
    };
    if slot.take().is_some() {
      self.persistent_roots_free.push(id.0);
    }
  }

  /// Drains the embedder slots of foreign proxies collected since the last call.
  pub fn take_finalized_proxy_slots(&mut self) -> Vec<u64> {
    mem::take(&mut self.finalized_proxy_slots)
  }

  pub(crate) fn get(&self, r: HostRef) -> Result<&HostObject, HostError> {
    let idx = self.validate(r).ok_or(HostError::InvalidHandle)?;
    self.slots[idx].value.as_ref().ok_or(HostError::InvalidHandle)
  }

  /// Mutates an allocation in place and re-accounts its size.
  ///
  /// `r` and `roots` stay rooted while room for `additional` bytes is made.
  pub(crate) fn mutate<R>(
    &mut self,
    r: HostRef,
    roots: &[HostValue],
    additional: usize,
    f: impl FnOnce(&mut HostObject) -> R,
  ) -> Result<R, HostError> {
    if additional > 0 {
      let len = self.root_stack.len();
      self.root_stack.push(HostValue::Ref(r));
      self.root_stack.extend_from_slice(roots);
      let res = self.ensure_can_allocate(additional);
      self.root_stack.truncate(len);
      res?;
    }
    let idx = self.validate(r).ok_or(HostError::InvalidHandle)?;
    let obj = self.slots[idx].value.as_mut().ok_or(HostError::InvalidHandle)?;
    let out = f(obj);
    let bytes = obj.heap_size_bytes();
    let old = mem::replace(&mut self.slots[idx].bytes, bytes);
    self.used_bytes = self.used_bytes.saturating_sub(old).saturating_add(bytes);
    Ok(out)
  }

  /// Allocates `obj`, keeping the values it references rooted if a GC runs first.
  pub(crate) fn alloc(&mut self, obj: HostObject) -> Result<HostRef, HostError> {
    let bytes = obj.heap_size_bytes();
    let len = self.root_stack.len();
    obj.for_each_child(&mut |v| self.root_stack.push(v));
    let res = self.ensure_can_allocate(bytes);
    self.root_stack.truncate(len);
    res?;

    let idx = match self.free_list.pop() {
      Some(idx) => idx as usize,
      None => {
        self.slots.push(Slot {
          generation: 0,
          value: None,
          bytes: 0,
        });
        self.marks.push(0);
        self.slots.len() - 1
      }
    };
    let slot = &mut self.slots[idx];
    debug_assert!(slot.value.is_none(), "free list returned an occupied slot");
    slot.value = Some(obj);
    slot.bytes = bytes;
    self.used_bytes = self.used_bytes.saturating_add(bytes);
    Ok(HostRef::from_parts(idx as u32, slot.generation))
  }

  fn ensure_can_allocate(&mut self, new_bytes: usize) -> Result<(), HostError> {
    if self.used_bytes.saturating_add(new_bytes) > self.limits.gc_threshold {
      self.collect_garbage();
    }
    if self.used_bytes.saturating_add(new_bytes) > self.limits.max_bytes {
      return Err(HostError::OutOfMemory);
    }
    Ok(())
  }

  fn validate(&self, r: HostRef) -> Option<usize> {
    let idx = r.index() as usize;
    let slot = self.slots.get(idx)?;
    (slot.generation == r.generation() && slot.value.is_some()).then_some(idx)
  }
}

/// A stack-rooting scope. Every root pushed in it is popped on drop.
pub struct Scope<'a> {
  heap: &'a mut Heap,
  root_stack_len_at_entry: usize,
}

impl Drop for Scope<'_> {
  fn drop(&mut self) {
    self.heap.root_stack.truncate(self.root_stack_len_at_entry);
  }
}

impl Scope<'_> {
  pub fn push_root(&mut self, value: HostValue) -> HostValue {
    self.heap.root_stack.push(value);
    value
  }

  pub fn reborrow(&mut self) -> Scope<'_> {
    let root_stack_len_at_entry = self.heap.root_stack.len();
    Scope {
      heap: &mut *self.heap,
      root_stack_len_at_entry,
    }
  }

  pub fn heap(&self) -> &Heap {
    &*self.heap
  }

  pub fn heap_mut(&mut self) -> &mut Heap {
    &mut *self.heap
  }

  pub fn alloc_string(&mut self, bytes: &[u8]) -> Result<HostRef, HostError> {
    let mut buf = Vec::new();
    buf
      .try_reserve_exact(bytes.len())
      .map_err(|_| HostError::OutOfMemory)?;
    buf.extend_from_slice(bytes);
    self.heap.alloc(HostObject::String(buf))
  }

  pub fn alloc_float(&mut self, value: f64) -> Result<HostRef, HostError> {
    self.heap.alloc(HostObject::Float(value))
  }

  pub fn alloc_array(&mut self, items: &[HostValue]) -> Result<HostRef, HostError> {
    self.heap.alloc(HostObject::Array(items.to_vec()))
  }

  pub fn alloc_hash(&mut self) -> Result<HostRef, HostError> {
    self.heap.alloc(HostObject::Hash(Vec::new()))
  }

  pub fn alloc_regexp(&mut self, source: &[u8], options: u32) -> Result<HostRef, HostError> {
    self.heap.alloc(HostObject::Regexp {
      source: source.into(),
      options,
    })
  }

  pub fn alloc_file(&mut self, path: &[u8]) -> Result<HostRef, HostError> {
    self.heap.alloc(HostObject::File { path: path.into() })
  }

  /// Allocates an interpreter-internal cell.
  pub fn alloc_internal_node(&mut self) -> Result<HostRef, HostError> {
    self.heap.alloc(HostObject::Internal)
  }
}
