use crate::native::NativeCallFn;
use crate::object::{JsObject, NativeFunction, ObjectKind, RegExpData};
use crate::regexp::RegExpFlags;
use crate::string::JsString;
use crate::{GcObject, GcString, HeapId, HostSlots, RootId, Value, VmError};
use core::mem;

/// Hard upper bound for `[[Prototype]]` chain traversals.
pub const MAX_PROTOTYPE_CHAIN: usize = 10_000;

/// Heap configuration and memory limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapLimits {
  /// Hard memory limit for live heap allocations, in bytes.
  pub max_bytes: usize,
  /// When an allocation would cause `used_bytes` to exceed this threshold, the heap will trigger a
  /// GC cycle before attempting the allocation.
  pub gc_threshold: usize,
}

impl HeapLimits {
  /// Creates a new set of heap limits.
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

/// A non-moving mark/sweep GC heap.
///
/// The heap stores allocations in a `Vec` of slots. GC handles store the slot `index` and a
/// per-slot `generation`, which makes handles stable across `Vec` reallocations and allows
/// detection of stale handles when slots are reused.
pub struct Heap {
  limits: HeapLimits,

  /// Bytes used by live allocations.
  used_bytes: usize,
  gc_runs: u64,

  slots: Vec<Slot>,
  marks: Vec<u8>,
  free_list: Vec<u32>,

  // Root sets.
  pub(crate) root_stack: Vec<Value>,
  persistent_roots: Vec<Option<Value>>,
  persistent_roots_free: Vec<u32>,
  pub(crate) pending_exception: Option<Value>,

  finalized_host_slots: Vec<HostSlots>,
}

/// RAII wrapper for a persistent GC root created by [`Heap::add_root`].
///
/// While this guard is alive it holds a mutable borrow of the [`Heap`]. For long-lived roots stored
/// in embedder state, store the [`RootId`] returned by [`Heap::add_root`] instead.
pub struct PersistentRoot<'a> {
  heap: &'a mut Heap,
  id: RootId,
}

impl<'a> PersistentRoot<'a> {
  /// Adds `value` to the heap's persistent root set and returns a guard that removes it on drop.
  pub fn new(heap: &'a mut Heap, value: Value) -> Self {
    let id = heap.add_root(value);
    Self { heap, id }
  }

  pub fn id(&self) -> RootId {
    self.id
  }

  pub fn get(&self) -> Option<Value> {
    self.heap.get_root(self.id)
  }

  /// Borrows the underlying heap immutably.
  #[inline]
  pub fn heap(&self) -> &Heap {
    &*self.heap
  }

  /// Borrows the underlying heap mutably.
  #[inline]
  pub fn heap_mut(&mut self) -> &mut Heap {
    &mut *self.heap
  }
}

impl Drop for PersistentRoot<'_> {
  fn drop(&mut self) {
    self.heap.remove_root(self.id);
  }
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
      pending_exception: None,
      finalized_host_slots: Vec::new(),
    }
  }

  /// Enters a stack-rooting scope.
  ///
  /// Stack roots pushed via [`Scope::push_root`] are removed when the returned `Scope` is dropped.
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

  /// Bytes currently used by live heap allocations.
  pub fn used_bytes(&self) -> usize {
    self.used_bytes
  }

  /// Total number of GC cycles that have run.
  pub fn gc_runs(&self) -> u64 {
    self.gc_runs
  }

  /// Number of values currently on the stack root set.
  pub fn root_stack_len(&self) -> usize {
    self.root_stack.len()
  }

  /// Number of live persistent roots.
  pub fn persistent_root_count(&self) -> usize {
    self.persistent_roots.iter().filter(|r| r.is_some()).count()
  }

  /// Explicitly runs a GC cycle.
  pub fn collect_garbage(&mut self) {
    self.gc_runs += 1;

    // Mark.
    {
      debug_assert_eq!(self.slots.len(), self.marks.len());

      let slots = &self.slots;
      let marks = &mut self.marks[..];

      let mut tracer = Tracer::new(slots, marks);
      for value in &self.root_stack {
        tracer.trace_value(*value);
      }
      for value in self.persistent_roots.iter().flatten() {
        tracer.trace_value(*value);
      }
      if let Some(value) = self.pending_exception {
        tracer.trace_value(value);
      }

      while let Some(id) = tracer.pop_work() {
        let Some(idx) = tracer.validate(id) else {
          continue;
        };
        if tracer.marks[idx] != 0 {
          continue;
        }
        tracer.marks[idx] = 1;

        let Some(obj) = tracer.slots[idx].value.as_ref() else {
          debug_assert!(false, "validated heap id points to a free slot: {id:?}");
          continue;
        };
        obj.trace(&mut tracer);
      }
    }

    // Sweep.
    let mut freed = 0usize;
    for (idx, slot) in self.slots.iter_mut().enumerate() {
      let marked = self.marks[idx] != 0;
      // Reset mark bits for next cycle.
      self.marks[idx] = 0;

      if slot.value.is_none() {
        debug_assert!(!marked);
        continue;
      }

      if marked {
        continue;
      }

      if let Some(HeapObject::Object(obj)) = &slot.value {
        if let Some(slots) = obj.host_slots() {
          self.finalized_host_slots.push(slots);
        }
      }

      // Unreachable: drop the allocation and free the slot.
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
      "guest gc cycle"
    );
  }

  /// Adds a persistent root and returns an RAII guard that removes it on drop.
  #[inline]
  pub fn persistent_root(&mut self, value: Value) -> PersistentRoot<'_> {
    PersistentRoot::new(self, value)
  }

  /// Adds a persistent root, keeping `value` live until the returned [`RootId`] is removed.
  pub fn add_root(&mut self, value: Value) -> RootId {
    // Root sets should not contain stale handles; detect issues early in debug builds.
    debug_assert!(self.debug_value_is_valid_or_primitive(value));

    let idx = match self.persistent_roots_free.pop() {
      Some(idx) => idx as usize,
      None => {
        self.persistent_roots.push(None);
        self.persistent_roots.len() - 1
      }
    };
    debug_assert!(self.persistent_roots[idx].is_none());
    self.persistent_roots[idx] = Some(value);
    RootId(idx as u32)
  }

  /// Returns the current value of a persistent root.
  pub fn get_root(&self, id: RootId) -> Option<Value> {
    self
      .persistent_roots
      .get(id.0 as usize)
      .and_then(|slot| *slot)
  }

  /// Removes a persistent root previously created by [`Heap::add_root`].
  pub fn remove_root(&mut self, id: RootId) {
    let idx = id.0 as usize;
    debug_assert!(idx < self.persistent_roots.len(), "invalid RootId");
    let Some(slot) = self.persistent_roots.get_mut(idx) else {
      return;
    };
    if slot.take().is_some() {
      self.persistent_roots_free.push(id.0);
    }
  }

  pub fn is_valid_object(&self, obj: GcObject) -> bool {
    matches!(self.get_heap_object(obj.0), Ok(HeapObject::Object(_)))
  }

  pub fn is_valid_string(&self, s: GcString) -> bool {
    matches!(self.get_heap_object(s.0), Ok(HeapObject::String(_)))
  }

  pub fn get_string(&self, s: GcString) -> Result<&JsString, VmError> {
    match self.get_heap_object(s.0)? {
      HeapObject::String(s) => Ok(s),
      _ => Err(VmError::InvalidHandle),
    }
  }

  /// Returns the [`HostSlots`] of a host object, or `None` for any other object.
  pub fn host_slots(&self, obj: GcObject) -> Result<Option<HostSlots>, VmError> {
    Ok(self.get_object(obj)?.host_slots())
  }

  /// Drains the slots of host objects collected since the last call.
  pub fn take_finalized_host_slots(&mut self) -> Vec<HostSlots> {
    mem::take(&mut self.finalized_host_slots)
  }

  pub fn object_prototype(&self, obj: GcObject) -> Result<Option<GcObject>, VmError> {
    Ok(self.get_object(obj)?.proto)
  }

  /// Sets `obj.[[Prototype]]`, rejecting cycles.
  pub fn object_set_prototype(
    &mut self,
    obj: GcObject,
    proto: Option<GcObject>,
  ) -> Result<(), VmError> {
    let mut current = proto;
    let mut steps = 0usize;
    while let Some(p) = current {
      if p == obj {
        return Err(VmError::PrototypeCycle);
      }
      steps += 1;
      if steps > MAX_PROTOTYPE_CHAIN {
        return Err(VmError::PrototypeCycle);
      }
      current = self.get_object(p)?.proto;
    }
    self.get_object_mut(obj)?.proto = proto;
    Ok(())
  }

  pub fn is_callable(&self, value: Value) -> bool {
    match value {
      Value::Object(obj) => self
        .get_object(obj)
        .map(|o| o.is_callable())
        .unwrap_or(false),
      _ => false,
    }
  }

  /// Looks up an own data property without consulting host hooks.
  pub fn get_own_property(&self, obj: GcObject, key: &[u8]) -> Result<Option<Value>, VmError> {
    let obj = self.get_object(obj)?;
    Ok(obj.find_property(key).map(|idx| obj.properties[idx].value))
  }

  /// Own property keys in insertion order.
  pub fn own_property_keys(&self, obj: GcObject) -> Result<Vec<Vec<u8>>, VmError> {
    let obj = self.get_object(obj)?;
    Ok(obj.properties.iter().map(|p| p.key.to_vec()).collect())
  }

  /// Removes an own data property. Returns whether a property was removed.
  pub fn delete_property(&mut self, obj: GcObject, key: &[u8]) -> Result<bool, VmError> {
    let idx = self.validate(obj.0).ok_or(VmError::InvalidHandle)?;
    let removed_bytes = {
      let Some(HeapObject::Object(o)) = self.slots[idx].value.as_mut() else {
        return Err(VmError::InvalidHandle);
      };
      let Some(pos) = o.find_property(key) else {
        return Ok(false);
      };
      let prop = o.properties.remove(pos);
      JsObject::property_size_bytes(prop.key.len())
    };
    let bytes = self.slots[idx].bytes.saturating_sub(removed_bytes);
    self.update_slot_bytes(idx, bytes);
    Ok(true)
  }

  pub(crate) fn get_object(&self, obj: GcObject) -> Result<&JsObject, VmError> {
    match self.get_heap_object(obj.0)? {
      HeapObject::Object(o) => Ok(o),
      _ => Err(VmError::InvalidHandle),
    }
  }

  pub(crate) fn get_object_mut(&mut self, obj: GcObject) -> Result<&mut JsObject, VmError> {
    match self.get_heap_object_mut(obj.0)? {
      HeapObject::Object(o) => Ok(o),
      _ => Err(VmError::InvalidHandle),
    }
  }

  pub(crate) fn get_function(&self, obj: GcObject) -> Result<&NativeFunction, VmError> {
    match &self.get_object(obj)?.kind {
      ObjectKind::Function(f) => Ok(f),
      _ => Err(VmError::NotCallable),
    }
  }

  pub(crate) fn get_regexp(&self, obj: GcObject) -> Result<&RegExpData, VmError> {
    match &self.get_object(obj)?.kind {
      ObjectKind::RegExp(re) => Ok(re),
      _ => Err(VmError::TypeError("object is not a RegExp")),
    }
  }

  fn get_heap_object(&self, id: HeapId) -> Result<&HeapObject, VmError> {
    let idx = self.validate(id).ok_or(VmError::InvalidHandle)?;
    self.slots[idx].value.as_ref().ok_or(VmError::InvalidHandle)
  }

  fn get_heap_object_mut(&mut self, id: HeapId) -> Result<&mut HeapObject, VmError> {
    let idx = self.validate(id).ok_or(VmError::InvalidHandle)?;
    self.slots[idx].value.as_mut().ok_or(VmError::InvalidHandle)
  }

  fn validate(&self, id: HeapId) -> Option<usize> {
    let idx = id.index() as usize;
    let slot = self.slots.get(idx)?;
    if slot.generation != id.generation() {
      return None;
    }
    if slot.value.is_none() {
      return None;
    }
    Some(idx)
  }

  fn ensure_can_allocate(&mut self, new_bytes: usize) -> Result<(), VmError> {
    let after = self.used_bytes.saturating_add(new_bytes);
    if after > self.limits.gc_threshold {
      self.collect_garbage();
    }

    let after = self.used_bytes.saturating_add(new_bytes);
    if after > self.limits.max_bytes {
      return Err(VmError::OutOfMemory);
    }
    Ok(())
  }

  fn update_slot_bytes(&mut self, idx: usize, new_bytes: usize) {
    let slot = &mut self.slots[idx];
    let old_bytes = slot.bytes;

    if new_bytes >= old_bytes {
      self.used_bytes = self.used_bytes.saturating_add(new_bytes - old_bytes);
    } else {
      self.used_bytes = self.used_bytes.saturating_sub(old_bytes - new_bytes);
    }

    slot.bytes = new_bytes;
  }

  fn alloc_unchecked(&mut self, obj: HeapObject, new_bytes: usize) -> HeapId {
    let idx = match self.free_list.pop() {
      Some(idx) => idx as usize,
      None => {
        let idx = self.slots.len();
        self.slots.push(Slot::new());
        self.marks.push(0);
        idx
      }
    };

    let slot = &mut self.slots[idx];
    debug_assert!(slot.value.is_none(), "free list returned an occupied slot");

    slot.value = Some(obj);
    slot.bytes = new_bytes;
    self.used_bytes = self.used_bytes.saturating_add(new_bytes);

    HeapId::from_parts(idx as u32, slot.generation)
  }

  fn debug_value_is_valid_or_primitive(&self, value: Value) -> bool {
    match value {
      Value::Undefined | Value::Null | Value::Bool(_) | Value::Int(_) | Value::Number(_) => true,
      Value::String(s) => self.is_valid_string(s),
      Value::Object(o) => self.is_valid_object(o),
    }
  }
}

/// A stack-rooting scope.
///
/// All stack roots pushed via [`Scope::push_root`] are removed when the scope is dropped.
pub struct Scope<'a> {
  heap: &'a mut Heap,
  root_stack_len_at_entry: usize,
}

impl Drop for Scope<'_> {
  fn drop(&mut self) {
    self.heap.root_stack.truncate(self.root_stack_len_at_entry);
  }
}

impl<'a> Scope<'a> {
  /// Pushes a stack root.
  ///
  /// The returned `Value` is the same as the input, allowing call sites to write
  /// `let v = scope.push_root(v);` if desired.
  pub fn push_root(&mut self, value: Value) -> Value {
    debug_assert!(self.heap.debug_value_is_valid_or_primitive(value));
    self.heap.root_stack.push(value);
    value
  }

  /// Creates a nested child scope that borrows the same heap.
  pub fn reborrow(&mut self) -> Scope<'_> {
    let root_stack_len_at_entry = self.heap.root_stack.len();
    Scope {
      heap: &mut *self.heap,
      root_stack_len_at_entry,
    }
  }

  /// Borrows the underlying heap immutably.
  pub fn heap(&self) -> &Heap {
    &*self.heap
  }

  /// Borrows the underlying heap mutably.
  pub fn heap_mut(&mut self) -> &mut Heap {
    &mut *self.heap
  }

  /// Allocates a string holding exactly `bytes`.
  pub fn alloc_string(&mut self, bytes: &[u8]) -> Result<GcString, VmError> {
    let new_bytes = JsString::heap_size_bytes_for_len(bytes.len());
    self.heap.ensure_can_allocate(new_bytes)?;

    // Fallible allocation for the backing buffer (avoid process abort on OOM).
    let mut buf: Vec<u8> = Vec::new();
    buf
      .try_reserve_exact(bytes.len())
      .map_err(|_| VmError::OutOfMemory)?;
    buf.extend_from_slice(bytes);

    let obj = HeapObject::String(JsString::from_vec(buf));
    Ok(GcString(self.heap.alloc_unchecked(obj, new_bytes)))
  }

  /// Convenience alias for [`Scope::alloc_string`] on UTF-8 input.
  pub fn alloc_string_from_utf8(&mut self, s: &str) -> Result<GcString, VmError> {
    self.alloc_string(s.as_bytes())
  }

  /// Allocates an empty ordinary object with no prototype.
  pub fn alloc_object(&mut self) -> Result<GcObject, VmError> {
    self.alloc_object_with_prototype(None)
  }

  /// Allocates an empty ordinary object with an explicit internal prototype.
  pub fn alloc_object_with_prototype(
    &mut self,
    proto: Option<GcObject>,
  ) -> Result<GcObject, VmError> {
    self.alloc_object_of_kind(proto, ObjectKind::Ordinary, 0)
  }

  /// Allocates a native function object.
  ///
  /// `slots` are traced by the GC and can be read back by the native through
  /// [`GuestRuntime::function_slots`](crate::GuestRuntime::function_slots).
  pub fn alloc_native_function(
    &mut self,
    proto: Option<GcObject>,
    name: &[u8],
    call: NativeCallFn,
    slots: &[Value],
  ) -> Result<GcObject, VmError> {
    let mut scope = self.reborrow();
    for slot in slots {
      scope.push_root(*slot);
    }
    let extra = JsObject::function_size_bytes(name.len(), slots.len());
    let kind = ObjectKind::Function(NativeFunction {
      call,
      name: name.into(),
      slots: slots.into(),
    });
    scope.alloc_object_of_kind(proto, kind, extra)
  }

  /// Allocates a host object whose internal methods are routed to [`VmHost`](crate::VmHost).
  pub fn alloc_host_object(
    &mut self,
    proto: Option<GcObject>,
    slots: HostSlots,
    callable: bool,
  ) -> Result<GcObject, VmError> {
    self.alloc_object_of_kind(proto, ObjectKind::Host { slots, callable }, 0)
  }

  pub(crate) fn alloc_regexp(
    &mut self,
    proto: Option<GcObject>,
    source: GcString,
    flags: RegExpFlags,
  ) -> Result<GcObject, VmError> {
    let mut scope = self.reborrow();
    scope.push_root(Value::String(source));
    scope.alloc_object_of_kind(proto, ObjectKind::RegExp(RegExpData { source, flags }), 0)
  }

  fn alloc_object_of_kind(
    &mut self,
    proto: Option<GcObject>,
    kind: ObjectKind,
    extra_bytes: usize,
  ) -> Result<GcObject, VmError> {
    // Root the prototype in case `ensure_can_allocate` triggers a GC cycle.
    let mut scope = self.reborrow();
    if let Some(proto) = proto {
      scope.push_root(Value::Object(proto));
    }

    let new_bytes = mem::size_of::<JsObject>().saturating_add(extra_bytes);
    scope.heap.ensure_can_allocate(new_bytes)?;

    let obj = HeapObject::Object(JsObject::new(proto, kind));
    debug_assert_eq!(
      match &obj {
        HeapObject::Object(o) => o.heap_size_bytes(),
        HeapObject::String(_) => 0,
      },
      new_bytes
    );
    Ok(GcObject(scope.heap.alloc_unchecked(obj, new_bytes)))
  }

  /// Creates or overwrites an own data property.
  ///
  /// `obj` and `value` are rooted for the duration of the call.
  pub fn define_property(
    &mut self,
    obj: GcObject,
    key: &[u8],
    value: Value,
  ) -> Result<(), VmError> {
    let mut scope = self.reborrow();
    scope.push_root(Value::Object(obj));
    scope.push_root(value);

    {
      let o = scope.heap.get_object_mut(obj)?;
      if let Some(idx) = o.find_property(key) {
        o.properties[idx].value = value;
        return Ok(());
      }
    }

    let new_bytes = JsObject::property_size_bytes(key.len());
    scope.heap.ensure_can_allocate(new_bytes)?;

    let mut key_buf: Vec<u8> = Vec::new();
    key_buf
      .try_reserve_exact(key.len())
      .map_err(|_| VmError::OutOfMemory)?;
    key_buf.extend_from_slice(key);

    let idx = scope.heap.validate(obj.0).ok_or(VmError::InvalidHandle)?;
    scope.heap.get_object_mut(obj)?.properties.push(crate::object::Property {
      key: key_buf.into_boxed_slice(),
      value,
    });
    let bytes = scope.heap.slots[idx].bytes.saturating_add(new_bytes);
    scope.heap.update_slot_bytes(idx, bytes);
    Ok(())
  }
}

struct Slot {
  generation: u32,
  value: Option<HeapObject>,
  bytes: usize,
}

impl Slot {
  fn new() -> Self {
    Self {
      generation: 0,
      value: None,
      bytes: 0,
    }
  }
}

enum HeapObject {
  String(JsString),
  Object(JsObject),
}

impl Trace for HeapObject {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    match self {
      HeapObject::String(_) => {}
      HeapObject::Object(obj) => obj.trace(tracer),
    }
  }
}

pub(crate) trait Trace {
  fn trace(&self, tracer: &mut Tracer<'_>);
}

pub(crate) struct Tracer<'a> {
  slots: &'a [Slot],
  marks: &'a mut [u8],
  worklist: Vec<HeapId>,
}

impl<'a> Tracer<'a> {
  fn new(slots: &'a [Slot], marks: &'a mut [u8]) -> Self {
    Self {
      slots,
      marks,
      worklist: Vec::new(),
    }
  }

  fn pop_work(&mut self) -> Option<HeapId> {
    self.worklist.pop()
  }

  pub(crate) fn trace_value(&mut self, value: Value) {
    match value {
      Value::Undefined | Value::Null | Value::Bool(_) | Value::Int(_) | Value::Number(_) => {}
      Value::String(s) => self.trace_heap_id(s.0),
      Value::Object(o) => self.trace_heap_id(o.0),
    }
  }

  fn trace_heap_id(&mut self, id: HeapId) {
    let Some(idx) = self.validate(id) else {
      return;
    };
    if self.marks[idx] != 0 {
      return;
    }
    self.worklist.push(id);
  }

  fn validate(&self, id: HeapId) -> Option<usize> {
    let idx = id.index() as usize;
    let slot = self.slots.get(idx)?;
    if slot.generation != id.generation() {
      debug_assert!(false, "stale handle during GC: {id:?}");
      return None;
    }
    if slot.value.is_none() {
      debug_assert!(false, "handle points at a free slot during GC: {id:?}");
      return None;
    }
    Some(idx)
  }
}
