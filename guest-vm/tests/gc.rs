use guest_vm::{GuestRuntime, Heap, HeapLimits, HostSlots, Value, VmError, WeakGcObject};

#[test]
fn unrooted_objects_are_collected() -> Result<(), VmError> {
  let mut heap = Heap::new(HeapLimits::new(1024 * 1024, 1024 * 1024));
  let obj = {
    let mut scope = heap.scope();
    scope.alloc_object()?
  };
  assert!(heap.is_valid_object(obj));
  heap.collect_garbage();
  assert!(!heap.is_valid_object(obj));
  assert_eq!(heap.used_bytes(), 0);
  Ok(())
}

#[test]
fn stack_roots_are_released_when_the_scope_drops() -> Result<(), VmError> {
  let mut heap = Heap::new(HeapLimits::new(1024 * 1024, 1024 * 1024));
  let s;
  {
    let mut scope = heap.scope();
    s = scope.alloc_string(b"kept")?;
    scope.push_root(Value::String(s));
    {
      let mut inner = scope.reborrow();
      let tmp = inner.alloc_string(b"tmp")?;
      inner.push_root(Value::String(tmp));
      assert_eq!(inner.heap().root_stack_len(), 2);
    }
    assert_eq!(scope.heap().root_stack_len(), 1);
    scope.heap_mut().collect_garbage();
    assert!(scope.heap().is_valid_string(s));
  }
  assert_eq!(heap.root_stack_len(), 0);
  heap.collect_garbage();
  assert!(!heap.is_valid_string(s));
  Ok(())
}

#[test]
fn persistent_roots_keep_values_alive_until_removed() -> Result<(), VmError> {
  let mut heap = Heap::new(HeapLimits::new(1024 * 1024, 0));
  let obj = heap.scope().alloc_object()?;
  let root = heap.add_root(Value::Object(obj));
  heap.collect_garbage();
  assert!(heap.is_valid_object(obj));
  assert_eq!(heap.get_root(root), Some(Value::Object(obj)));

  heap.remove_root(root);
  heap.collect_garbage();
  assert!(!heap.is_valid_object(obj));
  Ok(())
}

#[test]
fn stale_handles_are_rejected_after_slot_reuse() -> Result<(), VmError> {
  let mut heap = Heap::new(HeapLimits::new(1024 * 1024, 1024 * 1024));
  let old = heap.scope().alloc_string(b"old")?;
  heap.collect_garbage();
  let new = heap.scope().alloc_string(b"new")?;
  assert_eq!(old.index(), new.index());
  assert_ne!(old.generation(), new.generation());
  assert!(matches!(heap.get_string(old), Err(VmError::InvalidHandle)));
  assert_eq!(heap.get_string(new)?.as_bytes(), b"new");
  Ok(())
}

#[test]
fn weak_handles_do_not_keep_objects_alive() -> Result<(), VmError> {
  let mut heap = Heap::new(HeapLimits::new(1024 * 1024, 1024 * 1024));
  let obj = heap.scope().alloc_object()?;
  let weak = WeakGcObject::from(obj);
  assert_eq!(weak.upgrade(&heap), Some(obj));
  heap.collect_garbage();
  assert_eq!(weak.upgrade(&heap), None);
  Ok(())
}

#[test]
fn collected_host_objects_queue_their_slots() -> Result<(), VmError> {
  let mut rt = GuestRuntime::new(HeapLimits::new(1024 * 1024, 1024 * 1024))?;
  let slots = HostSlots { a: 7, b: 1 };
  let obj = rt.new_host_object(slots, false)?;
  let root = rt.add_root(Value::Object(obj));
  rt.collect_garbage();
  assert!(rt.take_finalized_host_slots().is_empty());

  rt.remove_root(root);
  rt.collect_garbage();
  assert_eq!(rt.take_finalized_host_slots(), vec![slots]);
  assert!(rt.take_finalized_host_slots().is_empty());
  Ok(())
}

#[test]
fn realm_survives_gc_stress() -> Result<(), VmError> {
  // Stress rooting: force a GC before each allocation.
  let mut rt = GuestRuntime::new(HeapLimits::new(1024 * 1024, 0))?;
  let err = rt.new_error(b"stress")?;
  rt.collect_garbage();
  assert!(!rt.heap().is_valid_object(err));

  let global = rt.global_object();
  let ctor = rt.heap().get_own_property(global, b"Error")?;
  assert_eq!(ctor, Some(Value::Object(rt.realm().error_constructor())));
  Ok(())
}

#[test]
fn allocations_fail_past_the_heap_limit() -> Result<(), VmError> {
  let mut heap = Heap::new(HeapLimits::new(64, 0));
  let mut scope = heap.scope();
  let err = scope.alloc_string(&[0u8; 128]).unwrap_err();
  assert!(matches!(err, VmError::OutOfMemory));
  Ok(())
}
