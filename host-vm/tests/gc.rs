use host_vm::{HeapLimits, HostError, HostRuntime, HostValue, WeakHostRef};

fn runtime() -> Result<HostRuntime, HostError> {
  // Stress rooting: force a GC before each allocation.
  HostRuntime::new(HeapLimits::new(4 * 1024 * 1024, 0))
}

#[test]
fn builtins_survive_collection() -> Result<(), HostError> {
  let mut rt = runtime()?;
  rt.collect_garbage();
  let object = rt.builtins().object;
  assert_eq!(rt.class_name(object)?, b"Object");
  assert_eq!(rt.get_global(b"String")?, Some(HostValue::Ref(rt.builtins().string)));
  Ok(())
}

#[test]
fn unrooted_values_are_collected() -> Result<(), HostError> {
  let mut rt = runtime()?;
  let s = rt.str_new(b"temporary")?;
  let weak = WeakHostRef::new(s.as_ref().ok_or(HostError::InvalidHandle)?);
  assert!(weak.upgrade(rt.heap()).is_some());
  rt.collect_garbage();
  assert!(weak.upgrade(rt.heap()).is_none());
  assert!(matches!(rt.string_bytes(s), Err(HostError::InvalidHandle)));
  Ok(())
}

#[test]
fn containers_keep_their_elements_alive() -> Result<(), HostError> {
  let mut rt = runtime()?;
  let array = rt.array_new(&[])?;
  let root = rt.add_root(array);
  for i in 0..8 {
    let s = rt.str_new(format!("item {i}").as_bytes())?;
    rt.array_push(array, s)?;
  }
  let hash = rt.hash_new()?;
  rt.array_push(array, hash)?;
  let key = rt.str_new(b"key")?;
  let value = rt.float_new(1.5)?;
  rt.hash_set(hash, key, value)?;

  rt.collect_garbage();
  assert_eq!(rt.array_len(array)?, 9);
  let third = rt.array_get(array, 3)?;
  assert_eq!(rt.string_bytes(third)?, b"item 3");
  assert_eq!(rt.array_get(array, -1)?, hash);
  assert_eq!(rt.array_get(array, 100)?, HostValue::Nil);

  let lookup = rt.str_new(b"key")?;
  let found = rt.hash_get(hash, lookup)?.ok_or(HostError::InvalidHandle)?;
  assert_eq!(rt.float_value(found)?, 1.5);

  rt.remove_root(root);
  rt.collect_garbage();
  assert!(matches!(rt.array_len(array), Err(HostError::InvalidHandle)));
  Ok(())
}

#[test]
fn collected_foreign_proxies_report_their_slots() -> Result<(), HostError> {
  let mut rt = runtime()?;
  let class = rt.builtins().data;
  let proxy = rt.foreign_proxy_new(class, 42)?;
  assert_eq!(rt.foreign_proxy_slot(proxy), Some(42));
  let root = rt.add_root(proxy);
  rt.collect_garbage();
  assert!(rt.take_finalized_proxy_slots().is_empty());
  rt.remove_root(root);
  rt.collect_garbage();
  assert_eq!(rt.take_finalized_proxy_slots(), vec![42]);
  Ok(())
}

#[test]
fn allocation_failure_is_reported() -> Result<(), HostError> {
  let mut rt = HostRuntime::new(HeapLimits::new(256 * 1024, 0))?;
  let err = rt.str_new(&vec![b'x'; 1024 * 1024]).unwrap_err();
  assert_eq!(err, HostError::OutOfMemory);
  Ok(())
}
