use guest_vm::{
  GcObject, GuestRuntime, HeapLimits, HostSlots, NoHost, RegExpFlags, TypeOf, Value, VmError,
  VmHost,
};

/// Host objects whose properties are all the string "host:" + key and whose calls return the
/// argument count.
#[derive(Default)]
struct EchoHost {
  sets: Vec<(u64, Vec<u8>)>,
}

impl VmHost for EchoHost {
  fn host_get(
    &mut self,
    rt: &mut GuestRuntime,
    _obj: GcObject,
    _slots: HostSlots,
    key: &[u8],
  ) -> Result<Value, VmError> {
    let mut bytes = b"host:".to_vec();
    bytes.extend_from_slice(key);
    Ok(Value::String(rt.scope().alloc_string(&bytes)?))
  }

  fn host_set(
    &mut self,
    _rt: &mut GuestRuntime,
    _obj: GcObject,
    slots: HostSlots,
    key: &[u8],
    _value: Value,
  ) -> Result<(), VmError> {
    self.sets.push((slots.a, key.to_vec()));
    Ok(())
  }

  fn host_call(
    &mut self,
    _rt: &mut GuestRuntime,
    _obj: GcObject,
    _slots: HostSlots,
    _this: Value,
    args: &[Value],
  ) -> Result<Value, VmError> {
    Ok(Value::Int(args.len() as i64))
  }
}

#[test]
fn regexp_objects_keep_source_and_flags() -> Result<(), VmError> {
  let mut rt = GuestRuntime::new(HeapLimits::new(1024 * 1024, 0))?;
  let re = rt.new_regexp(b"a+b", RegExpFlags::FOLD)?;
  assert!(rt.is_regexp(Value::Object(re)));
  let (source, flags) = rt.regexp_parts(re)?;
  assert_eq!(rt.string_bytes(source)?, b"a+b");
  assert_eq!(flags, RegExpFlags::FOLD);

  let ctor = rt.realm().regexp_constructor();
  assert!(rt.instance_of(&mut NoHost, Value::Object(re), ctor)?);
  assert_eq!(rt.get(&mut NoHost, re, b"ignoreCase")?, Value::Bool(true));
  assert_eq!(rt.get(&mut NoHost, re, b"global")?, Value::Bool(false));

  let rendered = rt.to_string(&mut NoHost, Value::Object(re))?;
  assert_eq!(rt.string_bytes(rendered)?, b"[object RegExp]");
  Ok(())
}

#[test]
fn regexp_constructor_parses_flag_strings() -> Result<(), VmError> {
  let mut rt = GuestRuntime::new(HeapLimits::default())?;
  let ctor = rt.realm().regexp_constructor();
  let (source, flags) = {
    let mut scope = rt.scope();
    let source = scope.alloc_string(b"x*")?;
    scope.push_root(Value::String(source));
    let flags = scope.alloc_string(b"gm")?;
    (source, flags)
  };
  let re = rt.call_function(
    &mut NoHost,
    Value::Object(ctor),
    Value::Undefined,
    &[Value::String(source), Value::String(flags)],
  )?;
  let Value::Object(re) = re else {
    panic!("expected a RegExp object");
  };
  let (_, bits) = rt.regexp_parts(re)?;
  assert_eq!(bits, RegExpFlags::GLOBAL | RegExpFlags::MULTILINE);
  let flags = rt.get(&mut NoHost, re, b"flags")?;
  let flags = rt.to_string(&mut NoHost, flags)?;
  assert_eq!(rt.string_bytes(flags)?, b"gm");
  Ok(())
}

#[test]
fn invalid_patterns_are_rejected() -> Result<(), VmError> {
  let mut rt = GuestRuntime::new(HeapLimits::default())?;
  let err = rt.new_regexp(b"(unclosed", 0).unwrap_err();
  assert!(matches!(err, VmError::InvalidRegExp { ref pattern, .. } if pattern == "(unclosed"));
  Ok(())
}

#[test]
fn unknown_flag_bits_are_preserved() -> Result<(), VmError> {
  let mut rt = GuestRuntime::new(HeapLimits::default())?;
  let re = rt.new_regexp(b"abc", 0x40 | RegExpFlags::FOLD)?;
  assert_eq!(rt.regexp_parts(re)?.1, 0x40 | RegExpFlags::FOLD);
  Ok(())
}

#[test]
fn host_objects_route_through_hooks() -> Result<(), VmError> {
  let mut rt = GuestRuntime::new(HeapLimits::new(1024 * 1024, 0))?;
  let mut host = EchoHost::default();
  let obj = rt.new_host_object(HostSlots { a: 3, b: 0 }, true)?;
  let root = rt.add_root(Value::Object(obj));
  assert_eq!(rt.type_of(Value::Object(obj)), TypeOf::Function);
  assert_eq!(rt.host_slots(obj)?, Some(HostSlots { a: 3, b: 0 }));

  let v = rt.get(&mut host, obj, b"name")?;
  let s = rt.to_string(&mut host, v)?;
  assert_eq!(rt.string_bytes(s)?, b"host:name");
  assert!(rt.has_property(&mut host, obj, b"name")?);

  rt.set(&mut host, obj, b"field", Value::Null)?;
  assert_eq!(host.sets, vec![(3, b"field".to_vec())]);
  assert_eq!(rt.heap().get_own_property(obj, b"field")?, None);

  let out = rt.call_function(
    &mut host,
    Value::Object(obj),
    Value::Undefined,
    &[Value::Int(1), Value::Int(2)],
  )?;
  assert_eq!(out, Value::Int(2));

  assert!(matches!(
    rt.set(&mut NoHost, obj, b"field", Value::Null),
    Err(VmError::TypeError(_))
  ));
  rt.remove_root(root);
  Ok(())
}
