use guest_vm::{GcObject, GuestRuntime, NativeCallFn, TypeOf, Value, VmError, VmHost};
use host_vm::{HostHooks, HostKind, HostRuntime, HostValue, Unwind, WeakHostRef};
use vm_bridge::{BridgeError, BridgeOptions, Context, HeapConfig, ProxyCount};

fn stress_context() -> Context {
  Context::new(BridgeOptions {
    guest_heap: HeapConfig::new(8 * 1024 * 1024, 0),
    host_heap: HeapConfig::new(8 * 1024 * 1024, 0),
    ..BridgeOptions::default()
  })
  .expect("context")
}

/// Defines a guest native as global `name` and returns a rooted host proxy for it.
fn guest_function(
  context: &mut Context,
  name: &str,
  call: NativeCallFn,
) -> Result<HostValue, BridgeError> {
  let global = context.guest().global_object();
  let func = context.guest_mut().new_function(name.as_bytes(), call, &[])?;
  context
    .guest_mut()
    .define(global, name.as_bytes(), Value::Object(func))?;
  let proxy = context.get_global(name)?;
  context.host_mut().add_root(proxy);
  Ok(proxy)
}

/// A host string rooted for the rest of the test.
fn host_str(context: &mut Context, bytes: &[u8]) -> Result<HostValue, BridgeError> {
  let s = context.host_mut().str_new(bytes)?;
  context.host_mut().add_root(s);
  Ok(s)
}

fn guest_bytes(rt: &GuestRuntime, value: Option<&Value>) -> Result<Vec<u8>, VmError> {
  match value {
    Some(Value::String(s)) => Ok(rt.string_bytes(*s)?.to_vec()),
    _ => Err(VmError::TypeError("expected a string")),
  }
}

/// `(obj, key) => obj[key]`
fn read_property(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  let Some(Value::Object(obj)) = args.first().copied() else {
    return Err(VmError::TypeError("expected an object"));
  };
  let key = guest_bytes(rt, args.get(1))?;
  rt.get(host, obj, &key)
}

/// `(obj, key, value) => { obj[key] = value }`
fn write_property(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  let Some(Value::Object(obj)) = args.first().copied() else {
    return Err(VmError::TypeError("expected an object"));
  };
  let key = guest_bytes(rt, args.get(1))?;
  let value = args.get(2).copied().unwrap_or(Value::Undefined);
  rt.set(host, obj, &key, value)?;
  Ok(Value::Undefined)
}

/// `(f, ...args) => f(...args)`
fn apply(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  let Some((f, rest)) = args.split_first() else {
    return Err(VmError::NotCallable);
  };
  rt.call_function(host, *f, Value::Undefined, rest)
}

/// `(value) => String(value)`
fn stringify(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  let value = args.first().copied().unwrap_or(Value::Undefined);
  Ok(Value::String(rt.to_string(host, value)?))
}

/// `(name) => "hi " + name`
fn greet(
  rt: &mut GuestRuntime,
  _host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  let mut text = b"hi ".to_vec();
  text.extend_from_slice(&guest_bytes(rt, args.first())?);
  Ok(Value::String(rt.scope().alloc_string(&text)?))
}

fn add_one(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  _captures: &[HostValue],
  args: &[HostValue],
) -> Result<HostValue, Unwind> {
  match args {
    [HostValue::Fixnum(n)] => Ok(HostValue::Fixnum(n + 1)),
    _ => {
      let class = rt.builtins().argument_error;
      Err(rt.raise_new(class, b"expected one integer"))
    }
  }
}

#[test]
fn host_values_keep_one_proxy() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let array = context.host_mut().array_new(&[HostValue::Fixnum(1)])?;
  context.host_mut().add_root(array);

  let first = context.to_guest(array)?;
  let root = context.guest_mut().add_root(first);
  let second = context.to_guest(array)?;
  assert_eq!(first, second);
  assert!(context.cx().is_guest_proxy(first));
  assert_eq!(
    context.proxy_count(),
    ProxyCount {
      in_guest: 1,
      in_host: 0
    }
  );

  // Crossing back yields the original, not a proxy of a proxy.
  assert_eq!(context.to_host(first)?, array);
  assert_eq!(context.proxy_count().in_host, 0);
  context.guest_mut().remove_root(root);
  Ok(())
}

#[test]
fn every_live_object_kind_is_proxied() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let stringify = guest_function(&mut context, "stringify", stringify)?;

  let widget = context.host_mut().define_class(b"Widget", None)?;
  context.host_mut().add_root(HostValue::Ref(widget));
  let helpers = context.host_mut().define_module(b"Helpers")?;
  context.host_mut().add_root(HostValue::Ref(helpers));
  let struct_class = context.host().builtins().struct_class;
  let pair = context.host_mut().define_class(b"Pair", Some(struct_class))?;
  context.host_mut().add_root(HostValue::Ref(pair));
  let left = context.host_mut().intern(b"left");

  let array = context.host_mut().array_new(&[HostValue::Fixnum(1)])?;
  context.host_mut().add_root(array);
  let hash = context.host_mut().hash_new()?;
  context.host_mut().add_root(hash);
  let pair_value = context
    .host_mut()
    .struct_new(pair, &[(left, HostValue::Fixnum(1))])?;
  context.host_mut().add_root(pair_value);
  let file = context.host_mut().file_new(b"/tmp/data.txt")?;
  context.host_mut().add_root(file);
  let object = context.host_mut().object_new(widget)?;
  context.host_mut().add_root(object);
  let opaque = context.host_mut().opaque_new(widget, 7)?;
  context.host_mut().add_root(opaque);
  let proc = context.host_mut().proc_new(add_one, &[])?;
  context.host_mut().add_root(proc);

  let values = [
    (HostValue::Ref(widget), HostKind::Class),
    (HostValue::Ref(helpers), HostKind::Module),
    (array, HostKind::Array),
    (hash, HostKind::Hash),
    (pair_value, HostKind::Struct),
    (file, HostKind::File),
    (object, HostKind::Object),
    (opaque, HostKind::Data),
    (proc, HostKind::Data),
  ];
  for (value, kind) in values {
    assert_eq!(context.host().kind(value)?, kind);
    let wrapper = context.to_guest(value)?;
    let root = context.guest_mut().add_root(wrapper);
    assert!(context.cx().is_guest_proxy(wrapper), "{kind:?} was not proxied");
    let expected = if value == proc {
      TypeOf::Function
    } else {
      TypeOf::Object
    };
    assert_eq!(context.guest().type_of(wrapper), expected, "{kind:?}");
    assert_eq!(context.to_guest(value)?, wrapper, "{kind:?} was proxied twice");
    assert_eq!(context.to_host(wrapper)?, value, "{kind:?} did not unwrap");
    context.guest_mut().remove_root(root);
  }
  assert_eq!(context.proxy_count().in_guest, 9);
  assert_eq!(context.proxy_count().in_host, 1);

  let text = context.call(stringify, &[file]).expect("stringify file");
  assert_eq!(context.host().string_bytes(text)?, b"#<File:/tmp/data.txt>");
  let text = context.call(stringify, &[opaque]).expect("stringify opaque");
  assert_eq!(context.host().string_bytes(text)?, b"#<Widget:0x7>");
  assert_eq!(context.root_set_len(), 0);
  Ok(())
}

#[test]
fn guest_objects_keep_one_proxy() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let global = context.guest().global_object();
  let obj = context.guest_mut().new_object()?;
  context.guest_mut().define(global, b"thing", Value::Object(obj))?;

  let first = context.to_host(Value::Object(obj))?;
  context.host_mut().add_root(first);
  assert_eq!(context.host().kind(first)?, HostKind::Data);
  assert_eq!(context.to_host(Value::Object(obj))?, first);
  assert_eq!(context.cx().unwrap_host_proxy(first), Some(obj));

  assert_eq!(context.to_guest(first)?, Value::Object(obj));
  assert_eq!(context.proxy_count().in_guest, 0);
  Ok(())
}

#[test]
fn guest_code_reads_host_containers() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let read = guest_function(&mut context, "read", read_property)?;

  let hash = context.host_mut().hash_new()?;
  context.host_mut().add_root(hash);
  let key = host_str(&mut context, b"name")?;
  let value = host_str(&mut context, b"host")?;
  context.host_mut().hash_set(hash, key, value)?;
  let sym = HostValue::Symbol(context.host_mut().intern(b"answer"));
  context.host_mut().hash_set(hash, sym, HostValue::Fixnum(42))?;

  let name = context.host_mut().str_new(b"name")?;
  let got = context.call(read, &[hash, name]).expect("read name");
  assert_eq!(context.host().string_bytes(got)?, b"host");

  let answer = context.host_mut().str_new(b"answer")?;
  let got = context.call(read, &[hash, answer]).expect("read answer");
  assert_eq!(got, HostValue::Fixnum(42));

  let missing = context.host_mut().str_new(b"missing")?;
  let got = context.call(read, &[hash, missing]).expect("read missing");
  assert_eq!(got, HostValue::Nil);

  let array = context
    .host_mut()
    .array_new(&[HostValue::Fixnum(10), HostValue::Fixnum(20)])?;
  context.host_mut().add_root(array);
  let length = context.host_mut().str_new(b"length")?;
  assert_eq!(
    context.call(read, &[array, length]).expect("length"),
    HostValue::Fixnum(2)
  );
  let index = context.host_mut().str_new(b"1")?;
  assert_eq!(
    context.call(read, &[array, index]).expect("index"),
    HostValue::Fixnum(20)
  );

  assert_eq!(context.root_set_len(), 0);
  Ok(())
}

#[test]
fn guest_code_writes_host_objects() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let write = guest_function(&mut context, "write", write_property)?;

  let hash = context.host_mut().hash_new()?;
  context.host_mut().add_root(hash);
  let key = host_str(&mut context, b"k")?;
  context
    .call(write, &[hash, key, HostValue::Fixnum(7)])
    .expect("hash write");
  assert_eq!(context.host().hash_get(hash, key)?, Some(HostValue::Fixnum(7)));

  let x = context.host_mut().intern(b"x");
  let point_class = context.host().builtins().struct_class;
  let point = context
    .host_mut()
    .struct_new(point_class, &[(x, HostValue::Fixnum(1))])?;
  context.host_mut().add_root(point);
  let field = context.host_mut().str_new(b"x")?;
  context
    .call(write, &[point, field, HostValue::Fixnum(5)])
    .expect("struct write");
  assert_eq!(context.host().struct_get(point, x)?, Some(HostValue::Fixnum(5)));
  Ok(())
}

#[test]
fn host_procs_are_callable_from_the_guest() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let apply = guest_function(&mut context, "apply", apply)?;
  let proc = context.host_mut().proc_new(add_one, &[])?;
  context.host_mut().add_root(proc);

  let guest_proc = context.to_guest(proc)?;
  assert!(context.guest().heap().is_callable(guest_proc));

  let result = context
    .call(apply, &[proc, HostValue::Fixnum(20)])
    .expect("call through the guest");
  assert_eq!(result, HostValue::Fixnum(21));
  Ok(())
}

#[test]
fn guest_code_stringifies_host_values() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let stringify = guest_function(&mut context, "stringify", stringify)?;
  let x = context.host_mut().intern(b"x");
  let struct_class = context.host().builtins().struct_class;
  let point_class = context
    .host_mut()
    .define_class(b"Point", Some(struct_class))?;
  let point = context
    .host_mut()
    .struct_new(point_class, &[(x, HostValue::Fixnum(5))])?;
  context.host_mut().add_root(point);

  let text = context.call(stringify, &[point]).expect("stringify");
  assert_eq!(context.host().string_bytes(text)?, b"#<struct Point x=5>");
  Ok(())
}

#[test]
fn host_code_calls_guest_methods() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let global = context.guest().global_object();
  let obj = context.guest_mut().new_object()?;
  context.guest_mut().define(global, b"greeter", Value::Object(obj))?;
  let func = context.guest_mut().new_function(b"greet", greet, &[])?;
  context.guest_mut().define(obj, b"greet", Value::Object(func))?;

  let greeter = context.get_global("greeter")?;
  context.host_mut().add_root(greeter);
  assert!(context.cx().is_host_proxy(greeter));

  let bob = context.host_mut().str_new(b"bob")?;
  let greeting = context.send(greeter, b"greet", &[bob]).expect("greet");
  assert_eq!(context.host().string_bytes(greeting)?, b"hi bob");

  // Writers, readers and the index operators go to properties.
  let text = context.host_mut().str_new(b"host")?;
  context.send(greeter, b"name=", &[text]).expect("write");
  let name = context.send(greeter, b"name", &[]).expect("read");
  assert_eq!(context.host().string_bytes(name)?, b"host");
  let key = host_str(&mut context, b"name")?;
  let name = context.send(greeter, b"[]", &[key]).expect("index");
  assert_eq!(context.host().string_bytes(name)?, b"host");

  let text = context.send(greeter, b"to_s", &[]).expect("to_s");
  assert_eq!(context.host().string_bytes(text)?, b"[object Object]");

  // A plain property cannot take arguments.
  let err = context
    .send(greeter, b"name", &[HostValue::Fixnum(1)])
    .unwrap_err();
  assert_eq!(err, Unwind::Raise);
  let exc = context.host_mut().take_errinfo().expect("errinfo");
  let no_method_error = context.host().builtins().no_method_error;
  assert!(context.host().is_kind_of(exc, no_method_error)?);
  assert_eq!(
    context.host().exception_message(exc)?,
    b"undefined method `name' for guest object"
  );
  assert_eq!(context.root_set_len(), 0);
  Ok(())
}

#[test]
fn missing_guest_properties_raise_no_method_error() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let global = context.guest().global_object();
  let obj = context.guest_mut().new_object()?;
  context.guest_mut().define(global, b"box", Value::Object(obj))?;
  context.guest_mut().define(obj, b"empty", Value::Undefined)?;
  let boxed = context.get_global("box")?;
  context.host_mut().add_root(boxed);
  let no_method_error = context.host().builtins().no_method_error;

  // Present but undefined reads as nil.
  assert_eq!(context.send(boxed, b"empty", &[]), Ok(HostValue::Nil));

  assert_eq!(
    context.send(boxed, b"no_such_property", &[]),
    Err(Unwind::Raise)
  );
  let exc = context.host_mut().take_errinfo().expect("errinfo");
  assert!(context.host().is_kind_of(exc, no_method_error)?);
  assert_eq!(
    context.host().exception_message(exc)?,
    b"undefined method `no_such_property' for guest object"
  );

  // `size` reads `length`, which this object lacks.
  assert_eq!(context.send(boxed, b"size", &[]), Err(Unwind::Raise));
  let exc = context.host_mut().take_errinfo().expect("errinfo");
  assert_eq!(
    context.host().exception_message(exc)?,
    b"undefined method `size' for guest object"
  );
  context.guest_mut().define(obj, b"length", Value::Int(3))?;
  assert_eq!(context.send(boxed, b"size", &[]), Ok(HostValue::Fixnum(3)));
  assert_eq!(context.root_set_len(), 0);
  Ok(())
}

#[test]
fn guest_functions_convert_to_procs() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let greet = guest_function(&mut context, "greet", greet)?;
  let proc = context.send(greet, b"to_proc", &[]).expect("to_proc");
  context.host_mut().add_root(proc);
  assert_eq!(context.host().kind(proc)?, HostKind::Data);
  assert!(!context.cx().is_host_proxy(proc));

  let bob = host_str(&mut context, b"bob")?;
  let greeting = context.send(proc, b"call", &[bob]).expect("call");
  assert_eq!(context.host().string_bytes(greeting)?, b"hi bob");
  Ok(())
}

#[test]
fn guest_functions_are_called_through_call() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let greet = guest_function(&mut context, "greet", greet)?;
  let bob = context.host_mut().str_new(b"bob")?;
  let greeting = context.send(greet, b"call", &[bob]).expect("call");
  assert_eq!(context.host().string_bytes(greeting)?, b"hi bob");
  Ok(())
}

#[test]
fn sweep_releases_collected_proxies() -> Result<(), BridgeError> {
  let mut context = stress_context();

  let array = context.host_mut().array_new(&[])?;
  let weak_array = WeakHostRef::new(match array {
    HostValue::Ref(r) => r,
    _ => unreachable!(),
  });
  let root = context.host_mut().add_root(array);
  context.to_guest(array)?;
  context.host_mut().remove_root(root);
  assert_eq!(context.proxy_count().in_guest, 1);

  // The proxy kept the array alive until its wrapper went away.
  assert_eq!(context.collect_garbage(), 1);
  assert_eq!(context.proxy_count(), ProxyCount::default());
  context.host_mut().collect_garbage();
  assert!(weak_array.upgrade(context.host().heap()).is_none());

  let global = context.guest().global_object();
  let obj = context.guest_mut().new_object()?;
  context.guest_mut().define(global, b"kept", Value::Object(obj))?;
  context.to_host(Value::Object(obj))?;
  assert_eq!(context.proxy_count().in_host, 1);
  assert_eq!(context.collect_garbage(), 1);
  assert_eq!(context.proxy_count(), ProxyCount::default());
  assert_eq!(context.sweep(), 0);
  Ok(())
}

#[test]
fn wrapping_again_after_collection_makes_a_new_proxy() -> Result<(), BridgeError> {
  let mut context = stress_context();
  let hash = context.host_mut().hash_new()?;
  context.host_mut().add_root(hash);

  context.to_guest(hash)?;
  context.guest_mut().collect_garbage();
  // Not swept yet: the stale entry is replaced.
  let proxy = context.to_guest(hash)?;
  assert!(context.cx().is_guest_proxy(proxy));
  assert_eq!(context.proxy_count().in_guest, 1);
  assert_eq!(context.to_host(proxy)?, hash);
  Ok(())
}
