use crate::object::{ClassData, HostObject};
use crate::{Heap, HostError, HostHooks, HostRef, HostRuntime, HostValue, Unwind};
use ahash::AHashMap;

/// The builtin classes. All of them are persistently rooted and bound as global constants.
#[derive(Debug, Clone)]
pub struct Builtins {
  pub object: HostRef,
  pub module: HostRef,
  pub class: HostRef,
  pub nil_class: HostRef,
  pub true_class: HostRef,
  pub false_class: HostRef,
  pub integer: HostRef,
  pub float: HostRef,
  pub string: HostRef,
  pub symbol: HostRef,
  pub regexp: HostRef,
  pub array: HostRef,
  pub hash: HostRef,
  pub proc_class: HostRef,
  pub file: HostRef,
  pub struct_class: HostRef,
  pub data: HostRef,
  pub exception: HostRef,
  pub no_memory_error: HostRef,
  pub system_stack_error: HostRef,
  pub standard_error: HostRef,
  pub runtime_error: HostRef,
  pub type_error: HostRef,
  pub argument_error: HostRef,
  pub name_error: HostRef,
  pub no_method_error: HostRef,
  pub uncaught_throw_error: HostRef,
}

impl Builtins {
  pub(crate) fn allocate(heap: &mut Heap) -> Result<Self, HostError> {
    let mut class = |name: &[u8], superclass: Option<HostRef>| -> Result<HostRef, HostError> {
      let r = heap.alloc(HostObject::Class(ClassData {
        name: name.into(),
        superclass,
        methods: AHashMap::new(),
        is_module: false,
      }))?;
      heap.add_root(HostValue::Ref(r));
      Ok(r)
    };

    let object = class(b"Object", None)?;
    let module = class(b"Module", Some(object))?;
    let exception = class(b"Exception", Some(object))?;
    let standard_error = class(b"StandardError", Some(exception))?;
    let argument_error = class(b"ArgumentError", Some(standard_error))?;
    let name_error = class(b"NameError", Some(standard_error))?;
    Ok(Self {
      object,
      module,
      class: class(b"Class", Some(module))?,
      nil_class: class(b"NilClass", Some(object))?,
      true_class: class(b"TrueClass", Some(object))?,
      false_class: class(b"FalseClass", Some(object))?,
      integer: class(b"Integer", Some(object))?,
      float: class(b"Float", Some(object))?,
      string: class(b"String", Some(object))?,
      symbol: class(b"Symbol", Some(object))?,
      regexp: class(b"Regexp", Some(object))?,
      array: class(b"Array", Some(object))?,
      hash: class(b"Hash", Some(object))?,
      proc_class: class(b"Proc", Some(object))?,
      file: class(b"File", Some(object))?,
      struct_class: class(b"Struct", Some(object))?,
      data: class(b"Data", Some(object))?,
      exception,
      no_memory_error: class(b"NoMemoryError", Some(exception))?,
      system_stack_error: class(b"SystemStackError", Some(exception))?,
      standard_error,
      runtime_error: class(b"RuntimeError", Some(standard_error))?,
      type_error: class(b"TypeError", Some(standard_error))?,
      argument_error,
      name_error,
      no_method_error: class(b"NoMethodError", Some(name_error))?,
      uncaught_throw_error: class(b"UncaughtThrowError", Some(argument_error))?,
    })
  }

  fn all(&self) -> [HostRef; 27] {
    [
      self.object,
      self.module,
      self.class,
      self.nil_class,
      self.true_class,
      self.false_class,
      self.integer,
      self.float,
      self.string,
      self.symbol,
      self.regexp,
      self.array,
      self.hash,
      self.proc_class,
      self.file,
      self.struct_class,
      self.data,
      self.exception,
      self.no_memory_error,
      self.system_stack_error,
      self.standard_error,
      self.runtime_error,
      self.type_error,
      self.argument_error,
      self.name_error,
      self.no_method_error,
      self.uncaught_throw_error,
    ]
  }
}

/// Binds the builtin classes as constants and defines their methods.
pub(crate) fn install(rt: &mut HostRuntime) -> Result<(), HostError> {
  for class in rt.builtins.all() {
    let name = rt.class_name(class)?.to_vec();
    rt.set_global(&name, HostValue::Ref(class))?;
  }

  let b = rt.builtins.clone();
  let methods: [(HostRef, &[u8], crate::HostMethod); 24] = [
    (b.object, b"to_s", object_to_s),
    (b.object, b"inspect", object_inspect),
    (b.object, b"==", object_eq),
    (b.object, b"nil?", object_is_nil),
    (b.object, b"respond_to?", object_respond_to),
    (b.symbol, b"to_s", object_to_s),
    (b.integer, b"to_s", object_to_s),
    (b.float, b"to_s", object_to_s),
    (b.string, b"length", string_length),
    (b.array, b"length", array_length),
    (b.array, b"size", array_length),
    (b.array, b"[]", array_aref),
    (b.array, b"[]=", array_aset),
    (b.array, b"push", array_push),
    (b.hash, b"[]", hash_aref),
    (b.hash, b"[]=", hash_aset),
    (b.hash, b"size", hash_size),
    (b.regexp, b"source", regexp_source),
    (b.regexp, b"options", regexp_options),
    (b.proc_class, b"call", proc_call),
    (b.file, b"path", file_path),
    (b.exception, b"message", exception_message),
    (b.uncaught_throw_error, b"tag", uncaught_throw_tag),
    (b.uncaught_throw_error, b"value", uncaught_throw_value),
  ];
  for (class, name, method) in methods {
    rt.define_method(class, name, method)?;
  }
  rt.define_method(b.exception, b"to_s", exception_message)?;
  Ok(())
}

fn arity(rt: &mut HostRuntime, args: &[HostValue], expected: usize) -> Result<(), Unwind> {
  if args.len() == expected {
    return Ok(());
  }
  let message = format!(
    "wrong number of arguments (given {}, expected {expected})",
    args.len()
  );
  let class = rt.builtins.argument_error;
  Err(rt.raise_new(class, message.as_bytes()))
}

fn type_error(rt: &mut HostRuntime, err: HostError) -> Unwind {
  match err {
    HostError::TypeMismatch { .. } => {
      let class = rt.builtins.type_error;
      rt.raise_new(class, err.to_string().as_bytes())
    }
    other => Unwind::Fatal(other),
  }
}

fn object_to_s(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  let bytes = rt.to_s(recv)?;
  Ok(rt.str_new(&bytes)?)
}

fn object_inspect(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  let bytes = rt.inspect(recv)?;
  Ok(rt.str_new(&bytes)?)
}

fn object_eq(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  args: &[HostValue],
) -> Result<HostValue, Unwind> {
  arity(rt, args, 1)?;
  Ok(HostValue::from_bool(rt.eql(recv, args[0])))
}

fn object_is_nil(
  _rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  Ok(HostValue::from_bool(recv == HostValue::Nil))
}

fn object_respond_to(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  args: &[HostValue],
) -> Result<HostValue, Unwind> {
  arity(rt, args, 1)?;
  let name = match args[0] {
    HostValue::Symbol(sym) => sym,
    other => {
      let bytes = rt.to_s(other)?;
      rt.intern(&bytes)
    }
  };
  Ok(HostValue::from_bool(rt.respond_to(recv, name)?))
}

fn string_length(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  Ok(HostValue::Fixnum(rt.string_bytes(recv)?.len() as i64))
}

fn array_length(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  Ok(HostValue::Fixnum(rt.array_len(recv)? as i64))
}

fn array_aref(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  args: &[HostValue],
) -> Result<HostValue, Unwind> {
  arity(rt, args, 1)?;
  let HostValue::Fixnum(index) = args[0] else {
    let class = rt.builtins.type_error;
    return Err(rt.raise_new(class, b"no implicit conversion into Integer"));
  };
  Ok(rt.array_get(recv, index)?)
}

fn array_aset(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  args: &[HostValue],
) -> Result<HostValue, Unwind> {
  arity(rt, args, 2)?;
  let HostValue::Fixnum(index) = args[0] else {
    let class = rt.builtins.type_error;
    return Err(rt.raise_new(class, b"no implicit conversion into Integer"));
  };
  rt.array_set(recv, index, args[1])
    .map_err(|err| type_error(rt, err))?;
  Ok(args[1])
}

fn array_push(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  args: &[HostValue],
) -> Result<HostValue, Unwind> {
  for arg in args {
    rt.array_push(recv, *arg)?;
  }
  Ok(recv)
}

fn hash_aref(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  args: &[HostValue],
) -> Result<HostValue, Unwind> {
  arity(rt, args, 1)?;
  Ok(rt.hash_get(recv, args[0])?.unwrap_or(HostValue::Nil))
}

fn hash_aset(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  args: &[HostValue],
) -> Result<HostValue, Unwind> {
  arity(rt, args, 2)?;
  rt.hash_set(recv, args[0], args[1])?;
  Ok(args[1])
}

fn hash_size(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  Ok(HostValue::Fixnum(rt.hash_len(recv)? as i64))
}

fn regexp_source(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  let source = rt.regexp_parts(recv)?.0.to_vec();
  Ok(rt.str_new(&source)?)
}

fn regexp_options(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  Ok(HostValue::Fixnum(rt.regexp_parts(recv)?.1 as i64))
}

fn proc_call(
  rt: &mut HostRuntime,
  hooks: &mut dyn HostHooks,
  recv: HostValue,
  args: &[HostValue],
) -> Result<HostValue, Unwind> {
  let (func, captures) = rt.proc_parts(recv)?;
  func(rt, hooks, &captures, args)
}

fn file_path(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  let path = rt.file_path(recv)?.to_vec();
  Ok(rt.str_new(&path)?)
}

fn exception_message(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  let message = rt.exception_message(recv)?;
  Ok(rt.str_new(&message)?)
}

fn uncaught_throw_tag(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  let ivar = rt.intern(b"@tag");
  Ok(rt.ivar_get(recv, ivar)?)
}

fn uncaught_throw_value(
  rt: &mut HostRuntime,
  _hooks: &mut dyn HostHooks,
  recv: HostValue,
  _args: &[HostValue],
) -> Result<HostValue, Unwind> {
  let ivar = rt.intern(b"@value");
  Ok(rt.ivar_get(recv, ivar)?)
}
