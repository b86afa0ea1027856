use crate::regexp::RegExpFlags;
use crate::{GcObject, GuestRuntime, Heap, RootId, Scope, Value, VmError, VmHost};

/// The realm's global object and the intrinsics the runtime itself relies on.
///
/// Every intrinsic is held alive through a persistent root registered with the [`Heap`]. Call
/// [`Realm::teardown`] to unregister them when the heap outlives the realm.
#[derive(Debug)]
pub struct Realm {
  global_object: GcObject,
  object_prototype: GcObject,
  function_prototype: GcObject,
  error_prototype: GcObject,
  error_constructor: GcObject,
  regexp_prototype: GcObject,
  regexp_constructor: GcObject,
  roots: Vec<RootId>,
}

impl Realm {
  /// Creates a new realm on `heap`.
  pub fn new(heap: &mut Heap) -> Result<Self, VmError> {
    let mut roots = Vec::new();
    match Self::init(heap, &mut roots) {
      Ok(realm) => Ok(realm),
      Err(err) => {
        // Avoid leaking persistent roots when realm initialization fails.
        for root in roots.drain(..) {
          heap.remove_root(root);
        }
        Err(err)
      }
    }
  }

  fn init(heap: &mut Heap, roots: &mut Vec<RootId>) -> Result<Self, VmError> {
    let mut scope = heap.scope();
    let mut root = |scope: &mut Scope<'_>, obj: GcObject| -> GcObject {
      roots.push(scope.heap_mut().add_root(Value::Object(obj)));
      obj
    };

    let object_prototype = scope.alloc_object()?;
    let object_prototype = root(&mut scope, object_prototype);
    let function_prototype = scope.alloc_object_with_prototype(Some(object_prototype))?;
    let function_prototype = root(&mut scope, function_prototype);
    let global_object = scope.alloc_object_with_prototype(Some(object_prototype))?;
    let global_object = root(&mut scope, global_object);

    let error_prototype = scope.alloc_object_with_prototype(Some(object_prototype))?;
    let error_prototype = root(&mut scope, error_prototype);
    let error_constructor =
      scope.alloc_native_function(Some(function_prototype), b"Error", error_call, &[])?;
    let error_constructor = root(&mut scope, error_constructor);

    let regexp_prototype = scope.alloc_object_with_prototype(Some(object_prototype))?;
    let regexp_prototype = root(&mut scope, regexp_prototype);
    let regexp_constructor =
      scope.alloc_native_function(Some(function_prototype), b"RegExp", regexp_call, &[])?;
    let regexp_constructor = root(&mut scope, regexp_constructor);

    let object_to_string = scope.alloc_native_function(
      Some(function_prototype),
      b"toString",
      object_prototype_to_string,
      &[],
    )?;
    scope.define_property(object_prototype, b"toString", Value::Object(object_to_string))?;

    let error_to_string = scope.alloc_native_function(
      Some(function_prototype),
      b"toString",
      error_prototype_to_string,
      &[],
    )?;
    scope.define_property(error_prototype, b"toString", Value::Object(error_to_string))?;
    let name = scope.alloc_string(b"Error")?;
    scope.define_property(error_prototype, b"name", Value::String(name))?;
    let empty = scope.alloc_string(b"")?;
    scope.define_property(error_prototype, b"message", Value::String(empty))?;

    for (ctor, proto) in [
      (error_constructor, error_prototype),
      (regexp_constructor, regexp_prototype),
    ] {
      scope.define_property(ctor, b"prototype", Value::Object(proto))?;
      scope.define_property(proto, b"constructor", Value::Object(ctor))?;
    }

    scope.define_property(global_object, b"globalThis", Value::Object(global_object))?;
    scope.define_property(global_object, b"Error", Value::Object(error_constructor))?;
    scope.define_property(global_object, b"RegExp", Value::Object(regexp_constructor))?;

    Ok(Self {
      global_object,
      object_prototype,
      function_prototype,
      error_prototype,
      error_constructor,
      regexp_prototype,
      regexp_constructor,
      roots: std::mem::take(roots),
    })
  }

  pub fn global_object(&self) -> GcObject {
    self.global_object
  }

  pub fn object_prototype(&self) -> GcObject {
    self.object_prototype
  }

  pub fn function_prototype(&self) -> GcObject {
    self.function_prototype
  }

  pub fn error_prototype(&self) -> GcObject {
    self.error_prototype
  }

  pub fn error_constructor(&self) -> GcObject {
    self.error_constructor
  }

  pub fn regexp_prototype(&self) -> GcObject {
    self.regexp_prototype
  }

  pub fn regexp_constructor(&self) -> GcObject {
    self.regexp_constructor
  }

  /// Unregisters the realm's persistent roots.
  pub fn teardown(&mut self, heap: &mut Heap) {
    for root in self.roots.drain(..) {
      heap.remove_root(root);
    }
  }
}

fn error_call(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  let message = match args.first().copied() {
    None | Some(Value::Undefined) => Vec::new(),
    Some(v) => {
      let s = rt.to_string(host, v)?;
      rt.heap().get_string(s)?.as_bytes().to_vec()
    }
  };
  Ok(Value::Object(rt.new_error(&message)?))
}

fn error_prototype_to_string(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  this: Value,
  _args: &[Value],
) -> Result<Value, VmError> {
  let Value::Object(this) = this else {
    return Err(VmError::TypeError("Error.prototype.toString called on non-object"));
  };
  let mut out = Vec::new();
  let name = rt.get(host, this, b"name")?;
  match name {
    Value::Undefined => out.extend_from_slice(b"Error"),
    other => {
      let s = rt.to_string(host, other)?;
      out.extend_from_slice(rt.heap().get_string(s)?.as_bytes());
    }
  }
  let message = rt.get(host, this, b"message")?;
  if message != Value::Undefined {
    let s = rt.to_string(host, message)?;
    let message = rt.heap().get_string(s)?.as_bytes();
    if !message.is_empty() {
      if !out.is_empty() {
        out.extend_from_slice(b": ");
      }
      out.extend_from_slice(message);
    }
  }
  let mut scope = rt.scope();
  Ok(Value::String(scope.alloc_string(&out)?))
}

fn object_prototype_to_string(
  rt: &mut GuestRuntime,
  _host: &mut dyn VmHost,
  _callee: GcObject,
  this: Value,
  _args: &[Value],
) -> Result<Value, VmError> {
  let tag: &[u8] = match this {
    Value::Undefined => b"[object Undefined]",
    Value::Null => b"[object Null]",
    Value::Object(obj) if rt.is_regexp(Value::Object(obj)) => b"[object RegExp]",
    Value::Object(obj) if rt.heap().is_callable(Value::Object(obj)) => b"[object Function]",
    _ => b"[object Object]",
  };
  let mut scope = rt.scope();
  Ok(Value::String(scope.alloc_string(tag)?))
}

fn regexp_call(
  rt: &mut GuestRuntime,
  host: &mut dyn VmHost,
  _callee: GcObject,
  _this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  let source = match args.first().copied() {
    None | Some(Value::Undefined) => b"(?:)".to_vec(),
    Some(v) => {
      let s = rt.to_string(host, v)?;
      rt.heap().get_string(s)?.as_bytes().to_vec()
    }
  };
  let flags = match args.get(1).copied() {
    None | Some(Value::Undefined) => RegExpFlags::default(),
    Some(v) => {
      let s = rt.to_string(host, v)?;
      RegExpFlags::parse(rt.heap().get_string(s)?.as_bytes())?
    }
  };
  Ok(Value::Object(rt.new_regexp(&source, flags.bits())?))
}
