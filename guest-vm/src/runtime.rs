use crate::heap::MAX_PROTOTYPE_CHAIN;
use crate::native::NativeCallFn;
use crate::object::ObjectKind;
use crate::regexp::{self, RegExpFlags};
use crate::{
  GcObject, GcString, Heap, HeapLimits, HostSlots, Realm, RootId, Scope, TypeOf, Value, VmError,
  VmHost,
};

/// Maximum nesting of [`GuestRuntime::call_function`] before [`VmError::StackOverflow`].
pub const MAX_CALL_DEPTH: usize = 256;

/// A guest runtime instance: one heap plus one realm.
///
/// This is the embedding surface used by `vm-bridge`. All operations that may run native code
/// take a `&mut dyn VmHost` so host objects encountered along the way can be serviced.
pub struct GuestRuntime {
  heap: Heap,
  realm: Realm,
  call_depth: usize,
}

enum CallTarget {
  Native(NativeCallFn),
  Host(HostSlots),
}

impl GuestRuntime {
  pub fn new(limits: HeapLimits) -> Result<Self, VmError> {
    let mut heap = Heap::new(limits);
    let realm = Realm::new(&mut heap)?;
    Ok(Self {
      heap,
      realm,
      call_depth: 0,
    })
  }

  #[inline]
  pub fn heap(&self) -> &Heap {
    &self.heap
  }

  #[inline]
  pub fn heap_mut(&mut self) -> &mut Heap {
    &mut self.heap
  }

  /// Enters a stack-rooting scope on this runtime's heap.
  pub fn scope(&mut self) -> Scope<'_> {
    self.heap.scope()
  }

  pub fn realm(&self) -> &Realm {
    &self.realm
  }

  pub fn global_object(&self) -> GcObject {
    self.realm.global_object()
  }

  pub fn add_root(&mut self, value: Value) -> RootId {
    self.heap.add_root(value)
  }

  pub fn remove_root(&mut self, id: RootId) {
    self.heap.remove_root(id)
  }

  pub fn collect_garbage(&mut self) {
    self.heap.collect_garbage()
  }

  pub fn host_slots(&self, obj: GcObject) -> Result<Option<HostSlots>, VmError> {
    self.heap.host_slots(obj)
  }

  pub fn take_finalized_host_slots(&mut self) -> Vec<HostSlots> {
    self.heap.take_finalized_host_slots()
  }

  /// Current native call nesting.
  pub fn call_depth(&self) -> usize {
    self.call_depth
  }

  pub fn type_of(&self, value: Value) -> TypeOf {
    match value {
      Value::Undefined => TypeOf::Undefined,
      Value::Null => TypeOf::Object,
      Value::Bool(_) => TypeOf::Boolean,
      Value::Int(_) | Value::Number(_) => TypeOf::Number,
      Value::String(_) => TypeOf::String,
      Value::Object(_) if self.heap.is_callable(value) => TypeOf::Function,
      Value::Object(_) => TypeOf::Object,
    }
  }

  /// Runs `f` with `roots` pushed onto the stack root set.
  fn with_roots<R>(&mut self, roots: &[Value], f: impl FnOnce(&mut Self) -> R) -> R {
    let len = self.heap.root_stack.len();
    self.heap.root_stack.extend_from_slice(roots);
    let out = f(self);
    self.heap.root_stack.truncate(len);
    out
  }

  /// `obj.[[Get]](key)`, walking the prototype chain.
  ///
  /// Host objects (including host objects found on the prototype chain) answer through
  /// [`VmHost::host_get`].
  pub fn get(&mut self, host: &mut dyn VmHost, obj: GcObject, key: &[u8]) -> Result<Value, VmError> {
    let mut current = Some(obj);
    let mut steps = 0usize;
    while let Some(o) = current {
      let (slots, found, proto) = {
        let js = self.heap.get_object(o)?;
        let found = js.find_property(key).map(|idx| js.properties[idx].value);
        (js.host_slots(), found, js.proto)
      };
      if let Some(slots) = slots {
        return self.with_roots(&[Value::Object(obj), Value::Object(o)], |rt| {
          host.host_get(rt, o, slots, key)
        });
      }
      if let Some(value) = found {
        return Ok(value);
      }
      if o == obj {
        if let Some(value) = self.regexp_own_property(o, key)? {
          return Ok(value);
        }
      }
      steps += 1;
      if steps > MAX_PROTOTYPE_CHAIN {
        return Err(VmError::PrototypeCycle);
      }
      current = proto;
    }
    Ok(Value::Undefined)
  }

  /// `HasProperty(obj, key)`: whether `key` is found on `obj` or its prototype chain.
  ///
  /// Host objects have no property table; they report a property when
  /// [`VmHost::host_get`] yields anything other than `undefined`.
  pub fn has_property(
    &mut self,
    host: &mut dyn VmHost,
    obj: GcObject,
    key: &[u8],
  ) -> Result<bool, VmError> {
    let mut current = Some(obj);
    let mut steps = 0usize;
    while let Some(o) = current {
      let (slots, found, is_regexp, proto) = {
        let js = self.heap.get_object(o)?;
        let is_regexp = matches!(js.kind, ObjectKind::RegExp(_));
        (js.host_slots(), js.find_property(key).is_some(), is_regexp, js.proto)
      };
      if let Some(slots) = slots {
        let value = self.with_roots(&[Value::Object(obj), Value::Object(o)], |rt| {
          host.host_get(rt, o, slots, key)
        })?;
        return Ok(!matches!(value, Value::Undefined));
      }
      if found || (o == obj && is_regexp && is_regexp_own_key(key)) {
        return Ok(true);
      }
      steps += 1;
      if steps > MAX_PROTOTYPE_CHAIN {
        return Err(VmError::PrototypeCycle);
      }
      current = proto;
    }
    Ok(false)
  }

  fn regexp_own_property(&mut self, obj: GcObject, key: &[u8]) -> Result<Option<Value>, VmError> {
    let (source, flags) = match &self.heap.get_object(obj)?.kind {
      ObjectKind::RegExp(re) => (re.source, re.flags),
      _ => return Ok(None),
    };
    let value = match key {
      b"source" => Value::String(source),
      b"flags" => {
        let mut scope = self.heap.scope();
        Value::String(scope.alloc_string(flags.to_string().as_bytes())?)
      }
      b"global" => Value::Bool(flags.contains(RegExpFlags::GLOBAL)),
      b"ignoreCase" => Value::Bool(flags.contains(RegExpFlags::FOLD)),
      b"multiline" => Value::Bool(flags.contains(RegExpFlags::MULTILINE)),
      b"sticky" => Value::Bool(flags.contains(RegExpFlags::STICKY)),
      _ => return Ok(None),
    };
    Ok(Some(value))
  }

  /// `obj.[[Set]](key, value)`.
  ///
  /// Ordinary objects get an own data property; host objects forward to [`VmHost::host_set`].
  pub fn set(
    &mut self,
    host: &mut dyn VmHost,
    obj: GcObject,
    key: &[u8],
    value: Value,
  ) -> Result<(), VmError> {
    match self.heap.host_slots(obj)? {
      Some(slots) => self.with_roots(&[Value::Object(obj), value], |rt| {
        host.host_set(rt, obj, slots, key, value)
      }),
      None => self.define(obj, key, value),
    }
  }

  /// Creates or overwrites an own data property without consulting host hooks.
  pub fn define(&mut self, obj: GcObject, key: &[u8], value: Value) -> Result<(), VmError> {
    let mut scope = self.heap.scope();
    scope.define_property(obj, key, value)
  }

  /// Calls `callee` with `this` and `args`.
  ///
  /// `callee`, `this` and `args` are rooted for the duration of the call. A [`VmError::Throw`]
  /// escaping the callee is moved into the pending exception slot and reported as
  /// [`VmError::ExceptionPending`].
  pub fn call_function(
    &mut self,
    host: &mut dyn VmHost,
    callee: Value,
    this: Value,
    args: &[Value],
  ) -> Result<Value, VmError> {
    let Value::Object(func) = callee else {
      return Err(VmError::NotCallable);
    };
    let target = match &self.heap.get_object(func)?.kind {
      ObjectKind::Function(f) => CallTarget::Native(f.call),
      ObjectKind::Host {
        slots,
        callable: true,
      } => CallTarget::Host(*slots),
      _ => return Err(VmError::NotCallable),
    };
    if self.call_depth >= MAX_CALL_DEPTH {
      return Err(VmError::StackOverflow);
    }

    let len = self.heap.root_stack.len();
    self.heap.root_stack.push(callee);
    self.heap.root_stack.push(this);
    self.heap.root_stack.extend_from_slice(args);
    self.call_depth += 1;

    let result = match target {
      CallTarget::Native(call) => call(self, host, func, this, args),
      CallTarget::Host(slots) => host.host_call(self, func, slots, this, args),
    };

    self.call_depth -= 1;
    self.heap.root_stack.truncate(len);

    match result {
      Err(VmError::Throw(value)) => {
        self.heap.pending_exception = Some(value);
        Err(VmError::ExceptionPending)
      }
      other => other,
    }
  }

  /// The value slots a native function was created with.
  pub fn function_slots(&self, callee: GcObject) -> Result<&[Value], VmError> {
    Ok(&self.heap.get_function(callee)?.slots[..])
  }

  pub fn function_name(&self, callee: GcObject) -> Result<&[u8], VmError> {
    Ok(&self.heap.get_function(callee)?.name[..])
  }

  /// Allocates an ordinary object inheriting from `Object.prototype`.
  pub fn new_object(&mut self) -> Result<GcObject, VmError> {
    let proto = self.realm.object_prototype();
    self.heap.scope().alloc_object_with_prototype(Some(proto))
  }

  /// Allocates a native function inheriting from `Function.prototype`.
  pub fn new_function(
    &mut self,
    name: &[u8],
    call: NativeCallFn,
    slots: &[Value],
  ) -> Result<GcObject, VmError> {
    let proto = self.realm.function_prototype();
    self
      .heap
      .scope()
      .alloc_native_function(Some(proto), name, call, slots)
  }

  pub fn new_host_object(&mut self, slots: HostSlots, callable: bool) -> Result<GcObject, VmError> {
    let proto = if callable {
      self.realm.function_prototype()
    } else {
      self.realm.object_prototype()
    };
    self
      .heap
      .scope()
      .alloc_host_object(Some(proto), slots, callable)
  }

  /// Allocates an `Error` instance with the given `message`.
  pub fn new_error(&mut self, message: &[u8]) -> Result<GcObject, VmError> {
    let proto = self.realm.error_prototype();
    let mut scope = self.heap.scope();
    let message = scope.alloc_string(message)?;
    scope.push_root(Value::String(message));
    let err = scope.alloc_object_with_prototype(Some(proto))?;
    scope.define_property(err, b"message", Value::String(message))?;
    Ok(err)
  }

  /// Allocates a RegExp object. `flags` is a raw [`RegExpFlags`] bit set and is stored unchanged.
  pub fn new_regexp(&mut self, source: &[u8], flags: u32) -> Result<GcObject, VmError> {
    let flags = RegExpFlags(flags);
    regexp::validate(source, flags)?;
    let proto = self.realm.regexp_prototype();
    let mut scope = self.heap.scope();
    let source = scope.alloc_string(source)?;
    scope.alloc_regexp(Some(proto), source, flags)
  }

  /// Brand check for RegExp objects.
  pub fn is_regexp(&self, value: Value) -> bool {
    match value {
      Value::Object(obj) => self.heap.get_regexp(obj).is_ok(),
      _ => false,
    }
  }

  /// The `(source, flags)` pair of a RegExp object.
  pub fn regexp_parts(&self, obj: GcObject) -> Result<(GcString, u32), VmError> {
    let re = self.heap.get_regexp(obj)?;
    Ok((re.source, re.flags.bits()))
  }

  /// `value instanceof ctor`.
  pub fn instance_of(
    &mut self,
    host: &mut dyn VmHost,
    value: Value,
    ctor: GcObject,
  ) -> Result<bool, VmError> {
    let Value::Object(obj) = value else {
      return Ok(false);
    };
    let proto = self.with_roots(&[value], |rt| rt.get(host, ctor, b"prototype"))?;
    let Value::Object(proto) = proto else {
      return Err(VmError::TypeError("instanceof target has no prototype object"));
    };
    let mut current = self.heap.object_prototype(obj)?;
    let mut steps = 0usize;
    while let Some(p) = current {
      if p == proto {
        return Ok(true);
      }
      steps += 1;
      if steps > MAX_PROTOTYPE_CHAIN {
        return Err(VmError::PrototypeCycle);
      }
      current = self.heap.object_prototype(p)?;
    }
    Ok(false)
  }

  /// `ToString(value)`.
  ///
  /// Objects are stringified through their `toString` method; a throwing `toString` leaves its
  /// exception pending.
  pub fn to_string(&mut self, host: &mut dyn VmHost, value: Value) -> Result<GcString, VmError> {
    let text = match value {
      Value::String(s) => return Ok(s),
      Value::Undefined => "undefined".to_string(),
      Value::Null => "null".to_string(),
      Value::Bool(b) => b.to_string(),
      Value::Int(n) => n.to_string(),
      Value::Number(n) => number_to_string(n),
      Value::Object(obj) => {
        let method = self.with_roots(&[value], |rt| rt.get(host, obj, b"toString"))?;
        if self.heap.is_callable(method) {
          let result = self.call_function(host, method, value, &[])?;
          if !matches!(result, Value::Object(_)) {
            return self.to_string(host, result);
          }
        }
        "[object Object]".to_string()
      }
    };
    self.heap.scope().alloc_string(text.as_bytes())
  }

  /// The bytes of a string handle.
  pub fn string_bytes(&self, s: GcString) -> Result<&[u8], VmError> {
    Ok(self.heap.get_string(s)?.as_bytes())
  }

  pub fn is_exception_pending(&self) -> bool {
    self.heap.pending_exception.is_some()
  }

  pub fn pending_exception(&self) -> Option<Value> {
    self.heap.pending_exception
  }

  /// Installs `value` as the pending exception, replacing any previous one.
  pub fn set_pending_exception(&mut self, value: Value) {
    self.heap.pending_exception = Some(value);
  }

  /// Takes the pending exception, clearing the slot.
  ///
  /// The returned value is no longer rooted by the slot; root it before allocating.
  pub fn take_pending_exception(&mut self) -> Option<Value> {
    self.heap.pending_exception.take()
  }

  pub fn clear_pending_exception(&mut self) {
    self.heap.pending_exception = None;
  }
}

impl std::fmt::Debug for GuestRuntime {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GuestRuntime")
      .field("used_bytes", &self.heap.used_bytes())
      .field("call_depth", &self.call_depth)
      .finish_non_exhaustive()
  }
}

fn is_regexp_own_key(key: &[u8]) -> bool {
  matches!(
    key,
    b"source" | b"flags" | b"global" | b"ignoreCase" | b"multiline" | b"sticky"
  )
}

fn number_to_string(n: f64) -> String {
  if n.is_nan() {
    return "NaN".to_string();
  }
  if n.is_infinite() {
    return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
  }
  if n == 0.0 {
    return "0".to_string();
  }
  if n.fract() == 0.0 && n.abs() < 1e21 {
    return format!("{}", n as i128);
  }
  format!("{n}")
}
