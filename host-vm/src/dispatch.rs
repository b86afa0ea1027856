use crate::object::{ClassData, HostObject};
use crate::runtime::mismatch;
use crate::{HostError, HostRef, HostRuntime, HostValue, SymbolId, Unwind};
use ahash::AHashMap;

/// Maximum nesting of [`HostRuntime::funcall`] before `SystemStackError` is raised.
pub const MAX_CALL_DEPTH: usize = 256;

/// A native method body.
///
/// The caller roots `recv` and `args` for the duration of the call.
pub type HostMethod = fn(
  rt: &mut HostRuntime,
  hooks: &mut dyn HostHooks,
  recv: HostValue,
  args: &[HostValue],
) -> Result<HostValue, Unwind>;

/// Embedder hooks for foreign proxies.
///
/// Every method call whose receiver was created with
/// [`HostRuntime::foreign_proxy_new`](crate::HostRuntime::foreign_proxy_new) is forwarded here
/// instead of going through the class's method table.
pub trait HostHooks {
  fn call_proxy_method(
    &mut self,
    rt: &mut HostRuntime,
    proxy: HostRef,
    slot: u64,
    name: SymbolId,
    args: &[HostValue],
  ) -> Result<HostValue, Unwind>;
}

/// [`HostHooks`] for runtimes without foreign proxies; any proxy call raises `TypeError`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl HostHooks for NoHooks {
  fn call_proxy_method(
    &mut self,
    rt: &mut HostRuntime,
    _proxy: HostRef,
    _slot: u64,
    _name: SymbolId,
    _args: &[HostValue],
  ) -> Result<HostValue, Unwind> {
    let class = rt.builtins().type_error;
    Err(rt.raise_new(class, b"foreign object without a bridge"))
  }
}

impl HostRuntime {
  /// Defines (or reopens) a class and binds it as a global constant.
  pub fn define_class(
    &mut self,
    name: &[u8],
    superclass: Option<HostRef>,
  ) -> Result<HostRef, HostError> {
    if let Some(HostValue::Ref(existing)) = self.get_global(name)? {
      if matches!(self.heap.get(existing)?, HostObject::Class(c) if !c.is_module) {
        return Ok(existing);
      }
    }
    let superclass = superclass.or(Some(self.builtins.object));
    self.define_class_object(name, superclass, false)
  }

  pub fn define_module(&mut self, name: &[u8]) -> Result<HostRef, HostError> {
    self.define_class_object(name, None, true)
  }

  fn define_class_object(
    &mut self,
    name: &[u8],
    superclass: Option<HostRef>,
    is_module: bool,
  ) -> Result<HostRef, HostError> {
    let class = self.heap.alloc(HostObject::Class(ClassData {
      name: name.into(),
      superclass,
      methods: AHashMap::new(),
      is_module,
    }))?;
    self.with_roots(&[HostValue::Ref(class)], |rt| {
      rt.set_global(name, HostValue::Ref(class))
    })?;
    Ok(class)
  }

  pub fn define_method(
    &mut self,
    class: HostRef,
    name: &[u8],
    method: HostMethod,
  ) -> Result<(), HostError> {
    let name = self.intern(name);
    if !matches!(self.heap.get(class)?, HostObject::Class(_)) {
      return Err(mismatch("Class", self.heap.get(class)?));
    }
    let additional = core::mem::size_of::<(SymbolId, HostMethod)>();
    self.heap.mutate(class, &[], additional, |obj| {
      if let HostObject::Class(c) = obj {
        c.methods.insert(name, method);
      }
    })
  }

  /// Looks `name` up along `class`'s superclass chain.
  pub fn find_method(&self, class: HostRef, name: SymbolId) -> Result<Option<HostMethod>, HostError> {
    let mut current = Some(class);
    while let Some(c) = current {
      let HostObject::Class(data) = self.heap.get(c)? else {
        return Err(mismatch("Class", self.heap.get(c)?));
      };
      if let Some(method) = data.methods.get(&name) {
        return Ok(Some(*method));
      }
      current = data.superclass;
    }
    Ok(None)
  }

  /// Whether `value`'s class is `class` or inherits from it.
  pub fn is_kind_of(&self, value: HostValue, class: HostRef) -> Result<bool, HostError> {
    let mut current = Some(self.class_of(value)?);
    while let Some(c) = current {
      if c == class {
        return Ok(true);
      }
      current = self.superclass(c)?;
    }
    Ok(false)
  }

  /// Whether a call of `name` on `recv` would find a method. Foreign proxies answer everything.
  pub fn respond_to(&self, recv: HostValue, name: SymbolId) -> Result<bool, HostError> {
    if self.foreign_proxy_slot(recv).is_some() {
      return Ok(true);
    }
    if self.find_method(self.class_of(recv)?, name)?.is_some() {
      return Ok(true);
    }
    Ok(self.struct_member(recv, name)?.is_some())
  }

  /// Calls method `name` on `recv`.
  ///
  /// Foreign proxies go to [`HostHooks::call_proxy_method`]; everything else searches the class
  /// chain, then struct members, and raises `NoMethodError` on a miss.
  pub fn funcall(
    &mut self,
    hooks: &mut dyn HostHooks,
    recv: HostValue,
    name: SymbolId,
    args: &[HostValue],
  ) -> Result<HostValue, Unwind> {
    if let HostValue::Ref(r) = recv {
      if let Some(slot) = self.heap.get(r)?.foreign_proxy_slot() {
        return self.enter_call(recv, args, |rt| {
          hooks.call_proxy_method(rt, r, slot, name, args)
        });
      }
    }

    let class = self.class_of(recv)?;
    if let Some(method) = self.find_method(class, name)? {
      return self.enter_call(recv, args, |rt| method(rt, hooks, recv, args));
    }

    match self.struct_member(recv, name)? {
      Some(StructMember::Read(field)) if args.is_empty() => {
        Ok(self.struct_get(recv, field)?.unwrap_or(HostValue::Nil))
      }
      Some(StructMember::Write(field)) if args.len() == 1 => {
        self.struct_set(recv, field, args[0])?;
        Ok(args[0])
      }
      _ => {
        let mut message = b"undefined method `".to_vec();
        message.extend_from_slice(self.symbol_name(name));
        message.extend_from_slice(b"' for ");
        message.extend_from_slice(&self.inspect(recv)?);
        let class = self.builtins().no_method_error;
        Err(self.raise_new(class, &message))
      }
    }
  }

  /// [`funcall`](Self::funcall) by method name.
  pub fn send(
    &mut self,
    hooks: &mut dyn HostHooks,
    recv: HostValue,
    name: &[u8],
    args: &[HostValue],
  ) -> Result<HostValue, Unwind> {
    let name = self.intern(name);
    self.funcall(hooks, recv, name, args)
  }

  /// Current method call nesting.
  pub fn call_depth(&self) -> usize {
    self.call_depth
  }

  fn enter_call(
    &mut self,
    recv: HostValue,
    args: &[HostValue],
    f: impl FnOnce(&mut Self) -> Result<HostValue, Unwind>,
  ) -> Result<HostValue, Unwind> {
    if self.call_depth >= MAX_CALL_DEPTH {
      let class = self.builtins().system_stack_error;
      return Err(self.raise_new(class, b"stack level too deep"));
    }
    let len = self.heap.root_stack.len();
    self.heap.root_stack.push(recv);
    self.heap.root_stack.extend_from_slice(args);
    self.call_depth += 1;
    let result = f(self);
    self.call_depth -= 1;
    self.heap.root_stack.truncate(len);
    result
  }

  fn struct_member(&self, recv: HostValue, name: SymbolId) -> Result<Option<StructMember>, HostError> {
    let HostValue::Ref(r) = recv else {
      return Ok(None);
    };
    let HostObject::Struct { fields, .. } = self.heap.get(r)? else {
      return Ok(None);
    };
    let name = self.symbol_name(name);
    let (field, write) = match name.strip_suffix(b"=") {
      Some(field) => (field, true),
      None => (name, false),
    };
    Ok(
      fields
        .iter()
        .find(|(k, _)| self.symbol_name(*k) == field)
        .map(|(k, _)| {
          if write {
            StructMember::Write(*k)
          } else {
            StructMember::Read(*k)
          }
        }),
    )
  }
}

enum StructMember {
  Read(SymbolId),
  Write(SymbolId),
}
