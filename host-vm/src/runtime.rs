use crate::builtins::{self, Builtins};
use crate::object::{DataPayload, HostObject, HostProcFn};
use crate::symbol::SymbolTable;
use crate::{HeapLimits, HostError, HostKind, HostRef, HostValue, RootId, Scope, SymbolId};
use crate::Heap;
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

/// Regexp option: case-insensitive matching.
pub const REGEXP_IGNORECASE: u32 = 0x01;
/// Regexp option: whitespace and comments in the pattern are ignored.
pub const REGEXP_EXTENDED: u32 = 0x02;
/// Regexp option: `.` matches newlines.
pub const REGEXP_MULTILINE: u32 = 0x04;

/// Nesting limit for [`HostRuntime::inspect`].
const MAX_INSPECT_DEPTH: usize = 16;

/// A host runtime instance: heap, symbol table, builtin classes and globals.
pub struct HostRuntime {
  pub(crate) heap: Heap,
  pub(crate) symbols: SymbolTable,
  pub(crate) builtins: Builtins,
  globals: HostRef,
  pub(crate) call_depth: usize,
}

impl HostRuntime {
  pub fn new(limits: HeapLimits) -> Result<Self, HostError> {
    let mut heap = Heap::new(limits);
    let builtins = Builtins::allocate(&mut heap)?;
    let globals = heap.alloc(HostObject::Hash(Vec::new()))?;
    heap.add_root(HostValue::Ref(globals));
    let mut rt = Self {
      heap,
      symbols: SymbolTable::default(),
      builtins,
      globals,
      call_depth: 0,
    };
    builtins::install(&mut rt)?;
    Ok(rt)
  }

  #[inline]
  pub fn heap(&self) -> &Heap {
    &self.heap
  }

  #[inline]
  pub fn heap_mut(&mut self) -> &mut Heap {
    &mut self.heap
  }

  pub fn scope(&mut self) -> Scope<'_> {
    self.heap.scope()
  }

  pub fn builtins(&self) -> &Builtins {
    &self.builtins
  }

  /// Runs `f` with `roots` pushed onto the stack root set.
  pub(crate) fn with_roots<R>(&mut self, roots: &[HostValue], f: impl FnOnce(&mut Self) -> R) -> R {
    let len = self.heap.root_stack.len();
    self.heap.root_stack.extend_from_slice(roots);
    let out = f(self);
    self.heap.root_stack.truncate(len);
    out
  }

  pub fn add_root(&mut self, value: HostValue) -> RootId {
    self.heap.add_root(value)
  }

  pub fn remove_root(&mut self, id: RootId) {
    self.heap.remove_root(id)
  }

  pub fn collect_garbage(&mut self) {
    self.heap.collect_garbage()
  }

  pub fn take_finalized_proxy_slots(&mut self) -> Vec<u64> {
    self.heap.take_finalized_proxy_slots()
  }

  pub fn intern(&mut self, name: &[u8]) -> SymbolId {
    self.symbols.intern(name)
  }

  /// The symbol named `name`, if it has been interned.
  pub fn lookup_symbol(&self, name: &[u8]) -> Option<SymbolId> {
    self.symbols.lookup(name)
  }

  pub fn symbol_name(&self, id: SymbolId) -> &[u8] {
    self.symbols.name(id)
  }

  pub fn kind(&self, value: HostValue) -> Result<HostKind, HostError> {
    let r = match value {
      HostValue::Nil => return Ok(HostKind::Nil),
      HostValue::True => return Ok(HostKind::True),
      HostValue::False => return Ok(HostKind::False),
      HostValue::Fixnum(_) => return Ok(HostKind::Fixnum),
      HostValue::Symbol(_) => return Ok(HostKind::Symbol),
      HostValue::Ref(r) => r,
    };
    Ok(match self.heap.get(r)? {
      HostObject::Float(_) => HostKind::Float,
      HostObject::Bignum(_) => HostKind::Bignum,
      HostObject::String(_) => HostKind::String,
      HostObject::Regexp { .. } => HostKind::Regexp,
      HostObject::Array(_) => HostKind::Array,
      HostObject::Hash(_) => HostKind::Hash,
      HostObject::Class(c) if c.is_module => HostKind::Module,
      HostObject::Class(_) => HostKind::Class,
      HostObject::Struct { .. } => HostKind::Struct,
      HostObject::File { .. } => HostKind::File,
      HostObject::Object { .. } => HostKind::Object,
      HostObject::Data { .. } => HostKind::Data,
      HostObject::Internal => HostKind::Internal,
    })
  }

  pub fn class_of(&self, value: HostValue) -> Result<HostRef, HostError> {
    let b = &self.builtins;
    let r = match value {
      HostValue::Nil => return Ok(b.nil_class),
      HostValue::True => return Ok(b.true_class),
      HostValue::False => return Ok(b.false_class),
      HostValue::Fixnum(_) => return Ok(b.integer),
      HostValue::Symbol(_) => return Ok(b.symbol),
      HostValue::Ref(r) => r,
    };
    Ok(match self.heap.get(r)? {
      HostObject::Float(_) => b.float,
      HostObject::Bignum(_) => b.integer,
      HostObject::String(_) => b.string,
      HostObject::Regexp { .. } => b.regexp,
      HostObject::Array(_) => b.array,
      HostObject::Hash(_) => b.hash,
      HostObject::Class(c) if c.is_module => b.module,
      HostObject::Class(_) => b.class,
      HostObject::File { .. } => b.file,
      HostObject::Struct { class, .. }
      | HostObject::Object { class, .. }
      | HostObject::Data { class, .. } => *class,
      HostObject::Internal => b.object,
    })
  }

  pub fn class_name(&self, class: HostRef) -> Result<&[u8], HostError> {
    match self.heap.get(class)? {
      HostObject::Class(c) => Ok(&c.name[..]),
      other => Err(mismatch("Class", other)),
    }
  }

  pub fn superclass(&self, class: HostRef) -> Result<Option<HostRef>, HostError> {
    match self.heap.get(class)? {
      HostObject::Class(c) => Ok(c.superclass),
      other => Err(mismatch("Class", other)),
    }
  }

  pub fn str_new(&mut self, bytes: &[u8]) -> Result<HostValue, HostError> {
    Ok(HostValue::Ref(self.heap.scope().alloc_string(bytes)?))
  }

  pub fn float_new(&mut self, value: f64) -> Result<HostValue, HostError> {
    Ok(HostValue::Ref(self.heap.scope().alloc_float(value)?))
  }

  /// Creates an Integer, using a fixnum whenever `value` fits.
  pub fn integer_new(&mut self, value: BigInt) -> Result<HostValue, HostError> {
    match i64::try_from(&value) {
      Ok(n) => Ok(HostValue::Fixnum(n)),
      Err(_) => Ok(HostValue::Ref(self.heap.alloc(HostObject::Bignum(value))?)),
    }
  }

  /// `options` is a set of `REGEXP_*` bits, stored unchanged.
  pub fn regexp_new(&mut self, source: &[u8], options: u32) -> Result<HostValue, HostError> {
    Ok(HostValue::Ref(
      self.heap.scope().alloc_regexp(source, options)?,
    ))
  }

  pub fn array_new(&mut self, items: &[HostValue]) -> Result<HostValue, HostError> {
    Ok(HostValue::Ref(self.heap.scope().alloc_array(items)?))
  }

  pub fn hash_new(&mut self) -> Result<HostValue, HostError> {
    Ok(HostValue::Ref(self.heap.scope().alloc_hash()?))
  }

  pub fn file_new(&mut self, path: &[u8]) -> Result<HostValue, HostError> {
    Ok(HostValue::Ref(self.heap.scope().alloc_file(path)?))
  }

  /// Allocates a plain instance of `class` with no instance variables.
  pub fn object_new(&mut self, class: HostRef) -> Result<HostValue, HostError> {
    Ok(HostValue::Ref(self.heap.alloc(HostObject::Object {
      class,
      ivars: Vec::new(),
    })?))
  }

  pub fn struct_new(
    &mut self,
    class: HostRef,
    fields: &[(SymbolId, HostValue)],
  ) -> Result<HostValue, HostError> {
    Ok(HostValue::Ref(self.heap.alloc(HostObject::Struct {
      class,
      fields: fields.to_vec(),
    })?))
  }

  pub fn proc_new(&mut self, func: HostProcFn, captures: &[HostValue]) -> Result<HostValue, HostError> {
    let class = self.builtins.proc_class;
    Ok(HostValue::Ref(self.heap.alloc(HostObject::Data {
      class,
      payload: DataPayload::Proc {
        func,
        captures: captures.into(),
      },
    })?))
  }

  /// Allocates a wrapper for a value owned by another runtime.
  ///
  /// Method calls on the wrapper are routed to
  /// [`HostHooks::call_proxy_method`](crate::HostHooks::call_proxy_method); once it is collected,
  /// `slot` shows up in [`HostRuntime::take_finalized_proxy_slots`].
  pub fn foreign_proxy_new(&mut self, class: HostRef, slot: u64) -> Result<HostValue, HostError> {
    Ok(HostValue::Ref(self.heap.alloc(HostObject::Data {
      class,
      payload: DataPayload::ForeignProxy { slot },
    })?))
  }

  pub fn opaque_new(&mut self, class: HostRef, tag: u64) -> Result<HostValue, HostError> {
    Ok(HostValue::Ref(self.heap.alloc(HostObject::Data {
      class,
      payload: DataPayload::Opaque(tag),
    })?))
  }

  /// The tag an opaque object was created with.
  pub fn opaque_tag(&self, value: HostValue) -> Result<u64, HostError> {
    match self.get_ref(value, "Data")? {
      HostObject::Data {
        payload: DataPayload::Opaque(tag),
        ..
      } => Ok(*tag),
      other => Err(mismatch("Data", other)),
    }
  }

  pub fn internal_new(&mut self) -> Result<HostValue, HostError> {
    Ok(HostValue::Ref(self.heap.scope().alloc_internal_node()?))
  }

  fn expect_ref(value: HostValue, expected: &'static str) -> Result<HostRef, HostError> {
    match value {
      HostValue::Ref(r) => Ok(r),
      other => Err(HostError::TypeMismatch {
        expected,
        found: immediate_name(other),
      }),
    }
  }

  fn get_ref(&self, value: HostValue, expected: &'static str) -> Result<&HostObject, HostError> {
    self.heap.get(Self::expect_ref(value, expected)?)
  }

  pub fn float_value(&self, value: HostValue) -> Result<f64, HostError> {
    match self.get_ref(value, "Float")? {
      HostObject::Float(f) => Ok(*f),
      other => Err(mismatch("Float", other)),
    }
  }

  pub fn bignum(&self, value: HostValue) -> Result<&BigInt, HostError> {
    match self.get_ref(value, "Bignum")? {
      HostObject::Bignum(n) => Ok(n),
      other => Err(mismatch("Bignum", other)),
    }
  }

  /// The nearest double to a bignum; magnitudes past `f64::MAX` become infinities.
  pub fn bignum_to_f64(&self, value: HostValue) -> Result<f64, HostError> {
    let n = self.bignum(value)?;
    Ok(n.to_f64().unwrap_or(if n.sign() == Sign::Minus {
      f64::NEG_INFINITY
    } else {
      f64::INFINITY
    }))
  }

  pub fn string_bytes(&self, value: HostValue) -> Result<&[u8], HostError> {
    match self.get_ref(value, "String")? {
      HostObject::String(bytes) => Ok(&bytes[..]),
      other => Err(mismatch("String", other)),
    }
  }

  /// The `(source, options)` of a Regexp.
  pub fn regexp_parts(&self, value: HostValue) -> Result<(&[u8], u32), HostError> {
    match self.get_ref(value, "Regexp")? {
      HostObject::Regexp { source, options } => Ok((&source[..], *options)),
      other => Err(mismatch("Regexp", other)),
    }
  }

  pub fn file_path(&self, value: HostValue) -> Result<&[u8], HostError> {
    match self.get_ref(value, "File")? {
      HostObject::File { path } => Ok(&path[..]),
      other => Err(mismatch("File", other)),
    }
  }

  pub fn array_len(&self, array: HostValue) -> Result<usize, HostError> {
    match self.get_ref(array, "Array")? {
      HostObject::Array(items) => Ok(items.len()),
      other => Err(mismatch("Array", other)),
    }
  }

  /// `array[index]`; negative indices count from the end, out of range reads `nil`.
  pub fn array_get(&self, array: HostValue, index: i64) -> Result<HostValue, HostError> {
    match self.get_ref(array, "Array")? {
      HostObject::Array(items) => Ok(
        normalize_index(index, items.len())
          .and_then(|i| items.get(i).copied())
          .unwrap_or(HostValue::Nil),
      ),
      other => Err(mismatch("Array", other)),
    }
  }

  /// `array[index] = value`, padding with `nil` past the end.
  pub fn array_set(&mut self, array: HostValue, index: i64, value: HostValue) -> Result<(), HostError> {
    let len = self.array_len(array)?;
    let i = normalize_index(index, len).ok_or(HostError::TypeMismatch {
      expected: "index in range",
      found: "index too small for array",
    })?;
    let grow = i.saturating_add(1).saturating_sub(len);
    let additional = grow.saturating_mul(core::mem::size_of::<HostValue>());
    let r = Self::expect_ref(array, "Array")?;
    self.heap.mutate(r, &[value], additional, |obj| {
      if let HostObject::Array(items) = obj {
        if i >= items.len() {
          items.resize(i + 1, HostValue::Nil);
        }
        items[i] = value;
      }
    })
  }

  pub fn array_push(&mut self, array: HostValue, value: HostValue) -> Result<(), HostError> {
    let len = self.array_len(array)?;
    self.array_set(array, len as i64, value)
  }

  pub fn hash_len(&self, hash: HostValue) -> Result<usize, HostError> {
    match self.get_ref(hash, "Hash")? {
      HostObject::Hash(entries) => Ok(entries.len()),
      other => Err(mismatch("Hash", other)),
    }
  }

  /// Entries in insertion order.
  pub fn hash_entries(&self, hash: HostValue) -> Result<Vec<(HostValue, HostValue)>, HostError> {
    match self.get_ref(hash, "Hash")? {
      HostObject::Hash(entries) => Ok(entries.clone()),
      other => Err(mismatch("Hash", other)),
    }
  }

  pub fn hash_get(&self, hash: HostValue, key: HostValue) -> Result<Option<HostValue>, HostError> {
    match self.get_ref(hash, "Hash")? {
      HostObject::Hash(entries) => Ok(
        entries
          .iter()
          .find(|(k, _)| self.eql(*k, key))
          .map(|(_, v)| *v),
      ),
      other => Err(mismatch("Hash", other)),
    }
  }

  pub fn hash_set(&mut self, hash: HostValue, key: HostValue, value: HostValue) -> Result<(), HostError> {
    let existing = match self.get_ref(hash, "Hash")? {
      HostObject::Hash(entries) => entries.iter().position(|(k, _)| self.eql(*k, key)),
      other => return Err(mismatch("Hash", other)),
    };
    let additional = match existing {
      Some(_) => 0,
      None => core::mem::size_of::<HostValue>() * 2,
    };
    let r = Self::expect_ref(hash, "Hash")?;
    self.heap.mutate(r, &[key, value], additional, |obj| {
      if let HostObject::Hash(entries) = obj {
        match existing {
          Some(idx) => entries[idx].1 = value,
          None => entries.push((key, value)),
        }
      }
    })
  }

  /// Reads an instance variable; unset variables read as `nil`.
  pub fn ivar_get(&self, obj: HostValue, name: SymbolId) -> Result<HostValue, HostError> {
    match self.get_ref(obj, "Object")? {
      HostObject::Object { ivars, .. } => Ok(
        ivars
          .iter()
          .find(|(k, _)| *k == name)
          .map(|(_, v)| *v)
          .unwrap_or(HostValue::Nil),
      ),
      other => Err(mismatch("Object", other)),
    }
  }

  pub fn ivar_set(&mut self, obj: HostValue, name: SymbolId, value: HostValue) -> Result<(), HostError> {
    let r = Self::expect_ref(obj, "Object")?;
    if !matches!(self.heap.get(r)?, HostObject::Object { .. }) {
      return Err(mismatch("Object", self.heap.get(r)?));
    }
    let additional = core::mem::size_of::<(SymbolId, HostValue)>();
    self.heap.mutate(r, &[value], additional, |o| {
      if let HostObject::Object { ivars, .. } = o {
        match ivars.iter_mut().find(|(k, _)| *k == name) {
          Some(slot) => slot.1 = value,
          None => ivars.push((name, value)),
        }
      }
    })
  }

  pub fn struct_get(&self, value: HostValue, field: SymbolId) -> Result<Option<HostValue>, HostError> {
    match self.get_ref(value, "Struct")? {
      HostObject::Struct { fields, .. } => Ok(
        fields
          .iter()
          .find(|(k, _)| *k == field)
          .map(|(_, v)| *v),
      ),
      other => Err(mismatch("Struct", other)),
    }
  }

  /// Writes an existing struct member. Returns `false` if the struct has no such member.
  pub fn struct_set(&mut self, value: HostValue, field: SymbolId, new: HostValue) -> Result<bool, HostError> {
    if self.struct_get(value, field)?.is_none() {
      return Ok(false);
    }
    let r = Self::expect_ref(value, "Struct")?;
    self.heap.mutate(r, &[], 0, |o| {
      if let HostObject::Struct { fields, .. } = o {
        if let Some(slot) = fields.iter_mut().find(|(k, _)| *k == field) {
          slot.1 = new;
        }
      }
    })?;
    Ok(true)
  }

  /// The embedder slot of a foreign proxy, or `None` for any other value.
  pub fn foreign_proxy_slot(&self, value: HostValue) -> Option<u64> {
    match value {
      HostValue::Ref(r) => self.heap.get(r).ok().and_then(|o| o.foreign_proxy_slot()),
      _ => None,
    }
  }

  pub(crate) fn proc_parts(&self, value: HostValue) -> Result<(HostProcFn, Vec<HostValue>), HostError> {
    match self.get_ref(value, "Proc")? {
      HostObject::Data {
        payload: DataPayload::Proc { func, captures },
        ..
      } => Ok((*func, captures.to_vec())),
      other => Err(mismatch("Proc", other)),
    }
  }

  /// `eql?`: strings compare by content, floats and bignums by value, everything else by
  /// identity.
  pub fn eql(&self, a: HostValue, b: HostValue) -> bool {
    if a == b {
      return true;
    }
    let (HostValue::Ref(ra), HostValue::Ref(rb)) = (a, b) else {
      return false;
    };
    match (self.heap.get(ra), self.heap.get(rb)) {
      (Ok(HostObject::String(x)), Ok(HostObject::String(y))) => x == y,
      (Ok(HostObject::Float(x)), Ok(HostObject::Float(y))) => x == y,
      (Ok(HostObject::Bignum(x)), Ok(HostObject::Bignum(y))) => x == y,
      _ => false,
    }
  }

  pub fn get_global(&self, name: &[u8]) -> Result<Option<HostValue>, HostError> {
    let Some(sym) = self.symbols.lookup(name) else {
      return Ok(None);
    };
    self.hash_get(HostValue::Ref(self.globals), HostValue::Symbol(sym))
  }

  pub fn set_global(&mut self, name: &[u8], value: HostValue) -> Result<(), HostError> {
    let sym = self.intern(name);
    self.hash_set(HostValue::Ref(self.globals), HostValue::Symbol(sym), value)
  }

  /// `to_s` without dispatch: strings and symbols yield their bytes, everything else its
  /// [`inspect`](Self::inspect) form.
  pub fn to_s(&self, value: HostValue) -> Result<Vec<u8>, HostError> {
    match value {
      HostValue::Nil => Ok(Vec::new()),
      HostValue::Symbol(sym) => Ok(self.symbol_name(sym).to_vec()),
      HostValue::Ref(r) => match self.heap.get(r)? {
        HostObject::String(bytes) => Ok(bytes.clone()),
        _ => self.inspect(value),
      },
      _ => self.inspect(value),
    }
  }

  /// `inspect` without dispatch.
  pub fn inspect(&self, value: HostValue) -> Result<Vec<u8>, HostError> {
    let mut out = Vec::new();
    self.inspect_into(value, &mut out, 0)?;
    Ok(out)
  }

  fn inspect_into(&self, value: HostValue, out: &mut Vec<u8>, depth: usize) -> Result<(), HostError> {
    if depth > MAX_INSPECT_DEPTH {
      out.extend_from_slice(b"...");
      return Ok(());
    }
    let r = match value {
      HostValue::Ref(r) => r,
      HostValue::Nil => {
        out.extend_from_slice(b"nil");
        return Ok(());
      }
      HostValue::True => {
        out.extend_from_slice(b"true");
        return Ok(());
      }
      HostValue::False => {
        out.extend_from_slice(b"false");
        return Ok(());
      }
      HostValue::Fixnum(n) => {
        out.extend_from_slice(n.to_string().as_bytes());
        return Ok(());
      }
      HostValue::Symbol(sym) => {
        out.push(b':');
        out.extend_from_slice(self.symbol_name(sym));
        return Ok(());
      }
    };
    match self.heap.get(r)? {
      HostObject::Float(f) => out.extend_from_slice(format!("{f:?}").as_bytes()),
      HostObject::Bignum(n) => out.extend_from_slice(n.to_string().as_bytes()),
      HostObject::String(bytes) => {
        out.push(b'"');
        out.extend_from_slice(bytes);
        out.push(b'"');
      }
      HostObject::Regexp { source, .. } => {
        out.push(b'/');
        out.extend_from_slice(source);
        out.push(b'/');
      }
      HostObject::Array(items) => {
        out.push(b'[');
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            out.extend_from_slice(b", ");
          }
          self.inspect_into(*item, out, depth + 1)?;
        }
        out.push(b']');
      }
      HostObject::Hash(entries) => {
        out.push(b'{');
        for (i, (k, v)) in entries.iter().enumerate() {
          if i > 0 {
            out.extend_from_slice(b", ");
          }
          self.inspect_into(*k, out, depth + 1)?;
          out.extend_from_slice(b"=>");
          self.inspect_into(*v, out, depth + 1)?;
        }
        out.push(b'}');
      }
      HostObject::Class(c) => out.extend_from_slice(&c.name),
      HostObject::Struct { class, fields } => {
        out.extend_from_slice(b"#<struct ");
        out.extend_from_slice(self.class_name(*class)?);
        for (i, (k, v)) in fields.iter().enumerate() {
          out.extend_from_slice(if i == 0 { &b" "[..] } else { &b", "[..] });
          out.extend_from_slice(self.symbol_name(*k));
          out.push(b'=');
          self.inspect_into(*v, out, depth + 1)?;
        }
        out.push(b'>');
      }
      HostObject::File { path } => {
        out.extend_from_slice(b"#<File:");
        out.extend_from_slice(path);
        out.push(b'>');
      }
      HostObject::Object { class, .. } => {
        out.extend_from_slice(b"#<");
        out.extend_from_slice(self.class_name(*class)?);
        if self.is_kind_of(value, self.builtins.exception)? {
          out.extend_from_slice(b": ");
          out.extend_from_slice(&self.exception_message(value)?);
        }
        out.push(b'>');
      }
      HostObject::Data { class, payload } => {
        out.extend_from_slice(b"#<");
        out.extend_from_slice(self.class_name(*class)?);
        if let DataPayload::Opaque(tag) = payload {
          out.extend_from_slice(format!(":{tag:#x}").as_bytes());
        }
        out.push(b'>');
      }
      HostObject::Internal => out.extend_from_slice(b"#<internal>"),
    }
    Ok(())
  }
}

impl std::fmt::Debug for HostRuntime {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HostRuntime")
      .field("used_bytes", &self.heap.used_bytes())
      .field("call_depth", &self.call_depth)
      .finish_non_exhaustive()
  }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
  if index >= 0 {
    usize::try_from(index).ok()
  } else {
    let back = usize::try_from(index.unsigned_abs()).ok()?;
    len.checked_sub(back)
  }
}

fn immediate_name(value: HostValue) -> &'static str {
  match value {
    HostValue::Nil => "nil",
    HostValue::True => "true",
    HostValue::False => "false",
    HostValue::Fixnum(_) => "Integer",
    HostValue::Symbol(_) => "Symbol",
    HostValue::Ref(_) => "object",
  }
}

pub(crate) fn mismatch(expected: &'static str, found: &HostObject) -> HostError {
  let found = match found {
    HostObject::Float(_) => "Float",
    HostObject::Bignum(_) => "Integer",
    HostObject::String(_) => "String",
    HostObject::Regexp { .. } => "Regexp",
    HostObject::Array(_) => "Array",
    HostObject::Hash(_) => "Hash",
    HostObject::Class(_) => "Class",
    HostObject::Struct { .. } => "Struct",
    HostObject::File { .. } => "File",
    HostObject::Object { .. } => "Object",
    HostObject::Data { .. } => "Data",
    HostObject::Internal => "internal",
  };
  HostError::TypeMismatch { expected, found }
}
