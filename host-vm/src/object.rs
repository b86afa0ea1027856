use crate::dispatch::HostMethod;
use crate::{HostHooks, HostRef, HostRuntime, HostValue, SymbolId, Unwind};
use ahash::AHashMap;
use core::mem;
use num_bigint::BigInt;

/// Native body of a proc. `captures` are the values the proc closed over.
pub type HostProcFn = fn(
  rt: &mut HostRuntime,
  hooks: &mut dyn HostHooks,
  captures: &[HostValue],
  args: &[HostValue],
) -> Result<HostValue, Unwind>;

pub(crate) struct ClassData {
  pub(crate) name: Box<[u8]>,
  pub(crate) superclass: Option<HostRef>,
  pub(crate) methods: AHashMap<SymbolId, HostMethod>,
  pub(crate) is_module: bool,
}

pub(crate) enum DataPayload {
  Proc {
    func: HostProcFn,
    captures: Box<[HostValue]>,
  },
  /// A wrapper for a value owned by another runtime; `slot` is the embedder's handle.
  ForeignProxy { slot: u64 },
  Opaque(u64),
}

pub(crate) enum HostObject {
  Float(f64),
  Bignum(BigInt),
  String(Vec<u8>),
  Regexp { source: Box<[u8]>, options: u32 },
  Array(Vec<HostValue>),
  /// Insertion ordered.
  Hash(Vec<(HostValue, HostValue)>),
  Class(ClassData),
  Struct {
    class: HostRef,
    fields: Vec<(SymbolId, HostValue)>,
  },
  File { path: Box<[u8]> },
  Object {
    class: HostRef,
    ivars: Vec<(SymbolId, HostValue)>,
  },
  Data {
    class: HostRef,
    payload: DataPayload,
  },
  Internal,
}

impl HostObject {
  pub(crate) fn heap_size_bytes(&self) -> usize {
    let value = mem::size_of::<HostValue>();
    let pair = mem::size_of::<(SymbolId, HostValue)>();
    let payload = match self {
      HostObject::Float(_) | HostObject::Internal => 0,
      HostObject::Bignum(n) => (n.bits() as usize).div_ceil(8),
      HostObject::String(bytes) => bytes.len(),
      HostObject::Regexp { source, .. } => source.len(),
      HostObject::Array(items) => items.len().saturating_mul(value),
      HostObject::Hash(entries) => entries.len().saturating_mul(value * 2),
      HostObject::Class(class) => class
        .name
        .len()
        .saturating_add(class.methods.len().saturating_mul(mem::size_of::<(SymbolId, HostMethod)>())),
      HostObject::Struct { fields, .. } => fields.len().saturating_mul(pair),
      HostObject::File { path } => path.len(),
      HostObject::Object { ivars, .. } => ivars.len().saturating_mul(pair),
      HostObject::Data { payload, .. } => match payload {
        DataPayload::Proc { captures, .. } => captures.len().saturating_mul(value),
        DataPayload::ForeignProxy { .. } | DataPayload::Opaque(_) => 0,
      },
    };
    mem::size_of::<Self>().saturating_add(payload)
  }

  pub(crate) fn foreign_proxy_slot(&self) -> Option<u64> {
    match self {
      HostObject::Data {
        payload: DataPayload::ForeignProxy { slot },
        ..
      } => Some(*slot),
      _ => None,
    }
  }
}

impl HostObject {
  /// Calls `f` with every value this object keeps alive.
  pub(crate) fn for_each_child(&self, f: &mut impl FnMut(HostValue)) {
    match self {
      HostObject::Float(_)
      | HostObject::Bignum(_)
      | HostObject::String(_)
      | HostObject::Regexp { .. }
      | HostObject::File { .. }
      | HostObject::Internal => {}
      HostObject::Array(items) => items.iter().copied().for_each(f),
      HostObject::Hash(entries) => {
        for (k, v) in entries {
          f(*k);
          f(*v);
        }
      }
      HostObject::Class(class) => {
        if let Some(superclass) = class.superclass {
          f(HostValue::Ref(superclass));
        }
      }
      HostObject::Struct { class, fields: slots } | HostObject::Object { class, ivars: slots } => {
        f(HostValue::Ref(*class));
        for (_, v) in slots {
          f(*v);
        }
      }
      HostObject::Data { class, payload } => {
        f(HostValue::Ref(*class));
        if let DataPayload::Proc { captures, .. } = payload {
          captures.iter().copied().for_each(f);
        }
      }
    }
  }
}
