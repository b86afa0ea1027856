use crate::heap::{Trace, Tracer};
use crate::native::NativeCallFn;
use crate::regexp::RegExpFlags;
use crate::{GcObject, GcString, Value};
use core::mem;

/// Opaque embedder data attached to a host object.
///
/// The runtime never interprets these values; it hands them back to [`VmHost`](crate::VmHost)
/// hooks and, once the object is collected, queues them for
/// [`Heap::take_finalized_host_slots`](crate::Heap::take_finalized_host_slots).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HostSlots {
  pub a: u64,
  pub b: u64,
}

#[derive(Debug)]
pub(crate) struct Property {
  pub(crate) key: Box<[u8]>,
  pub(crate) value: Value,
}

pub(crate) struct NativeFunction {
  pub(crate) call: NativeCallFn,
  pub(crate) name: Box<[u8]>,
  pub(crate) slots: Box<[Value]>,
}

pub(crate) struct RegExpData {
  pub(crate) source: GcString,
  pub(crate) flags: RegExpFlags,
}

pub(crate) enum ObjectKind {
  Ordinary,
  Function(NativeFunction),
  RegExp(RegExpData),
  Host { slots: HostSlots, callable: bool },
}

pub(crate) struct JsObject {
  pub(crate) proto: Option<GcObject>,
  pub(crate) properties: Vec<Property>,
  pub(crate) kind: ObjectKind,
}

impl JsObject {
  pub(crate) fn new(proto: Option<GcObject>, kind: ObjectKind) -> Self {
    Self {
      proto,
      properties: Vec::new(),
      kind,
    }
  }

  pub(crate) fn is_callable(&self) -> bool {
    match &self.kind {
      ObjectKind::Function(_) => true,
      ObjectKind::Host { callable, .. } => *callable,
      ObjectKind::Ordinary | ObjectKind::RegExp(_) => false,
    }
  }

  pub(crate) fn host_slots(&self) -> Option<HostSlots> {
    match self.kind {
      ObjectKind::Host { slots, .. } => Some(slots),
      _ => None,
    }
  }

  pub(crate) fn find_property(&self, key: &[u8]) -> Option<usize> {
    self.properties.iter().position(|p| &*p.key == key)
  }

  pub(crate) fn heap_size_bytes(&self) -> usize {
    let props: usize = self
      .properties
      .iter()
      .map(|p| Self::property_size_bytes(p.key.len()))
      .fold(0usize, |acc, n| acc.saturating_add(n));
    let slots = match &self.kind {
      ObjectKind::Function(f) => Self::function_size_bytes(f.name.len(), f.slots.len()),
      _ => 0,
    };
    mem::size_of::<Self>()
      .saturating_add(props)
      .saturating_add(slots)
  }

  pub(crate) fn property_size_bytes(key_len: usize) -> usize {
    mem::size_of::<Property>().saturating_add(key_len)
  }

  pub(crate) fn function_size_bytes(name_len: usize, slot_count: usize) -> usize {
    slot_count
      .checked_mul(mem::size_of::<Value>())
      .unwrap_or(usize::MAX)
      .saturating_add(name_len)
  }
}

impl Trace for JsObject {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    if let Some(proto) = self.proto {
      tracer.trace_value(Value::Object(proto));
    }
    for prop in &self.properties {
      tracer.trace_value(prop.value);
    }
    match &self.kind {
      ObjectKind::Ordinary | ObjectKind::Host { .. } => {}
      ObjectKind::Function(f) => {
        for slot in f.slots.iter() {
          tracer.trace_value(*slot);
        }
      }
      ObjectKind::RegExp(re) => tracer.trace_value(Value::String(re.source)),
    }
  }
}
