use crate::SymbolId;
use ahash::AHashMap;

/// Interned symbol names.
#[derive(Debug, Default)]
pub(crate) struct SymbolTable {
  names: Vec<Box<[u8]>>,
  ids: AHashMap<Box<[u8]>, SymbolId>,
}

impl SymbolTable {
  pub(crate) fn intern(&mut self, name: &[u8]) -> SymbolId {
    if let Some(id) = self.ids.get(name) {
      return *id;
    }
    let id = SymbolId(self.names.len() as u32);
    self.names.push(name.into());
    self.ids.insert(name.into(), id);
    id
  }

  pub(crate) fn lookup(&self, name: &[u8]) -> Option<SymbolId> {
    self.ids.get(name).copied()
  }

  pub(crate) fn name(&self, id: SymbolId) -> &[u8] {
    self.names.get(id.0 as usize).map(|n| &n[..]).unwrap_or(b"")
  }
}
