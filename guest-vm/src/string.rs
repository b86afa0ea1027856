use std::cmp::Ordering;
use std::fmt;

/// A guest string value.
///
/// Strings are byte sequences with an explicit length. They may contain embedded NUL bytes and
/// need not be valid UTF-8.
#[derive(Clone)]
pub struct JsString {
  bytes: Box<[u8]>,
}

impl JsString {
  pub fn from_bytes(bytes: &[u8]) -> Self {
    Self::from_vec(bytes.to_vec())
  }

  pub fn from_vec(mut bytes: Vec<u8>) -> Self {
    // Prefer an exact-sized backing allocation (avoid spare capacity).
    bytes.shrink_to_fit();
    Self {
      bytes: bytes.into_boxed_slice(),
    }
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  pub fn as_bytes(&self) -> &[u8] {
    self.bytes.as_ref()
  }

  pub fn to_utf8_lossy(&self) -> String {
    String::from_utf8_lossy(self.as_bytes()).into_owned()
  }

  pub(crate) fn heap_size_bytes_for_len(len: usize) -> usize {
    // Only the backing buffer is counted; the header lives inline in the heap slot table.
    len
  }
}

impl PartialEq for JsString {
  fn eq(&self, other: &Self) -> bool {
    self.bytes == other.bytes
  }
}

impl Eq for JsString {}

impl PartialOrd for JsString {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for JsString {
  fn cmp(&self, other: &Self) -> Ordering {
    self.bytes.as_ref().cmp(other.bytes.as_ref())
  }
}

impl fmt::Debug for JsString {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("JsString")
      .field("len", &self.len())
      .field("utf8_lossy", &self.to_utf8_lossy())
      .finish()
  }
}
