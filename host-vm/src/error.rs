use crate::HostValue;

/// Failures of the runtime itself, as opposed to exceptions raised by code running on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
  #[error("failed to allocate memory")]
  OutOfMemory,

  /// A [`HostRef`](crate::HostRef) whose allocation has been collected.
  #[error("invalid handle")]
  InvalidHandle,

  #[error("wrong argument type {found} (expected {expected})")]
  TypeMismatch {
    expected: &'static str,
    found: &'static str,
  },
}

/// `TAG_RAISE`: an exception is being raised.
pub const TAG_RAISE: u32 = 0x6;
/// `TAG_THROW`: a `throw` looking for its `catch`.
pub const TAG_THROW: u32 = 0x7;
/// `TAG_FATAL`: the runtime itself failed.
pub const TAG_FATAL: u32 = 0x8;

/// A non-local exit in progress.
///
/// Host code signals errors and flow control by returning `Err(Unwind)` all the way up to
/// whoever handles it. Only [`Unwind::Raise`] is an exception; the exception object itself sits in
/// the runtime's `errinfo` slot (see [`HostRuntime::errinfo`](crate::HostRuntime::errinfo)) where
/// the GC can see it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Unwind {
  #[error("exception raised")]
  Raise,

  /// `throw tag, value`. Both values are also held in the runtime's pending throw slot until the
  /// throw is caught (see [`HostRuntime::take_pending_throw`](crate::HostRuntime::take_pending_throw)).
  #[error("uncaught throw")]
  Throw { tag: HostValue, value: HostValue },

  #[error(transparent)]
  Fatal(#[from] HostError),
}

impl Unwind {
  /// The unwind tag of this exit.
  pub fn tag(&self) -> u32 {
    match self {
      Unwind::Raise => TAG_RAISE,
      Unwind::Throw { .. } => TAG_THROW,
      Unwind::Fatal(_) => TAG_FATAL,
    }
  }
}
