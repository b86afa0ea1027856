use guest_vm::VmError;
use host_vm::{HostError, Unwind};

/// Failures crossing the boundary between the two runtimes.
///
/// None of these are swallowed: the side that started the crossing receives them as a catchable
/// exception in its own idiom, see [`BridgeError::into_host_unwind`] and
/// [`BridgeError::into_guest_error`].
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
  /// A specific value cannot be represented on the other side.
  #[error("conversion failed: {0}")]
  Conversion(String),

  /// The destination runtime could not allocate.
  #[error("{0} runtime is out of memory")]
  Allocation(&'static str),

  /// A value reported a kind the dispatcher has no conversion for.
  #[error("no conversion for values of kind {0}")]
  UnknownKind(&'static str),

  /// The prelude namespace, or one of its members, is absent from the guest global object.
  #[error("bootstrap helper `{0}` is missing")]
  BootstrapMissing(String),

  /// A non-exception exit reached the boundary where only exceptions are expected.
  #[error("unexpected non-local exit: {0}")]
  UnexpectedUnwind(String),

  /// The context was torn down; no further crossings are possible.
  #[error("bridge context has been torn down")]
  TornDown,

  /// The guest runtime has a pending exception.
  #[error("guest exception pending")]
  GuestException,

  /// The host runtime is unwinding.
  #[error("host unwind: {0}")]
  HostUnwind(Unwind),

  #[error(transparent)]
  Guest(VmError),
}

impl From<VmError> for BridgeError {
  fn from(err: VmError) -> Self {
    match err {
      VmError::OutOfMemory => BridgeError::Allocation("guest"),
      VmError::ExceptionPending => BridgeError::GuestException,
      VmError::InvalidRegExp { .. } => BridgeError::Conversion(err.to_string()),
      other => BridgeError::Guest(other),
    }
  }
}

impl From<HostError> for BridgeError {
  fn from(err: HostError) -> Self {
    match err {
      HostError::OutOfMemory => BridgeError::Allocation("host"),
      other => BridgeError::Conversion(other.to_string()),
    }
  }
}

impl From<Unwind> for BridgeError {
  fn from(unwind: Unwind) -> Self {
    match unwind {
      Unwind::Fatal(err) => err.into(),
      other => BridgeError::HostUnwind(other),
    }
  }
}
