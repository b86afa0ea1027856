use crate::value::Value;

/// Errors produced by the guest runtime.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VmError {
  /// The heap has exceeded its configured memory limit.
  #[error("out of memory")]
  OutOfMemory,

  /// A GC handle was used after the underlying allocation was freed (or the handle is otherwise
  /// malformed).
  #[error("invalid handle")]
  InvalidHandle,

  /// An attempted prototype mutation would introduce a cycle in the `[[Prototype]]` chain.
  #[error("prototype cycle")]
  PrototypeCycle,

  #[error("type error: {0}")]
  TypeError(&'static str),

  /// Attempted to call a non-callable value.
  #[error("value is not callable")]
  NotCallable,

  /// The RegExp engine rejected a pattern.
  #[error("invalid regular expression /{pattern}/: {reason}")]
  InvalidRegExp { pattern: String, reason: String },

  /// Native call nesting exceeded [`MAX_CALL_DEPTH`](crate::MAX_CALL_DEPTH).
  #[error("too much recursion")]
  StackOverflow,

  /// A thrown value. This is catchable from script.
  #[error("uncaught exception")]
  Throw(Value),

  /// A call failed and its exception has been moved into the runtime's pending exception slot.
  ///
  /// See [`GuestRuntime::take_pending_exception`](crate::GuestRuntime::take_pending_exception).
  #[error("exception pending")]
  ExceptionPending,
}

impl VmError {
  /// Whether this error represents a script-catchable exception (thrown or already pending).
  pub fn is_exception(&self) -> bool {
    matches!(self, VmError::Throw(_) | VmError::ExceptionPending)
  }
}
