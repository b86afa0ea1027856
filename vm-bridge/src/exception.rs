//! Moving pending exceptions between the runtimes.
//!
//! A crossing fails in the callee's idiom: a pending guest exception, or an [`Unwind`] with the
//! host exception in `errinfo`. Before the failure is handed to the caller it is captured,
//! converted and re-installed in the caller's idiom, so neither runtime ever unwinds through the
//! other's frames.

use crate::{BridgeCx, BridgeError, ThrowPolicy};
use guest_vm::{Value, VmError};
use host_vm::{HostError, HostValue, Unwind};

/// Instance variable of a host `GuestError` holding the converted guest exception.
pub const PAYLOAD_IVAR: &[u8] = b"@payload";

/// Message used when a guest call failed without leaving an exception behind.
pub const UNKNOWN_SCRIPT_ERROR: &[u8] = b"Unknown script error";

impl BridgeError {
  /// Delivers this error to host code: the result is what the host call that crossed into the
  /// guest should return.
  pub fn into_host_unwind(self, cx: &mut BridgeCx<'_>) -> Unwind {
    match self {
      BridgeError::HostUnwind(unwind) => unwind,
      BridgeError::GuestException => guest_exception_to_host(cx),
      BridgeError::Guest(VmError::Throw(value)) => {
        cx.guest.set_pending_exception(value);
        guest_exception_to_host(cx)
      }
      BridgeError::Allocation(_) | BridgeError::Guest(VmError::OutOfMemory) => {
        Unwind::Fatal(HostError::OutOfMemory)
      }
      other => {
        let builtins = cx.host.builtins();
        let class = match &other {
          BridgeError::Conversion(_)
          | BridgeError::UnknownKind(_)
          | BridgeError::Guest(VmError::TypeError(_) | VmError::NotCallable) => builtins.type_error,
          BridgeError::Guest(VmError::StackOverflow) => builtins.system_stack_error,
          _ => builtins.runtime_error,
        };
        tracing::debug!(error = %other, "bridge error raised on the host");
        cx.host.raise_new(class, other.to_string().as_bytes())
      }
    }
  }

  /// Delivers this error to guest code: the result is what the guest operation that crossed into
  /// the host should fail with.
  pub fn into_guest_error(self, cx: &mut BridgeCx<'_>) -> VmError {
    match self {
      BridgeError::GuestException => VmError::ExceptionPending,
      BridgeError::Guest(err) => err,
      BridgeError::Allocation(_) => VmError::OutOfMemory,
      BridgeError::HostUnwind(Unwind::Raise) => host_exception_to_guest(cx),
      BridgeError::HostUnwind(Unwind::Throw { tag, value }) => host_throw_to_guest(cx, tag, value),
      BridgeError::HostUnwind(Unwind::Fatal(err)) => BridgeError::from(err).into_guest_error(cx),
      other => {
        tracing::debug!(error = %other, "bridge error thrown in the guest");
        guest_error(cx, other.to_string().as_bytes())
      }
    }
  }
}

/// A guest `Error` thrown with `message`.
fn guest_error(cx: &mut BridgeCx<'_>, message: &[u8]) -> VmError {
  match cx.guest.new_error(message) {
    Ok(err) => VmError::Throw(Value::Object(err)),
    Err(err) => err,
  }
}

/// GuestPending: raises the guest's pending exception on the host.
fn guest_exception_to_host(cx: &mut BridgeCx<'_>) -> Unwind {
  let Some(exc) = cx.guest.take_pending_exception() else {
    tracing::warn!("guest call failed without a pending exception");
    let class = cx.state.classes.guest_error;
    return cx.host.raise_new(class, UNKNOWN_SCRIPT_ERROR);
  };
  let mut scope = cx.root_scope();
  scope.protect_guest(exc);
  tracing::debug!("guest exception crossing into the host");

  let payload = match scope.to_host(exc) {
    Ok(value) => scope.protect_host(value),
    Err(err) => {
      tracing::debug!(error = %err, "guest exception has no host representation");
      scope.guest.clear_pending_exception();
      HostValue::Nil
    }
  };

  // A host exception that passed through guest code continues as itself.
  if scope.host.is_exception(payload).unwrap_or(false) {
    let uncaught_throw = scope.host.builtins().uncaught_throw_error;
    if scope.host.is_kind_of(payload, uncaught_throw).unwrap_or(false) {
      if let Some((tag, value)) = throw_parts(&scope, payload) {
        return scope.host.throw(tag, value);
      }
    }
    return scope.host.raise(payload);
  }

  let message = guest_error_message(&mut scope, exc);
  match new_guest_error(&mut scope, &message, payload) {
    Ok(err) => scope.host.raise(err),
    Err(err) => Unwind::Fatal(err),
  }
}

fn new_guest_error(
  cx: &mut BridgeCx<'_>,
  message: &[u8],
  payload: HostValue,
) -> Result<HostValue, HostError> {
  let class = cx.state.classes.guest_error;
  let err = cx.host.new_exception(class, message)?;
  let ivar = cx.host.intern(PAYLOAD_IVAR);
  cx.host.ivar_set(err, ivar, payload)?;
  Ok(err)
}

/// The `@tag`/`@value` pair of an `UncaughtThrowError`.
fn throw_parts(cx: &BridgeCx<'_>, exc: HostValue) -> Option<(HostValue, HostValue)> {
  let tag = cx.host.lookup_symbol(b"@tag")?;
  let value = cx.host.lookup_symbol(b"@value")?;
  Some((cx.host.ivar_get(exc, tag).ok()?, cx.host.ivar_get(exc, value).ok()?))
}

/// `message` of guest `Error`s, `ToString` of anything else.
///
/// Exceptions thrown while stringifying are discarded.
fn guest_error_message(cx: &mut BridgeCx<'_>, exc: Value) -> Vec<u8> {
  let message = match error_message_property(cx, exc) {
    Some(message) => Ok(message),
    None => cx.guest_to_string(exc),
  };
  cx.guest.clear_pending_exception();
  message.unwrap_or_else(|_| UNKNOWN_SCRIPT_ERROR.to_vec())
}

fn error_message_property(cx: &mut BridgeCx<'_>, exc: Value) -> Option<Vec<u8>> {
  let Value::Object(obj) = exc else {
    return None;
  };
  let error_ctor = cx.guest.realm().error_constructor();
  if !cx.guest_instance_of(exc, error_ctor).ok()? {
    return None;
  }
  let message = cx.guest_get(obj, b"message").ok()?;
  cx.guest_to_string(message).ok()
}

/// HostRaise: throws the host's current exception in the guest.
fn host_exception_to_guest(cx: &mut BridgeCx<'_>) -> VmError {
  let Some(exc) = cx.host.take_errinfo() else {
    tracing::warn!("host unwind without an exception");
    return guest_error(cx, b"Unknown host error");
  };
  let mut scope = cx.root_scope();
  scope.protect_host(exc);
  tracing::debug!("host exception crossing into the guest");

  // A guest exception that passed through host code continues as itself.
  let guest_error_class = scope.state.classes.guest_error;
  if scope.host.is_kind_of(exc, guest_error_class).unwrap_or(false) {
    let payload = scope
      .host
      .lookup_symbol(PAYLOAD_IVAR)
      .and_then(|ivar| scope.host.ivar_get(exc, ivar).ok())
      .unwrap_or(HostValue::Nil);
    if payload != HostValue::Nil {
      if let Ok(original) = scope.to_guest(payload) {
        return VmError::Throw(original);
      }
    }
  }

  match scope.to_guest(exc) {
    Ok(value) => VmError::Throw(value),
    Err(err) => {
      tracing::debug!(error = %err, "host exception has no guest representation");
      let message = scope.host.exception_message(exc).unwrap_or_default();
      guest_error(&mut scope, &message)
    }
  }
}

/// HostOtherUnwind: a `throw` that left host code without meeting its `catch`.
fn host_throw_to_guest(cx: &mut BridgeCx<'_>, tag: HostValue, value: HostValue) -> VmError {
  let mut scope = cx.root_scope();
  scope.protect_host(tag);
  scope.protect_host(value);
  scope.host.take_pending_throw();

  match scope.throw_policy() {
    ThrowPolicy::Degrade => {
      let tag = scope.host.inspect(tag).unwrap_or_default();
      let err = BridgeError::UnexpectedUnwind(format!(
        "uncaught throw {}",
        String::from_utf8_lossy(&tag)
      ));
      tracing::warn!(error = %err, "host throw degraded to a guest error");
      guest_error(&mut scope, err.to_string().as_bytes())
    }
    ThrowPolicy::Propagate => {
      let exc = match scope.host.new_uncaught_throw_error(tag, value) {
        Ok(exc) => scope.protect_host(exc),
        Err(err) => return BridgeError::from(err).into_guest_error(&mut scope),
      };
      tracing::debug!("host throw crossing into the guest as UncaughtThrowError");
      match scope.to_guest(exc) {
        Ok(value) => VmError::Throw(value),
        Err(err) => err.into_guest_error(&mut scope),
      }
    }
  }
}
