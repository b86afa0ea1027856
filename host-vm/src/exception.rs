use crate::object::HostObject;
use crate::{HostError, HostHooks, HostRef, HostRuntime, HostValue, Unwind};

/// Instance variable holding an exception's message.
pub const MESSAGE_IVAR: &[u8] = b"@message";

impl HostRuntime {
  /// Allocates an instance of the exception class `class` carrying `message`.
  pub fn new_exception(&mut self, class: HostRef, message: &[u8]) -> Result<HostValue, HostError> {
    let ivar = self.intern(MESSAGE_IVAR);
    let message = self.str_new(message)?;
    Ok(HostValue::Ref(self.heap.alloc(HostObject::Object {
      class,
      ivars: vec![(ivar, message)],
    })?))
  }

  pub fn is_exception(&self, value: HostValue) -> Result<bool, HostError> {
    if !matches!(value, HostValue::Ref(r) if matches!(self.heap.get(r), Ok(HostObject::Object { .. }))) {
      return Ok(false);
    }
    self.is_kind_of(value, self.builtins.exception)
  }

  /// The exception's message, or its class name when it has none.
  pub fn exception_message(&self, exc: HostValue) -> Result<Vec<u8>, HostError> {
    let message = match self.symbols.lookup(MESSAGE_IVAR) {
      Some(ivar) => self.ivar_get(exc, ivar)?,
      None => HostValue::Nil,
    };
    match message {
      HostValue::Nil => Ok(self.class_name(self.class_of(exc)?)?.to_vec()),
      other => self.to_s(other),
    }
  }

  /// Starts raising `exc`: stores it in `errinfo` and returns the unwind to propagate.
  pub fn raise(&mut self, exc: HostValue) -> Unwind {
    tracing::debug!(exception = ?exc, "host raise");
    self.heap.errinfo = Some(exc);
    Unwind::Raise
  }

  /// Raises a new instance of `class` with `message`.
  ///
  /// If the exception cannot even be allocated, the result is a fatal unwind instead.
  pub fn raise_new(&mut self, class: HostRef, message: &[u8]) -> Unwind {
    match self.new_exception(class, message) {
      Ok(exc) => self.raise(exc),
      Err(err) => Unwind::Fatal(err),
    }
  }

  /// `throw tag, value`.
  pub fn throw(&mut self, tag: HostValue, value: HostValue) -> Unwind {
    tracing::debug!(?tag, "host throw");
    self.heap.pending_throw = Some((tag, value));
    Unwind::Throw { tag, value }
  }

  /// `catch(tag) { body }`: runs `body`, turning a matching throw into its value.
  pub fn catch(
    &mut self,
    hooks: &mut dyn HostHooks,
    tag: HostValue,
    body: impl FnOnce(&mut Self, &mut dyn HostHooks) -> Result<HostValue, Unwind>,
  ) -> Result<HostValue, Unwind> {
    let result = self.with_roots(&[tag], |rt| body(rt, hooks));
    match result {
      Err(Unwind::Throw { tag: thrown, value }) if self.eql(thrown, tag) => {
        self.heap.pending_throw = None;
        Ok(value)
      }
      other => other,
    }
  }

  /// `$!`: the exception being raised, if any.
  pub fn errinfo(&self) -> Option<HostValue> {
    self.heap.errinfo
  }

  /// Takes the exception being raised, clearing `errinfo`.
  ///
  /// The returned value is no longer rooted by the slot.
  pub fn take_errinfo(&mut self) -> Option<HostValue> {
    self.heap.errinfo.take()
  }

  pub fn set_errinfo(&mut self, exc: Option<HostValue>) {
    self.heap.errinfo = exc;
  }

  /// Takes the `(tag, value)` of the throw in flight, if any.
  pub fn take_pending_throw(&mut self) -> Option<(HostValue, HostValue)> {
    self.heap.pending_throw.take()
  }

  /// Builds the `UncaughtThrowError` for a throw that reached a boundary without its catch.
  pub fn new_uncaught_throw_error(
    &mut self,
    tag: HostValue,
    value: HostValue,
  ) -> Result<HostValue, HostError> {
    let mut message = b"uncaught throw ".to_vec();
    message.extend_from_slice(&self.inspect(tag)?);
    let class = self.builtins.uncaught_throw_error;
    self.with_roots(&[tag, value], |rt| {
      let exc = rt.new_exception(class, &message)?;
      rt.with_roots(&[exc], |rt| {
        let tag_ivar = rt.intern(b"@tag");
        let value_ivar = rt.intern(b"@value");
        rt.ivar_set(exc, tag_ivar, tag)?;
        rt.ivar_set(exc, value_ivar, value)?;
        Ok(exc)
      })
    })
  }
}
