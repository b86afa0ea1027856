//! Dynamic-object host runtime ("host runtime") for `vm-bridge`.
//!
//! The host side of the embedding: a small object runtime in the style of a dynamic-language
//! interpreter, reduced to what an embedding bridge has to interact with:
//! - Immediate values ([`HostValue`]) plus heap objects behind generation-checked [`HostRef`]s
//! - A non-moving mark/sweep [`Heap`] with stack ([`Scope`]) and persistent ([`RootId`]) roots
//! - Classes with native method tables, [`HostRuntime::funcall`] dispatch and foreign proxies
//!   serviced through [`HostHooks`]
//! - Non-local exits as data: [`Unwind`] plus the `errinfo` slot
//!
//! # Errors and unwinding
//!
//! Code running on the host runtime never unwinds the Rust stack. Raising an exception stores it
//! in `errinfo` and returns [`Unwind::Raise`]; `throw` returns [`Unwind::Throw`]; runtime failures
//! ([`HostError`]) travel as [`Unwind::Fatal`]. Whoever handles the exit clears the
//! corresponding slot.

mod builtins;
mod dispatch;
mod error;
mod exception;
mod handle;
mod heap;
mod object;
mod runtime;
mod symbol;
mod value;

pub use crate::builtins::Builtins;
pub use crate::dispatch::HostHooks;
pub use crate::dispatch::HostMethod;
pub use crate::dispatch::NoHooks;
pub use crate::dispatch::MAX_CALL_DEPTH;
pub use crate::error::HostError;
pub use crate::error::Unwind;
pub use crate::error::TAG_FATAL;
pub use crate::error::TAG_RAISE;
pub use crate::error::TAG_THROW;
pub use crate::exception::MESSAGE_IVAR;
pub use crate::handle::HostRef;
pub use crate::handle::RootId;
pub use crate::handle::SymbolId;
pub use crate::handle::WeakHostRef;
pub use crate::heap::Heap;
pub use crate::heap::HeapLimits;
pub use crate::heap::Scope;
pub use crate::object::HostProcFn;
pub use crate::runtime::HostRuntime;
pub use crate::runtime::REGEXP_EXTENDED;
pub use crate::runtime::REGEXP_IGNORECASE;
pub use crate::runtime::REGEXP_MULTILINE;
pub use crate::value::HostKind;
pub use crate::value::HostValue;

pub use num_bigint::BigInt;
