//! Embeddable script engine runtime ("guest runtime") for `vm-bridge`.
//!
//! This crate provides the pieces of a small script engine that an embedding host needs to talk
//! to:
//! - A non-moving mark/sweep GC heap ([`Heap`])
//! - Stable, generation-checked handles ([`GcObject`], [`GcString`]) and weak handles
//!   ([`WeakGcObject`])
//! - Stack rooting via RAII scopes ([`Scope`]) + persistent roots ([`RootId`])
//! - A realm with the handful of intrinsics embedders rely on ([`Realm`])
//! - The embedding API ([`GuestRuntime`]): property access, calls, `instanceof`, RegExp objects and
//!   the pending-exception slot
//!
//! There is no parser or evaluator here. Script-level behaviour is provided by native functions
//! ([`NativeCallFn`]) and by host objects whose internal methods are routed through [`VmHost`].
//!
//! # Rooting and handle validity
//!
//! Heap-allocated values (strings, objects) are referenced using stable handles containing
//! `{ index, generation }`. A handle becomes invalid once the allocation is collected; APIs that
//! dereference handles validate them and return [`VmError::InvalidHandle`] for stale handles.
//!
//! The GC traces from:
//! - **Stack roots**, managed by [`Scope`]. Dropping a `Scope` pops every root pushed in it.
//! - **Persistent roots**, managed by [`Heap::add_root`] / [`Heap::remove_root`].
//! - The pending exception slot.
//!
//! # Exceptions
//!
//! Natives report a catchable exception with [`VmError::Throw`]. When a throw escapes
//! [`GuestRuntime::call_function`], the thrown value is moved into the pending exception slot and
//! the call reports [`VmError::ExceptionPending`]. Embedders (and native code acting as "script")
//! catch by taking the pending exception.

mod error;
mod handle;
mod heap;
mod native;
mod object;
mod realm;
mod regexp;
mod runtime;
mod string;
mod value;

pub use crate::error::VmError;
pub use crate::handle::GcObject;
pub use crate::handle::GcString;
pub use crate::handle::HeapId;
pub use crate::handle::RootId;
pub use crate::handle::WeakGcObject;
pub use crate::heap::Heap;
pub use crate::heap::HeapLimits;
pub use crate::heap::PersistentRoot;
pub use crate::heap::Scope;
pub use crate::native::NativeCallFn;
pub use crate::native::NoHost;
pub use crate::native::VmHost;
pub use crate::object::HostSlots;
pub use crate::realm::Realm;
pub use crate::regexp::RegExpFlags;
pub use crate::runtime::GuestRuntime;
pub use crate::runtime::MAX_CALL_DEPTH;
pub use crate::string::JsString;
pub use crate::value::TypeOf;
pub use crate::value::Value;
pub use crate::value::MAX_SAFE_INTEGER;
