//! Bridge between an embedded guest script engine ([`guest_vm`]) and the dynamic-object host
//! runtime it is embedded in ([`host_vm`]).
//!
//! A [`Context`] owns both runtimes. Through it (or a [`BridgeCx`] borrowed from it), values cross
//! in either direction:
//! - Primitives and strings are copied: `nil`/`null`, booleans, numbers, byte-exact strings
//! - Symbols and regular expressions are rebuilt on the other side
//! - Everything else is wrapped in a proxy. Wrapping the same value twice yields the same proxy,
//!   and a proxy crossing back unwraps to the value it stands for
//!
//! # Rooting
//!
//! The two collectors know nothing of each other. While a value is being converted or passed
//! along, it is protected by a [`RootScope`], which pins it in its own runtime until the scope
//! exits. Proxies pin the value they wrap for as long as the wrapper lives; [`Context::sweep`]
//! releases entries whose wrappers have been collected. Values returned from conversions are not
//! rooted.
//!
//! # Exceptions
//!
//! Neither runtime ever unwinds through the other's frames. A guest exception reaching host code
//! is raised as a host exception (the original host exception if it came from the host, a
//! `GuestError` carrying the converted guest value otherwise), and vice versa. See
//! [`BridgeError::into_host_unwind`] and [`BridgeError::into_guest_error`].
//!
//! # Example
//!
//! ```
//! use vm_bridge::Context;
//!
//! let mut context = Context::with_defaults().unwrap();
//! let greeting = context.host_mut().str_new(b"hello").unwrap();
//! context.set_global("greeting", greeting).unwrap();
//! let back = context.get_global("greeting").unwrap();
//! assert_eq!(context.host().string_bytes(back).unwrap(), b"hello");
//! ```

mod config;
mod context;
mod convert;
mod cx;
mod error;
mod exception;
mod forward;
pub mod prelude;
mod proxy;
mod root;
mod special;

pub use crate::config::BridgeOptions;
pub use crate::config::HeapConfig;
pub use crate::config::ThrowPolicy;
pub use crate::config::DEFAULT_NAMESPACE;
pub use crate::context::Context;
pub use crate::context::GUEST_ERROR_CLASS;
pub use crate::context::GUEST_OBJECT_CLASS;
pub use crate::cx::BridgeCx;
pub use crate::error::BridgeError;
pub use crate::exception::PAYLOAD_IVAR;
pub use crate::exception::UNKNOWN_SCRIPT_ERROR;
pub use crate::proxy::ProxyCount;
pub use crate::root::RootScope;

pub use guest_vm;
pub use host_vm;
