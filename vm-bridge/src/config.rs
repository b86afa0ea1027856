use serde::{Deserialize, Serialize};

/// Name of the guest global holding the prelude helpers.
pub const DEFAULT_NAMESPACE: &str = "Bridge";

/// What a host `throw` does when it reaches guest code without meeting its `catch`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrowPolicy {
  /// Expose the throw to guest code as a catchable `UncaughtThrowError` and restore the original
  /// throw if that exception makes it back to the host.
  #[default]
  Propagate,
  /// Replace the throw with a generic guest error.
  Degrade,
}

/// Heap sizing for one runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapConfig {
  pub max_bytes: usize,
  pub gc_threshold: usize,
}

impl HeapConfig {
  pub fn new(max_bytes: usize, gc_threshold: usize) -> Self {
    Self {
      max_bytes,
      gc_threshold,
    }
  }

  pub fn guest_limits(self) -> guest_vm::HeapLimits {
    guest_vm::HeapLimits::new(self.max_bytes, self.gc_threshold)
  }

  pub fn host_limits(self) -> host_vm::HeapLimits {
    host_vm::HeapLimits::new(self.max_bytes, self.gc_threshold)
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new(64 * 1024 * 1024, 8 * 1024 * 1024)
  }
}

/// Options for [`Context::new`](crate::Context::new).
///
/// Every field has a default, so a JSON document only needs the keys it overrides:
///
/// ```
/// let options = vm_bridge::BridgeOptions::from_json(r#"{ "throw_policy": "degrade" }"#).unwrap();
/// assert_eq!(options.throw_policy, vm_bridge::ThrowPolicy::Degrade);
/// assert!(options.install_prelude);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeOptions {
  /// Guest global under which the prelude is installed and looked up.
  pub namespace: String,
  /// Install the prelude when the context is created.
  pub install_prelude: bool,
  pub throw_policy: ThrowPolicy,
  pub guest_heap: HeapConfig,
  pub host_heap: HeapConfig,
}

impl Default for BridgeOptions {
  fn default() -> Self {
    Self {
      namespace: DEFAULT_NAMESPACE.to_string(),
      install_prelude: true,
      throw_policy: ThrowPolicy::default(),
      guest_heap: HeapConfig::default(),
      host_heap: HeapConfig::default(),
    }
  }
}

impl BridgeOptions {
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(self)
  }
}
