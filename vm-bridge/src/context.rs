use crate::cx::{BridgeClasses, BridgeState};
use crate::proxy::{ProxyCount, ProxyTables};
use crate::root::RootSet;
use crate::{prelude, BridgeCx, BridgeError, BridgeOptions};
use guest_vm::{GuestRuntime, Value};
use host_vm::{HostRuntime, HostValue, Unwind};

/// Host class raised for guest exceptions that have no host exception of their own.
pub const GUEST_ERROR_CLASS: &[u8] = b"GuestError";
/// Host class of proxies wrapping guest objects.
pub const GUEST_OBJECT_CLASS: &[u8] = b"GuestObject";

/// A guest runtime embedded in a host runtime.
///
/// The context owns both runtimes and everything the bridge keeps between crossings. Dropping it
/// tears the bridge down; see [`Context::teardown`].
#[derive(Debug)]
pub struct Context {
  guest: GuestRuntime,
  host: HostRuntime,
  state: BridgeState,
}

impl Context {
  pub fn new(options: BridgeOptions) -> Result<Self, BridgeError> {
    let mut guest = GuestRuntime::new(options.guest_heap.guest_limits())?;
    let mut host = HostRuntime::new(options.host_heap.host_limits())?;

    let standard_error = host.builtins().standard_error;
    let guest_error = host.define_class(GUEST_ERROR_CLASS, Some(standard_error))?;
    let guest_error_root = host.add_root(HostValue::Ref(guest_error));
    let guest_object = host.define_class(GUEST_OBJECT_CLASS, None)?;
    let guest_object_root = host.add_root(HostValue::Ref(guest_object));

    if options.install_prelude {
      prelude::install(&mut guest, options.namespace.as_bytes())?;
    }

    tracing::debug!(
      namespace = %options.namespace,
      prelude = options.install_prelude,
      throw_policy = ?options.throw_policy,
      "created bridge context"
    );
    Ok(Self {
      guest,
      host,
      state: BridgeState {
        namespace: options.namespace,
        throw_policy: options.throw_policy,
        roots: RootSet::default(),
        proxies: ProxyTables::default(),
        classes: BridgeClasses {
          guest_error,
          guest_object,
        },
        class_roots: vec![guest_error_root, guest_object_root],
        torn_down: false,
      },
    })
  }

  pub fn with_defaults() -> Result<Self, BridgeError> {
    Self::new(BridgeOptions::default())
  }

  /// Borrows both runtimes for a crossing.
  pub fn cx(&mut self) -> BridgeCx<'_> {
    BridgeCx {
      guest: &mut self.guest,
      host: &mut self.host,
      state: &mut self.state,
    }
  }

  pub fn guest(&self) -> &GuestRuntime {
    &self.guest
  }

  pub fn guest_mut(&mut self) -> &mut GuestRuntime {
    &mut self.guest
  }

  pub fn host(&self) -> &HostRuntime {
    &self.host
  }

  pub fn host_mut(&mut self) -> &mut HostRuntime {
    &mut self.host
  }

  /// See [`BridgeCx::to_guest`].
  pub fn to_guest(&mut self, value: HostValue) -> Result<Value, BridgeError> {
    self.ensure_live()?;
    self.cx().to_guest(value)
  }

  /// See [`BridgeCx::to_host`].
  pub fn to_host(&mut self, value: Value) -> Result<HostValue, BridgeError> {
    self.ensure_live()?;
    self.cx().to_host(value)
  }

  /// Converts `value` and stores it as the guest global `name`.
  pub fn set_global(&mut self, name: &str, value: HostValue) -> Result<(), BridgeError> {
    self.ensure_live()?;
    let mut cx = self.cx();
    let mut scope = cx.root_scope();
    let converted = scope.to_guest(value)?;
    scope.protect_guest(converted);
    let global = scope.guest.global_object();
    scope.guest.define(global, name.as_bytes(), converted)?;
    Ok(())
  }

  /// Reads the guest global `name` and converts it for the host.
  pub fn get_global(&mut self, name: &str) -> Result<HostValue, BridgeError> {
    self.ensure_live()?;
    let mut cx = self.cx();
    let global = cx.guest.global_object();
    let mut scope = cx.root_scope();
    let value = scope.guest_get(global, name.as_bytes())?;
    scope.protect_guest(value);
    scope.to_host(value)
  }

  /// A host proxy for the guest global object.
  pub fn global_proxy(&mut self) -> Result<HostValue, BridgeError> {
    self.ensure_live()?;
    let global = self.guest.global_object();
    self.cx().wrap_guest(global)
  }

  /// Calls a guest function from the host.
  ///
  /// `function` must be a host proxy for a guest function; it is called with the guest global
  /// object as `this`. Failures arrive in the host's idiom: guest exceptions are raised as host
  /// exceptions, and a host `throw` that passed through guest code resumes as itself.
  pub fn call(&mut self, function: HostValue, args: &[HostValue]) -> Result<HostValue, Unwind> {
    let _span = tracing::debug_span!("bridge_call", argc = args.len()).entered();
    let live = self.ensure_live();
    let mut cx = self.cx();
    let result = live.and_then(|()| call_guest(&mut cx, function, args));
    result.map_err(|err| err.into_host_unwind(&mut cx))
  }

  /// Calls host method `name` on `recv` with the bridge's hooks installed, so host proxies for
  /// guest objects answer the call.
  pub fn send(
    &mut self,
    recv: HostValue,
    name: &[u8],
    args: &[HostValue],
  ) -> Result<HostValue, Unwind> {
    let _span = tracing::debug_span!("bridge_send", argc = args.len()).entered();
    let live = self.ensure_live();
    let mut cx = self.cx();
    let result = live.and_then(|()| {
      let name = cx.host.intern(name);
      cx.host_funcall(recv, name, args)
    });
    result.map_err(|err| err.into_host_unwind(&mut cx))
  }

  /// Number of distinct values currently protected by open root scopes.
  pub fn root_set_len(&self) -> usize {
    self.state.roots.len()
  }

  pub fn proxy_count(&self) -> ProxyCount {
    self.state.proxies.count()
  }

  /// Releases the proxies whose wrappers have been collected. Returns how many were released.
  pub fn sweep(&mut self) -> usize {
    self.state.proxies.sweep(&mut self.guest, &mut self.host)
  }

  /// Collects both heaps, then sweeps the proxies the collections freed.
  pub fn collect_garbage(&mut self) -> usize {
    self.guest.collect_garbage();
    self.host.collect_garbage();
    self.sweep()
  }

  /// Releases every root the bridge holds in either runtime. Proxies created before teardown no
  /// longer resolve afterwards, and every crossing fails with [`BridgeError::TornDown`]. Calling
  /// this again does nothing.
  pub fn teardown(&mut self) {
    if self.state.torn_down {
      return;
    }
    self.state.torn_down = true;
    let count = self.state.proxies.count();
    self.state.proxies.clear(&mut self.guest, &mut self.host);
    self.state.roots.clear(&mut self.guest, &mut self.host);
    for root in self.state.class_roots.drain(..) {
      self.host.remove_root(root);
    }
    tracing::debug!(
      in_guest = count.in_guest,
      in_host = count.in_host,
      "tore down bridge context"
    );
  }

  pub fn is_torn_down(&self) -> bool {
    self.state.torn_down
  }

  fn ensure_live(&self) -> Result<(), BridgeError> {
    if self.state.torn_down {
      Err(BridgeError::TornDown)
    } else {
      Ok(())
    }
  }
}

impl Drop for Context {
  fn drop(&mut self) {
    self.teardown();
  }
}

fn call_guest(
  cx: &mut BridgeCx<'_>,
  function: HostValue,
  args: &[HostValue],
) -> Result<HostValue, BridgeError> {
  let Some(callee) = cx.unwrap_host_proxy(function) else {
    return Err(BridgeError::Conversion(
      "only guest functions can be called".to_string(),
    ));
  };
  let mut scope = cx.root_scope();
  for arg in args {
    scope.protect_host(*arg);
  }
  let mut guest_args = Vec::with_capacity(args.len());
  for arg in args {
    let value = scope.to_guest(*arg)?;
    guest_args.push(scope.protect_guest(value));
  }
  let global = Value::Object(scope.guest.global_object());
  let result = scope.guest_call(Value::Object(callee), global, &guest_args)?;
  scope.protect_guest(result);
  scope.to_host(result)
}
