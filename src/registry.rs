//! Capability registry with lazily constructed singletons.
//!
//! A [`Registry`] maps capability tokens to providers. The first
//! [`resolve`](Registry::resolve) of a capability runs its provider and caches the
//! result; every later resolve returns that same `Arc`. Registration is meant for
//! a one-time setup phase (see [`Registry::setup`]), resolution for everything
//! after it.
//!
//! # Examples
//!
//! ```
//! use invitation_container::{define_capability, Registry};
//! use std::sync::Arc;
//!
//! define_capability! {
//!     Motd => String;
//! }
//!
//! let registry = Registry::new();
//! registry.register::<Motd, _>(|| Arc::new("Welcome to the wedding!".to_string()));
//!
//! let first = registry.resolve::<Motd>().unwrap();
//! let second = registry.resolve::<Motd>().unwrap();
//! assert!(Arc::ptr_eq(&first, &second));
//! ```

use std::{
    any::{Any, TypeId},
    cell::RefCell,
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, LazyLock, Mutex,
    },
};

use tracing::{debug, info, trace, warn};

use crate::{Capability, CapabilityId, RegistryError, RegistryEvent};

/// Type-erased instance. Holds an `Arc<C::Instance>` so unsized instances
/// (trait objects) survive the round trip through `Any`.
type Erased = Arc<dyn Any + Send + Sync>;

type Provider = Arc<dyn Fn(&Registry) -> Result<Erased, RegistryError> + Send + Sync>;

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives a reference to a `RegistryEvent` every time the registry is
/// interacted with. It must be thread-safe because registries are shared across threads.
pub type TraceCallback = dyn Fn(&RegistryEvent) + Send + Sync + 'static;

/// The process-wide registry behind [`Registry::global`].
static GLOBAL_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

thread_local! {
    /// Capabilities whose providers are running on this thread, tagged with the
    /// address of the owning registry.
    static RESOLVING: RefCell<Vec<(usize, TypeId, &'static str)>> = const { RefCell::new(Vec::new()) };
}

struct Binding {
    name: &'static str,
    provider: Provider,
    instance: Option<Erased>,
    generation: u64,
}

enum Lookup {
    Cached(Erased),
    Build(Provider, u64),
}

/// Registry of capability bindings.
///
/// Cheap to share: pass `&Registry`, wrap it in an `Arc`, or use the `'static`
/// [`Registry::global`] instance.
pub struct Registry {
    bindings: Mutex<HashMap<TypeId, Binding>>,
    trace: Mutex<Option<Arc<TraceCallback>>>,
    initialized: AtomicBool,
    generation: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("capabilities", &self.registered_names())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Returns the process-wide registry, constructing it on first use.
///
/// Shorthand for [`Registry::global`].
pub fn get_instance() -> &'static Registry {
    Registry::global()
}

impl Registry {
    pub fn new() -> Self {
        Self {
            bindings: Mutex::new(HashMap::new()),
            trace: Mutex::new(None),
            initialized: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// The one process-wide registry.
    ///
    /// Prefer passing an explicit `&Registry` to components; this exists for the
    /// application entry point.
    pub fn global() -> &'static Registry {
        &GLOBAL_REGISTRY
    }

    // -------------------------------------------------------------------------------------------------
    // Tracing
    // -------------------------------------------------------------------------------------------------

    /// Set a tracing callback for registry operations.
    ///
    /// The callback is invoked after the registry lock is released, so it may
    /// call back into the registry.
    pub fn set_trace_callback(&self, callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(Arc::new(callback));
    }

    /// Clear the tracing callback. Registered values are not affected.
    pub fn clear_trace_callback(&self) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    fn emit_event(&self, event: &RegistryEvent) {
        trace!(target: "registry", "{event}");

        let callback = self
            .trace
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    // -------------------------------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------------------------------

    /// Bind `C` to a zero-argument provider.
    ///
    /// The provider runs on the first [`resolve`](Self::resolve) of `C`, not here.
    /// If `C` is already bound the previous binding, and any instance it produced,
    /// is replaced.
    pub fn register<C, F>(&self, provider: F)
    where
        C: Capability,
        F: Fn() -> Arc<C::Instance> + Send + Sync + 'static,
    {
        let provider: Provider =
            Arc::new(move |_: &Registry| Ok::<_, RegistryError>(erase::<C>(provider())));
        self.bind::<C>(provider, None);
    }

    /// Bind `C` to a provider that builds its instance from other capabilities
    /// of the same registry.
    ///
    /// ```
    /// use invitation_container::{define_capability, Registry};
    /// use std::sync::Arc;
    ///
    /// define_capability! {
    ///     Host => String;
    ///     Banner => String;
    /// }
    ///
    /// let registry = Registry::new();
    /// registry.register::<Host, _>(|| Arc::new("Anna".to_string()));
    /// registry.register_with::<Banner, _>(|r| {
    ///     let host = r.resolve::<Host>()?;
    ///     Ok(Arc::new(format!("{host}'s wedding")))
    /// });
    ///
    /// assert_eq!(&*registry.resolve::<Banner>().unwrap(), "Anna's wedding");
    /// ```
    pub fn register_with<C, F>(&self, provider: F)
    where
        C: Capability,
        F: Fn(&Registry) -> Result<Arc<C::Instance>, RegistryError> + Send + Sync + 'static,
    {
        let provider: Provider =
            Arc::new(move |registry: &Registry| provider(registry).map(erase::<C>));
        self.bind::<C>(provider, None);
    }

    /// Bind `C` to an already constructed instance.
    pub fn register_instance<C: Capability>(&self, instance: Arc<C::Instance>) {
        let erased = erase::<C>(instance);
        let cached = erased.clone();
        let provider: Provider =
            Arc::new(move |_: &Registry| Ok::<_, RegistryError>(erased.clone()));
        self.bind::<C>(provider, Some(cached));
    }

    fn bind<C: Capability>(&self, provider: Provider, instance: Option<Erased>) {
        let binding = Binding {
            name: C::NAME,
            provider,
            instance,
            generation: self.generation.fetch_add(1, Ordering::Relaxed),
        };

        let previous = self
            .bindings
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(TypeId::of::<C>(), binding);

        let replaced = previous.is_some();
        if replaced {
            warn!(capability = C::NAME, "replacing existing capability binding");
        }

        self.emit_event(&RegistryEvent::Register {
            name: C::NAME,
            replaced,
        });
    }

    // -------------------------------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------------------------------

    /// Resolve `C`, running its provider if this is the first resolution.
    ///
    /// # Errors
    ///
    /// - `NotRegistered` if `C` was never bound
    /// - `CircularDependency` if the provider (transitively) resolves `C` again
    /// - any error returned by a `register_with` provider
    /// - `RegistryLock` if the registry lock is poisoned
    pub fn resolve<C: Capability>(&self) -> Result<Arc<C::Instance>, RegistryError> {
        let key = TypeId::of::<C>();

        let lookup = {
            let bindings = self
                .bindings
                .lock()
                .map_err(|_| RegistryError::RegistryLock)?;

            bindings
                .get(&key)
                .map(|binding| match &binding.instance {
                    Some(instance) => Lookup::Cached(instance.clone()),
                    None => Lookup::Build(binding.provider.clone(), binding.generation),
                })
        };

        let (instance, constructed) = match lookup {
            Some(Lookup::Cached(instance)) => (instance, false),
            Some(Lookup::Build(provider, generation)) => {
                self.construct::<C>(provider, generation)?
            }
            None => {
                self.emit_event(&RegistryEvent::Resolve {
                    name: C::NAME,
                    found: false,
                    constructed: false,
                });
                return Err(RegistryError::NotRegistered { name: C::NAME });
            }
        };

        self.emit_event(&RegistryEvent::Resolve {
            name: C::NAME,
            found: true,
            constructed,
        });

        downcast::<C>(&instance)
    }

    /// Runs the provider outside the lock, then caches the result unless another
    /// caller got there first or the binding was replaced meanwhile.
    fn construct<C: Capability>(
        &self,
        provider: Provider,
        generation: u64,
    ) -> Result<(Erased, bool), RegistryError> {
        let _guard = ResolutionGuard::enter(self, TypeId::of::<C>(), C::NAME)?;

        debug!(capability = C::NAME, "constructing capability instance");
        let built = provider(self)?;

        let mut bindings = self.bindings.lock().unwrap_or_else(|p| p.into_inner());
        match bindings.get_mut(&TypeId::of::<C>()) {
            Some(binding) if binding.generation == generation => match &binding.instance {
                Some(existing) => Ok((existing.clone(), false)),
                None => {
                    binding.instance = Some(built.clone());
                    Ok((built, true))
                }
            },
            // Rebound or cleared while the provider ran
            _ => Ok((built, true)),
        }
    }

    /// Check whether `C` is bound.
    ///
    /// # Errors
    ///
    /// - Registry lock is poisoned
    pub fn contains<C: Capability>(&self) -> Result<bool, RegistryError> {
        let found = self
            .bindings
            .lock()
            .map(|m| m.contains_key(&TypeId::of::<C>()))
            .map_err(|_| RegistryError::RegistryLock)?;

        self.emit_event(&RegistryEvent::Contains {
            name: C::NAME,
            found,
        });

        Ok(found)
    }

    /// Fail with `MissingCapabilities` naming every entry of `required` that is not bound.
    pub fn verify(&self, required: &[CapabilityId]) -> Result<(), RegistryError> {
        let bindings = self
            .bindings
            .lock()
            .map_err(|_| RegistryError::RegistryLock)?;

        let missing: Vec<&'static str> = required
            .iter()
            .filter(|id| !bindings.contains_key(&id.key()))
            .map(CapabilityId::name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::MissingCapabilities(missing))
        }
    }

    /// Names of all bound capabilities, sorted.
    pub fn registered_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .bindings
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .map(|binding| binding.name)
            .collect();
        names.sort_unstable();
        names
    }

    // -------------------------------------------------------------------------------------------------
    // Setup
    // -------------------------------------------------------------------------------------------------

    /// Run the registration routine `f` once for this registry.
    ///
    /// Returns `Ok(true)` if `f` ran, `Ok(false)` if setup already happened (or is
    /// in progress on another thread). When `f` fails the guard is reset so a
    /// later call can retry.
    pub fn setup<F>(&self, f: F) -> Result<bool, RegistryError>
    where
        F: FnOnce(&Registry) -> Result<(), RegistryError>,
    {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("registry already initialized, skipping setup");
            self.emit_event(&RegistryEvent::Setup { ran: false });
            return Ok(false);
        }

        if let Err(err) = f(self) {
            self.initialized.store(false, Ordering::Release);
            return Err(err);
        }

        info!(capabilities = ?self.registered_names(), "registry setup complete");
        self.emit_event(&RegistryEvent::Setup { ran: true });
        Ok(true)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Remove all bindings and reset the setup guard.
    ///
    /// Intended for tests. Already resolved `Arc`s stay valid; the trace
    /// callback is kept.
    #[doc(hidden)]
    pub fn clear(&self) {
        self.emit_event(&RegistryEvent::Clear {});

        let drained: Vec<Binding> = self
            .bindings
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain()
            .map(|(_, binding)| binding)
            .collect();
        drop(drained);

        self.initialized.store(false, Ordering::Release);
    }
}

fn erase<C: Capability>(instance: Arc<C::Instance>) -> Erased {
    Arc::new(instance)
}

fn downcast<C: Capability>(erased: &Erased) -> Result<Arc<C::Instance>, RegistryError> {
    (**erased)
        .downcast_ref::<Arc<C::Instance>>()
        .cloned()
        .ok_or(RegistryError::TypeMismatch { name: C::NAME })
}

/// Marks a capability as under construction on the current thread for as long
/// as the guard lives.
struct ResolutionGuard;

impl ResolutionGuard {
    fn enter(registry: &Registry, key: TypeId, name: &'static str) -> Result<Self, RegistryError> {
        let owner = registry as *const Registry as usize;

        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();

            let in_progress: Vec<&(usize, TypeId, &'static str)> =
                stack.iter().filter(|(o, _, _)| *o == owner).collect();

            if let Some(start) = in_progress.iter().position(|(_, k, _)| *k == key) {
                let mut chain: Vec<&'static str> =
                    in_progress[start..].iter().map(|(_, _, n)| *n).collect();
                chain.push(name);
                return Err(RegistryError::CircularDependency { chain });
            }

            stack.push((owner, key, name));
            Ok(ResolutionGuard)
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
