//! Service provider: resolution of registered services.
//!
//! The provider owns the frozen [`Registry`], the singleton caches (inside
//! each registration), the root disposal bag and the scope stack.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::descriptors::ServiceDescriptor;
use crate::error::{BoxError, DiError, DiResult};
use crate::internal::{DisposeBag, ResolutionGuard};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Registration, Registry};
use crate::traits::ResolverCore;

pub mod context;
pub mod scope;

pub use context::{Dependencies, ResolverContext};
pub use scope::{ScopeHandle, ScopeId};
use scope::ScopeStack;

/// Resolves services according to their lifetimes.
///
/// Built by [`ServiceCollection::build`](crate::ServiceCollection::build);
/// there is no way to register anything afterwards. Cloning is cheap and
/// shares all state.
///
/// # Examples
///
/// ```
/// use heist_bootstrap::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Config { difficulty: u8 }
/// struct Director { config: Arc<Config> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Config { difficulty: 2 });
/// services.add_transient_factory::<Director, _>(|r| {
///     Ok(Director { config: r.get::<Config>()? })
/// });
///
/// let provider = services.build();
/// assert_eq!(provider.get::<Director>().unwrap().config.difficulty, 2);
/// ```
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    registry: Registry,
    root_disposers: Mutex<DisposeBag>,
    scopes: Mutex<ScopeStack>,
}

/// An instance created during the Instantiating phase.
pub(crate) struct Materialized {
    pub(crate) key: Key,
    pub(crate) instance: AnyArc,
}

impl ServiceProvider {
    pub(crate) fn new(registry: Registry) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                registry,
                root_disposers: Mutex::new(DisposeBag::default()),
                scopes: Mutex::new(ScopeStack::default()),
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ProviderInner {
        &self.inner
    }

    /// True when `key` has a registration.
    pub fn is_registered(&self, key: &Key) -> bool {
        self.inner.registry.contains_key(key)
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descriptors of every registration, in registration order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.inner
            .registry
            .iter()
            .map(|(k, r)| ServiceDescriptor::from_registration(k, r))
            .collect()
    }

    /// Closes every open scope, runs the root disposers in LIFO order and
    /// drops all cached singletons.
    ///
    /// Afterwards the provider holds no instances; resolving again starts
    /// from scratch.
    ///
    /// # Examples
    ///
    /// ```
    /// use heist_bootstrap::{Dispose, ServiceCollection, Resolver};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// static DISPOSED: AtomicUsize = AtomicUsize::new(0);
    ///
    /// struct Telemetry;
    /// impl Dispose for Telemetry {
    ///     fn dispose(&self) {
    ///         DISPOSED.fetch_add(1, Ordering::SeqCst);
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_factory::<Telemetry, _>(|_| Ok(Telemetry)).disposable();
    ///
    /// let provider = services.build();
    /// let first = provider.get::<Telemetry>().unwrap();
    /// provider.dispose_all();
    /// assert_eq!(DISPOSED.load(Ordering::SeqCst), 1);
    ///
    /// let second = provider.get::<Telemetry>().unwrap();
    /// assert!(!Arc::ptr_eq(&first, &second));
    /// # provider.dispose_all();
    /// ```
    pub fn dispose_all(&self) {
        let scopes = self.close_all_scopes();
        let mut disposed = 0;
        // hooks may resolve from this provider and push new disposers
        loop {
            let mut bag = std::mem::take(&mut *self.inner.root_disposers.lock());
            if bag.is_empty() {
                break;
            }
            disposed += bag.run_all_reverse();
        }
        for (_, reg) in self.inner.registry.iter() {
            reg.clear_cache();
        }
        tracing::debug!(scopes, disposed, "provider disposed");
    }

    /// Resolves `key`, remembering the singleton (if any) being built above it.
    pub(crate) fn resolve_with_owner(
        &self,
        key: &Key,
        singleton_owner: Option<&'static str>,
    ) -> DiResult<AnyArc> {
        let name = key.display_name();
        let reg = self
            .inner
            .registry
            .get(key)
            .ok_or(DiError::Unregistered(name))?;

        let _guard = ResolutionGuard::enter(key)?;

        match reg.lifetime {
            Lifetime::Singleton => self.resolve_singleton(key, reg),
            Lifetime::Scoped => {
                if let Some(singleton) = singleton_owner {
                    return Err(DiError::CaptiveDependency { singleton, scoped: name });
                }
                self.resolve_scoped(key, reg)
            }
            Lifetime::Transient => {
                let ctx = ResolverContext::new(self, singleton_owner);
                let value = (reg.ctor)(&ctx)?;
                if let Some(hook) = &reg.dispose {
                    self.track_disposable(name, hook.clone(), value.clone());
                }
                Ok(value)
            }
        }
    }

    /// Singleton resolution: the slot lock is held while the producer runs,
    /// so concurrent first resolutions build exactly one instance.
    fn resolve_singleton(&self, key: &Key, reg: &Registration) -> DiResult<AnyArc> {
        let name = key.display_name();
        let ctx = ResolverContext::new(self, Some(name));

        let Some(slot) = &reg.singleton else {
            // Registration::new always allocates a slot for singletons
            return (reg.ctor)(&ctx);
        };

        let mut cached = slot.lock();
        if let Some(value) = cached.as_ref() {
            return Ok(value.clone());
        }

        let value = (reg.ctor)(&ctx)?;
        *cached = Some(value.clone());
        drop(cached);

        if let Some(hook) = &reg.dispose {
            let hook = hook.clone();
            let instance = value.clone();
            self.inner
                .root_disposers
                .lock()
                .push(name, Box::new(move || hook(&instance)));
        }
        tracing::debug!(service = name, "singleton created");
        Ok(value)
    }

    /// Resolves every registration marked `at_startup`, in registration order.
    pub(crate) fn materialize_eager(&self) -> DiResult<Vec<Materialized>> {
        let mut out = Vec::new();
        for (key, reg) in self.inner.registry.iter() {
            if !reg.eager {
                continue;
            }
            let instance = self.resolve(key)?;
            tracing::debug!(service = key.display_name(), lifetime = ?reg.lifetime, "materialized");
            out.push(Materialized { key: *key, instance });
        }
        Ok(out)
    }

    /// Runs the `initialize` hook of a materialized instance, if registered.
    pub(crate) fn initialize(&self, item: &Materialized) -> Option<Result<(), BoxError>> {
        let reg = self.inner.registry.get(&item.key)?;
        reg.initialize.as_ref().map(|hook| hook(&item.instance))
    }
}

impl Clone for ServiceProvider {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Drop for ServiceProvider {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            if let Some(bag) = self.inner.root_disposers.try_lock() {
                if !bag.is_empty() {
                    tracing::warn!("ServiceProvider dropped with undisposed singletons; call dispose_all() first");
                }
            }
        }
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve(&self, key: &Key) -> DiResult<AnyArc> {
        self.resolve_with_owner(key, None)
    }
}
