//! Service collection: the registration side of the container.
//!
//! All registration happens on a [`ServiceCollection`]. Calling
//! [`build`](ServiceCollection::build) consumes it and freezes the table into
//! a [`ServiceProvider`], which has no registration API.

use std::any::Any;
use std::sync::Arc;

use crate::descriptors::ServiceDescriptor;
use crate::error::DiResult;
use crate::key::{key_of_trait, key_of_type, Key};
use crate::lifetime::Lifetime;
use crate::provider::{ResolverContext, ServiceProvider};
use crate::registration::{AnyArc, Producer, Registration, Registry};
use crate::traits::{Dispose, Initializable, Injectable};

pub mod module_system;
pub use module_system::ServiceModule;

/// Mutable table of service registrations.
///
/// Registering a key twice replaces the earlier registration (last write
/// wins) but keeps its place in registration order, which is the order used
/// for startup materialization and initialization.
///
/// # Examples
///
/// ```rust
/// use heist_bootstrap::{Lifetime, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// trait Alarm: Send + Sync {
///     fn armed(&self) -> bool;
/// }
///
/// struct Siren;
/// impl Alarm for Siren {
///     fn armed(&self) -> bool { true }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_factory::<Siren, _>(|_| Ok(Siren));
/// services.bind_trait::<dyn Alarm, Siren>(Lifetime::Transient, |s| s);
///
/// let provider = services.build();
/// assert!(provider.get_trait::<dyn Alarm>().unwrap().armed());
/// ```
pub struct ServiceCollection {
    registry: Registry,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// Registers `producer` under an explicit key.
    ///
    /// The returned entry can only be marked [`at_startup`](ServiceEntry::at_startup);
    /// use the typed `add_*` methods to attach disposal or initialization.
    pub fn register(
        &mut self,
        key: Key,
        lifetime: Lifetime,
        producer: Producer,
    ) -> ServiceEntry<'_, dyn Any + Send + Sync> {
        self.insert::<dyn Any + Send + Sync>(key, lifetime, producer, erased)
    }

    // ----- Concrete types -----

    /// Registers a pre-built instance. Always a Singleton.
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> ServiceEntry<'_, T> {
        self.insert(
            key_of_type::<T>(),
            Lifetime::Singleton,
            Producer::instance(value),
            downcast_concrete::<T>,
        )
    }

    /// Registers a factory whose result is built once and shared.
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> ServiceEntry<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, factory)
    }

    /// Registers a factory whose result is shared within the innermost scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> ServiceEntry<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory)
    }

    /// Registers a factory invoked on every resolution.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> ServiceEntry<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, factory)
    }

    fn add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> ServiceEntry<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.insert(
            key_of_type::<T>(),
            lifetime,
            Producer::factory(factory),
            downcast_concrete::<T>,
        )
    }

    /// Registers a constructor-style service with declared dependencies.
    pub fn add_injectable<T: Injectable>(&mut self, lifetime: Lifetime) -> ServiceEntry<'_, T> {
        self.insert(
            key_of_type::<T>(),
            lifetime,
            Producer::injectable::<T>(),
            downcast_concrete::<T>,
        )
    }

    // ----- Trait contracts -----

    /// Registers a pre-built trait object. Always a Singleton.
    ///
    /// ```rust
    /// use heist_bootstrap::{Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync {
    ///     fn now(&self) -> u64;
    /// }
    /// struct Frozen;
    /// impl Clock for Frozen {
    ///     fn now(&self) -> u64 { 1000 }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait::<dyn Clock>(Arc::new(Frozen));
    /// let provider = services.build();
    /// assert_eq!(provider.get_trait::<dyn Clock>().unwrap().now(), 1000);
    /// ```
    pub fn add_singleton_trait<T>(&mut self, value: Arc<T>) -> ServiceEntry<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(
            key_of_trait::<T>(),
            Lifetime::Singleton,
            Producer::trait_instance(value),
            downcast_trait::<T>,
        )
    }

    /// Registers a factory for a trait contract with the given lifetime.
    pub fn add_trait_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> ServiceEntry<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.insert(
            key_of_trait::<T>(),
            lifetime,
            Producer::trait_factory(factory),
            downcast_trait::<T>,
        )
    }

    /// Binds a trait contract to the registered implementation `I`.
    ///
    /// Every resolution of the contract resolves `I` (honoring `I`'s own
    /// lifetime), then caches the coerced handle according to `lifetime`.
    pub fn bind_trait<T, I>(&mut self, lifetime: Lifetime, cast: fn(Arc<I>) -> Arc<T>) -> ServiceEntry<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        I: Send + Sync + 'static,
    {
        self.insert(
            key_of_trait::<T>(),
            lifetime,
            Producer::implementation::<T, I>(cast),
            downcast_trait::<T>,
        )
    }

    fn insert<T: ?Sized + 'static>(
        &mut self,
        key: Key,
        lifetime: Lifetime,
        producer: Producer,
        extract: fn(&AnyArc) -> Option<Arc<T>>,
    ) -> ServiceEntry<'_, T> {
        let (registration, replaced) = self.registry.insert(key, Registration::new(lifetime, producer));
        if replaced {
            tracing::debug!(service = key.display_name(), ?lifetime, "registration replaced");
        }
        ServiceEntry { registration, extract }
    }

    // ----- Introspection -----

    pub fn is_registered(&self, key: &Key) -> bool {
        self.registry.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    /// Descriptors of every registration, in registration order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.registry
            .iter()
            .map(|(k, r)| ServiceDescriptor::from_registration(k, r))
            .collect()
    }

    /// Checks the declared dependencies of constructor-style and forwarding
    /// registrations.
    ///
    /// Factories resolve dependencies inside a closure, so their needs are
    /// only discovered at resolution time.
    ///
    /// # Errors
    ///
    /// `MissingDependency` for a declared key with no registration,
    /// `CaptiveDependency` for a Singleton declaring a Scoped dependency.
    pub fn validate(&self) -> DiResult<()> {
        self.registry.validate()
    }

    /// Freezes the registrations into a provider.
    pub fn build(self) -> ServiceProvider {
        tracing::debug!(services = self.registry.len(), "service provider built");
        ServiceProvider::new(self.registry)
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

fn erased(any: &AnyArc) -> Option<AnyArc> {
    Some(any.clone())
}

fn downcast_concrete<T: Send + Sync + 'static>(any: &AnyArc) -> Option<Arc<T>> {
    any.clone().downcast::<T>().ok()
}

fn downcast_trait<T: ?Sized + Send + Sync + 'static>(any: &AnyArc) -> Option<Arc<T>> {
    any.clone()
        .downcast::<Arc<T>>()
        .ok()
        .map(|boxed| (*boxed).clone())
}

/// A just-added registration, for attaching capabilities.
///
/// ```rust
/// use heist_bootstrap::{BoxError, Dispose, Initializable, ServiceCollection};
///
/// struct SaveSlots;
/// impl Initializable for SaveSlots {
///     fn initialize(&self) -> Result<(), BoxError> { Ok(()) }
/// }
/// impl Dispose for SaveSlots {
///     fn dispose(&self) {}
/// }
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_singleton_factory::<SaveSlots, _>(|_| Ok(SaveSlots))
///     .initializable()
///     .disposable()
///     .at_startup();
///
/// let d = &services.descriptors()[0];
/// assert!(d.eager && d.initializable && d.disposable);
/// ```
pub struct ServiceEntry<'a, T: ?Sized + 'static> {
    registration: &'a mut Registration,
    extract: fn(&AnyArc) -> Option<Arc<T>>,
}

impl<T: ?Sized + 'static> ServiceEntry<'_, T> {
    /// Materialize this service during the Instantiating phase.
    pub fn at_startup(self) -> Self {
        self.registration.eager = true;
        self
    }

    pub fn lifetime(&self) -> Lifetime {
        self.registration.lifetime
    }
}

impl<T: ?Sized + Dispose> ServiceEntry<'_, T> {
    /// Call [`Dispose::dispose`] when the instance's owner is torn down.
    ///
    /// The owner of a Singleton is the provider and of a Scoped instance its
    /// scope. A Transient is owned by the innermost scope open when it was
    /// resolved, or by the provider if none was. The owner keeps every such
    /// transient alive until it closes, so resolving a disposable transient
    /// repeatedly inside a long-lived scope (such as the run scope of an
    /// `Application`) grows memory until shutdown. Open a shorter scope
    /// around such work, or make the service Scoped.
    pub fn disposable(self) -> Self {
        let extract = self.extract;
        self.registration.dispose = Some(Arc::new(move |any: &AnyArc| {
            if let Some(service) = extract(any) {
                service.dispose();
            }
        }));
        self
    }
}

impl<T: ?Sized + Initializable> ServiceEntry<'_, T> {
    /// Call [`Initializable::initialize`] during the Initializing phase.
    ///
    /// Only takes effect together with [`at_startup`](Self::at_startup).
    pub fn initializable(self) -> Self {
        let extract = self.extract;
        self.registration.initialize = Some(Arc::new(move |any: &AnyArc| match extract(any) {
            Some(service) => service.initialize(),
            None => Ok(()),
        }));
        self
    }
}
