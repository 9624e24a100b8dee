//! Service registration types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BoxError, DiError, DiResult};
use crate::key::{key_of_type, Key};
use crate::lifetime::Lifetime;
use crate::provider::{Dependencies, ResolverContext};
use crate::traits::{Injectable, Resolver};

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;
pub(crate) type DisposeHook = Arc<dyn Fn(&AnyArc) + Send + Sync>;
pub(crate) type InitHook = Arc<dyn Fn(&AnyArc) -> Result<(), BoxError> + Send + Sync>;

/// How a registration produces its instance.
///
/// A producer is either a factory closure, a forward to another registered
/// implementation, or a constructor-style [`Injectable`] that lists its
/// dependency keys up front. The typed `ServiceCollection::add_*` helpers pick
/// the right producer for you; build one directly only when calling
/// `ServiceCollection::register` with an explicit key.
///
/// # Examples
///
/// ```rust
/// use heist_bootstrap::{key_of_type, Lifetime, Producer, Resolver, ServiceCollection};
///
/// struct Heat(u8);
///
/// let mut services = ServiceCollection::new();
/// services.register(
///     key_of_type::<Heat>(),
///     Lifetime::Singleton,
///     Producer::factory(|_| Ok(Heat(3))),
/// );
///
/// let provider = services.build();
/// assert_eq!(provider.get::<Heat>().unwrap().0, 3);
/// ```
pub struct Producer {
    pub(crate) ctor: Ctor,
    pub(crate) dependencies: Vec<Key>,
    pub(crate) impl_name: &'static str,
}

impl Producer {
    /// Factory producing a concrete `T`.
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        let ctor = move |r: &ResolverContext| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(r)?))
        };
        Self {
            ctor: Arc::new(ctor),
            dependencies: Vec::new(),
            impl_name: std::any::type_name::<T>(),
        }
    }

    /// Factory producing a trait object for a `dyn Trait` contract.
    pub fn trait_factory<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        // Arc<Arc<dyn Trait>> storage: the inner Arc is the shareable handle
        let ctor = move |r: &ResolverContext| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(r)?))
        };
        Self {
            ctor: Arc::new(ctor),
            dependencies: Vec::new(),
            impl_name: std::any::type_name::<T>(),
        }
    }

    /// Pre-built instance. Always pair with [`Lifetime::Singleton`].
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        let arc: AnyArc = Arc::new(value);
        Self {
            ctor: Arc::new(move |_: &ResolverContext| -> DiResult<AnyArc> { Ok(arc.clone()) }),
            dependencies: Vec::new(),
            impl_name: std::any::type_name::<T>(),
        }
    }

    /// Pre-built trait object. Always pair with [`Lifetime::Singleton`].
    pub fn trait_instance<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        let arc: AnyArc = Arc::new(value);
        Self {
            ctor: Arc::new(move |_: &ResolverContext| -> DiResult<AnyArc> { Ok(arc.clone()) }),
            dependencies: Vec::new(),
            impl_name: std::any::type_name::<T>(),
        }
    }

    /// Constructor-style producer: resolves `T::dependencies()` in order,
    /// then calls `T::construct`.
    pub fn injectable<T: Injectable>() -> Self {
        let ctor = |r: &ResolverContext| -> DiResult<AnyArc> {
            let deps = Dependencies::resolve(r, T::dependencies())?;
            Ok(Arc::new(T::construct(&deps)?))
        };
        Self {
            ctor: Arc::new(ctor),
            dependencies: T::dependencies(),
            impl_name: std::any::type_name::<T>(),
        }
    }

    /// Forwards a trait contract to the registered implementation `I`.
    ///
    /// `I` keeps its own lifetime; `cast` performs the unsizing coercion
    /// (`|imp| imp`) that cannot be written generically.
    pub fn implementation<T, I>(cast: fn(Arc<I>) -> Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        I: Send + Sync + 'static,
    {
        let ctor = move |r: &ResolverContext| -> DiResult<AnyArc> {
            let imp = r.get::<I>()?;
            Ok(Arc::new(cast(imp)))
        };
        Self {
            ctor: Arc::new(ctor),
            dependencies: vec![key_of_type::<I>()],
            impl_name: std::any::type_name::<I>(),
        }
    }
}

/// Service registration with lifetime and constructor
pub(crate) struct Registration {
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Ctor,
    /// Declared dependency keys, consulted by validation
    pub(crate) dependencies: Vec<Key>,
    pub(crate) impl_name: &'static str,
    pub(crate) dispose: Option<DisposeHook>,
    pub(crate) initialize: Option<InitHook>,
    /// Resolved during the Instantiating phase
    pub(crate) eager: bool,
    /// Singleton cache; the lock is held while the producer runs
    pub(crate) singleton: Option<Mutex<Option<AnyArc>>>,
}

impl Registration {
    pub(crate) fn new(lifetime: Lifetime, producer: Producer) -> Self {
        let singleton = match lifetime {
            Lifetime::Singleton => Some(Mutex::new(None)),
            _ => None,
        };

        Self {
            lifetime,
            ctor: producer.ctor,
            dependencies: producer.dependencies,
            impl_name: producer.impl_name,
            dispose: None,
            initialize: None,
            eager: false,
            singleton,
        }
    }

    /// Drops any cached singleton so the next resolution rebuilds it.
    pub(crate) fn clear_cache(&self) {
        if let Some(slot) = &self.singleton {
            slot.lock().take();
        }
    }
}

/// Service registry holding all registrations in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Vec<(Key, Registration)>,
    index: HashMap<Key, usize>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a registration, replacing any previous one for the key.
    ///
    /// A replacement keeps the original position in registration order.
    /// Also returns true when an earlier registration was replaced.
    pub(crate) fn insert(&mut self, key: Key, registration: Registration) -> (&mut Registration, bool) {
        match self.index.get(&key).copied() {
            Some(pos) => {
                self.entries[pos] = (key, registration);
                (&mut self.entries[pos].1, true)
            }
            None => {
                let pos = self.entries.len();
                self.index.insert(key, pos);
                self.entries.push((key, registration));
                (&mut self.entries[pos].1, false)
            }
        }
    }

    #[inline(always)]
    pub(crate) fn get(&self, key: &Key) -> Option<&Registration> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    /// Key-registration pairs in registration order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Key, &Registration)> {
        self.entries.iter().map(|(k, r)| (k, r))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks declared dependencies against the table.
    pub(crate) fn validate(&self) -> DiResult<()> {
        for (key, reg) in self.iter() {
            for dep in &reg.dependencies {
                let Some(dep_reg) = self.get(dep) else {
                    return Err(DiError::MissingDependency {
                        service: key.display_name(),
                        dependency: dep.display_name(),
                    });
                };
                if reg.lifetime == Lifetime::Singleton && dep_reg.lifetime == Lifetime::Scoped {
                    return Err(DiError::CaptiveDependency {
                        singleton: key.display_name(),
                        scoped: dep.display_name(),
                    });
                }
            }
        }
        Ok(())
    }
}
