//! Resolver context handed to factories.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{key_of_trait, key_of_type, Key};
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

use super::ServiceProvider;

/// Context passed to factory functions for resolving their dependencies.
///
/// Besides forwarding to the provider it remembers whether a singleton is
/// being built further up the chain, so a Scoped dependency requested from
/// inside it fails with `CaptiveDependency` instead of being captured.
///
/// # Examples
///
/// ```
/// use heist_bootstrap::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Wallet { cash: u32 }
/// struct Shop { wallet: Arc<Wallet> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Wallet { cash: 1200 });
/// services.add_transient_factory::<Shop, _>(|r| Ok(Shop { wallet: r.get::<Wallet>()? }));
///
/// let provider = services.build();
/// assert_eq!(provider.get::<Shop>().unwrap().wallet.cash, 1200);
/// ```
pub struct ResolverContext<'a> {
    provider: &'a ServiceProvider,
    singleton_owner: Option<&'static str>,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(provider: &'a ServiceProvider, singleton_owner: Option<&'static str>) -> Self {
        Self { provider, singleton_owner }
    }

    /// The provider this context resolves from.
    pub fn provider(&self) -> &ServiceProvider {
        self.provider
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve(&self, key: &Key) -> DiResult<AnyArc> {
        self.provider.resolve_with_owner(key, self.singleton_owner)
    }
}

/// Resolved dependencies of an [`Injectable`](crate::Injectable), in declaration order.
pub struct Dependencies {
    entries: Vec<(Key, AnyArc)>,
}

impl Dependencies {
    pub(crate) fn resolve(r: &ResolverContext, keys: Vec<Key>) -> DiResult<Self> {
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let value = r.resolve(&key)?;
            entries.push((key, value));
        }
        Ok(Self { entries })
    }

    fn lookup(&self, key: &Key) -> DiResult<&AnyArc> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or(DiError::Unregistered(key.display_name()))
    }

    /// A declared concrete dependency.
    ///
    /// Fails with `Unregistered` when `T` was not in the declared list.
    pub fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.lookup(&key_of_type::<T>())?
            .clone()
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// A declared trait dependency.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.lookup(&key_of_trait::<T>())?
            .clone()
            .downcast::<Arc<T>>()
            .map(|boxed| (*boxed).clone())
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
