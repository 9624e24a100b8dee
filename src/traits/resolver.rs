//! Resolver traits for service resolution.

use std::any::Any;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{key_of_trait, key_of_type, Key};

/// Object-safe resolution by key.
///
/// Implemented by [`ServiceProvider`](crate::ServiceProvider) and by the
/// [`ResolverContext`](crate::ResolverContext) handed to factories. Most code
/// uses the typed methods of [`Resolver`] instead.
pub trait ResolverCore: Send + Sync {
    /// Resolves the instance registered for `key`, honoring its lifetime.
    ///
    /// # Errors
    ///
    /// `Unregistered` when nothing is registered, `CyclicDependency` when the
    /// key is already under construction on this thread, `ScopeNotActive` for
    /// a Scoped key with no open scope, or whatever the producer reported.
    fn resolve(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>>;

    /// Like [`resolve`](Self::resolve), but any failure is `None`.
    ///
    /// The error is logged at debug level and dropped. Use
    /// [`resolve_optional`](Self::resolve_optional) when a registered service
    /// that fails to build must not be mistaken for an absent one.
    fn try_resolve(&self, key: &Key) -> Option<Arc<dyn Any + Send + Sync>> {
        match self.resolve(key) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::debug!(service = key.display_name(), %error, "optional resolution absent");
                None
            }
        }
    }

    /// Strict optional resolution: only `Unregistered` for `key` itself is
    /// `None`, every other failure is returned.
    fn resolve_optional(&self, key: &Key) -> DiResult<Option<Arc<dyn Any + Send + Sync>>> {
        match self.resolve(key) {
            Ok(value) => Ok(Some(value)),
            Err(DiError::Unregistered(name)) if name == key.display_name() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Typed resolution helpers built on [`ResolverCore`].
///
/// # Examples
///
/// ```
/// use heist_bootstrap::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// trait Audio: Send + Sync {
///     fn volume(&self) -> u8;
/// }
///
/// struct Mixer;
/// impl Audio for Mixer {
///     fn volume(&self) -> u8 { 7 }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(42usize);
/// services.add_singleton_trait::<dyn Audio>(Arc::new(Mixer));
///
/// let provider = services.build();
/// assert_eq!(*provider.get::<usize>().unwrap(), 42);
/// assert_eq!(provider.get_trait::<dyn Audio>().unwrap().volume(), 7);
/// assert!(provider.try_get::<u8>().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve(&key_of_type::<T>())?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a trait contract such as `dyn Audio`.
    fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve(&key_of_trait::<T>())?;
        // Arc<Arc<dyn Trait>> storage pattern
        any.downcast::<Arc<T>>()
            .map(|boxed| (*boxed).clone())
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a concrete service type, or `None` if it cannot be resolved.
    fn try_get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.try_resolve(&key_of_type::<T>())?.downcast::<T>().ok()
    }

    /// Resolves a trait contract, or `None` if it cannot be resolved.
    fn try_get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.try_resolve(&key_of_trait::<T>())?
            .downcast::<Arc<T>>()
            .ok()
            .map(|boxed| (*boxed).clone())
    }

    /// Resolves a concrete service type that may not be registered.
    ///
    /// # Errors
    ///
    /// Any failure other than `T` itself being unregistered.
    fn get_optional<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        match self.resolve_optional(&key_of_type::<T>())? {
            Some(any) => any
                .downcast::<T>()
                .map(Some)
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>())),
            None => Ok(None),
        }
    }

    /// Resolves a trait contract that may not be registered.
    ///
    /// # Errors
    ///
    /// Any failure other than `T` itself being unregistered.
    fn get_optional_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        match self.resolve_optional(&key_of_trait::<T>())? {
            Some(any) => any
                .downcast::<Arc<T>>()
                .map(|boxed| Some((*boxed).clone()))
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>())),
            None => Ok(None),
        }
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
