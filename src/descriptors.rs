//! Service descriptors for introspection and diagnostics.

use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::Registration;

/// Snapshot of one registration.
///
/// # Examples
///
/// ```rust
/// use heist_bootstrap::{Lifetime, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Map { floors: u8 }
/// struct Guard;
///
/// trait Hud: Send + Sync {}
/// struct Overlay;
/// impl Hud for Overlay {}
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Map { floors: 3 }).at_startup();
/// services.add_scoped_factory::<Guard, _>(|_| Ok(Guard));
/// services.add_singleton_trait::<dyn Hud>(Arc::new(Overlay));
///
/// let descriptors = services.descriptors();
/// assert_eq!(descriptors.len(), 3);
///
/// let map = descriptors.iter().find(|d| d.type_name().contains("Map")).unwrap();
/// assert_eq!(map.lifetime, Lifetime::Singleton);
/// assert!(map.eager);
///
/// let hud = descriptors.iter().find(|d| d.is_trait()).unwrap();
/// assert!(hud.type_name().contains("Hud"));
/// ```
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// The service key
    pub key: Key,
    pub lifetime: Lifetime,
    /// Type produced by the registration's producer
    pub impl_type_name: &'static str,
    /// Declared dependency keys, in resolution order
    pub dependencies: Vec<Key>,
    /// Materialized during startup
    pub eager: bool,
    pub disposable: bool,
    pub initializable: bool,
}

impl ServiceDescriptor {
    pub(crate) fn from_registration(key: &Key, reg: &Registration) -> Self {
        Self {
            key: *key,
            lifetime: reg.lifetime,
            impl_type_name: reg.impl_name,
            dependencies: reg.dependencies.clone(),
            eager: reg.eager,
            disposable: reg.dispose.is_some(),
            initializable: reg.initialize.is_some(),
        }
    }

    /// The type or trait name of the contract.
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    /// True for `dyn Trait` contracts.
    pub fn is_trait(&self) -> bool {
        self.key.is_trait()
    }
}
