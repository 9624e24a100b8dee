//! Service lifetime definitions.

use serde::{Deserialize, Serialize};

/// Lifetime policy governing how instances are shared.
///
/// # Examples
///
/// ```rust
/// use heist_bootstrap::{Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Clock;
/// struct Session;
/// struct Ping;
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Clock);
/// services.add_scoped_factory::<Session, _>(|_| Ok(Session));
/// services.add_transient_factory::<Ping, _>(|_| Ok(Ping));
///
/// let provider = services.build();
///
/// // Singleton: one instance for the provider
/// let a = provider.get::<Clock>().unwrap();
/// let b = provider.get::<Clock>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// // Scoped: one per open scope
/// let scope = provider.begin_scope();
/// let s1 = provider.get::<Session>().unwrap();
/// let s2 = provider.get::<Session>().unwrap();
/// assert!(Arc::ptr_eq(&s1, &s2));
/// drop(scope);
///
/// // Transient: always new
/// let p1 = provider.get::<Ping>().unwrap();
/// let p2 = provider.get::<Ping>().unwrap();
/// assert!(!Arc::ptr_eq(&p1, &p2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Single instance per provider, created lazily on first resolution
    Singleton,
    /// Single instance per open scope, owned by the innermost scope at creation
    Scoped,
    /// New instance per resolution, never cached
    Transient,
}
