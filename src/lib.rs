//! # heist-bootstrap
//!
//! Application bootstrap for the heist prototype: a service-lifetime
//! container and a deterministic, cancellable, multi-phase startup
//! orchestrator built on it.
//!
//! ## Container
//!
//! - **Lifetimes**: Singleton (one per provider), Scoped (one per open
//!   scope), Transient (new on every resolution)
//! - **Explicit producers**: factories, trait forwards and constructor-style
//!   [`Injectable`] services with declared dependency keys; no reflection
//! - **Cycle detection**: re-entrant resolution fails with
//!   [`DiError::CyclicDependency`] instead of overflowing the stack
//! - **Strict scopes**: scopes nest LIFO and dispose their instances in
//!   reverse creation order
//!
//! ```rust
//! use heist_bootstrap::{DiError, Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! struct Logger;
//! struct ConfigStore { logger: Arc<Logger> }
//! struct Session { config: Arc<ConfigStore> }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Logger);
//! services.add_singleton_factory::<ConfigStore, _>(|r| Ok(ConfigStore { logger: r.get()? }));
//! services.add_scoped_factory::<Session, _>(|r| Ok(Session { config: r.get()? }));
//! let provider = services.build();
//!
//! let mut scope = provider.begin_scope();
//! let a = provider.get::<Session>().unwrap();
//! let b = provider.get::<Session>().unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! scope.end().unwrap();
//!
//! assert!(matches!(provider.get::<Session>(), Err(DiError::ScopeNotActive)));
//! ```
//!
//! ## Startup
//!
//! [`BootstrapOrchestrator`] runs Bind → Instantiate → Initialize →
//! LoadContent → Activate, reporting weighted progress to
//! [`BootstrapObserver`]s and a `tokio::sync::watch` channel. See the
//! `startup` demo for a complete run.

pub mod bootstrap;
pub mod cancellation;
pub mod collection;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod provider;
pub mod traits;

// Internal modules
mod internal;
mod registration;

pub use bootstrap::{
    ActivationStep, Application, BootstrapError, BootstrapObserver, BootstrapOrchestrator,
    BootstrapOrchestratorBuilder, BootstrapState, ContentLoader, InputGate, LoadError, LoadHandle,
    LoggingObserver, NoopLoader, PhaseKind, ProgressEvent, StartupState, StepError,
};
pub use cancellation::{CancellationError, CancellationToken};
pub use collection::{ServiceCollection, ServiceEntry, ServiceModule};
pub use config::{BootstrapConfig, ConfigError, PhaseWeights};
pub use descriptors::ServiceDescriptor;
pub use error::{BoxError, DiError, DiResult};
pub use key::{key_of_trait, key_of_type, Key};
pub use lifetime::Lifetime;
pub use provider::{Dependencies, ResolverContext, ScopeHandle, ScopeId, ServiceProvider};
pub use registration::Producer;
pub use traits::{Dispose, Initializable, Injectable, Resolver, ResolverCore};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_container_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ServiceProvider>();
        assert_send_sync::<ScopeHandle>();
        assert_send_sync::<BootstrapOrchestrator>();
        assert_send_sync::<CancellationToken>();
    }

    #[test]
    fn test_trait_forward_shares_implementation_singleton() {
        trait Radio: Send + Sync {
            fn channel(&self) -> u8;
        }
        struct Walkie;
        impl Radio for Walkie {
            fn channel(&self) -> u8 {
                9
            }
        }

        let mut sc = ServiceCollection::new();
        sc.add_singleton_factory::<Walkie, _>(|_| Ok(Walkie));
        sc.bind_trait::<dyn Radio, Walkie>(Lifetime::Transient, |w| w);
        let sp = sc.build();

        let concrete = sp.get::<Walkie>().unwrap();
        let via_trait = sp.get_trait::<dyn Radio>().unwrap();
        assert_eq!(via_trait.channel(), 9);
        assert!(std::ptr::eq(
            Arc::as_ptr(&concrete) as *const u8,
            Arc::as_ptr(&via_trait) as *const u8
        ));
    }
}
