//! Grouping registrations into reusable modules.

use crate::error::DiResult;

use super::ServiceCollection;

/// A group of registrations applied during the Binding phase.
///
/// Modules are run in the order they were added to the orchestrator, all
/// into the same collection, so a later module can override an earlier one.
///
/// # Example
///
/// ```rust
/// use heist_bootstrap::{DiResult, Resolver, ServiceCollection, ServiceModule};
///
/// struct Suspicion(f32);
///
/// struct GameplayModule;
///
/// impl ServiceModule for GameplayModule {
///     fn register_services(&self, services: &mut ServiceCollection) -> DiResult<()> {
///         services.add_singleton(Suspicion(0.0)).at_startup();
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_module(&GameplayModule)?;
/// let provider = services.build();
/// assert_eq!(provider.get::<Suspicion>()?.0, 0.0);
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule: Send + Sync {
    /// Register this module's services.
    fn register_services(&self, services: &mut ServiceCollection) -> DiResult<()>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl ServiceCollection {
    /// Applies a module to this collection.
    pub fn add_module<M: ServiceModule + ?Sized>(&mut self, module: &M) -> DiResult<&mut Self> {
        tracing::debug!(module = module.name(), "registering module");
        module.register_services(self)?;
        Ok(self)
    }
}
