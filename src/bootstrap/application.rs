//! The root object returned by a successful startup.

use std::sync::Arc;

use super::loader::{ContentLoader, LoadHandle};
use crate::cancellation::CancellationToken;
use crate::provider::{ScopeHandle, ScopeId, ServiceProvider};

/// Switch for end-user input.
///
/// Optional: register it with `add_singleton_trait::<dyn InputGate>` (or any
/// trait registration) and the orchestrator enables it on reaching Complete.
/// It is never enabled on a failed or cancelled startup.
pub trait InputGate: Send + Sync {
    fn set_enabled(&self, enabled: bool);
}

/// Owns everything a completed startup produced: the provider, the run scope
/// and the loaded content.
///
/// Hand references to the provider down to consumers; there is no global
/// accessor. Call [`shutdown`](Self::shutdown) to tear down; dropping the
/// application without it still closes the scope and disposes singletons,
/// but cannot unload content.
pub struct Application {
    provider: ServiceProvider,
    run_scope: Option<ScopeHandle>,
    content: Option<LoadHandle>,
    input: Option<Arc<dyn InputGate>>,
    loader: Arc<dyn ContentLoader>,
}

impl Application {
    pub(crate) fn new(
        provider: ServiceProvider,
        run_scope: ScopeHandle,
        content: Option<LoadHandle>,
        input: Option<Arc<dyn InputGate>>,
        loader: Arc<dyn ContentLoader>,
    ) -> Self {
        Self {
            provider,
            run_scope: Some(run_scope),
            content,
            input,
            loader,
        }
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// The scope opened for the whole run.
    pub fn run_scope(&self) -> Option<ScopeId> {
        self.run_scope.as_ref().map(ScopeHandle::id)
    }

    /// Content loaded during startup.
    pub fn content(&self) -> Option<&LoadHandle> {
        self.content.as_ref()
    }

    /// Disables input, unloads content, closes the run scope (and anything
    /// left open inside it) and disposes all singletons.
    pub async fn shutdown(mut self) {
        if let Some(gate) = self.input.take() {
            gate.set_enabled(false);
        }
        if let Some(content) = self.content.take() {
            if let Err(error) = self.loader.unload(content.name(), CancellationToken::new()).await {
                tracing::warn!(content = content.name(), %error, "failed to unload content during shutdown");
            }
        }
        self.release();
        tracing::info!("application shut down");
    }

    fn release(&mut self) {
        if let Some(mut scope) = self.run_scope.take() {
            if let Err(error) = scope.end() {
                // dropping the handle closes any scopes left open inside it
                tracing::warn!(%error, "run scope was not innermost at shutdown");
            }
        }
        self.provider.dispose_all();
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        if self.run_scope.is_some() {
            tracing::warn!("Application dropped without shutdown(); disposing services");
            if let Some(gate) = self.input.take() {
                gate.set_enabled(false);
            }
            self.release();
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("services", &self.provider.len())
            .field("run_scope", &self.run_scope())
            .field("content", &self.content)
            .finish()
    }
}
