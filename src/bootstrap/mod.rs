//! Multi-phase, cancellable application startup.
//!
//! [`BootstrapOrchestrator::start`] runs the fixed phase sequence
//! Bind → Instantiate → Initialize → LoadContent → Activate against a fresh
//! container and returns the [`Application`] root on success. Cancellation is
//! cooperative: it is honored at phase boundaries and handed to the content
//! loader at the LoadContent suspension point. On failure or cancellation all
//! scopes are closed and singletons disposed before the terminal state is
//! published.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::cancellation::CancellationToken;
use crate::collection::{ServiceCollection, ServiceModule};
use crate::config::{BootstrapConfig, ConfigError};
use crate::error::BoxError;
use crate::provider::{Materialized, ScopeHandle, ServiceProvider};
use crate::traits::Resolver;

mod application;
mod error;
mod loader;
mod observer;
mod phase;
mod state;

pub use application::{Application, InputGate};
pub use error::{BootstrapError, StepError};
pub use loader::{ContentLoader, LoadError, LoadHandle, NoopLoader};
pub use observer::{BootstrapObserver, LoggingObserver, ProgressEvent};
pub use phase::PhaseKind;
pub use state::{BootstrapState, StartupState};

use observer::Observers;
use phase::ProgressTracker;

/// Spawns entry objects once content is loaded.
pub type ActivationStep = Box<dyn Fn(&ServiceProvider) -> Result<(), BoxError> + Send + Sync>;

/// Drives startup. Each orchestrator starts at most once.
///
/// # Examples
///
/// ```
/// use heist_bootstrap::{
///     BootstrapOrchestrator, BootstrapState, DiResult, Resolver, ServiceCollection, ServiceModule,
/// };
///
/// struct Crew(Vec<&'static str>);
///
/// struct CrewModule;
/// impl ServiceModule for CrewModule {
///     fn register_services(&self, services: &mut ServiceCollection) -> DiResult<()> {
///         services.add_singleton(Crew(vec!["driver", "safecracker"])).at_startup();
///         Ok(())
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let orchestrator = BootstrapOrchestrator::builder()
///     .module(CrewModule)
///     .activate("spawn player", |provider| {
///         let crew = provider.get::<Crew>()?;
///         assert_eq!(crew.0.len(), 2);
///         Ok(())
///     })
///     .build()
///     .unwrap();
///
/// let app = orchestrator.start().await.unwrap();
/// assert_eq!(orchestrator.state().status, BootstrapState::Complete);
/// assert_eq!(orchestrator.state().progress, 1.0);
/// app.shutdown().await;
/// # }
/// ```
pub struct BootstrapOrchestrator {
    modules: Vec<Box<dyn ServiceModule>>,
    loader: Arc<dyn ContentLoader>,
    config: BootstrapConfig,
    observers: Observers,
    activation: Vec<(&'static str, ActivationStep)>,
    token: CancellationToken,
    state: watch::Sender<StartupState>,
    started: AtomicBool,
}

/// Builder for [`BootstrapOrchestrator`].
pub struct BootstrapOrchestratorBuilder {
    modules: Vec<Box<dyn ServiceModule>>,
    loader: Option<Arc<dyn ContentLoader>>,
    config: BootstrapConfig,
    observers: Observers,
    activation: Vec<(&'static str, ActivationStep)>,
}

impl BootstrapOrchestratorBuilder {
    /// Adds a registration module. Modules run in the order added.
    pub fn module<M: ServiceModule + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Sets the content loader. Defaults to [`NoopLoader`].
    pub fn loader<L: ContentLoader + 'static>(self, loader: L) -> Self {
        self.shared_loader(Arc::new(loader))
    }

    pub fn shared_loader(mut self, loader: Arc<dyn ContentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn config(mut self, config: BootstrapConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn BootstrapObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// Adds an activation step, run in order during the Activate phase.
    pub fn activate<F>(mut self, name: &'static str, step: F) -> Self
    where
        F: Fn(&ServiceProvider) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.activation.push((name, Box::new(step)));
        self
    }

    /// # Errors
    ///
    /// The configuration fails validation.
    pub fn build(self) -> Result<BootstrapOrchestrator, ConfigError> {
        self.config.validate()?;
        let (state, _) = watch::channel(StartupState::idle());
        Ok(BootstrapOrchestrator {
            modules: self.modules,
            loader: self.loader.unwrap_or_else(|| Arc::new(NoopLoader)),
            config: self.config,
            observers: self.observers,
            activation: self.activation,
            token: CancellationToken::new(),
            state,
            started: AtomicBool::new(false),
        })
    }
}

/// Everything built so far; torn down if startup does not complete.
#[derive(Default)]
struct Startup {
    provider: Option<ServiceProvider>,
    run_scope: Option<ScopeHandle>,
    materialized: Vec<Materialized>,
    content: Option<LoadHandle>,
    input: Option<Arc<dyn InputGate>>,
    phase: Option<PhaseKind>,
}

impl Startup {
    fn provider(&self, phase: PhaseKind) -> Result<&ServiceProvider, BootstrapError> {
        self.provider
            .as_ref()
            .ok_or_else(|| BootstrapError::phase_failure(phase, "provider was not built"))
    }
}

impl BootstrapOrchestrator {
    pub fn builder() -> BootstrapOrchestratorBuilder {
        BootstrapOrchestratorBuilder {
            modules: Vec::new(),
            loader: None,
            config: BootstrapConfig::default(),
            observers: Observers::default(),
            activation: Vec::new(),
        }
    }

    /// Requests cooperative cancellation.
    ///
    /// Honored at the next phase boundary, or immediately forwarded to an
    /// in-flight content load. No effect once startup has finished.
    pub fn cancel(&self) {
        tracing::info!("startup cancellation requested");
        self.token.cancel();
        self.state.send_if_modified(|s| {
            if s.status.is_terminal() || s.cancelled {
                return false;
            }
            s.cancelled = true;
            true
        });
    }

    /// Token cancelled by [`cancel`](Self::cancel); cancelling it directly
    /// has the same effect.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Watches the startup state.
    pub fn subscribe(&self) -> watch::Receiver<StartupState> {
        self.state.subscribe()
    }

    /// Current startup state.
    pub fn state(&self) -> StartupState {
        self.state.borrow().clone()
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Runs startup to completion, failure or cancellation.
    ///
    /// # Errors
    ///
    /// `AlreadyStarted` on a second call. Otherwise the error that ended
    /// startup; by the time it is returned, every scope is closed and every
    /// singleton disposed.
    pub async fn start(&self) -> Result<Application, BootstrapError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(BootstrapError::AlreadyStarted);
        }

        let tracker = Mutex::new(ProgressTracker::new(&self.config.weights));
        let mut startup = Startup::default();

        match self.run_phases(&mut startup, &tracker).await {
            Ok(()) => self.complete(startup, &tracker),
            Err(error) => {
                self.teardown(&mut startup).await;
                self.finish_with(&error, error.phase().or(startup.phase), &tracker);
                Err(error)
            }
        }
    }

    async fn run_phases(&self, startup: &mut Startup, tracker: &Mutex<ProgressTracker>) -> Result<(), BootstrapError> {
        for phase in PhaseKind::ALL {
            self.checkpoint(phase)?;
            startup.phase = Some(phase);
            let progress = tracker.lock().enter(phase);
            self.report(phase, progress, phase.status_text().to_string());
            tracing::info!(%phase, "phase started");

            match phase {
                PhaseKind::Bind => self.bind(startup)?,
                PhaseKind::Instantiate => self.instantiate(startup)?,
                PhaseKind::Initialize => self.initialize(startup)?,
                PhaseKind::LoadContent => self.load_content(startup, tracker).await?,
                PhaseKind::Activate => self.activate(startup).await?,
            }

            let progress = tracker.lock().exit(phase);
            self.report(phase, progress, format!("{} done", phase.status_text()));
            tracing::info!(%phase, progress, "phase finished");
        }
        // input is only enabled on the way to Complete
        self.checkpoint(PhaseKind::Activate)
    }

    fn checkpoint(&self, phase: PhaseKind) -> Result<(), BootstrapError> {
        if self.token.is_cancelled() {
            Err(BootstrapError::Cancelled { phase })
        } else {
            Ok(())
        }
    }

    fn bind(&self, startup: &mut Startup) -> Result<(), BootstrapError> {
        let phase = PhaseKind::Bind;
        let mut services = ServiceCollection::new();
        for module in &self.modules {
            services
                .add_module(module.as_ref())
                .map_err(|e| BootstrapError::phase_failure(phase, e))?;
        }
        services
            .validate()
            .map_err(|e| BootstrapError::phase_failure(phase, e))?;

        let provider = services.build();
        tracing::debug!(services = provider.len(), modules = self.modules.len(), "services bound");
        startup.run_scope = Some(provider.begin_scope());
        startup.provider = Some(provider);
        Ok(())
    }

    fn instantiate(&self, startup: &mut Startup) -> Result<(), BootstrapError> {
        let phase = PhaseKind::Instantiate;
        let provider = startup.provider(phase)?;
        startup.materialized = provider
            .materialize_eager()
            .map_err(|e| BootstrapError::phase_failure(phase, e))?;
        Ok(())
    }

    fn initialize(&self, startup: &mut Startup) -> Result<(), BootstrapError> {
        let phase = PhaseKind::Initialize;
        let provider = startup.provider(phase)?;
        for item in &startup.materialized {
            let Some(result) = provider.initialize(item) else {
                continue;
            };
            let name = item.key.display_name();
            result.map_err(|source| BootstrapError::phase_failure(phase, StepError { name, source }))?;
            tracing::debug!(service = name, "initialized");
        }
        Ok(())
    }

    async fn load_content(&self, startup: &mut Startup, tracker: &Mutex<ProgressTracker>) -> Result<(), BootstrapError> {
        let phase = PhaseKind::LoadContent;
        let content = self.config.initial_content.as_str();
        let status = format!("Loading {content}");
        let on_progress = |fraction: f64| {
            let progress = tracker.lock().within(phase, fraction);
            self.report(phase, progress, status.clone());
        };

        // the load future is always awaited; cancellation reaches it via the child token
        let result = self
            .loader
            .load(content, &on_progress, self.token.child_token())
            .await;

        match result {
            Ok(handle) => {
                tracing::debug!(content = handle.name(), "content loaded");
                startup.content = Some(handle);
                self.checkpoint(phase)
            }
            Err(LoadError::Cancelled(_)) if self.token.is_cancelled() => Err(BootstrapError::Cancelled { phase }),
            Err(source) => Err(BootstrapError::ExternalLoadFailure {
                content: content.to_string(),
                source,
            }),
        }
    }

    async fn activate(&self, startup: &mut Startup) -> Result<(), BootstrapError> {
        let phase = PhaseKind::Activate;
        let provider = startup.provider(phase)?;
        for (name, step) in &self.activation {
            let name = *name;
            step(provider).map_err(|source| BootstrapError::phase_failure(phase, StepError { name, source }))?;
            tracing::debug!(step = name, "activation step done");
        }
        startup.input = provider
            .get_optional_trait::<dyn InputGate>()
            .map_err(|e| BootstrapError::phase_failure(phase, e))?;

        if let Some(loading) = &self.config.loading_content {
            match self.loader.unload(loading, self.token.child_token()).await {
                Ok(()) => tracing::debug!(content = %loading, "loading content unloaded"),
                Err(LoadError::Cancelled(_)) if self.token.is_cancelled() => {
                    return Err(BootstrapError::Cancelled { phase })
                }
                Err(source) => {
                    return Err(BootstrapError::ExternalLoadFailure {
                        content: loading.clone(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }

    fn complete(&self, mut startup: Startup, tracker: &Mutex<ProgressTracker>) -> Result<Application, BootstrapError> {
        let (Some(provider), Some(run_scope)) = (startup.provider.take(), startup.run_scope.take()) else {
            return Err(BootstrapError::phase_failure(PhaseKind::Activate, "provider was not built"));
        };
        if let Some(gate) = &startup.input {
            gate.set_enabled(true);
        }

        let progress = tracker.lock().current();
        self.state.send_modify(|s| {
            s.status = BootstrapState::Complete;
            s.progress = progress;
            s.status_text = "Ready".to_string();
        });
        tracing::info!(services = provider.len(), "startup complete");
        self.observers.complete();

        Ok(Application::new(
            provider,
            run_scope,
            startup.content.take(),
            startup.input.take(),
            self.loader.clone(),
        ))
    }

    /// Best-effort unload of content, then scope close and disposal.
    async fn teardown(&self, startup: &mut Startup) {
        if let Some(handle) = startup.content.take() {
            if let Err(error) = self.loader.unload(handle.name(), CancellationToken::new()).await {
                tracing::warn!(content = handle.name(), %error, "failed to unload content after aborted startup");
            }
        }
        startup.materialized.clear();
        startup.input = None;
        if let Some(mut scope) = startup.run_scope.take() {
            if let Err(error) = scope.end() {
                tracing::warn!(%error, "run scope was not innermost during teardown");
            }
        }
        if let Some(provider) = startup.provider.take() {
            provider.dispose_all();
        }
    }

    fn finish_with(&self, error: &BootstrapError, phase: Option<PhaseKind>, tracker: &Mutex<ProgressTracker>) {
        let status = if error.is_cancelled() {
            BootstrapState::Cancelled
        } else {
            BootstrapState::Failed
        };
        let progress = tracker.lock().current();
        let cancelled = self.token.is_cancelled();
        self.state.send_modify(|s| {
            s.status = status;
            s.phase = phase.or(s.phase);
            s.progress = progress;
            s.status_text = error.to_string();
            s.cancelled = cancelled;
        });

        match error {
            BootstrapError::Cancelled { phase } => {
                tracing::info!(%phase, "startup cancelled");
                self.observers.cancelled(*phase);
            }
            _ => {
                tracing::error!(%error, "startup failed");
                self.observers.failed(error);
            }
        }
    }

    fn report(&self, phase: PhaseKind, progress: f64, status: String) {
        let cancelled = self.token.is_cancelled();
        self.state.send_modify(|s| {
            s.status = phase.state();
            s.phase = Some(phase);
            s.progress = progress;
            s.status_text.clone_from(&status);
            s.cancelled = cancelled;
        });
        self.observers.progress(&ProgressEvent { phase, progress, status });
    }
}
