use async_trait::async_trait;
use heist_bootstrap::{
    key_of_type, BootstrapConfig, BootstrapError, BootstrapObserver, BootstrapOrchestrator, BootstrapState,
    BoxError, CancellationToken, ConfigError, ContentLoader, Dependencies, DiError, DiResult, Dispose,
    Initializable, Injectable, InputGate, Key, Lifetime, LoadError, LoadHandle, PhaseKind, PhaseWeights,
    ProgressEvent, Resolver, ServiceCollection, ServiceModule,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ===== Test collaborators =====

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
    completed: AtomicBool,
    failed: Mutex<Option<String>>,
    cancelled: Mutex<Option<PhaseKind>>,
}

impl Recorder {
    fn phases(&self) -> Vec<PhaseKind> {
        let mut phases: Vec<PhaseKind> = Vec::new();
        for event in self.events.lock().iter() {
            if phases.last() != Some(&event.phase) {
                phases.push(event.phase);
            }
        }
        phases
    }

    fn last_progress_in(&self, phase: PhaseKind) -> Option<f64> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.phase == phase)
            .map(|e| e.progress)
            .last()
    }
}

impl BootstrapObserver for Recorder {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().push(event.clone());
    }

    fn on_complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    fn on_failed(&self, error: &BootstrapError) {
        *self.failed.lock() = Some(error.to_string());
    }

    fn on_cancelled(&self, phase: PhaseKind) {
        *self.cancelled.lock() = Some(phase);
    }
}

/// What the fake loader does once asked to load.
#[derive(Clone, Copy)]
enum LoadBehavior {
    Succeed,
    /// Report halfway progress, then succeed
    Halfway,
    Missing,
    /// Wait for cancellation, then honor it
    BlockUntilCancelled,
    /// Wait for cancellation, then finish the load anyway
    FinishDespiteCancel,
}

struct FakeLoader {
    behavior: LoadBehavior,
    loads: AtomicUsize,
    unloaded: Mutex<Vec<String>>,
}

impl FakeLoader {
    fn new(behavior: LoadBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            loads: AtomicUsize::new(0),
            unloaded: Mutex::new(Vec::new()),
        })
    }

    fn unloaded(&self) -> Vec<String> {
        self.unloaded.lock().clone()
    }
}

#[async_trait]
impl ContentLoader for FakeLoader {
    async fn load(
        &self,
        name: &str,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        cancellation: CancellationToken,
    ) -> Result<LoadHandle, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            LoadBehavior::Succeed => {}
            LoadBehavior::Halfway => on_progress(0.5),
            LoadBehavior::Missing => return Err(LoadError::NotFound(name.to_string())),
            LoadBehavior::BlockUntilCancelled => {
                cancellation.cancelled().await;
                cancellation.throw_if_cancelled()?;
            }
            LoadBehavior::FinishDespiteCancel => cancellation.cancelled().await,
        }
        on_progress(1.0);
        Ok(LoadHandle::new(name))
    }

    async fn unload(&self, name: &str, _cancellation: CancellationToken) -> Result<(), LoadError> {
        self.unloaded.lock().push(name.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct Counters {
    disposed: AtomicUsize,
    initialized: AtomicUsize,
    activated: AtomicBool,
}

/// Scoped service materialized at startup; counts its disposals.
struct Session {
    counters: Arc<Counters>,
}

impl Dispose for Session {
    fn dispose(&self) {
        self.counters.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Singleton with a fallible initialize step.
struct SaveSlots {
    counters: Arc<Counters>,
    fail: bool,
}

impl Initializable for SaveSlots {
    fn initialize(&self) -> Result<(), BoxError> {
        self.counters.initialized.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("save directory is read-only".into());
        }
        Ok(())
    }
}

impl Dispose for SaveSlots {
    fn dispose(&self) {
        self.counters.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

struct GameModule {
    counters: Arc<Counters>,
    fail_init: bool,
}

impl ServiceModule for GameModule {
    fn register_services(&self, services: &mut ServiceCollection) -> DiResult<()> {
        let counters = self.counters.clone();
        let fail = self.fail_init;
        services
            .add_singleton_factory::<SaveSlots, _>(move |_| {
                Ok(SaveSlots {
                    counters: counters.clone(),
                    fail,
                })
            })
            .initializable()
            .disposable()
            .at_startup();

        let counters = self.counters.clone();
        services
            .add_scoped_factory::<Session, _>(move |_| Ok(Session { counters: counters.clone() }))
            .disposable()
            .at_startup();
        Ok(())
    }
}

#[derive(Default)]
struct Gate {
    enabled: AtomicBool,
    calls: Mutex<Vec<bool>>,
}

impl InputGate for Gate {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        self.calls.lock().push(enabled);
    }
}

struct GateModule(Arc<Gate>);

impl ServiceModule for GateModule {
    fn register_services(&self, services: &mut ServiceCollection) -> DiResult<()> {
        services.add_singleton_trait::<dyn InputGate>(self.0.clone());
        Ok(())
    }
}

fn game(counters: &Arc<Counters>, loader: Arc<FakeLoader>, recorder: &Arc<Recorder>) -> BootstrapOrchestrator {
    let activated = counters.clone();
    BootstrapOrchestrator::builder()
        .module(GameModule {
            counters: counters.clone(),
            fail_init: false,
        })
        .shared_loader(loader)
        .observer(recorder.clone())
        .activate("spawn player", move |_| {
            activated.activated.store(true, Ordering::SeqCst);
            Ok(())
        })
        .build()
        .unwrap()
}

// ===== Happy path =====

#[tokio::test]
async fn test_phases_run_in_order_and_complete() {
    let counters = Arc::new(Counters::default());
    let recorder = Arc::new(Recorder::default());
    let loader = FakeLoader::new(LoadBehavior::Succeed);
    let orchestrator = game(&counters, loader.clone(), &recorder);

    assert_eq!(orchestrator.state().status, BootstrapState::Idle);
    let app = orchestrator.start().await.unwrap();

    assert_eq!(recorder.phases(), PhaseKind::ALL.to_vec());
    let state = orchestrator.state();
    assert_eq!(state.status, BootstrapState::Complete);
    assert_eq!(state.progress, 1.0);
    assert!(recorder.completed.load(Ordering::SeqCst));
    assert!(recorder.failed.lock().is_none());

    assert_eq!(counters.initialized.load(Ordering::SeqCst), 1);
    assert!(counters.activated.load(Ordering::SeqCst));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(app.content().map(LoadHandle::name), Some("safehouse"));
    assert!(app.run_scope().is_some());

    app.shutdown().await;
}

#[tokio::test]
async fn test_progress_is_weighted_and_monotonic() {
    let counters = Arc::new(Counters::default());
    let recorder = Arc::new(Recorder::default());
    let orchestrator = game(&counters, FakeLoader::new(LoadBehavior::Halfway), &recorder);

    let app = orchestrator.start().await.unwrap();

    let after_init = recorder.last_progress_in(PhaseKind::Initialize).unwrap();
    assert!((0.6..0.8).contains(&after_init), "{after_init}");

    let progress: Vec<f64> = recorder.events.lock().iter().map(|e| e.progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    // halfway through a 0.3 phase that starts at 0.6
    assert!(progress.iter().any(|p| (p - 0.75).abs() < 1e-9), "{progress:?}");

    app.shutdown().await;
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let counters = Arc::new(Counters::default());
    let recorder = Arc::new(Recorder::default());
    let orchestrator = game(&counters, FakeLoader::new(LoadBehavior::Succeed), &recorder);

    let app = orchestrator.start().await.unwrap();
    assert!(matches!(orchestrator.start().await, Err(BootstrapError::AlreadyStarted)));
    assert_eq!(orchestrator.state().status, BootstrapState::Complete);
    assert_eq!(counters.initialized.load(Ordering::SeqCst), 1);

    app.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_releases_everything() {
    let counters = Arc::new(Counters::default());
    let recorder = Arc::new(Recorder::default());
    let loader = FakeLoader::new(LoadBehavior::Succeed);
    let orchestrator = game(&counters, loader.clone(), &recorder);

    let app = orchestrator.start().await.unwrap();
    let provider = app.provider().clone();
    assert_eq!(provider.scope_depth(), 1);
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 0);

    app.shutdown().await;
    assert_eq!(provider.scope_depth(), 0);
    // the scoped Session and the SaveSlots singleton
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 2);
    assert_eq!(loader.unloaded(), vec!["safehouse".to_string()]);
}

#[tokio::test]
async fn test_loading_content_unloaded_during_activation() {
    let loader = FakeLoader::new(LoadBehavior::Succeed);
    let config = BootstrapConfig {
        loading_content: Some("loading_screen".to_string()),
        ..BootstrapConfig::default()
    };
    let orchestrator = BootstrapOrchestrator::builder()
        .shared_loader(loader.clone())
        .config(config)
        .build()
        .unwrap();

    let app = orchestrator.start().await.unwrap();
    assert_eq!(loader.unloaded(), vec!["loading_screen".to_string()]);
    app.shutdown().await;
}

// ===== Input gate =====

#[tokio::test]
async fn test_input_enabled_only_on_complete() {
    let gate = Arc::new(Gate::default());
    let seen_during_activation = Arc::new(AtomicBool::new(true));
    let seen = seen_during_activation.clone();
    let probe = gate.clone();

    let orchestrator = BootstrapOrchestrator::builder()
        .module(GateModule(gate.clone()))
        .activate("check input", move |_| {
            seen.store(probe.enabled.load(Ordering::SeqCst), Ordering::SeqCst);
            Ok(())
        })
        .build()
        .unwrap();

    let app = orchestrator.start().await.unwrap();
    assert!(!seen_during_activation.load(Ordering::SeqCst));
    assert!(gate.enabled.load(Ordering::SeqCst));

    app.shutdown().await;
    assert_eq!(*gate.calls.lock(), vec![true, false]);
}

#[tokio::test]
async fn test_input_never_enabled_on_failure() {
    let gate = Arc::new(Gate::default());
    let orchestrator = BootstrapOrchestrator::builder()
        .module(GateModule(gate.clone()))
        .activate("spawn guards", |_| Err("no patrol routes".into()))
        .build()
        .unwrap();

    let err = orchestrator.start().await.unwrap_err();
    match &err {
        BootstrapError::PhaseFailure { phase, source } => {
            assert_eq!(*phase, PhaseKind::Activate);
            assert!(source.to_string().contains("spawn guards"));
        }
        other => panic!("expected PhaseFailure, got {other}"),
    }
    assert!(gate.calls.lock().is_empty());
}

// ===== Failures =====

#[tokio::test]
async fn test_initialize_failure_disposes_everything() {
    let counters = Arc::new(Counters::default());
    let recorder = Arc::new(Recorder::default());
    let loader = FakeLoader::new(LoadBehavior::Succeed);
    let orchestrator = BootstrapOrchestrator::builder()
        .module(GameModule {
            counters: counters.clone(),
            fail_init: true,
        })
        .shared_loader(loader.clone())
        .observer(recorder.clone())
        .build()
        .unwrap();

    let err = orchestrator.start().await.unwrap_err();
    assert_eq!(err.phase(), Some(PhaseKind::Initialize));
    assert!(err.to_string().contains("read-only"));
    assert!(matches!(err, BootstrapError::PhaseFailure { .. }));

    let state = orchestrator.state();
    assert_eq!(state.status, BootstrapState::Failed);
    assert_eq!(state.phase, Some(PhaseKind::Initialize));
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 2);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    assert!(recorder.failed.lock().is_some());
    assert!(!recorder.completed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_missing_content_is_external_failure() {
    let counters = Arc::new(Counters::default());
    let recorder = Arc::new(Recorder::default());
    let orchestrator = game(&counters, FakeLoader::new(LoadBehavior::Missing), &recorder);

    match orchestrator.start().await {
        Err(BootstrapError::ExternalLoadFailure { content, source }) => {
            assert_eq!(content, "safehouse");
            assert!(matches!(source, LoadError::NotFound(_)));
        }
        other => panic!("expected ExternalLoadFailure, got {:?}", other.err()),
    }
    assert_eq!(orchestrator.state().status, BootstrapState::Failed);
    assert!(!counters.activated.load(Ordering::SeqCst));
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_validation_failure_fails_binding() {
    struct Vault;
    struct Alarm {
        #[allow(dead_code)]
        vault: Arc<Vault>,
    }
    impl Injectable for Alarm {
        fn dependencies() -> Vec<Key> {
            vec![key_of_type::<Vault>()]
        }
        fn construct(deps: &Dependencies) -> DiResult<Self> {
            Ok(Alarm { vault: deps.get()? })
        }
    }

    struct BrokenModule;
    impl ServiceModule for BrokenModule {
        fn register_services(&self, services: &mut ServiceCollection) -> DiResult<()> {
            services.add_injectable::<Alarm>(Lifetime::Singleton);
            Ok(())
        }
    }

    let orchestrator = BootstrapOrchestrator::builder().module(BrokenModule).build().unwrap();
    match orchestrator.start().await {
        Err(BootstrapError::PhaseFailure { phase, source }) => {
            assert_eq!(phase, PhaseKind::Bind);
            let di = source.downcast_ref::<DiError>().unwrap();
            assert!(matches!(di, DiError::MissingDependency { .. }));
        }
        other => panic!("expected PhaseFailure, got {:?}", other.err()),
    }
    assert_eq!(orchestrator.state().status, BootstrapState::Failed);
}

#[tokio::test]
async fn test_activation_can_resolve_services() {
    struct Heat(u8);

    struct HeatModule;
    impl ServiceModule for HeatModule {
        fn register_services(&self, services: &mut ServiceCollection) -> DiResult<()> {
            services.add_singleton(Heat(2));
            Ok(())
        }
    }

    let orchestrator = BootstrapOrchestrator::builder()
        .module(HeatModule)
        .activate("check heat", |provider| {
            if provider.get::<Heat>()?.0 > 1 {
                Ok(())
            } else {
                Err("too cold".into())
            }
        })
        .build()
        .unwrap();

    orchestrator.start().await.unwrap().shutdown().await;
}

// ===== Cancellation =====

#[tokio::test]
async fn test_cancel_before_start() {
    let counters = Arc::new(Counters::default());
    let recorder = Arc::new(Recorder::default());
    let orchestrator = game(&counters, FakeLoader::new(LoadBehavior::Succeed), &recorder);

    orchestrator.cancel();
    let err = orchestrator.start().await.unwrap_err();
    assert!(matches!(err, BootstrapError::Cancelled { phase: PhaseKind::Bind }));

    let state = orchestrator.state();
    assert_eq!(state.status, BootstrapState::Cancelled);
    assert!(state.cancelled);
    assert_eq!(*recorder.cancelled.lock(), Some(PhaseKind::Bind));
    assert!(recorder.events.lock().is_empty());
}

#[tokio::test]
async fn test_cancel_during_content_load() {
    let counters = Arc::new(Counters::default());
    let recorder = Arc::new(Recorder::default());
    let loader = FakeLoader::new(LoadBehavior::BlockUntilCancelled);
    let orchestrator = Arc::new(game(&counters, loader.clone(), &recorder));

    let mut rx = orchestrator.subscribe();
    let canceller = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            rx.wait_for(|s| s.status == BootstrapState::LoadingContent)
                .await
                .unwrap();
            orchestrator.cancel();
        })
    };

    let err = orchestrator.start().await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, BootstrapError::Cancelled { phase: PhaseKind::LoadContent }));
    let state = orchestrator.state();
    assert_eq!(state.status, BootstrapState::Cancelled);
    assert_eq!(state.phase, Some(PhaseKind::LoadContent));
    assert!(state.progress < 0.9);

    assert!(!counters.activated.load(Ordering::SeqCst));
    assert!(!recorder.phases().contains(&PhaseKind::Activate));
    assert_eq!(*recorder.cancelled.lock(), Some(PhaseKind::LoadContent));
    assert!(recorder.failed.lock().is_none());
    // nothing finished loading, so there is nothing to unload
    assert!(loader.unloaded().is_empty());
    // Session (scoped) and SaveSlots (singleton), each exactly once
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_content_loaded_after_cancel_is_unloaded() {
    let counters = Arc::new(Counters::default());
    let recorder = Arc::new(Recorder::default());
    let loader = FakeLoader::new(LoadBehavior::FinishDespiteCancel);
    let orchestrator = Arc::new(game(&counters, loader.clone(), &recorder));

    let token = orchestrator.cancellation_token();
    let mut rx = orchestrator.subscribe();
    let canceller = tokio::spawn(async move {
        rx.wait_for(|s| s.status == BootstrapState::LoadingContent)
            .await
            .unwrap();
        token.cancel();
    });

    let err = orchestrator.start().await.unwrap_err();
    canceller.await.unwrap();

    assert!(err.is_cancelled());
    assert_eq!(err.phase(), Some(PhaseKind::LoadContent));
    assert_eq!(loader.unloaded(), vec!["safehouse".to_string()]);
    assert_eq!(counters.disposed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cancel_after_complete_is_ignored() {
    let counters = Arc::new(Counters::default());
    let recorder = Arc::new(Recorder::default());
    let orchestrator = game(&counters, FakeLoader::new(LoadBehavior::Succeed), &recorder);

    let app = orchestrator.start().await.unwrap();
    orchestrator.cancel();

    let state = orchestrator.state();
    assert_eq!(state.status, BootstrapState::Complete);
    assert!(!state.cancelled);
    assert!(recorder.cancelled.lock().is_none());
    app.shutdown().await;
}

// ===== Configuration =====

#[test]
fn test_builder_rejects_invalid_weights() {
    let config = BootstrapConfig {
        weights: PhaseWeights {
            load_content: f64::NAN,
            ..PhaseWeights::default()
        },
        ..BootstrapConfig::default()
    };
    let result = BootstrapOrchestrator::builder().config(config).build();
    assert!(matches!(result, Err(ConfigError::InvalidWeight { .. })));
}

#[tokio::test]
async fn test_custom_weights_shape_progress() {
    let config = BootstrapConfig {
        weights: PhaseWeights {
            bind: 1.0,
            instantiate: 0.0,
            initialize: 0.0,
            load_content: 3.0,
            activate: 0.0,
        },
        ..BootstrapConfig::default()
    };
    let recorder = Arc::new(Recorder::default());
    let orchestrator = BootstrapOrchestrator::builder()
        .config(config)
        .observer(recorder.clone())
        .build()
        .unwrap();

    orchestrator.start().await.unwrap().shutdown().await;
    assert_eq!(recorder.last_progress_in(PhaseKind::Initialize), Some(0.25));
    assert_eq!(orchestrator.state().progress, 1.0);
}
