//! Example: a full orchestrated startup for the heist prototype
//!
//! Registers gameplay, audio and save services through modules, loads the
//! safehouse with a fake streaming loader that reports progress, spawns the
//! player and hands control to the player once input is enabled.
//!
//! Run with `RUST_LOG=debug cargo run --example startup` to see container
//! internals. Press Ctrl-C during loading to watch a cancelled startup.

use async_trait::async_trait;
use heist_bootstrap::{
    BootstrapConfig, BoxError, CancellationError, CancellationToken, ContentLoader, DiResult, Dispose, Initializable, InputGate,
    Lifetime, LoadError, LoadHandle, LoggingObserver, BootstrapOrchestrator, Resolver, ServiceCollection,
    ServiceModule,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ===== Gameplay Module =====

pub struct SuspicionMeter {
    level: parking_lot::Mutex<f32>,
}

impl SuspicionMeter {
    pub fn raise(&self, amount: f32) -> f32 {
        let mut level = self.level.lock();
        *level = (*level + amount).min(1.0);
        *level
    }
}

/// One per level: created inside the run scope, released with it.
pub struct LevelSession {
    pub name: &'static str,
}

impl Dispose for LevelSession {
    fn dispose(&self) {
        tracing::info!(level = self.name, "level session closed");
    }
}

pub struct GameplayModule;

impl ServiceModule for GameplayModule {
    fn register_services(&self, services: &mut ServiceCollection) -> DiResult<()> {
        services
            .add_singleton(SuspicionMeter {
                level: parking_lot::Mutex::new(0.0),
            })
            .at_startup();
        services
            .add_scoped_factory::<LevelSession, _>(|_| Ok(LevelSession { name: "safehouse" }))
            .disposable()
            .at_startup();
        Ok(())
    }
}

// ===== Audio Module =====

pub trait AudioBus: Send + Sync {
    fn play(&self, cue: &str);
}

struct ConsoleAudio;

impl AudioBus for ConsoleAudio {
    fn play(&self, cue: &str) {
        tracing::info!(cue, "audio");
    }
}

impl Dispose for ConsoleAudio {
    fn dispose(&self) {
        tracing::info!("audio bus released");
    }
}

pub struct AudioModule;

impl ServiceModule for AudioModule {
    fn register_services(&self, services: &mut ServiceCollection) -> DiResult<()> {
        services
            .add_singleton_factory::<ConsoleAudio, _>(|_| Ok(ConsoleAudio))
            .disposable()
            .at_startup();
        services.bind_trait::<dyn AudioBus, ConsoleAudio>(Lifetime::Singleton, |a| a);
        Ok(())
    }
}

// ===== Persistence Module =====

pub struct SaveSlots {
    slots: usize,
}

impl Initializable for SaveSlots {
    fn initialize(&self) -> Result<(), BoxError> {
        tracing::info!(slots = self.slots, "save slots scanned");
        Ok(())
    }
}

pub struct PersistenceModule;

impl ServiceModule for PersistenceModule {
    fn register_services(&self, services: &mut ServiceCollection) -> DiResult<()> {
        services
            .add_singleton_factory::<SaveSlots, _>(|_| Ok(SaveSlots { slots: 3 }))
            .initializable()
            .at_startup();
        Ok(())
    }
}

// ===== Input =====

#[derive(Default)]
struct Controls {
    enabled: AtomicBool,
}

impl InputGate for Controls {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "player input");
    }
}

struct InputModule(Arc<Controls>);

impl ServiceModule for InputModule {
    fn register_services(&self, services: &mut ServiceCollection) -> DiResult<()> {
        services.add_singleton_trait::<dyn InputGate>(self.0.clone());
        Ok(())
    }
}

// ===== Content =====

/// Pretends to stream a level in ten chunks.
struct StreamingLoader {
    chunk: Duration,
}

#[async_trait]
impl ContentLoader for StreamingLoader {
    async fn load(
        &self,
        name: &str,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        cancellation: CancellationToken,
    ) -> Result<LoadHandle, LoadError> {
        for step in 1..=10 {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    tracing::warn!(content = name, step, "load interrupted");
                    return Err(CancellationError.into());
                }
                _ = tokio::time::sleep(self.chunk) => on_progress(f64::from(step) / 10.0),
            }
        }
        Ok(LoadHandle::new(name))
    }

    async fn unload(&self, name: &str, _cancellation: CancellationToken) -> Result<(), LoadError> {
        tracing::info!(content = name, "content unloaded");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = BootstrapConfig::load()?;
    let controls = Arc::new(Controls::default());

    let orchestrator = Arc::new(
        BootstrapOrchestrator::builder()
            .config(config)
            .module(GameplayModule)
            .module(AudioModule)
            .module(PersistenceModule)
            .module(InputModule(controls.clone()))
            .loader(StreamingLoader {
                chunk: Duration::from_millis(150),
            })
            .observer(Arc::new(LoggingObserver::new()))
            .activate("spawn player", |provider| {
                let session = provider.get::<LevelSession>()?;
                provider.get_trait::<dyn AudioBus>()?.play("door_creak");
                tracing::info!(level = session.name, "player spawned");
                Ok(())
            })
            .build()?,
    );

    let interrupt = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                orchestrator.cancel();
            }
        })
    };

    let result = orchestrator.start().await;
    interrupt.abort();

    match result {
        Ok(app) => {
            let meter = app.provider().get::<SuspicionMeter>()?;
            tracing::info!(suspicion = meter.raise(0.25), "guard spotted a shadow");
            assert!(controls.enabled.load(Ordering::SeqCst));
            app.shutdown().await;
        }
        Err(error) if error.is_cancelled() => {
            tracing::warn!(%error, "startup cancelled by user");
        }
        Err(error) => return Err(error.into()),
    }
    Ok(())
}
