//! Startup observers.
//!
//! Observers are called synchronously on the orchestrator's task, in the
//! order they were added. Keep them cheap.

use std::sync::Arc;

use super::error::BootstrapError;
use super::phase::PhaseKind;

/// One progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub phase: PhaseKind,
    /// Cumulative progress in `[0, 1]`
    pub progress: f64,
    pub status: String,
}

/// Receives startup signals. Every method defaults to doing nothing.
///
/// # Examples
///
/// ```
/// use heist_bootstrap::{BootstrapObserver, ProgressEvent};
/// use parking_lot::Mutex;
///
/// #[derive(Default)]
/// struct LoadingBar {
///     fill: Mutex<f64>,
/// }
///
/// impl BootstrapObserver for LoadingBar {
///     fn on_progress(&self, event: &ProgressEvent) {
///         *self.fill.lock() = event.progress;
///     }
/// }
/// ```
pub trait BootstrapObserver: Send + Sync {
    fn on_progress(&self, _event: &ProgressEvent) {}

    fn on_complete(&self) {}

    /// Startup failed. Scopes and singletons are already disposed.
    fn on_failed(&self, _error: &BootstrapError) {}

    /// Cancellation was honored at `phase`. Resources are already disposed.
    fn on_cancelled(&self, _phase: PhaseKind) {}
}

#[derive(Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn BootstrapObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn BootstrapObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn progress(&self, event: &ProgressEvent) {
        for observer in &self.observers {
            observer.on_progress(event);
        }
    }

    pub(crate) fn complete(&self) {
        for observer in &self.observers {
            observer.on_complete();
        }
    }

    pub(crate) fn failed(&self, error: &BootstrapError) {
        for observer in &self.observers {
            observer.on_failed(error);
        }
    }

    pub(crate) fn cancelled(&self, phase: PhaseKind) {
        for observer in &self.observers {
            observer.on_cancelled(phase);
        }
    }
}

/// Built-in observer that logs through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LoggingObserver;

impl LoggingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl BootstrapObserver for LoggingObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        tracing::info!(
            phase = %event.phase,
            progress = format_args!("{:.0}%", event.progress * 100.0),
            "{}",
            event.status
        );
    }

    fn on_complete(&self) {
        tracing::info!("startup complete");
    }

    fn on_failed(&self, error: &BootstrapError) {
        tracing::error!(error = %error, "startup failed");
    }

    fn on_cancelled(&self, phase: PhaseKind) {
        tracing::warn!(%phase, "startup cancelled");
    }
}
