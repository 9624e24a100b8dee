//! Orchestrator state published to observers.

use std::fmt;

use serde::Serialize;

use super::phase::PhaseKind;

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BootstrapState {
    Idle,
    Binding,
    Instantiating,
    Initializing,
    LoadingContent,
    Activating,
    Complete,
    Cancelled,
    Failed,
}

impl BootstrapState {
    /// Complete, Cancelled and Failed are final.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BootstrapState::Complete | BootstrapState::Cancelled | BootstrapState::Failed
        )
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Snapshot of startup, as seen through [`subscribe`](super::BootstrapOrchestrator::subscribe).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartupState {
    pub status: BootstrapState,
    /// Phase running (or last run, once terminal)
    pub phase: Option<PhaseKind>,
    /// Cumulative weighted progress in `[0, 1]`
    pub progress: f64,
    pub status_text: String,
    /// A cancellation has been requested
    pub cancelled: bool,
}

impl StartupState {
    pub(crate) fn idle() -> Self {
        Self {
            status: BootstrapState::Idle,
            phase: None,
            progress: 0.0,
            status_text: String::new(),
            cancelled: false,
        }
    }

    /// Index of the current phase in [`PhaseKind::ALL`], or 0 before start.
    pub fn phase_index(&self) -> usize {
        self.phase.map(PhaseKind::index).unwrap_or(0)
    }
}
