//! Startup failures and the phase they happened in.

use thiserror::Error;

use super::loader::LoadError;
use super::phase::PhaseKind;
use crate::error::BoxError;

/// Why startup did not reach Complete.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// A phase raised an error; container errors always surface here
    #[error("phase {phase} failed: {source}")]
    PhaseFailure {
        phase: PhaseKind,
        #[source]
        source: BoxError,
    },

    /// `cancel()` was honored at or during `phase`
    #[error("startup cancelled during {phase}")]
    Cancelled { phase: PhaseKind },

    /// The content loader reported a failure. Never retried internally.
    #[error("failed to load content {content}: {source}")]
    ExternalLoadFailure {
        content: String,
        #[source]
        source: LoadError,
    },

    #[error("startup already ran on this orchestrator")]
    AlreadyStarted,
}

impl BootstrapError {
    pub(crate) fn phase_failure(phase: PhaseKind, source: impl Into<BoxError>) -> Self {
        BootstrapError::PhaseFailure {
            phase,
            source: source.into(),
        }
    }

    /// The phase the error is attributed to, if any.
    pub fn phase(&self) -> Option<PhaseKind> {
        match self {
            BootstrapError::PhaseFailure { phase, .. } | BootstrapError::Cancelled { phase } => Some(*phase),
            BootstrapError::ExternalLoadFailure { .. } => Some(PhaseKind::LoadContent),
            BootstrapError::AlreadyStarted => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BootstrapError::Cancelled { .. })
    }
}

/// A named step inside a phase failed: a service's `initialize` or an
/// activation step.
#[derive(Debug, Error)]
#[error("{name}: {source}")]
pub struct StepError {
    pub name: &'static str,
    #[source]
    pub source: BoxError,
}
