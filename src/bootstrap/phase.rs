//! The fixed phase sequence and weighted progress.

use std::fmt;

use serde::Serialize;

use super::state::BootstrapState;
use crate::config::PhaseWeights;

/// One ordered step of startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PhaseKind {
    Bind,
    Instantiate,
    Initialize,
    LoadContent,
    Activate,
}

impl PhaseKind {
    pub const COUNT: usize = 5;

    /// Execution order. Never reordered at runtime.
    pub const ALL: [PhaseKind; Self::COUNT] = [
        PhaseKind::Bind,
        PhaseKind::Instantiate,
        PhaseKind::Initialize,
        PhaseKind::LoadContent,
        PhaseKind::Activate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PhaseKind::Bind => "Bind",
            PhaseKind::Instantiate => "Instantiate",
            PhaseKind::Initialize => "Initialize",
            PhaseKind::LoadContent => "LoadContent",
            PhaseKind::Activate => "Activate",
        }
    }

    /// Position in [`ALL`](Self::ALL).
    pub fn index(self) -> usize {
        self as usize
    }

    /// The orchestrator state while this phase runs.
    pub fn state(self) -> BootstrapState {
        match self {
            PhaseKind::Bind => BootstrapState::Binding,
            PhaseKind::Instantiate => BootstrapState::Instantiating,
            PhaseKind::Initialize => BootstrapState::Initializing,
            PhaseKind::LoadContent => BootstrapState::LoadingContent,
            PhaseKind::Activate => BootstrapState::Activating,
        }
    }

    pub(crate) fn status_text(self) -> &'static str {
        match self {
            PhaseKind::Bind => "Registering services",
            PhaseKind::Instantiate => "Creating services",
            PhaseKind::Initialize => "Initializing services",
            PhaseKind::LoadContent => "Loading content",
            PhaseKind::Activate => "Activating",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cumulative progress over weighted phases.
///
/// Progress is computed from raw prefix sums divided by the total, so the
/// boundary after phase N is exactly `sum(w[..=N]) / sum(w)`. Reported values
/// never decrease.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    weights: [f64; PhaseKind::COUNT],
    total: f64,
    reported: f64,
}

impl ProgressTracker {
    /// `weights` must already be validated.
    pub(crate) fn new(weights: &PhaseWeights) -> Self {
        let weights = PhaseKind::ALL.map(|p| weights.get(p));
        let total = weights.iter().sum();
        Self {
            weights,
            total,
            reported: 0.0,
        }
    }

    fn before(&self, phase: PhaseKind) -> f64 {
        self.weights[..phase.index()].iter().sum()
    }

    fn advance(&mut self, raw: f64) -> f64 {
        let value = if self.total > 0.0 { (raw / self.total).clamp(0.0, 1.0) } else { 0.0 };
        if value > self.reported {
            self.reported = value;
        }
        self.reported
    }

    /// Progress at entry to `phase`.
    pub(crate) fn enter(&mut self, phase: PhaseKind) -> f64 {
        let raw = self.before(phase);
        self.advance(raw)
    }

    /// Progress once `phase` has completed.
    pub(crate) fn exit(&mut self, phase: PhaseKind) -> f64 {
        let raw = self.before(phase) + self.weights[phase.index()];
        self.advance(raw)
    }

    /// Progress partway through `phase`. `fraction` is clamped to `[0, 1]`;
    /// NaN counts as no progress.
    pub(crate) fn within(&mut self, phase: PhaseKind, fraction: f64) -> f64 {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let raw = self.before(phase) + self.weights[phase.index()] * fraction;
        self.advance(raw)
    }

    pub(crate) fn current(&self) -> f64 {
        self.reported
    }
}
