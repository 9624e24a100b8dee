//! Bootstrap configuration.
//!
//! Sources are merged in this order, later ones overriding earlier:
//! 1. `BootstrapConfig::default()`
//! 2. a TOML file (missing files are skipped)
//! 3. environment variables prefixed with `HEIST_BOOT_`, nested keys
//!    separated by `__` (e.g. `HEIST_BOOT_WEIGHTS__LOAD_CONTENT=0.5`)

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bootstrap::PhaseKind;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "HEIST_BOOT_";

/// File read by [`BootstrapConfig::load`].
pub const DEFAULT_CONFIG_FILE: &str = "bootstrap.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("weight for phase {phase} must be finite and non-negative, got {value}")]
    InvalidWeight { phase: &'static str, value: f64 },

    #[error("phase weights must have a positive sum")]
    ZeroWeightSum,

    #[error("initial_content must not be empty")]
    EmptyInitialContent,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Load(Box::new(e))
    }
}

/// Settings for one orchestrated startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Content set brought in during the LoadingContent phase
    pub initial_content: String,
    /// Loading-only content unloaded during activation, if any
    pub loading_content: Option<String>,
    pub weights: PhaseWeights,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            initial_content: "safehouse".to_string(),
            loading_content: None,
            weights: PhaseWeights::default(),
        }
    }
}

impl BootstrapConfig {
    /// Loads from [`DEFAULT_CONFIG_FILE`] in the working directory and the
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Loads from `path` and the environment, then validates.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), exists = path.exists(), "loading bootstrap config");
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The merged provider chain, before extraction.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_content.trim().is_empty() {
            return Err(ConfigError::EmptyInitialContent);
        }
        self.weights.validate()
    }
}

/// Relative progress weight of each phase.
///
/// Weights need not sum to 1; progress divides by their total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseWeights {
    pub bind: f64,
    pub instantiate: f64,
    pub initialize: f64,
    pub load_content: f64,
    pub activate: f64,
}

impl Default for PhaseWeights {
    fn default() -> Self {
        Self {
            bind: 0.2,
            instantiate: 0.2,
            initialize: 0.2,
            load_content: 0.3,
            activate: 0.1,
        }
    }
}

impl PhaseWeights {
    pub fn get(&self, phase: PhaseKind) -> f64 {
        match phase {
            PhaseKind::Bind => self.bind,
            PhaseKind::Instantiate => self.instantiate,
            PhaseKind::Initialize => self.initialize,
            PhaseKind::LoadContent => self.load_content,
            PhaseKind::Activate => self.activate,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut sum = 0.0;
        for phase in PhaseKind::ALL {
            let value = self.get(phase);
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { phase: phase.name(), value });
            }
            sum += value;
        }
        if sum <= 0.0 {
            return Err(ConfigError::ZeroWeightSum);
        }
        Ok(())
    }
}
