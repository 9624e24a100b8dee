//! Content-loading collaborator.

use async_trait::async_trait;
use thiserror::Error;

use crate::cancellation::{CancellationError, CancellationToken};
use crate::error::BoxError;

/// Failures reported by a [`ContentLoader`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("content not found: {0}")]
    NotFound(String),

    /// The loader stopped because its token was cancelled
    #[error("load cancelled")]
    Cancelled(#[from] CancellationError),

    #[error("loading {content} failed: {source}")]
    Failed {
        content: String,
        #[source]
        source: BoxError,
    },
}

impl LoadError {
    pub fn failed(content: impl Into<String>, source: impl Into<BoxError>) -> Self {
        LoadError::Failed {
            content: content.into(),
            source: source.into(),
        }
    }
}

/// Proof that a content set finished loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadHandle {
    name: String,
}

impl LoadHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Brings scene/asset content in and out.
///
/// Implementations report progress in `[0, 1]` through `on_progress` and
/// must stop promptly once `cancellation` fires, unloading anything partly
/// loaded before returning [`LoadError::Cancelled`].
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use heist_bootstrap::{CancellationToken, ContentLoader, LoadError, LoadHandle};
///
/// struct InstantLoader;
///
/// #[async_trait]
/// impl ContentLoader for InstantLoader {
///     async fn load(
///         &self,
///         name: &str,
///         on_progress: &(dyn Fn(f64) + Send + Sync),
///         cancellation: CancellationToken,
///     ) -> Result<LoadHandle, LoadError> {
///         cancellation.throw_if_cancelled()?;
///         on_progress(1.0);
///         Ok(LoadHandle::new(name))
///     }
///
///     async fn unload(&self, _name: &str, _cancellation: CancellationToken) -> Result<(), LoadError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ContentLoader: Send + Sync {
    async fn load(
        &self,
        name: &str,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        cancellation: CancellationToken,
    ) -> Result<LoadHandle, LoadError>;

    async fn unload(&self, name: &str, cancellation: CancellationToken) -> Result<(), LoadError>;
}

/// Loader that completes immediately. Used when none is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLoader;

#[async_trait]
impl ContentLoader for NoopLoader {
    async fn load(
        &self,
        name: &str,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        cancellation: CancellationToken,
    ) -> Result<LoadHandle, LoadError> {
        cancellation.throw_if_cancelled()?;
        on_progress(1.0);
        Ok(LoadHandle::new(name))
    }

    async fn unload(&self, _name: &str, _cancellation: CancellationToken) -> Result<(), LoadError> {
        Ok(())
    }
}
