//! Cooperative cancellation tokens.
//!
//! The orchestrator owns a root token; `cancel()` on it is observed at phase
//! boundaries, and the content loader receives a child token so a
//! cancellation reaches the in-flight load.

use thiserror::Error;
use tokio_util::sync::WaitForCancellationFuture;

/// A token that signals cancellation across async operations.
///
/// Cancellation is sticky and flows downward: cancelling a token cancels
/// every child created from it, never the parent. Backed by
/// [`tokio_util::sync::CancellationToken`].
///
/// # Examples
///
/// ```
/// use heist_bootstrap::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let token = CancellationToken::new();
/// let child = token.child_token();
///
/// let waiter = tokio::spawn(async move {
///     child.cancelled().await;
///     "stopped"
/// });
///
/// token.cancel();
/// assert_eq!(waiter.await.unwrap(), "stopped");
/// # }
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: tokio_util::sync::CancellationToken,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that is cancelled when this one is.
    ///
    /// ```
    /// use heist_bootstrap::CancellationToken;
    ///
    /// let parent = CancellationToken::new();
    /// let child = parent.child_token();
    ///
    /// parent.cancel();
    /// assert!(child.is_cancelled());
    /// ```
    pub fn child_token(&self) -> Self {
        Self {
            inner: self.inner.child_token(),
        }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Fails once cancellation has been requested.
    ///
    /// # Errors
    ///
    /// [`CancellationError`] if the token is cancelled.
    pub fn throw_if_cancelled(&self) -> Result<(), CancellationError> {
        if self.is_cancelled() {
            Err(CancellationError)
        } else {
            Ok(())
        }
    }

    /// Completes when cancellation is requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancelled()
    }
}

impl From<tokio_util::sync::CancellationToken> for CancellationToken {
    fn from(inner: tokio_util::sync::CancellationToken) -> Self {
        Self { inner }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Returned by [`CancellationToken::throw_if_cancelled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation was cancelled")]
pub struct CancellationError;
