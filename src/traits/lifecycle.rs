//! Startup initialization capability.

use crate::error::BoxError;

/// Services that need a one-time setup step after construction.
///
/// The orchestrator calls `initialize` once during the Initializing phase for
/// every service registered with
/// [`ServiceEntry::initializable`](crate::ServiceEntry::initializable) and
/// materialized at startup, in registration order. There is no rollback hook:
/// if a later service fails, everything built so far is disposed through
/// [`Dispose`](crate::Dispose), which is where partial setup must be undone.
pub trait Initializable: Send + Sync + 'static {
    /// Perform setup. An error fails the Initializing phase.
    fn initialize(&self) -> Result<(), BoxError>;
}
