//! Disposal trait for resource cleanup.

/// Synchronous cleanup capability.
///
/// Register it with [`ServiceEntry::disposable`](crate::ServiceEntry::disposable).
/// The container calls `dispose` exactly once, when the owner of the instance
/// goes away: the innermost scope at creation time for Scoped (and Transient)
/// instances, the provider for Singletons. Owners run their hooks in reverse
/// creation order.
///
/// # Examples
///
/// ```
/// use heist_bootstrap::{Dispose, ServiceCollection, Resolver};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// struct AudioBus {
///     closed: Arc<AtomicBool>,
/// }
///
/// impl Dispose for AudioBus {
///     fn dispose(&self) {
///         self.closed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let closed = Arc::new(AtomicBool::new(false));
/// let flag = closed.clone();
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_scoped_factory::<AudioBus, _>(move |_| Ok(AudioBus { closed: flag.clone() }))
///     .disposable();
///
/// let provider = services.build();
/// let scope = provider.begin_scope();
/// let _bus = provider.get::<AudioBus>().unwrap();
/// drop(scope);
/// assert!(closed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Release resources held by the service.
    fn dispose(&self);
}
