//! Internal disposal bag for managing cleanup hooks.

/// Cleanup hooks executed in LIFO order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    hooks: Vec<(&'static str, Box<dyn FnOnce() + Send>)>,
}

impl DisposeBag {
    /// Add a hook for the named service.
    pub(crate) fn push(&mut self, service: &'static str, f: Box<dyn FnOnce() + Send>) {
        self.hooks.push((service, f));
    }

    /// Execute all hooks in reverse order (LIFO). Each runs exactly once.
    pub(crate) fn run_all_reverse(&mut self) -> usize {
        let mut ran = 0;
        while let Some((service, f)) = self.hooks.pop() {
            tracing::trace!(service, "disposing");
            (f)();
            ran += 1;
        }
        ran
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }
}
