//! Cycle and depth detection for nested resolution.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::key::Key;

pub(crate) const MAX_DEPTH: usize = 1024;

// Keys currently under construction on this thread, outermost first
thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<Key>> = const { RefCell::new(Vec::new()) };
}

/// Marks a key as under construction for as long as the guard lives.
///
/// Entering a key that is already on the stack is a cycle; the error carries
/// the full path, ending with the re-entered key.
pub(crate) struct ResolutionGuard {
    key: Key,
}

impl ResolutionGuard {
    pub(crate) fn enter(key: &Key) -> DiResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if stack.iter().any(|k| k == key) {
                let mut path: Vec<&'static str> = stack.iter().map(Key::display_name).collect();
                path.push(key.display_name());
                return Err(DiError::CyclicDependency(path));
            }

            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }

            stack.push(*key);
            Ok(Self { key: *key })
        })
    }

    /// Innermost key under construction on this thread, if any.
    pub(crate) fn current() -> Option<Key> {
        RESOLUTION_STACK.with(|stack| stack.borrow().last().copied())
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(popped, Some(self.key));
        });
    }
}
