//! Scope stack and scoped service resolution.
//!
//! Scopes nest strictly: the provider keeps a stack of frames, Scoped
//! resolution always targets the innermost one, and a frame may only be
//! closed while it is innermost. Closing a frame runs its disposers in
//! reverse creation order and drops its cached instances.

use std::collections::HashMap;
use std::fmt;

use crate::error::{DiError, DiResult};
use crate::internal::{DisposeBag, ResolutionGuard};
use crate::key::Key;
use crate::registration::{AnyArc, DisposeHook, Registration};

use super::{ResolverContext, ServiceProvider};

// Warn each time an owner accumulates this many pending transient disposers
const PENDING_DISPOSERS_WARN: usize = 1024;

/// Identity of an open scope. Ids are never reused by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct ScopeFrame {
    id: ScopeId,
    instances: HashMap<Key, AnyArc>,
    disposers: DisposeBag,
}

impl ScopeFrame {
    /// Runs the frame's disposers (LIFO) and drops its instances.
    fn close(mut self) -> usize {
        let ran = self.disposers.run_all_reverse();
        tracing::debug!(scope = %self.id, disposed = ran, "scope closed");
        self.instances.clear();
        ran
    }
}

#[derive(Default)]
pub(crate) struct ScopeStack {
    frames: Vec<ScopeFrame>,
    next_id: u64,
}

impl ScopeStack {
    fn push(&mut self) -> ScopeId {
        self.next_id += 1;
        let id = ScopeId(self.next_id);
        self.frames.push(ScopeFrame {
            id,
            instances: HashMap::new(),
            disposers: DisposeBag::default(),
        });
        id
    }

    fn innermost(&self) -> Option<&ScopeFrame> {
        self.frames.last()
    }

    fn find_mut(&mut self, id: ScopeId) -> Option<&mut ScopeFrame> {
        self.frames.iter_mut().rev().find(|f| f.id == id)
    }

    /// Pops `id` only if it is the innermost frame.
    fn pop_exact(&mut self, id: ScopeId) -> DiResult<ScopeFrame> {
        let innermost = self.innermost().map(|f| f.id).ok_or(DiError::ScopeNotActive)?;
        if innermost == id {
            return self.frames.pop().ok_or(DiError::ScopeNotActive);
        }
        if self.frames.iter().any(|f| f.id == id) {
            Err(DiError::ScopeMismatch { expected: innermost, found: id })
        } else {
            Err(DiError::ScopeNotActive)
        }
    }

    /// Pops `id` and every frame opened after it, innermost first.
    fn pop_through(&mut self, id: ScopeId) -> Vec<ScopeFrame> {
        match self.frames.iter().position(|f| f.id == id) {
            Some(pos) => self.frames.drain(pos..).rev().collect(),
            None => Vec::new(),
        }
    }

    fn drain(&mut self) -> Vec<ScopeFrame> {
        self.frames.drain(..).rev().collect()
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Handle to an open scope.
///
/// Call [`end`](Self::end) to close the scope explicitly. Dropping a handle
/// that was never ended closes its scope together with any scopes opened
/// inside it that are still open.
///
/// # Examples
///
/// ```
/// use heist_bootstrap::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Session { id: u32 }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<Session, _>(|_| Ok(Session { id: 1 }));
/// let provider = services.build();
///
/// let mut level = provider.begin_scope();
/// let a = provider.get::<Session>().unwrap();
/// let b = provider.get::<Session>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// level.end().unwrap();
///
/// assert!(provider.get::<Session>().is_err());
/// ```
#[must_use = "dropping the handle closes the scope immediately"]
pub struct ScopeHandle {
    provider: ServiceProvider,
    id: ScopeId,
    ended: bool,
}

impl ScopeHandle {
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// True once `end` succeeded.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Closes this scope.
    ///
    /// # Errors
    ///
    /// `ScopeMismatch` if a scope opened later is still open, `ScopeNotActive`
    /// if this scope was already closed (for example by `close_all_scopes`).
    pub fn end(&mut self) -> DiResult<()> {
        if self.ended {
            return Err(DiError::ScopeNotActive);
        }
        let frame = self.provider.inner().scopes.lock().pop_exact(self.id)?;
        self.ended = true;
        frame.close();
        Ok(())
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("id", &self.id)
            .field("ended", &self.ended)
            .finish()
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        let frames = self.provider.inner().scopes.lock().pop_through(self.id);
        if frames.len() > 1 {
            tracing::warn!(scope = %self.id, nested = frames.len() - 1, "scope dropped with nested scopes still open");
        }
        for frame in frames {
            frame.close();
        }
    }
}

impl ServiceProvider {
    /// Opens a new innermost scope.
    pub fn begin_scope(&self) -> ScopeHandle {
        let id = self.inner().scopes.lock().push();
        tracing::debug!(scope = %id, "scope opened");
        ScopeHandle {
            provider: self.clone(),
            id,
            ended: false,
        }
    }

    /// Closes the innermost scope.
    ///
    /// A handle for that scope becomes inert; ending it later reports
    /// `ScopeNotActive`.
    pub fn end_scope(&self) -> DiResult<()> {
        let frame = {
            let mut scopes = self.inner().scopes.lock();
            scopes.frames.pop().ok_or(DiError::ScopeNotActive)?
        };
        frame.close();
        Ok(())
    }

    /// Closes every open scope, innermost first. Returns how many were open.
    pub fn close_all_scopes(&self) -> usize {
        let frames = self.inner().scopes.lock().drain();
        let n = frames.len();
        for frame in frames {
            frame.close();
        }
        n
    }

    /// Number of open scopes.
    pub fn scope_depth(&self) -> usize {
        self.inner().scopes.lock().depth()
    }

    /// The innermost open scope, if any.
    pub fn current_scope(&self) -> Option<ScopeId> {
        self.inner().scopes.lock().innermost().map(|f| f.id)
    }

    /// Scoped resolution against the innermost frame.
    ///
    /// The stack lock is released while the producer runs so that it can
    /// resolve other Scoped services.
    pub(crate) fn resolve_scoped(&self, key: &Key, reg: &Registration) -> DiResult<AnyArc> {
        let frame_id = {
            let scopes = self.inner().scopes.lock();
            let frame = scopes.innermost().ok_or(DiError::ScopeNotActive)?;
            if let Some(value) = frame.instances.get(key) {
                return Ok(value.clone());
            }
            frame.id
        };

        debug_assert!(ResolutionGuard::current().is_some());
        let ctx = ResolverContext::new(self, None);
        let value = (reg.ctor)(&ctx)?;

        let name = key.display_name();
        let mut scopes = self.inner().scopes.lock();
        let Some(frame) = scopes.find_mut(frame_id) else {
            drop(scopes);
            // frame was closed while the producer ran
            if let Some(hook) = &reg.dispose {
                hook(&value);
            }
            return Err(DiError::ScopeNotActive);
        };
        if let Some(existing) = frame.instances.get(key) {
            return Ok(existing.clone());
        }
        frame.instances.insert(*key, value.clone());
        if let Some(hook) = &reg.dispose {
            frame.disposers.push(name, dispose_thunk(hook, &value));
        }
        tracing::trace!(service = name, scope = %frame_id, "scoped instance created");
        Ok(value)
    }

    /// Attaches a transient's disposer to the innermost scope, or to the root
    /// bag when no scope is open.
    pub(crate) fn track_disposable(&self, name: &'static str, hook: DisposeHook, value: AnyArc) {
        let thunk = dispose_thunk(&hook, &value);
        let mut scopes = self.inner().scopes.lock();
        let pending = match scopes.frames.last_mut() {
            Some(frame) => {
                frame.disposers.push(name, thunk);
                frame.disposers.len()
            }
            None => {
                drop(scopes);
                let mut root = self.inner().root_disposers.lock();
                root.push(name, thunk);
                root.len()
            }
        };
        if pending % PENDING_DISPOSERS_WARN == 0 {
            tracing::warn!(
                service = name,
                pending,
                "disposable transients are piling up until their owner closes"
            );
        }
    }
}

fn dispose_thunk(hook: &DisposeHook, value: &AnyArc) -> Box<dyn FnOnce() + Send> {
    let hook = hook.clone();
    let value = value.clone();
    Box::new(move || hook(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_exact_rejects_outer_frame() {
        let mut stack = ScopeStack::default();
        let outer = stack.push();
        let inner = stack.push();

        match stack.pop_exact(outer) {
            Err(DiError::ScopeMismatch { expected, found }) => {
                assert_eq!(expected, inner);
                assert_eq!(found, outer);
            }
            other => panic!("expected ScopeMismatch, got {:?}", other.map(|f| f.id)),
        }
        assert_eq!(stack.depth(), 2);
        assert!(stack.pop_exact(inner).is_ok());
        assert!(stack.pop_exact(outer).is_ok());
        assert!(matches!(stack.pop_exact(outer), Err(DiError::ScopeNotActive)));
    }

    #[test]
    fn test_pop_through_returns_innermost_first() {
        let mut stack = ScopeStack::default();
        let a = stack.push();
        let b = stack.push();
        let c = stack.push();

        let popped: Vec<_> = stack.pop_through(b).into_iter().map(|f| f.id).collect();
        assert_eq!(popped, vec![c, b]);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.innermost().map(|f| f.id), Some(a));
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut stack = ScopeStack::default();
        let a = stack.push();
        stack.drain();
        let b = stack.push();
        assert_ne!(a, b);
        assert_eq!(b.to_string(), "#2");
    }
}
