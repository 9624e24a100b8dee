//! Error types for the container.

use thiserror::Error;

use crate::provider::ScopeId;

/// Boxed error used at collaborator seams (factories, `initialize`, loaders).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Container errors.
///
/// These are structural programming errors (missing registration, cycle,
/// scope misuse). They are never retried.
///
/// ```rust
/// use heist_bootstrap::DiError;
///
/// let err = DiError::CyclicDependency(vec!["A", "B", "A"]);
/// assert_eq!(err.to_string(), "cyclic dependency: A -> B -> A");
/// ```
#[derive(Debug, Error)]
pub enum DiError {
    /// No active registration for the key
    #[error("service not registered: {0}")]
    Unregistered(&'static str),

    /// A producer re-entered resolution of a key it is constructing
    #[error("cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<&'static str>),

    /// Scoped resolution (or scope close) with no open scope
    #[error("no scope is active")]
    ScopeNotActive,

    /// A scope was closed out of LIFO order
    #[error("scope {found} closed while scope {expected} is innermost")]
    ScopeMismatch {
        /// Innermost open scope
        expected: ScopeId,
        /// Scope the caller attempted to close
        found: ScopeId,
    },

    /// Stored instance did not downcast to the requested type
    #[error("type mismatch for: {0}")]
    TypeMismatch(&'static str),

    /// Resolution nested deeper than the guard allows
    #[error("max resolution depth {0} exceeded")]
    DepthExceeded(usize),

    /// A singleton tried to capture a scope-owned instance
    #[error("singleton {singleton} cannot depend on scoped {scoped}")]
    CaptiveDependency {
        /// Singleton under construction
        singleton: &'static str,
        /// Scoped dependency it requested
        scoped: &'static str,
    },

    /// A declared dependency has no registration
    #[error("{service} declares dependency {dependency}, which is not registered")]
    MissingDependency {
        /// Service declaring the dependency
        service: &'static str,
        /// The unregistered dependency
        dependency: &'static str,
    },

    /// A factory reported its own failure
    #[error("factory for {service} failed: {source}")]
    Factory {
        /// Service being constructed
        service: &'static str,
        /// Failure reported by the factory
        #[source]
        source: BoxError,
    },
}

impl DiError {
    /// Wraps an arbitrary factory failure.
    ///
    /// ```rust
    /// use heist_bootstrap::DiError;
    ///
    /// let err = DiError::factory("SaveSlots", std::io::Error::other("disk full"));
    /// assert!(err.to_string().contains("disk full"));
    /// ```
    pub fn factory<E>(service: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        DiError::Factory {
            service,
            source: source.into(),
        }
    }
}

/// Result type for container operations.
pub type DiResult<T> = Result<T, DiError>;
