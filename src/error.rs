//! Error types for scoped resolution.

use std::fmt;

/// Boxed error returned by fallible creation capabilities.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which piece of context was missing when a lookup was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingContext {
    /// No session is bound to the calling context.
    Session,
    /// A session is bound but no UI is.
    Ui,
}

impl fmt::Display for MissingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingContext::Session => f.write_str("no active session"),
            MissingContext::Ui => f.write_str("no active UI"),
        }
    }
}

/// Scoped resolution errors
///
/// Every failure is reported synchronously at the point of lookup. Nothing
/// is retried internally and a failed creation is never cached, so calling
/// again for the same context and key starts from scratch.
///
/// # Examples
///
/// ```rust
/// use ferrous_scopes::{ScopeError, MissingContext, SessionScope, ScopeResolver};
///
/// // Resolving outside of any session is a precondition failure
/// let scope = SessionScope::new();
/// match scope.get_or_create(|| 42u32) {
///     Err(ScopeError::Precondition(MissingContext::Session)) => {}
///     other => panic!("unexpected: {:?}", other.map(|v| *v)),
/// }
///
/// let circular = ScopeError::Circular(vec!["Cart", "Checkout", "Cart"]);
/// assert_eq!(circular.to_string(), "Circular scoped dependency: Cart -> Checkout -> Cart");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// Lookup attempted without an active session (or UI, for UI scoping)
    #[error("Precondition failed: {0}")]
    Precondition(MissingContext),
    /// The creation capability failed; the source is carried verbatim
    #[error("Creation of {key} failed: {source}")]
    Creation {
        key: &'static str,
        #[source]
        source: BoxError,
    },
    /// Stored instance does not have the requested type
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// A creation re-entered itself on the same thread (includes path)
    #[error("Circular scoped dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// A lookup from inside a factory would lock a UI under a session, or
    /// another context of the factory's own kind
    #[error("Scope error: {0}")]
    WrongScope(&'static str),
    /// Maximum nesting of creations exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScopeError {
    /// Returns true for missing session or UI.
    pub fn is_precondition(&self) -> bool {
        matches!(self, ScopeError::Precondition(_))
    }

    /// Unwraps the factory's own error when this is a creation failure.
    pub fn creation_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            ScopeError::Creation { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type for scoped resolution
pub type ScopeResult<T> = Result<T, ScopeError>;
