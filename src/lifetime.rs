//! Scope kinds.

use std::fmt;

/// The context an instance's lifetime is tied to
///
/// Unlike size- or time-based caches, an instance lives exactly as long as
/// the context it was created in.
///
/// # Examples
///
/// ```rust
/// use ferrous_scopes::{ScopeKind, SessionScope, UiScope, ContextScope};
///
/// assert_eq!(SessionScope::new().kind(), ScopeKind::Session);
/// assert_eq!(UiScope::new().kind(), ScopeKind::Ui);
/// assert_eq!(ScopeKind::Ui.to_string(), "ui");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// One instance per key for the whole session
    ///
    /// Shared by every UI the session has open. Released when the session
    /// ends or its handle becomes unreachable.
    Session,
    /// One instance per key per UI inside a session
    ///
    /// Released when the UI detaches, when the owning session ends, or when
    /// either handle becomes unreachable.
    Ui,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Session => f.write_str("session"),
            ScopeKind::Ui => f.write_str("ui"),
        }
    }
}
