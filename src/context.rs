//! Context handles and the environment that reports the current ones.
//!
//! A [`SessionHandle`] or [`UiHandle`] is an opaque identity. Equality is
//! identity, never value: two handles are equal only if one was cloned from
//! the other. Scopes hold handles weakly, so dropping the last clone of a
//! handle makes everything cached for it eligible for reclamation.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a context handle.
///
/// Ids are allocated monotonically and never reused, so a stale directory
/// entry can never be mistaken for a newer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logging.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct ContextCell {
    pub(crate) id: ContextId,
    label: Option<String>,
}

impl ContextCell {
    fn new(label: Option<String>) -> Arc<Self> {
        Arc::new(ContextCell { id: ContextId::next(), label })
    }
}

/// Handle for a long-lived session context.
///
/// # Examples
///
/// ```
/// use ferrous_scopes::SessionHandle;
///
/// let a = SessionHandle::labeled("alice");
/// let b = SessionHandle::labeled("alice");
///
/// assert_eq!(a, a.clone());
/// assert_ne!(a, b); // identity, not value
/// assert_eq!(a.label(), Some("alice"));
/// ```
#[derive(Clone)]
pub struct SessionHandle {
    cell: Arc<ContextCell>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self { cell: ContextCell::new(None) }
    }

    pub fn labeled(label: impl Into<String>) -> Self {
        Self { cell: ContextCell::new(Some(label.into())) }
    }

    pub fn id(&self) -> ContextId {
        self.cell.id
    }

    pub fn label(&self) -> Option<&str> {
        self.cell.label.as_deref()
    }

    pub fn is_same(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn cell(&self) -> &Arc<ContextCell> {
        &self.cell
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a UI context living inside a session.
///
/// A UI remembers which session opened it, but scopes always key on the
/// session the environment reports, so a UI handle that is (wrongly) shown
/// under two sessions still gets two independent caches.
#[derive(Clone)]
pub struct UiHandle {
    cell: Arc<ContextCell>,
    session: ContextId,
}

impl UiHandle {
    pub fn new(session: &SessionHandle) -> Self {
        Self { cell: ContextCell::new(None), session: session.id() }
    }

    pub fn labeled(session: &SessionHandle, label: impl Into<String>) -> Self {
        Self { cell: ContextCell::new(Some(label.into())), session: session.id() }
    }

    pub fn id(&self) -> ContextId {
        self.cell.id
    }

    /// Id of the session this UI was opened in.
    pub fn session_id(&self) -> ContextId {
        self.session
    }

    pub fn label(&self) -> Option<&str> {
        self.cell.label.as_deref()
    }

    pub fn is_same(&self, other: &UiHandle) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn cell(&self) -> &Arc<ContextCell> {
        &self.cell
    }
}

macro_rules! identity_traits {
    ($handle:ty, $name:literal) => {
        impl PartialEq for $handle {
            fn eq(&self, other: &Self) -> bool {
                self.is_same(other)
            }
        }

        impl Eq for $handle {}

        impl Hash for $handle {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.cell.id.hash(state);
            }
        }

        impl fmt::Debug for $handle {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct($name)
                    .field("id", &self.cell.id)
                    .field("label", &self.cell.label)
                    .finish()
            }
        }
    };
}

identity_traits!(SessionHandle, "SessionHandle");
identity_traits!(UiHandle, "UiHandle");

pub(crate) fn downgrade(cell: &Arc<ContextCell>) -> Weak<ContextCell> {
    Arc::downgrade(cell)
}

/// Capability reporting the context a lookup runs in.
///
/// Queried on every environment-driven resolve; results are never cached
/// by the scopes.
pub trait ScopeEnvironment: Send + Sync {
    fn current_session(&self) -> Option<SessionHandle>;

    fn current_ui(&self) -> Option<UiHandle>;
}

/// Environment with explicitly supplied context.
///
/// Useful for hosts that pass the session and UI along with each request
/// rather than binding them to the worker thread.
#[derive(Debug, Clone, Default)]
pub struct FixedEnvironment {
    session: Option<SessionHandle>,
    ui: Option<UiHandle>,
}

impl FixedEnvironment {
    pub fn new(session: Option<SessionHandle>, ui: Option<UiHandle>) -> Self {
        Self { session, ui }
    }

    pub fn session(session: &SessionHandle) -> Self {
        Self { session: Some(session.clone()), ui: None }
    }

    pub fn ui(session: &SessionHandle, ui: &UiHandle) -> Self {
        Self { session: Some(session.clone()), ui: Some(ui.clone()) }
    }
}

impl ScopeEnvironment for FixedEnvironment {
    fn current_session(&self) -> Option<SessionHandle> {
        self.session.clone()
    }

    fn current_ui(&self) -> Option<UiHandle> {
        self.ui.clone()
    }
}

#[derive(Default)]
struct CurrentSlot {
    session: Option<SessionHandle>,
    ui: Option<UiHandle>,
}

// Per-thread "current" context, bound by the host around request handling
thread_local! {
    static CURRENT: RefCell<CurrentSlot> = RefCell::new(CurrentSlot::default());
}

/// Binds the current session and UI to the calling thread.
///
/// # Examples
///
/// ```
/// use ferrous_scopes::{CurrentContext, SessionHandle, UiHandle};
///
/// let session = SessionHandle::new();
/// let ui = UiHandle::new(&session);
///
/// assert!(CurrentContext::session().is_none());
/// {
///     let _guard = CurrentContext::enter(&session, &ui);
///     assert_eq!(CurrentContext::session(), Some(session.clone()));
///     assert_eq!(CurrentContext::ui(), Some(ui.clone()));
/// }
/// assert!(CurrentContext::session().is_none());
/// ```
pub struct CurrentContext;

impl CurrentContext {
    /// Makes `session` current and clears the current UI until the guard drops.
    pub fn enter_session(session: &SessionHandle) -> ContextGuard {
        Self::replace(Some(session.clone()), None)
    }

    /// Makes `ui` current, keeping the current session.
    pub fn enter_ui(ui: &UiHandle) -> ContextGuard {
        let session = Self::session();
        Self::replace(session, Some(ui.clone()))
    }

    pub fn enter(session: &SessionHandle, ui: &UiHandle) -> ContextGuard {
        Self::replace(Some(session.clone()), Some(ui.clone()))
    }

    pub fn session() -> Option<SessionHandle> {
        CURRENT.with(|slot| slot.borrow().session.clone())
    }

    pub fn ui() -> Option<UiHandle> {
        CURRENT.with(|slot| slot.borrow().ui.clone())
    }

    fn replace(session: Option<SessionHandle>, ui: Option<UiHandle>) -> ContextGuard {
        let previous = CURRENT.with(|slot| {
            let mut slot = slot.borrow_mut();
            let previous_session = std::mem::replace(&mut slot.session, session);
            let previous_ui = std::mem::replace(&mut slot.ui, ui);
            CurrentSlot { session: previous_session, ui: previous_ui }
        });
        ContextGuard { previous: Some(previous) }
    }
}

/// Restores the previously current context on drop.
#[must_use = "the context is unbound as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<CurrentSlot>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            // try_with: the thread-local may already be gone during thread teardown
            let _ = CURRENT.try_with(|slot| *slot.borrow_mut() = previous);
        }
    }
}

/// Environment backed by [`CurrentContext`]. The default for both scopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLocalEnvironment;

impl ScopeEnvironment for ThreadLocalEnvironment {
    fn current_session(&self) -> Option<SessionHandle> {
        CurrentContext::session()
    }

    fn current_ui(&self) -> Option<UiHandle> {
        CurrentContext::ui()
    }
}
