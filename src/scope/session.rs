//! Session scoping.

use std::fmt;
use std::sync::Arc;

use crate::config::ScopeConfig;
use crate::context::{ScopeEnvironment, SessionHandle, ThreadLocalEnvironment};
use crate::error::{MissingContext, ScopeError, ScopeResult};
use crate::internal::WeakDirectory;
use crate::key::Key;
use crate::lifecycle::SessionDestroyListener;
use crate::lifetime::ScopeKind;
use crate::observer::{Observers, ReleaseReason, ScopeObserver};
use crate::storage::{AnyArc, ScopeStorage};
use crate::traits::{ContextScope, Creator};

use super::{get_or_create_in, report_released};

/// Caches one instance per key per session.
///
/// All UIs of a session share these instances. The session's storage lock
/// is held across each creation, so lookups within one session are
/// serialized while a factory runs; sessions never block each other. A
/// factory resolving into a different session fails with
/// [`ScopeError::WrongScope`](crate::ScopeError::WrongScope).
///
/// # Examples
///
/// ```
/// use ferrous_scopes::{CurrentContext, ScopeResolver, SessionHandle, SessionScope};
/// use std::sync::Arc;
///
/// struct Preferences { theme: &'static str }
///
/// let scope = SessionScope::new();
/// let alice = SessionHandle::labeled("alice");
/// let bob = SessionHandle::labeled("bob");
///
/// let alice_prefs = {
///     let _bound = CurrentContext::enter_session(&alice);
///     scope.get_or_create(|| Preferences { theme: "dark" }).unwrap()
/// };
/// let bob_prefs = {
///     let _bound = CurrentContext::enter_session(&bob);
///     scope.get_or_create(|| Preferences { theme: "light" }).unwrap()
/// };
///
/// assert!(!Arc::ptr_eq(&alice_prefs, &bob_prefs));
/// assert_eq!(bob_prefs.theme, "light");
/// ```
pub struct SessionScope {
    sessions: WeakDirectory<ScopeStorage>,
    environment: Arc<dyn ScopeEnvironment>,
    observers: Observers,
    config: ScopeConfig,
}

impl SessionScope {
    pub fn new() -> Self {
        Self::with_config(ScopeConfig::default())
    }

    pub fn with_config(config: ScopeConfig) -> Self {
        Self {
            sessions: WeakDirectory::new(config.initial_capacity, config.purge_interval),
            environment: Arc::new(ThreadLocalEnvironment),
            observers: Observers::default(),
            config,
        }
    }

    pub fn with_environment(mut self, environment: Arc<dyn ScopeEnvironment>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ScopeObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Resolves `key` for an explicitly supplied session.
    ///
    /// Fails with [`ScopeError::Precondition`] when the session is absent.
    /// `create` runs at most once per (session, key).
    pub fn resolve_in(&self, key: &Key, session: Option<&SessionHandle>, create: Creator<'_>) -> ScopeResult<AnyArc> {
        let session = session.ok_or(ScopeError::Precondition(MissingContext::Session))?;
        let storage = self.session_storage(session);
        get_or_create_in(&storage, ScopeKind::Session, session.id(), key, create, &self.observers)
    }

    fn session_storage(&self, session: &SessionHandle) -> Arc<ScopeStorage> {
        let (storage, created, swept) = self
            .sessions
            .get_or_insert_with(session.cell(), || ScopeStorage::with_capacity(self.config.initial_capacity));
        if created {
            self.observers.context_opened(ScopeKind::Session, session.id());
        }
        for (session_id, stale) in swept {
            tracing::debug!(session = session_id.as_u64(), "session scope: unreachable session reclaimed");
            report_released(&self.observers, ScopeKind::Session, session_id, &stale, ReleaseReason::Reclaimed);
        }
        storage
    }

    /// Discards everything cached for `session`.
    ///
    /// Idempotent: returns false when there was nothing to discard.
    pub fn on_session_end(&self, session: &SessionHandle) -> bool {
        match self.sessions.remove(session.id()) {
            Some(storage) => {
                tracing::debug!(session = session.id().as_u64(), "session scope: session released");
                report_released(&self.observers, ScopeKind::Session, session.id(), &storage, ReleaseReason::SessionEnded);
                true
            }
            None => false,
        }
    }

    /// Sweeps sessions whose handles are no longer reachable.
    pub fn purge_stale(&self) -> usize {
        let swept = self.sessions.purge_stale();
        for (session_id, storage) in &swept {
            report_released(&self.observers, ScopeKind::Session, *session_id, storage, ReleaseReason::Reclaimed);
        }
        if !swept.is_empty() {
            tracing::debug!(reclaimed = swept.len(), "session scope: swept unreachable sessions");
        }
        swept.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of instances cached for `session`.
    pub fn cached_count(&self, session: &SessionHandle) -> usize {
        self.sessions.get(session.cell()).map_or(0, |storage| storage.len())
    }
}

impl Default for SessionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionScope")
            .field("sessions", &self.sessions.len())
            .field("config", &self.config)
            .finish()
    }
}

impl ContextScope for SessionScope {
    fn kind(&self) -> ScopeKind {
        ScopeKind::Session
    }

    fn resolve_any(&self, key: &Key, create: Creator<'_>) -> ScopeResult<AnyArc> {
        let session = self.environment.current_session();
        self.resolve_in(key, session.as_ref(), create)
    }
}

impl SessionDestroyListener for SessionScope {
    fn session_destroyed(&self, session: &SessionHandle) {
        self.on_session_end(session);
    }
}
