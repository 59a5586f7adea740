//! UI-within-session scoping.

use std::fmt;
use std::sync::Arc;

use crate::config::ScopeConfig;
use crate::context::{ContextId, ScopeEnvironment, SessionHandle, ThreadLocalEnvironment, UiHandle};
use crate::error::{MissingContext, ScopeError, ScopeResult};
use crate::internal::{check_not_widening, WeakDirectory};
use crate::key::Key;
use crate::lifecycle::{SessionDestroyListener, UiDetachListener};
use crate::lifetime::ScopeKind;
use crate::observer::{Observers, ReleaseReason, ScopeObserver};
use crate::storage::{AnyArc, ScopeStorage};
use crate::traits::{ContextScope, Creator};

use super::{get_or_create_in, report_released};

/// The UI directory of one session.
struct SessionUis {
    uis: WeakDirectory<ScopeStorage>,
}

/// Caches one instance per key per UI, nested under the UI's session.
///
/// Ending a session discards the storage of every UI under it. A UI can
/// also be released on its own with [`on_ui_end`](Self::on_ui_end), and
/// UIs or sessions whose handles are dropped without either notification
/// are swept by later lookups in the same directory and by
/// [`purge_stale`](Self::purge_stale).
///
/// A factory may resolve other keys of its own UI, and keys of a
/// [`SessionScope`](crate::SessionScope). Resolving into a different UI
/// from inside a factory fails with [`ScopeError::WrongScope`]: the factory
/// holds its UI's storage lock, and two such factories crossing each other
/// would deadlock.
///
/// # Examples
///
/// ```
/// use ferrous_scopes::{creator, key_of_type, SessionHandle, UiHandle, UiScope};
/// use std::sync::Arc;
///
/// let scope = UiScope::new();
/// let session = SessionHandle::new();
/// let ui = UiHandle::new(&session);
/// let key = key_of_type::<String>();
///
/// let first = scope
///     .resolve_in(&key, Some(&session), Some(&ui), creator(|| "m1".to_string()))
///     .unwrap();
/// let second = scope
///     .resolve_in(&key, Some(&session), Some(&ui), creator(|| "m2".to_string()))
///     .unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
///
/// scope.on_session_end(&session);
/// let third = scope
///     .resolve_in(&key, Some(&session), Some(&ui), creator(|| "m3".to_string()))
///     .unwrap();
/// assert_eq!(third.downcast_ref::<String>().map(String::as_str), Some("m3"));
/// ```
pub struct UiScope {
    sessions: WeakDirectory<SessionUis>,
    environment: Arc<dyn ScopeEnvironment>,
    observers: Observers,
    config: ScopeConfig,
}

impl UiScope {
    /// Creates a UI scope reading the current context from [`CurrentContext`](crate::CurrentContext).
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

    /// Replaces the environment consulted by [`ContextScope::resolve_any`].
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

    /// Resolves `key` for an explicitly supplied session and UI.
    ///
    /// Fails with [`ScopeError::Precondition`] when either is absent. The
    /// session's UI directory and the UI's storage are created on first use;
    /// `create` runs at most once per (session, UI, key) no matter how many
    /// threads race here.
    pub fn resolve_in(
        &self,
        key: &Key,
        session: Option<&SessionHandle>,
        ui: Option<&UiHandle>,
        create: Creator<'_>,
    ) -> ScopeResult<AnyArc> {
        let session = session.ok_or(ScopeError::Precondition(MissingContext::Session))?;
        let ui = ui.ok_or(ScopeError::Precondition(MissingContext::Ui))?;
        check_not_widening(ScopeKind::Ui, key)?;

        let uis = self.session_uis(session);
        let storage = self.ui_storage(&uis, ui);
        get_or_create_in(&storage, ScopeKind::Ui, ui.id(), key, create, &self.observers)
    }

    fn session_uis(&self, session: &SessionHandle) -> Arc<SessionUis> {
        let (uis, created, swept) = self.sessions.get_or_insert_with(session.cell(), || SessionUis {
            uis: WeakDirectory::new(self.config.initial_capacity, self.config.purge_interval),
        });
        if created {
            tracing::debug!(session = session.id().as_u64(), "ui scope: session directory opened");
        }
        for (session_id, stale) in swept {
            self.release_session(session_id, &stale, ReleaseReason::Reclaimed);
        }
        uis
    }

    fn ui_storage(&self, uis: &SessionUis, ui: &UiHandle) -> Arc<ScopeStorage> {
        let (storage, created, swept) = uis
            .uis
            .get_or_insert_with(ui.cell(), || ScopeStorage::with_capacity(self.config.initial_capacity));
        if created {
            self.observers.context_opened(ScopeKind::Ui, ui.id());
        }
        for (ui_id, stale) in swept {
            report_released(&self.observers, ScopeKind::Ui, ui_id, &stale, ReleaseReason::Reclaimed);
        }
        storage
    }

    /// Reports every UI under a released session. Returns how many there were.
    fn release_session(&self, session_id: ContextId, uis: &SessionUis, reason: ReleaseReason) -> usize {
        let released = uis.uis.entries();
        let count = released.len();
        tracing::debug!(session = session_id.as_u64(), uis = count, ?reason, "ui scope: session released");
        for (ui_id, storage) in released {
            report_released(&self.observers, ScopeKind::Ui, ui_id, &storage, reason);
        }
        count
    }

    /// Discards the storage of every UI under `session`.
    ///
    /// Returns false if nothing was cached for the session. Calling it again,
    /// or for a session this scope never saw, is a no-op.
    pub fn on_session_end(&self, session: &SessionHandle) -> bool {
        match self.sessions.remove(session.id()) {
            Some(uis) => {
                self.release_session(session.id(), &uis, ReleaseReason::SessionEnded);
                true
            }
            None => false,
        }
    }

    /// Discards the storage of one UI, leaving its siblings untouched.
    pub fn on_ui_end(&self, session: &SessionHandle, ui: &UiHandle) -> bool {
        let Some(uis) = self.sessions.get(session.cell()) else {
            return false;
        };
        match uis.uis.remove(ui.id()) {
            Some(storage) => {
                tracing::debug!(session = session.id().as_u64(), ui = ui.id().as_u64(), "ui scope: ui released");
                report_released(&self.observers, ScopeKind::Ui, ui.id(), &storage, ReleaseReason::UiDetached);
                true
            }
            None => false,
        }
    }

    /// Sweeps sessions and UIs whose handles are no longer reachable.
    ///
    /// Returns the number of UI contexts reclaimed, counting the UIs nested
    /// under a reclaimed session. This matches the number of
    /// [`ReleaseReason::Reclaimed`] notifications observers receive.
    pub fn purge_stale(&self) -> usize {
        let mut reclaimed = 0;

        for (session_id, uis) in self.sessions.purge_stale() {
            reclaimed += self.release_session(session_id, &uis, ReleaseReason::Reclaimed);
        }

        for (_, uis) in self.sessions.entries() {
            for (ui_id, storage) in uis.uis.purge_stale() {
                reclaimed += 1;
                report_released(&self.observers, ScopeKind::Ui, ui_id, &storage, ReleaseReason::Reclaimed);
            }
        }

        if reclaimed > 0 {
            tracing::debug!(reclaimed, "ui scope: swept unreachable contexts");
        }
        reclaimed
    }

    /// Number of sessions with a UI directory.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of UIs with storage under `session`.
    pub fn ui_count(&self, session: &SessionHandle) -> usize {
        self.sessions.get(session.cell()).map_or(0, |uis| uis.uis.len())
    }

    /// Number of instances cached for `ui` under `session`.
    pub fn cached_count(&self, session: &SessionHandle, ui: &UiHandle) -> usize {
        self.sessions
            .get(session.cell())
            .and_then(|uis| uis.uis.get(ui.cell()))
            .map_or(0, |storage| storage.len())
    }
}

impl Default for UiScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UiScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiScope")
            .field("sessions", &self.sessions.len())
            .field("config", &self.config)
            .finish()
    }
}

impl ContextScope for UiScope {
    fn kind(&self) -> ScopeKind {
        ScopeKind::Ui
    }

    fn resolve_any(&self, key: &Key, create: Creator<'_>) -> ScopeResult<AnyArc> {
        let session = self.environment.current_session();
        let ui = self.environment.current_ui();
        self.resolve_in(key, session.as_ref(), ui.as_ref(), create)
    }
}

impl SessionDestroyListener for UiScope {
    fn session_destroyed(&self, session: &SessionHandle) {
        self.on_session_end(session);
    }
}

impl UiDetachListener for UiScope {
    fn ui_detached(&self, session: &SessionHandle, ui: &UiHandle) {
        self.on_ui_end(session, ui);
    }
}
