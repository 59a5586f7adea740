//! Bridges host lifecycle notifications to the scopes.
//!
//! The host tells a [`LifecycleBridge`] when a session is destroyed or a UI
//! detaches; the bridge forwards the notification to every registered
//! listener. Both scopes are listeners, so wiring them up is one call each:
//!
//! ```
//! use ferrous_scopes::{LifecycleBridge, ScopeResolver, CurrentContext, SessionHandle, UiHandle, UiScope};
//! use std::sync::Arc;
//!
//! let scope = Arc::new(UiScope::new());
//! let bridge = LifecycleBridge::new();
//! bridge.watch_sessions(scope.clone());
//! bridge.watch_uis(scope.clone());
//!
//! let session = SessionHandle::new();
//! let ui = UiHandle::new(&session);
//! {
//!     let _bound = CurrentContext::enter(&session, &ui);
//!     scope.get_or_create(|| 42u32).unwrap();
//! }
//! assert_eq!(scope.cached_count(&session, &ui), 1);
//!
//! bridge.fire_session_destroyed(&session);
//! assert_eq!(scope.cached_count(&session, &ui), 0);
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::{SessionHandle, UiHandle};

/// Notified when a session is destroyed.
///
/// Implementations must tolerate repeated notifications for one session and
/// notifications for sessions they never saw.
pub trait SessionDestroyListener: Send + Sync {
    fn session_destroyed(&self, session: &SessionHandle);
}

/// Notified when a UI detaches from its session.
pub trait UiDetachListener: Send + Sync {
    fn ui_detached(&self, session: &SessionHandle, ui: &UiHandle);
}

#[derive(Default)]
struct Listeners {
    sessions: Vec<Arc<dyn SessionDestroyListener>>,
    uis: Vec<Arc<dyn UiDetachListener>>,
}

/// Registry of lifecycle listeners.
///
/// Delivery is synchronous and in registration order. The listener list is
/// snapshotted before dispatch, so a listener may register further
/// listeners without deadlocking; those only see later notifications.
/// Clones share one registry.
#[derive(Clone, Default)]
pub struct LifecycleBridge {
    listeners: Arc<RwLock<Listeners>>,
}

impl LifecycleBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch_sessions(&self, listener: Arc<dyn SessionDestroyListener>) {
        self.listeners.write().sessions.push(listener);
    }

    pub fn watch_uis(&self, listener: Arc<dyn UiDetachListener>) {
        self.listeners.write().uis.push(listener);
    }

    /// Notifies every session listener that `session` is gone.
    pub fn fire_session_destroyed(&self, session: &SessionHandle) {
        let listeners = self.listeners.read().sessions.clone();
        tracing::debug!(session = session.id().as_u64(), listeners = listeners.len(), "session destroyed");
        for listener in listeners {
            listener.session_destroyed(session);
        }
    }

    /// Notifies every UI listener that `ui` detached from `session`.
    pub fn fire_ui_detached(&self, session: &SessionHandle, ui: &UiHandle) {
        let listeners = self.listeners.read().uis.clone();
        tracing::debug!(
            session = session.id().as_u64(),
            ui = ui.id().as_u64(),
            listeners = listeners.len(),
            "ui detached"
        );
        for listener in listeners {
            listener.ui_detached(session, ui);
        }
    }

    pub fn session_listener_count(&self) -> usize {
        self.listeners.read().sessions.len()
    }

    pub fn ui_listener_count(&self) -> usize {
        self.listeners.read().uis.len()
    }
}

impl std::fmt::Debug for LifecycleBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("LifecycleBridge")
            .field("session_listeners", &listeners.sessions.len())
            .field("ui_listeners", &listeners.uis.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl SessionDestroyListener for Recorder {
        fn session_destroyed(&self, session: &SessionHandle) {
            self.log.lock().push(format!("{}:session:{}", self.name, session.id()));
        }
    }

    impl UiDetachListener for Recorder {
        fn ui_detached(&self, _session: &SessionHandle, ui: &UiHandle) {
            self.log.lock().push(format!("{}:ui:{}", self.name, ui.id()));
        }
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bridge = LifecycleBridge::new();
        bridge.watch_sessions(Arc::new(Recorder { name: "first", log: log.clone() }));
        bridge.watch_sessions(Arc::new(Recorder { name: "second", log: log.clone() }));

        let session = SessionHandle::new();
        bridge.fire_session_destroyed(&session);

        let id = session.id();
        assert_eq!(*log.lock(), vec![format!("first:session:{}", id), format!("second:session:{}", id)]);
    }

    #[test]
    fn test_ui_and_session_listeners_are_separate() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bridge = LifecycleBridge::new();
        bridge.watch_uis(Arc::new(Recorder { name: "ui", log: log.clone() }));

        let session = SessionHandle::new();
        let ui = UiHandle::new(&session);
        bridge.fire_session_destroyed(&session);
        assert!(log.lock().is_empty());

        bridge.fire_ui_detached(&session, &ui);
        assert_eq!(log.lock().len(), 1);
        assert_eq!(bridge.session_listener_count(), 0);
        assert_eq!(bridge.ui_listener_count(), 1);
    }

    #[test]
    fn test_listener_may_register_during_dispatch() {
        struct Registrar {
            bridge: LifecycleBridge,
            log: Arc<Mutex<Vec<String>>>,
        }

        impl SessionDestroyListener for Registrar {
            fn session_destroyed(&self, _session: &SessionHandle) {
                self.bridge
                    .watch_sessions(Arc::new(Recorder { name: "late", log: self.log.clone() }));
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let bridge = LifecycleBridge::new();
        bridge.watch_sessions(Arc::new(Registrar { bridge: bridge.clone(), log: log.clone() }));

        let session = SessionHandle::new();
        bridge.fire_session_destroyed(&session);
        assert!(log.lock().is_empty());
        assert_eq!(bridge.session_listener_count(), 2);

        bridge.fire_session_destroyed(&session);
        assert_eq!(log.lock().len(), 1);
    }
}
