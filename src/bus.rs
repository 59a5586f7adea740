//! Scoped publish/subscribe.
//!
//! An [`EventBus`] dispatches events by type. [`SessionEventBus`] and
//! [`UiEventBus`] are buses cached in a session or UI scope, so components
//! of one session (or one UI) talk to each other without leaking handlers
//! past the context's end.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ScopeResult;
use crate::scope::{SessionScope, UiScope};
use crate::traits::ScopeResolver;

type Handler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Token returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Type-dispatched, synchronous event bus.
///
/// Handlers run on the posting thread, in subscription order, with no bus
/// lock held, so a handler may post further events or change
/// subscriptions. A panicking handler is logged and skipped.
///
/// # Examples
///
/// ```
/// use ferrous_scopes::EventBus;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// struct Saved { rows: u32 }
///
/// let bus = EventBus::new();
/// let total = Arc::new(AtomicU32::new(0));
/// let sink = total.clone();
/// let id = bus.subscribe(move |event: &Saved| {
///     sink.fetch_add(event.rows, Ordering::SeqCst);
/// });
///
/// assert_eq!(bus.post(&Saved { rows: 3 }), 1);
/// assert!(bus.unsubscribe(id));
/// assert_eq!(bus.post(&Saved { rows: 5 }), 0);
/// assert_eq!(total.load(Ordering::SeqCst), 3);
/// ```
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<TypeId, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of type `E`.
    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionId
    where
        E: Any,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let erased: Handler = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });
        self.handlers.write().entry(TypeId::of::<E>()).or_default().push((id, erased));
        id
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let mut removed = false;
        handlers.retain(|_, subscribers| {
            let before = subscribers.len();
            subscribers.retain(|(candidate, _)| *candidate != id);
            removed |= subscribers.len() != before;
            !subscribers.is_empty()
        });
        removed
    }

    /// Delivers `event` to every handler subscribed to `E`.
    ///
    /// Returns the number of handlers that completed without panicking.
    pub fn post<E: Any>(&self, event: &E) -> usize {
        let snapshot: Vec<Handler> = match self.handlers.read().get(&TypeId::of::<E>()) {
            Some(subscribers) => subscribers.iter().map(|(_, handler)| handler.clone()).collect(),
            None => Vec::new(),
        };

        if snapshot.is_empty() {
            tracing::debug!(event = std::any::type_name::<E>(), "dead event: no subscribers");
            return 0;
        }

        let mut delivered = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event as &dyn Any))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(event = std::any::type_name::<E>(), "event handler panicked");
                }
            }
        }
        delivered
    }

    /// Number of live subscriptions for `E`.
    pub fn subscriber_count<E: Any>(&self) -> usize {
        self.handlers.read().get(&TypeId::of::<E>()).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscriptions: usize = self.handlers.read().values().map(Vec::len).sum();
        f.debug_struct("EventBus").field("subscriptions", &subscriptions).finish()
    }
}

/// Event bus shared by every UI of one session.
///
/// ```
/// use ferrous_scopes::{CurrentContext, SessionEventBus, SessionHandle, SessionScope};
/// use std::sync::Arc;
///
/// let scope = SessionScope::new();
/// let session = SessionHandle::new();
/// let _bound = CurrentContext::enter_session(&session);
///
/// let a = SessionEventBus::current(&scope).unwrap();
/// let b = SessionEventBus::current(&scope).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Default)]
pub struct SessionEventBus {
    bus: EventBus,
}

impl SessionEventBus {
    /// The bus of the current session, created on first use.
    pub fn current(scope: &SessionScope) -> ScopeResult<Arc<SessionEventBus>> {
        scope.get_or_create(SessionEventBus::default)
    }
}

impl Deref for SessionEventBus {
    type Target = EventBus;

    fn deref(&self) -> &EventBus {
        &self.bus
    }
}

/// Event bus private to one UI.
#[derive(Debug, Default)]
pub struct UiEventBus {
    bus: EventBus,
}

impl UiEventBus {
    /// The bus of the current UI, created on first use.
    pub fn current(scope: &UiScope) -> ScopeResult<Arc<UiEventBus>> {
        scope.get_or_create(UiEventBus::default)
    }
}

impl Deref for UiEventBus {
    type Target = EventBus;

    fn deref(&self) -> &EventBus {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Ping;
    struct Pong;

    #[test]
    fn test_dispatch_is_by_type() {
        let bus = EventBus::new();
        let pings = Arc::new(AtomicUsize::new(0));
        let counter = pings.clone();
        bus.subscribe(move |_: &Ping| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.post(&Pong), 0);
        assert_eq!(bus.post(&Ping), 1);
        assert_eq!(pings.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count::<Ping>(), 1);
        assert_eq!(bus.subscriber_count::<Pong>(), 0);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_delivery() {
        let bus = EventBus::new();
        let reached = Arc::new(AtomicUsize::new(0));
        bus.subscribe(|_: &Ping| panic!("handler failure"));
        let counter = reached.clone();
        bus.subscribe(move |_: &Ping| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.post(&Ping), 1);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_can_post_and_subscribe() {
        let bus = Arc::new(EventBus::new());
        let pongs = Arc::new(AtomicUsize::new(0));

        let counter = pongs.clone();
        bus.subscribe(move |_: &Pong| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let inner = bus.clone();
        bus.subscribe(move |_: &Ping| {
            inner.post(&Pong);
            inner.subscribe(|_: &Pong| {});
        });

        bus.post(&Ping);
        assert_eq!(pongs.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count::<Pong>(), 2);
    }

    #[test]
    fn test_unsubscribe_twice() {
        let bus = EventBus::new();
        let id = bus.subscribe(|_: &Ping| {});
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count::<Ping>(), 0);
    }
}
