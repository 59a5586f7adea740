/// Scoped event bus tests
///
/// Session buses are shared across the UIs of a session, UI buses are not,
/// and both go away with their context.

use ferrous_scopes::{
    CurrentContext, LifecycleBridge, SessionEventBus, SessionHandle, SessionScope, UiEventBus, UiHandle, UiScope,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct DataChanged;

fn counting_handler(counter: &Arc<AtomicUsize>) -> impl Fn(&DataChanged) + Send + Sync + 'static {
    let counter = counter.clone();
    move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_session_bus_reaches_every_ui() {
    let scope = SessionScope::new();
    let session = SessionHandle::new();
    let left = UiHandle::new(&session);
    let right = UiHandle::new(&session);
    let received = Arc::new(AtomicUsize::new(0));

    {
        let _bound = CurrentContext::enter(&session, &left);
        SessionEventBus::current(&scope).unwrap().subscribe(counting_handler(&received));
    }
    {
        let _bound = CurrentContext::enter(&session, &right);
        SessionEventBus::current(&scope).unwrap().subscribe(counting_handler(&received));
    }

    let _bound = CurrentContext::enter(&session, &left);
    let delivered = SessionEventBus::current(&scope).unwrap().post(&DataChanged);

    assert_eq!(delivered, 2);
    assert_eq!(received.load(Ordering::SeqCst), 2);
}

#[test]
fn test_session_buses_are_isolated() {
    let scope = SessionScope::new();
    let first = SessionHandle::new();
    let second = SessionHandle::new();
    let received = Arc::new(AtomicUsize::new(0));

    {
        let _bound = CurrentContext::enter_session(&first);
        SessionEventBus::current(&scope).unwrap().subscribe(counting_handler(&received));
    }

    let _bound = CurrentContext::enter_session(&second);
    assert_eq!(SessionEventBus::current(&scope).unwrap().post(&DataChanged), 0);
    assert_eq!(received.load(Ordering::SeqCst), 0);
}

#[test]
fn test_ui_bus_is_private_to_its_ui() {
    let scope = UiScope::new();
    let session = SessionHandle::new();
    let subscriber = UiHandle::new(&session);
    let publisher = UiHandle::new(&session);
    let received = Arc::new(AtomicUsize::new(0));

    {
        let _bound = CurrentContext::enter(&session, &subscriber);
        UiEventBus::current(&scope).unwrap().subscribe(counting_handler(&received));
    }
    {
        let _bound = CurrentContext::enter(&session, &publisher);
        assert_eq!(UiEventBus::current(&scope).unwrap().post(&DataChanged), 0);
    }

    let _bound = CurrentContext::enter(&session, &subscriber);
    assert_eq!(UiEventBus::current(&scope).unwrap().post(&DataChanged), 1);
}

#[test]
fn test_bus_is_replaced_after_session_end() {
    let scope = Arc::new(SessionScope::new());
    let bridge = LifecycleBridge::new();
    bridge.watch_sessions(scope.clone());

    let session = SessionHandle::new();
    let _bound = CurrentContext::enter_session(&session);
    let received = Arc::new(AtomicUsize::new(0));

    let before = SessionEventBus::current(&scope).unwrap();
    before.subscribe(counting_handler(&received));

    bridge.fire_session_destroyed(&session);

    let after = SessionEventBus::current(&scope).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.subscriber_count::<DataChanged>(), 0);
    assert_eq!(after.post(&DataChanged), 0);
}

#[test]
fn test_ui_bus_requires_a_ui() {
    let scope = UiScope::new();
    let session = SessionHandle::new();
    let _bound = CurrentContext::enter_session(&session);

    assert!(UiEventBus::current(&scope).unwrap_err().is_precondition());
}
