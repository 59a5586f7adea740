//! Per-thread tracking of in-flight creations.
//!
//! Storage locks are reentrant so a factory can pull other keys from its own
//! context. That makes three mistakes silent unless tracked: a factory asking
//! for its own key (infinite recursion), a session-scoped factory asking for
//! a UI-scoped key (takes a UI lock while holding a session lock), and a
//! factory resolving into another context of its own kind (two such
//! factories crossing each other deadlock).
//!
//! With the last two rejected, a thread holds at most one UI storage lock
//! and one session storage lock, always taken UI first.

use std::cell::RefCell;

use crate::context::ContextId;
use crate::error::{ScopeError, ScopeResult};
use crate::key::Key;
use crate::lifetime::ScopeKind;
use crate::storage::ScopeStorage;

const MAX_DEPTH: usize = 1024;

struct Frame {
    kind: ScopeKind,
    context: ContextId,
    storage: usize,
    key: Key,
}

fn storage_id(storage: &ScopeStorage) -> usize {
    storage as *const ScopeStorage as usize
}

thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Fails if a UI-scoped lookup would run inside a session-scoped creation.
pub(crate) fn check_not_widening(requested: ScopeKind, key: &Key) -> ScopeResult<()> {
    if requested != ScopeKind::Ui {
        return Ok(());
    }
    let widening = RESOLUTION_STACK.with(|stack| {
        stack.borrow().iter().any(|frame| frame.kind == ScopeKind::Session)
    });
    if widening {
        tracing::warn!(key = %key, "ui-scoped lookup from inside a session-scoped factory");
        return Err(ScopeError::WrongScope(
            "cannot resolve a UI-scoped instance while creating a session-scoped one",
        ));
    }
    Ok(())
}

/// Fails if `storage` is not the storage already locked by an in-flight
/// creation of the same kind on this thread.
pub(crate) fn check_same_context(kind: ScopeKind, storage: &ScopeStorage, key: &Key) -> ScopeResult<()> {
    let target = storage_id(storage);
    let crossing = RESOLUTION_STACK.with(|stack| {
        stack.borrow().iter().any(|frame| frame.kind == kind && frame.storage != target)
    });
    if crossing {
        tracing::warn!(%kind, key = %key, "lookup in another context from inside a factory");
        return Err(ScopeError::WrongScope(
            "cannot resolve into another context of the same kind while creating an instance",
        ));
    }
    Ok(())
}

/// Marks a creation as in flight until dropped.
pub(crate) struct CreationFrame {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl CreationFrame {
    pub(crate) fn enter(kind: ScopeKind, context: ContextId, storage: &ScopeStorage, key: &Key) -> ScopeResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if stack.iter().any(|frame| frame.context == context && &frame.key == key) {
                let mut path: Vec<&'static str> = stack
                    .iter()
                    .skip_while(|frame| !(frame.context == context && &frame.key == key))
                    .map(|frame| frame.key.display_name())
                    .collect();
                path.push(key.display_name());
                return Err(ScopeError::Circular(path));
            }

            if stack.len() >= MAX_DEPTH {
                return Err(ScopeError::DepthExceeded(stack.len()));
            }

            stack.push(Frame { kind, context, storage: storage_id(storage), key: key.clone() });
            Ok(())
        })?;

        Ok(Self { _not_send: std::marker::PhantomData })
    }
}

impl Drop for CreationFrame {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SessionHandle;
    use crate::key::key_of_type;

    #[test]
    fn test_reentering_same_key_is_circular() {
        let session = SessionHandle::new();
        let storage = ScopeStorage::with_capacity(1);
        let _outer = CreationFrame::enter(ScopeKind::Session, session.id(), &storage, &key_of_type::<u8>()).unwrap();
        let _middle = CreationFrame::enter(ScopeKind::Session, session.id(), &storage, &key_of_type::<u16>()).unwrap();

        match CreationFrame::enter(ScopeKind::Session, session.id(), &storage, &key_of_type::<u8>()) {
            Err(ScopeError::Circular(path)) => assert_eq!(path, vec!["u8", "u16", "u8"]),
            _ => panic!("expected circular error"),
        }
    }

    #[test]
    fn test_same_key_in_other_context_is_allowed() {
        let first = SessionHandle::new();
        let second = SessionHandle::new();
        let (storage, other) = (ScopeStorage::with_capacity(1), ScopeStorage::with_capacity(1));
        let key = key_of_type::<u8>();

        let _outer = CreationFrame::enter(ScopeKind::Session, first.id(), &storage, &key).unwrap();
        assert!(CreationFrame::enter(ScopeKind::Session, second.id(), &other, &key).is_ok());
    }

    #[test]
    fn test_frames_pop_on_drop() {
        let session = SessionHandle::new();
        let storage = ScopeStorage::with_capacity(1);
        let key = key_of_type::<u32>();
        {
            let _frame = CreationFrame::enter(ScopeKind::Ui, session.id(), &storage, &key).unwrap();
        }
        assert!(CreationFrame::enter(ScopeKind::Ui, session.id(), &storage, &key).is_ok());
    }

    #[test]
    fn test_widening_detected_only_under_session_frame() {
        let session = SessionHandle::new();
        let storage = ScopeStorage::with_capacity(1);
        let key = key_of_type::<u32>();
        assert!(check_not_widening(ScopeKind::Ui, &key).is_ok());

        let _frame = CreationFrame::enter(ScopeKind::Session, session.id(), &storage, &key_of_type::<u8>()).unwrap();
        assert!(matches!(check_not_widening(ScopeKind::Ui, &key), Err(ScopeError::WrongScope(_))));
        assert!(check_not_widening(ScopeKind::Session, &key).is_ok());
    }

    #[test]
    fn test_crossing_into_another_context_of_the_same_kind() {
        let session = SessionHandle::new();
        let own = ScopeStorage::with_capacity(1);
        let foreign = ScopeStorage::with_capacity(1);
        let key = key_of_type::<u32>();
        assert!(check_same_context(ScopeKind::Ui, &foreign, &key).is_ok());

        let _frame = CreationFrame::enter(ScopeKind::Ui, session.id(), &own, &key_of_type::<u8>()).unwrap();
        assert!(check_same_context(ScopeKind::Ui, &own, &key).is_ok());
        assert!(matches!(check_same_context(ScopeKind::Ui, &foreign, &key), Err(ScopeError::WrongScope(_))));
        assert!(check_same_context(ScopeKind::Session, &foreign, &key).is_ok());
    }
}
