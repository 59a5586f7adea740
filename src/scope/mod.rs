//! The session and UI scopes.
//!
//! Both scopes cache instances per context and per key, create each
//! instance at most once per context, and drop a context's instances when
//! the host reports its end or its handle becomes unreachable.
//!
//! # Locking
//!
//! Directory locks (the session directory, and each session's UI directory)
//! are only held for a lookup, an insertion or a sweep, and never across a
//! factory call. The storage lock of a single context (a UI for
//! [`UiScope`], a session for [`SessionScope`]) is held across the factory
//! call for its key. A factory may not resolve into a different context of
//! its own kind (that fails with `ScopeError::WrongScope`), so a thread
//! holds at most one storage lock per kind and contexts never wait on each
//! other in a cycle.
//!
//! # Teardown racing a resolve
//!
//! A resolve that located a context's storage before `on_session_end`
//! removed it completes against that storage and returns an instance that
//! is no longer reachable through the scope; it is dropped once the caller
//! releases it. A resolve that starts after teardown creates fresh storage.

mod provider;
mod session;
mod ui;

pub use provider::Scoped;
pub use session::SessionScope;
pub use ui::UiScope;

use crate::context::ContextId;
use crate::error::{ScopeError, ScopeResult};
use crate::key::Key;
use crate::lifetime::ScopeKind;
use crate::observer::{Observers, ReleaseReason};
use crate::storage::{AnyArc, Lookup, ScopeStorage};
use crate::traits::Creator;
use crate::internal::{check_same_context, CreationFrame};

/// Runs `create` for `key` inside `storage`, tracking the creation frame.
pub(crate) fn get_or_create_in(
    storage: &ScopeStorage,
    kind: ScopeKind,
    context: ContextId,
    key: &Key,
    create: Creator<'_>,
    observers: &Observers,
) -> ScopeResult<AnyArc> {
    check_same_context(kind, storage, key)?;
    let lookup = storage.get_or_create(key, || {
        let _frame = CreationFrame::enter(kind, context, storage, key)?;
        create().map_err(|source| ScopeError::Creation { key: key.display_name(), source })
    });

    match lookup {
        Ok(Lookup::Cached(value)) => {
            observers.instance_reused(kind, context, key);
            Ok(value)
        }
        Ok(Lookup::Created(value, duration)) => {
            observers.instance_created(kind, context, key, duration);
            Ok(value)
        }
        Err(error) => {
            tracing::warn!(%kind, context = context.as_u64(), key = %key, %error, "scoped resolution failed");
            observers.creation_failed(kind, context, key, &error);
            Err(error)
        }
    }
}

/// Reports a released storage. Counting takes the storage lock, so it is
/// skipped when nobody is listening.
pub(crate) fn report_released(
    observers: &Observers,
    kind: ScopeKind,
    context: ContextId,
    storage: &ScopeStorage,
    reason: ReleaseReason,
) {
    if observers.has_observers() {
        observers.context_released(kind, context, reason, storage.len());
    }
}
