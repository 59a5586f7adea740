/// Property-based tests for scoped caching
///
/// Random sequences of lookups and teardowns are replayed against both the
/// scopes and a plain map model; every lookup must agree with the model.

use ferrous_scopes::{creator, key_of_type, named_key_of_type, SessionHandle, SessionScope, UiHandle, UiScope};
use proptest::prelude::*;
use std::collections::HashMap;

const SESSIONS: usize = 3;
const UIS_PER_SESSION: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Resolve { session: usize, ui: usize, value: u32 },
    EndUi { session: usize, ui: usize },
    EndSession { session: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0..SESSIONS, 0..UIS_PER_SESSION, any::<u32>())
            .prop_map(|(session, ui, value)| Op::Resolve { session, ui, value }),
        1 => (0..SESSIONS, 0..UIS_PER_SESSION).prop_map(|(session, ui)| Op::EndUi { session, ui }),
        1 => (0..SESSIONS).prop_map(|session| Op::EndSession { session }),
    ]
}

struct Contexts {
    sessions: Vec<SessionHandle>,
    uis: Vec<Vec<UiHandle>>,
}

impl Contexts {
    fn new() -> Self {
        let sessions: Vec<SessionHandle> = (0..SESSIONS).map(|_| SessionHandle::new()).collect();
        let uis = sessions
            .iter()
            .map(|session| (0..UIS_PER_SESSION).map(|_| UiHandle::new(session)).collect())
            .collect();
        Self { sessions, uis }
    }
}

fn resolve_ui(scope: &UiScope, contexts: &Contexts, session: usize, ui: usize, value: u32) -> u32 {
    let any = scope
        .resolve_in(
            &key_of_type::<u32>(),
            Some(&contexts.sessions[session]),
            Some(&contexts.uis[session][ui]),
            creator(move || value),
        )
        .unwrap();
    *any.downcast_ref::<u32>().unwrap()
}

proptest! {
    #[test]
    fn ui_scope_matches_model(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let scope = UiScope::new();
        let contexts = Contexts::new();
        let mut model: HashMap<(usize, usize), u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Resolve { session, ui, value } => {
                    let expected = *model.entry((session, ui)).or_insert(value);
                    prop_assert_eq!(resolve_ui(&scope, &contexts, session, ui, value), expected);
                }
                Op::EndUi { session, ui } => {
                    let was_cached = model.remove(&(session, ui)).is_some();
                    prop_assert_eq!(scope.on_ui_end(&contexts.sessions[session], &contexts.uis[session][ui]), was_cached);
                }
                Op::EndSession { session } => {
                    model.retain(|(s, _), _| *s != session);
                    scope.on_session_end(&contexts.sessions[session]);
                    prop_assert_eq!(scope.ui_count(&contexts.sessions[session]), 0);
                }
            }
        }

        for session in 0..SESSIONS {
            for ui in 0..UIS_PER_SESSION {
                let expected = usize::from(model.contains_key(&(session, ui)));
                prop_assert_eq!(scope.cached_count(&contexts.sessions[session], &contexts.uis[session][ui]), expected);
            }
        }
    }
}

proptest! {
    #[test]
    fn session_scope_matches_model(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let scope = SessionScope::new();
        let contexts = Contexts::new();
        let mut model: HashMap<usize, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Resolve { session, value, .. } => {
                    let expected = *model.entry(session).or_insert(value);
                    let any = scope
                        .resolve_in(&key_of_type::<u32>(), Some(&contexts.sessions[session]), creator(move || value))
                        .unwrap();
                    prop_assert_eq!(*any.downcast_ref::<u32>().unwrap(), expected);
                }
                Op::EndUi { .. } => {}
                Op::EndSession { session } => {
                    let was_cached = model.remove(&session).is_some();
                    prop_assert_eq!(scope.on_session_end(&contexts.sessions[session]), was_cached);
                }
            }
        }

        prop_assert_eq!(scope.session_count(), model.len());
    }
}

proptest! {
    #[test]
    fn qualifiers_partition_a_context(qualifiers in prop::collection::hash_set("[a-z]{1,8}", 1..8)) {
        let scope = SessionScope::new();
        let session = SessionHandle::new();

        for qualifier in &qualifiers {
            // Keys need a 'static qualifier
            let qualifier: &'static str = Box::leak(qualifier.clone().into_boxed_str());
            let stored = scope
                .resolve_in(&named_key_of_type::<String>(qualifier), Some(&session), creator(move || qualifier.to_string()))
                .unwrap();
            prop_assert_eq!(stored.downcast_ref::<String>().map(String::as_str), Some(qualifier));
        }

        prop_assert_eq!(scope.cached_count(&session), qualifiers.len());
    }
}
