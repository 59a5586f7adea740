#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_scopes::{creator, key_of_type, named_key_of_type, LifecycleBridge, SessionHandle, UiHandle, UiScope};
use std::collections::HashMap;
use std::sync::Arc;

const QUALIFIERS: [&str; 4] = ["a", "b", "c", "d"];

fuzz_target!(|data: &[u8]| {
    let scope = Arc::new(UiScope::new());
    let bridge = LifecycleBridge::new();
    bridge.watch_sessions(scope.clone());
    bridge.watch_uis(scope.clone());

    let mut sessions: Vec<SessionHandle> = Vec::new();
    let mut uis: Vec<(usize, UiHandle)> = Vec::new();
    let mut expected: HashMap<(u64, u64, usize), u8> = HashMap::new();

    // Each byte pair is one operation: opcode and argument
    for chunk in data.chunks(2) {
        let op = chunk[0] % 6;
        let arg = chunk.get(1).copied().unwrap_or(0);

        match op {
            0 => sessions.push(SessionHandle::new()),
            1 if !sessions.is_empty() => {
                let owner = arg as usize % sessions.len();
                uis.push((owner, UiHandle::new(&sessions[owner])));
            }
            2 if !uis.is_empty() => {
                let (owner, ui) = &uis[arg as usize % uis.len()];
                let session = &sessions[*owner];
                let slot = arg as usize % QUALIFIERS.len();
                let value = scope
                    .resolve_in(&named_key_of_type::<u8>(QUALIFIERS[slot]), Some(session), Some(ui), creator(move || arg))
                    .expect("live context resolves");
                let stored = *value.downcast_ref::<u8>().expect("u8 stored under u8 key");
                let model = *expected
                    .entry((session.id().as_u64(), ui.id().as_u64(), slot))
                    .or_insert(arg);
                assert_eq!(stored, model);
            }
            3 if !uis.is_empty() => {
                let (owner, ui) = &uis[arg as usize % uis.len()];
                let session = &sessions[*owner];
                bridge.fire_ui_detached(session, ui);
                let (s, u) = (session.id().as_u64(), ui.id().as_u64());
                expected.retain(|(es, eu, _), _| !(*es == s && *eu == u));
            }
            4 if !sessions.is_empty() => {
                let session = &sessions[arg as usize % sessions.len()];
                bridge.fire_session_destroyed(session);
                let s = session.id().as_u64();
                expected.retain(|(es, _, _), _| *es != s);
            }
            5 => {
                // Nothing live is ever reclaimed
                assert_eq!(scope.purge_stale(), 0);
            }
            _ => {}
        }
    }

    // Without context a lookup is a precondition failure, never a panic
    let _ = scope.resolve_in(&key_of_type::<u8>(), None, None, creator(|| 0u8));
});
