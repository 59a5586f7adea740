//! Handle-keyed directory with weak-reference reclamation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::context::{downgrade, ContextCell, ContextId};

struct DirectoryEntry<V> {
    handle: Weak<ContextCell>,
    value: Arc<V>,
}

impl<V> DirectoryEntry<V> {
    fn is_stale(&self) -> bool {
        self.handle.strong_count() == 0
    }
}

/// Maps a live context handle to its private storage.
///
/// Entries reference their handle weakly. Once every clone of a handle is
/// dropped the entry is stale. Stale entries are swept on every insertion,
/// on every `purge_interval`-th cache hit, and by an explicit
/// [`purge_stale`](Self::purge_stale).
///
/// Values leaving the directory are always dropped after the lock is
/// released, so instance destructors never run under the directory lock.
pub(crate) struct WeakDirectory<V> {
    entries: RwLock<HashMap<ContextId, DirectoryEntry<V>>>,
    hits_since_purge: AtomicUsize,
    purge_interval: usize,
}

impl<V> WeakDirectory<V> {
    pub(crate) fn new(initial_capacity: usize, purge_interval: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(initial_capacity)),
            hits_since_purge: AtomicUsize::new(0),
            purge_interval,
        }
    }

    pub(crate) fn get(&self, handle: &Arc<ContextCell>) -> Option<Arc<V>> {
        self.entries.read().get(&handle.id).map(|entry| entry.value.clone())
    }

    /// Returns the entry for `handle`, installing `make()` if there is none.
    ///
    /// The boolean is true when this call installed the value. Lookup and
    /// insertion are atomic: racing callers for one handle all get the same
    /// `Arc`. Stale entries swept along the way are returned for the caller
    /// to report and drop. An insertion always sweeps; a hit sweeps once the
    /// hit counter reaches `purge_interval`.
    pub(crate) fn get_or_insert_with<F>(
        &self,
        handle: &Arc<ContextCell>,
        make: F,
    ) -> (Arc<V>, bool, Vec<(ContextId, Arc<V>)>)
    where
        F: FnOnce() -> V,
    {
        // Fast path: read lock only
        if let Some(value) = self.get(handle) {
            let hits = self.hits_since_purge.fetch_add(1, Ordering::Relaxed) + 1;
            let swept = if hits >= self.purge_interval { self.purge_stale() } else { Vec::new() };
            return (value, false, swept);
        }

        let (value, swept) = {
            let mut entries = self.entries.write();

            // Double-checked: another thread may have installed it meanwhile
            if let Some(entry) = entries.get(&handle.id) {
                return (entry.value.clone(), false, Vec::new());
            }

            self.hits_since_purge.store(0, Ordering::Relaxed);
            let swept = Self::drain_stale(&mut entries);

            let value = Arc::new(make());
            entries.insert(
                handle.id,
                DirectoryEntry { handle: downgrade(handle), value: value.clone() },
            );
            (value, swept)
        };

        (value, true, swept)
    }

    /// Removes the entry for `id`. Removing an unknown id is a no-op.
    pub(crate) fn remove(&self, id: ContextId) -> Option<Arc<V>> {
        let removed = self.entries.write().remove(&id);
        removed.map(|entry| entry.value)
    }

    /// Removes every entry whose handle is no longer reachable.
    pub(crate) fn purge_stale(&self) -> Vec<(ContextId, Arc<V>)> {
        self.hits_since_purge.store(0, Ordering::Relaxed);
        {
            let entries = self.entries.read();
            if !entries.values().any(DirectoryEntry::is_stale) {
                return Vec::new();
            }
        }
        let mut entries = self.entries.write();
        Self::drain_stale(&mut entries)
    }

    fn drain_stale(entries: &mut HashMap<ContextId, DirectoryEntry<V>>) -> Vec<(ContextId, Arc<V>)> {
        let stale: Vec<ContextId> = entries
            .iter()
            .filter(|(_, entry)| entry.is_stale())
            .map(|(id, _)| *id)
            .collect();

        stale
            .into_iter()
            .filter_map(|id| entries.remove(&id).map(|entry| (id, entry.value)))
            .collect()
    }

    /// Snapshot of every entry currently held, live or stale.
    pub(crate) fn entries(&self) -> Vec<(ContextId, Arc<V>)> {
        self.entries.read().iter().map(|(id, entry)| (*id, entry.value.clone())).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}
