//! Per-context instance storage.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::ReentrantMutex;

use crate::error::ScopeResult;
use crate::key::Key;

/// Type-erased cached instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Outcome of a get-or-create.
pub(crate) enum Lookup {
    Cached(AnyArc),
    Created(AnyArc, Duration),
}

#[cfg(test)]
impl Lookup {
    pub(crate) fn into_value(self) -> AnyArc {
        match self {
            Lookup::Cached(value) | Lookup::Created(value, _) => value,
        }
    }
}

/// Key to instance map for exactly one context.
///
/// The lock is held across the creation call, which is what makes creation
/// at-most-once per key: a second caller for the same key waits and then
/// sees the first caller's instance. It is reentrant so the creating thread
/// can resolve other keys of the same context from inside the factory. The
/// `RefCell` is never borrowed across the factory call.
pub(crate) struct ScopeStorage {
    instances: ReentrantMutex<RefCell<HashMap<Key, AnyArc>>>,
}

impl ScopeStorage {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { instances: ReentrantMutex::new(RefCell::new(HashMap::with_capacity(capacity))) }
    }

    pub(crate) fn get_or_create<F>(&self, key: &Key, create: F) -> ScopeResult<Lookup>
    where
        F: FnOnce() -> ScopeResult<AnyArc>,
    {
        let guard = self.instances.lock();

        let cached = guard.borrow().get(key).cloned();
        if let Some(value) = cached {
            return Ok(Lookup::Cached(value));
        }

        let started = Instant::now();
        let created = create()?;
        let elapsed = started.elapsed();

        let stored = guard.borrow_mut().entry(key.clone()).or_insert(created).clone();
        Ok(Lookup::Created(stored, elapsed))
    }

    pub(crate) fn len(&self) -> usize {
        self.instances.lock().borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScopeError;
    use crate::key::key_of_type;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_second_lookup_is_cached() {
        let storage = ScopeStorage::with_capacity(4);
        let calls = AtomicU32::new(0);
        let key = key_of_type::<String>();

        let make = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new("value".to_string()) as AnyArc)
        };

        let first = storage.get_or_create(&key, make).unwrap();
        assert!(matches!(first, Lookup::Created(_, _)));
        let second = storage.get_or_create(&key, || unreachable!()).unwrap();
        assert!(matches!(second, Lookup::Cached(_)));

        assert!(Arc::ptr_eq(&first.into_value(), &second.into_value()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_creation_is_not_cached() {
        let storage = ScopeStorage::with_capacity(4);
        let key = key_of_type::<u64>();

        let failed = storage.get_or_create(&key, || Err(ScopeError::Config("boom".into())));
        assert!(failed.is_err());
        assert_eq!(storage.len(), 0);

        let value = storage.get_or_create(&key, || Ok(Arc::new(5u64) as AnyArc)).unwrap();
        assert_eq!(*value.into_value().downcast::<u64>().unwrap(), 5);
    }

    #[test]
    fn test_factory_can_resolve_other_keys_reentrantly() {
        let storage = ScopeStorage::with_capacity(4);

        let outer = storage
            .get_or_create(&key_of_type::<String>(), || {
                let inner = storage.get_or_create(&key_of_type::<u32>(), || Ok(Arc::new(3u32) as AnyArc))?;
                let n = inner.into_value().downcast::<u32>().unwrap();
                Ok(Arc::new(format!("n={}", n)) as AnyArc)
            })
            .unwrap();

        assert_eq!(*outer.into_value().downcast::<String>().unwrap(), "n=3");
        assert_eq!(storage.len(), 2);
    }
}
