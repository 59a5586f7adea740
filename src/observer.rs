//! Diagnostic observers for scoped caching.
//!
//! Observers receive context and instance lifecycle events from both scopes.
//! They run synchronously on the resolving thread, so implementations should
//! stay cheap. Every hook has a no-op default.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::ContextId;
use crate::key::Key;
use crate::lifetime::ScopeKind;

/// Why a context's storage was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// The host reported the session's end.
    SessionEnded,
    /// The host reported a UI detach.
    UiDetached,
    /// The handle became unreachable and the entry was swept.
    Reclaimed,
}

/// Observer trait for scope events.
///
/// # Examples
///
/// ```
/// use ferrous_scopes::{ScopeObserver, ScopeKind, ContextId, Key, UiScope};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct SlowFactoryAlarm;
///
/// impl ScopeObserver for SlowFactoryAlarm {
///     fn instance_created(&self, kind: ScopeKind, context: ContextId, key: &Key, duration: Duration) {
///         if duration > Duration::from_millis(50) {
///             eprintln!("slow {} factory for {} in {}", kind, key, context);
///         }
///     }
/// }
///
/// let scope = UiScope::new().with_observer(Arc::new(SlowFactoryAlarm));
/// ```
pub trait ScopeObserver: Send + Sync {
    /// Storage for a context was created on first use.
    fn context_opened(&self, _kind: ScopeKind, _context: ContextId) {}

    /// A creation capability ran and its result was cached.
    fn instance_created(&self, _kind: ScopeKind, _context: ContextId, _key: &Key, _duration: Duration) {}

    /// A lookup was served from cache.
    fn instance_reused(&self, _kind: ScopeKind, _context: ContextId, _key: &Key) {}

    /// A creation capability failed. Nothing was cached.
    fn creation_failed(&self, _kind: ScopeKind, _context: ContextId, _key: &Key, _error: &crate::ScopeError) {}

    /// Storage for a context was discarded along with `instances` cached values.
    fn context_released(&self, _kind: ScopeKind, _context: ContextId, _reason: ReleaseReason, _instances: usize) {}
}

/// Container for registered observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ScopeObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn ScopeObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn context_opened(&self, kind: ScopeKind, context: ContextId) {
        for observer in &self.observers {
            observer.context_opened(kind, context);
        }
    }

    pub(crate) fn instance_created(&self, kind: ScopeKind, context: ContextId, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.instance_created(kind, context, key, duration);
        }
    }

    pub(crate) fn instance_reused(&self, kind: ScopeKind, context: ContextId, key: &Key) {
        for observer in &self.observers {
            observer.instance_reused(kind, context, key);
        }
    }

    pub(crate) fn creation_failed(&self, kind: ScopeKind, context: ContextId, key: &Key, error: &crate::ScopeError) {
        for observer in &self.observers {
            observer.creation_failed(kind, context, key, error);
        }
    }

    pub(crate) fn context_released(&self, kind: ScopeKind, context: ContextId, reason: ReleaseReason, instances: usize) {
        for observer in &self.observers {
            observer.context_released(kind, context, reason, instances);
        }
    }
}

/// Built-in observer that emits `tracing` events.
///
/// Cache hits are logged at `TRACE` only when enabled, since they are the
/// hot path.
///
/// ```
/// use ferrous_scopes::{SessionScope, TracingObserver};
/// use std::sync::Arc;
///
/// let scope = SessionScope::new()
///     .with_observer(Arc::new(TracingObserver::new().with_cache_hits(true)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    cache_hits: bool,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_hits(mut self, enabled: bool) -> Self {
        self.cache_hits = enabled;
        self
    }

    pub fn from_config(config: &crate::ScopeConfig) -> Self {
        Self { cache_hits: config.trace_cache_hits }
    }
}

impl ScopeObserver for TracingObserver {
    fn context_opened(&self, kind: ScopeKind, context: ContextId) {
        tracing::debug!(%kind, context = context.as_u64(), "scope storage opened");
    }

    fn instance_created(&self, kind: ScopeKind, context: ContextId, key: &Key, duration: Duration) {
        tracing::debug!(%kind, context = context.as_u64(), key = %key, ?duration, "scoped instance created");
    }

    fn instance_reused(&self, kind: ScopeKind, context: ContextId, key: &Key) {
        if self.cache_hits {
            tracing::trace!(%kind, context = context.as_u64(), key = %key, "scoped instance reused");
        }
    }

    fn creation_failed(&self, kind: ScopeKind, context: ContextId, key: &Key, error: &crate::ScopeError) {
        tracing::warn!(%kind, context = context.as_u64(), key = %key, %error, "scoped creation failed");
    }

    fn context_released(&self, kind: ScopeKind, context: ContextId, reason: ReleaseReason, instances: usize) {
        tracing::debug!(%kind, context = context.as_u64(), ?reason, instances, "scope storage released");
    }
}

/// Point-in-time counters from a [`CountingObserver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeStats {
    pub contexts_opened: u64,
    pub instances_created: u64,
    pub instances_reused: u64,
    pub creations_failed: u64,
    pub contexts_released: u64,
    pub contexts_reclaimed: u64,
}

impl ScopeStats {
    /// Fraction of lookups served from cache.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.instances_created + self.instances_reused;
        if total == 0 {
            0.0
        } else {
            self.instances_reused as f64 / total as f64
        }
    }
}

/// Observer that counts events with atomics.
///
/// ```
/// use ferrous_scopes::{CountingObserver, FixedEnvironment, ScopeResolver, SessionHandle, SessionScope};
/// use std::sync::Arc;
///
/// let counts = Arc::new(CountingObserver::new());
/// let session = SessionHandle::new();
/// let scope = SessionScope::new()
///     .with_environment(Arc::new(FixedEnvironment::session(&session)))
///     .with_observer(counts.clone());
///
/// scope.get_or_create(|| 1u8).unwrap();
/// scope.get_or_create(|| 2u8).unwrap();
///
/// let stats = counts.snapshot();
/// assert_eq!(stats.instances_created, 1);
/// assert_eq!(stats.instances_reused, 1);
/// ```
#[derive(Debug, Default)]
pub struct CountingObserver {
    contexts_opened: AtomicU64,
    instances_created: AtomicU64,
    instances_reused: AtomicU64,
    creations_failed: AtomicU64,
    contexts_released: AtomicU64,
    contexts_reclaimed: AtomicU64,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ScopeStats {
        ScopeStats {
            contexts_opened: self.contexts_opened.load(Ordering::Relaxed),
            instances_created: self.instances_created.load(Ordering::Relaxed),
            instances_reused: self.instances_reused.load(Ordering::Relaxed),
            creations_failed: self.creations_failed.load(Ordering::Relaxed),
            contexts_released: self.contexts_released.load(Ordering::Relaxed),
            contexts_reclaimed: self.contexts_reclaimed.load(Ordering::Relaxed),
        }
    }
}

impl ScopeObserver for CountingObserver {
    fn context_opened(&self, _kind: ScopeKind, _context: ContextId) {
        self.contexts_opened.fetch_add(1, Ordering::Relaxed);
    }

    fn instance_created(&self, _kind: ScopeKind, _context: ContextId, _key: &Key, _duration: Duration) {
        self.instances_created.fetch_add(1, Ordering::Relaxed);
    }

    fn instance_reused(&self, _kind: ScopeKind, _context: ContextId, _key: &Key) {
        self.instances_reused.fetch_add(1, Ordering::Relaxed);
    }

    fn creation_failed(&self, _kind: ScopeKind, _context: ContextId, _key: &Key, _error: &crate::ScopeError) {
        self.creations_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn context_released(&self, _kind: ScopeKind, _context: ContextId, reason: ReleaseReason, _instances: usize) {
        match reason {
            ReleaseReason::Reclaimed => self.contexts_reclaimed.fetch_add(1, Ordering::Relaxed),
            _ => self.contexts_released.fetch_add(1, Ordering::Relaxed),
        };
    }
}
