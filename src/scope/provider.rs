//! Provider wrapper binding a factory to a scope.

use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, ScopeResult};
use crate::key::{key_of_type, named_key_of_type, Key};
use crate::traits::{ContextScope, ScopeResolver};

type Factory<T> = Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// A factory decorated with a scope.
///
/// Every call to [`get`](Self::get) returns the instance cached for the
/// current context, running the factory only when that context has none.
/// Cloning a `Scoped` shares the scope and the factory.
///
/// # Examples
///
/// ```
/// use ferrous_scopes::{CurrentContext, Scoped, SessionHandle, UiHandle, UiScope};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Form { serial: usize }
///
/// let counter = Arc::new(AtomicUsize::new(0));
/// let scope = Arc::new(UiScope::new());
/// let forms = {
///     let counter = counter.clone();
///     Scoped::new(scope, move || Form { serial: counter.fetch_add(1, Ordering::SeqCst) })
/// };
///
/// let session = SessionHandle::new();
/// let (left, right) = (UiHandle::new(&session), UiHandle::new(&session));
///
/// let a = { let _ui = CurrentContext::enter(&session, &left); forms.get().unwrap() };
/// let b = { let _ui = CurrentContext::enter(&session, &right); forms.get().unwrap() };
/// let c = { let _ui = CurrentContext::enter(&session, &left); forms.get().unwrap() };
///
/// assert_eq!((a.serial, b.serial, c.serial), (0, 1, 0));
/// assert_eq!(counter.load(Ordering::SeqCst), 2);
/// ```
pub struct Scoped<T> {
    scope: Arc<dyn ContextScope>,
    key: Key,
    factory: Factory<T>,
}

impl<T: Send + Sync + 'static> Scoped<T> {
    pub fn new<F>(scope: Arc<dyn ContextScope>, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self { scope, key: key_of_type::<T>(), factory: Arc::new(move || Ok(factory())) }
    }

    /// Like [`new`](Self::new), cached under `qualifier` so several
    /// providers of one type can coexist in a context.
    pub fn named<F>(scope: Arc<dyn ContextScope>, qualifier: &'static str, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self { scope, key: named_key_of_type::<T>(qualifier), factory: Arc::new(move || Ok(factory())) }
    }

    /// Provider with a fallible factory. Failures are not cached.
    pub fn try_new<E, F>(scope: Arc<dyn ContextScope>, factory: F) -> Self
    where
        E: Into<BoxError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Self { scope, key: key_of_type::<T>(), factory: Arc::new(move || factory().map_err(Into::into)) }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Resolves the instance for the current context.
    pub fn get(&self) -> ScopeResult<Arc<T>> {
        self.scope.resolve_keyed(&self.key, || (self.factory)())
    }
}

impl<T> Clone for Scoped<T> {
    fn clone(&self) -> Self {
        Self { scope: self.scope.clone(), key: self.key.clone(), factory: self.factory.clone() }
    }
}

impl<T> fmt::Debug for Scoped<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("scope", &self.scope.kind())
            .field("key", &self.key)
            .finish()
    }
}
