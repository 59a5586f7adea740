//! Resolver traits for scoped lookups.

use std::convert::Infallible;
use std::sync::Arc;

use crate::error::{BoxError, ScopeError, ScopeResult};
use crate::key::{key_of_trait, key_of_type, named_key_of_trait, named_key_of_type, Key};
use crate::lifetime::ScopeKind;
use crate::storage::AnyArc;

/// Type-erased creation capability handed to a scope.
///
/// Invoked at most once per (context, key); its error is reported as
/// [`ScopeError::Creation`] with the factory's error as the source.
pub type Creator<'a> = Box<dyn FnOnce() -> Result<AnyArc, BoxError> + 'a>;

/// Wraps an infallible factory as a [`Creator`].
pub fn creator<'a, T, F>(create: F) -> Creator<'a>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> T + 'a,
{
    Box::new(move || Ok(Arc::new(create()) as AnyArc))
}

/// Wraps a fallible factory as a [`Creator`].
pub fn try_creator<'a, T, E, F>(create: F) -> Creator<'a>
where
    T: Send + Sync + 'static,
    E: Into<BoxError>,
    F: FnOnce() -> Result<T, E> + 'a,
{
    Box::new(move || create().map(|value| Arc::new(value) as AnyArc).map_err(Into::into))
}

/// Core scope trait for object-safe lookups.
///
/// Implementations ask their environment for the current context, locate
/// or create that context's storage, and perform a get-or-create for `key`.
///
/// Most callers should use [`ScopeResolver`] instead, which adds typed
/// helpers on top of this trait.
pub trait ContextScope: Send + Sync {
    /// Which context instances resolved through this scope belong to.
    fn kind(&self) -> ScopeKind;

    /// Returns the instance cached for `key` in the current context,
    /// invoking `create` only if there is none.
    ///
    /// # Returns
    ///
    /// * `Ok(AnyArc)` - The cached or freshly created instance
    /// * `Err(ScopeError)` - Missing context, failed creation, or re-entrant creation
    fn resolve_any(&self, key: &Key, create: Creator<'_>) -> ScopeResult<AnyArc>;
}

/// Typed lookups over any [`ContextScope`].
///
/// Implemented for every scope, including `dyn ContextScope`.
///
/// # Examples
///
/// ```
/// use ferrous_scopes::{CurrentContext, ScopeResolver, SessionHandle, UiHandle, UiScope};
/// use std::sync::Arc;
///
/// struct Cart { items: Vec<String> }
///
/// let scope = UiScope::new();
/// let session = SessionHandle::new();
/// let ui = UiHandle::new(&session);
/// let _bound = CurrentContext::enter(&session, &ui);
///
/// let cart = scope.get_or_create(|| Cart { items: Vec::new() }).unwrap();
/// let again = scope.get_or_create(|| Cart { items: vec!["never".into()] }).unwrap();
/// assert!(Arc::ptr_eq(&cart, &again));
/// assert!(again.items.is_empty());
/// ```
pub trait ScopeResolver: ContextScope {
    /// Resolves `key`, creating a `T` with the fallible `create` if needed.
    ///
    /// Fails with [`ScopeError::TypeMismatch`] if the instance cached under
    /// `key` is not a `T`.
    fn resolve_keyed<T, E, F>(&self, key: &Key, create: F) -> ScopeResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> Result<T, E>,
    {
        let any = self.resolve_any(key, try_creator(create))?;
        any.downcast::<T>()
            .map_err(|_| ScopeError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves the context's `T`, creating it with `create` on first use.
    fn get_or_create<T, F>(&self, create: F) -> ScopeResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.resolve_keyed(&key_of_type::<T>(), move || Ok::<T, Infallible>(create()))
    }

    /// Like [`get_or_create`](Self::get_or_create) under a qualifier, so one
    /// context can hold several `T`s.
    fn get_named_or_create<T, F>(&self, qualifier: &'static str, create: F) -> ScopeResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.resolve_keyed(&named_key_of_type::<T>(qualifier), move || Ok::<T, Infallible>(create()))
    }

    /// Resolves the context's `T` with a fallible factory.
    ///
    /// A failure is not cached; the next lookup calls a factory again.
    ///
    /// ```
    /// use ferrous_scopes::{FixedEnvironment, ScopeError, ScopeResolver, SessionHandle, SessionScope};
    /// use std::sync::Arc;
    ///
    /// let session = SessionHandle::new();
    /// let scope = SessionScope::new().with_environment(Arc::new(FixedEnvironment::session(&session)));
    ///
    /// let failed = scope.try_get_or_create::<u32, _, _>(|| Err("database down"));
    /// assert!(matches!(failed, Err(ScopeError::Creation { .. })));
    ///
    /// let value = scope.try_get_or_create::<u32, String, _>(|| Ok(7)).unwrap();
    /// assert_eq!(*value, 7);
    /// ```
    fn try_get_or_create<T, E, F>(&self, create: F) -> ScopeResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> Result<T, E>,
    {
        self.resolve_keyed(&key_of_type::<T>(), create)
    }

    fn try_get_named_or_create<T, E, F>(&self, qualifier: &'static str, create: F) -> ScopeResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> Result<T, E>,
    {
        self.resolve_keyed(&named_key_of_type::<T>(qualifier), create)
    }

    /// Resolves a trait object, creating it with `create` on first use.
    ///
    /// Stored as `Arc<Arc<dyn Trait>>` under the trait's key.
    ///
    /// ```
    /// use ferrous_scopes::{FixedEnvironment, ScopeResolver, SessionHandle, SessionScope};
    /// use std::sync::Arc;
    ///
    /// trait Greeter: Send + Sync {
    ///     fn greet(&self) -> String;
    /// }
    ///
    /// struct English;
    /// impl Greeter for English {
    ///     fn greet(&self) -> String { "hello".into() }
    /// }
    ///
    /// let session = SessionHandle::new();
    /// let scope = SessionScope::new().with_environment(Arc::new(FixedEnvironment::session(&session)));
    /// let greeter = scope.get_or_create_trait::<dyn Greeter, _>(|| Arc::new(English)).unwrap();
    /// assert_eq!(greeter.greet(), "hello");
    /// ```
    fn get_or_create_trait<T, F>(&self, create: F) -> ScopeResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> Arc<T>,
    {
        self.resolve_keyed(&key_of_trait::<T>(), move || Ok::<Arc<T>, Infallible>(create()))
            .map(|outer| (*outer).clone())
    }

    fn get_named_or_create_trait<T, F>(&self, qualifier: &'static str, create: F) -> ScopeResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> Arc<T>,
    {
        self.resolve_keyed(&named_key_of_trait::<T>(qualifier), move || Ok::<Arc<T>, Infallible>(create()))
            .map(|outer| (*outer).clone())
    }
}

impl<S: ContextScope + ?Sized> ScopeResolver for S {}
