//! # ferrous-scopes
//!
//! Session and UI scoped instance caching for multi-user, multi-window
//! server applications.
//!
//! ## Features
//!
//! - **Two scopes**: one instance per key per session, or per UI within a session
//! - **At-most-once creation**: racing lookups for one context share one instance
//! - **Independent contexts**: a slow factory in one UI never blocks another
//! - **Lifecycle driven**: session end or UI detach discards the context's instances
//! - **Leak backstop**: contexts whose handles are dropped are swept automatically
//! - **Scoped event buses**: publish/subscribe confined to one session or one UI
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_scopes::{CurrentContext, ScopeResolver, SessionHandle, UiHandle, UiScope};
//! use std::sync::Arc;
//!
//! struct ShoppingCart {
//!     items: Vec<String>,
//! }
//!
//! let scope = UiScope::new();
//! let session = SessionHandle::labeled("alice");
//! let browser_tab = UiHandle::new(&session);
//!
//! // The host binds the context around request handling
//! let _bound = CurrentContext::enter(&session, &browser_tab);
//!
//! let cart = scope.get_or_create(|| ShoppingCart { items: Vec::new() }).unwrap();
//! let same = scope.get_or_create(|| ShoppingCart { items: vec!["unused".into()] }).unwrap();
//! assert!(Arc::ptr_eq(&cart, &same));
//! ```
//!
//! ## Scopes
//!
//! - **[`SessionScope`]**: shared by every UI of a session, discarded when the session ends
//! - **[`UiScope`]**: private to one UI, discarded when the UI detaches or its session ends
//!
//! ## Lifecycle
//!
//! ```rust
//! use ferrous_scopes::{LifecycleBridge, ScopeResolver, SessionHandle, SessionScope, FixedEnvironment};
//! use std::sync::Arc;
//!
//! let session = SessionHandle::new();
//! let scope = Arc::new(
//!     SessionScope::new().with_environment(Arc::new(FixedEnvironment::session(&session))),
//! );
//!
//! let bridge = LifecycleBridge::new();
//! bridge.watch_sessions(scope.clone());
//!
//! let first = scope.get_or_create(|| String::from("draft")).unwrap();
//! bridge.fire_session_destroyed(&session);
//! let second = scope.get_or_create(|| String::from("fresh")).unwrap();
//!
//! assert_eq!(*first, "draft");
//! assert_eq!(*second, "fresh");
//! ```

// Module declarations
pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod key;
pub mod lifecycle;
pub mod lifetime;
pub mod observer;
pub mod scope;
pub mod traits;

// Internal modules
mod internal;
mod storage;

// Re-export core types
pub use bus::{EventBus, SessionEventBus, SubscriptionId, UiEventBus};
pub use config::ScopeConfig;
pub use context::{
    ContextGuard, ContextId, CurrentContext, FixedEnvironment, ScopeEnvironment, SessionHandle,
    ThreadLocalEnvironment, UiHandle,
};
pub use error::{BoxError, MissingContext, ScopeError, ScopeResult};
pub use key::{key_of_trait, key_of_type, named_key_of_trait, named_key_of_type, Key};
pub use lifecycle::{LifecycleBridge, SessionDestroyListener, UiDetachListener};
pub use lifetime::ScopeKind;
pub use observer::{CountingObserver, ReleaseReason, ScopeObserver, ScopeStats, TracingObserver};
pub use scope::{Scoped, SessionScope, UiScope};
pub use storage::AnyArc;
pub use traits::{creator, try_creator, ContextScope, Creator, ScopeResolver};
