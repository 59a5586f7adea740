//! Core traits shared by the session and UI scopes.

mod resolver;

pub use resolver::{creator, try_creator, ContextScope, Creator, ScopeResolver};
