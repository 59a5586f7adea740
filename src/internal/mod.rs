//! Internal implementation details.

pub(crate) mod directory;
pub(crate) mod resolution;

pub(crate) use directory::WeakDirectory;
pub(crate) use resolution::{check_not_widening, check_same_context, CreationFrame};
