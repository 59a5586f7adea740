//! Dependency key types for scoped lookups.

use std::any::TypeId;

/// Key identifying what is being requested from a scope.
///
/// A key is a type plus an optional qualifier. Two lookups with equal keys
/// in the same context observe the same cached instance.
///
/// # Key Types
///
/// - **Type**: Concrete types (structs, enums, primitives)
/// - **Trait**: Trait objects, stored as `Arc<dyn Trait>`
/// - **Named variants**: Both of the above with an additional qualifier
///
/// # Examples
///
/// ```rust
/// use ferrous_scopes::{Key, key_of_type, named_key_of_type, key_of_trait};
///
/// trait Greeter: Send + Sync {}
///
/// let plain = key_of_type::<String>();
/// let named = named_key_of_type::<String>("greeting");
/// let greeter = key_of_trait::<dyn Greeter>();
///
/// assert_ne!(plain, named);
/// assert_eq!(plain, key_of_type::<String>());
/// assert_eq!(named.qualifier(), Some("greeting"));
/// assert!(greeter.display_name().contains("Greeter"));
/// ```
#[derive(Debug, Clone)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    ///
    /// The TypeId drives equality and hashing; the name is only used in
    /// error messages and log output.
    Type(TypeId, &'static str),
    /// Qualified concrete type key with TypeId, typename, and qualifier
    TypeNamed(TypeId, &'static str, &'static str),
    /// Trait object key
    ///
    /// Only stores the trait name since unsized trait objects are keyed
    /// by their `type_name`.
    Trait(&'static str),
    /// Qualified trait object key with trait name and qualifier
    TraitNamed(&'static str, &'static str),
}

impl Key {
    /// Get the type or trait name for display
    ///
    /// ```rust
    /// use ferrous_scopes::Key;
    /// use std::any::TypeId;
    ///
    /// let key = Key::TypeNamed(TypeId::of::<u32>(), "u32", "port");
    /// assert_eq!(key.display_name(), "u32");
    /// ```
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::TypeNamed(_, name, _) => name,
            Key::Trait(name) => name,
            Key::TraitNamed(name, _) => name,
        }
    }

    /// Get the qualifier for named keys, or None for unqualified ones
    pub fn qualifier(&self) -> Option<&'static str> {
        match self {
            Key::Type(_, _) | Key::Trait(_) => None,
            Key::TypeNamed(_, _, name) => Some(name),
            Key::TraitNamed(_, name) => Some(name),
        }
    }
}

// TypeId-only comparison for concrete types; the name is diagnostic
impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::TypeNamed(a, _, name_a), Key::TypeNamed(b, _, name_b)) => a == b && name_a == name_b,
            (Key::Trait(a), Key::Trait(b)) => a == b,
            (Key::TraitNamed(a, name_a), Key::TraitNamed(b, name_b)) => a == b && name_a == name_b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::TypeNamed(id, _, name) => {
                1u8.hash(state);
                id.hash(state);
                name.hash(state);
            }
            Key::Trait(name) => {
                2u8.hash(state);
                name.hash(state);
            }
            Key::TraitNamed(name, qualifier) => {
                3u8.hash(state);
                name.hash(state);
                qualifier.hash(state);
            }
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.qualifier() {
            Some(qualifier) => write!(f, "{}@{}", self.display_name(), qualifier),
            None => f.write_str(self.display_name()),
        }
    }
}

#[inline]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

#[inline]
pub fn named_key_of_type<T: 'static>(qualifier: &'static str) -> Key {
    Key::TypeNamed(TypeId::of::<T>(), std::any::type_name::<T>(), qualifier)
}

#[inline]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(std::any::type_name::<T>())
}

#[inline]
pub fn named_key_of_trait<T: ?Sized + 'static>(qualifier: &'static str) -> Key {
    Key::TraitNamed(std::any::type_name::<T>(), qualifier)
}
