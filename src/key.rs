//! Service key types for the container.

use std::any::TypeId;
use std::fmt;

/// Identity of a contract in the registry.
///
/// Concrete types are keyed by their `TypeId`; the type name rides along for
/// diagnostics only. Trait contracts (`dyn Trait`) have no usable `TypeId`
/// for the unsized target, so they are keyed by their type name.
///
/// # Examples
///
/// ```rust
/// use heist_bootstrap::{key_of_trait, key_of_type, Key};
///
/// trait Audio: Send + Sync {}
///
/// let a = key_of_type::<u32>();
/// let b = key_of_type::<u32>();
/// assert_eq!(a, b);
/// assert_eq!(a.display_name(), "u32");
///
/// let t = key_of_trait::<dyn Audio>();
/// assert!(matches!(t, Key::Trait(_)));
/// assert_ne!(t, a);
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Trait contract key
    Trait(&'static str),
}

impl Key {
    /// Human-readable type or trait name, as produced by `std::any::type_name`.
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Trait(name) => name,
        }
    }

    /// Returns true for `dyn Trait` contracts.
    pub fn is_trait(&self) -> bool {
        matches!(self, Key::Trait(_))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// TypeId-only comparison for concrete types; the name is diagnostic
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Trait(a), Key::Trait(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::Trait(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

/// Key for a concrete service type.
#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Key for a trait contract such as `dyn Audio`.
#[inline(always)]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(std::any::type_name::<T>())
}
