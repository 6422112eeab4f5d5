//! Service key types for the dependency injection container.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Key for service storage and lookup.
///
/// A key identifies a service by the `TypeId` of the type it is resolved as.
/// That type may be a concrete struct, a closed generic such as `Wrapper<i32>`,
/// or an unsized trait object such as `dyn Logger`; all three resolve through
/// the same path. The type name is carried along for diagnostics only.
///
/// # Examples
///
/// ```rust
/// use arbor_di::{Key, key_of_type};
///
/// trait Logger: Send + Sync {}
///
/// let string_key = key_of_type::<String>();
/// assert_eq!(string_key.display_name(), "alloc::string::String");
///
/// let trait_key = Key::of::<dyn Logger>();
/// assert!(trait_key.display_name().contains("Logger"));
/// assert_ne!(string_key, trait_key);
/// ```
#[derive(Clone, Copy)]
pub struct Key {
    id: TypeId,
    name: &'static str,
}

impl Key {
    /// Key for the service type `T`.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Key {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` this key compares by.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Get the type name for display
    ///
    /// Returns the `std::any::type_name` of the service type, used in error
    /// messages and cycle paths.
    pub fn display_name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// TypeId-only comparison; the name is for humans.
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    #[inline(always)]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for Key {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Helper for creating type keys.
#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> Key {
    Key::of::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Marker {}

    #[test]
    fn keys_compare_by_type_only() {
        let a = Key::of::<u32>();
        let b = Key { id: TypeId::of::<u32>(), name: "renamed" };
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn closed_generics_get_distinct_keys() {
        assert_ne!(Key::of::<Vec<i32>>(), Key::of::<Vec<String>>());
        assert_ne!(Key::of::<dyn Marker>(), Key::of::<Box<dyn Marker>>());
    }
}
