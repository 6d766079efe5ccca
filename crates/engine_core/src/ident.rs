//! Hashed string identifiers.
//!
//! [`HashString`] pairs a `&'static str` with its FNV-1a hash so that
//! comparisons and map lookups never touch the string bytes. The hash
//! function is a `const fn`, so identifiers can be built at compile
//! time and used in `const` positions.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 32-bit FNV-1a over the bytes of `s`.
///
/// This is the single hash function behind [`HashString`] and
/// [`TypeId32`]; two names hash equal here iff the identifiers compare
/// equal everywhere else in the engine.
#[must_use]
pub const fn fnv1a_32(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut hash: u32 = 0x811c_9dc5;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(0x0100_0193);
        i += 1;
    }
    hash
}

/// A string identifier with a cached hash.
///
/// Equality, ordering and hashing are **hash-based**; the string is
/// retained only for display and debugging. Collisions between distinct
/// names are treated as identity, so names used as identifiers within
/// one engine must be unique.
///
/// # Examples
///
/// ```rust
/// use engine_core::HashString;
///
/// const SCENE: HashString = HashString::new("SceneManager");
/// assert_eq!(SCENE, HashString::new("SceneManager"));
/// assert_ne!(SCENE, HashString::new("RenderSystem"));
/// ```
#[derive(Clone, Copy)]
pub struct HashString {
    hash: u32,
    name: &'static str,
}

impl HashString {
    /// Create a hashed identifier from a static string.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            hash: fnv1a_32(name),
            name,
        }
    }

    /// Returns the cached hash value.
    #[must_use]
    pub const fn hash(self) -> u32 {
        self.hash
    }

    /// Returns the original string.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for HashString {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for HashString {}

impl PartialOrd for HashString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HashString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl Hash for HashString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Debug for HashString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashString({:#010x}, {:?})", self.hash, self.name)
    }
}

impl fmt::Display for HashString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A stable type identifier derived from a type's registered name.
///
/// Component events are keyed by `TypeId32`, and reflection entries are
/// resolved through it, so a type observed through either system keeps
/// the same id for the life of the process (and across builds, since
/// the id depends only on the name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId32(pub u32);

impl TypeId32 {
    /// Compute the id for a type name.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        Self(fnv1a_32(name))
    }
}

impl fmt::Display for TypeId32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_const_and_stable() {
        const A: HashString = HashString::new("LogSystem");
        assert_eq!(A.hash(), fnv1a_32("LogSystem"));
        assert_eq!(A, HashString::new("LogSystem"));
    }

    #[test]
    fn test_distinct_names_distinct_hashes() {
        assert_ne!(HashString::new("Transform"), HashString::new("Velocity"));
    }

    #[test]
    fn test_ordering_is_hash_based() {
        let a = HashString::new("a");
        let b = HashString::new("b");
        assert_eq!(a.cmp(&b), a.hash().cmp(&b.hash()));
    }

    #[test]
    fn test_type_id_matches_name_hash() {
        assert_eq!(TypeId32::from_name("Hierarchy").0, fnv1a_32("Hierarchy"));
    }

    #[test]
    fn test_display_shows_name() {
        assert_eq!(HashString::new("SceneManager").to_string(), "SceneManager");
    }
}
