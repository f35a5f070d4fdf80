//! Immutable key-value entries with precomputed trie hashes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// An immutable key-value pair carrying its precomputed trie hash.
///
/// Entries are shared between map versions through reference-counted
/// handles and are never mutated after construction.
#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(key: K, value: V) -> Self
    where
        K: Hash,
    {
        Self {
            hash: hash_of(&key),
            key,
            value,
        }
    }
}

/// Computes the 32-bit trie hash of a key.
///
/// The key's standard hash is truncated to 32 bits and then spread with
/// `h ^ (h >> 16)` so that the high bits also influence the shallow
/// levels, which only consult a few bits each.
pub(crate) fn hash_of<K: Hash + ?Sized>(key: &K) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    #[allow(clippy::cast_possible_truncation)]
    let h = hasher.finish() as u32;
    h ^ (h >> 16)
}

// =============================================================================
// Tests
// =============================================================================
