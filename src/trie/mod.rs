//! Persistent hash-trie map.
//!
//! The trie partitions the 32-bit hash of each key into fixed-width
//! bit slices, one per depth. Internal nodes hold a fixed array of
//! child slots indexed by the slice for their depth; leaves hold the
//! entries whose full hash routed them there. Updates copy only the
//! root-to-leaf path they touch and share every sibling subtree with
//! the previous version.
//!
//! # Structural Sharing
//!
//! Every update returns either a new map sharing unchanged subtrees
//! with the receiver, or the receiver itself when the update changed
//! nothing (same key bound to an equal value, removal of an absent
//! key). "Nothing changed" propagates by pointer identity from the
//! leaf upward, so a no-op allocates nothing at all.
//!
//! # Examples
//!
//! ```rust
//! use triemap::HashTrieMap;
//!
//! let map = HashTrieMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//! assert_eq!(map.get("one"), Some(&1));
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled (default), this is `std::sync::Arc`,
/// which makes maps `Send + Sync` for cross-thread sharing.
///
/// When the `arc` feature is disabled, this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod entry;
mod leaf;
mod level;
mod map;
mod node;

pub use map::HashTrieMap;
pub use map::HashTrieMapIntoIterator;
pub use map::HashTrieMapIterator;

// =============================================================================
// Tests
// =============================================================================
