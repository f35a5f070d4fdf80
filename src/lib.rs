//! # triemap
//!
//! A persistent (immutable) hash-trie map with structural sharing.
//!
//! ## Overview
//!
//! [`HashTrieMap`] is an immutable key-value container: every update
//! returns a *new* map that shares as much internal structure as possible
//! with the original. Old versions are never observably mutated, which
//! makes concurrent reads from any number of threads safe without
//! synchronization, and lets writers coordinate through an external
//! compare-and-swap loop on a shared reference instead of locking the
//! container.
//!
//! - O(log16 N) `get`, `insert`, `remove` (effectively O(1): depth ≤ 8)
//! - O(1) `len` and `is_empty`
//! - Bulk merges via [`HashTrieMap::insert_all`] that touch only the
//!   destination subtrees
//! - No-op updates return the receiver itself (observable through
//!   [`HashTrieMap::ptr_eq`]), never an equal copy
//!
//! ## Example
//!
//! ```rust
//! use triemap::HashTrieMap;
//!
//! let map = HashTrieMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```
//!
//! ## Feature Flags
//!
//! - `arc` (default): share nodes via `Arc`, making maps `Send + Sync`.
//!   Disable for single-threaded use with `Rc`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod trie;

pub use trie::HashTrieMap;
pub use trie::HashTrieMapIntoIterator;
pub use trie::HashTrieMapIterator;
