//! The public persistent map built on the hash trie.

use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use arrayvec::ArrayVec;

use super::ReferenceCounter;
use super::entry::{Entry, hash_of};
use super::leaf::{EntryHandle, LeafData};
use super::level::{BRANCHING_FACTOR, LEVEL_COUNT, Level};
use super::node::{Node, NodeHandle};

/// A persistent (immutable) hash map backed by a hash trie.
///
/// Every update returns a new map sharing unchanged subtrees with the
/// receiver; old versions stay valid and are never observably mutated.
/// An update that changes nothing (inserting a value equal to the one
/// already bound, removing an absent key) returns the receiver itself
/// rather than an equal copy, which [`HashTrieMap::ptr_eq`] makes
/// observable. That property is what lets writers drive external
/// compare-and-swap retry loops without re-reading the tree.
///
/// With the `arc` feature (default) maps are `Send + Sync` and any
/// number of threads may read the same version, or derive new versions
/// from it, without synchronization.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log16 N)        |
/// | `insert`       | O(log16 N)        |
/// | `remove`       | O(log16 N)        |
/// | `len`          | O(1)              |
/// | `clone`        | O(1)              |
///
/// Trie depth is bounded by the hash width (8 levels), independent of
/// the number of entries or the update history.
///
/// # Examples
///
/// ```rust
/// use triemap::HashTrieMap;
///
/// let map = HashTrieMap::new()
///     .insert("one".to_string(), 1)
///     .insert("two".to_string(), 2);
///
/// // Structural sharing: the original map is preserved
/// let updated = map.insert("one".to_string(), 100);
/// assert_eq!(map.get("one"), Some(&1));       // Original unchanged
/// assert_eq!(updated.get("one"), Some(&100)); // New version
/// ```
pub struct HashTrieMap<K, V> {
    /// Root of the trie; `None` means the map is empty.
    root: Option<NodeHandle<K, V>>,
}

impl<K, V> Clone for HashTrieMap<K, V> {
    /// O(1): shares the root with the receiver.
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<K, V> HashTrieMap<K, V> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triemap::HashTrieMap;
    ///
    /// let map: HashTrieMap<String, i32> = HashTrieMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None }
    }

    /// Returns the number of entries in the map.
    ///
    /// O(1): every node caches the size of its subtree.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.size())
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns `true` if `self` and `other` are the same version:
    /// not merely equal, but sharing the identical root.
    ///
    /// No-op updates return the receiver's version, so this is the
    /// comparison an external compare-and-swap loop works with.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triemap::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().insert("a".to_string(), 1);
    /// let unchanged = map.insert("a".to_string(), 1);
    /// let changed = map.insert("a".to_string(), 2);
    ///
    /// assert!(map.ptr_eq(&unchanged));
    /// assert!(!map.ptr_eq(&changed));
    /// ```
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(left), Some(right)) => ReferenceCounter::ptr_eq(left, right),
            _ => false,
        }
    }

    /// Returns a fresh empty map; the receiver is untouched.
    #[must_use]
    pub const fn clear(&self) -> Self {
        Self::new()
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but
    /// `Hash` and `Eq` on the borrowed form must match those for the
    /// key type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triemap::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().insert("hello".to_string(), 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let root = self.root.as_deref()?;
        Node::get(root, hash_of(key), key).map(|entry| &entry.value)
    }

    /// Returns `true` if the map contains a value for the specified key.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Removes a key from the map.
    ///
    /// Returns a new map without the key; if the key was absent, the
    /// receiver's own version is returned (see [`HashTrieMap::ptr_eq`]).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triemap::HashTrieMap;
    ///
    /// let map = HashTrieMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let removed = map.remove("a");
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get("a"), None);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(root) = &self.root else {
            return self.clone();
        };
        let (root, _removed) = Node::remove(root, Level::ROOT, hash_of(key), key, |_| true);
        Self { root }
    }

    /// Removes a key, reporting the removed value (or `None`) to the
    /// observer exactly once, even when the map is returned unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triemap::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().insert("a".to_string(), 1);
    ///
    /// let mut removed = None;
    /// let emptied = map.remove_with("a", |value| removed = value.copied());
    /// assert_eq!(removed, Some(1));
    /// assert!(emptied.is_empty());
    /// ```
    #[must_use]
    pub fn remove_with<Q, F>(&self, key: &Q, observer: F) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(Option<&V>),
    {
        let Some(root) = &self.root else {
            observer(None);
            return self.clone();
        };
        let (root, removed) = Node::remove(root, Level::ROOT, hash_of(key), key, |_| true);
        observer(removed.map(|entry| &entry.value));
        Self { root }
    }

    /// Returns an iterator over key-value pairs.
    ///
    /// Entries are visited by an in-order walk of the trie: branch
    /// slots by increasing index, collision entries in their stored
    /// order. The order is deterministic for a given tree shape but
    /// unrelated to insertion order.
    #[must_use]
    pub fn iter(&self) -> HashTrieMapIterator<'_, K, V> {
        HashTrieMapIterator::new(self.root.as_deref(), self.len())
    }

    /// Returns a read-only view over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns a read-only view over the values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }
}

impl<K: Hash + Eq, V: PartialEq> HashTrieMap<K, V> {
    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triemap::HashTrieMap;
    ///
    /// let map = HashTrieMap::singleton("key".to_string(), 42);
    /// assert_eq!(map.get("key"), Some(&42));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the key is already bound to an equal value nothing changes
    /// and the receiver's own version is returned; otherwise a new map
    /// is returned and the original is preserved.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triemap::HashTrieMap;
    ///
    /// let map1 = HashTrieMap::new().insert("key".to_string(), 1);
    /// let map2 = map1.insert("key".to_string(), 2);
    ///
    /// assert_eq!(map1.get("key"), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get("key"), Some(&2)); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        self.insert_with(key, value, |_| ())
    }

    /// Inserts a key-value pair, reporting the previously bound value
    /// (or `None`) to the observer exactly once, even when the map is
    /// returned unchanged. The prior value is observed in the same
    /// walk that computes the new structure, so compare-and-swap style
    /// callers need no separate read.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triemap::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().insert("count".to_string(), 1);
    ///
    /// let mut previous = None;
    /// let updated = map.insert_with("count".to_string(), 2, |value| {
    ///     previous = value.copied();
    /// });
    /// assert_eq!(previous, Some(1));
    /// assert_eq!(updated.get("count"), Some(&2));
    /// ```
    #[must_use]
    pub fn insert_with<F>(&self, key: K, value: V, observer: F) -> Self
    where
        F: FnOnce(Option<&V>),
    {
        let entry = ReferenceCounter::new(Entry::new(key, value));
        let Some(root) = &self.root else {
            observer(None);
            return Self {
                root: Some(ReferenceCounter::new(Node::Leaf(LeafData::Single(entry)))),
            };
        };
        let (root, previous) = Node::put(root, Level::ROOT, entry);
        observer(previous.map(|entry| &entry.value));
        Self { root: Some(root) }
    }

    /// Inserts every pair of `iterable` in one bulk merge.
    ///
    /// Entries are sorted into traversal order first, so the merge
    /// descends once into each destination subtree instead of walking
    /// the trie per pair; subtrees that receive nothing stay shared.
    /// Later pairs win on duplicate keys, and an empty input returns
    /// the receiver's own version.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triemap::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().insert("a".to_string(), 1);
    /// let merged = map.insert_all(vec![
    ///     ("b".to_string(), 2),
    ///     ("c".to_string(), 3),
    /// ]);
    ///
    /// assert_eq!(merged.len(), 3);
    /// assert_eq!(map.len(), 1); // Original unchanged
    /// ```
    #[must_use]
    pub fn insert_all<I>(&self, iterable: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut entries: Vec<EntryHandle<K, V>> = iterable
            .into_iter()
            .map(|(key, value)| ReferenceCounter::new(Entry::new(key, value)))
            .collect();
        if entries.is_empty() {
            return self.clone();
        }
        // Traversal order is ascending hash order (the level schedule
        // consumes the most significant slice first), and the stable
        // sort keeps equal-hash entries in input order so that later
        // duplicates win when leaf folding dedupes them.
        entries.sort_by_key(|entry| entry.hash);
        Self {
            root: Node::put_all(self.root.as_ref(), Level::ROOT, &entries),
        }
    }

    /// Returns `true` if any key is bound to a value equal to `value`.
    ///
    /// O(n): there is no value index, so this scans the entry iterator.
    #[must_use]
    pub fn contains_value(&self, value: &V) -> bool {
        self.values().any(|candidate| candidate == value)
    }

    /// Removes `key` only if it is currently bound to a value equal to
    /// `expected`; otherwise returns the receiver's own version.
    ///
    /// The precondition is checked against the stored entry in the
    /// same walk that computes the new structure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triemap::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().insert("a".to_string(), 1);
    ///
    /// let kept = map.remove_if("a", &2);
    /// assert!(map.ptr_eq(&kept)); // Precondition failed: no-op
    ///
    /// let removed = map.remove_if("a", &1);
    /// assert!(!removed.contains_key("a"));
    /// ```
    #[must_use]
    pub fn remove_if<Q>(&self, key: &Q, expected: &V) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_if_with(key, expected, |_| ())
    }

    /// As [`HashTrieMap::remove_if`], additionally reporting whether
    /// the conditional removal actually occurred.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use triemap::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().insert("a".to_string(), 1);
    ///
    /// let mut outcome = false;
    /// let removed = map.remove_if_with("a", &1, |occurred| outcome = occurred);
    /// assert!(outcome);
    /// assert!(removed.is_empty());
    /// ```
    #[must_use]
    pub fn remove_if_with<Q, F>(&self, key: &Q, expected: &V, observer: F) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(bool),
    {
        let Some(root) = &self.root else {
            observer(false);
            return self.clone();
        };
        let (root, removed) = Node::remove(root, Level::ROOT, hash_of(key), key, |entry| {
            entry.value == *expected
        });
        observer(removed.is_some());
        Self { root }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`HashTrieMap`].
///
/// Performs an in-order walk of the trie. The traversal stack never
/// heap-allocates: its capacity is the statically bounded trie depth.
pub struct HashTrieMapIterator<'a, K, V> {
    stack: ArrayVec<(&'a [Option<NodeHandle<K, V>>; BRANCHING_FACTOR], usize), LEVEL_COUNT>,
    collision: Option<(&'a [EntryHandle<K, V>], usize)>,
    remaining: usize,
}

impl<'a, K, V> HashTrieMapIterator<'a, K, V> {
    fn new(root: Option<&'a Node<K, V>>, remaining: usize) -> Self {
        let mut iterator = Self {
            stack: ArrayVec::new(),
            collision: None,
            remaining,
        };
        match root {
            None => {}
            Some(Node::Branch { children, .. }) => iterator.stack.push((children, 0)),
            Some(Node::Leaf(LeafData::Single(entry))) => {
                iterator.collision = Some((std::slice::from_ref(entry), 0));
            }
            Some(Node::Leaf(LeafData::Multi { entries, .. })) => {
                iterator.collision = Some((entries.as_slice(), 0));
            }
        }
        iterator
    }

    fn yield_entry(&mut self, entry: &'a Entry<K, V>) -> (&'a K, &'a V) {
        self.remaining -= 1;
        (&entry.key, &entry.value)
    }
}

impl<'a, K, V> Iterator for HashTrieMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((entries, index)) = self.collision {
            if index < entries.len() {
                self.collision = Some((entries, index + 1));
                return Some(self.yield_entry(&entries[index]));
            }
            self.collision = None;
        }
        loop {
            let (children, index) = *self.stack.last()?;
            if index >= children.len() {
                self.stack.pop();
                continue;
            }
            if let Some(frame) = self.stack.last_mut() {
                frame.1 = index + 1;
            }
            let Some(child) = &children[index] else {
                continue;
            };
            match &**child {
                Node::Branch { children, .. } => self.stack.push((children, 0)),
                Node::Leaf(LeafData::Single(entry)) => return Some(self.yield_entry(entry)),
                Node::Leaf(LeafData::Multi { entries, .. }) => {
                    self.collision = Some((entries.as_slice(), 1));
                    return Some(self.yield_entry(&entries[0]));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for HashTrieMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

/// An owning iterator over key-value pairs of a [`HashTrieMap`].
pub struct HashTrieMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for HashTrieMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for HashTrieMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Default for HashTrieMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V: PartialEq> FromIterator<(K, V)> for HashTrieMap<K, V> {
    /// Builds through the bulk merge, not one insert per pair.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new().insert_all(iter)
    }
}

impl<K: Clone, V: Clone> IntoIterator for HashTrieMap<K, V> {
    type Item = (K, V);
    type IntoIter = HashTrieMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        HashTrieMapIntoIterator {
            entries: entries.into_iter(),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a HashTrieMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = HashTrieMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for HashTrieMap<K, V> {
    /// Structural map equality: same size, same key-value bindings.
    /// Independent of tree shape and of how versions share structure.
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter()
            .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Hash + Eq, V: Eq> Eq for HashTrieMap<K, V> {}

impl<K: Hash, V: Hash> Hash for HashTrieMap<K, V> {
    /// Order-independent, consistent with structural equality: equal
    /// maps hash equally no matter how they were built.
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut combined: u64 = 0;
        for (key, value) in self.iter() {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            value.hash(&mut hasher);
            combined = combined.wrapping_add(hasher.finish());
        }
        state.write_usize(self.len());
        state.write_u64(combined);
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for HashTrieMap<K, V> {
    /// Renders entries in traversal order, so two references to
    /// structurally unchanged maps produce identical output. That is
    /// the snapshot the test suite uses to assert no hidden mutation.
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_new_creates_empty() {
        let map: HashTrieMap<String, i32> = HashTrieMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert_eq!(map.get("missing"), None);
    }

    #[rstest]
    fn test_insert_and_get() {
        let map = HashTrieMap::new()
            .insert("one".to_string(), 1)
            .insert("two".to_string(), 2);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("one"), Some(&1));
        assert_eq!(map.get("two"), Some(&2));
        assert_eq!(map.get("three"), None);
    }

    #[rstest]
    fn test_insert_preserves_original() {
        let map1 = HashTrieMap::new().insert("key".to_string(), 1);
        let map2 = map1.insert("key".to_string(), 2);

        assert_eq!(map1.get("key"), Some(&1));
        assert_eq!(map2.get("key"), Some(&2));
    }

    #[rstest]
    fn test_noop_insert_returns_same_version() {
        let map = HashTrieMap::new().insert("key".to_string(), 1);
        let unchanged = map.insert("key".to_string(), 1);
        assert!(map.ptr_eq(&unchanged));
    }

    #[rstest]
    fn test_noop_remove_returns_same_version() {
        let map = HashTrieMap::new().insert("key".to_string(), 1);
        let unchanged = map.remove("missing");
        assert!(map.ptr_eq(&unchanged));

        let empty: HashTrieMap<String, i32> = HashTrieMap::new();
        assert!(empty.ptr_eq(&empty.remove("anything")));
    }

    #[rstest]
    fn test_iteration_is_deterministic_and_complete() {
        let map: HashTrieMap<i32, i32> = (0..100).map(|i| (i, i * 2)).collect();
        let first: Vec<(i32, i32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        let second: Vec<(i32, i32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 100);
        assert_eq!(map.iter().len(), 100);
    }

    #[rstest]
    fn test_equality_ignores_construction_order() {
        let forward: HashTrieMap<i32, i32> = (0..50).map(|i| (i, i)).collect();
        let backward: HashTrieMap<i32, i32> = (0..50).rev().map(|i| (i, i)).collect();
        assert_eq!(forward, backward);

        let mut hasher_a = DefaultHasher::new();
        let mut hasher_b = DefaultHasher::new();
        forward.hash(&mut hasher_a);
        backward.hash(&mut hasher_b);
        assert_eq!(hasher_a.finish(), hasher_b.finish());
    }

    #[rstest]
    fn test_debug_snapshot_is_stable_across_derivations() {
        let map = HashTrieMap::new()
            .insert("a".to_string(), 1)
            .insert("b".to_string(), 2);
        let before = format!("{map:?}");
        let _derived = map.insert("c".to_string(), 3).remove("a");
        assert_eq!(format!("{map:?}"), before);
    }

    #[rstest]
    fn test_clear_leaves_original_untouched() {
        let map = HashTrieMap::new().insert("a".to_string(), 1);
        let cleared = map.clear();
        assert!(cleared.is_empty());
        assert_eq!(map.len(), 1);
    }

    #[rstest]
    fn test_contains_value_scans_entries() {
        let map = HashTrieMap::new()
            .insert("a".to_string(), 1)
            .insert("b".to_string(), 2);
        assert!(map.contains_value(&2));
        assert!(!map.contains_value(&3));
    }

    #[rstest]
    fn test_into_iterator_yields_owned_pairs() {
        let map = HashTrieMap::new()
            .insert("a".to_string(), 1)
            .insert("b".to_string(), 2);
        let mut pairs: Vec<(String, i32)> = map.clone().into_iter().collect();
        pairs.sort();
        assert_eq!(pairs, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }
}
