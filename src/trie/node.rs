//! Trie nodes and the path-copying update algorithms.
//!
//! A node is either a branch holding a fixed array of child slots
//! indexed by this depth's hash slice, or a leaf holding the entries
//! whose full hash routed them here. Nodes are immutable and shared
//! between map versions; an update allocates new nodes only along the
//! root-to-leaf path it touches. Every operation that changes nothing
//! returns the pointer-identical node it was given, and callers use
//! that identity check, not a deep comparison, to decide whether to
//! reallocate their own slot array. This is what keeps an update at
//! O(depth) allocations instead of O(size).

use std::borrow::Borrow;

use super::ReferenceCounter;
use super::entry::Entry;
use super::leaf::{EntryHandle, LeafData, LeafRemove};
use super::level::{BRANCHING_FACTOR, Level};

/// Shared handle to a node; cloning shares the subtree between versions.
pub(crate) type NodeHandle<K, V> = ReferenceCounter<Node<K, V>>;

type ChildSlots<K, V> = [Option<NodeHandle<K, V>>; BRANCHING_FACTOR];

/// A trie node.
///
/// A branch always has at least one occupied slot and caches the entry
/// count of its subtree, so map size is O(1) and bulk merges need no
/// separate added-entry bookkeeping. Leaves carry no level: lookup
/// re-checks the full hash, so a leaf is valid at any depth.
#[derive(Debug)]
pub(crate) enum Node<K, V> {
    Branch {
        size: usize,
        children: ChildSlots<K, V>,
    },
    Leaf(LeafData<K, V>),
}

fn empty_slots<K, V>() -> ChildSlots<K, V> {
    [const { None }; BRANCHING_FACTOR]
}

impl<K, V> Node<K, V> {
    /// Number of entries in this subtree.
    pub(crate) fn size(&self) -> usize {
        match self {
            Self::Branch { size, .. } => *size,
            Self::Leaf(data) => data.len(),
        }
    }

    fn branch(children: ChildSlots<K, V>) -> Self {
        let size = children.iter().flatten().map(|child| child.size()).sum();
        Self::Branch { size, children }
    }

    fn leaf(data: LeafData<K, V>) -> NodeHandle<K, V> {
        ReferenceCounter::new(Self::Leaf(data))
    }

    /// Looks up the entry for `key`, descending by hash slice until a
    /// leaf or an absent slot is reached.
    pub(crate) fn get<'a, Q>(root: &'a Self, hash: u32, key: &Q) -> Option<&'a Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut node = root;
        let mut level = Level::ROOT;
        loop {
            match node {
                Self::Branch { children, .. } => {
                    node = children[level.pos(hash)].as_deref()?;
                    level = level.next();
                }
                Self::Leaf(data) => {
                    return if data.hash() == hash { data.get(key) } else { None };
                }
            }
        }
    }
}

impl<K: Eq, V: PartialEq> Node<K, V> {
    /// Path-copying upsert.
    ///
    /// Returns the node replacing `node` (pointer-identical when the
    /// key was already bound to an equal value) and the previously
    /// bound entry, if any, so observers see the prior value without a
    /// second walk.
    pub(crate) fn put<'a>(
        node: &'a NodeHandle<K, V>,
        level: Level,
        entry: EntryHandle<K, V>,
    ) -> (NodeHandle<K, V>, Option<&'a Entry<K, V>>) {
        match &**node {
            Self::Leaf(data) => {
                if data.hash() == entry.hash {
                    match data.put(entry) {
                        (None, previous) => (node.clone(), previous),
                        (Some(replacement), previous) => (Self::leaf(replacement), previous),
                    }
                } else {
                    let hash = data.hash();
                    (
                        ReferenceCounter::new(Self::split(level, node.clone(), hash, entry)),
                        None,
                    )
                }
            }
            Self::Branch { children, .. } => {
                let position = level.pos(entry.hash);
                match &children[position] {
                    Some(child) => {
                        let (updated_child, previous) = Self::put(child, level.next(), entry);
                        if ReferenceCounter::ptr_eq(child, &updated_child) {
                            (node.clone(), previous)
                        } else {
                            let mut slots = children.clone();
                            slots[position] = Some(updated_child);
                            (ReferenceCounter::new(Self::branch(slots)), previous)
                        }
                    }
                    None => {
                        let mut slots = children.clone();
                        slots[position] = Some(Self::leaf(LeafData::Single(entry)));
                        (ReferenceCounter::new(Self::branch(slots)), None)
                    }
                }
            }
        }
    }

    /// Routes an existing leaf and a new entry with a different full
    /// hash into distinct slots, chaining one branch per level until
    /// their hash slices diverge. Total slice coverage guarantees
    /// divergence before the levels run out.
    fn split(
        level: Level,
        existing: NodeHandle<K, V>,
        existing_hash: u32,
        entry: EntryHandle<K, V>,
    ) -> Self {
        debug_assert_ne!(existing_hash, entry.hash);
        let existing_position = level.pos(existing_hash);
        let entry_position = level.pos(entry.hash);
        let mut slots = empty_slots();
        if existing_position == entry_position {
            slots[existing_position] = Some(ReferenceCounter::new(Self::split(
                level.next(),
                existing,
                existing_hash,
                entry,
            )));
        } else {
            slots[existing_position] = Some(existing);
            slots[entry_position] = Some(Self::leaf(LeafData::Single(entry)));
        }
        Self::branch(slots)
    }

    /// Bulk merge of entries pre-sorted by traversal order (ascending
    /// hash, stable on ties).
    ///
    /// Sorted order groups entries by shared slice prefixes, so one
    /// linear pass partitions the range into per-slot subranges and
    /// recursion only visits the subtrees that actually receive
    /// entries; untouched children are shared by reference. Returns a
    /// pointer-identical node when no entry changed anything.
    pub(crate) fn put_all(
        existing: Option<&NodeHandle<K, V>>,
        level: Level,
        entries: &[EntryHandle<K, V>],
    ) -> Option<NodeHandle<K, V>> {
        if entries.is_empty() {
            return existing.cloned();
        }
        let Some(node) = existing else {
            return Some(Self::build(level, entries));
        };
        match &**node {
            Self::Leaf(data) => {
                let hash = data.hash();
                if entries.first().is_some_and(|e| e.hash == hash)
                    && entries.last().is_some_and(|e| e.hash == hash)
                {
                    // The whole range collides with this leaf: fold it
                    // into the leaf data, later entries winning.
                    let mut updated: Option<LeafData<K, V>> = None;
                    for entry in entries {
                        let base = updated.as_ref().unwrap_or(data);
                        let next = base.put(entry.clone()).0;
                        if next.is_some() {
                            updated = next;
                        }
                    }
                    Some(updated.map_or_else(|| node.clone(), Self::leaf))
                } else {
                    // Mixed hashes: open a branch here, seed it with
                    // the leaf, and merge each subrange into its slot.
                    let mut slots = empty_slots();
                    slots[level.pos(hash)] = Some(node.clone());
                    for (position, range) in Partitions::new(level, entries) {
                        let seeded = slots[position].take();
                        slots[position] = Self::put_all(seeded.as_ref(), level.next(), range);
                    }
                    Some(ReferenceCounter::new(Self::branch(slots)))
                }
            }
            Self::Branch { children, .. } => {
                let mut updated: Option<ChildSlots<K, V>> = None;
                for (position, range) in Partitions::new(level, entries) {
                    let child = children[position].as_ref();
                    let merged = Self::put_all(child, level.next(), range);
                    let unchanged = matches!(
                        (child, &merged),
                        (Some(old), Some(new)) if ReferenceCounter::ptr_eq(old, new)
                    );
                    if !unchanged {
                        updated.get_or_insert_with(|| children.clone())[position] = merged;
                    }
                }
                Some(updated.map_or_else(
                    || node.clone(),
                    |slots| ReferenceCounter::new(Self::branch(slots)),
                ))
            }
        }
    }

    /// Builds a fresh subtree from a non-empty sorted range.
    fn build(level: Level, entries: &[EntryHandle<K, V>]) -> NodeHandle<K, V> {
        let first = &entries[0];
        let same_hash = entries
            .last()
            .is_some_and(|last| last.hash == first.hash);
        if same_hash {
            // One full hash: a single leaf. Fold so that duplicate
            // keys in the input dedupe with the later entry winning.
            let mut data = LeafData::Single(first.clone());
            for entry in &entries[1..] {
                let next = data.put(entry.clone()).0;
                if let Some(next) = next {
                    data = next;
                }
            }
            Self::leaf(data)
        } else {
            let mut slots = empty_slots();
            for (position, range) in Partitions::new(level, entries) {
                slots[position] = Some(Self::build(level.next(), range));
            }
            ReferenceCounter::new(Self::branch(slots))
        }
    }
}

impl<K, V> Node<K, V> {
    /// Path-copying removal, mirroring `put`'s recursion.
    ///
    /// The predicate sees the matched entry before anything is rebuilt,
    /// which gives conditional removal its single-pass semantics.
    /// Returns `None` when the whole subtree disappears, a
    /// pointer-identical node when nothing matched, and the removed
    /// entry when the removal took effect.
    pub(crate) fn remove<'a, Q, F>(
        node: &'a NodeHandle<K, V>,
        level: Level,
        hash: u32,
        key: &Q,
        predicate: F,
    ) -> (Option<NodeHandle<K, V>>, Option<&'a Entry<K, V>>)
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        F: FnOnce(&Entry<K, V>) -> bool,
    {
        match &**node {
            Self::Leaf(data) => {
                if data.hash() != hash {
                    return (Some(node.clone()), None);
                }
                match data.remove(key, predicate) {
                    LeafRemove::Untouched => (Some(node.clone()), None),
                    LeafRemove::Emptied(removed) => (None, Some(removed)),
                    LeafRemove::Shrunk(remaining, removed) => {
                        (Some(Self::leaf(remaining)), Some(removed))
                    }
                }
            }
            Self::Branch { children, .. } => {
                let position = level.pos(hash);
                let Some(child) = &children[position] else {
                    return (Some(node.clone()), None);
                };
                let (updated_child, removed) =
                    Self::remove(child, level.next(), hash, key, predicate);
                if removed.is_none() {
                    return (Some(node.clone()), None);
                }
                let mut slots = children.clone();
                slots[position] = updated_child;
                (Self::shrink(slots), removed)
            }
        }
    }

    /// Rebuilds a branch after a removal. An empty branch vanishes so
    /// the parent slot frees up; a branch whose only remaining child
    /// is a leaf collapses to that leaf. Leaves are depth-agnostic
    /// (lookup re-checks the full hash), while branch children are
    /// level-indexed and must keep their depth, so only leaves are
    /// lifted. This keeps height bounded under delete/insert churn.
    fn shrink(children: ChildSlots<K, V>) -> Option<NodeHandle<K, V>> {
        let mut occupied = children.iter().flatten();
        let first = occupied.next().cloned();
        let more = occupied.next().is_some();
        match first {
            None => None,
            Some(only) if !more && matches!(&*only, Self::Leaf(_)) => Some(only),
            Some(_) => Some(ReferenceCounter::new(Self::branch(children)))
        }
    }
}

/// Iterator over the per-slot subranges of a hash-sorted entry range
/// at one level: a single linear pass, no re-scanning.
struct Partitions<'a, K, V> {
    level: Level,
    entries: &'a [EntryHandle<K, V>],
    start: usize,
}

impl<'a, K, V> Partitions<'a, K, V> {
    fn new(level: Level, entries: &'a [EntryHandle<K, V>]) -> Self {
        Self {
            level,
            entries,
            start: 0,
        }
    }
}

impl<'a, K, V> Iterator for Partitions<'a, K, V> {
    type Item = (usize, &'a [EntryHandle<K, V>]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.entries.len() {
            return None;
        }
        let position = self.level.pos(self.entries[self.start].hash);
        let mut end = self.start + 1;
        while end < self.entries.len() && self.level.pos(self.entries[end].hash) == position {
            end += 1;
        }
        let range = &self.entries[self.start..end];
        self.start = end;
        Some((position, range))
    }
}

// =============================================================================
// Tests
// =============================================================================
