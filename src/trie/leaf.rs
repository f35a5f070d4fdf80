//! Leaf payloads: the entries that live at one trie position.
//!
//! A leaf holds either exactly one entry, or (only on a true full-hash
//! collision) an append-ordered list of entries sharing that hash.
//! Leaf data is immutable; every update either returns a replacement or
//! reports that nothing changed, which is the short circuit that lets
//! the whole path above skip reallocation.

use std::borrow::Borrow;

use smallvec::SmallVec;

use super::ReferenceCounter;
use super::entry::Entry;

/// Shared handle to an entry; cloning shares the entry between versions.
pub(crate) type EntryHandle<K, V> = ReferenceCounter<Entry<K, V>>;

/// True collisions are rare and short, so they stay inline.
const COLLISION_INLINE: usize = 4;

type CollisionList<K, V> = SmallVec<[EntryHandle<K, V>; COLLISION_INLINE]>;

/// The payload stored at a trie leaf.
///
/// Invariants: every entry in `Multi` has the same full hash and a
/// distinct key, and `Multi` never holds fewer than two entries:
/// removal collapses it to `Single`, and removal from `Single` removes
/// the leaf itself.
#[derive(Debug, Clone)]
pub(crate) enum LeafData<K, V> {
    Single(EntryHandle<K, V>),
    Multi {
        hash: u32,
        entries: CollisionList<K, V>,
    },
}

/// Outcome of a predicate-guarded removal.
pub(crate) enum LeafRemove<'a, K, V> {
    /// Key absent or predicate declined; the leaf is unchanged.
    Untouched,
    /// The last entry was removed; the leaf disappears.
    Emptied(&'a Entry<K, V>),
    /// An entry was removed and this data replaces the old leaf's.
    Shrunk(LeafData<K, V>, &'a Entry<K, V>),
}

impl<K, V> LeafData<K, V> {
    /// The full hash shared by every entry stored here.
    pub(crate) fn hash(&self) -> u32 {
        match self {
            Self::Single(entry) => entry.hash,
            Self::Multi { hash, .. } => *hash,
        }
    }

    /// Number of entries stored here (1, or ≥ 2 for collisions).
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multi { entries, .. } => entries.len(),
        }
    }

    /// Looks up an entry by key. The caller has already matched the
    /// full hash; collisions cost a linear scan.
    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match self {
            Self::Single(entry) => (entry.key.borrow() == key).then(|| &**entry),
            Self::Multi { entries, .. } => entries
                .iter()
                .find(|entry| entry.key.borrow() == key)
                .map(|entry| &**entry),
        }
    }
}

impl<K: Eq, V: PartialEq> LeafData<K, V> {
    /// Inserts or replaces `entry`, which must share this leaf's hash.
    ///
    /// Returns the replacement data (`None` when the key is already
    /// bound to an equal value and nothing needs to change) together
    /// with the previously bound entry, if any.
    pub(crate) fn put(&self, entry: EntryHandle<K, V>) -> (Option<Self>, Option<&Entry<K, V>>) {
        debug_assert_eq!(self.hash(), entry.hash);
        match self {
            Self::Single(existing) => {
                if existing.key == entry.key {
                    if existing.value == entry.value {
                        (None, Some(existing))
                    } else {
                        (Some(Self::Single(entry)), Some(existing))
                    }
                } else {
                    // Distinct keys with the same full hash: go multi.
                    let hash = entry.hash;
                    let entries = CollisionList::from_iter([existing.clone(), entry]);
                    (Some(Self::Multi { hash, entries }), None)
                }
            }
            Self::Multi { hash, entries } => {
                match entries.iter().position(|slot| slot.key == entry.key) {
                    Some(position) => {
                        let previous = &entries[position];
                        if previous.value == entry.value {
                            (None, Some(previous))
                        } else {
                            let mut replaced = entries.clone();
                            replaced[position] = entry;
                            (
                                Some(Self::Multi {
                                    hash: *hash,
                                    entries: replaced,
                                }),
                                Some(previous),
                            )
                        }
                    }
                    None => {
                        let mut appended = entries.clone();
                        appended.push(entry);
                        (
                            Some(Self::Multi {
                                hash: *hash,
                                entries: appended,
                            }),
                            None,
                        )
                    }
                }
            }
        }
    }
}

impl<K, V> LeafData<K, V> {
    /// Removes the entry for `key` if present and accepted by
    /// `predicate`. The predicate sees the stored entry before any
    /// structure is rebuilt, which is what makes conditional removal a
    /// single pass.
    pub(crate) fn remove<Q, F>(&self, key: &Q, predicate: F) -> LeafRemove<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        F: FnOnce(&Entry<K, V>) -> bool,
    {
        match self {
            Self::Single(entry) => {
                if entry.key.borrow() == key && predicate(entry) {
                    LeafRemove::Emptied(entry)
                } else {
                    LeafRemove::Untouched
                }
            }
            Self::Multi { hash, entries } => {
                let Some(position) = entries.iter().position(|slot| slot.key.borrow() == key)
                else {
                    return LeafRemove::Untouched;
                };
                let removed = &entries[position];
                if !predicate(removed) {
                    return LeafRemove::Untouched;
                }
                if entries.len() == 2 {
                    // Two entries and one leaving: back to single.
                    let remaining = entries[if position == 0 { 1 } else { 0 }].clone();
                    return LeafRemove::Shrunk(Self::Single(remaining), removed);
                }
                let mut excised = entries.clone();
                excised.remove(position);
                LeafRemove::Shrunk(
                    Self::Multi {
                        hash: *hash,
                        entries: excised,
                    },
                    removed,
                )
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
