//! Bit-slice schedule over the 32-bit trie hash.
//!
//! Each depth of the trie consumes one fixed-width slice of the hash,
//! most significant first, to select a child slot. The slices tile the
//! whole hash, so two unequal hashes are guaranteed to diverge at some
//! level and trie depth is bounded by `LEVEL_COUNT` regardless of how
//! many entries the map holds or how it was built.

use static_assertions::{const_assert, const_assert_eq};

/// Bits consumed per trie level.
pub(crate) const BITS_PER_LEVEL: u32 = 4;

/// Branching factor of internal nodes (2^`BITS_PER_LEVEL`).
pub(crate) const BRANCHING_FACTOR: usize = 1 << BITS_PER_LEVEL;

/// Number of levels needed to consume the whole 32-bit hash.
pub(crate) const LEVEL_COUNT: usize = (u32::BITS / BITS_PER_LEVEL) as usize;

const MASK: u32 = (BRANCHING_FACTOR - 1) as u32;

// The slices must tile the 32-bit hash exactly: total coverage is what
// guarantees that unequal hashes diverge before the levels run out.
const_assert_eq!(BITS_PER_LEVEL * LEVEL_COUNT as u32, u32::BITS);
const_assert!(BRANCHING_FACTOR.is_power_of_two());

/// One depth of the trie: knows which hash slice selects a child slot
/// at this depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Level {
    shift: u32,
}

impl Level {
    /// The root level, consuming the most significant slice.
    ///
    /// Most-significant-first slicing makes the in-order trie walk
    /// visit entries in ascending hash order, which is what the bulk
    /// build sorts by.
    pub(crate) const ROOT: Self = Self {
        shift: u32::BITS - BITS_PER_LEVEL,
    };

    /// Child slot index selected by this level's slice of `hash`.
    #[inline]
    pub(crate) const fn pos(self, hash: u32) -> usize {
        ((hash >> self.shift) & MASK) as usize
    }

    /// The next deeper level.
    ///
    /// Saturates at the deepest level: past it no further branching is
    /// possible, so entries that still coincide there share their full
    /// hash and are resolved by a multi-entry leaf, never by recursion.
    #[inline]
    pub(crate) const fn next(self) -> Self {
        Self {
            shift: self.shift.saturating_sub(BITS_PER_LEVEL),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
