//! Bit-partition utilities for hash routing.
//!
//! A 32-bit hash is consumed five bits at a time, one fragment per trie
//! level, giving 32-way branching. Sparse internal nodes store a 32-bit
//! bitmap and a dense children array; `from_bitmap` maps a sparse slot to
//! its dense index by counting the set bits that precede it.

/// Bits consumed per trie level.
pub(crate) const BITS_PER_LEVEL: u32 = 5;

/// Branching factor (2^5 = 32).
pub(crate) const BUCKET_SIZE: usize = 1 << BITS_PER_LEVEL;

/// Mask extracting a single fragment.
pub(crate) const FRAGMENT_MASK: u32 = (BUCKET_SIZE - 1) as u32;

/// An indexed node holding this many children expands into an array node.
pub(crate) const MAX_INDEXED_CHILDREN: usize = BUCKET_SIZE / 2;

/// An array node whose live count drops to this packs back into an
/// indexed node.
pub(crate) const MIN_ARRAY_CHILDREN: usize = BUCKET_SIZE / 4;

/// Hash bits used for trie placement.
///
/// Host hashers produce 64 bits; the trie keys on the low 32, giving a
/// maximum meaningful depth of ⌈32 / 5⌉ = 7 levels.
pub(crate) type HashBits = u32;

/// Extracts the 5-bit routing fragment for a given trie depth.
#[inline]
pub(crate) const fn hash_fragment(shift: u32, hash: HashBits) -> usize {
    ((hash >> shift) & FRAGMENT_MASK) as usize
}

/// The bitmap bit corresponding to a fragment.
#[inline]
pub(crate) const fn to_bitmap(fragment: usize) -> u32 {
    1 << fragment
}

/// The dense array index for a sparse slot: how many set bits precede it.
#[inline]
pub(crate) const fn from_bitmap(bitmap: u32, bit: u32) -> usize {
    (bitmap & bit.wrapping_sub(1)).count_ones() as usize
}

// =============================================================================
// Tests
// =============================================================================
