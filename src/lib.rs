//! # hamt
//!
//! A persistent (immutable) hash map implemented as a Hash Array Mapped
//! Trie, with structural sharing between versions and a transient mode
//! for efficient batch mutation.
//!
//! ## Overview
//!
//! [`HamtMap`] is a 32-way branching trie routed by successive 5-bit
//! fragments of a 32-bit hash. Deriving a new map from an old one never
//! mutates the old one's visible state; unchanged subtrees are shared in
//! memory between versions.
//!
//! - O(log32 N) `get`, `insert`, `remove` (effectively O(1) in practice)
//! - O(1) `len` and `is_empty`
//! - O(1) conversion between persistent and transient handles
//!
//! [`TransientHamtMap`] batches many edits into one exclusively-owned
//! working copy, amortizing the copy-on-write cost across the batch, then
//! seals back into an ordinary persistent value.
//!
//! ## Example
//!
//! ```rust
//! use hamt::HamtMap;
//!
//! let map = HamtMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));
//! assert_eq!(updated.get("one"), Some(&100));
//!
//! // Batch edits through a transient working copy
//! let big = map.mutate(|transient| {
//!     for index in 0..1000 {
//!         transient.insert(index.to_string(), index);
//!     }
//! });
//! assert_eq!(big.len(), 1002);
//! assert_eq!(map.len(), 2); // source unaffected
//! ```
//!
//! ## Feature Flags
//!
//! - `arc`: use `Arc` instead of `Rc` for node references; sealed maps
//!   become safe to share across threads.
//! - `fxhash`: [`FxHamtMap`] alias using the rustc-hash hasher.
//! - `ahash`: [`AHamtMap`] alias using the aHash hasher.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_closure_for_method_calls)]

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod bits;
mod map;
mod node;
mod transient;

pub use map::HamtMap;
pub use map::HamtMapIntoIterator;
pub use map::HamtMapIterator;
pub use map::Keys;
pub use map::Values;
pub use transient::TransientHamtMap;

/// A [`HamtMap`] using the rustc-hash (FxHash) hasher.
#[cfg(feature = "fxhash")]
pub type FxHamtMap<K, V> = HamtMap<K, V, rustc_hash::FxBuildHasher>;

/// A [`HamtMap`] using the aHash hasher.
#[cfg(feature = "ahash")]
pub type AHamtMap<K, V> = HamtMap<K, V, ahash::RandomState>;

// =============================================================================
// Tests
// =============================================================================
