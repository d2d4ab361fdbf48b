//! Persistent (immutable) hash map based on HAMT.
//!
//! This module provides [`HamtMap`], an immutable hash map that uses
//! structural sharing for efficient operations.
//!
//! # Overview
//!
//! `HamtMap` is a Hash Array Mapped Trie: a 32-way branching trie routed
//! by successive 5-bit fragments of a 32-bit hash.
//!
//! - O(log32 N) get (effectively O(1) for practical sizes)
//! - O(log32 N) insert
//! - O(log32 N) remove
//! - O(1) len and `is_empty`
//!
//! All operations return new maps without modifying the original, and
//! structural sharing ensures memory efficiency.
//!
//! # Examples
//!
//! ```rust
//! use hamt::HamtMap;
//!
//! let map = HamtMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2)
//!     .insert("three".to_string(), 3);
//!
//! assert_eq!(map.get("one"), Some(&1));
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```

use std::borrow::{Borrow, Cow};
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::{FromIterator, FusedIterator};

use crate::bits::HashBits;
use crate::node::{EntryChange, Node, NodeRef, Slot, lookup, modify_slot};
use crate::transient::TransientHamtMap;

// =============================================================================
// HamtMap Definition
// =============================================================================

/// A persistent (immutable) hash map based on HAMT.
///
/// `HamtMap` is an immutable data structure that uses structural sharing
/// to efficiently support functional programming patterns. A third type
/// parameter selects the hasher, exactly as with the standard `HashMap`;
/// key equality is the key type's `Eq` implementation.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log32 N)        |
/// | `insert`       | O(log32 N)        |
/// | `remove`       | O(log32 N)        |
/// | `contains_key` | O(log32 N)        |
/// | `len`          | O(1)              |
/// | `is_empty`     | O(1)              |
///
/// # Examples
///
/// ```rust
/// use hamt::HamtMap;
///
/// let map = HamtMap::singleton("key".to_string(), 42);
/// assert_eq!(map.get("key"), Some(&42));
/// ```
pub struct HamtMap<K, V, S = RandomState> {
    /// Root of the trie; `None` is the empty map.
    root: Slot<K, V>,
    /// Number of entries.
    length: usize,
    /// Hash builder used to place keys in the trie.
    hasher: S,
}

impl<K, V> HamtMap<K, V> {
    /// Creates a new empty map with the default hasher.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map: HamtMap<String, i32> = HamtMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K: Clone + Hash + Eq, V: Clone> HamtMap<K, V> {
    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map = HamtMap::singleton("key".to_string(), 42);
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.get("key"), Some(&42));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }
}

impl<K, V, S> HamtMap<K, V, S> {
    /// Creates a new empty map which will use the given hash builder.
    ///
    /// The hasher decides trie placement only; two keys with equal hashes
    /// but distinct keys land in a collision node and remain independent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    /// use std::collections::hash_map::RandomState;
    ///
    /// let map: HamtMap<String, i32, RandomState> =
    ///     HamtMap::with_hasher(RandomState::new());
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn with_hasher(hasher: S) -> Self {
        Self {
            root: None,
            length: 0,
            hasher,
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns a reference to the map's hash builder.
    #[inline]
    pub const fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Returns a lazy iterator over key-value pairs.
    ///
    /// Entries are produced one at a time by a depth-first walk driven by
    /// an explicit stack; nothing is materialized up front. The order is
    /// storage order, not insertion order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map = HamtMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    ///
    /// let mut total = 0;
    /// for (_key, value) in map.iter() {
    ///     total += value;
    /// }
    /// assert_eq!(total, 3);
    /// ```
    #[must_use]
    pub fn iter(&self) -> HamtMapIterator<'_, K, V> {
        HamtMapIterator::new(&self.root, self.length)
    }

    /// Returns a lazy iterator over keys.
    #[must_use]
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns a lazy iterator over values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map = HamtMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    ///
    /// let sum: i32 = map.values().sum();
    /// assert_eq!(sum, 3);
    /// ```
    #[must_use]
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Visits every entry, aggregating into an accumulator.
    ///
    /// The walk is iterative over an explicit stack of children arrays,
    /// so it never recurses on the host stack. Visit order is storage
    /// order and should not be relied upon.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map = HamtMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2)
    ///     .insert("c".to_string(), 3);
    ///
    /// let sum = map.fold(0, |accumulator, _key, value| accumulator + value);
    /// assert_eq!(sum, 6);
    ///
    /// let count = map.fold(0, |accumulator, _key, _value| accumulator + 1);
    /// assert_eq!(count, map.len());
    /// ```
    pub fn fold<B, F>(&self, initial: B, mut combine: F) -> B
    where
        F: FnMut(B, &K, &V) -> B,
    {
        let Some(root) = self.root.as_deref() else {
            return initial;
        };
        let mut accumulator = initial;
        let mut to_visit: Vec<&[Slot<K, V>]> = Vec::new();
        match root {
            Node::Leaf { key, value, .. } => return combine(accumulator, key, value),
            Node::Collision { entries, .. } => {
                for (key, value) in entries {
                    accumulator = combine(accumulator, key, value);
                }
                return accumulator;
            }
            Node::Indexed { children, .. } | Node::Array { children, .. } => {
                to_visit.push(children);
            }
        }
        while let Some(children) = to_visit.pop() {
            for slot in children {
                let Some(node) = slot.as_deref() else {
                    continue;
                };
                match node {
                    Node::Leaf { key, value, .. } => {
                        accumulator = combine(accumulator, key, value);
                    }
                    Node::Collision { entries, .. } => {
                        for (key, value) in entries {
                            accumulator = combine(accumulator, key, value);
                        }
                    }
                    Node::Indexed { children, .. } | Node::Array { children, .. } => {
                        to_visit.push(children);
                    }
                }
            }
        }
        accumulator
    }

    /// Visits every entry with `action`; `fold` specialized to no
    /// accumulator.
    pub fn for_each<F>(&self, mut action: F)
    where
        F: FnMut(&K, &V),
    {
        self.fold((), |(), key, value| action(key, value));
    }
}

impl<K, V, S> HamtMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Trie placement uses the low 32 bits of the host hash.
    #[allow(clippy::cast_possible_truncation)]
    fn hash_of<Q: Hash + ?Sized>(&self, key: &Q) -> HashBits {
        let mut state = self.hasher.build_hasher();
        key.hash(&mut state);
        state.finish() as HashBits
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but `Hash`
    /// and `Eq` on the borrowed form must match those for the key type.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map = HamtMap::new().insert("hello".to_string(), 42);
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
        self.get_hash(self.hash_of(key), key)
    }

    /// Like [`get`](Self::get), with a caller-supplied hash instead of
    /// the configured hasher.
    #[must_use]
    pub fn get_hash<Q>(&self, hash: u32, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        lookup(&self.root, hash, key).map(|(_, value)| value)
    }

    /// Returns the value for the key, or `default` if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map = HamtMap::new().insert("a".to_string(), 1);
    /// assert_eq!(map.get_or("a", &0), &1);
    /// assert_eq!(map.get_or("b", &0), &0);
    /// ```
    #[must_use]
    pub fn get_or<'a, Q>(&'a self, key: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).unwrap_or(default)
    }

    /// Returns the stored key-value pair for the key.
    #[must_use]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        lookup(&self.root, self.hash_of(key), key)
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map = HamtMap::new().insert("key".to_string(), 42);
    ///
    /// assert!(map.contains_key("key"));
    /// assert!(!map.contains_key("other"));
    /// ```
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Like [`contains_key`](Self::contains_key), with a caller-supplied
    /// hash.
    #[must_use]
    pub fn contains_key_hash<Q>(&self, hash: u32, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.get_hash(hash, key).is_some()
    }

    /// Inserts a key-value pair, returning the updated map.
    ///
    /// If the map already contains the key, the value is replaced.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map1 = HamtMap::new().insert("key".to_string(), 1);
    /// let map2 = map1.insert("key".to_string(), 2);
    ///
    /// assert_eq!(map1.get("key"), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get("key"), Some(&2)); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let hash = self.hash_of(&key);
        self.insert_hash(hash, key, value)
    }

    /// Like [`insert`](Self::insert), with a caller-supplied hash.
    #[must_use]
    pub fn insert_hash(&self, hash: u32, key: K, value: V) -> Self {
        self.with_entry::<K>(hash, Cow::Owned(key), value)
    }

    /// Removes a key, returning the updated map.
    ///
    /// If the key is absent this is a no-op: the returned map shares the
    /// original root and nothing is allocated.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map = HamtMap::new()
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
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let hash = self.hash_of(key);
        self.remove_hash(hash, key)
    }

    /// Like [`remove`](Self::remove), with a caller-supplied hash.
    #[must_use]
    pub fn remove_hash<Q>(&self, hash: u32, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Eq + ToOwned<Owned = K> + ?Sized,
    {
        if lookup(&self.root, hash, key).is_none() {
            return self.clone();
        }
        self.without_entry(hash, key)
    }

    /// Updates, inserts or removes the value for a key with one updater.
    ///
    /// The updater receives `Some(&V)` if the key exists, or `None` if it
    /// does not. Returning `Some(V)` inserts or replaces the value;
    /// returning `None` removes the entry (or declines to insert one, in
    /// which case the returned map shares the original root).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map = HamtMap::new().insert("count".to_string(), 10);
    ///
    /// // Increment existing value
    /// let updated = map.update_with("count", |value| value.map(|v| v + 1));
    /// assert_eq!(updated.get("count"), Some(&11));
    ///
    /// // Insert if not exists
    /// let inserted = map.update_with("new", |value| match value {
    ///     Some(v) => Some(*v),
    ///     None => Some(100),
    /// });
    /// assert_eq!(inserted.get("new"), Some(&100));
    ///
    /// // Remove by returning None
    /// let removed = map.update_with("count", |_| None);
    /// assert_eq!(removed.get("count"), None);
    /// ```
    #[must_use]
    pub fn update_with<Q, F>(&self, key: &Q, updater: F) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let hash = self.hash_of(key);
        self.update_with_hash(hash, key, updater)
    }

    /// Like [`update_with`](Self::update_with), with a caller-supplied
    /// hash.
    #[must_use]
    pub fn update_with_hash<Q, F>(&self, hash: u32, key: &Q, updater: F) -> Self
    where
        K: Borrow<Q>,
        Q: Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let (present, outcome) = match lookup(&self.root, hash, key) {
            Some((_, value)) => (true, updater(Some(value))),
            None => (false, updater(None)),
        };
        match (present, outcome) {
            (_, Some(value)) => self.with_entry(hash, Cow::Borrowed(key), value),
            (true, None) => self.without_entry(hash, key),
            (false, None) => self.clone(),
        }
    }

    /// Begins a transient session sharing this map's contents.
    ///
    /// O(1); the source map remains valid and is never affected by edits
    /// made through the transient handle.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map = HamtMap::new().insert("a".to_string(), 1);
    /// let mut transient = map.transient();
    /// transient.insert("b".to_string(), 2);
    ///
    /// let sealed = transient.persistent();
    /// assert_eq!(sealed.len(), 2);
    /// assert_eq!(map.len(), 1);
    /// ```
    #[must_use]
    pub fn transient(&self) -> TransientHamtMap<K, V, S> {
        TransientHamtMap::from_parts(self.root.clone(), self.length, self.hasher.clone())
    }

    /// Runs a batch of edits through a transient handle and seals the
    /// result.
    ///
    /// If `batch` panics, the transient working copy is dropped during
    /// unwinding and this map is unaffected; partial edits are rolled
    /// back, not committed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::HamtMap;
    ///
    /// let map: HamtMap<i32, i32> = HamtMap::new();
    /// let filled = map.mutate(|transient| {
    ///     for index in 0..100 {
    ///         transient.insert(index, index * 2);
    ///     }
    /// });
    /// assert_eq!(filled.len(), 100);
    /// assert!(map.is_empty());
    /// ```
    #[must_use]
    pub fn mutate<F>(&self, batch: F) -> Self
    where
        F: FnOnce(&mut TransientHamtMap<K, V, S>),
    {
        let mut transient = self.transient();
        batch(&mut transient);
        transient.persistent()
    }

    /// Insert-or-replace through the modify engine. An owned key moves
    /// into the new entry without a clone.
    fn with_entry<Q>(&self, hash: HashBits, key: Cow<'_, Q>, value: V) -> Self
    where
        K: Borrow<Q>,
        Q: Eq + ToOwned<Owned = K> + ?Sized,
    {
        let mut root = self.root.clone();
        let change = modify_slot(&mut root, 0, hash, key, |_| Some(value));
        let length = match change {
            EntryChange::Inserted => self.length + 1,
            _ => self.length,
        };
        Self {
            root,
            length,
            hasher: self.hasher.clone(),
        }
    }

    /// Removal through the modify engine; the key is known present.
    fn without_entry<Q>(&self, hash: HashBits, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Eq + ToOwned<Owned = K> + ?Sized,
    {
        let mut root = self.root.clone();
        let change = modify_slot(&mut root, 0, hash, Cow::Borrowed(key), |_| None);
        let length = match change {
            EntryChange::Removed(_) => self.length - 1,
            _ => self.length,
        };
        Self {
            root,
            length,
            hasher: self.hasher.clone(),
        }
    }
}

impl<K, V, S> HamtMap<K, V, S> {
    /// Reassembles a map from a sealed transient session.
    pub(crate) fn from_parts(root: Slot<K, V>, length: usize, hasher: S) -> Self {
        Self {
            root,
            length,
            hasher,
        }
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> &Slot<K, V> {
        &self.root
    }
}

// =============================================================================
// Iterator Implementations
// =============================================================================

/// A work-stack frame of the borrowing iterator: either a run of child
/// slots or a run of collision entries.
enum Frame<'a, K, V> {
    Slots(std::slice::Iter<'a, Slot<K, V>>),
    Entries(std::slice::Iter<'a, (K, V)>),
}

/// What the top frame produced on one step.
enum Step<'a, K, V> {
    Slot(&'a Slot<K, V>),
    Entry(&'a (K, V)),
}

/// A lazy iterator over key-value pairs of a [`HamtMap`].
///
/// Entries are produced on demand by a depth-first walk over an explicit
/// stack of `(children, position)` frames; depth is bounded by the trie,
/// not the host call stack.
pub struct HamtMapIterator<'a, K, V> {
    stack: Vec<Frame<'a, K, V>>,
    remaining: usize,
}

impl<'a, K, V> HamtMapIterator<'a, K, V> {
    fn new(root: &'a Slot<K, V>, remaining: usize) -> Self {
        Self {
            stack: vec![Frame::Slots(std::slice::from_ref(root).iter())],
            remaining,
        }
    }
}

impl<'a, K, V> Iterator for HamtMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.last_mut() {
            let step = match frame {
                Frame::Slots(slots) => slots.next().map(Step::Slot),
                Frame::Entries(entries) => entries.next().map(Step::Entry),
            };
            match step {
                None => {
                    self.stack.pop();
                }
                Some(Step::Slot(None)) => {}
                Some(Step::Slot(Some(node))) => match &**node {
                    Node::Leaf { key, value, .. } => {
                        self.remaining -= 1;
                        return Some((key, value));
                    }
                    Node::Collision { entries, .. } => {
                        self.stack.push(Frame::Entries(entries.iter()));
                    }
                    Node::Indexed { children, .. } | Node::Array { children, .. } => {
                        self.stack.push(Frame::Slots(children.iter()));
                    }
                },
                Some(Step::Entry((key, value))) => {
                    self.remaining -= 1;
                    return Some((key, value));
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for HamtMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for HamtMapIterator<'_, K, V> {}

/// A lazy iterator over the keys of a [`HamtMap`].
pub struct Keys<'a, K, V> {
    inner: HamtMapIterator<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// A lazy iterator over the values of a [`HamtMap`].
pub struct Values<'a, K, V> {
    inner: HamtMapIterator<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K, V> FusedIterator for Values<'_, K, V> {}

/// An owned work-stack frame: a node and the next child position.
struct OwnedFrame<K, V> {
    node: NodeRef<K, V>,
    position: usize,
}

/// An owning iterator over key-value pairs of a [`HamtMap`].
///
/// Entries are cloned out of the (possibly shared) trie on demand.
pub struct HamtMapIntoIterator<K, V> {
    stack: Vec<OwnedFrame<K, V>>,
    remaining: usize,
}

impl<K: Clone, V: Clone> Iterator for HamtMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (node, position) = {
                let frame = self.stack.last_mut()?;
                let position = frame.position;
                frame.position += 1;
                (frame.node.clone(), position)
            };
            match &*node {
                Node::Leaf { key, value, .. } => {
                    self.stack.pop();
                    self.remaining -= 1;
                    return Some((key.clone(), value.clone()));
                }
                Node::Collision { entries, .. } => {
                    if position < entries.len() {
                        self.remaining -= 1;
                        return Some(entries[position].clone());
                    }
                    self.stack.pop();
                }
                Node::Indexed { children, .. } | Node::Array { children, .. } => {
                    if position < children.len() {
                        if let Some(child) = children[position].clone() {
                            self.stack.push(OwnedFrame {
                                node: child,
                                position: 0,
                            });
                        }
                    } else {
                        self.stack.pop();
                    }
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Clone, V: Clone> ExactSizeIterator for HamtMapIntoIterator<K, V> {}
impl<K: Clone, V: Clone> FusedIterator for HamtMapIntoIterator<K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V, S: Clone> Clone for HamtMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            length: self.length,
            hasher: self.hasher.clone(),
        }
    }
}

impl<K, V, S: Default> Default for HamtMap<K, V, S> {
    #[inline]
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> FromIterator<(K, V)> for HamtMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone,
    S: BuildHasher + Default + Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut transient = TransientHamtMap::with_hasher(S::default());
        transient.extend(iter);
        transient.persistent()
    }
}

impl<K, V, S> IntoIterator for HamtMap<K, V, S>
where
    K: Clone,
    V: Clone,
{
    type Item = (K, V);
    type IntoIter = HamtMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let stack = self
            .root
            .into_iter()
            .map(|node| OwnedFrame { node, position: 0 })
            .collect();
        HamtMapIntoIterator {
            stack,
            remaining: self.length,
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a HamtMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = HamtMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> PartialEq for HamtMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone + PartialEq,
    S: BuildHasher + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length
            && self
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K, V, S> Eq for HamtMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone + Eq,
    S: BuildHasher + Clone,
{
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for HamtMap<K, V, S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// Sealed maps are freely shareable across threads in `Arc` builds.
#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(HamtMap<i32, i32>: Send, Sync);

// =============================================================================
// Tests
// =============================================================================
