//! Transient (mutable batch) sessions for [`HamtMap`].
//!
//! A [`TransientHamtMap`] is an owned working copy of a map that edits in
//! place through `&mut self` methods. A node is mutated directly only
//! when this handle holds the sole reference to it; nodes still shared
//! with the source map are copied on first write. Sealing the session
//! with [`persistent`](TransientHamtMap::persistent) consumes the handle,
//! so the resulting map can never be aliased by further transient edits.
//!
//! # Examples
//!
//! ```rust
//! use hamt::HamtMap;
//!
//! let map: HamtMap<i32, i32> = HamtMap::new();
//! let filled = map.mutate(|transient| {
//!     for index in 0..1000 {
//!         transient.insert(index, index * 2);
//!     }
//! });
//! assert_eq!(filled.len(), 1000);
//! assert_eq!(filled.get(&7), Some(&14));
//! ```

use std::borrow::{Borrow, Cow};
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::marker::PhantomData;

use crate::bits::HashBits;
use crate::map::HamtMap;
use crate::node::{EntryChange, Slot, lookup, modify_slot};

/// A mutable batch-editing session over a [`HamtMap`].
///
/// Obtained from [`HamtMap::transient`] or [`HamtMap::mutate`]. Edits
/// reuse uniquely-held trie nodes in place and copy shared ones on
/// first write, so a burst of edits costs far fewer allocations than
/// the same sequence of persistent operations.
///
/// The handle is intentionally neither `Send` nor `Sync`: it is a
/// single-owner scratch value, and publishing it across threads would
/// defeat the uniqueness reasoning the in-place edits rely on.
pub struct TransientHamtMap<K, V, S = RandomState> {
    root: Slot<K, V>,
    length: usize,
    hasher: S,
    /// Pins the handle to one thread even when nodes use `Arc`.
    _marker: PhantomData<std::rc::Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientHamtMap<i32, i32>: Send, Sync);

impl<K, V> TransientHamtMap<K, V> {
    /// Creates an empty transient map with the default hasher.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V> Default for TransientHamtMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> TransientHamtMap<K, V, S> {
    /// Creates an empty transient map which will use the given hash
    /// builder.
    #[inline]
    #[must_use]
    pub const fn with_hasher(hasher: S) -> Self {
        Self {
            root: None,
            length: 0,
            hasher,
            _marker: PhantomData,
        }
    }

    /// Begins a session over an existing trie.
    pub(crate) const fn from_parts(root: Slot<K, V>, length: usize, hasher: S) -> Self {
        Self {
            root,
            length,
            hasher,
            _marker: PhantomData,
        }
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the session holds no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Seals the session into a persistent map.
    ///
    /// O(1); consumes the handle, so no later edit can alias the result.
    #[inline]
    #[must_use]
    pub fn persistent(self) -> HamtMap<K, V, S> {
        HamtMap::from_parts(self.root, self.length, self.hasher)
    }
}

impl<K, V, S> TransientHamtMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    #[allow(clippy::cast_possible_truncation)]
    fn hash_of<Q: Hash + ?Sized>(&self, key: &Q) -> HashBits {
        let mut state = self.hasher.build_hasher();
        key.hash(&mut state);
        state.finish() as HashBits
    }

    /// Returns a reference to the value corresponding to the key.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        lookup(&self.root, self.hash_of(key), key).map(|(_, value)| value)
    }

    /// Returns `true` if the session contains a value for the key.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Inserts a key-value pair, returning the previous value if the key
    /// was present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamt::TransientHamtMap;
    ///
    /// let mut transient = TransientHamtMap::new();
    /// assert_eq!(transient.insert("key".to_string(), 1), None);
    /// assert_eq!(transient.insert("key".to_string(), 2), Some(1));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_of(&key);
        self.insert_hash(hash, key, value)
    }

    /// Like [`insert`](Self::insert), with a caller-supplied hash.
    pub fn insert_hash(&mut self, hash: u32, key: K, value: V) -> Option<V> {
        match modify_slot(&mut self.root, 0, hash, Cow::<K>::Owned(key), |_| Some(value)) {
            EntryChange::Inserted => {
                self.length += 1;
                None
            }
            EntryChange::Updated(old) => Some(old),
            _ => None,
        }
    }

    /// Removes a key, returning its value if it was present.
    ///
    /// Removing an absent key touches no nodes.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let hash = self.hash_of(key);
        self.remove_hash(hash, key)
    }

    /// Like [`remove`](Self::remove), with a caller-supplied hash.
    pub fn remove_hash<Q>(&mut self, hash: u32, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ToOwned<Owned = K> + ?Sized,
    {
        lookup(&self.root, hash, key)?;
        match modify_slot(&mut self.root, 0, hash, Cow::Borrowed(key), |_| None) {
            EntryChange::Removed(old) => {
                self.length -= 1;
                Some(old)
            }
            _ => None,
        }
    }

    /// Updates, inserts or removes the value for a key with one updater,
    /// returning the previous value if the key was present.
    ///
    /// The updater receives `Some(&V)` if the key exists and `None`
    /// otherwise; returning `Some(V)` stores that value, returning `None`
    /// removes the entry (or leaves an absent key absent).
    pub fn update_with<Q, F>(&mut self, key: &Q, updater: F) -> Option<V>
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
    pub fn update_with_hash<Q, F>(&mut self, hash: u32, key: &Q, updater: F) -> Option<V>
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
            (_, Some(value)) => {
                match modify_slot(&mut self.root, 0, hash, Cow::Borrowed(key), |_| Some(value)) {
                    EntryChange::Inserted => {
                        self.length += 1;
                        None
                    }
                    EntryChange::Updated(old) => Some(old),
                    _ => None,
                }
            }
            (true, None) => match modify_slot(&mut self.root, 0, hash, Cow::Borrowed(key), |_| None) {
                EntryChange::Removed(old) => {
                    self.length -= 1;
                    Some(old)
                }
                _ => None,
            },
            (false, None) => None,
        }
    }

}

/// Inserts every entry from an iterator, replacing existing values.
impl<K, V, S> Extend<(K, V)> for TransientHamtMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    fn extend<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.insert(key, value);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
