//! Internal trie nodes and the unified modify engine.
//!
//! Insert, update and delete all run through [`modify_slot`]: one recursive
//! path-rewrite taking an updater `FnOnce(Option<&V>) -> Option<V>`, where
//! returning `None` deletes the entry. The engine rewrites the root-to-leaf
//! path for the key's hash and leaves every sibling subtree shared.
//!
//! Ownership follows reference-count uniqueness: a node reached through
//! `make_mut` is updated in place when it is uniquely held (the transient
//! fast path) and copied otherwise, so no map handle ever observes a
//! mutation of a node it shares.

use std::borrow::{Borrow, Cow};

use smallvec::{SmallVec, smallvec};

use crate::ReferenceCounter;
use crate::bits::{
    BITS_PER_LEVEL, BUCKET_SIZE, HashBits, MAX_INDEXED_CHILDREN, MIN_ARRAY_CHILDREN, from_bitmap,
    hash_fragment, to_bitmap,
};

// =============================================================================
// Node Definition
// =============================================================================

/// A reference-counted trie node.
pub(crate) type NodeRef<K, V> = ReferenceCounter<Node<K, V>>;

/// A child position that may be empty.
///
/// `None` plays the role of the empty sentinel: the map root when the map
/// holds nothing, and the holes of an array node. It is never allocated.
pub(crate) type Slot<K, V> = Option<NodeRef<K, V>>;

/// Entries of a collision node; inline capacity two covers the common case.
pub(crate) type CollisionEntries<K, V> = SmallVec<[(K, V); 2]>;

/// Internal node structure for the HAMT.
#[derive(Clone)]
pub(crate) enum Node<K, V> {
    /// Single key-value entry.
    Leaf { hash: HashBits, key: K, value: V },
    /// Two or more entries sharing one hash but with distinct keys.
    Collision {
        hash: HashBits,
        entries: CollisionEntries<K, V>,
    },
    /// Sparse internal node: bit `i` of `bitmap` set means fragment `i`
    /// has a child, packed densely in ascending fragment order.
    /// `children.len() == bitmap.count_ones()` and every slot is `Some`.
    Indexed {
        bitmap: u32,
        children: Vec<Slot<K, V>>,
    },
    /// Dense internal node of 32 slots with `None` holes, used once an
    /// indexed node's branching factor grows past the expand threshold.
    Array {
        count: usize,
        children: Vec<Slot<K, V>>,
    },
}

impl<K, V> Node<K, V> {
    /// Leaf-like nodes may replace a single-child internal node directly;
    /// internal nodes may not, since their routing depends on depth.
    const fn is_leaf_like(&self) -> bool {
        matches!(self, Self::Leaf { .. } | Self::Collision { .. })
    }
}

// =============================================================================
// Lookup Walk
// =============================================================================

/// Read-only descent resolving `key` (hash `hash`) under `root`.
///
/// Allocation-free: leaves match by key equality, collisions scan their
/// list, internal nodes descend by slot.
pub(crate) fn lookup<'a, K, V, Q>(
    root: &'a Slot<K, V>,
    hash: HashBits,
    key: &Q,
) -> Option<(&'a K, &'a V)>
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
{
    let mut node = root.as_deref()?;
    let mut shift = 0;
    loop {
        match node {
            Node::Leaf {
                hash: leaf_hash,
                key: leaf_key,
                value,
            } => {
                return if *leaf_hash == hash && leaf_key.borrow() == key {
                    Some((leaf_key, value))
                } else {
                    None
                };
            }
            Node::Collision {
                hash: collision_hash,
                entries,
            } => {
                return if *collision_hash == hash {
                    entries
                        .iter()
                        .find(|(entry_key, _)| entry_key.borrow() == key)
                        .map(|(entry_key, value)| (entry_key, value))
                } else {
                    None
                };
            }
            Node::Indexed { bitmap, children } => {
                let bit = to_bitmap(hash_fragment(shift, hash));
                if bitmap & bit == 0 {
                    return None;
                }
                node = children[from_bitmap(*bitmap, bit)].as_deref()?;
                shift += BITS_PER_LEVEL;
            }
            Node::Array { children, .. } => {
                node = children[hash_fragment(shift, hash)].as_deref()?;
                shift += BITS_PER_LEVEL;
            }
        }
    }
}

// =============================================================================
// Modify Engine
// =============================================================================

/// How a modify call changed the entry for its key.
#[derive(Debug)]
pub(crate) enum EntryChange<V> {
    /// Nothing changed (the updater declined on an absent key).
    Unchanged,
    /// A new entry was added.
    Inserted,
    /// An existing entry's value was replaced; carries the old value.
    Updated(V),
    /// An existing entry was deleted; carries the old value.
    Removed(V),
}

/// Applies `updater` to the entry for `key` (hash `hash`) under `slot`,
/// rewriting the path in place. The updater receives the current value if
/// one exists; returning `None` deletes the entry (or declines to insert).
///
/// The key arrives as a `Cow` so an insert of an owned key moves it into
/// the new entry instead of cloning a borrowed one.
pub(crate) fn modify_slot<K, V, Q, F>(
    slot: &mut Slot<K, V>,
    shift: u32,
    hash: HashBits,
    key: Cow<'_, Q>,
    updater: F,
) -> EntryChange<V>
where
    K: Borrow<Q> + Clone,
    V: Clone,
    Q: Eq + ToOwned<Owned = K> + ?Sized,
    F: FnOnce(Option<&V>) -> Option<V>,
{
    let Some(node) = slot.take() else {
        return match updater(None) {
            Some(value) => {
                *slot = Some(ReferenceCounter::new(Node::Leaf {
                    hash,
                    key: key.into_owned(),
                    value,
                }));
                EntryChange::Inserted
            }
            None => EntryChange::Unchanged,
        };
    };
    let (next, change) = modify_node(node, shift, hash, key, updater);
    *slot = next;
    change
}

/// Planned rewrite of a leaf or collision node, decided while the node is
/// borrowed and executed once the borrow is released.
enum Plan<K, V> {
    /// No effective change.
    Keep,
    /// Replace the matching leaf's value.
    SetLeaf { value: V, old: V },
    /// Delete the matching leaf.
    DropLeaf { old: V },
    /// Same hash, different key: combine into a collision node,
    /// new entry first.
    Collide {
        value: V,
        leaf_key: K,
        leaf_value: V,
    },
    /// Different hash: merge the node with a fresh leaf one level down.
    Merge { value: V, node_hash: HashBits },
    /// Replace the value of collision entry `index`.
    SetEntry { index: usize, value: V, old: V },
    /// Delete collision entry `index`.
    DropEntry { index: usize, old: V },
    /// Append a new entry to the collision list.
    PushEntry { value: V },
}

fn modify_node<K, V, Q, F>(
    node: NodeRef<K, V>,
    shift: u32,
    hash: HashBits,
    key: Cow<'_, Q>,
    updater: F,
) -> (Slot<K, V>, EntryChange<V>)
where
    K: Borrow<Q> + Clone,
    V: Clone,
    Q: Eq + ToOwned<Owned = K> + ?Sized,
    F: FnOnce(Option<&V>) -> Option<V>,
{
    if matches!(&*node, Node::Indexed { .. } | Node::Array { .. }) {
        return modify_internal(node, shift, hash, key, updater);
    }

    let plan = match &*node {
        Node::Leaf {
            hash: leaf_hash,
            key: leaf_key,
            value: leaf_value,
        } => {
            if *leaf_hash == hash && leaf_key.borrow() == &*key {
                let old = leaf_value.clone();
                match updater(Some(&old)) {
                    Some(value) => Plan::SetLeaf { value, old },
                    None => Plan::DropLeaf { old },
                }
            } else {
                match updater(None) {
                    Some(value) if *leaf_hash == hash => Plan::Collide {
                        value,
                        leaf_key: leaf_key.clone(),
                        leaf_value: leaf_value.clone(),
                    },
                    Some(value) => Plan::Merge {
                        value,
                        node_hash: *leaf_hash,
                    },
                    None => Plan::Keep,
                }
            }
        }
        Node::Collision {
            hash: collision_hash,
            entries,
        } => {
            if *collision_hash == hash {
                let found = entries
                    .iter()
                    .position(|(entry_key, _)| entry_key.borrow() == &*key);
                match found {
                    Some(index) => {
                        let old = entries[index].1.clone();
                        match updater(Some(&old)) {
                            Some(value) => Plan::SetEntry { index, value, old },
                            None => Plan::DropEntry { index, old },
                        }
                    }
                    None => match updater(None) {
                        Some(value) => Plan::PushEntry { value },
                        None => Plan::Keep,
                    },
                }
            } else {
                match updater(None) {
                    Some(value) => Plan::Merge {
                        value,
                        node_hash: *collision_hash,
                    },
                    None => Plan::Keep,
                }
            }
        }
        // Internal nodes were dispatched above.
        Node::Indexed { .. } | Node::Array { .. } => Plan::Keep,
    };

    execute_plan(node, plan, shift, hash, key)
}

/// Rewrites a leaf or collision node according to `plan`. Inserting plans
/// consume `key`; the others drop it.
fn execute_plan<K, V, Q>(
    mut node: NodeRef<K, V>,
    plan: Plan<K, V>,
    shift: u32,
    hash: HashBits,
    key: Cow<'_, Q>,
) -> (Slot<K, V>, EntryChange<V>)
where
    K: Borrow<Q> + Clone,
    V: Clone,
    Q: Eq + ToOwned<Owned = K> + ?Sized,
{
    match plan {
        Plan::Keep => (Some(node), EntryChange::Unchanged),
        Plan::SetLeaf { value, old } => {
            if let Node::Leaf {
                value: leaf_value, ..
            } = ReferenceCounter::make_mut(&mut node)
            {
                *leaf_value = value;
            }
            (Some(node), EntryChange::Updated(old))
        }
        Plan::DropLeaf { old } => (None, EntryChange::Removed(old)),
        Plan::Collide {
            value,
            leaf_key,
            leaf_value,
        } => {
            let entries: CollisionEntries<K, V> =
                smallvec![(key.into_owned(), value), (leaf_key, leaf_value)];
            let collision = ReferenceCounter::new(Node::Collision { hash, entries });
            (Some(collision), EntryChange::Inserted)
        }
        Plan::Merge { value, node_hash } => {
            let added = ReferenceCounter::new(Node::Leaf {
                hash,
                key: key.into_owned(),
                value,
            });
            let merged = merge_leaves(shift, node_hash, node, hash, added);
            (Some(merged), EntryChange::Inserted)
        }
        Plan::SetEntry { index, value, old } => {
            if let Node::Collision { entries, .. } = ReferenceCounter::make_mut(&mut node) {
                entries[index].1 = value;
            }
            (Some(node), EntryChange::Updated(old))
        }
        Plan::DropEntry { index, old } => {
            if let Node::Collision {
                hash: collision_hash,
                entries,
            } = ReferenceCounter::make_mut(&mut node)
            {
                entries.remove(index);
                // A single-entry collision list collapses to a bare leaf.
                if entries.len() == 1 {
                    let collision_hash = *collision_hash;
                    if let Some((remaining_key, remaining_value)) = entries.pop() {
                        let leaf = ReferenceCounter::new(Node::Leaf {
                            hash: collision_hash,
                            key: remaining_key,
                            value: remaining_value,
                        });
                        return (Some(leaf), EntryChange::Removed(old));
                    }
                }
            }
            (Some(node), EntryChange::Removed(old))
        }
        Plan::PushEntry { value } => {
            if let Node::Collision { entries, .. } = ReferenceCounter::make_mut(&mut node) {
                entries.push((key.into_owned(), value));
            }
            (Some(node), EntryChange::Inserted)
        }
    }
}

/// Rewrites an indexed or array node by recursing into the child slot for
/// the key's fragment, then applying the node-shape transitions: clearing
/// or setting bitmap bits, single-child collapse, expand and pack.
fn modify_internal<K, V, Q, F>(
    mut node: NodeRef<K, V>,
    shift: u32,
    hash: HashBits,
    key: Cow<'_, Q>,
    updater: F,
) -> (Slot<K, V>, EntryChange<V>)
where
    K: Borrow<Q> + Clone,
    V: Clone,
    Q: Eq + ToOwned<Owned = K> + ?Sized,
    F: FnOnce(Option<&V>) -> Option<V>,
{
    let fragment = hash_fragment(shift, hash);
    let inner = ReferenceCounter::make_mut(&mut node);
    match inner {
        Node::Indexed { bitmap, children } => {
            let bit = to_bitmap(fragment);
            let index = from_bitmap(*bitmap, bit);
            if *bitmap & bit == 0 {
                // No child on this fragment yet.
                let mut slot = None;
                let change = modify_slot(&mut slot, shift + BITS_PER_LEVEL, hash, key, updater);
                if let Some(child) = slot {
                    if children.len() >= MAX_INDEXED_CHILDREN {
                        let expanded = expand(fragment, child, *bitmap, children);
                        return (Some(ReferenceCounter::new(expanded)), change);
                    }
                    *bitmap |= bit;
                    children.insert(index, Some(child));
                }
                (Some(node), change)
            } else {
                let change =
                    modify_slot(&mut children[index], shift + BITS_PER_LEVEL, hash, key, updater);
                if children[index].is_none() {
                    // Child emptied out.
                    *bitmap &= !bit;
                    children.remove(index);
                    if children.is_empty() {
                        return (None, change);
                    }
                    let collapse = children.len() == 1
                        && children[0]
                            .as_deref()
                            .is_some_and(|only| only.is_leaf_like());
                    if collapse {
                        return (children.pop().flatten(), change);
                    }
                }
                (Some(node), change)
            }
        }
        Node::Array { count, children } => {
            let was_present = children[fragment].is_some();
            let change =
                modify_slot(&mut children[fragment], shift + BITS_PER_LEVEL, hash, key, updater);
            let is_present = children[fragment].is_some();
            if is_present && !was_present {
                *count += 1;
            } else if was_present && !is_present {
                *count -= 1;
                if *count <= MIN_ARRAY_CHILDREN {
                    let packed = pack(children);
                    return (Some(ReferenceCounter::new(packed)), change);
                }
            }
            (Some(node), change)
        }
        // Leaf-like nodes never reach here; modify_node dispatches them.
        Node::Leaf { .. } | Node::Collision { .. } => (Some(node), EntryChange::Unchanged),
    }
}

/// Merges two nodes whose hashes differ, descending until a level where
/// their fragments part ways. Children sit in ascending fragment order.
fn merge_leaves<K, V>(
    shift: u32,
    existing_hash: HashBits,
    existing: NodeRef<K, V>,
    added_hash: HashBits,
    added: NodeRef<K, V>,
) -> NodeRef<K, V> {
    debug_assert_ne!(existing_hash, added_hash);
    let existing_fragment = hash_fragment(shift, existing_hash);
    let added_fragment = hash_fragment(shift, added_hash);

    let (bitmap, children) = if existing_fragment == added_fragment {
        // Fragments coincide at this level; resolve the tie one deeper.
        let child = merge_leaves(
            shift + BITS_PER_LEVEL,
            existing_hash,
            existing,
            added_hash,
            added,
        );
        (to_bitmap(existing_fragment), vec![Some(child)])
    } else {
        let bitmap = to_bitmap(existing_fragment) | to_bitmap(added_fragment);
        let children = if existing_fragment < added_fragment {
            vec![Some(existing), Some(added)]
        } else {
            vec![Some(added), Some(existing)]
        };
        (bitmap, children)
    };
    ReferenceCounter::new(Node::Indexed { bitmap, children })
}

/// Converts an indexed node into an array node, placing each existing
/// child at its true fragment slot and adding `child` at `fragment`.
fn expand<K, V>(
    fragment: usize,
    child: NodeRef<K, V>,
    bitmap: u32,
    children: &mut Vec<Slot<K, V>>,
) -> Node<K, V> {
    let mut slots: Vec<Slot<K, V>> = vec![None; BUCKET_SIZE];
    let mut count = 0;
    let mut source = children.drain(..);
    for (index, slot) in slots.iter_mut().enumerate() {
        if bitmap & to_bitmap(index) != 0 {
            *slot = source.next().flatten();
            count += 1;
        }
    }
    drop(source);
    slots[fragment] = Some(child);
    Node::Array {
        count: count + 1,
        children: slots,
    }
}

/// Converts an array node back into an indexed node, keeping the live
/// slots in order and rebuilding the bitmap from their slot indices.
fn pack<K, V>(children: &mut [Slot<K, V>]) -> Node<K, V> {
    let mut bitmap = 0;
    let mut packed = Vec::new();
    for (index, slot) in children.iter_mut().enumerate() {
        if let Some(child) = slot.take() {
            bitmap |= to_bitmap(index);
            packed.push(Some(child));
        }
    }
    Node::Indexed {
        bitmap,
        children: packed,
    }
}

// =============================================================================
// Tests
// =============================================================================
