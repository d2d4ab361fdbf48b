//! Integration tests for `HamtMap`.

use std::cell::Cell;
use std::hash::{BuildHasher, Hash, Hasher};
use std::rc::Rc;

use hamt::HamtMap;
use rstest::rstest;

/// Hashes every key to zero, forcing all entries into one collision
/// bucket.
#[derive(Clone, Default)]
struct ConstantState;

struct ConstantHasher;

impl Hasher for ConstantHasher {
    fn finish(&self) -> u64 {
        0
    }

    fn write(&mut self, _bytes: &[u8]) {}
}

impl BuildHasher for ConstantState {
    type Hasher = ConstantHasher;

    fn build_hasher(&self) -> ConstantHasher {
        ConstantHasher
    }
}

// =============================================================================
// Basic lifecycle
// =============================================================================

#[rstest]
fn test_empty_insert_get_remove_roundtrip() {
    let empty: HamtMap<String, i32> = HamtMap::new();
    assert!(empty.is_empty());

    let one = empty.insert("answer".to_string(), 42);
    assert_eq!(one.len(), 1);
    assert_eq!(one.get("answer"), Some(&42));

    let replaced = one.insert("answer".to_string(), 43);
    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced.get("answer"), Some(&43));
    assert_eq!(one.get("answer"), Some(&42));

    let back = replaced.remove("answer");
    assert!(back.is_empty());
    assert_eq!(back.get("answer"), None);
}

#[rstest]
fn test_fifty_seven_key_sweep_preserves_versions() {
    let mut versions: Vec<HamtMap<i32, i32>> = vec![HamtMap::new()];
    for index in 0..57 {
        let next = versions
            .last()
            .map(|map| map.insert(index, index * 10))
            .unwrap_or_default();
        versions.push(next);
    }

    // Every version still holds exactly the entries it held when made.
    for (length, version) in versions.iter().enumerate() {
        assert_eq!(version.len(), length);
        for index in 0..57 {
            let expected = if (index as usize) < length {
                Some(index * 10)
            } else {
                None
            };
            assert_eq!(version.get(&index).copied(), expected);
        }
    }
}

#[rstest]
fn test_fifty_seven_key_removal_sweep_checks_every_survivor() {
    let mut map: HamtMap<i32, i32> = (0..57).map(|key| (key, key * 10)).collect();

    // Stride 11 is coprime to 57, so the removal order walks every key
    // while staying unrelated to insertion order.
    let order: Vec<i32> = (0..57).map(|step| (step * 11) % 57).collect();
    let mut gone = std::collections::HashSet::new();
    for key in order {
        map = map.remove(&key);
        gone.insert(key);

        assert_eq!(map.len(), 57 - gone.len());
        for candidate in 0..57 {
            if gone.contains(&candidate) {
                assert_eq!(map.get(&candidate), None);
                assert!(!map.contains_key(&candidate));
            } else {
                assert_eq!(map.get(&candidate), Some(&(candidate * 10)));
            }
        }
    }
    assert!(map.is_empty());
}

#[rstest]
fn test_get_or_and_get_key_value() {
    let map = HamtMap::new().insert("present".to_string(), 1);

    assert_eq!(map.get_or("present", &0), &1);
    assert_eq!(map.get_or("absent", &0), &0);

    let (key, value) = map.get_key_value("present").unwrap();
    assert_eq!(key, "present");
    assert_eq!(value, &1);
    assert_eq!(map.get_key_value("absent"), None);
}

#[rstest]
fn test_borrowed_key_lookup() {
    let map = HamtMap::new()
        .insert("alpha".to_string(), 1)
        .insert("beta".to_string(), 2);

    // &str queries against String keys.
    assert!(map.contains_key("alpha"));
    assert_eq!(map.get("beta"), Some(&2));
    let trimmed = map.remove("alpha");
    assert_eq!(trimmed.len(), 1);
}

#[rstest]
fn test_optional_values_distinguish_absent_from_none() {
    let map: HamtMap<String, Option<i32>> = HamtMap::new()
        .insert("set".to_string(), Some(1))
        .insert("cleared".to_string(), None);

    assert_eq!(map.get("set"), Some(&Some(1)));
    assert_eq!(map.get("cleared"), Some(&None));
    assert_eq!(map.get("absent"), None);
    assert!(map.contains_key("cleared"));
    assert!(!map.contains_key("absent"));
}

// =============================================================================
// Key ownership
// =============================================================================

/// A key that counts how often it is cloned. Equality and hashing go by
/// `id` alone.
#[derive(Debug)]
struct TrackedKey {
    id: u32,
    clones: Rc<Cell<usize>>,
}

impl Clone for TrackedKey {
    fn clone(&self) -> Self {
        self.clones.set(self.clones.get() + 1);
        Self {
            id: self.id,
            clones: Rc::clone(&self.clones),
        }
    }
}

impl PartialEq for TrackedKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TrackedKey {}

impl Hash for TrackedKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[rstest]
fn test_insert_moves_owned_key_without_cloning() {
    // Explicit distinct hashes keep the paths collision-free, so the only
    // way a key could be cloned is the insert machinery itself.
    let clones = Rc::new(Cell::new(0));

    let mut map: HamtMap<TrackedKey, u32> = HamtMap::new();
    for id in 0..20 {
        let key = TrackedKey {
            id,
            clones: Rc::clone(&clones),
        };
        map = map.insert_hash(id, key, id);
    }
    assert_eq!(clones.get(), 0, "persistent inserts should move their keys");
    assert_eq!(map.len(), 20);

    let mut transient = map.transient();
    for id in 20..40 {
        let key = TrackedKey {
            id,
            clones: Rc::clone(&clones),
        };
        transient.insert_hash(id, key, id);
    }
    assert_eq!(clones.get(), 0, "transient inserts should move their keys");
    assert_eq!(transient.persistent().len(), 40);
}

// =============================================================================
// Collisions
// =============================================================================

#[rstest]
fn test_full_collision_bucket() {
    let mut map: HamtMap<String, i32, ConstantState> = HamtMap::with_hasher(ConstantState);
    for index in 0..10 {
        map = map.insert(format!("key-{index}"), index);
    }

    assert_eq!(map.len(), 10);
    for index in 0..10 {
        assert_eq!(map.get(format!("key-{index}").as_str()), Some(&index));
    }
    assert_eq!(map.get("key-10"), None);

    // Peel the bucket down entry by entry, through leaf, to empty.
    for index in 0..10 {
        map = map.remove(format!("key-{index}").as_str());
        assert_eq!(map.len(), (9 - index) as usize);
        assert_eq!(map.get(format!("key-{index}").as_str()), None);
        for survivor in (index + 1)..10 {
            assert_eq!(map.get(format!("key-{survivor}").as_str()), Some(&survivor));
        }
    }
    assert!(map.is_empty());
}

#[rstest]
fn test_collision_update_replaces_single_entry() {
    let map: HamtMap<String, i32, ConstantState> = HamtMap::with_hasher(ConstantState)
        .insert("a".to_string(), 1)
        .insert("b".to_string(), 2)
        .insert("a".to_string(), 10);

    assert_eq!(map.len(), 2);
    assert_eq!(map.get("a"), Some(&10));
    assert_eq!(map.get("b"), Some(&2));
}

#[rstest]
fn test_collision_bucket_is_iterable() {
    let map: HamtMap<String, i32, ConstantState> = HamtMap::with_hasher(ConstantState)
        .insert("a".to_string(), 1)
        .insert("b".to_string(), 2)
        .insert("c".to_string(), 3);

    let sum: i32 = map.values().sum();
    assert_eq!(sum, 6);
    assert_eq!(map.iter().count(), 3);
}

// =============================================================================
// Node widening and narrowing (explicit hashes)
// =============================================================================

#[rstest]
fn test_growth_past_indexed_capacity() {
    // 20 distinct first-level fragments force the root past the sparse
    // node's 16-child capacity.
    let mut map: HamtMap<u32, u32> = HamtMap::new();
    for fragment in 0..20_u32 {
        map = map.insert_hash(fragment, fragment, fragment * 100);
    }

    assert_eq!(map.len(), 20);
    for fragment in 0..20_u32 {
        assert_eq!(map.get_hash(fragment, &fragment), Some(&(fragment * 100)));
    }
}

#[rstest]
fn test_shrink_back_below_dense_threshold() {
    let mut map: HamtMap<u32, u32> = HamtMap::new();
    for fragment in 0..20_u32 {
        map = map.insert_hash(fragment, fragment, fragment);
    }
    // Remove until only 6 children remain, crossing the dense node's
    // pack threshold on the way down.
    for fragment in 6..20_u32 {
        map = map.remove_hash(fragment, &fragment);
    }

    assert_eq!(map.len(), 6);
    for fragment in 0..6_u32 {
        assert_eq!(map.get_hash(fragment, &fragment), Some(&fragment));
    }
    for fragment in 6..20_u32 {
        assert_eq!(map.get_hash(fragment, &fragment), None);
        assert!(!map.contains_key_hash(fragment, &fragment));
    }
}

#[rstest]
fn test_deep_paths_share_fragments() {
    // Hashes equal in the low 10 bits diverge two levels down.
    let mut map: HamtMap<u32, u32> = HamtMap::new();
    for level3 in 0..4_u32 {
        let hash = level3 << 10 | 0b00001_00001;
        map = map.insert_hash(hash, level3, level3);
    }

    assert_eq!(map.len(), 4);
    for level3 in 0..4_u32 {
        let hash = level3 << 10 | 0b00001_00001;
        assert_eq!(map.get_hash(hash, &level3), Some(&level3));
    }
}

// =============================================================================
// Conditional updates
// =============================================================================

#[rstest]
fn test_update_with_counter_pattern() {
    let mut map: HamtMap<String, i32> = HamtMap::new();
    for word in ["apple", "banana", "apple", "cherry", "apple", "banana"] {
        map = map.update_with(word, |count| Some(count.copied().unwrap_or(0) + 1));
    }

    assert_eq!(map.get("apple"), Some(&3));
    assert_eq!(map.get("banana"), Some(&2));
    assert_eq!(map.get("cherry"), Some(&1));
    assert_eq!(map.len(), 3);
}

#[rstest]
fn test_update_with_remove_leaves_original_untouched() {
    let map = HamtMap::new()
        .insert("a".to_string(), 1)
        .insert("b".to_string(), 2);

    let without = map.update_with("a", |_| None);
    assert_eq!(without.len(), 1);
    assert_eq!(map.len(), 2);
    assert_eq!(map.get("a"), Some(&1));
}

// =============================================================================
// Traversal
// =============================================================================

#[rstest]
fn test_iteration_covers_large_maps() {
    let map: HamtMap<i32, i32> = (0..500).map(|index| (index, index)).collect();

    let mut keys: Vec<i32> = map.keys().copied().collect();
    keys.sort_unstable();
    assert_eq!(keys, (0..500).collect::<Vec<_>>());

    let folded = map.fold(0_i64, |total, _, value| total + i64::from(*value));
    assert_eq!(folded, (0..500_i64).sum::<i64>());

    let counted = map.fold(0, |count, _, _| count + 1);
    assert_eq!(counted, map.len());
}

#[rstest]
fn test_into_iterator_for_loops() {
    let map: HamtMap<i32, i32> = (0..20).map(|index| (index, index * 3)).collect();

    let mut borrowed_total = 0;
    for (_, value) in &map {
        borrowed_total += value;
    }

    let mut owned_total = 0;
    for (_, value) in map {
        owned_total += value;
    }
    assert_eq!(borrowed_total, owned_total);
    assert_eq!(owned_total, (0..20).map(|index| index * 3).sum::<i32>());
}

#[rstest]
fn test_exact_size_iterator_counts_down() {
    let map: HamtMap<i32, i32> = (0..10).map(|index| (index, index)).collect();
    let mut iterator = map.iter();
    assert_eq!(iterator.len(), 10);
    iterator.next();
    iterator.next();
    assert_eq!(iterator.len(), 8);
    assert_eq!(iterator.size_hint(), (8, Some(8)));
}

// =============================================================================
// Structural sharing
// =============================================================================

#[rstest]
fn test_insert_heavy_history_remains_consistent() {
    let base: HamtMap<i32, i32> = (0..100).map(|index| (index, index)).collect();
    let with_extra = base.insert(1000, 1000);
    let with_removal = base.remove(&50);
    let with_update = base.update_with(&50, |value| value.map(|v| v + 1));

    assert_eq!(base.len(), 100);
    assert_eq!(with_extra.len(), 101);
    assert_eq!(with_removal.len(), 99);
    assert_eq!(with_update.get(&50), Some(&51));
    assert_eq!(base.get(&50), Some(&50));
    assert_eq!(base.get(&1000), None);
}

#[rstest]
fn test_equality_by_contents() {
    let forwards: HamtMap<i32, i32> = (0..50).map(|index| (index, index)).collect();
    let backwards: HamtMap<i32, i32> = (0..50).rev().map(|index| (index, index)).collect();

    assert_eq!(forwards, backwards);
    assert_ne!(forwards, backwards.remove(&0));
}
