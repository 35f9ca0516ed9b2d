use super::*;
use crate::alloc::{MultipoolAllocator, SystemHeap};
use std::rc::Rc;

fn root_key<K: Copy, V, A: RawAlloc + ?Sized, C>(map: &AvlMap<'_, K, V, A, C>) -> Option<K> {
    // SAFETY: the root is a live node of `map`.
    map.root.map(|root| unsafe { (*root.as_ptr()).key })
}

fn child_keys<K: Copy, V, A: RawAlloc + ?Sized, C>(
    map: &AvlMap<'_, K, V, A, C>,
) -> (Option<K>, Option<K>) {
    // SAFETY: nodes reachable from the root are live.
    unsafe {
        let Some(root) = map.root else {
            return (None, None);
        };
        let r = &*root.as_ptr();
        (
            r.left.map(|n| (*n.as_ptr()).key),
            r.right.map(|n| (*n.as_ptr()).key),
        )
    }
}

#[test]
fn test_ascending_inserts_rotate_left() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    map.insert(10, "a");
    map.insert(20, "b");
    map.insert(30, "c");

    assert_eq!(root_key(&map), Some(20));
    assert_eq!(child_keys(&map), (Some(10), Some(30)));
    assert_eq!(map.height(), 1);
    assert!(map.is_valid());
}

#[test]
fn test_double_rotations() {
    let heap = SystemHeap::new();

    let mut lr = AvlMap::new_in(&heap);
    lr.extend([(30, ()), (10, ()), (20, ())]);
    assert_eq!(root_key(&lr), Some(20));
    assert_eq!(child_keys(&lr), (Some(10), Some(30)));

    let mut rl = AvlMap::new_in(&heap);
    rl.extend([(10, ()), (30, ()), (20, ())]);
    assert_eq!(root_key(&rl), Some(20));
    assert_eq!(child_keys(&rl), (Some(10), Some(30)));
    assert!(lr.is_valid() && rl.is_valid());
}

#[test]
fn test_empty_map() {
    let heap = SystemHeap::new();
    let map: AvlMap<'_, i32, i32, _> = AvlMap::new_in(&heap);
    assert!(map.is_empty());
    assert_eq!(map.height(), -1);
    assert!(map.find(&1).is_end());
    assert_eq!(map.first(), None);
    assert_eq!(map.iter().next(), None);
    assert!(map.is_valid());
}

#[test]
fn test_duplicate_insert_keeps_first_value() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    let (value, inserted) = map.insert(1, "first");
    assert!(inserted);
    assert_eq!(*value, "first");

    let (value, inserted) = map.insert(1, "second");
    assert!(!inserted);
    assert_eq!(*value, "first");
    assert_eq!(map.len(), 1);
    assert_eq!(heap.allocation_count(), 1);
}

#[test]
fn test_emplace_builds_value_only_when_absent() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    let mut calls = 0;
    map.emplace(7, || {
        calls += 1;
        String::from("seven")
    });
    map.emplace(7, || {
        calls += 1;
        String::from("again")
    });
    assert_eq!(calls, 1);
    assert_eq!(map.get(&7).map(String::as_str), Some("seven"));
}

#[test]
fn test_returned_reference_updates_entry() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    let (value, _) = map.insert("hits", 0);
    *value += 5;
    *map.get_mut(&"hits").unwrap() += 1;
    assert_eq!(map.get(&"hits"), Some(&6));
}

#[test]
fn test_iteration_is_sorted_both_ways() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    for key in [50, 20, 80, 10, 30, 70, 90, 60, 40] {
        map.insert(key, key * 2);
    }
    let forward: Vec<_> = map.keys().copied().collect();
    assert_eq!(forward, [10, 20, 30, 40, 50, 60, 70, 80, 90]);
    let backward: Vec<_> = map.values().rev().copied().collect();
    assert_eq!(backward, [180, 160, 140, 120, 100, 80, 60, 40, 20]);

    let mut iter = map.iter();
    assert_eq!(iter.next(), Some((&10, &20)));
    assert_eq!(iter.next_back(), Some((&90, &180)));
    assert_eq!(iter.len(), 7);
}

#[test]
fn test_iter_mut_edits_in_place() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    map.extend((0..8).map(|k| (k, k)));
    for (key, value) in &mut map {
        *value += key * 10;
    }
    assert_eq!(map.get(&3), Some(&33));
}

#[test]
fn test_cursor_wraps_through_end() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    map.extend([(2, 'b'), (1, 'a'), (3, 'c')]);

    let mut cursor = map.find(&3);
    assert_eq!(cursor.value(), Some(&'c'));
    cursor.move_next();
    assert!(cursor.is_end());
    cursor.move_next();
    assert_eq!(cursor.key(), Some(&1));
    cursor.move_prev();
    assert!(cursor.is_end());
    cursor.move_prev();
    assert_eq!(cursor.key(), Some(&3));
    cursor.move_prev();
    assert_eq!(cursor.key(), Some(&2));
    assert_eq!(cursor, map.find(&2));
}

#[test]
fn test_missing_key_finds_end() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    map.insert(1, ());
    assert!(map.find(&2).is_end());
    assert!(!map.contains_key(&2));
    assert!(map.contains_key(&1));
}

#[test]
fn test_custom_comparator_reverses_order() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::with_comparator_in(|a: &i32, b: &i32| b.cmp(a), &heap);
    map.extend([(1, ()), (3, ()), (2, ())]);
    let keys: Vec<_> = map.keys().copied().collect();
    assert_eq!(keys, [3, 2, 1]);
    assert_eq!(map.first(), Some((&3, &())));
    assert!(map.is_valid());
}

#[test]
fn test_remove_leaf_inner_and_root() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    map.extend((1..=15).map(|k| (k, k.to_string())));

    assert_eq!(map.remove(&1).as_deref(), Some("1"));
    assert!(map.is_valid());
    assert_eq!(map.remove(&12).as_deref(), Some("12"));
    assert!(map.is_valid());
    let root = root_key(&map).unwrap();
    assert_eq!(map.remove_entry(&root).map(|(k, _)| k), Some(root));
    assert!(map.is_valid());
    assert_eq!(map.remove(&100), None);
    assert_eq!(map.len(), 12);
    assert_eq!(heap.allocation_count(), 12);
}

#[test]
fn test_removal_keeps_other_nodes_in_place() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    map.extend((0..32).map(|k| (k, k)));
    let before: Vec<*const i32> = map.values().map(|v| v as *const i32).collect();

    map.remove(&16);
    let after: Vec<*const i32> = map.values().map(|v| v as *const i32).collect();
    let expected: Vec<_> = before
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != 16)
        .map(|(_, &p)| p)
        .collect();
    assert_eq!(after, expected);
}

#[test]
fn test_pop_first_and_last() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    map.extend([(5, ()), (1, ()), (9, ())]);
    assert_eq!(map.pop_first(), Some((1, ())));
    assert_eq!(map.pop_last(), Some((9, ())));
    assert_eq!(map.pop_last(), Some((5, ())));
    assert_eq!(map.pop_first(), None);
    assert_eq!(heap.memory_usage(), 0);
}

#[test]
fn test_height_stays_logarithmic() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    map.extend((0..1023).map(|k| (k, ())));
    // Perfect tree for 2^10 - 1 sequential keys.
    assert_eq!(map.height(), 9);
    assert!(map.is_valid());
}

#[test]
fn test_nodes_from_multipool() {
    let block = node_layout::<i32, i32>().size();
    let pool = MultipoolAllocator::new(3, block, 1);
    let mut map = AvlMap::new_in(&pool);
    map.extend([(1, 1), (2, 2), (3, 3)]);
    assert_eq!(pool.free_blocks(0), 0);

    assert_eq!(map.try_insert(4, 4).err(), Some(AllocError::Exhausted { size: block }));
    assert_eq!(map.len(), 3);
    assert!(map.is_valid());

    map.remove(&2);
    assert_eq!(pool.free_blocks(0), 1);
    assert!(map.try_insert(4, 4).is_ok());
}

#[test]
#[should_panic(expected = "bad allocation")]
fn test_insert_panics_when_pool_is_full() {
    let block = node_layout::<u8, u8>().size();
    let pool = MultipoolAllocator::new(1, block, 1);
    let mut map = AvlMap::new_in(&pool);
    map.insert(1u8, 1u8);
    map.insert(2u8, 2u8);
}

#[test]
fn test_clear_and_drop_release_everything() {
    let heap = SystemHeap::new();
    let tracker = Rc::new(());
    {
        let mut map = AvlMap::new_in(&heap);
        for k in 0..20 {
            map.insert(k, Rc::clone(&tracker));
        }
        assert_eq!(Rc::strong_count(&tracker), 21);
        map.clear();
        assert_eq!(Rc::strong_count(&tracker), 1);
        assert_eq!(heap.allocation_count(), 0);
        map.insert(1, Rc::clone(&tracker));
    }
    assert_eq!(Rc::strong_count(&tracker), 1);
    assert_eq!(heap.memory_usage(), 0);
}

#[test]
fn test_into_iter_drains_in_order() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    map.extend([(3, 'c'), (1, 'a'), (2, 'b'), (4, 'd')]);
    let mut iter = map.into_iter();
    assert_eq!(iter.next(), Some((1, 'a')));
    assert_eq!(iter.next_back(), Some((4, 'd')));
    drop(iter);
    assert_eq!(heap.allocation_count(), 0);
}

#[test]
fn test_debug_and_serialize() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    map.extend([("b", 2), ("a", 1)]);
    assert_eq!(format!("{map:?}"), r#"{"a": 1, "b": 2}"#);
    assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"a":1,"b":2}"#);
}
