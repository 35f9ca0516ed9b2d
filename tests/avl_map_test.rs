use std::alloc::Layout;
use strata::{node_layout, AllocError, AvlMap, MultipoolAllocator, RawAlloc, SystemHeap};

#[test]
fn test_balanced_after_ascending_inserts() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    for key in [10, 20, 30] {
        map.insert(key, key.to_string());
    }
    assert_eq!(map.height(), 1);
    assert!(map.is_valid());
    assert_eq!(map.keys().copied().collect::<Vec<_>>(), [10, 20, 30]);
}

#[test]
fn test_map_backed_by_multipool() {
    let node = node_layout::<u64, u64>();
    let pool = MultipoolAllocator::new(64, node.size(), 1);
    let mut map = AvlMap::new_in(&pool);
    for key in 0..64u64 {
        map.insert(key, key * key);
    }
    assert_eq!(pool.free_blocks(0), 0);
    assert_eq!(map.try_insert(64, 0).unwrap_err(), AllocError::Exhausted { size: node.size() });

    for key in (0..64).step_by(2) {
        assert_eq!(map.remove(&key), Some(key * key));
    }
    assert!(map.is_valid());
    assert_eq!(pool.allocation_count(), 32);
    drop(map);
    assert_eq!(pool.memory_usage(), 0);
}

#[test]
fn test_map_and_vector_share_allocator() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    let mut log: strata::HybridVec<'_, u32, 0, _> = strata::HybridVec::new_in(&heap);
    for key in [3u32, 1, 2] {
        map.insert(key, ());
        log.push(key);
    }
    let nodes = 3 * node_layout::<u32, ()>().size();
    let vector = log.capacity() * Layout::new::<u32>().size();
    assert_eq!(heap.memory_usage(), nodes + vector);
}

#[test]
fn test_cursor_round_trip() {
    let heap = SystemHeap::new();
    let mut map = AvlMap::new_in(&heap);
    map.extend((1..=5).map(|k| (k, k * 100)));

    let mut cursor = map.cursor_front();
    let mut seen = Vec::new();
    while let Some(value) = cursor.value() {
        seen.push(*value);
        cursor.move_next();
    }
    assert_eq!(seen, [100, 200, 300, 400, 500]);
    cursor.move_prev();
    assert_eq!(cursor.key(), Some(&5));
}
