use criterion::{black_box, Criterion, Throughput};
use std::collections::BTreeMap;
use strata::{node_layout, AvlMap, MultipoolAllocator, SystemHeap};

const KEYS: u64 = 4096;

fn shuffled_keys() -> Vec<u64> {
    // Multiplicative hashing gives a fixed permutation of 0..KEYS.
    (0..KEYS).map(|i| (i * 2_654_435_761) % KEYS).collect()
}

pub fn run(c: &mut Criterion) {
    bench_insert(c);
    bench_lookup(c);
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_insert_4k");
    group.throughput(Throughput::Elements(KEYS));
    let keys = shuffled_keys();
    let pool = MultipoolAllocator::new(KEYS as usize, node_layout::<u64, u64>().size(), 1);
    let heap = SystemHeap::new();

    group.bench_function("avl_multipool", |b| {
        b.iter(|| {
            let mut map = AvlMap::new_in(&pool);
            for &k in &keys {
                map.insert(k, k);
            }
            black_box(map.height());
        })
    });

    group.bench_function("avl_system_heap", |b| {
        b.iter(|| {
            let mut map = AvlMap::new_in(&heap);
            for &k in &keys {
                map.insert(k, k);
            }
            black_box(map.height());
        })
    });

    group.bench_function("std_btree_map", |b| {
        b.iter(|| {
            let mut map = BTreeMap::new();
            for &k in &keys {
                map.insert(k, k);
            }
            black_box(map.len());
        })
    });

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_lookup_4k");
    group.throughput(Throughput::Elements(KEYS));
    let keys = shuffled_keys();
    let heap = SystemHeap::new();
    let mut avl = AvlMap::new_in(&heap);
    avl.extend(keys.iter().map(|&k| (k, k)));
    let std_map: BTreeMap<u64, u64> = keys.iter().map(|&k| (k, k)).collect();

    group.bench_function("avl", |b| {
        b.iter(|| keys.iter().filter_map(|k| avl.get(k)).sum::<u64>())
    });
    group.bench_function("std_btree_map", |b| {
        b.iter(|| keys.iter().filter_map(|k| std_map.get(k)).sum::<u64>())
    });

    group.finish();
}
