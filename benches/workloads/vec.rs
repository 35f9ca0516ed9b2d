use criterion::{black_box, BenchmarkId, Criterion};
use strata::{HybridVec, MultipoolAllocator, SystemHeap};

pub fn run(c: &mut Criterion) {
    bench_small_push(c);
    bench_spill(c);
}

fn bench_small_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("vec_push_inline");
    let heap = SystemHeap::new();

    group.bench_function("hybrid_vec_n8", |b| {
        b.iter(|| {
            let mut v: HybridVec<'_, u64, 8, _> = HybridVec::new_in(&heap);
            for i in 0..8 {
                v.push(black_box(i));
            }
            black_box(v.len());
        })
    });

    group.bench_function("std_vec", |b| {
        b.iter(|| {
            let mut v = Vec::new();
            for i in 0..8u64 {
                v.push(black_box(i));
            }
            black_box(v.len());
        })
    });

    group.finish();
}

fn bench_spill(c: &mut Criterion) {
    let mut group = c.benchmark_group("vec_push_spill");
    let heap = SystemHeap::new();
    // A single reserve of 79 u64 slots takes one 632-byte block.
    let pool = MultipoolAllocator::new(4, 79 * 8, 1);

    for len in [16usize, 256] {
        group.bench_with_input(BenchmarkId::new("hybrid_vec_system_heap", len), &len, |b, &len| {
            b.iter(|| {
                let mut v: HybridVec<'_, u64, 4, _> = HybridVec::new_in(&heap);
                v.extend((0..len as u64).map(black_box));
                black_box(v.len());
            })
        });
        group.bench_with_input(BenchmarkId::new("std_vec", len), &len, |b, &len| {
            b.iter(|| {
                let v: Vec<u64> = (0..len as u64).map(black_box).collect();
                black_box(v.len());
            })
        });
    }

    group.bench_function("hybrid_vec_multipool_79", |b| {
        b.iter(|| {
            let mut v: HybridVec<'_, u64, 4, _> = HybridVec::new_in(&pool);
            v.reserve(79);
            for i in 0..79 {
                v.push(black_box(i));
            }
            black_box(v.len());
        })
    });

    group.finish();
}
