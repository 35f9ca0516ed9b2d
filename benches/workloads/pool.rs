use criterion::{black_box, Criterion, Throughput};
use std::alloc::Layout;
use strata::{MultipoolAllocator, RawAlloc, SystemHeap};

const BLOCKS: usize = 1024;

pub fn run(c: &mut Criterion) {
    bench_alloc_free(c);
    bench_mixed_depths(c);
}

fn churn<A: RawAlloc>(alloc: &A, layout: Layout, slots: &mut Vec<std::ptr::NonNull<u8>>) {
    for _ in 0..BLOCKS {
        if let Ok(ptr) = alloc.allocate(layout) {
            slots.push(ptr);
        }
    }
    for ptr in slots.drain(..).rev() {
        unsafe { alloc.deallocate(ptr, layout) };
    }
}

fn bench_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_alloc_free_64b");
    group.throughput(Throughput::Elements(BLOCKS as u64));
    let layout = Layout::from_size_align(64, 8).unwrap();
    let mut slots = Vec::with_capacity(BLOCKS);

    let pool = MultipoolAllocator::new(BLOCKS, 64, 1);
    group.bench_function("multipool", |b| b.iter(|| churn(black_box(&pool), layout, &mut slots)));

    let heap = SystemHeap::new();
    group.bench_function("system_heap", |b| b.iter(|| churn(black_box(&heap), layout, &mut slots)));

    group.finish();
}

fn bench_mixed_depths(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_mixed_depths");
    group.throughput(Throughput::Elements(4 * 256));
    let pool = MultipoolAllocator::new(256, 512, 4);
    let layouts: Vec<_> = (0..4)
        .map(|depth| Layout::from_size_align(512 >> depth, 16).unwrap())
        .collect();

    group.bench_function("multipool", |b| {
        b.iter(|| {
            let mut live = Vec::with_capacity(4 * 256);
            for i in 0..4 * 256 {
                let layout = layouts[i % 4];
                if let Ok(ptr) = pool.allocate(layout) {
                    live.push((ptr, layout));
                }
            }
            for (ptr, layout) in live {
                unsafe { pool.deallocate(ptr, layout) };
            }
        })
    });

    group.finish();
}
