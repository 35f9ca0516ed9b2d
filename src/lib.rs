//! # `strata` - Allocator-Aware Containers
//!
//! A multi-level pool allocator and two containers that borrow an allocator
//! instead of owning one.
//!
//! ## Key Features
//!
//! - **Multipool allocator**: `pool_depth` free-list pools carved from one
//!   buffer, each level holding twice as many blocks of half the size.
//!   Allocation and deallocation are O(1).
//! - **Hybrid vector**: `HybridVec<T, N>` keeps up to `N` elements inline and
//!   moves to allocator memory beyond that.
//! - **AVL map**: `AvlMap<K, V>` allocates one fixed-size node per entry, the
//!   shape a multipool serves best.
//! - **Fallible growth**: every container operation that allocates has a
//!   panicking form and a `try_` form returning [`AllocError`].
//!
//! ## Architecture
//!
//! ### Core Abstractions
//!
//! 1. **Raw allocation** ([`RawAlloc`]):
//!    - `&self` methods, so one allocator backs many containers at once
//!    - single-threaded; bookkeeping lives in `Cell`s
//!
//! 2. **Allocators**:
//!    - [`MultipoolAllocator`]: exact-size classes, headers before each block
//!    - [`SystemHeap`]: the global allocator with usage accounting
//!
//! 3. **Containers** ([`HybridVec`], [`AvlMap`]):
//!    - hold `&'a A`, so the allocator always outlives them
//!    - return every block on drop
//!
//! ## Example
//!
//! ```rust
//! use strata::{node_layout, AvlMap, HybridVec, MultipoolAllocator, RawAlloc};
//!
//! let pool = MultipoolAllocator::new(64, node_layout::<u32, u32>().size(), 1);
//! let mut map = AvlMap::new_in(&pool);
//! map.insert(2, 20);
//! map.insert(1, 10);
//! assert_eq!(map.first(), Some((&1, &10)));
//! assert_eq!(pool.allocation_count(), 2);
//!
//! let heap = strata::SystemHeap::new();
//! let mut vec: HybridVec<'_, u32, 4, _> = HybridVec::new_in(&heap);
//! vec.extend([1, 2, 3]);
//! assert!(vec.is_inline());
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod alloc;
pub mod collections;
pub mod config;
pub mod error;
mod trace;

pub use alloc::{AllocError, DepthStats, MultipoolAllocator, RawAlloc, SystemHeap, BLOCK_ALIGN};
pub use collections::{node_layout, AvlMap, Comparator, Cursor, HybridVec, NaturalOrder};
pub use config::MultipoolConfig;
pub use error::{ConfigError, Error, OutOfRange, Result};

// Compile-time assertions for layout claims the allocators rely on.
const _: () = {
    use core::mem;

    // A multipool header must keep payloads on the block alignment.
    assert!(BLOCK_ALIGN.is_power_of_two());
    assert!(BLOCK_ALIGN >= mem::align_of::<usize>() * 2);

    // Spilled vectors only add a pointer and two counters over the inline buffer.
    assert!(
        mem::size_of::<HybridVec<'static, u64, 0, SystemHeap>>() <= mem::size_of::<usize>() * 4
    );

    // Empty maps are a handful of words.
    assert!(mem::size_of::<AvlMap<'static, u64, u64, SystemHeap>>() <= mem::size_of::<usize>() * 3);
};
