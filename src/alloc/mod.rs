//! Allocators and the raw allocation trait the containers are written against.

pub mod allocator;
pub mod heap;
pub mod multipool;

pub use allocator::{AllocError, RawAlloc};
pub use heap::SystemHeap;
pub use multipool::{DepthStats, MultipoolAllocator, BLOCK_ALIGN};
