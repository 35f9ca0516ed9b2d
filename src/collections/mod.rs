//! Containers written against a borrowed [`RawAlloc`](crate::alloc::RawAlloc).
//!
//! - `hybrid_vec`: small-buffer vector that spills to the allocator
//! - `avl_map`: ordered map with one allocator block per entry

pub mod avl_map;
pub mod hybrid_vec;

pub use avl_map::{node_layout, AvlMap, Comparator, Cursor, NaturalOrder};
pub use hybrid_vec::HybridVec;
