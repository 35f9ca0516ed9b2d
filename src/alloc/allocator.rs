//! The [`RawAlloc`] trait.

use core::alloc::Layout;
use core::ptr::{self, NonNull};

pub use crate::error::AllocError;

/// A raw memory allocator that containers borrow but never own.
///
/// This is the only allocator surface `HybridVec` and `AvlMap` depend on.
/// Every method takes `&self` so one allocator can back several live
/// containers at once; implementations keep their bookkeeping in `Cell`s and
/// are therefore single-threaded (`!Sync`).
///
/// Memory returned by [`allocate`](RawAlloc::allocate) belongs to the
/// allocator until it is handed back through
/// [`deallocate`](RawAlloc::deallocate).
pub trait RawAlloc {
    /// Allocates a block fitting `layout`.
    ///
    /// # Errors
    /// Returns an [`AllocError`] describing why the request cannot be served.
    /// A failed call leaves the allocator unchanged.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    /// `ptr` must denote a block currently allocated by this allocator and
    /// `layout` must be the layout it was allocated with.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Moves a block into storage fitting `new_layout`, preserving the first
    /// `min(old, new)` bytes.
    ///
    /// The provided implementation allocates, copies and frees. On error the
    /// original block is untouched and still owned by the caller.
    ///
    /// # Errors
    /// Propagates the failure of the underlying allocation.
    ///
    /// # Safety
    /// Same contract as [`deallocate`](RawAlloc::deallocate) for `ptr` and
    /// `old_layout`.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<u8>, AllocError> {
        let new_ptr = self.allocate(new_layout)?;
        let count = old_layout.size().min(new_layout.size());
        // SAFETY: both blocks are live, distinct, and at least `count` bytes long.
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), count);
            self.deallocate(ptr, old_layout);
        }
        Ok(new_ptr)
    }

    /// Largest single block this allocator can ever return.
    fn max_size(&self) -> usize;

    /// Bytes currently handed out to callers.
    fn memory_usage(&self) -> usize;

    /// Number of live allocations.
    fn allocation_count(&self) -> usize;
}

impl<A: RawAlloc + ?Sized> RawAlloc for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }

    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<u8>, AllocError> {
        // SAFETY: forwarded contract.
        unsafe { (**self).reallocate(ptr, old_layout, new_layout) }
    }

    fn max_size(&self) -> usize {
        (**self).max_size()
    }

    fn memory_usage(&self) -> usize {
        (**self).memory_usage()
    }

    fn allocation_count(&self) -> usize {
        (**self).allocation_count()
    }
}
