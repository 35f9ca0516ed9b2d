//! `SystemHeap`: a [`RawAlloc`] over the global allocator.
//!
//! Serves any size, keeps the same usage accounting as the multipool, and
//! maps `reallocate` onto `std::alloc::realloc`. Containers whose growth
//! produces sizes no fixed class would match (for example `HybridVec`) are
//! usually built on this.

use super::allocator::{AllocError, RawAlloc};
use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;
use std::alloc::{alloc, dealloc, realloc};

/// Accounting wrapper around the global allocator.
#[derive(Debug, Default)]
pub struct SystemHeap {
    used: Cell<usize>,
    live: Cell<usize>,
}

impl SystemHeap {
    /// Creates a heap with zeroed counters.
    pub const fn new() -> Self {
        Self {
            used: Cell::new(0),
            live: Cell::new(0),
        }
    }
}

impl RawAlloc for SystemHeap {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            // Zero-sized requests never reach the global allocator.
            return Ok(NonNull::new(layout.align() as *mut u8).unwrap_or(NonNull::dangling()));
        }
        // SAFETY: size is nonzero.
        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or(AllocError::OutOfMemory { size: layout.size() })?;
        self.used.set(self.used.get() + layout.size());
        self.live.set(self.live.get() + 1);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        // SAFETY: caller guarantees `ptr` came from `allocate` with `layout`.
        unsafe { dealloc(ptr.as_ptr(), layout) };
        self.used.set(self.used.get() - layout.size());
        self.live.set(self.live.get() - 1);
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<u8>, AllocError> {
        if old_layout.size() == 0 || new_layout.size() == 0 || old_layout.align() != new_layout.align() {
            let new_ptr = self.allocate(new_layout)?;
            let count = old_layout.size().min(new_layout.size());
            // SAFETY: distinct live blocks of at least `count` bytes.
            unsafe {
                core::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), count);
                self.deallocate(ptr, old_layout);
            }
            return Ok(new_ptr);
        }
        // SAFETY: caller contract plus the nonzero/same-align checks above.
        let new_ptr = unsafe { realloc(ptr.as_ptr(), old_layout, new_layout.size()) };
        let new_ptr = NonNull::new(new_ptr).ok_or(AllocError::OutOfMemory {
            size: new_layout.size(),
        })?;
        self.used.set(self.used.get() - old_layout.size() + new_layout.size());
        Ok(new_ptr)
    }

    fn max_size(&self) -> usize {
        isize::MAX as usize
    }

    fn memory_usage(&self) -> usize {
        self.used.get()
    }

    fn allocation_count(&self) -> usize {
        self.live.get()
    }
}
