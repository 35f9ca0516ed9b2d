//! `MultipoolAllocator`: fixed size classes served from per-depth free lists.
//!
//! All blocks live in one contiguous buffer carved up at construction. Depth
//! `i` serves blocks of `block_size >> i` bytes and holds `block_count << i`
//! of them, so every level spans roughly the same number of payload bytes.
//!
//! Each block is preceded by a [`BlockHeader`] recording its depth. While a
//! block is free the header also links it into its depth's free list;
//! `deallocate` finds the header by stepping back from the payload pointer,
//! so the caller never has to say which class a pointer belongs to.
//!
//! Allocation and deallocation are a single free-list pop/push. There is no
//! splitting or coalescing across depths, and a request whose size does not
//! match a class exactly is refused.

use super::allocator::{AllocError, RawAlloc};
use crate::config::MultipoolConfig;
use crate::error::ConfigError;
use crate::trace::trace_event;
use core::alloc::Layout;
use core::cell::Cell;
use core::mem;
use core::ptr::NonNull;
use serde::Serialize;
use std::alloc::{alloc, dealloc};

/// Alignment of every payload handed out by the multipool.
pub const BLOCK_ALIGN: usize = 16;

/// Per-block bookkeeping stored immediately before the payload.
#[repr(C, align(16))]
struct BlockHeader {
    depth: usize,
    next: Option<NonNull<BlockHeader>>,
}

const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

const _: () = assert!(HEADER_SIZE % BLOCK_ALIGN == 0);

/// One size class.
struct Level {
    block_size: usize,
    /// Distance between consecutive headers.
    stride: usize,
    /// Byte offset of the first header inside the backing buffer.
    offset: usize,
    total: usize,
    free: Cell<usize>,
    head: Cell<Option<NonNull<BlockHeader>>>,
}

/// Occupancy of one depth level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepthStats {
    /// Depth index.
    pub depth: usize,
    /// Payload size of each block.
    pub block_size: usize,
    /// Blocks carved for this depth.
    pub total_blocks: usize,
    /// Blocks currently on the free list.
    pub free_blocks: usize,
}

/// A set of power-of-two free-list pools over one backing buffer.
///
/// Single-threaded: the free lists live in `Cell`s so that several containers
/// can share one `&MultipoolAllocator`.
pub struct MultipoolAllocator {
    buffer: NonNull<u8>,
    buffer_layout: Layout,
    levels: Box<[Level]>,
    config: MultipoolConfig,
    used: Cell<usize>,
    live: Cell<usize>,
}

impl MultipoolAllocator {
    /// Builds a multipool with `pool_depth` levels.
    ///
    /// # Panics
    /// If any parameter is zero, the deepest class would be empty, the pools
    /// overflow the address space, or the backing buffer cannot be allocated.
    /// Use [`from_config`](Self::from_config) for a fallible constructor.
    pub fn new(block_count: usize, block_size: usize, pool_depth: usize) -> Self {
        match Self::from_config(&MultipoolConfig::new(block_count, block_size, pool_depth)) {
            Ok(pool) => pool,
            Err(err) => panic!("invalid multipool parameters: {err}"),
        }
    }

    /// Builds a multipool from a validated configuration.
    ///
    /// # Errors
    /// Any [`ConfigError`] from validation, or [`ConfigError::Overflow`] when
    /// the combined pool size does not fit in a `Layout`.
    ///
    /// # Panics
    /// If the global allocator cannot provide the backing buffer.
    pub fn from_config(config: &MultipoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut levels = Vec::with_capacity(config.pool_depth);
        let mut offset = 0usize;
        for depth in 0..config.pool_depth {
            let block_size = config.class_size(depth);
            let total = config.class_count(depth).ok_or(ConfigError::Overflow)?;
            let stride = HEADER_SIZE
                .checked_add(block_size)
                .and_then(|n| n.checked_next_multiple_of(BLOCK_ALIGN))
                .ok_or(ConfigError::Overflow)?;
            levels.push(Level {
                block_size,
                stride,
                offset,
                total,
                free: Cell::new(0),
                head: Cell::new(None),
            });
            offset = stride
                .checked_mul(total)
                .and_then(|bytes| bytes.checked_add(offset))
                .ok_or(ConfigError::Overflow)?;
        }

        let buffer_layout = Layout::from_size_align(offset, BLOCK_ALIGN).map_err(|_| ConfigError::Overflow)?;
        // SAFETY: validation guarantees at least one nonzero block, so the size is nonzero.
        let raw = unsafe { alloc(buffer_layout) };
        let Some(buffer) = NonNull::new(raw) else {
            std::alloc::handle_alloc_error(buffer_layout)
        };

        let pool = Self {
            buffer,
            buffer_layout,
            levels: levels.into_boxed_slice(),
            config: *config,
            used: Cell::new(0),
            live: Cell::new(0),
        };
        pool.rebuild_free_lists();

        trace_event!(
            DEBUG,
            block_count = config.block_count,
            block_size = config.block_size,
            pool_depth = config.pool_depth,
            bytes = offset,
            "multipool created"
        );
        Ok(pool)
    }

    /// The parameters this allocator was built with.
    #[inline]
    pub fn config(&self) -> &MultipoolConfig {
        &self.config
    }

    /// Number of size classes.
    #[inline]
    pub fn pool_depth(&self) -> usize {
        self.levels.len()
    }

    /// Depth whose block size equals `size` exactly.
    #[inline]
    pub fn depth_for_size(&self, size: usize) -> Option<usize> {
        self.levels.iter().position(|level| level.block_size == size)
    }

    /// Whether an allocation with `layout` would currently succeed.
    pub fn can_allocate(&self, layout: Layout) -> bool {
        layout.align() <= BLOCK_ALIGN
            && self
                .depth_for_size(layout.size())
                .is_some_and(|depth| self.levels[depth].head.get().is_some())
    }

    /// Free blocks remaining at `depth`.
    ///
    /// # Panics
    /// If `depth >= pool_depth()`.
    #[inline]
    pub fn free_blocks(&self, depth: usize) -> usize {
        self.levels[depth].free.get()
    }

    /// Snapshot of every level.
    pub fn depth_stats(&self) -> Vec<DepthStats> {
        self.levels
            .iter()
            .enumerate()
            .map(|(depth, level)| DepthStats {
                depth,
                block_size: level.block_size,
                total_blocks: level.total,
                free_blocks: level.free.get(),
            })
            .collect()
    }

    /// Whether `ptr` lies inside this allocator's backing buffer.
    pub fn owns(&self, ptr: NonNull<u8>) -> bool {
        let start = self.buffer.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        addr >= start + HEADER_SIZE && addr < start + self.buffer_layout.size()
    }

    /// Returns every block to its free list and zeroes the counters.
    ///
    /// No destructors run. Taking `&mut self` guarantees no container still
    /// borrows the allocator, so nothing can observe the recycled blocks.
    pub fn clear(&mut self) {
        self.rebuild_free_lists();
        self.used.set(0);
        self.live.set(0);
        trace_event!(DEBUG, "multipool cleared");
    }

    /// Links every block of every level, in address order.
    fn rebuild_free_lists(&self) {
        for (depth, level) in self.levels.iter().enumerate() {
            let mut next = None;
            for index in (0..level.total).rev() {
                // SAFETY: `offset + index * stride` is inside the buffer and
                // 16-aligned, so a header fits there.
                let header = unsafe {
                    let raw = self.buffer.as_ptr().add(level.offset + index * level.stride);
                    let header = raw.cast::<BlockHeader>();
                    header.write(BlockHeader { depth, next });
                    NonNull::new_unchecked(header)
                };
                next = Some(header);
            }
            level.head.set(next);
            level.free.set(level.total);
        }
    }

    #[inline]
    fn payload(header: NonNull<BlockHeader>) -> NonNull<u8> {
        // SAFETY: every header is followed by its payload inside the buffer.
        unsafe { NonNull::new_unchecked(header.as_ptr().cast::<u8>().add(HEADER_SIZE)) }
    }
}

impl RawAlloc for MultipoolAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.align() > BLOCK_ALIGN {
            return Err(AllocError::UnsupportedAlignment {
                align: layout.align(),
                max: BLOCK_ALIGN,
            });
        }
        let Some(depth) = self.depth_for_size(layout.size()) else {
            trace_event!(WARN, size = layout.size(), "no multipool size class");
            return Err(AllocError::NoSizeClass { size: layout.size() });
        };
        let level = &self.levels[depth];
        let Some(header) = level.head.get() else {
            trace_event!(WARN, depth, size = level.block_size, "multipool depth exhausted");
            return Err(AllocError::Exhausted { size: level.block_size });
        };

        // SAFETY: free-list headers are initialized and owned by the pool.
        unsafe {
            let header = header.as_ptr();
            level.head.set((*header).next);
            (*header).next = None;
        }
        level.free.set(level.free.get() - 1);
        self.used.set(self.used.get() + level.block_size);
        self.live.set(self.live.get() + 1);
        Ok(Self::payload(header))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: Layout) {
        debug_assert!(self.owns(ptr), "pointer was not allocated by this multipool");
        // SAFETY: caller guarantees `ptr` is a live payload from `allocate`,
        // so a header sits right before it.
        unsafe {
            let header = ptr.as_ptr().sub(HEADER_SIZE).cast::<BlockHeader>();
            let level = &self.levels[(*header).depth];
            (*header).next = level.head.get();
            level.head.set(Some(NonNull::new_unchecked(header)));
            level.free.set(level.free.get() + 1);
            self.used.set(self.used.get() - level.block_size);
        }
        self.live.set(self.live.get() - 1);
    }

    fn max_size(&self) -> usize {
        self.config.block_size
    }

    fn memory_usage(&self) -> usize {
        self.used.get()
    }

    fn allocation_count(&self) -> usize {
        self.live.get()
    }
}

impl Drop for MultipoolAllocator {
    fn drop(&mut self) {
        // SAFETY: allocated in `from_config` with this layout.
        unsafe { dealloc(self.buffer.as_ptr(), self.buffer_layout) };
    }
}

impl core::fmt::Debug for MultipoolAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MultipoolAllocator")
            .field("config", &self.config)
            .field("memory_usage", &self.used.get())
            .field("allocation_count", &self.live.get())
            .finish_non_exhaustive()
    }
}
