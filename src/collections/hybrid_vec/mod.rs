//! `HybridVec`: a small-buffer vector over a borrowed [`RawAlloc`].
//!
//! Up to `N` elements are stored inline, inside the vector itself. Growing
//! past that moves the elements into a block obtained from the allocator and
//! the vector stays heap-backed from then on (`clear` keeps the block).
//!
//! Growth policy: the new capacity is `2 * capacity + 1`, raised to the
//! requested minimum and capped at the largest representable capacity.
//! Leaving inline storage allocates a fresh block and relocates the live
//! elements; regrowing a heap block goes through
//! [`RawAlloc::reallocate`].
//!
//! Infallible methods (`push`, `insert`, `reserve`, ...) panic with a "bad
//! allocation" message when the allocator refuses; the `try_` variants
//! return the [`AllocError`] instead and leave the vector untouched.

mod iter;


pub use iter::IntoIter;

use crate::alloc::{AllocError, RawAlloc};
use crate::error::{bad_alloc, OutOfRange};
use crate::trace::trace_event;
use core::alloc::Layout;
use core::fmt;
use core::marker::PhantomData;
use core::mem::{self, MaybeUninit};
use core::ops::{Bound, Deref, DerefMut, RangeBounds};
use core::ptr::{self, NonNull};
use core::slice;
use serde::{Serialize, Serializer};

/// A vector holding up to `N` elements inline before spilling to the allocator.
///
/// The allocator is borrowed for `'a`, so it necessarily outlives the vector.
pub struct HybridVec<'a, T, const N: usize, A: RawAlloc + ?Sized> {
    inline: [MaybeUninit<T>; N],
    /// `None` while the elements live in `inline`.
    heap: Option<NonNull<T>>,
    len: usize,
    cap: usize,
    alloc: &'a A,
    _owns: PhantomData<T>,
}

impl<'a, T, const N: usize, A: RawAlloc + ?Sized> HybridVec<'a, T, N, A> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Largest capacity the vector can ever reach.
    pub const MAX_CAPACITY: usize = if Self::IS_ZST {
        usize::MAX
    } else {
        isize::MAX as usize / mem::size_of::<T>()
    };

    /// Creates an empty vector using inline storage.
    #[inline]
    pub fn new_in(alloc: &'a A) -> Self {
        // SAFETY: an array of `MaybeUninit` needs no initialization.
        let inline = unsafe { MaybeUninit::<[MaybeUninit<T>; N]>::uninit().assume_init() };
        Self {
            inline,
            heap: None,
            len: 0,
            cap: N,
            alloc,
            _owns: PhantomData,
        }
    }

    /// Creates an empty vector able to hold `capacity` elements without growing.
    ///
    /// # Panics
    /// If the allocator cannot provide the storage.
    pub fn with_capacity_in(capacity: usize, alloc: &'a A) -> Self {
        let mut vec = Self::new_in(alloc);
        vec.reserve(capacity);
        vec
    }

    /// Number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the current storage can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Returns `true` while the elements still live in the inline buffer.
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.heap.is_none()
    }

    /// The allocator backing this vector.
    #[inline]
    pub fn allocator(&self) -> &'a A {
        self.alloc
    }

    /// Raw pointer to the first element slot.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        match self.heap {
            Some(ptr) => ptr.as_ptr(),
            None => self.inline.as_ptr().cast(),
        }
    }

    /// Mutable raw pointer to the first element slot.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        match self.heap {
            Some(ptr) => ptr.as_ptr(),
            None => self.inline.as_mut_ptr().cast(),
        }
    }

    /// The live elements as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `[0, len)` is initialized.
        unsafe { slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// The live elements as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: `[0, len)` is initialized.
        unsafe { slice::from_raw_parts_mut(self.as_mut_ptr(), self.len) }
    }

    /// Bounds-checked shared access.
    ///
    /// # Errors
    /// [`OutOfRange`] if `index >= len()`.
    pub fn at(&self, index: usize) -> Result<&T, OutOfRange> {
        let len = self.len;
        self.as_slice().get(index).ok_or(OutOfRange { index, len })
    }

    /// Bounds-checked exclusive access.
    ///
    /// # Errors
    /// [`OutOfRange`] if `index >= len()`.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T, OutOfRange> {
        let len = self.len;
        self.as_mut_slice().get_mut(index).ok_or(OutOfRange { index, len })
    }

    /// Ensures the capacity is at least `capacity`. Never shrinks.
    ///
    /// # Panics
    /// If the allocator cannot provide the storage.
    pub fn reserve(&mut self, capacity: usize) {
        if let Err(err) = self.try_reserve(capacity) {
            bad_alloc(err);
        }
    }

    /// Fallible [`reserve`](Self::reserve).
    ///
    /// # Errors
    /// Propagates the allocator's refusal; the vector is unchanged.
    pub fn try_reserve(&mut self, capacity: usize) -> Result<(), AllocError> {
        self.grow_for(capacity)
    }

    /// Appends an element.
    ///
    /// # Panics
    /// If growing is required and the allocator refuses.
    #[inline]
    pub fn push(&mut self, value: T) {
        if let Err(err) = self.try_push(value) {
            bad_alloc(err);
        }
    }

    /// Fallible [`push`](Self::push). On error `value` is dropped and the
    /// vector is unchanged.
    ///
    /// # Errors
    /// Propagates the allocator's refusal.
    pub fn try_push(&mut self, value: T) -> Result<(), AllocError> {
        if self.len == self.cap {
            let required = self.len.checked_add(1).ok_or(AllocError::CapacityOverflow)?;
            self.grow_for(required)?;
        }
        // SAFETY: `len < cap`, the slot is uninitialized.
        unsafe { self.as_mut_ptr().add(self.len).write(value) };
        self.len += 1;
        Ok(())
    }

    /// Grows if needed, then constructs the new last element from `make` in
    /// place and returns it.
    ///
    /// # Panics
    /// If growing is required and the allocator refuses.
    pub fn emplace_back<F>(&mut self, make: F) -> &mut T
    where
        F: FnOnce() -> T,
    {
        if self.len == self.cap {
            self.reserve(self.len.saturating_add(1));
        }
        let len = self.len;
        // SAFETY: `len < cap`; the slot only counts as live after the write.
        unsafe {
            let slot = self.as_mut_ptr().add(len);
            slot.write(make());
            self.len = len + 1;
            &mut *slot
        }
    }

    /// Removes and returns the last element.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the slot at the old `len - 1` was initialized and is now outside `len`.
        Some(unsafe { ptr::read(self.as_ptr().add(self.len)) })
    }

    /// Inserts `value` at `index`, shifting the tail up by one.
    ///
    /// # Panics
    /// If `index > len()` or the allocator refuses to grow.
    pub fn insert(&mut self, index: usize, value: T) {
        if let Err(err) = self.try_insert(index, value) {
            bad_alloc(err);
        }
    }

    /// Fallible [`insert`](Self::insert). On error `value` is dropped and the
    /// vector is unchanged.
    ///
    /// # Errors
    /// Propagates the allocator's refusal.
    ///
    /// # Panics
    /// If `index > len()`.
    pub fn try_insert(&mut self, index: usize, value: T) -> Result<(), AllocError> {
        let len = self.len;
        assert!(index <= len, "insertion index (is {index}) should be <= len (is {len})");
        if index == len {
            return self.try_push(value);
        }
        if len == self.cap {
            // Growth may relocate storage, so only the index survives it.
            self.grow_for(len.checked_add(1).ok_or(AllocError::CapacityOverflow)?)?;
        }
        // SAFETY: `len < cap`; `[index, len)` moves up one slot into reserved space.
        unsafe {
            let slot = self.as_mut_ptr().add(index);
            ptr::copy(slot, slot.add(1), len - index);
            slot.write(value);
        }
        self.len = len + 1;
        Ok(())
    }

    /// Inserts `count` clones of `value` at `index`.
    ///
    /// # Panics
    /// If `index > len()` or the allocator refuses to grow.
    pub fn insert_n(&mut self, index: usize, count: usize, value: T)
    where
        T: Clone,
    {
        if let Err(err) = self.insert_with(index, count, |_| value.clone()) {
            bad_alloc(err);
        }
    }

    /// Inserts clones of every element of `items` at `index`, preserving order.
    ///
    /// # Panics
    /// If `index > len()` or the allocator refuses to grow.
    pub fn insert_from_slice(&mut self, index: usize, items: &[T])
    where
        T: Clone,
    {
        if let Err(err) = self.insert_with(index, items.len(), |i| items[i].clone()) {
            bad_alloc(err);
        }
    }

    /// Opens a gap of `count` slots at `index` and fills it from `fill`.
    ///
    /// If `fill` panics, the shifted tail is leaked rather than dropped twice.
    fn insert_with<F>(&mut self, index: usize, count: usize, mut fill: F) -> Result<(), AllocError>
    where
        F: FnMut(usize) -> T,
    {
        let len = self.len;
        assert!(index <= len, "insertion index (is {index}) should be <= len (is {len})");
        if count == 0 {
            return Ok(());
        }
        let required = len.checked_add(count).ok_or(AllocError::CapacityOverflow)?;
        self.grow_for(required)?;
        // SAFETY: `required <= cap`; the tail moves into reserved space and the
        // gap is written exactly once before `len` covers it again.
        unsafe {
            let base = self.as_mut_ptr();
            ptr::copy(base.add(index), base.add(index + count), len - index);
            self.len = index;
            for i in 0..count {
                base.add(index + i).write(fill(i));
            }
        }
        self.len = required;
        Ok(())
    }

    /// Removes and returns the element at `index`, shifting the tail down.
    ///
    /// # Panics
    /// If `index >= len()`.
    pub fn remove(&mut self, index: usize) -> T {
        let len = self.len;
        assert!(index < len, "removal index (is {index}) should be < len (is {len})");
        // SAFETY: `index < len`; the value is read out before its slot is overwritten.
        unsafe {
            let slot = self.as_mut_ptr().add(index);
            let value = ptr::read(slot);
            ptr::copy(slot.add(1), slot, len - index - 1);
            self.len = len - 1;
            value
        }
    }

    /// Drops the elements in `range` and closes the gap. Returns the index
    /// now occupied by the first element after the range. Erasing an empty
    /// range, including `len()..len()`, is a no-op.
    ///
    /// # Panics
    /// If the range is decreasing or extends past `len()`.
    pub fn erase<R>(&mut self, range: R) -> usize
    where
        R: RangeBounds<usize>,
    {
        let len = self.len;
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.checked_add(1).unwrap_or(usize::MAX),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n.checked_add(1).unwrap_or(usize::MAX),
            Bound::Excluded(&n) => n,
            Bound::Unbounded => len,
        };
        assert!(start <= end, "erase range starts at {start} but ends at {end}");
        assert!(end <= len, "erase range end (is {end}) should be <= len (is {len})");
        if start == end {
            return start;
        }
        // SAFETY: `[start, end)` is live; `len` is lowered first so a panicking
        // destructor leaks the tail instead of dropping it twice.
        unsafe {
            let base = self.as_mut_ptr();
            self.len = start;
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(base.add(start), end - start));
            ptr::copy(base.add(end), base.add(start), len - end);
        }
        self.len = len - (end - start);
        start
    }

    /// Drops every element past `len`. No-op if `len >= len()`.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let old_len = self.len;
        self.len = len;
        // SAFETY: `[len, old_len)` was live and is no longer covered by `self.len`.
        unsafe {
            let tail = ptr::slice_from_raw_parts_mut(self.as_mut_ptr().add(len), old_len - len);
            ptr::drop_in_place(tail);
        }
    }

    /// Drops every element. Heap storage, if any, is kept.
    #[inline]
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Resizes to `new_len`, cloning `value` into new slots.
    ///
    /// # Panics
    /// If the allocator refuses to grow.
    pub fn resize(&mut self, new_len: usize, value: T)
    where
        T: Clone,
    {
        self.resize_with(new_len, || value.clone());
    }

    /// Resizes to `new_len`, filling new slots from `make`.
    ///
    /// # Panics
    /// If the allocator refuses to grow.
    pub fn resize_with<F>(&mut self, new_len: usize, mut make: F)
    where
        F: FnMut() -> T,
    {
        let len = self.len;
        if new_len <= len {
            self.truncate(new_len);
            return;
        }
        if let Err(err) = self.insert_with(len, new_len - len, |_| make()) {
            bad_alloc(err);
        }
    }

    /// Takes over `source`'s contents, leaving it empty.
    ///
    /// When `source` is heap-backed and uses the same allocator instance,
    /// its block is stolen outright and `source` falls back to its inline
    /// buffer. Otherwise the elements are moved over into this vector's
    /// existing storage, growing it if necessary.
    ///
    /// # Panics
    /// If this vector has to grow and the allocator refuses; `source` is
    /// untouched in that case.
    pub fn move_from(&mut self, source: &mut Self) {
        self.clear();
        if let (Some(block), true) = (source.heap, self.shares_allocator(source)) {
            self.release_heap();
            self.heap = Some(block);
            self.cap = source.cap;
            self.len = source.len;
            source.heap = None;
            source.cap = N;
            source.len = 0;
            return;
        }
        let count = source.len;
        self.reserve(count);
        // SAFETY: `count <= cap`; ownership moves bitwise and the source
        // forgets its elements.
        unsafe {
            ptr::copy_nonoverlapping(source.as_ptr(), self.as_mut_ptr(), count);
        }
        source.len = 0;
        self.len = count;
    }

    fn shares_allocator(&self, other: &Self) -> bool {
        ptr::eq(
            (self.alloc as *const A).cast::<u8>(),
            (other.alloc as *const A).cast::<u8>(),
        )
    }

    /// Grows to hold at least `required` elements.
    fn grow_for(&mut self, required: usize) -> Result<(), AllocError> {
        if required <= self.cap {
            return Ok(());
        }
        if required > Self::MAX_CAPACITY {
            return Err(AllocError::CapacityOverflow);
        }
        let doubled = self.cap.saturating_mul(2).saturating_add(1);
        self.relocate(doubled.clamp(required, Self::MAX_CAPACITY))
    }

    /// Moves the live elements into storage for `new_cap` elements.
    fn relocate(&mut self, new_cap: usize) -> Result<(), AllocError> {
        debug_assert!(new_cap > self.cap && new_cap >= self.len);
        if Self::IS_ZST {
            self.heap = Some(NonNull::dangling());
            self.cap = new_cap;
            return Ok(());
        }
        let new_layout = Layout::array::<T>(new_cap).map_err(|_| AllocError::CapacityOverflow)?;
        match self.heap {
            None => {
                let block = self.alloc.allocate(new_layout)?.cast::<T>();
                // SAFETY: fresh block of `new_cap >= len` slots; moving is a bitwise copy.
                unsafe {
                    ptr::copy_nonoverlapping(self.inline.as_ptr().cast::<T>(), block.as_ptr(), self.len);
                }
                self.heap = Some(block);
                trace_event!(TRACE, len = self.len, capacity = new_cap, "hybrid vec spilled to heap");
            }
            Some(block) => {
                // SAFETY: `block` was allocated with `heap_layout()` by this allocator.
                let grown = unsafe { self.alloc.reallocate(block.cast(), self.heap_layout(), new_layout)? };
                self.heap = Some(grown.cast());
                trace_event!(TRACE, len = self.len, capacity = new_cap, "hybrid vec regrew");
            }
        }
        self.cap = new_cap;
        Ok(())
    }

    /// Layout of the current heap block.
    #[inline]
    fn heap_layout(&self) -> Layout {
        // SAFETY: `Layout::array::<T>(cap)` succeeded when the block was obtained.
        unsafe { Layout::from_size_align_unchecked(mem::size_of::<T>() * self.cap, mem::align_of::<T>()) }
    }

    /// Hands the heap block back to the allocator and returns to inline mode.
    /// The caller must have dropped or moved out every element first.
    fn release_heap(&mut self) {
        if let Some(block) = self.heap.take() {
            if !Self::IS_ZST {
                // SAFETY: the block came from this allocator with `heap_layout()`.
                unsafe { self.alloc.deallocate(block.cast(), self.heap_layout()) };
            }
            self.cap = N;
        }
    }
}

impl<T, const N: usize, A: RawAlloc + ?Sized> Drop for HybridVec<'_, T, N, A> {
    fn drop(&mut self) {
        // SAFETY: `[0, len)` is live and dropped exactly once.
        unsafe { ptr::drop_in_place(self.as_mut_slice()) };
        self.release_heap();
    }
}

impl<T, const N: usize, A: RawAlloc + ?Sized> Deref for HybridVec<'_, T, N, A> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, const N: usize, A: RawAlloc + ?Sized> DerefMut for HybridVec<'_, T, N, A> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Clone, const N: usize, A: RawAlloc + ?Sized> Clone for HybridVec<'_, T, N, A> {
    fn clone(&self) -> Self {
        let mut vec = Self::new_in(self.alloc);
        vec.insert_from_slice(0, self);
        vec
    }

    /// Reuses this vector's storage: overlapping slots are assigned, the rest
    /// is cloned into place or truncated. Only an undersized buffer is
    /// discarded and regrown.
    fn clone_from(&mut self, source: &Self) {
        if source.len > self.cap {
            self.clear();
            self.reserve(source.len);
        }
        let common = self.len.min(source.len);
        self[..common].clone_from_slice(&source[..common]);
        if source.len < self.len {
            self.truncate(source.len);
        } else {
            let len = self.len;
            self.insert_from_slice(len, &source[common..]);
        }
    }
}

impl<T, const N: usize, A: RawAlloc + ?Sized> Extend<T> for HybridVec<'_, T, N, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(self.len.saturating_add(lower));
        for item in iter {
            self.push(item);
        }
    }
}

impl<'v, T, const N: usize, A: RawAlloc + ?Sized> IntoIterator for &'v HybridVec<'_, T, N, A> {
    type Item = &'v T;
    type IntoIter = slice::Iter<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'v, T, const N: usize, A: RawAlloc + ?Sized> IntoIterator for &'v mut HybridVec<'_, T, N, A> {
    type Item = &'v mut T;
    type IntoIter = slice::IterMut<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T: PartialEq, const N: usize, const M: usize, A, B> PartialEq<HybridVec<'_, T, M, B>>
    for HybridVec<'_, T, N, A>
where
    A: RawAlloc + ?Sized,
    B: RawAlloc + ?Sized,
{
    fn eq(&self, other: &HybridVec<'_, T, M, B>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, const N: usize, A: RawAlloc + ?Sized> Eq for HybridVec<'_, T, N, A> {}

impl<T: PartialEq, const N: usize, A: RawAlloc + ?Sized> PartialEq<[T]> for HybridVec<'_, T, N, A> {
    fn eq(&self, other: &[T]) -> bool {
        self.as_slice() == other
    }
}

impl<T: fmt::Debug, const N: usize, A: RawAlloc + ?Sized> fmt::Debug for HybridVec<'_, T, N, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Serialize, const N: usize, A: RawAlloc + ?Sized> Serialize for HybridVec<'_, T, N, A> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
