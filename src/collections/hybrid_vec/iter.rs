use super::HybridVec;
use crate::alloc::RawAlloc;
use core::fmt;
use core::iter::FusedIterator;
use core::ptr;

/// Owning iterator over a [`HybridVec`].
///
/// The vector travels inside the iterator with its length zeroed, so its own
/// destructor only releases the heap block; the iterator drops whatever it
/// did not yield.
pub struct IntoIter<'a, T, const N: usize, A: RawAlloc + ?Sized> {
    vec: HybridVec<'a, T, N, A>,
    start: usize,
    end: usize,
}

impl<'a, T, const N: usize, A: RawAlloc + ?Sized> IntoIter<'a, T, N, A> {
    /// The elements not yet yielded.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `[start, end)` is still initialized.
        unsafe { core::slice::from_raw_parts(self.vec.as_ptr().add(self.start), self.end - self.start) }
    }
}

impl<'a, T, const N: usize, A: RawAlloc + ?Sized> IntoIterator for HybridVec<'a, T, N, A> {
    type Item = T;
    type IntoIter = IntoIter<'a, T, N, A>;

    fn into_iter(mut self) -> Self::IntoIter {
        let end = self.len;
        self.len = 0;
        IntoIter { vec: self, start: 0, end }
    }
}

impl<T, const N: usize, A: RawAlloc + ?Sized> Iterator for IntoIter<'_, T, N, A> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }
        // SAFETY: `start < end`, the slot is initialized and read exactly once.
        let value = unsafe { ptr::read(self.vec.as_ptr().add(self.start)) };
        self.start += 1;
        Some(value)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.start;
        (remaining, Some(remaining))
    }
}

impl<T, const N: usize, A: RawAlloc + ?Sized> DoubleEndedIterator for IntoIter<'_, T, N, A> {
    #[inline]
    fn next_back(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }
        self.end -= 1;
        // SAFETY: the slot at the old `end - 1` is initialized and read exactly once.
        Some(unsafe { ptr::read(self.vec.as_ptr().add(self.end)) })
    }
}

impl<T, const N: usize, A: RawAlloc + ?Sized> ExactSizeIterator for IntoIter<'_, T, N, A> {}

impl<T, const N: usize, A: RawAlloc + ?Sized> FusedIterator for IntoIter<'_, T, N, A> {}

impl<T, const N: usize, A: RawAlloc + ?Sized> Drop for IntoIter<'_, T, N, A> {
    fn drop(&mut self) {
        let remaining = self.end - self.start;
        self.end = self.start;
        // SAFETY: `[start, start + remaining)` was never yielded.
        unsafe {
            let tail = ptr::slice_from_raw_parts_mut(self.vec.as_mut_ptr().add(self.start), remaining);
            ptr::drop_in_place(tail);
        }
    }
}

impl<T: fmt::Debug, const N: usize, A: RawAlloc + ?Sized> fmt::Debug for IntoIter<'_, T, N, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IntoIter").field(&self.as_slice()).finish()
    }
}
