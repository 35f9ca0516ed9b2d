use super::node::{leftmost, predecessor, rightmost, successor, Link};
use super::AvlMap;
use crate::alloc::RawAlloc;
use core::fmt;
use core::iter::FusedIterator;
use core::marker::PhantomData;

/// Position inside an [`AvlMap`]: either an entry or the end position.
///
/// Moving forward from the last entry reaches the end; moving forward from
/// the end wraps to the first entry. Moving backward mirrors this, so the
/// end sits between the last and the first entry.
pub struct Cursor<'m, K, V> {
    current: Link<K, V>,
    root: Link<K, V>,
    _map: PhantomData<&'m (K, V)>,
}

impl<'m, K, V> Cursor<'m, K, V> {
    pub(super) fn new(current: Link<K, V>, root: Link<K, V>) -> Self {
        Self {
            current,
            root,
            _map: PhantomData,
        }
    }

    /// Returns `true` at the end position.
    #[inline]
    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }

    /// Key under the cursor.
    pub fn key(&self) -> Option<&'m K> {
        self.key_value().map(|(key, _)| key)
    }

    /// Value under the cursor.
    pub fn value(&self) -> Option<&'m V> {
        self.key_value().map(|(_, value)| value)
    }

    /// Entry under the cursor.
    pub fn key_value(&self) -> Option<(&'m K, &'m V)> {
        // SAFETY: the map is borrowed for `'m`, keeping the node alive.
        self.current.map(|node| unsafe {
            let n = &*node.as_ptr();
            (&n.key, &n.value)
        })
    }

    /// Advances to the inorder successor.
    pub fn move_next(&mut self) {
        // SAFETY: nodes of a map borrowed for `'m`.
        self.current = unsafe {
            match self.current {
                Some(node) => successor(node),
                None => self.root.map(|root| leftmost(root)),
            }
        };
    }

    /// Steps back to the inorder predecessor.
    pub fn move_prev(&mut self) {
        // SAFETY: nodes of a map borrowed for `'m`.
        self.current = unsafe {
            match self.current {
                Some(node) => predecessor(node),
                None => self.root.map(|root| rightmost(root)),
            }
        };
    }
}

impl<K, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        Self::new(self.current, self.root)
    }
}

impl<K, V> PartialEq for Cursor<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.current == other.current && self.root == other.root
    }
}

impl<K, V> Eq for Cursor<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_value() {
            Some(entry) => f.debug_tuple("Cursor").field(&entry).finish(),
            None => f.write_str("Cursor(end)"),
        }
    }
}

/// Shared range walk used by [`Iter`] and [`IterMut`]: `front` and `back`
/// are the next entries to yield from each side, `remaining` stops the two
/// ends from crossing.
struct Range<K, V> {
    front: Link<K, V>,
    back: Link<K, V>,
    remaining: usize,
}

impl<K, V> Range<K, V> {
    unsafe fn new(root: Link<K, V>, len: usize) -> Self {
        // SAFETY: caller guarantees `root` is live.
        unsafe {
            Self {
                front: root.map(|r| leftmost(r)),
                back: root.map(|r| rightmost(r)),
                remaining: len,
            }
        }
    }

    unsafe fn next_front(&mut self) -> Link<K, V> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.front?;
        self.remaining -= 1;
        // SAFETY: caller keeps the map borrowed.
        self.front = unsafe { successor(node) };
        Some(node)
    }

    unsafe fn next_back(&mut self) -> Link<K, V> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.back?;
        self.remaining -= 1;
        // SAFETY: caller keeps the map borrowed.
        self.back = unsafe { predecessor(node) };
        Some(node)
    }
}

/// Inorder iterator over `(&K, &V)`.
pub struct Iter<'m, K, V> {
    range: Range<K, V>,
    _map: PhantomData<&'m (K, V)>,
}

impl<K, V> Iter<'_, K, V> {
    pub(super) unsafe fn new(root: Link<K, V>, len: usize) -> Self {
        Self {
            // SAFETY: forwarded contract.
            range: unsafe { Range::new(root, len) },
            _map: PhantomData,
        }
    }
}

impl<'m, K, V> Iterator for Iter<'m, K, V> {
    type Item = (&'m K, &'m V);

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: the map is borrowed for `'m`.
        unsafe {
            let n = &*self.range.next_front()?.as_ptr();
            Some((&n.key, &n.value))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.range.remaining, Some(self.range.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        // SAFETY: the map is borrowed for the iterator's lifetime.
        unsafe {
            let n = &*self.range.next_back()?.as_ptr();
            Some((&n.key, &n.value))
        }
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            range: Range {
                front: self.range.front,
                back: self.range.back,
                remaining: self.range.remaining,
            },
            _map: PhantomData,
        }
    }
}

/// Inorder iterator over `(&K, &mut V)`.
pub struct IterMut<'m, K, V> {
    range: Range<K, V>,
    _map: PhantomData<&'m mut (K, V)>,
}

impl<K, V> IterMut<'_, K, V> {
    pub(super) unsafe fn new(root: Link<K, V>, len: usize) -> Self {
        Self {
            // SAFETY: forwarded contract.
            range: unsafe { Range::new(root, len) },
            _map: PhantomData,
        }
    }
}

impl<'m, K, V> Iterator for IterMut<'m, K, V> {
    type Item = (&'m K, &'m mut V);

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: the map is mutably borrowed for `'m` and every node is
        // yielded at most once.
        unsafe {
            let n = &mut *self.range.next_front()?.as_ptr();
            Some((&n.key, &mut n.value))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.range.remaining, Some(self.range.remaining))
    }
}

impl<K, V> DoubleEndedIterator for IterMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        // SAFETY: as in `next`.
        unsafe {
            let n = &mut *self.range.next_back()?.as_ptr();
            Some((&n.key, &mut n.value))
        }
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Keys of an [`AvlMap`] in order.
#[derive(Clone)]
pub struct Keys<'m, K, V> {
    pub(super) inner: Iter<'m, K, V>,
}

impl<'m, K, V> Iterator for Keys<'m, K, V> {
    type Item = &'m K;

    fn next(&mut self) -> Option<&'m K> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Keys<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(key, _)| key)
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// Values of an [`AvlMap`] in key order.
#[derive(Clone)]
pub struct Values<'m, K, V> {
    pub(super) inner: Iter<'m, K, V>,
}

impl<'m, K, V> Iterator for Values<'m, K, V> {
    type Item = &'m V;

    fn next(&mut self) -> Option<&'m V> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Values<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, value)| value)
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

/// Owning iterator that drains the map from both ends.
pub struct IntoIter<'a, K, V, A: RawAlloc + ?Sized, C> {
    pub(super) map: AvlMap<'a, K, V, A, C>,
}

impl<K, V, A: RawAlloc + ?Sized, C> Iterator for IntoIter<'_, K, V, A, C> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        self.map.pop_first()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.map.len, Some(self.map.len))
    }
}

impl<K, V, A: RawAlloc + ?Sized, C> DoubleEndedIterator for IntoIter<'_, K, V, A, C> {
    fn next_back(&mut self) -> Option<(K, V)> {
        self.map.pop_last()
    }
}

impl<K, V, A: RawAlloc + ?Sized, C> ExactSizeIterator for IntoIter<'_, K, V, A, C> {}
impl<K, V, A: RawAlloc + ?Sized, C> FusedIterator for IntoIter<'_, K, V, A, C> {}
