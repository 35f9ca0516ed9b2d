//! `AvlMap`: an AVL-balanced ordered map whose nodes come from a borrowed
//! [`RawAlloc`].
//!
//! Every entry is its own allocator block of [`node_layout::<K, V>()`](node_layout),
//! so a [`MultipoolAllocator`](crate::alloc::MultipoolAllocator) with a
//! matching block size serves the whole map in O(1) per node.
//!
//! Insertion keeps the first value for a key: inserting an existing key
//! reports "not inserted" and leaves the stored value alone. After every
//! structural change heights are recomputed up to the root and any node
//! whose subtrees differ in height by two is fixed with a single (LL/RR) or
//! double (LR/RL) rotation.
//!
//! Node addresses never change while an entry is in the map; rotations and
//! removals only relink pointers.

mod comparator;
mod iter;
mod node;

#[cfg(test)]
mod tests;

pub use comparator::{Comparator, NaturalOrder};
pub use iter::{Cursor, IntoIter, Iter, IterMut, Keys, Values};

use self::node::{balance_factor, leftmost, rightmost, update_height, Link, Node};
use crate::alloc::{AllocError, RawAlloc};
use crate::error::bad_alloc;
use crate::trace::trace_event;
use core::alloc::Layout;
use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use serde::{Serialize, Serializer};

/// Layout of one map node; size a multipool class with this.
pub fn node_layout<K, V>() -> Layout {
    Layout::new::<Node<K, V>>()
}

/// An ordered map balanced as an AVL tree.
///
/// The allocator is borrowed for `'a` and must serve
/// [`node_layout::<K, V>()`](node_layout) requests.
pub struct AvlMap<'a, K, V, A: RawAlloc + ?Sized, C = NaturalOrder> {
    root: Link<K, V>,
    len: usize,
    cmp: C,
    alloc: &'a A,
    _owns: PhantomData<Box<Node<K, V>>>,
}

impl<'a, K, V, A: RawAlloc + ?Sized> AvlMap<'a, K, V, A, NaturalOrder>
where
    K: Ord,
{
    /// Creates an empty map ordered by `K: Ord`.
    pub fn new_in(alloc: &'a A) -> Self {
        Self::with_comparator_in(NaturalOrder, alloc)
    }
}

impl<'a, K, V, A: RawAlloc + ?Sized, C: Comparator<K>> AvlMap<'a, K, V, A, C> {
    /// Creates an empty map ordered by `cmp`.
    pub fn with_comparator_in(cmp: C, alloc: &'a A) -> Self {
        Self {
            root: None,
            len: 0,
            cmp,
            alloc,
            _owns: PhantomData,
        }
    }

    /// Inserts `key` with `value` unless the key is already present.
    ///
    /// Returns the stored value and whether an entry was added. When the key
    /// exists, `value` is dropped and the existing entry is returned as is.
    ///
    /// # Panics
    /// If the allocator cannot provide a node.
    pub fn insert(&mut self, key: K, value: V) -> (&mut V, bool) {
        self.emplace(key, || value)
    }

    /// Fallible [`insert`](Self::insert).
    ///
    /// # Errors
    /// Propagates the allocator's refusal; the map is unchanged.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<(&mut V, bool), AllocError> {
        self.try_emplace(key, || value)
    }

    /// Like [`insert`](Self::insert) but only builds the value when the key
    /// is absent.
    ///
    /// # Panics
    /// If the allocator cannot provide a node.
    pub fn emplace<F>(&mut self, key: K, make: F) -> (&mut V, bool)
    where
        F: FnOnce() -> V,
    {
        match self.try_emplace(key, make) {
            Ok(entry) => entry,
            Err(err) => bad_alloc(err),
        }
    }

    /// Fallible [`emplace`](Self::emplace).
    ///
    /// # Errors
    /// Propagates the allocator's refusal. The node is obtained before any
    /// link changes, so the map is unchanged on error.
    pub fn try_emplace<F>(&mut self, key: K, make: F) -> Result<(&mut V, bool), AllocError>
    where
        F: FnOnce() -> V,
    {
        let mut parent = None;
        let mut go_left = false;
        let mut cursor = self.root;
        while let Some(node) = cursor {
            // SAFETY: `node` is a live node of this map.
            let n = unsafe { &mut *node.as_ptr() };
            match self.cmp.compare(&key, &n.key) {
                Ordering::Less => {
                    go_left = true;
                    cursor = n.left;
                }
                Ordering::Greater => {
                    go_left = false;
                    cursor = n.right;
                }
                Ordering::Equal => return Ok((&mut n.value, false)),
            }
            parent = Some(node);
        }

        let value = make();
        let node = self.alloc.allocate(node_layout::<K, V>())?.cast::<Node<K, V>>();
        // SAFETY: fresh block sized and aligned for a node; `parent` is live.
        unsafe {
            node.as_ptr().write(Node::leaf(key, value, parent));
            match parent {
                None => self.root = Some(node),
                Some(p) if go_left => (*p.as_ptr()).left = Some(node),
                Some(p) => (*p.as_ptr()).right = Some(node),
            }
            self.len += 1;
            self.rebalance_from(parent);
            Ok((&mut (*node.as_ptr()).value, true))
        }
    }

    /// Cursor at `key`, or at the end position if the key is absent.
    pub fn find(&self, key: &K) -> Cursor<'_, K, V> {
        Cursor::new(self.find_node(key), self.root)
    }

    /// Shared reference to the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        // SAFETY: live node borrowed for the lifetime of `&self`.
        self.find_node(key).map(|node| unsafe { &(*node.as_ptr()).value })
    }

    /// Mutable reference to the value stored for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        // SAFETY: live node borrowed for the lifetime of `&mut self`.
        self.find_node(key).map(|node| unsafe { &mut (*node.as_ptr()).value })
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find_node(key).is_some()
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key`, returning the stored key and value.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let node = self.find_node(key)?;
        // SAFETY: `node` is a live node of this map.
        Some(unsafe { self.unlink(node) })
    }

    /// Drops every entry, returning all nodes to the allocator.
    pub fn clear(&mut self) {
        let root = self.root.take();
        self.len = 0;
        // SAFETY: the detached subtree is owned by nobody else now.
        unsafe { self.release_subtree(root) };
    }

    fn find_node(&self, key: &K) -> Link<K, V> {
        let mut cursor = self.root;
        while let Some(node) = cursor {
            // SAFETY: `node` is a live node of this map.
            let n = unsafe { &*node.as_ptr() };
            cursor = match self.cmp.compare(key, &n.key) {
                Ordering::Less => n.left,
                Ordering::Greater => n.right,
                Ordering::Equal => return Some(node),
            };
        }
        None
    }

    /// Walks the whole tree checking key order, AVL balance, stored heights
    /// and parent back references. O(n); meant for tests and debugging.
    pub fn is_valid(&self) -> bool {
        // SAFETY: all reachable nodes are live nodes of this map.
        unsafe {
            if let Some(root) = self.root {
                if (*root.as_ptr()).parent.is_some() {
                    return false;
                }
            }
            let mut count = 0;
            self.check_subtree(self.root, None, None, &mut count).is_some() && count == self.len
        }
    }

    /// Returns the subtree height if it is valid within the `(low, high)` key bounds.
    unsafe fn check_subtree(
        &self,
        link: Link<K, V>,
        low: Option<&K>,
        high: Option<&K>,
        count: &mut usize,
    ) -> Option<i32> {
        let Some(node) = link else {
            return Some(-1);
        };
        // SAFETY: caller contract.
        let n = unsafe { &*node.as_ptr() };
        if low.is_some_and(|low| self.cmp.compare(low, &n.key) != Ordering::Less)
            || high.is_some_and(|high| self.cmp.compare(&n.key, high) != Ordering::Less)
        {
            return None;
        }
        for child in [n.left, n.right].into_iter().flatten() {
            // SAFETY: caller contract.
            if unsafe { (*child.as_ptr()).parent } != Some(node) {
                return None;
            }
        }
        *count += 1;
        // SAFETY: children are live nodes of this map.
        let left = unsafe { self.check_subtree(n.left, low, Some(&n.key), count)? };
        let right = unsafe { self.check_subtree(n.right, Some(&n.key), high, count)? };
        let balanced = (left - right).abs() <= 1;
        let height = left.max(right) + 1;
        (balanced && height == n.height).then_some(height)
    }
}

impl<'a, K, V, A: RawAlloc + ?Sized, C> AvlMap<'a, K, V, A, C> {
    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree: -1 when empty, 0 for a single entry.
    #[inline]
    pub fn height(&self) -> i32 {
        // SAFETY: the root, if any, is a live node of this map.
        unsafe { node::height(self.root) }
    }

    /// The allocator the nodes come from.
    #[inline]
    pub fn allocator(&self) -> &'a A {
        self.alloc
    }

    /// The key comparator.
    #[inline]
    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    /// Iterates entries in key order; double-ended.
    pub fn iter(&self) -> Iter<'_, K, V> {
        // SAFETY: the root, if any, is live.
        unsafe { Iter::new(self.root, self.len) }
    }

    /// Iterates entries in key order with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        // SAFETY: the root, if any, is live and `&mut self` is held.
        unsafe { IterMut::new(self.root, self.len) }
    }

    /// Keys in order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Values in key order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Cursor at the smallest key (the end position if empty).
    pub fn cursor_front(&self) -> Cursor<'_, K, V> {
        // SAFETY: the root, if any, is live.
        Cursor::new(self.root.map(|root| unsafe { leftmost(root) }), self.root)
    }

    /// Cursor at the largest key (the end position if empty).
    pub fn cursor_back(&self) -> Cursor<'_, K, V> {
        // SAFETY: the root, if any, is live.
        Cursor::new(self.root.map(|root| unsafe { rightmost(root) }), self.root)
    }

    /// Entry with the smallest key.
    pub fn first(&self) -> Option<(&K, &V)> {
        self.cursor_front().key_value()
    }

    /// Entry with the largest key.
    pub fn last(&self) -> Option<(&K, &V)> {
        self.cursor_back().key_value()
    }

    /// Removes and returns the entry with the smallest key.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        // SAFETY: the root and its leftmost descendant are live.
        let node = unsafe { leftmost(self.root?) };
        // SAFETY: `node` belongs to this map.
        Some(unsafe { self.unlink(node) })
    }

    /// Removes and returns the entry with the largest key.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        // SAFETY: the root and its rightmost descendant are live.
        let node = unsafe { rightmost(self.root?) };
        // SAFETY: `node` belongs to this map.
        Some(unsafe { self.unlink(node) })
    }

    /// Detaches `z` from the tree, rebalances, and frees its block.
    ///
    /// A node with two children is replaced by its inorder successor node
    /// itself, so no other entry changes address.
    unsafe fn unlink(&mut self, z: NonNull<Node<K, V>>) -> (K, V) {
        // SAFETY: caller guarantees `z` is a live node of this map; every
        // node reached below is reachable from it or the root.
        unsafe {
            let zp = z.as_ptr();
            let rebalance_start = match ((*zp).left, (*zp).right) {
                (None, child) | (child, None) => {
                    self.transplant(z, child);
                    (*zp).parent
                }
                (Some(left), Some(right)) => {
                    let y = leftmost(right);
                    let yp = y.as_ptr();
                    let start = if (*yp).parent == Some(z) {
                        y
                    } else {
                        let start = (*yp).parent;
                        self.transplant(y, (*yp).right);
                        (*yp).right = Some(right);
                        (*right.as_ptr()).parent = Some(y);
                        start.unwrap_or(y)
                    };
                    self.transplant(z, Some(y));
                    (*yp).left = Some(left);
                    (*left.as_ptr()).parent = Some(y);
                    Some(start)
                }
            };
            self.rebalance_from(rebalance_start);
            self.len -= 1;

            let Node { key, value, .. } = ptr::read(zp);
            self.alloc.deallocate(z.cast(), node_layout::<K, V>());
            (key, value)
        }
    }

    /// Puts `new` where `old` hangs from its parent (or at the root).
    unsafe fn transplant(&mut self, old: NonNull<Node<K, V>>, new: Link<K, V>) {
        // SAFETY: caller guarantees both are live nodes of this map.
        unsafe {
            let parent = (*old.as_ptr()).parent;
            self.replace_child(parent, old, new);
            if let Some(new) = new {
                (*new.as_ptr()).parent = parent;
            }
        }
    }

    /// Repoints `parent`'s link to `old` at `new`; a `None` parent means the root.
    unsafe fn replace_child(&mut self, parent: Link<K, V>, old: NonNull<Node<K, V>>, new: Link<K, V>) {
        match parent {
            None => self.root = new,
            // SAFETY: caller guarantees `p` is live.
            Some(p) => unsafe {
                let p = p.as_ptr();
                if (*p).left == Some(old) {
                    (*p).left = new;
                } else {
                    (*p).right = new;
                }
            },
        }
    }

    /// Recomputes heights from `start` up to the root, rotating wherever the
    /// balance factor reaches two.
    unsafe fn rebalance_from(&mut self, start: Link<K, V>) {
        let mut cursor = start;
        while let Some(node) = cursor {
            // SAFETY: `node` is live; rotations keep every ancestor live.
            unsafe {
                let top = self.rebalance_node(node);
                cursor = (*top.as_ptr()).parent;
            }
        }
    }

    /// Restores balance at `node` and returns the root of its subtree.
    unsafe fn rebalance_node(&mut self, node: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
        // SAFETY: caller guarantees `node` is live; a child on the heavy
        // side exists whenever the balance factor is beyond one.
        unsafe {
            update_height(node);
            let n = node.as_ptr();
            match balance_factor(node) {
                2 => {
                    if let Some(left) = (*n).left {
                        if balance_factor(left) < 0 {
                            self.rotate_left(left);
                        }
                    }
                    self.rotate_right(node)
                }
                -2 => {
                    if let Some(right) = (*n).right {
                        if balance_factor(right) > 0 {
                            self.rotate_right(right);
                        }
                    }
                    self.rotate_left(node)
                }
                _ => node,
            }
        }
    }

    /// Promotes `x`'s right child into `x`'s place. Returns the new subtree root.
    unsafe fn rotate_left(&mut self, x: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
        // SAFETY: caller guarantees `x` is live.
        unsafe {
            let xp = x.as_ptr();
            let Some(y) = (*xp).right else {
                return x;
            };
            let yp = y.as_ptr();
            (*xp).right = (*yp).left;
            if let Some(inner) = (*yp).left {
                (*inner.as_ptr()).parent = Some(x);
            }
            (*yp).parent = (*xp).parent;
            self.replace_child((*xp).parent, x, Some(y));
            (*yp).left = Some(x);
            (*xp).parent = Some(y);
            update_height(x);
            update_height(y);
            trace_event!(TRACE, "avl left rotation");
            y
        }
    }

    /// Promotes `x`'s left child into `x`'s place. Returns the new subtree root.
    unsafe fn rotate_right(&mut self, x: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
        // SAFETY: caller guarantees `x` is live.
        unsafe {
            let xp = x.as_ptr();
            let Some(y) = (*xp).left else {
                return x;
            };
            let yp = y.as_ptr();
            (*xp).left = (*yp).right;
            if let Some(inner) = (*yp).right {
                (*inner.as_ptr()).parent = Some(x);
            }
            (*yp).parent = (*xp).parent;
            self.replace_child((*xp).parent, x, Some(y));
            (*yp).right = Some(x);
            (*xp).parent = Some(y);
            update_height(x);
            update_height(y);
            trace_event!(TRACE, "avl right rotation");
            y
        }
    }

    /// Post-order release of a detached subtree.
    unsafe fn release_subtree(&self, link: Link<K, V>) {
        if let Some(node) = link {
            // SAFETY: caller owns the subtree; children are released before
            // their parent's block goes back to the allocator.
            unsafe {
                self.release_subtree((*node.as_ptr()).left);
                self.release_subtree((*node.as_ptr()).right);
                ptr::drop_in_place(node.as_ptr());
                self.alloc.deallocate(node.cast(), node_layout::<K, V>());
            }
        }
    }
}

impl<K, V, A: RawAlloc + ?Sized, C> Drop for AvlMap<'_, K, V, A, C> {
    fn drop(&mut self) {
        let root = self.root.take();
        // SAFETY: the map is going away; the tree is owned by nobody else.
        unsafe { self.release_subtree(root) };
    }
}

impl<K, V, A: RawAlloc + ?Sized, C: Comparator<K>> Extend<(K, V)> for AvlMap<'_, K, V, A, C> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'m, K, V, A: RawAlloc + ?Sized, C> IntoIterator for &'m AvlMap<'_, K, V, A, C> {
    type Item = (&'m K, &'m V);
    type IntoIter = Iter<'m, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'m, K, V, A: RawAlloc + ?Sized, C> IntoIterator for &'m mut AvlMap<'_, K, V, A, C> {
    type Item = (&'m K, &'m mut V);
    type IntoIter = IterMut<'m, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<'a, K, V, A: RawAlloc + ?Sized, C> IntoIterator for AvlMap<'a, K, V, A, C> {
    type Item = (K, V);
    type IntoIter = IntoIter<'a, K, V, A, C>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { map: self }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, A: RawAlloc + ?Sized, C> fmt::Debug for AvlMap<'_, K, V, A, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Serialize, V: Serialize, A: RawAlloc + ?Sized, C> Serialize for AvlMap<'_, K, V, A, C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}
