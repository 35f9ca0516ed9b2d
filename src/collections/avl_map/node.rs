//! Tree nodes and the pointer walks that only need node links.

use core::ptr::NonNull;

pub(super) type Link<K, V> = Option<NonNull<Node<K, V>>>;

/// One map entry. `left`/`right` own their subtrees; `parent` is a
/// non-owning back reference used by rotations and iteration.
pub(super) struct Node<K, V> {
    pub(super) key: K,
    pub(super) value: V,
    pub(super) parent: Link<K, V>,
    pub(super) left: Link<K, V>,
    pub(super) right: Link<K, V>,
    /// Leaf = 0, empty subtree = -1.
    pub(super) height: i32,
}

impl<K, V> Node<K, V> {
    pub(super) fn leaf(key: K, value: V, parent: Link<K, V>) -> Self {
        Self {
            key,
            value,
            parent,
            left: None,
            right: None,
            height: 0,
        }
    }
}

// All helpers below require `node` (and every node reachable from it) to be
// live and owned by the same map.

#[inline]
pub(super) unsafe fn height<K, V>(link: Link<K, V>) -> i32 {
    match link {
        // SAFETY: see module note.
        Some(node) => unsafe { (*node.as_ptr()).height },
        None => -1,
    }
}

#[inline]
pub(super) unsafe fn update_height<K, V>(node: NonNull<Node<K, V>>) {
    // SAFETY: see module note.
    unsafe {
        let n = node.as_ptr();
        (*n).height = height((*n).left).max(height((*n).right)) + 1;
    }
}

/// `height(left) - height(right)`.
#[inline]
pub(super) unsafe fn balance_factor<K, V>(node: NonNull<Node<K, V>>) -> i32 {
    // SAFETY: see module note.
    unsafe {
        let n = node.as_ptr();
        height((*n).left) - height((*n).right)
    }
}

pub(super) unsafe fn leftmost<K, V>(mut node: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
    // SAFETY: see module note.
    unsafe {
        while let Some(left) = (*node.as_ptr()).left {
            node = left;
        }
    }
    node
}

pub(super) unsafe fn rightmost<K, V>(mut node: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
    // SAFETY: see module note.
    unsafe {
        while let Some(right) = (*node.as_ptr()).right {
            node = right;
        }
    }
    node
}

/// Inorder successor: leftmost of the right subtree, else the first ancestor
/// reached from its left side. `None` is the end position.
pub(super) unsafe fn successor<K, V>(node: NonNull<Node<K, V>>) -> Link<K, V> {
    // SAFETY: see module note.
    unsafe {
        if let Some(right) = (*node.as_ptr()).right {
            return Some(leftmost(right));
        }
        let mut child = node;
        let mut parent = (*node.as_ptr()).parent;
        while let Some(p) = parent {
            if (*p.as_ptr()).left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = (*p.as_ptr()).parent;
        }
        None
    }
}

/// Mirror image of [`successor`].
pub(super) unsafe fn predecessor<K, V>(node: NonNull<Node<K, V>>) -> Link<K, V> {
    // SAFETY: see module note.
    unsafe {
        if let Some(left) = (*node.as_ptr()).left {
            return Some(rightmost(left));
        }
        let mut child = node;
        let mut parent = (*node.as_ptr()).parent;
        while let Some(p) = parent {
            if (*p.as_ptr()).right == Some(child) {
                return Some(p);
            }
            child = p;
            parent = (*p.as_ptr()).parent;
        }
        None
    }
}
