use core::mem;

use super::handle::Handle;
use super::size::Size;

// Deepest possible descent: red links at most double the black height, and
// the black height is bounded by the width of the handle space.
#[cfg(test)]
pub(crate) const MAX_HEIGHT: usize = 32;
#[cfg(not(test))]
pub(crate) const MAX_HEIGHT: usize = 64;

/// The color of a node's incoming link (the link from its parent).
///
/// A red link glues a node to its parent into one conceptual 2-3 tree node,
/// and red links lean left only. The root's incoming link is always black.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Color {
    Red,
    Black,
}

pub(crate) struct Node<K> {
    key: K,
    // Handle of the payload in the value arena. Values live outside the tree
    // structure, so rotations and payload swaps never move them.
    value: Handle,
    left: Option<Handle>,
    right: Option<Handle>,
    color: Color,
    // The number of keys in the subtree rooted at this node, including itself.
    size: Size,
    // Longest edge count from this node down to a leaf; an empty link is -1.
    height: i8,
}

impl<K> Node<K> {
    /// Creates a new leaf: red incoming link, size 1, height 0.
    pub(crate) fn new(key: K, value: Handle) -> Self {
        Self {
            key,
            value,
            left: None,
            right: None,
            color: Color::Red,
            size: Size::from_usize(1),
            height: 0,
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub(crate) fn value(&self) -> Handle {
        self.value
    }

    /// Replaces the stored key with an equal one, returning the old key.
    pub(crate) fn replace_key(&mut self, key: K) -> K {
        mem::replace(&mut self.key, key)
    }

    /// Swaps key and value handle with another node, leaving both nodes'
    /// links, colors, and cached size/height in place.
    pub(crate) fn swap_payload(&mut self, other: &mut Self) {
        mem::swap(&mut self.key, &mut other.key);
        mem::swap(&mut self.value, &mut other.value);
    }

    /// Consumes the node, returning its key and value handle.
    pub(crate) fn into_key_value(self) -> (K, Handle) {
        (self.key, self.value)
    }

    #[inline]
    pub(crate) fn left(&self) -> Option<Handle> {
        self.left
    }

    pub(crate) fn set_left(&mut self, link: Option<Handle>) {
        self.left = link;
    }

    pub(crate) fn take_left(&mut self) -> Option<Handle> {
        self.left.take()
    }

    #[inline]
    pub(crate) fn right(&self) -> Option<Handle> {
        self.right
    }

    pub(crate) fn set_right(&mut self, link: Option<Handle>) {
        self.right = link;
    }

    pub(crate) fn take_right(&mut self) -> Option<Handle> {
        self.right.take()
    }

    #[inline]
    pub(crate) fn color(&self) -> Color {
        self.color
    }

    pub(crate) fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Toggles the incoming link color.
    pub(crate) fn flip_color(&mut self) {
        self.color = match self.color {
            Color::Red => Color::Black,
            Color::Black => Color::Red,
        };
    }

    #[inline]
    pub(crate) fn is_red(&self) -> bool {
        matches!(self.color, Color::Red)
    }

    #[inline]
    pub(crate) fn size(&self) -> Size {
        self.size
    }

    pub(crate) fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    #[inline]
    pub(crate) fn height(&self) -> i8 {
        self.height
    }

    pub(crate) fn set_height(&mut self, height: i8) {
        self.height = height;
    }
}
