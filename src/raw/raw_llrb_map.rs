use core::borrow::Borrow;
use core::cmp::Ordering;

use super::arena::Arena;
use super::handle::Handle;
use super::node::{Color, Node};
use super::size::Size;
use crate::invariant::InvariantError;

/// The core left-leaning red-black tree backing `LlrbMap`.
pub(crate) struct RawLlrbMap<K, V> {
    /// Arena storing all tree nodes.
    nodes: Arena<Node<K>>,
    /// Arena storing all values (separate from nodes so structural edits
    /// never move payloads).
    values: Arena<V>,
    /// Handle to the root node, if the tree is non-empty.
    root: Option<Handle>,
    /// Total number of key-value pairs in the tree.
    len: usize,
}

impl<K, V> RawLlrbMap<K, V> {
    /// Creates a new, empty tree.
    pub(crate) const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            values: Arena::new(),
            root: None,
            len: 0,
        }
    }

    /// Creates a new tree with the specified capacity.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Arena::with_capacity(capacity),
            values: Arena::with_capacity(capacity),
            root: None,
            len: 0,
        }
    }

    /// Returns the number of key-value pairs in the tree.
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree contains no elements.
    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the capacity of the tree.
    pub(crate) fn capacity(&self) -> usize {
        self.values.capacity()
    }

    /// Clears all elements from the tree.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.values.clear();
        self.root = None;
        self.len = 0;
    }

    /// Drains all key-value pairs from the tree in ascending key order.
    /// This is O(n) as it avoids rebalancing, unlike repeated `pop_first`.
    pub(crate) fn drain_to_vec(&mut self) -> alloc::vec::Vec<(K, V)> {
        let mut result = alloc::vec::Vec::with_capacity(self.len);
        let root = self.root.take();
        self.drain_at(root, &mut result);

        self.nodes.clear();
        self.values.clear();
        self.len = 0;

        result
    }

    /// In-order teardown walk. Every visited node and value leaves its arena.
    fn drain_at(&mut self, link: Option<Handle>, out: &mut alloc::vec::Vec<(K, V)>) {
        let Some(handle) = link else { return };

        let node = self.nodes.take(handle);
        let right = node.right();
        self.drain_at(node.left(), out);
        let (key, value_handle) = node.into_key_value();
        out.push((key, self.values.take(value_handle)));
        self.drain_at(right, out);
    }

    /// Returns a reference to the root node, if any.
    pub(crate) fn root(&self) -> Option<Handle> {
        self.root
    }

    /// Returns a reference to a node by handle.
    pub(crate) fn node(&self, handle: Handle) -> &Node<K> {
        self.nodes.get(handle)
    }

    /// Returns a reference to a node by handle from a raw pointer.
    ///
    /// # Safety
    /// - `ptr` must point to a valid, allocated `RawLlrbMap<K, V>`.
    pub(crate) unsafe fn node_ptr<'a>(ptr: *const Self, handle: Handle) -> &'a Node<K> {
        // SAFETY: We only access the `nodes` field through addr_of, avoiding aliasing with
        // the `values` field.
        unsafe { Arena::get_ptr(core::ptr::addr_of!((*ptr).nodes), handle) }
    }

    /// Returns a reference to a value by handle.
    pub(crate) fn value(&self, handle: Handle) -> &V {
        self.values.get(handle)
    }

    /// Returns a mutable reference to a value by handle from a raw pointer.
    ///
    /// # Safety
    /// - `ptr` must point to a valid, allocated `RawLlrbMap<K, V>`.
    /// - The caller must ensure no other mutable references to the values arena exist.
    /// - The caller must have logical exclusive access to the value at `handle`.
    pub(crate) unsafe fn value_mut_ptr<'a>(ptr: *mut Self, handle: Handle) -> &'a mut V {
        // SAFETY: We only access the `values` field, avoiding aliasing with the `nodes` field.
        unsafe { (*core::ptr::addr_of_mut!((*ptr).values)).get_mut(handle) }
    }

    /// Returns the stored height of the root in edges, or `None` when empty.
    pub(crate) fn height(&self) -> Option<i8> {
        self.root.map(|handle| self.nodes.get(handle).height())
    }

    /// Returns the key and value of a node.
    fn key_value(&self, handle: Handle) -> (&K, &V) {
        let node = self.nodes.get(handle);
        (node.key(), self.values.get(node.value()))
    }

    /// Returns both child links of a node.
    fn links(&self, handle: Handle) -> (Option<Handle>, Option<Handle>) {
        let node = self.nodes.get(handle);
        (node.left(), node.right())
    }

    /// Returns the left-left grandchild link of a node.
    fn left_left(&self, handle: Handle) -> Option<Handle> {
        self.nodes.get(handle).left().and_then(|left| self.nodes.get(left).left())
    }

    /// Returns the right-left grandchild link of a node.
    fn right_left(&self, handle: Handle) -> Option<Handle> {
        self.nodes.get(handle).right().and_then(|right| self.nodes.get(right).left())
    }

    /// Returns true if the link is red. Empty links are black.
    fn is_red(&self, link: Option<Handle>) -> bool {
        link.is_some_and(|handle| self.nodes.get(handle).is_red())
    }

    /// Returns the cached size of the subtree behind a link. Empty links are 0.
    fn link_size(&self, link: Option<Handle>) -> usize {
        link.map_or(0, |handle| self.nodes.get(handle).size().to_usize())
    }

    /// Returns the cached height of the subtree behind a link. Empty links are -1.
    fn link_height(&self, link: Option<Handle>) -> i8 {
        link.map_or(-1, |handle| self.nodes.get(handle).height())
    }

    /// Recomputes a node's cached size and height from its children.
    fn update(&mut self, handle: Handle) {
        let (left, right) = self.links(handle);
        let size = self.link_size(left) + self.link_size(right) + 1;
        let height = 1 + self.link_height(left).max(self.link_height(right));

        let node = self.nodes.get_mut(handle);
        node.set_size(Size::from_usize(size));
        node.set_height(height);
    }

    /// Rotates the red right child of `handle` up to the left. The promoted
    /// node takes over the demoted node's color; the demoted node turns red.
    fn rotate_left(&mut self, handle: Handle) -> Handle {
        let right = self
            .nodes
            .get_mut(handle)
            .take_right()
            .expect("`RawLlrbMap::rotate_left()` - no right child to rotate!");
        debug_assert!(self.nodes.get(right).is_red(), "rotate_left: rotating a black link");

        let (demoted, promoted) = self.nodes.get2_mut(handle, right);
        demoted.set_right(promoted.take_left());
        promoted.set_color(demoted.color());
        demoted.set_color(Color::Red);
        promoted.set_left(Some(handle));

        // Demoted node first, so the promoted node reads fresh child caches.
        self.update(handle);
        self.update(right);
        right
    }

    /// Rotates the red left child of `handle` up to the right.
    fn rotate_right(&mut self, handle: Handle) -> Handle {
        let left = self
            .nodes
            .get_mut(handle)
            .take_left()
            .expect("`RawLlrbMap::rotate_right()` - no left child to rotate!");
        debug_assert!(self.nodes.get(left).is_red(), "rotate_right: rotating a black link");

        let (demoted, promoted) = self.nodes.get2_mut(handle, left);
        demoted.set_left(promoted.take_right());
        promoted.set_color(demoted.color());
        demoted.set_color(Color::Red);
        promoted.set_right(Some(handle));

        self.update(handle);
        self.update(left);
        left
    }

    /// Inverts the colors of `handle` and both of its children.
    fn color_flip(&mut self, handle: Handle) {
        let (left, right) = self.links(handle);
        self.nodes.get_mut(handle).flip_color();
        if let Some(left) = left {
            self.nodes.get_mut(left).flip_color();
        }
        if let Some(right) = right {
            self.nodes.get_mut(right).flip_color();
        }
    }

    /// Restores the left-leaning invariants on the way back up. The three
    /// cases run in exactly this order; afterwards the cached size and
    /// height are refreshed. Returns the subtree's possibly-new root.
    fn balance(&mut self, mut handle: Handle) -> Handle {
        let (left, right) = self.links(handle);
        if self.is_red(right) && !self.is_red(left) {
            handle = self.rotate_left(handle);
        }

        if self.is_red(self.nodes.get(handle).left()) && self.is_red(self.left_left(handle)) {
            handle = self.rotate_right(handle);
        }

        let (left, right) = self.links(handle);
        if self.is_red(left) && self.is_red(right) {
            self.color_flip(handle);
        }

        self.update(handle);
        handle
    }

    /// Makes either `handle`'s left child or one of the left child's children
    /// red, borrowing from the right sibling if it has a spare.
    fn move_red_left(&mut self, mut handle: Handle) -> Handle {
        self.color_flip(handle);
        if self.is_red(self.right_left(handle)) {
            let right = self
                .nodes
                .get_mut(handle)
                .take_right()
                .expect("`RawLlrbMap::move_red_left()` - no right child to borrow from!");
            let new_right = self.rotate_right(right);
            self.nodes.get_mut(handle).set_right(Some(new_right));
            handle = self.rotate_left(handle);
            self.color_flip(handle);
        }
        handle
    }

    /// Makes either `handle`'s right child or one of the right child's
    /// children red, borrowing from the left sibling if it has a spare.
    fn move_red_right(&mut self, mut handle: Handle) -> Handle {
        self.color_flip(handle);
        if self.is_red(self.left_left(handle)) {
            handle = self.rotate_right(handle);
            self.color_flip(handle);
        }
        handle
    }
}

impl<K: Ord, V> RawLlrbMap<K, V> {
    /// Searches for a key and returns its node handle if present.
    pub(crate) fn search<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;

        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            match key.cmp(node.key().borrow()) {
                Ordering::Less => current = node.left(),
                Ordering::Greater => current = node.right(),
                Ordering::Equal => return Some(handle),
            }
        }

        None
    }

    /// Returns a reference to the value corresponding to the key.
    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.search(key)?;
        let value_handle = self.nodes.get(handle).value();
        Some(self.values.get(value_handle))
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub(crate) fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.search(key)?;
        let value_handle = self.nodes.get(handle).value();
        Some(self.values.get_mut(value_handle))
    }

    /// Returns the key-value pair corresponding to the key.
    pub(crate) fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.search(key).map(|handle| self.key_value(handle))
    }

    /// Returns true if the tree contains the specified key.
    pub(crate) fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.search(key).is_some()
    }

    /// Returns the first key-value pair in the tree.
    pub(crate) fn first_key_value(&self) -> Option<(&K, &V)> {
        let mut current = self.root?;

        loop {
            match self.nodes.get(current).left() {
                Some(left) => current = left,
                None => return Some(self.key_value(current)),
            }
        }
    }

    /// Returns the last key-value pair in the tree.
    pub(crate) fn last_key_value(&self) -> Option<(&K, &V)> {
        let mut current = self.root?;

        loop {
            match self.nodes.get(current).right() {
                Some(right) => current = right,
                None => return Some(self.key_value(current)),
            }
        }
    }

    /// Returns the entry with the greatest key less than or equal to `key`.
    pub(crate) fn floor<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;
        let mut candidate = None;

        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            match node.key().borrow().cmp(key) {
                // A smaller key qualifies; something bigger may still qualify.
                Ordering::Less => {
                    candidate = Some(handle);
                    current = node.right();
                }
                Ordering::Equal => return Some(self.key_value(handle)),
                Ordering::Greater => current = node.left(),
            }
        }

        candidate.map(|handle| self.key_value(handle))
    }

    /// Returns the entry with the least key greater than or equal to `key`.
    pub(crate) fn ceiling<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;
        let mut candidate = None;

        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            match node.key().borrow().cmp(key) {
                Ordering::Less => current = node.right(),
                Ordering::Equal => return Some(self.key_value(handle)),
                Ordering::Greater => {
                    candidate = Some(handle);
                    current = node.left();
                }
            }
        }

        candidate.map(|handle| self.key_value(handle))
    }

    /// Inserts a key-value pair into the tree.
    /// Returns the old value if the key was already present.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (root, old_value) = self.insert_at(self.root, key, value);
        self.nodes.get_mut(root).set_color(Color::Black);
        self.root = Some(root);

        if old_value.is_none() {
            self.len += 1;
        }
        old_value
    }

    /// Recursive insert. An empty link becomes a new red leaf; every return
    /// path rebalances. An equal key replaces its value in place, leaving
    /// the structure untouched.
    fn insert_at(&mut self, link: Option<Handle>, key: K, value: V) -> (Handle, Option<V>) {
        let Some(handle) = link else {
            let value_handle = self.values.alloc(value);
            return (self.nodes.alloc(Node::new(key, value_handle)), None);
        };

        let node = self.nodes.get(handle);
        let (left, right, value_handle) = (node.left(), node.right(), node.value());
        let old_value = match key.cmp(node.key()) {
            Ordering::Less => {
                let (child, old_value) = self.insert_at(left, key, value);
                self.nodes.get_mut(handle).set_left(Some(child));
                old_value
            }
            Ordering::Greater => {
                let (child, old_value) = self.insert_at(right, key, value);
                self.nodes.get_mut(handle).set_right(Some(child));
                old_value
            }
            Ordering::Equal => Some(core::mem::replace(self.values.get_mut(value_handle), value)),
        };

        (self.balance(handle), old_value)
    }

    /// Inserts `key`, or swaps it into the node already holding an equal key.
    /// The in-place swap keeps the tree shape untouched, unlike a
    /// remove-and-reinsert. Returns the previously stored equal key, if any.
    pub(crate) fn replace_key(&mut self, key: K, value: V) -> Option<K> {
        if let Some(handle) = self.search(&key) {
            Some(self.nodes.get_mut(handle).replace_key(key))
        } else {
            self.insert(key, value);
            None
        }
    }

    /// Removes a key from the tree, returning the stored value if present.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes a key from the tree, returning the stored entry if present.
    ///
    /// The destructive pass recolors on the way down, so presence is
    /// confirmed first and the absent-key case stays read-only.
    pub(crate) fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.search(key)?;
        let root = self.root?;

        let (root, removed) = self.remove_at(root, key);
        self.root = root;
        if let Some(handle) = root {
            self.nodes.get_mut(handle).set_color(Color::Black);
        }
        self.len -= 1;

        let (key, value_handle) = removed.into_key_value();
        Some((key, self.values.take(value_handle)))
    }

    /// Recursive delete of a key confirmed to be in this subtree. Before
    /// descending into a 2-node the matching move-red primitive borrows a
    /// red link, so the bottom of the recursion always deletes out of a
    /// 3-node or 4-node. Returns the new subtree root and the detached node.
    fn remove_at<Q>(&mut self, mut handle: Handle, key: &Q) -> (Option<Handle>, Node<K>)
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        if key < self.nodes.get(handle).key().borrow() {
            if !self.is_red(self.nodes.get(handle).left()) && !self.is_red(self.left_left(handle)) {
                handle = self.move_red_left(handle);
            }

            let left = self
                .nodes
                .get(handle)
                .left()
                .expect("`RawLlrbMap::remove_at()` - `key` is not in the tree!");
            let (new_left, removed) = self.remove_at(left, key);
            self.nodes.get_mut(handle).set_left(new_left);
            (Some(self.balance(handle)), removed)
        } else {
            if self.is_red(self.nodes.get(handle).left()) {
                handle = self.rotate_right(handle);
            }

            // Rotations above may have changed which node we are looking at,
            // so every comparison below reads the key afresh.
            if key == self.nodes.get(handle).key().borrow() && self.nodes.get(handle).right().is_none() {
                return (None, self.nodes.take(handle));
            }

            let right = self.nodes.get(handle).right();
            if right.is_some() && !self.is_red(right) && !self.is_red(self.right_left(handle)) {
                handle = self.move_red_right(handle);
            }

            if key == self.nodes.get(handle).key().borrow() {
                // Successor swap: detach the right subtree's minimum and trade
                // payloads with it, so the node leaving the arena carries the
                // removed key and the in-place node carries the successor's.
                let right = self
                    .nodes
                    .get(handle)
                    .right()
                    .expect("`RawLlrbMap::remove_at()` - `key` is not in the tree!");
                let (new_right, mut successor) = self.pop_first_at(right);
                let node = self.nodes.get_mut(handle);
                node.swap_payload(&mut successor);
                node.set_right(new_right);
                (Some(self.balance(handle)), successor)
            } else {
                let right = self
                    .nodes
                    .get(handle)
                    .right()
                    .expect("`RawLlrbMap::remove_at()` - `key` is not in the tree!");
                let (new_right, removed) = self.remove_at(right, key);
                self.nodes.get_mut(handle).set_right(new_right);
                (Some(self.balance(handle)), removed)
            }
        }
    }

    /// Removes and returns the first (minimum) key-value pair.
    pub(crate) fn pop_first(&mut self) -> Option<(K, V)> {
        let root = self.root?;

        let (root, removed) = self.pop_first_at(root);
        self.root = root;
        if let Some(handle) = root {
            self.nodes.get_mut(handle).set_color(Color::Black);
        }
        self.len -= 1;

        let (key, value_handle) = removed.into_key_value();
        Some((key, self.values.take(value_handle)))
    }

    /// Removes the minimum of a non-empty subtree. Returns the new subtree
    /// root and the detached node.
    fn pop_first_at(&mut self, mut handle: Handle) -> (Option<Handle>, Node<K>) {
        if self.nodes.get(handle).left().is_none() {
            // No left child means no right child either: a red right link
            // would lean the wrong way and a black one would unbalance the
            // black count. The node unlinks whole.
            return (None, self.nodes.take(handle));
        }

        if !self.is_red(self.nodes.get(handle).left()) && !self.is_red(self.left_left(handle)) {
            handle = self.move_red_left(handle);
        }

        let left = self
            .nodes
            .get(handle)
            .left()
            .expect("`RawLlrbMap::pop_first_at()` - `handle` has no left child!");
        let (new_left, removed) = self.pop_first_at(left);
        self.nodes.get_mut(handle).set_left(new_left);
        (Some(self.balance(handle)), removed)
    }

    /// Removes and returns the last (maximum) key-value pair.
    pub(crate) fn pop_last(&mut self) -> Option<(K, V)> {
        let root = self.root?;

        let (root, removed) = self.pop_last_at(root);
        self.root = root;
        if let Some(handle) = root {
            self.nodes.get_mut(handle).set_color(Color::Black);
        }
        self.len -= 1;

        let (key, value_handle) = removed.into_key_value();
        Some((key, self.values.take(value_handle)))
    }

    /// Removes the maximum of a non-empty subtree. Mirror of `pop_first_at`,
    /// except a leaning red left link must first be rotated out of the way.
    fn pop_last_at(&mut self, mut handle: Handle) -> (Option<Handle>, Node<K>) {
        if self.is_red(self.nodes.get(handle).left()) {
            handle = self.rotate_right(handle);
        }

        if self.nodes.get(handle).right().is_none() {
            return (None, self.nodes.take(handle));
        }

        let right = self.nodes.get(handle).right();
        if !self.is_red(right) && !self.is_red(self.right_left(handle)) {
            handle = self.move_red_right(handle);
        }

        let right = self
            .nodes
            .get(handle)
            .right()
            .expect("`RawLlrbMap::pop_last_at()` - `handle` has no right child!");
        let (new_right, removed) = self.pop_last_at(right);
        self.nodes.get_mut(handle).set_right(new_right);
        (Some(self.balance(handle)), removed)
    }

    /// Gets an element by its rank (0-indexed position in sorted order).
    pub(crate) fn get_by_rank(&self, rank: usize) -> Option<(&K, &V)> {
        if rank >= self.len {
            return None;
        }

        let mut current = self.root?;
        let mut remaining = rank;

        loop {
            let node = self.nodes.get(current);
            let left_size = self.link_size(node.left());

            match remaining.cmp(&left_size) {
                Ordering::Less => {
                    current = node.left().expect("`RawLlrbMap::get_by_rank()` - size invariant violated!");
                }
                Ordering::Equal => return Some(self.key_value(current)),
                Ordering::Greater => {
                    remaining -= left_size + 1;
                    current = node.right().expect("`RawLlrbMap::get_by_rank()` - size invariant violated!");
                }
            }
        }
    }

    /// Gets a mutable element by its rank.
    pub(crate) fn get_by_rank_mut(&mut self, rank: usize) -> Option<(&K, &mut V)> {
        if rank >= self.len {
            return None;
        }

        let mut current = self.root?;
        let mut remaining = rank;

        loop {
            let node = self.nodes.get(current);
            let left_size = self.link_size(node.left());

            match remaining.cmp(&left_size) {
                Ordering::Less => {
                    current = node.left().expect("`RawLlrbMap::get_by_rank_mut()` - size invariant violated!");
                }
                Ordering::Equal => {
                    let key_ptr = core::ptr::from_ref(node.key());
                    let value_handle = node.value();
                    // We need to return both a reference to the key and a mutable reference
                    // to the value. The borrow checker sees `self` as borrowed twice, but
                    // this is actually safe because keys and values are stored in separate
                    // arenas (self.nodes vs self.values) that don't alias.
                    //
                    // SAFETY:
                    // - `key_ptr` points into `self.nodes` arena (via the node)
                    // - `value` points into `self.values` arena
                    // - These arenas are disjoint memory regions
                    // - We only mutate `self.values`, never `self.nodes`
                    // - The key reference remains valid because we don't modify the nodes arena
                    let value = self.values.get_mut(value_handle);
                    return Some((unsafe { &*key_ptr }, value));
                }
                Ordering::Greater => {
                    remaining -= left_size + 1;
                    current = node.right().expect("`RawLlrbMap::get_by_rank_mut()` - size invariant violated!");
                }
            }
        }
    }

    /// Returns the number of keys strictly less than `key`.
    ///
    /// Total over the whole key space: for an absent key this is the rank
    /// it would take on insertion.
    pub(crate) fn rank_of<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;
        let mut rank = 0;

        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            match key.cmp(node.key().borrow()) {
                Ordering::Less => current = node.left(),
                Ordering::Greater => {
                    rank += self.link_size(node.left()) + 1;
                    current = node.right();
                }
                Ordering::Equal => return rank + self.link_size(node.left()),
            }
        }

        rank
    }

    /// Re-derives every structural invariant from scratch and reports the
    /// first violation: BST order, the 2-3 shape (no red right child, no
    /// doubled red left link), black balance, the cached size and height of
    /// every node, the root color, and the rank/select round trip.
    pub(crate) fn check_invariants(&self) -> Result<(), InvariantError> {
        let Some(root) = self.root else {
            return if self.len == 0 {
                Ok(())
            } else {
                Err(InvariantError::SizeMismatch {
                    stored: self.len,
                    computed: 0,
                })
            };
        };

        if self.nodes.get(root).is_red() {
            return Err(InvariantError::RedRoot);
        }

        let (_, size, _) = self.check_subtree(root, None, None, false)?;
        if size != self.len {
            return Err(InvariantError::SizeMismatch {
                stored: self.len,
                computed: size,
            });
        }

        // By this point the cached sizes are trustworthy, so select cannot
        // step out of the tree.
        for rank in 0..self.len {
            let Some((key, _)) = self.get_by_rank(rank) else {
                return Err(InvariantError::RankSelectMismatch { rank });
            };
            if self.rank_of(key) != rank {
                return Err(InvariantError::RankSelectMismatch { rank });
            }
        }

        Ok(())
    }

    /// Depth-first invariant walk. Returns the subtree's black-link count,
    /// size, and height, all independently recomputed.
    fn check_subtree(
        &self,
        handle: Handle,
        lower: Option<&K>,
        upper: Option<&K>,
        parent_red: bool,
    ) -> Result<(usize, usize, i8), InvariantError> {
        let node = self.nodes.get(handle);

        if lower.is_some_and(|bound| node.key() <= bound) || upper.is_some_and(|bound| node.key() >= bound) {
            return Err(InvariantError::BrokenOrder);
        }
        if self.is_red(node.right()) {
            return Err(InvariantError::RedRightChild);
        }
        if parent_red && node.is_red() {
            return Err(InvariantError::ConsecutiveRedLinks);
        }

        let (left_blacks, left_size, left_height) = match node.left() {
            Some(left) => self.check_subtree(left, lower, Some(node.key()), node.is_red())?,
            None => (0, 0, -1),
        };
        let (right_blacks, right_size, right_height) = match node.right() {
            Some(right) => self.check_subtree(right, Some(node.key()), upper, node.is_red())?,
            None => (0, 0, -1),
        };

        if left_blacks != right_blacks {
            return Err(InvariantError::UnbalancedBlacks {
                left: left_blacks,
                right: right_blacks,
            });
        }

        let size = left_size + right_size + 1;
        if node.size().to_usize() != size {
            return Err(InvariantError::SizeMismatch {
                stored: node.size().to_usize(),
                computed: size,
            });
        }

        let height = 1 + left_height.max(right_height);
        if node.height() != height {
            return Err(InvariantError::HeightMismatch {
                stored: node.height(),
                computed: height,
            });
        }

        // The incoming link contributes to the black count unless it is red.
        Ok((left_blacks + usize::from(!node.is_red()), size, height))
    }
}

impl<K: Clone, V: Clone> Clone for RawLlrbMap<K, V> {
    fn clone(&self) -> Self {
        fn clone_subtree<K: Clone, V: Clone>(
            old_nodes: &Arena<Node<K>>,
            old_values: &Arena<V>,
            new_nodes: &mut Arena<Node<K>>,
            new_values: &mut Arena<V>,
            old_handle: Handle,
        ) -> Handle {
            let old_node = old_nodes.get(old_handle);

            let left = old_node
                .left()
                .map(|left| clone_subtree(old_nodes, old_values, new_nodes, new_values, left));
            let right = old_node
                .right()
                .map(|right| clone_subtree(old_nodes, old_values, new_nodes, new_values, right));

            let value_handle = new_values.alloc(old_values.get(old_node.value()).clone());
            let mut node = Node::new(old_node.key().clone(), value_handle);
            node.set_left(left);
            node.set_right(right);
            node.set_color(old_node.color());
            node.set_size(old_node.size());
            node.set_height(old_node.height());
            new_nodes.alloc(node)
        }

        // The clone packs the arenas: vacant slots are not carried over.
        let mut new_nodes = Arena::with_capacity(self.len);
        let mut new_values = Arena::with_capacity(self.len);

        let root = self
            .root
            .map(|root| clone_subtree(&self.nodes, &self.values, &mut new_nodes, &mut new_values, root));

        Self {
            nodes: new_nodes,
            values: new_values,
            root,
            len: self.len,
        }
    }
}
