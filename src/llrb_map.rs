use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ops::{Bound, Index, RangeBounds};

use smallvec::SmallVec;

use crate::raw::{Handle, MAX_HEIGHT, RawLlrbMap};

mod capacity;
mod order_statistic;

pub use crate::Rank;

/// A descent path through the tree. Paths hold at most `MAX_HEIGHT + 1` nodes,
/// so the stack spills to the heap only at the full height bound.
type DescentStack = SmallVec<[Handle; MAX_HEIGHT]>;

/// Validates that the start bound does not exceed the end bound.
///
/// # Panics
///
/// Panics if `start > end` or if `start == end` and both bounds are `Excluded`.
fn validate_range_bounds<T, R>(range: &R)
where
    T: ?Sized + Ord,
    R: RangeBounds<T>,
{
    if let (Bound::Included(start) | Bound::Excluded(start), Bound::Included(end) | Bound::Excluded(end)) =
        (range.start_bound(), range.end_bound())
    {
        let valid =
            if matches!(range.start_bound(), Bound::Excluded(_)) && matches!(range.end_bound(), Bound::Excluded(_)) {
                start < end
            } else {
                start <= end
            };
        assert!(valid, "range start is greater than range end in LlrbMap");
    }
}

/// Pushes `link` and its left spine onto `stack`, leaving the subtree's
/// minimum on top.
fn push_left_spine<K, V>(tree: &RawLlrbMap<K, V>, stack: &mut DescentStack, mut link: Option<Handle>) {
    while let Some(handle) = link {
        stack.push(handle);
        link = tree.node(handle).left();
    }
}

/// Pushes `link` and its right spine onto `stack`, leaving the subtree's
/// maximum on top.
fn push_right_spine<K, V>(tree: &RawLlrbMap<K, V>, stack: &mut DescentStack, mut link: Option<Handle>) {
    while let Some(handle) = link {
        stack.push(handle);
        link = tree.node(handle).right();
    }
}

/// An ordered map based on a [left-leaning red-black tree].
///
/// Given a key type with a [total order], an ordered map stores its entries in key order.
/// That means that keys must be of a type that implements the [`Ord`] trait,
/// such that two keys can always be compared to determine their [`Ordering`].
/// Examples of keys with a total order are strings with lexicographical order,
/// and numbers with their natural order.
///
/// Iterators obtained from functions such as [`LlrbMap::iter`], [`LlrbMap::into_iter`],
/// [`LlrbMap::values`], or [`LlrbMap::keys`] produce their items in key order, and take
/// worst-case logarithmic and amortized constant time per item returned.
///
/// Beyond the `BTreeMap`-style surface, every node tracks the size of its subtree,
/// which makes positional queries logarithmic as well: [`get_by_rank`], [`rank_of`],
/// and indexing by [`Rank`] are all O(log n).
///
/// It is a logic error for a key to be modified in such a way that the key's ordering relative to
/// any other key, as determined by the [`Ord`] trait, changes while it is in the map. This is
/// normally only possible through [`Cell`], [`RefCell`], global state, I/O, or unsafe code.
/// The behavior resulting from such a logic error is not specified, but will be encapsulated to the
/// `LlrbMap` that observed the logic error and not result in undefined behavior. This could
/// include panics, incorrect results, aborts, memory leaks, and non-termination.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// // type inference lets us omit an explicit type signature (which
/// // would be `LlrbMap<&str, &str>` in this example).
/// let mut book_reviews = LlrbMap::new();
///
/// // review some books.
/// book_reviews.insert("The Name of the Wind", "Beautiful prose.");
/// book_reviews.insert("A Fire Upon the Deep", "Galaxy-spanning ideas.");
/// book_reviews.insert("Permutation City",     "Still thinking about it.");
/// book_reviews.insert("Snow Crash",           "Fun, if you skim the essays.");
///
/// // check for a specific one.
/// if !book_reviews.contains_key("The Dispossessed") {
///     println!("We've got {} reviews, but The Dispossessed ain't one.",
///              book_reviews.len());
/// }
///
/// // oops, this review never got past the first chapter, delete it.
/// book_reviews.remove("Snow Crash");
///
/// // look up the values associated with some keys.
/// let to_find = ["Permutation City", "Diaspora"];
/// for book in &to_find {
///     match book_reviews.get(book) {
///        Some(review) => println!("{book}: {review}"),
///        None => println!("{book} is unreviewed.")
///     }
/// }
///
/// // Look up the value for a key (will panic if the key is not found).
/// println!("Review: {}", book_reviews["Permutation City"]);
///
/// // iterate over everything.
/// for (book, review) in &book_reviews {
///     println!("{book}: \"{review}\"");
/// }
/// ```
///
/// An `LlrbMap` with a known list of items can be initialized from an array:
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// let half_lives = LlrbMap::from([
///     ("Carbon-14", 5_730),
///     ("Cobalt-60", 5),
///     ("Radium-226", 1_600),
///     ("Uranium-238", 4_468_000_000u64),
/// ]);
/// ```
///
/// # Background
///
/// A left-leaning red-black tree is a [binary search tree] that encodes a 2-3 tree:
/// every node carries a color, and a red node is glued to its parent as the left
/// half of a conceptual 3-node. Constraining red links to lean left collapses the
/// case analysis of classical red-black trees down to a handful of local
/// transformations (two rotations and a color flip), which is why the rebalancing
/// code here is a fraction of the size of a textbook red-black deletion. The
/// encoding guarantees that no path from the root to an empty link is more than
/// twice as long as any other, so lookups, insertions, and removals are all
/// O(log n) in the worst case.
///
/// The nodes themselves live in an arena and link to each other by index rather
/// than by heap pointer. Freed slots are recycled through an intrusive free list,
/// so long-lived maps with insert/remove churn do not fragment the allocator, and
/// the indices are `NonZero` so an optional link costs no extra space. Values are
/// stored in a second arena, which keeps a value's address stable while rotations
/// rewire the nodes around it.
///
/// [left-leaning red-black tree]: https://en.wikipedia.org/wiki/Left-leaning_red%E2%80%93black_tree
/// [binary search tree]: https://en.wikipedia.org/wiki/Binary_search_tree
/// [total order]: https://en.wikipedia.org/wiki/Total_order
/// [`get_by_rank`]: LlrbMap::get_by_rank
/// [`rank_of`]: LlrbMap::rank_of
/// [`Cell`]: core::cell::Cell
/// [`RefCell`]: core::cell::RefCell
pub struct LlrbMap<K, V> {
    raw: RawLlrbMap<K, V>,
}

/// An iterator over the entries of a `LlrbMap`.
///
/// This `struct` is created by the [`iter`] method on [`LlrbMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// let map = LlrbMap::from([(1, "a"), (2, "b")]);
/// let mut iter = map.iter();
/// assert_eq!(iter.next(), Some((&1, &"a")));
/// assert_eq!(iter.next_back(), Some((&2, &"b")));
/// assert_eq!(iter.next(), None);
/// ```
///
/// [`iter`]: LlrbMap::iter
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, K, V> {
    tree: *const RawLlrbMap<K, V>,
    /// Path to the next front entry; its top is the in-order successor.
    forward: DescentStack,
    /// Path to the next back entry; its top is the in-order predecessor.
    backward: DescentStack,
    /// Entries not yet yielded from either end. The two cursors never cross
    /// because both directions stop when this reaches zero.
    remaining: usize,
    _marker: PhantomData<&'a RawLlrbMap<K, V>>,
}

// SAFETY: Iter behaves as &RawLlrbMap<K, V>, so it is Send/Sync when the tree is Sync.
unsafe impl<K: Sync, V: Sync> Send for Iter<'_, K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for Iter<'_, K, V> {}

/// A mutable iterator over the entries of a `LlrbMap`.
///
/// This `struct` is created by the [`iter_mut`] method on [`LlrbMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// let mut map = LlrbMap::from([(1, 10), (2, 20)]);
/// for (_, value) in map.iter_mut() {
///     *value += 1;
/// }
/// let values: Vec<_> = map.values().copied().collect();
/// assert_eq!(values, [11, 21]);
/// ```
///
/// [`iter_mut`]: LlrbMap::iter_mut
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct IterMut<'a, K: 'a, V: 'a> {
    tree: *mut RawLlrbMap<K, V>,
    forward: DescentStack,
    backward: DescentStack,
    remaining: usize,
    _marker: PhantomData<&'a mut (K, V)>,
}

// SAFETY: IterMut behaves as &mut RawLlrbMap<K, V>, so it is Send when K and V are Send.
// It is NOT Sync because mutable iterators should not be shared across threads.
unsafe impl<K: Send, V: Send> Send for IterMut<'_, K, V> {}

/// An owning iterator over the entries of a `LlrbMap`, sorted by key.
///
/// This `struct` is created by the [`into_iter`] method on [`LlrbMap`]
/// (provided by the [`IntoIterator`] trait). See its documentation for more.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// let map = LlrbMap::from([(1, "a"), (2, "b")]);
/// let mut iter = map.into_iter();
/// assert_eq!(iter.next(), Some((1, "a")));
/// assert_eq!(iter.next_back(), Some((2, "b")));
/// assert_eq!(iter.next(), None);
/// ```
///
/// [`into_iter`]: IntoIterator::into_iter
pub struct IntoIter<K, V> {
    inner: alloc::vec::IntoIter<(K, V)>,
}

/// An iterator over the keys of a `LlrbMap`.
///
/// This `struct` is created by the [`keys`] method on [`LlrbMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// let map = LlrbMap::from([(2, "b"), (1, "a")]);
/// let keys: Vec<_> = map.keys().copied().collect();
/// assert_eq!(keys, [1, 2]);
/// ```
///
/// [`keys`]: LlrbMap::keys
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

/// An iterator over the values of a `LlrbMap`.
///
/// This `struct` is created by the [`values`] method on [`LlrbMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// let map = LlrbMap::from([(1, "a"), (2, "b")]);
/// let values: Vec<_> = map.values().copied().collect();
/// assert_eq!(values, ["a", "b"]);
/// ```
///
/// [`values`]: LlrbMap::values
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

/// A mutable iterator over the values of a `LlrbMap`.
///
/// This `struct` is created by the [`values_mut`] method on [`LlrbMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// let mut map = LlrbMap::from([
///     (1, String::from("hello")),
///     (2, String::from("goodbye")),
/// ]);
/// for value in map.values_mut() {
///     value.push('!');
/// }
/// let values: Vec<_> = map.values().cloned().collect();
/// assert_eq!(values, [String::from("hello!"), String::from("goodbye!")]);
/// ```
///
/// [`values_mut`]: LlrbMap::values_mut
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

// SAFETY: ValuesMut is Send when its inner IterMut is Send.
unsafe impl<K: Send, V: Send> Send for ValuesMut<'_, K, V> {}

/// An owning iterator over the keys of a `LlrbMap`.
///
/// This `struct` is created by the [`into_keys`] method on [`LlrbMap`].
/// See its documentation for more.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// let map = LlrbMap::from([(2, "b"), (1, "a")]);
/// let mut keys = map.into_keys();
/// assert_eq!(keys.next(), Some(1));
/// assert_eq!(keys.next_back(), Some(2));
/// assert_eq!(keys.next(), None);
/// ```
///
/// [`into_keys`]: LlrbMap::into_keys
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct IntoKeys<K, V> {
    inner: IntoIter<K, V>,
}

/// An owning iterator over the values of a `LlrbMap`.
///
/// This `struct` is created by the [`into_values`] method on [`LlrbMap`].
/// See its documentation for more.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// let map = LlrbMap::from([(1, "hello"), (2, "goodbye")]);
/// let mut values = map.into_values();
/// assert_eq!(values.next(), Some("hello"));
/// assert_eq!(values.next_back(), Some("goodbye"));
/// assert_eq!(values.next(), None);
/// ```
///
/// [`into_values`]: LlrbMap::into_values
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct IntoValues<K, V> {
    inner: IntoIter<K, V>,
}

/// An iterator over a sub-range of entries in a `LlrbMap`.
///
/// This `struct` is created by the [`range`] method on [`LlrbMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// let map = LlrbMap::from([(1, "a"), (2, "b"), (3, "c")]);
/// let mut range = map.range(2..=3);
/// assert_eq!(range.next(), Some((&2, &"b")));
/// assert_eq!(range.next_back(), Some((&3, &"c")));
/// assert_eq!(range.next(), None);
/// ```
///
/// [`range`]: LlrbMap::range
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Range<'a, K: 'a, V: 'a> {
    tree: *const RawLlrbMap<K, V>,
    forward: DescentStack,
    backward: DescentStack,
    /// Exact number of entries left, computed from two rank queries when the
    /// range is created. Both cursors stop when this reaches zero.
    remaining: usize,
    _marker: PhantomData<&'a RawLlrbMap<K, V>>,
}

// SAFETY: Range behaves as &RawLlrbMap<K, V>, so it is Send/Sync when the tree is Sync.
unsafe impl<K: Sync, V: Sync> Send for Range<'_, K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for Range<'_, K, V> {}

/// An iterator over the keys of a `LlrbMap` in preorder: each node's key is
/// yielded before any key in its subtrees.
///
/// This `struct` is created by the [`preorder`] method on [`LlrbMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbMap;
///
/// let map = LlrbMap::from([(2, "b"), (1, "a"), (3, "c")]);
/// let keys: Vec<_> = map.preorder().copied().collect();
/// assert_eq!(keys, [2, 1, 3]);
/// ```
///
/// [`preorder`]: LlrbMap::preorder
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Preorder<'a, K, V> {
    tree: *const RawLlrbMap<K, V>,
    /// Pending nodes; the top is the next to visit, with its siblings'
    /// subtrees queued beneath it.
    stack: DescentStack,
    remaining: usize,
    _marker: PhantomData<&'a RawLlrbMap<K, V>>,
}

// SAFETY: Preorder behaves as &RawLlrbMap<K, V>, so it is Send/Sync when the tree is Sync.
unsafe impl<K: Sync, V: Sync> Send for Preorder<'_, K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for Preorder<'_, K, V> {}

impl<K, V> LlrbMap<K, V> {
    /// Makes a new, empty `LlrbMap`.
    ///
    /// Does not allocate anything on its own.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    ///
    /// // entries can now be inserted into the empty map
    /// map.insert(1, "a");
    /// ```
    #[must_use]
    pub const fn new() -> LlrbMap<K, V> {
        LlrbMap {
            raw: RawLlrbMap::new(),
        }
    }

    /// Clears the map, removing all elements.
    ///
    /// # Complexity
    ///
    /// O(n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut a = LlrbMap::new();
    /// a.insert(1, "a");
    /// a.clear();
    /// assert!(a.is_empty());
    /// ```
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.get(key)
    }

    /// Returns the key-value pair corresponding to the supplied key. This is
    /// potentially useful:
    /// - for key types where non-identical keys can be considered equal;
    /// - for getting the `&K` stored key value from a borrowed `&Q` lookup key; or
    /// - for getting a reference to a key with the same lifetime as the collection.
    ///
    /// The supplied key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get_key_value(&1), Some((&1, &"a")));
    /// assert_eq!(map.get_key_value(&2), None);
    /// ```
    pub fn get_key_value<Q>(&self, k: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.get_key_value(k)
    }

    /// Returns the first key-value pair in the map.
    /// The key in this pair is the minimum key in the map.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// assert_eq!(map.first_key_value(), None);
    /// map.insert(1, "b");
    /// map.insert(2, "a");
    /// assert_eq!(map.first_key_value(), Some((&1, &"b")));
    /// ```
    #[allow(clippy::must_use_candidate)]
    pub fn first_key_value(&self) -> Option<(&K, &V)>
    where
        K: Ord,
    {
        self.raw.first_key_value()
    }

    /// Removes and returns the first element in the map.
    /// The key of this element is the minimum key that was in the map.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// Draining elements in ascending order, while keeping a usable map each iteration.
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    /// while let Some((key, _val)) = map.pop_first() {
    ///     assert!(map.iter().all(|(k, _v)| *k > key));
    /// }
    /// assert!(map.is_empty());
    /// ```
    pub fn pop_first(&mut self) -> Option<(K, V)>
    where
        K: Ord,
    {
        self.raw.pop_first()
    }

    /// Returns the last key-value pair in the map.
    /// The key in this pair is the maximum key in the map.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// map.insert(1, "b");
    /// map.insert(2, "a");
    /// assert_eq!(map.last_key_value(), Some((&2, &"a")));
    /// ```
    #[allow(clippy::must_use_candidate)]
    pub fn last_key_value(&self) -> Option<(&K, &V)>
    where
        K: Ord,
    {
        self.raw.last_key_value()
    }

    /// Removes and returns the last element in the map.
    /// The key of this element is the maximum key that was in the map.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// Draining elements in descending order, while keeping a usable map each iteration.
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    /// while let Some((key, _val)) = map.pop_last() {
    ///     assert!(map.iter().all(|(k, _v)| *k < key));
    /// }
    /// assert!(map.is_empty());
    /// ```
    pub fn pop_last(&mut self) -> Option<(K, V)>
    where
        K: Ord,
    {
        self.raw.pop_last()
    }

    /// Returns the entry with the greatest key less than or equal to `key`,
    /// or `None` if every key in the map is greater than `key`.
    ///
    /// This is an extension and is not part of the standard `BTreeMap` API.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let map = LlrbMap::from([(1, "a"), (3, "c"), (5, "e")]);
    /// assert_eq!(map.floor(&4), Some((&3, &"c")));
    /// assert_eq!(map.floor(&3), Some((&3, &"c")));
    /// assert_eq!(map.floor(&0), None);
    /// ```
    #[allow(clippy::must_use_candidate)]
    pub fn floor<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.floor(key)
    }

    /// Returns the entry with the least key greater than or equal to `key`,
    /// or `None` if every key in the map is less than `key`.
    ///
    /// This is an extension and is not part of the standard `BTreeMap` API.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let map = LlrbMap::from([(1, "a"), (3, "c"), (5, "e")]);
    /// assert_eq!(map.ceiling(&4), Some((&5, &"e")));
    /// assert_eq!(map.ceiling(&5), Some((&5, &"e")));
    /// assert_eq!(map.ceiling(&6), None);
    /// ```
    #[allow(clippy::must_use_candidate)]
    pub fn ceiling<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.ceiling(key)
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.contains_key(&1), true);
    /// assert_eq!(map.contains_key(&2), false);
    /// ```
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.contains_key(key)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// map.insert(1, "a");
    /// if let Some(x) = map.get_mut(&1) {
    ///     *x = "b";
    /// }
    /// assert_eq!(map[&1], "b");
    /// ```
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.get_mut(key)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map did not have this key present, `None` is returned.
    ///
    /// If the map did have this key present, the value is updated, and the old
    /// value is returned. The key is not updated, though; this matters for
    /// types that can be `==` without being identical. The tree structure is
    /// left untouched in that case.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.is_empty(), false);
    ///
    /// map.insert(37, "b");
    /// assert_eq!(map.insert(37, "c"), Some("b"));
    /// assert_eq!(map[&37], "c");
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V>
    where
        K: Ord,
    {
        self.raw.insert(key, value)
    }

    /// In-place key swap for [`LlrbSet::replace`](crate::LlrbSet::replace):
    /// an equal key is exchanged inside its node without touching the tree
    /// shape; an absent key is inserted.
    pub(crate) fn replace_key(&mut self, key: K, value: V) -> Option<K>
    where
        K: Ord,
    {
        self.raw.replace_key(key, value)
    }

    /// Removes a key from the map, returning the value at the key if the key
    /// was previously in the map.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// Removing a key that is not present leaves the map untouched.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.remove(key)
    }

    /// Removes a key from the map, returning the stored key and value if the key
    /// was previously in the map.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove_entry(&1), Some((1, "a")));
    /// assert_eq!(map.remove_entry(&1), None);
    /// ```
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.remove_entry(key)
    }

    /// Returns the height of the tree in edges: the longest path from the
    /// root down to any entry. An empty map has no height and a map with a
    /// single entry has height `Some(0)`.
    ///
    /// The height is tracked incrementally, so this is a cheap diagnostic for
    /// observing how balanced the tree stays under a workload.
    ///
    /// This is an extension and is not part of the standard `BTreeMap` API.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// assert_eq!(map.height(), None);
    ///
    /// map.insert(1, "a");
    /// assert_eq!(map.height(), Some(0));
    ///
    /// for key in 2..=7 {
    ///     map.insert(key, "x");
    /// }
    /// assert_eq!(map.height(), Some(2));
    /// ```
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn height(&self) -> Option<usize> {
        // The stored height of a non-empty tree is never negative.
        self.raw.height().map(|height| height as usize)
    }

    /// Checks every structural invariant of the tree and reports the first
    /// violation found.
    ///
    /// The check recomputes everything from scratch: key ordering, the
    /// left-leaning red-black shape, black-link balance, the cached subtree
    /// sizes and heights, and the rank/select round trip. It never fails for
    /// trees built through this crate's API; it exists so tests (and
    /// paranoid callers) can assert integrity after arbitrary operation
    /// sequences.
    ///
    /// # Complexity
    ///
    /// O(n log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let map = LlrbMap::from([(1, "a"), (2, "b"), (3, "c")]);
    /// assert!(map.check_invariants().is_ok());
    /// ```
    pub fn check_invariants(&self) -> Result<(), crate::InvariantError>
    where
        K: Ord,
    {
        self.raw.check_invariants()
    }

    /// Constructs a double-ended iterator over a sub-range of elements in the map.
    /// The simplest way is to use the range syntax `min..max`, thus `range(min..max)` will
    /// yield elements from min (inclusive) to max (exclusive).
    /// The range may also be entered as `(Bound<T>, Bound<T>)`, so for example
    /// `range((Excluded(4), Included(10)))` will yield a left-exclusive, right-inclusive
    /// range from 4 to 10.
    ///
    /// # Panics
    ///
    /// Panics if range `start > end`.
    /// Panics if range `start == end` and both bounds are `Excluded`.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::ops::Bound::Included;
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// map.insert(3, "a");
    /// map.insert(5, "b");
    /// map.insert(8, "c");
    /// for (&key, &value) in map.range((Included(&4), Included(&8))) {
    ///     println!("{key}: {value}");
    /// }
    /// assert_eq!(Some((&5, &"b")), map.range(4..).next());
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n) to create the iterator; each iteration step is O(1) amortized.
    pub fn range<T, R>(&self, range: R) -> Range<'_, K, V>
    where
        T: ?Sized + Ord,
        K: Borrow<T> + Ord,
        R: RangeBounds<T>,
    {
        validate_range_bounds(&range);

        // The exact entry count falls out of two rank queries: entries below
        // the end bound minus entries below the start bound.
        let start_rank = match range.start_bound() {
            Bound::Unbounded => 0,
            Bound::Included(start) => self.raw.rank_of(start),
            Bound::Excluded(start) => self.raw.rank_of(start) + usize::from(self.raw.contains_key(start)),
        };
        let end_rank = match range.end_bound() {
            Bound::Unbounded => self.raw.len(),
            Bound::Included(end) => self.raw.rank_of(end) + usize::from(self.raw.contains_key(end)),
            Bound::Excluded(end) => self.raw.rank_of(end),
        };

        // Seed the front cursor: descend towards the start bound, keeping
        // every node at or inside it.
        let mut forward = DescentStack::new();
        let mut link = self.raw.root();
        while let Some(handle) = link {
            let node = self.raw.node(handle);
            let inside = match range.start_bound() {
                Bound::Unbounded => true,
                Bound::Included(start) => node.key().borrow() >= start,
                Bound::Excluded(start) => node.key().borrow() > start,
            };
            if inside {
                forward.push(handle);
                link = node.left();
            } else {
                link = node.right();
            }
        }

        // Mirror image for the back cursor and the end bound.
        let mut backward = DescentStack::new();
        let mut link = self.raw.root();
        while let Some(handle) = link {
            let node = self.raw.node(handle);
            let inside = match range.end_bound() {
                Bound::Unbounded => true,
                Bound::Included(end) => node.key().borrow() <= end,
                Bound::Excluded(end) => node.key().borrow() < end,
            };
            if inside {
                backward.push(handle);
                link = node.right();
            } else {
                link = node.left();
            }
        }

        Range {
            tree: &raw const self.raw,
            forward,
            backward,
            remaining: end_rank - start_rank,
            _marker: PhantomData,
        }
    }

    /// Creates a consuming iterator visiting all the keys, in sorted order.
    /// The map cannot be used after calling this.
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut a = LlrbMap::new();
    /// a.insert(2, "b");
    /// a.insert(1, "a");
    ///
    /// let keys: Vec<i32> = a.into_keys().collect();
    /// assert_eq!(keys, [1, 2]);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(n)
    pub fn into_keys(mut self) -> IntoKeys<K, V> {
        let entries = self.raw.drain_to_vec();
        IntoKeys {
            inner: IntoIter {
                inner: entries.into_iter(),
            },
        }
    }

    /// Creates a consuming iterator visiting all the values, in order by key.
    /// The map cannot be used after calling this.
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut a = LlrbMap::new();
    /// a.insert(1, "hello");
    /// a.insert(2, "goodbye");
    ///
    /// let values: Vec<&str> = a.into_values().collect();
    /// assert_eq!(values, ["hello", "goodbye"]);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(n)
    pub fn into_values(mut self) -> IntoValues<K, V> {
        let entries = self.raw.drain_to_vec();
        IntoValues {
            inner: IntoIter {
                inner: entries.into_iter(),
            },
        }
    }

    /// Gets an iterator over the entries of the map, sorted by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// map.insert(3, "c");
    /// map.insert(2, "b");
    /// map.insert(1, "a");
    ///
    /// for (key, value) in map.iter() {
    ///     println!("{key}: {value}");
    /// }
    ///
    /// let (first_key, first_value) = map.iter().next().unwrap();
    /// assert_eq!((*first_key, *first_value), (1, "a"));
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n) to create the iterator; each iteration step is O(1) amortized.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut forward = DescentStack::new();
        let mut backward = DescentStack::new();
        push_left_spine(&self.raw, &mut forward, self.raw.root());
        push_right_spine(&self.raw, &mut backward, self.raw.root());

        Iter {
            tree: &raw const self.raw,
            forward,
            backward,
            remaining: self.raw.len(),
            _marker: PhantomData,
        }
    }

    /// Gets a mutable iterator over the entries of the map, sorted by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::from([
    ///    ("a", 1),
    ///    ("b", 2),
    ///    ("c", 3),
    /// ]);
    ///
    /// // add 10 to the value if the key isn't "a"
    /// for (key, value) in map.iter_mut() {
    ///     if key != &"a" {
    ///         *value += 10;
    ///     }
    /// }
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n) to create the iterator; each iteration step is O(1) amortized.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let mut forward = DescentStack::new();
        let mut backward = DescentStack::new();
        push_left_spine(&self.raw, &mut forward, self.raw.root());
        push_right_spine(&self.raw, &mut backward, self.raw.root());

        IterMut {
            tree: &raw mut self.raw,
            forward,
            backward,
            remaining: self.raw.len(),
            _marker: PhantomData,
        }
    }

    /// Gets an iterator over the keys of the map, in sorted order.
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut a = LlrbMap::new();
    /// a.insert(2, "b");
    /// a.insert(1, "a");
    ///
    /// let keys: Vec<_> = a.keys().cloned().collect();
    /// assert_eq!(keys, [1, 2]);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n) to create the iterator; each iteration step is O(1) amortized.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Gets an iterator over the values of the map, in order by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut a = LlrbMap::new();
    /// a.insert(1, "hello");
    /// a.insert(2, "goodbye");
    ///
    /// let values: Vec<&str> = a.values().cloned().collect();
    /// assert_eq!(values, ["hello", "goodbye"]);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n) to create the iterator; each iteration step is O(1) amortized.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Gets a mutable iterator over the values of the map, in order by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut a = LlrbMap::new();
    /// a.insert(1, String::from("hello"));
    /// a.insert(2, String::from("goodbye"));
    ///
    /// for value in a.values_mut() {
    ///     value.push_str("!");
    /// }
    ///
    /// let values: Vec<String> = a.values().cloned().collect();
    /// assert_eq!(values, [String::from("hello!"),
    ///                     String::from("goodbye!")]);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n) to create the iterator; each iteration step is O(1) amortized.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Gets an iterator over the keys of the map in preorder: each node's key
    /// is yielded before any key in its subtrees, with the left subtree
    /// before the right.
    ///
    /// This is an extension and is not part of the standard `BTreeMap` API.
    /// The sequence pins down the exact tree shape, which makes it useful for
    /// inspecting how the balancing behaves under a workload.
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut map = LlrbMap::new();
    /// for key in [5, 3, 8, 1, 4, 7, 9] {
    ///     map.insert(key, ());
    /// }
    ///
    /// let order: Vec<_> = map.preorder().copied().collect();
    /// assert_eq!(order, [5, 3, 1, 4, 8, 7, 9]);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(1) to create the iterator; each iteration step is O(1) amortized.
    pub fn preorder(&self) -> Preorder<'_, K, V> {
        let mut stack = DescentStack::new();
        if let Some(root) = self.raw.root() {
            stack.push(root);
        }

        Preorder {
            tree: &raw const self.raw,
            stack,
            remaining: self.raw.len(),
            _marker: PhantomData,
        }
    }

    /// Returns the number of elements in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut a = LlrbMap::new();
    /// assert_eq!(a.len(), 0);
    /// a.insert(1, "a");
    /// assert_eq!(a.len(), 1);
    /// ```
    #[must_use]
    pub const fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the map contains no elements.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let mut a = LlrbMap::new();
    /// assert!(a.is_empty());
    /// a.insert(1, "a");
    /// assert!(!a.is_empty());
    /// ```
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl<K: Clone, V: Clone> Clone for LlrbMap<K, V> {
    fn clone(&self) -> Self {
        LlrbMap {
            raw: self.raw.clone(),
        }
    }
}

impl<K: Hash, V: Hash> Hash for LlrbMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for (k, v) in self {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for LlrbMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<K: Eq, V: Eq> Eq for LlrbMap<K, V> {}

impl<K: PartialOrd, V: PartialOrd> PartialOrd for LlrbMap<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<K: Ord, V: Ord> Ord for LlrbMap<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for LlrbMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> Default for LlrbMap<K, V> {
    fn default() -> Self {
        LlrbMap::new()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for LlrbMap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = LlrbMap::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V> Extend<(K, V)> for LlrbMap<K, V> {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K: Ord + Copy, V: Copy> Extend<(&'a K, &'a V)> for LlrbMap<K, V> {
    fn extend<T: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: T) {
        for (&k, &v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V> IntoIterator for &'a LlrbMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V> IntoIterator for &'a mut LlrbMap<K, V> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

impl<K, V> IntoIterator for LlrbMap<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    /// Gets an owning iterator over the entries of the map, sorted by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbMap;
    ///
    /// let map = LlrbMap::from([(2, "b"), (1, "a")]);
    /// let mut iter = map.into_iter();
    /// assert_eq!(iter.next(), Some((1, "a")));
    /// assert_eq!(iter.next_back(), Some((2, "b")));
    /// ```
    fn into_iter(mut self) -> IntoIter<K, V> {
        let entries = self.raw.drain_to_vec();
        IntoIter {
            inner: entries.into_iter(),
        }
    }
}

impl<K, Q, V> Index<&Q> for LlrbMap<K, V>
where
    K: Borrow<Q> + Ord,
    Q: ?Sized + Ord,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K: Ord, V, const N: usize> From<[(K, V); N]> for LlrbMap<K, V> {
    fn from(arr: [(K, V); N]) -> Self {
        arr.into_iter().collect()
    }
}

impl<'a, K: 'a, V: 'a> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let handle = self.forward.pop()?;

        // SAFETY: When remaining > 0, self.tree is a valid pointer obtained from
        // a live reference in iter().
        let tree = unsafe { &*self.tree };
        let node = tree.node(handle);

        self.remaining -= 1;
        // Stage the successor: the left spine of the right subtree.
        push_left_spine(tree, &mut self.forward, node.right());

        Some((node.key(), tree.value(node.value())))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K: 'a, V: 'a> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let handle = self.backward.pop()?;

        // SAFETY: When remaining > 0, self.tree is a valid pointer obtained from
        // a live reference in iter().
        let tree = unsafe { &*self.tree };
        let node = tree.node(handle);

        self.remaining -= 1;
        // Stage the predecessor: the right spine of the left subtree.
        push_right_spine(tree, &mut self.backward, node.left());

        Some((node.key(), tree.value(node.value())))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("remaining", &self.remaining).finish()
    }
}

impl<'a, K: 'a, V: 'a> Default for Iter<'a, K, V> {
    /// Creates an empty `llrb_map::Iter`.
    ///
    /// ```
    /// # use llrb_tree::llrb_map;
    /// let iter: llrb_map::Iter<'_, u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        Iter {
            // SAFETY: tree is never dereferenced when remaining == 0 and both
            // stacks are empty, so a dangling pointer is safe here.
            tree: core::ptr::NonNull::dangling().as_ptr(),
            forward: DescentStack::new(),
            backward: DescentStack::new(),
            remaining: 0,
            _marker: PhantomData,
        }
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            tree: self.tree,
            forward: self.forward.clone(),
            backward: self.backward.clone(),
            remaining: self.remaining,
            _marker: PhantomData,
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let handle = self.forward.pop()?;

        // SAFETY: We have exclusive access to the tree through the raw pointer,
        // and the in-order walk hands out each entry at most once.
        // Keys live in the nodes arena and values in the values arena (separate
        // allocations); we access them through separate raw pointers to avoid
        // aliasing violations.
        unsafe {
            let node = RawLlrbMap::node_ptr(self.tree, handle);

            // Access the value through a raw pointer to the values arena only.
            let value = RawLlrbMap::value_mut_ptr(self.tree, node.value());

            self.remaining -= 1;

            // Stage the successor: the left spine of the right subtree.
            let mut link = node.right();
            while let Some(next) = link {
                self.forward.push(next);
                link = RawLlrbMap::node_ptr(self.tree, next).left();
            }

            Some((node.key(), value))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for IterMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let handle = self.backward.pop()?;

        // SAFETY: Same as in next() - exclusive access, each entry visited at
        // most once, keys and values in separate arenas accessed independently.
        unsafe {
            let node = RawLlrbMap::node_ptr(self.tree, handle);
            let value = RawLlrbMap::value_mut_ptr(self.tree, node.value());

            self.remaining -= 1;

            // Stage the predecessor: the right spine of the left subtree.
            let mut link = node.left();
            while let Some(next) = link {
                self.backward.push(next);
                link = RawLlrbMap::node_ptr(self.tree, next).right();
            }

            Some((node.key(), value))
        }
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for IterMut<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterMut").field("remaining", &self.remaining).finish()
    }
}

impl<'a, K: 'a, V: 'a> Default for IterMut<'a, K, V> {
    /// Creates an empty `llrb_map::IterMut`.
    ///
    /// ```
    /// # use llrb_tree::llrb_map;
    /// let iter: llrb_map::IterMut<'_, u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        IterMut {
            tree: core::ptr::null_mut(),
            forward: DescentStack::new(),
            backward: DescentStack::new(),
            remaining: 0,
            _marker: PhantomData,
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IntoIter<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for IntoIter<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for IntoIter<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoIter").field("len", &self.inner.len()).finish()
    }
}

impl<K, V> Default for IntoIter<K, V> {
    /// Creates an empty `llrb_map::IntoIter`.
    ///
    /// ```
    /// # use llrb_tree::llrb_map;
    /// let iter: llrb_map::IntoIter<u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        IntoIter {
            inner: alloc::vec::Vec::new().into_iter(),
        }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Keys<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

impl<K: fmt::Debug, V> fmt::Debug for Keys<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys").field("remaining", &self.inner.remaining).finish()
    }
}

impl<K, V> Default for Keys<'_, K, V> {
    /// Creates an empty `llrb_map::Keys`.
    ///
    /// ```
    /// # use llrb_tree::llrb_map;
    /// let iter: llrb_map::Keys<'_, u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        Keys {
            inner: Iter::default(),
        }
    }
}

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Keys {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Values<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Values<'_, K, V> {}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Values {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Default for Values<'_, K, V> {
    /// Creates an empty `llrb_map::Values`.
    ///
    /// ```
    /// # use llrb_tree::llrb_map;
    /// let iter: llrb_map::Values<'_, u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        Values {
            inner: Iter::default(),
        }
    }
}

impl<K, V: fmt::Debug> fmt::Debug for Values<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Values").field("remaining", &self.inner.remaining).finish()
    }
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for ValuesMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

impl<K, V: fmt::Debug> fmt::Debug for ValuesMut<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValuesMut").field("remaining", &self.inner.remaining).finish()
    }
}

impl<K, V> Default for ValuesMut<'_, K, V> {
    /// Creates an empty `llrb_map::ValuesMut`.
    ///
    /// ```
    /// # use llrb_tree::llrb_map;
    /// let iter: llrb_map::ValuesMut<'_, u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        ValuesMut {
            inner: IterMut::default(),
        }
    }
}

impl<K, V> Iterator for IntoKeys<K, V> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IntoKeys<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<K, V> ExactSizeIterator for IntoKeys<K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for IntoKeys<K, V> {}

impl<K: fmt::Debug, V> fmt::Debug for IntoKeys<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoKeys").field("len", &self.inner.len()).finish()
    }
}

impl<K, V> Default for IntoKeys<K, V> {
    /// Creates an empty `llrb_map::IntoKeys`.
    ///
    /// ```
    /// # use llrb_tree::llrb_map;
    /// let iter: llrb_map::IntoKeys<u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        IntoKeys {
            inner: IntoIter::default(),
        }
    }
}

impl<K, V> Iterator for IntoValues<K, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IntoValues<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V> ExactSizeIterator for IntoValues<K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for IntoValues<K, V> {}

impl<K, V: fmt::Debug> fmt::Debug for IntoValues<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoValues").field("len", &self.inner.len()).finish()
    }
}

impl<K, V> Default for IntoValues<K, V> {
    /// Creates an empty `llrb_map::IntoValues`.
    ///
    /// ```
    /// # use llrb_tree::llrb_map;
    /// let iter: llrb_map::IntoValues<u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        IntoValues {
            inner: IntoIter::default(),
        }
    }
}

impl<'a, K, V> Iterator for Range<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let handle = self.forward.pop()?;

        // SAFETY: When remaining > 0, self.tree is a valid pointer obtained from
        // a live reference in range().
        let tree = unsafe { &*self.tree };
        let node = tree.node(handle);

        self.remaining -= 1;
        push_left_spine(tree, &mut self.forward, node.right());

        Some((node.key(), tree.value(node.value())))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // Exact count is known via order statistics
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Range<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let handle = self.backward.pop()?;

        // SAFETY: When remaining > 0, self.tree is a valid pointer obtained from
        // a live reference in range().
        let tree = unsafe { &*self.tree };
        let node = tree.node(handle);

        self.remaining -= 1;
        push_right_spine(tree, &mut self.backward, node.left());

        Some((node.key(), tree.value(node.value())))
    }
}

impl<K, V> FusedIterator for Range<'_, K, V> {}

impl<K, V> ExactSizeIterator for Range<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Range<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Range").field("remaining", &self.remaining).finish()
    }
}

impl<K, V> Default for Range<'_, K, V> {
    /// Creates an empty `llrb_map::Range`.
    ///
    /// ```
    /// # use llrb_tree::llrb_map;
    /// let iter: llrb_map::Range<'_, u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        Range {
            // SAFETY: tree is never dereferenced when remaining == 0 and both
            // stacks are empty, so a dangling pointer is safe here.
            tree: core::ptr::NonNull::dangling().as_ptr(),
            forward: DescentStack::new(),
            backward: DescentStack::new(),
            remaining: 0,
            _marker: PhantomData,
        }
    }
}

impl<K, V> Clone for Range<'_, K, V> {
    fn clone(&self) -> Self {
        Range {
            tree: self.tree,
            forward: self.forward.clone(),
            backward: self.backward.clone(),
            remaining: self.remaining,
            _marker: PhantomData,
        }
    }
}

impl<'a, K, V> Iterator for Preorder<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.stack.pop()?;

        // SAFETY: When the stack is non-empty, self.tree is a valid pointer
        // obtained from a live reference in preorder().
        let tree = unsafe { &*self.tree };
        let node = tree.node(handle);

        // Right below left, so the left subtree is drained first.
        if let Some(right) = node.right() {
            self.stack.push(right);
        }
        if let Some(left) = node.left() {
            self.stack.push(left);
        }
        self.remaining -= 1;

        Some(node.key())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Preorder<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Preorder<'_, K, V> {}

impl<K: fmt::Debug, V> fmt::Debug for Preorder<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preorder").field("remaining", &self.remaining).finish()
    }
}

impl<K, V> Default for Preorder<'_, K, V> {
    /// Creates an empty `llrb_map::Preorder`.
    ///
    /// ```
    /// # use llrb_tree::llrb_map;
    /// let iter: llrb_map::Preorder<'_, u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        Preorder {
            // SAFETY: tree is never dereferenced when the stack is empty, so a
            // dangling pointer is safe here.
            tree: core::ptr::NonNull::dangling().as_ptr(),
            stack: DescentStack::new(),
            remaining: 0,
            _marker: PhantomData,
        }
    }
}

impl<K, V> Clone for Preorder<'_, K, V> {
    fn clone(&self) -> Self {
        Preorder {
            tree: self.tree,
            stack: self.stack.clone(),
            remaining: self.remaining,
            _marker: PhantomData,
        }
    }
}
