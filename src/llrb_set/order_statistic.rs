use core::borrow::Borrow;
use core::ops::Index;

use super::LlrbSet;
use crate::Rank;

impl<T: Ord> LlrbSet<T> {
    /// Returns the value at position `rank` in sorted order.
    ///
    /// This is an order-statistic extension and is not part of the standard
    /// `BTreeSet` API.
    ///
    /// The rank is zero-based. Returns `None` if `rank` is out of bounds.
    ///
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbSet;
    ///
    /// let set = LlrbSet::from([10, 20, 30]);
    /// assert_eq!(set.get_by_rank(1), Some(&20));
    /// assert!(set.get_by_rank(3).is_none());
    /// ```
    #[must_use]
    pub fn get_by_rank(&self, rank: usize) -> Option<&T> {
        self.map.get_by_rank(rank).map(|(k, ())| k)
    }

    /// Returns the number of values in the set strictly less than `value`.
    ///
    /// This is an order-statistic extension and is not part of the standard
    /// `BTreeSet` API.
    ///
    /// For a value that is present, this is its zero-based rank in sorted
    /// order, so `rank_of` and [`get_by_rank`](LlrbSet::get_by_rank) are
    /// inverses. For a value that is absent, it is the rank the value would
    /// occupy if inserted.
    ///
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use llrb_tree::LlrbSet;
    ///
    /// let set = LlrbSet::from([10, 20]);
    ///
    /// assert_eq!(set.rank_of(&20), 1);
    /// assert_eq!(set.rank_of(&15), 1);
    /// assert_eq!(set.rank_of(&25), 2);
    /// ```
    #[must_use]
    pub fn rank_of<Q>(&self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.map.rank_of(value)
    }
}

/// Indexes into the set by rank.
///
/// # Panics
///
/// Panics if `rank` is out of bounds.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbSet;
/// use llrb_tree::Rank;
///
/// let set = LlrbSet::from([10, 20, 30]);
/// assert_eq!(set[Rank(1)], 20);
/// ```
impl<T: Ord> Index<Rank> for LlrbSet<T> {
    type Output = T;

    fn index(&self, rank: Rank) -> &Self::Output {
        self.get_by_rank(rank.0).expect("index out of bounds")
    }
}
