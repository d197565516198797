use core::fmt;

/// A structural invariant violation found by an integrity check.
///
/// Returned by [`check_invariants`](crate::LlrbMap::check_invariants), which
/// independently re-derives every invariant of the left-leaning red-black
/// encoding and reports the first violation it finds. A correct tree never
/// produces one of these; the check exists to catch rebalancing bugs under
/// test.
///
/// # Examples
///
/// ```
/// use llrb_tree::LlrbSet;
///
/// let set = LlrbSet::from([3, 1, 2]);
/// assert!(set.check_invariants().is_ok());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InvariantError {
    /// A key is not strictly between the bounds inherited from its ancestors.
    BrokenOrder,
    /// A node has a red right child; red links must lean left.
    RedRightChild,
    /// A red node has a red left child.
    ConsecutiveRedLinks,
    /// Two root-to-empty paths disagree on their black-link count.
    UnbalancedBlacks {
        /// Black-link count along the left spine of the offending node.
        left: usize,
        /// Black-link count along the right spine of the offending node.
        right: usize,
    },
    /// A node's cached subtree size disagrees with the recomputed value.
    SizeMismatch {
        /// The size stored in the node.
        stored: usize,
        /// The size recomputed from the children.
        computed: usize,
    },
    /// A node's cached subtree height disagrees with the recomputed value.
    HeightMismatch {
        /// The height stored in the node.
        stored: i8,
        /// The height recomputed from the children.
        computed: i8,
    },
    /// Selecting by a key's rank did not return that key.
    RankSelectMismatch {
        /// The rank at which the round trip failed.
        rank: usize,
    },
    /// The root node is tagged red.
    RedRoot,
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrokenOrder => write!(f, "key order violated"),
            Self::RedRightChild => write!(f, "red right child; red links must lean left"),
            Self::ConsecutiveRedLinks => write!(f, "red node with a red left child"),
            Self::UnbalancedBlacks { left, right } => {
                write!(f, "unbalanced black links: {left} on the left, {right} on the right")
            }
            Self::SizeMismatch { stored, computed } => {
                write!(f, "cached subtree size {stored} but {computed} computed")
            }
            Self::HeightMismatch { stored, computed } => {
                write!(f, "cached subtree height {stored} but {computed} computed")
            }
            Self::RankSelectMismatch { rank } => {
                write!(f, "select(rank(key)) != key at rank {rank}")
            }
            Self::RedRoot => write!(f, "root node is red"),
        }
    }
}

impl core::error::Error for InvariantError {}
