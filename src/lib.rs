//! Order-statistic left-leaning red-black tree collections for Rust.
//!
//! This crate provides [`LlrbMap`] and [`LlrbSet`], ordered collections that mirror the
//! standard library's `BTreeMap` and `BTreeSet` APIs and add O(log n) order-statistic
//! operations:
//!
//! - [`get_by_rank`](LlrbMap::get_by_rank) - Get the element at a given sorted position
//! - [`rank_of`](LlrbMap::rank_of) - Count the keys strictly less than a key
//! - [`floor`](LlrbMap::floor) / [`ceiling`](LlrbMap::ceiling) - Nearest-key queries
//! - Indexing by [`Rank`] - e.g., `map[Rank(0)]` for the first element
//!
//! # Example
//!
//! ```
//! use llrb_tree::{LlrbMap, Rank};
//!
//! let mut scores = LlrbMap::new();
//! scores.insert("Alice", 100);
//! scores.insert("Bob", 85);
//! scores.insert("Carol", 92);
//!
//! // Standard BTreeMap operations work as expected
//! assert_eq!(scores.get(&"Bob"), Some(&85));
//! assert_eq!(scores.len(), 3);
//!
//! // Order-statistic operations (O(log n))
//! let (name, score) = scores.get_by_rank(1).unwrap();
//! assert_eq!((*name, *score), ("Bob", 85)); // Keys are sorted alphabetically
//!
//! // The rank of a key is the number of strictly smaller keys,
//! // defined for absent keys too
//! assert_eq!(scores.rank_of(&"Carol"), 2);
//! assert_eq!(scores.rank_of(&"Betty"), 1); // would insert between Alice and Bob
//!
//! // Index by rank
//! assert_eq!(scores[Rank(0)], 100); // Alice's score (first alphabetically)
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`, no standard library dependency
//! - **Familiar API** - Mirrors `std::collections::BTreeMap`/`BTreeSet`
//! - **O(log n) rank operations** - Efficient order-statistic queries via subtree size augmentation
//! - **Index-addressed storage** - Nodes live in an arena; links are indices, not pointers
//!
//! # Implementation
//!
//! The collections are implemented as left-leaning red-black trees: binary search trees
//! that encode a 2-3 tree by constraining red links to lean left. Every node caches the
//! size and height of its subtree, enabling O(log n) rank-based access and O(1) height
//! queries. Nodes are stored in an arena and linked by indices, so `Option<Handle>`
//! child links cost no more than the index itself.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
// NOTE: We have to allow unsafe code for the mutable iterators, which split borrows
// across the node and value arenas.
// #![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod invariant;
mod order_statistic;
mod raw;

pub mod llrb_map;
pub mod llrb_set;

pub use invariant::InvariantError;
pub use llrb_map::LlrbMap;
pub use llrb_set::LlrbSet;
pub use order_statistic::Rank;
