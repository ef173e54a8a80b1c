//! Nearest-neighbor index structures for descriptor matching.
//!
//! Two independent implementations with different approximation strategies:
//!
//! - [`KdTree`]: balanced binary space partition; exact depth-first search
//!   plus best-bin-first approximate search bounded by a visit budget.
//! - [`GridTrie`]: grid-hash trie over [0, 1]-normalized vectors; constant
//!   descent cost plus radius-bounded expansion along a circular leaf ring.
//!
//! Both are built once by a single writer and are read-only afterwards, so
//! concurrent lookups are safe; every diagnostic counter is query-local.

mod kdtree;
mod trie;

pub use kdtree::{KdTree, Neighbor};
pub use trie::{GridTrie, TrieMatch};
