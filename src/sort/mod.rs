//! Sorting, merging and set operations over index items
//!
//! # Components
//!
//! - [`comparer`] - [`BaseComparer`] and the [`Item`] abstraction
//! - [`merge`] - bounded merge of per-index result lists
//! - [`intersection`] - sorted intersection keyed by identity
//! - [`random`] - uniform subsets without replacement

pub mod comparer;
pub mod intersection;
pub mod merge;
pub mod random;

#[cfg(test)]
mod proptest;

pub use comparer::{
    binary_search_item, equals_local_id, BaseComparer, Item, SortBy, SortOrder, TagKey, TagSort,
};
pub use intersection::intersect;
pub use merge::{merge_all, merge_item_lists};
pub use random::random_positions;
