//! Property-based tests for ordering, merging and intersection
//!
//! Each property is checked against a naive reference built with std sort
//! and set operations.

#![cfg(test)]

use std::collections::BTreeSet;

use proptest::prelude::*;

use super::comparer::tests::TestItem;
use super::{intersect, merge_all, BaseComparer, SortBy, SortOrder};
use crate::codec::DataType;

/// Comparer over 4-byte little-endian i32 item ids
fn int_comparer(sort_by: SortBy) -> BaseComparer {
    BaseComparer::new(false, "", vec![SortOrder::new(DataType::Int32, sort_by)])
}

fn to_items(values: &[i32]) -> Vec<TestItem> {
    values.iter().map(|v| TestItem::new(&v.to_le_bytes())).collect()
}

fn to_values(items: &[TestItem]) -> Vec<i32> {
    items
        .iter()
        .map(|i| i32::from_le_bytes([i.id[0], i.id[1], i.id[2], i.id[3]]))
        .collect()
}

/// Strategy producing up to 6 sorted lists of small integers
fn sorted_lists() -> impl Strategy<Value = Vec<Vec<i32>>> {
    prop::collection::vec(prop::collection::vec(-50i32..50, 0..20), 0..6).prop_map(|mut lists| {
        for list in &mut lists {
            list.sort();
        }
        lists
    })
}

/// Strategy producing a sorted, de-duplicated list
fn sorted_set() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::btree_set(-30i32..30, 0..25).prop_map(|s| s.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Merging never exceeds the bound and yields the true top-M
    #[test]
    fn prop_merge_is_bounded_top_m(lists in sorted_lists(), max in 0usize..40) {
        let comparer = int_comparer(SortBy::Asc);
        let merged = merge_all(lists.iter().map(|l| to_items(l)), max, &comparer);

        let mut reference: Vec<i32> = lists.iter().flatten().copied().collect();
        reference.sort();
        reference.truncate(max);

        prop_assert!(merged.len() <= max);
        prop_assert_eq!(to_values(&merged), reference);
    }

    /// Descending merges produce the largest values first
    #[test]
    fn prop_merge_descending(lists in sorted_lists(), max in 1usize..40) {
        let comparer = int_comparer(SortBy::Desc);
        let desc: Vec<Vec<i32>> = lists
            .iter()
            .map(|l| l.iter().rev().copied().collect())
            .collect();
        let merged = merge_all(desc.iter().map(|l| to_items(l)), max, &comparer);

        let mut reference: Vec<i32> = lists.iter().flatten().copied().collect();
        reference.sort_by(|a, b| b.cmp(a));
        reference.truncate(max);

        prop_assert_eq!(to_values(&merged), reference);
    }

    /// Intersection matches the set intersection of the inputs
    #[test]
    fn prop_intersection_matches_sets(a in sorted_set(), b in sorted_set()) {
        let comparer = int_comparer(SortBy::Asc);
        let mut result = to_items(&a);
        intersect(&mut result, &to_items(&b), &comparer, &[]).unwrap();

        let sa: BTreeSet<i32> = a.iter().copied().collect();
        let sb: BTreeSet<i32> = b.iter().copied().collect();
        let reference: Vec<i32> = sa.intersection(&sb).copied().collect();

        prop_assert_eq!(to_values(&result), reference);
    }

    /// Binary search insertion keeps a list sorted
    #[test]
    fn prop_insertion_keeps_order(values in prop::collection::vec(-100i32..100, 0..40)) {
        let comparer = int_comparer(SortBy::Asc);
        let mut list: Vec<TestItem> = Vec::new();
        for v in &values {
            let item = TestItem::new(&v.to_le_bytes());
            let pos = list.partition_point(|probe| {
                comparer.compare_items(probe, &item) != std::cmp::Ordering::Greater
            });
            list.insert(pos, item);
        }
        let got = to_values(&list);
        let mut reference = values.clone();
        reference.sort();
        prop_assert_eq!(got, reference);
    }
}
