//! Bounded merge of sorted item lists

use std::cmp::Ordering;

use super::comparer::{BaseComparer, Item};

/// Merges two lists sorted by `comparer` into one sorted list of at most
/// `max_count` items. On ties the item from `list1` comes first.
pub fn merge_item_lists<T: Item>(
    list1: Vec<T>,
    list2: Vec<T>,
    max_count: usize,
    comparer: &BaseComparer,
) -> Vec<T> {
    let bound = max_count.min(list1.len() + list2.len());
    let mut merged = Vec::with_capacity(bound);
    let mut left = list1.into_iter().peekable();
    let mut right = list2.into_iter().peekable();

    while merged.len() < bound {
        let take_left = match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => comparer.compare_items(a, b) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        match next {
            Some(item) => merged.push(item),
            None => break,
        }
    }
    merged
}

/// Folds any number of sorted lists into one bounded sorted list.
///
/// Earlier lists win ties, so the result is stable in input order.
pub fn merge_all<T: Item>(
    lists: impl IntoIterator<Item = Vec<T>>,
    max_count: usize,
    comparer: &BaseComparer,
) -> Vec<T> {
    lists.into_iter().fold(Vec::new(), |acc, list| {
        merge_item_lists(acc, list, max_count, comparer)
    })
}
