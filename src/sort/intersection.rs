//! Sorted intersection of item lists

use std::cmp::Ordering;

use super::comparer::{binary_search_item, BaseComparer, Item, TagKey};
use crate::error::Result;

/// Keeps only the items of `result` that also appear in `other`.
///
/// Both lists must be sorted by `comparer`. Without local identity tags two
/// items are the same when the comparer says they are equal, and the lists
/// are walked together from their tails. With local identity tags each
/// result item is looked up in `other` and its identity tags compared.
pub fn intersect<T, U>(
    result: &mut Vec<T>,
    other: &[U],
    comparer: &BaseComparer,
    local_identity: &[TagKey],
) -> Result<()>
where
    T: Item,
    U: Item,
{
    if !local_identity.is_empty() {
        let mut keep = Vec::with_capacity(result.len());
        for item in result.iter() {
            keep.push(binary_search_item(other, item, comparer, local_identity)?.is_some());
        }
        let mut flags = keep.into_iter();
        result.retain(|_| flags.next().unwrap_or(false));
        return Ok(());
    }

    let mut i = result.len();
    let mut j = other.len();
    while i > 0 && j > 0 {
        match comparer.compare_items(&result[i - 1], &other[j - 1]) {
            Ordering::Equal => {
                i -= 1;
                j -= 1;
            }
            Ordering::Less => j -= 1,
            Ordering::Greater => {
                result.remove(i - 1);
                i -= 1;
            }
        }
    }
    // whatever is left at the head was never matched
    result.drain(..i);
    Ok(())
}
