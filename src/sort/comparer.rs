//! Item ordering
//!
//! A [`BaseComparer`] orders items either by their item id or by one named
//! tag. The sort value is interpreted through an ordered list of
//! [`SortOrder`]s, so a compound key such as `(i16, i32)` packed into one tag
//! tie-breaks field by field.
//!
//! Absent values sort first in ascending order and last in descending order.
//! Values of different length order by length before content, in the
//! direction of the first sort order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::codec::{compare_typed, string_hash, DataType};
use crate::error::{Error, Result};

// =============================================================================
// Item Abstraction
// =============================================================================

/// Tag name paired with its interned hash code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagKey {
    pub name: String,
    pub hash: i32,
}

impl TagKey {
    /// Build a key, computing the hash code of `name`
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let hash = string_hash(&name);
        Self { name, hash }
    }
}

/// Anything with an item id and tags that can be sorted, searched and
/// filtered.
pub trait Item {
    /// Item id bytes
    fn item_id(&self) -> &[u8];

    /// Value of a tag, if present
    fn tag_value(&self, key: &TagKey) -> Option<&[u8]>;
}

// =============================================================================
// Sort Descriptors
// =============================================================================

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortBy {
    #[default]
    #[serde(rename = "ASC", alias = "Asc", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "Desc", alias = "desc")]
    Desc,
}

/// One component of a sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SortOrder {
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub sort_by: SortBy,
}

impl SortOrder {
    pub fn new(data_type: DataType, sort_by: SortBy) -> Self {
        Self { data_type, sort_by }
    }
}

/// Ad hoc sort requested by a query, overriding an index's primary sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSort {
    pub tag_name: String,
    #[serde(default = "default_true")]
    pub is_tag: bool,
    pub sort_order: SortOrder,
}

fn default_true() -> bool {
    true
}

impl TagSort {
    pub fn new(tag_name: impl Into<String>, is_tag: bool, sort_order: SortOrder) -> Self {
        Self {
            tag_name: tag_name.into(),
            is_tag,
            sort_order,
        }
    }
}

// =============================================================================
// Comparer
// =============================================================================

/// Orders items by item id or by one tag
#[derive(Debug, Clone)]
pub struct BaseComparer {
    is_tag: bool,
    field: TagKey,
    sort_orders: Vec<SortOrder>,
}

impl BaseComparer {
    /// Create a comparer. An empty sort order list compares raw bytes
    /// ascending.
    pub fn new(is_tag: bool, field_name: &str, sort_orders: Vec<SortOrder>) -> Self {
        let sort_orders = if sort_orders.is_empty() {
            vec![SortOrder::default()]
        } else {
            sort_orders
        };
        Self {
            is_tag,
            field: TagKey::new(field_name),
            sort_orders,
        }
    }

    /// Comparer for an ad hoc tag sort
    pub fn from_tag_sort(tag_sort: &TagSort) -> Self {
        Self::new(tag_sort.is_tag, &tag_sort.tag_name, vec![tag_sort.sort_order])
    }

    /// Single-field ascending comparer used by condition evaluation
    pub fn ascending(data_type: DataType) -> Self {
        Self::new(false, "", vec![SortOrder::new(data_type, SortBy::Asc)])
    }

    pub fn is_tag_primary_sort(&self) -> bool {
        self.is_tag
    }

    pub fn sort_field_name(&self) -> &str {
        &self.field.name
    }

    pub fn sort_field(&self) -> &TagKey {
        &self.field
    }

    pub fn sort_order_list(&self) -> &[SortOrder] {
        &self.sort_orders
    }

    /// Direction of the leading sort order
    pub fn direction(&self) -> SortBy {
        self.sort_orders[0].sort_by
    }

    /// The value this comparer sorts `item` by
    pub fn sort_value<'a, I: Item + ?Sized>(&self, item: &'a I) -> Option<&'a [u8]> {
        if self.is_tag {
            item.tag_value(&self.field)
        } else {
            Some(item.item_id())
        }
    }

    /// Compare two items by their sort values
    pub fn compare_items<A, B>(&self, x: &A, y: &B) -> Ordering
    where
        A: Item + ?Sized,
        B: Item + ?Sized,
    {
        self.compare(self.sort_value(x), self.sort_value(y))
    }

    /// Compare two raw sort values
    pub fn compare(&self, a: Option<&[u8]>, b: Option<&[u8]>) -> Ordering {
        let directed = |order: Ordering| match self.direction() {
            SortBy::Asc => order,
            SortBy::Desc => order.reverse(),
        };

        let (a, b) = match (a, b) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return directed(Ordering::Less),
            (Some(_), None) => return directed(Ordering::Greater),
            (Some(a), Some(b)) => (a, b),
        };

        if a.len() != b.len() {
            return directed(a.len().cmp(&b.len()));
        }

        let (mut at1, mut at2) = (0usize, 0usize);
        for order in &self.sort_orders {
            let result = compare_typed(a, b, &mut at1, &mut at2, order.data_type);
            let result = match order.sort_by {
                SortBy::Asc => result,
                SortBy::Desc => result.reverse(),
            };
            if result != Ordering::Equal {
                return result;
            }
        }
        Ordering::Equal
    }
}

// =============================================================================
// Identity And Search
// =============================================================================

/// Returns true when every local identity tag is byte-equal on both items.
///
/// A local identity tag missing from either item is an error.
pub fn equals_local_id<A, B>(x: &A, y: &B, local_identity: &[TagKey]) -> Result<bool>
where
    A: Item + ?Sized,
    B: Item + ?Sized,
{
    for key in local_identity {
        match (x.tag_value(key), y.tag_value(key)) {
            (Some(a), Some(b)) => {
                if a != b {
                    return Ok(false);
                }
            }
            _ => {
                return Err(Error::TagNotFound {
                    name: key.name.clone(),
                })
            }
        }
    }
    Ok(true)
}

/// Binary searches `list` (sorted by `comparer`) for `item`.
///
/// Without local identity tags any comparer-equal position matches. With
/// them, comparer-equal neighbours of the hit are scanned for one whose
/// identity tags also match.
pub fn binary_search_item<T, I>(
    list: &[T],
    item: &I,
    comparer: &BaseComparer,
    local_identity: &[TagKey],
) -> Result<Option<usize>>
where
    T: Item,
    I: Item + ?Sized,
{
    let hit = match list.binary_search_by(|probe| comparer.compare_items(probe, item)) {
        Ok(pos) => pos,
        Err(_) => return Ok(None),
    };
    if local_identity.is_empty() {
        return Ok(Some(hit));
    }
    if equals_local_id(&list[hit], item, local_identity)? {
        return Ok(Some(hit));
    }

    let same_key = |pos: usize| comparer.compare_items(&list[pos], item) == Ordering::Equal;
    let mut pos = hit;
    while pos > 0 && same_key(pos - 1) {
        pos -= 1;
        if equals_local_id(&list[pos], item, local_identity)? {
            return Ok(Some(pos));
        }
    }
    let mut pos = hit + 1;
    while pos < list.len() && same_key(pos) {
        if equals_local_id(&list[pos], item, local_identity)? {
            return Ok(Some(pos));
        }
        pos += 1;
    }
    Ok(None)
}
