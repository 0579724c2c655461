//! Conversions between stored items and caller-facing items

use super::{CacheIndexInternal, InternalItem};
use crate::context::TagHashCollection;
use crate::error::Result;
use crate::query::{IndexDataItem, IndexItem, ResultItem, TagMap};
use crate::sort::TagKey;

/// Tags of a stored item keyed by name. The first value of a repeated tag wins.
pub fn to_tag_map(item: &InternalItem, type_id: i16, tag_hashes: &TagHashCollection) -> Result<TagMap> {
    let mut tags = TagMap::new();
    for (hash, value) in &item.tags {
        let name = tag_hashes.tag_name(type_id, *hash)?;
        tags.entry(name).or_insert_with(|| value.clone());
    }
    Ok(tags)
}

/// Tags keyed by name hash
pub fn to_tag_list(tags: &TagMap) -> Vec<(i32, Vec<u8>)> {
    tags.iter()
        .map(|(name, value)| (TagKey::new(name.as_str()).hash, value.clone()))
        .collect()
}

pub fn to_internal_item(item: &IndexItem) -> InternalItem {
    InternalItem {
        item_id: item.item_id.clone(),
        tags: to_tag_list(&item.tags),
    }
}

pub fn to_index_item(item: &InternalItem, type_id: i16, tag_hashes: &TagHashCollection) -> Result<IndexItem> {
    Ok(IndexItem {
        item_id: item.item_id.clone(),
        tags: to_tag_map(item, type_id, tag_hashes)?,
    })
}

pub fn to_index_data_item(
    item: &InternalItem,
    type_id: i16,
    tag_hashes: &TagHashCollection,
) -> Result<IndexDataItem> {
    Ok(IndexDataItem::new(
        item.item_id.clone(),
        to_tag_map(item, type_id, tag_hashes)?,
    ))
}

fn window(count: usize, offset: usize, item_num: usize) -> std::ops::Range<usize> {
    if offset == 0 || count < offset {
        return 0..0;
    }
    let start = offset - 1;
    start..start.saturating_add(item_num).min(count)
}

/// Up to `item_num` items starting at the 1-based `offset`
pub fn result_items(
    cii: &CacheIndexInternal,
    offset: usize,
    item_num: usize,
    tag_hashes: &TagHashCollection,
) -> Result<Vec<ResultItem>> {
    result_items_at(cii, window(cii.count(), offset, item_num), tag_hashes)
}

/// Items at the given positions, in the order given
pub fn result_items_at(
    cii: &CacheIndexInternal,
    positions: impl IntoIterator<Item = usize>,
    tag_hashes: &TagHashCollection,
) -> Result<Vec<ResultItem>> {
    let ctx = cii.in_context();
    positions
        .into_iter()
        .filter_map(|pos| cii.get_item(pos))
        .map(|item| {
            Ok(ResultItem::new(
                ctx.index_id.clone(),
                item.item_id.clone(),
                to_tag_map(item, ctx.type_id, tag_hashes)?,
            ))
        })
        .collect()
}

/// Up to `item_num` items starting at the 1-based `offset`, as data items
pub fn index_data_items(
    cii: &CacheIndexInternal,
    offset: usize,
    item_num: usize,
    tag_hashes: &TagHashCollection,
) -> Result<Vec<IndexDataItem>> {
    let type_id = cii.in_context().type_id;
    window(cii.count(), offset, item_num)
        .filter_map(|pos| cii.get_item(pos))
        .map(|item| to_index_data_item(item, type_id, tag_hashes))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window() {
        assert_eq!(window(5, 1, usize::MAX), 0..5);
        assert_eq!(window(5, 2, 2), 1..3);
        assert_eq!(window(5, 5, 3), 4..5);
        assert_eq!(window(5, 6, 1), 0..0);
        assert_eq!(window(0, 1, 1), 0..0);
    }

    #[test]
    fn test_tag_conversions() {
        let tag_hashes = TagHashCollection::in_memory();
        tag_hashes.add_tag(3, "date");
        tag_hashes.add_tag(3, "kind");
        let item = IndexItem::new(vec![1])
            .with_tag("date", vec![1, 2])
            .with_tag("kind", vec![7]);

        let internal = to_internal_item(&item);
        assert_eq!(internal.tag_by_hash(TagKey::new("kind").hash), Some(&[7u8][..]));
        assert_eq!(to_index_item(&internal, 3, &tag_hashes).unwrap(), item);
        assert!(to_tag_map(&internal, 4, &tag_hashes).is_err());
    }
}
