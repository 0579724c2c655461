//! Index storage helpers shared by the processors

use crate::codec::form_extended_id;
use crate::config::{Index, IndexTypeMapping};
use crate::context::IndexStoreContext;
use crate::error::Result;
use crate::query::TagMap;
use crate::sort::Item;
use crate::store::adapter::to_tag_map;
use crate::store::{CacheIndexInternal, InDeserializationContext, RelayMessage};

/// Full, unfiltered deserialization context for `index`
pub fn in_context(
    ctx: &IndexStoreContext,
    type_id: i16,
    index_id: &[u8],
    index: &Index,
) -> InDeserializationContext {
    InDeserializationContext::new(type_id, index_id, index, ctx.string_hashes().clone())
}

/// Fetches and decodes the stored record of `index` for the index id in
/// `in_context`. `None` when no record exists.
pub fn get_cache_index_internal(
    ctx: &IndexStoreContext,
    primary_id: i32,
    index: &Index,
    in_context: InDeserializationContext,
) -> Result<Option<CacheIndexInternal>> {
    let extended_id = form_extended_id(&in_context.index_id, index.extended_id_suffix);
    let mut get = RelayMessage::get(in_context.type_id, primary_id, extended_id);
    ctx.storage().handle_message(&mut get)?;

    let Some(payload) = get.payload.as_ref().filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    let record = ctx.decode_payload(payload)?;
    CacheIndexInternal::deserialize(&record, in_context).map(Some)
}

/// Whole index, no filter
pub fn fetch_full(
    ctx: &IndexStoreContext,
    type_id: i16,
    primary_id: i32,
    index_id: &[u8],
    index: &Index,
) -> Result<Option<CacheIndexInternal>> {
    get_cache_index_internal(ctx, primary_id, index, in_context(ctx, type_id, index_id, index))
}

/// Metadata kept in its own record, keyed by the raw index id
pub fn separate_metadata(
    ctx: &IndexStoreContext,
    type_id: i16,
    primary_id: i32,
    index_id: &[u8],
) -> Result<Option<Vec<u8>>> {
    let mut get = RelayMessage::get(type_id, primary_id, index_id.to_vec());
    ctx.storage().handle_message(&mut get)?;
    match get.payload {
        Some(payload) => Ok(Some(ctx.decode_payload(&payload)?.to_vec())),
        None => Ok(None),
    }
}

/// Metadata answering a single-index query: the separate record when the
/// type stores it apart, otherwise the first fetched index that carries
/// metadata.
pub fn get_query_metadata(
    ctx: &IndexStoreContext,
    mapping: &IndexTypeMapping,
    primary_id: i32,
    index_id: &[u8],
    fetched: &[&CacheIndexInternal],
) -> Result<Option<Vec<u8>>> {
    if mapping.metadata_stored_separately {
        return separate_metadata(ctx, mapping.type_id, primary_id, index_id);
    }
    let carrier = fetched.iter().find(|cii| {
        mapping
            .index(&cii.in_context().index_name)
            .map(|index| index.metadata_present)
            .unwrap_or(false)
    });
    Ok(carrier.and_then(|cii| cii.metadata().map(<[u8]>::to_vec)))
}

/// Tags `search_item` carries in `cii`, or `None` when `cii` does not hold it
pub fn get_tags<I: Item + ?Sized>(
    ctx: &IndexStoreContext,
    cii: &CacheIndexInternal,
    search_item: &I,
) -> Result<Option<TagMap>> {
    let found = match cii.search(search_item)? {
        Some(pos) => cii.get_item(pos),
        None => None,
    };
    found
        .map(|item| to_tag_map(item, cii.in_context().type_id, ctx.tag_hashes()))
        .transpose()
}

/// Adds the tags of `found` that `tags` lacks
pub fn add_missing_tags(tags: &mut TagMap, found: TagMap) {
    for (name, value) in found {
        tags.entry(name).or_insert(value);
    }
}
