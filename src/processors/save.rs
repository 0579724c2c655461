//! Save: apply a CacheIndex delta to one or more indexes
//!
//! The whole fetch-mutate-store sequence runs under the key lock of the
//! message's primary id. Payloads of added items go to the data tier, and
//! so do deletes for removed and capped items, unless the request preserves
//! data or the routing says another node owns forwarding.

use tracing::{debug, warn};

use super::target_index;
use crate::codec::{form_extended_id, generate_primary_id};
use crate::config::{Index, IndexTypeMapping};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::{CacheIndex, IndexDataItem};
use crate::sort::{BaseComparer, Item, SortBy, TagKey};
use crate::store::{CacheIndexInternal, InternalItem, RelayMessage};
use crate::utils::{data_tier, index_server};

pub fn process(cache_index: &CacheIndex, msg: &MessageContext, ctx: &IndexStoreContext) -> Result<()> {
    let _guard = ctx.locking().lock_key(msg.primary_id);
    apply(cache_index, msg, ctx).map_err(|e| {
        debug!(type_id = msg.type_id, cache_index = ?cache_index, "CacheIndex");
        Error::processing(msg.type_id, "save message", e)
    })
}

fn validate_save(cache_index: &CacheIndex) -> Result<()> {
    if cache_index.index_virtual_count_mapping.is_some()
        && !cache_index.add_list.is_empty()
        && !cache_index.delete_list.is_empty()
    {
        return Err(Error::invalid_request(
            "VirtualCount cannot be set with non-empty AddList and DeleteList",
        ));
    }
    Ok(())
}

/// One index a save writes to
struct Target<'a> {
    index: &'a Index,
    /// Tags the index keeps, `None` for every tag of the add item
    tag_names: Option<&'a [String]>,
}

fn save_targets<'a>(mapping: &'a IndexTypeMapping, cache_index: &'a CacheIndex) -> Result<Vec<Target<'a>>> {
    match &cache_index.target_index_name {
        Some(name) => Ok(vec![Target {
            index: target_index(mapping, name)?,
            tag_names: None,
        }]),
        None => cache_index
            .index_tag_mapping
            .iter()
            .map(|(name, tags)| {
                Ok(Target {
                    index: target_index(mapping, name)?,
                    tag_names: Some(tags.as_slice()),
                })
            })
            .collect(),
    }
}

fn apply(cache_index: &CacheIndex, msg: &MessageContext, ctx: &IndexStoreContext) -> Result<()> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    validate_save(cache_index)?;
    let primary_id = cache_index.primary_id();

    let mut internals = Vec::new();
    let mut capped = None;
    match &cache_index.index_virtual_count_mapping {
        Some(counts) => {
            for (name, count) in counts {
                let index = target_index(mapping, name)?;
                let in_context =
                    index_server::in_context(ctx, msg.type_id, &cache_index.index_id, index).header_only();
                let mut cii =
                    match index_server::get_cache_index_internal(ctx, primary_id, index, in_context.clone())? {
                        Some(cii) => cii,
                        None => CacheIndexInternal::new(in_context),
                    };
                cii.set_virtual_count(*count);
                internals.push(cii);
            }
        }
        None => {
            let targets = save_targets(mapping, cache_index)?;
            for target in &targets {
                let in_context =
                    index_server::in_context(ctx, msg.type_id, &cache_index.index_id, target.index);
                let stored = if cache_index.replace_full_index {
                    None
                } else {
                    index_server::get_cache_index_internal(ctx, primary_id, target.index, in_context.clone())?
                };
                internals.push(stored.unwrap_or_else(|| CacheIndexInternal::new(in_context)));
            }

            if !cache_index.delete_list.is_empty() && !cache_index.replace_full_index {
                process_delete_list(&mut internals, cache_index)?;
            }
            let mut trimmed = Vec::new();
            if !cache_index.add_list.is_empty() || cache_index.update_metadata {
                for (cii, target) in internals.iter_mut().zip(&targets) {
                    process_add_list(cii, target, cache_index, ctx, msg.type_id, &mut trimmed)?;
                }
            }
            debug!(
                type_id = msg.type_id,
                index_id = ?cache_index.index_id,
                added = cache_index.add_list.len(),
                deleted = cache_index.delete_list.len(),
                capped = trimmed.len(),
                "Applied save"
            );
            capped = Some(trimmed);
        }
    }

    let mut messages = Vec::with_capacity(internals.len() + 1);
    if mapping.metadata_stored_separately && cache_index.update_metadata {
        let metadata = cache_index.metadata.as_deref().unwrap_or_default();
        messages.push(RelayMessage::save(
            msg.type_id,
            primary_id,
            cache_index.index_id.clone(),
            ctx.encode_payload(msg.type_id, metadata),
        ));
    }
    for cii in &internals {
        let index = target_index(mapping, &cii.in_context().index_name)?;
        let record = cii.serialize()?;
        messages.push(RelayMessage::save(
            msg.type_id,
            primary_id,
            form_extended_id(&cache_index.index_id, index.extended_id_suffix),
            ctx.encode_payload(msg.type_id, &record),
        ));
    }
    // records encode before anything reaches the data tier
    if let Some(capped) = capped {
        forward_to_data_tier(cache_index, msg, ctx, mapping, &capped)?;
    }
    ctx.storage().handle_messages(&mut messages)
}

fn process_delete_list(internals: &mut [CacheIndexInternal], cache_index: &CacheIndex) -> Result<()> {
    for cii in internals.iter_mut().filter(|cii| cii.count() > 0) {
        for delete in &cache_index.delete_list {
            if let Some(pos) = cii.search(delete)? {
                cii.delete_item(pos, true);
            }
        }
    }
    Ok(())
}

/// Tags of `add` as stored in an index keeping `tag_names`, registering
/// each name. Names the item does not carry are skipped.
fn stored_tags(
    ctx: &IndexStoreContext,
    type_id: i16,
    add: &IndexDataItem,
    tag_names: Option<&[String]>,
) -> Vec<(i32, Vec<u8>)> {
    let tag_hashes = ctx.tag_hashes();
    match tag_names {
        None => add
            .tags
            .iter()
            .map(|(name, value)| (tag_hashes.add_tag(type_id, name), value.clone()))
            .collect(),
        Some(names) => names
            .iter()
            .filter_map(|name| {
                add.tags
                    .get(name)
                    .map(|value| (tag_hashes.add_tag(type_id, name), value.clone()))
            })
            .collect(),
    }
}

fn process_add_list(
    cii: &mut CacheIndexInternal,
    target: &Target<'_>,
    cache_index: &CacheIndex,
    ctx: &IndexStoreContext,
    type_id: i16,
    capped: &mut Vec<InternalItem>,
) -> Result<()> {
    let index = target.index;
    let comparer = index.comparer();
    let sort_by = index.leading_sort_order().sort_by;

    for add in &cache_index.add_list {
        match cii.search(add)? {
            Some(pos) => update_existing(cii, target, add, pos, ctx, type_id, &comparer, sort_by),
            None => {
                let pos = cii.get_insert_position(add, sort_by, &comparer);
                let item = InternalItem {
                    item_id: add.item_id.clone(),
                    tags: stored_tags(ctx, type_id, add, target.tag_names),
                };
                cii.insert_item(item, pos, true);

                if index.max_index_size > 0 && cii.count() > index.max_index_size {
                    let at = if index.trim_from_tail { cii.count() - 1 } else { 0 };
                    capped.push(cii.delete_item(at, false));
                }
            }
        }
    }

    if cache_index.update_metadata && index.metadata_present {
        cii.set_metadata(cache_index.metadata.clone());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn update_existing(
    cii: &mut CacheIndexInternal,
    target: &Target<'_>,
    add: &IndexDataItem,
    pos: usize,
    ctx: &IndexStoreContext,
    type_id: i16,
    comparer: &BaseComparer,
    sort_by: SortBy,
) {
    if add.tags.is_empty() {
        return;
    }
    let sort_info = &target.index.primary_sort_info;
    let reposition = sort_info.is_tag && {
        let key = TagKey::new(sort_info.field_name.as_str());
        match add.tag_value(&key) {
            Some(new_value) => cii.get_item(pos).and_then(|item| item.tag_value(&key)) != Some(new_value),
            None => false,
        }
    };

    let tags = stored_tags(ctx, type_id, add, target.tag_names);
    if let Some(item) = cii.get_item_mut(pos) {
        for (hash, value) in tags {
            item.update_tag(hash, value);
        }
    }
    if reposition {
        let item = cii.delete_item(pos, false);
        let at = cii.get_insert_position(add, sort_by, comparer);
        cii.insert_item(item, at, false);
    }
}

fn forward_to_data_tier(
    cache_index: &CacheIndex,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
    mapping: &IndexTypeMapping,
    capped: &[InternalItem],
) -> Result<()> {
    let forward = data_tier::should_forward_to_data_tier(
        msg.relay_ttl,
        msg.source_zone,
        ctx.my_zone(),
        mapping.mode,
    );
    if !forward || cache_index.preserve_data {
        return Ok(());
    }
    let related = data_tier::related_type_id(ctx, msg.type_id)?;
    let fields = &mapping.full_data_id_fields;
    let index_id = Some(cache_index.index_id.as_slice());

    let mut messages = Vec::new();
    for id in data_tier::full_data_ids(index_id, &cache_index.delete_list, fields)
        .into_iter()
        .flatten()
    {
        messages.push(RelayMessage::delete(related, generate_primary_id(&id), id));
    }
    for add in &cache_index.add_list {
        let Some(id) = data_tier::get_full_data_id(index_id, add, fields) else {
            continue;
        };
        let data = add.data.as_deref().unwrap_or_default();
        if data.is_empty() {
            warn!(
                "Saving null data for TypeId: {}, IndexId: {:?}, ItemId: {:?}, FullDataId: {:?}, PrimaryId: {}",
                related,
                cache_index.index_id,
                add.item_id,
                id,
                generate_primary_id(&id)
            );
        }
        let payload = ctx.encode_payload(related, data);
        messages.push(RelayMessage::save(related, generate_primary_id(&id), id, payload));
    }
    for id in data_tier::full_data_ids(index_id, capped, fields)
        .into_iter()
        .flatten()
    {
        messages.push(RelayMessage::delete(related, generate_primary_id(&id), id));
    }

    if messages.is_empty() {
        return Ok(());
    }
    ctx.forwarder().handle_messages(&mut messages)
}
