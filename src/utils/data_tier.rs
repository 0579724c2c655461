//! Data-tier helpers: forwarding decisions, full data ids and payload
//! hydration

use tracing::{debug, error, info};

use crate::codec::{compare_typed, generate_primary_id};
use crate::config::{FullDataIdField, FullDataIdPartFormat, FullDataIdType, IndexServerMode};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::{FullDataIdInfo, IndexDataItem, ResultItem};
use crate::sort::Item;
use crate::store::RelayMessage;

/// Whether a mutation arriving with this routing must also reach the data
/// tier
pub fn should_forward_to_data_tier(
    relay_ttl: i16,
    source_zone: u16,
    my_zone: u16,
    mode: IndexServerMode,
) -> bool {
    relay_ttl > 0 && source_zone == my_zone && mode == IndexServerMode::Databound
}

/// Data-tier type of `type_id`. A missing relation is a deployment defect.
pub fn related_type_id(ctx: &IndexStoreContext, type_id: i16) -> Result<i16> {
    ctx.try_get_related_index_type_id(type_id).ok_or_else(|| {
        error!("Invalid RelatedTypeId for TypeId - {}", type_id);
        Error::RelatedTypeNotFound {
            type_id,
            detail: "no RelatedIndexTypeId configured".to_string(),
        }
    })
}

/// Data-tier type and key layout used to hydrate one query's items
fn data_target<'a>(
    ctx: &IndexStoreContext,
    type_id: i16,
    configured: &'a [FullDataIdField],
    info: Option<&'a FullDataIdInfo>,
) -> Result<(i16, &'a [FullDataIdField])> {
    let named = info.and_then(|i| i.related_type_name.as_deref().map(|name| (i, name)));
    match named {
        Some((info, name)) => {
            let related = ctx.try_get_type_id(name).ok_or_else(|| {
                error!("Invalid RelatedCacheTypeName - {}", name);
                Error::RelatedTypeNotFound {
                    type_id,
                    detail: format!("unknown type name {}", name),
                }
            })?;
            let fields = if info.full_data_id_fields.is_empty() {
                configured
            } else {
                info.full_data_id_fields.as_slice()
            };
            Ok((related, fields))
        }
        None => Ok((related_type_id(ctx, type_id)?, configured)),
    }
}

// =============================================================================
// Full Data Id
// =============================================================================

/// Builds the data-tier key of `item`. Returns `None`, after logging, when
/// the key cannot be built or comes out empty.
pub fn get_full_data_id<I: Item + ?Sized>(
    index_id: Option<&[u8]>,
    item: &I,
    fields: &[FullDataIdField],
) -> Option<Vec<u8>> {
    match build_list(index_id, item, fields) {
        Ok(id) if !id.is_empty() => Some(id),
        Ok(_) => None,
        Err(e) => {
            info!(error = %e, item_id = ?item.item_id(), "Error generating FullDataId");
            None
        }
    }
}

/// Data-tier keys of a list of items, in order
pub fn full_data_ids<I: Item>(
    index_id: Option<&[u8]>,
    items: &[I],
    fields: &[FullDataIdField],
) -> Vec<Option<Vec<u8>>> {
    items
        .iter()
        .map(|item| get_full_data_id(index_id, item, fields))
        .collect()
}

fn build_list<I: Item + ?Sized>(
    index_id: Option<&[u8]>,
    item: &I,
    fields: &[FullDataIdField],
) -> Result<Vec<u8>> {
    let Some(first) = fields.first() else {
        return Ok(Vec::new());
    };
    match first.format {
        FullDataIdPartFormat::Sequential => {
            let mut id = Vec::new();
            for field in fields {
                id.extend_from_slice(&build_field(index_id, item, field)?);
            }
            Ok(id)
        }
        FullDataIdPartFormat::MinMax => build_min_max(index_id, item, fields),
    }
}

fn build_field<I: Item + ?Sized>(
    index_id: Option<&[u8]>,
    item: &I,
    field: &FullDataIdField,
) -> Result<Vec<u8>> {
    if !field.parts.is_empty() {
        return build_list(index_id, item, &field.parts);
    }
    match field.kind()? {
        FullDataIdType::IndexId => index_id
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::invalid_request("IndexId missing required to generate FullDataId")),
        FullDataIdType::ItemId => Ok(item.item_id().to_vec()),
        FullDataIdType::Tag(key) => item
            .tag_value(&key)
            .map(<[u8]>::to_vec)
            .ok_or(Error::TagNotFound { name: key.name }),
    }
}

/// Two typed values, smaller first
fn build_min_max<I: Item + ?Sized>(
    index_id: Option<&[u8]>,
    item: &I,
    fields: &[FullDataIdField],
) -> Result<Vec<u8>> {
    let [first, second] = fields else {
        return Err(Error::InvalidConfig(format!(
            "MinMax FullDataIdPart list needs exactly 2 parts, found {}",
            fields.len()
        )));
    };
    let value1 = build_field(index_id, item, first)?;
    let value2 = build_field(index_id, item, second)?;
    let slice1 = window(&value1, first)?;
    let slice2 = window(&value2, second)?;

    let (mut at1, mut at2) = (0, 0);
    let id = if compare_typed(slice1, slice2, &mut at1, &mut at2, first.data_type).is_lt() {
        [slice1, slice2].concat()
    } else {
        [slice2, slice1].concat()
    };
    Ok(id)
}

fn window<'a>(value: &'a [u8], field: &FullDataIdField) -> Result<&'a [u8]> {
    value
        .get(field.offset..field.offset + field.count)
        .ok_or_else(|| {
            Error::invalid_request(format!(
                "FullDataIdPart {} has {} bytes, needs offset {} + count {}",
                field.part_name,
                value.len(),
                field.offset,
                field.count
            ))
        })
}

// =============================================================================
// Hydration
// =============================================================================

/// An item that can carry its data-tier payload
pub trait Hydrate: Item {
    /// Index id the item was read from, when it records one
    fn source_index_id(&self) -> Option<&[u8]>;

    fn set_data(&mut self, data: Vec<u8>);
}

impl Hydrate for ResultItem {
    fn source_index_id(&self) -> Option<&[u8]> {
        Some(&self.index_id)
    }

    fn set_data(&mut self, data: Vec<u8>) {
        self.data = Some(data);
    }
}

impl Hydrate for IndexDataItem {
    fn source_index_id(&self) -> Option<&[u8]> {
        None
    }

    fn set_data(&mut self, data: Vec<u8>) {
        self.data = Some(data);
    }
}

/// Fetches the payloads of `items` from the data tier in one batch.
///
/// `index_id` is used for items that do not record their own. Items whose
/// key cannot be built are left without data.
pub fn get_data<T: Hydrate>(
    items: &mut [T],
    ctx: &IndexStoreContext,
    msg: &MessageContext,
    configured_fields: &[FullDataIdField],
    info: Option<&FullDataIdInfo>,
    index_id: Option<&[u8]>,
) -> Result<()> {
    let (related, fields) = data_target(ctx, msg.type_id, configured_fields, info)?;
    if items.is_empty() {
        return Ok(());
    }

    let mut slots = Vec::with_capacity(items.len());
    let mut messages = Vec::with_capacity(items.len());
    for (at, item) in items.iter().enumerate() {
        let source = item.source_index_id().or(index_id);
        if let Some(id) = get_full_data_id(source, item, fields) {
            messages.push(RelayMessage::get(related, generate_primary_id(&id), id));
            slots.push(at);
        }
    }
    ctx.forwarder().handle_messages(&mut messages)?;

    for (at, message) in slots.into_iter().zip(messages) {
        match message.payload {
            Some(payload) => items[at].set_data(ctx.decode_payload(&payload)?.to_vec()),
            None => debug!(
                type_id = related,
                full_data_id = ?message.extended_id,
                "Fetched Null Data"
            ),
        }
    }
    Ok(())
}
