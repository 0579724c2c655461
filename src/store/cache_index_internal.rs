//! In-memory form of one physical index and its record codec
//!
//! # Record layout (little-endian)
//!
//! ```text
//! u8   version                     (2; version 1 has no virtual count)
//! u16  metadata length, metadata
//! i32  virtual count               (version >= 2)
//! i32  item count
//! per item:
//!   u16 item id length (> 0), item id
//!   u8  tag count
//!   per tag: i32 tag hash, u16 value length, value
//! ```
//!
//! Values of string-hashed tags are stored as the 4-byte hash of the string.

use std::cmp::Ordering;

use bytes::Bytes;

use super::context::{InDeserializationContext, OutDeserializationContext};
use super::InternalItem;
use crate::codec::{RecordReader, RecordWriter};
use crate::error::{Error, Result};
use crate::filter::cap::CapDecision;
use crate::filter::{process_filter, CapCondition, Condition, Filter};
use crate::sort::{binary_search_item, BaseComparer, Item, SortBy, TagKey, TagSort};

/// Current record version
pub const CURRENT_VERSION: u8 = 2;

/// One physical index: metadata, virtual count and the sorted item list
#[derive(Debug)]
pub struct CacheIndexInternal {
    metadata: Option<Vec<u8>>,
    items: Vec<InternalItem>,
    virtual_count: i32,
    in_context: InDeserializationContext,
    out_context: OutDeserializationContext,
}

/// What happens to a decoded item
enum Admission {
    Keep,
    Filtered,
    Drop,
}

impl CacheIndexInternal {
    /// An index with no record behind it yet
    pub fn new(in_context: InDeserializationContext) -> Self {
        Self {
            metadata: None,
            items: Vec::new(),
            virtual_count: 0,
            in_context,
            out_context: OutDeserializationContext::default(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn in_context(&self) -> &InDeserializationContext {
        &self.in_context
    }

    pub fn out_context(&self) -> &OutDeserializationContext {
        &self.out_context
    }

    pub fn metadata(&self) -> Option<&[u8]> {
        self.metadata.as_deref()
    }

    /// Empty metadata is stored as none
    pub fn set_metadata(&mut self, metadata: Option<Vec<u8>>) {
        self.metadata = metadata.filter(|m| !m.is_empty());
    }

    /// Materialized items
    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[InternalItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<InternalItem> {
        self.items
    }

    /// Replaces the item list wholesale
    pub fn replace_items(&mut self, items: Vec<InternalItem>) {
        self.items = items;
    }

    /// Item count recorded in the fetched record
    pub fn total_count(&self) -> usize {
        self.out_context.total_count
    }

    pub fn is_header_only(&self) -> bool {
        self.in_context.deserialize_header_only
    }

    pub fn virtual_count(&self) -> i32 {
        self.virtual_count
    }

    /// Sets the virtual count, never below the number of physical items
    pub fn set_virtual_count(&mut self, value: i32) {
        let physical = if self.is_header_only() {
            self.out_context.total_count
        } else {
            self.items.len()
        };
        let physical = i32::try_from(physical).unwrap_or(i32::MAX);
        self.virtual_count = value.max(physical);
    }

    /// Takes the items the filter rejected during deserialization
    pub fn take_filtered_items(&mut self) -> Vec<InternalItem> {
        std::mem::take(&mut self.out_context.filtered_items)
    }

    /// Takes the cap condition with its remaining budgets
    pub fn take_cap_condition(&mut self) -> Option<CapCondition> {
        self.in_context.cap_condition.take()
    }

    // =========================================================================
    // Item Operations
    // =========================================================================

    pub fn get_item(&self, pos: usize) -> Option<&InternalItem> {
        self.items.get(pos)
    }

    pub fn get_item_mut(&mut self, pos: usize) -> Option<&mut InternalItem> {
        self.items.get_mut(pos)
    }

    /// Value of a tag on the item at `pos`
    pub fn get_tag_value(&self, pos: usize, tag_name: &str) -> Option<&[u8]> {
        self.items
            .get(pos)
            .and_then(|item| item.tag_value(&TagKey::new(tag_name)))
    }

    /// Position of `item`, matched by sort key and local identity.
    ///
    /// Tag-sorted indexes are scanned for the item id since the item being
    /// looked up may not carry the sort tag.
    pub fn search<I: Item + ?Sized>(&self, item: &I) -> Result<Option<usize>> {
        let local_identity = &self.in_context.local_identity_tags;
        if self.in_context.primary_sort_info.is_tag {
            for (pos, candidate) in self.items.iter().enumerate() {
                if candidate.item_id == item.item_id()
                    && crate::sort::equals_local_id(candidate, item, local_identity)?
                {
                    return Ok(Some(pos));
                }
            }
            return Ok(None);
        }
        let comparer = self.in_context.primary_sort_info.comparer();
        binary_search_item(&self.items, item, &comparer, local_identity)
    }

    /// Slot that keeps the list sorted. Ascending lists insert after equal
    /// items, descending lists before them.
    pub fn get_insert_position<I: Item + ?Sized>(
        &self,
        item: &I,
        sort_by: SortBy,
        comparer: &BaseComparer,
    ) -> usize {
        self.items.partition_point(|probe| {
            let order = comparer.compare_items(probe, item);
            match sort_by {
                SortBy::Asc => order != Ordering::Greater,
                SortBy::Desc => order == Ordering::Less,
            }
        })
    }

    pub fn insert_item(&mut self, item: InternalItem, pos: usize, increment_virtual_count: bool) {
        self.items.insert(pos, item);
        if increment_virtual_count {
            self.virtual_count += 1;
        }
    }

    #[cfg(test)]
    fn add_item(&mut self, item: InternalItem, increment_virtual_count: bool) {
        self.items.push(item);
        if increment_virtual_count {
            self.virtual_count += 1;
        }
    }

    pub fn delete_item(&mut self, pos: usize, decrement_virtual_count: bool) -> InternalItem {
        let removed = self.items.remove(pos);
        if decrement_virtual_count {
            self.virtual_count -= 1;
        }
        removed
    }

    /// Re-sorts the items by an ad hoc sort
    pub fn sort(&mut self, tag_sort: &TagSort) {
        let comparer = BaseComparer::from_tag_sort(tag_sort);
        self.items.sort_by(|a, b| comparer.compare_items(a, b));
    }

    // =========================================================================
    // Codec
    // =========================================================================

    /// Decodes a record as directed by `in_context`
    pub fn deserialize(record: &[u8], mut in_context: InDeserializationContext) -> Result<Self> {
        let mut reader = RecordReader::new(record);
        let version = reader.read_u8("version")?;
        if version == 0 || version > CURRENT_VERSION {
            return Err(Error::decode(format!(
                "unsupported index record version {}",
                version
            )));
        }

        let metadata = reader.read_short_prefixed("metadata")?;
        let metadata = (!metadata.is_empty()).then(|| metadata.to_vec());
        let virtual_count = if version >= 2 {
            Some(reader.read_i32("virtual count")?)
        } else {
            None
        };
        let total = reader.read_i32("item count")?;
        let total_count = usize::try_from(total)
            .map_err(|_| Error::decode(format!("negative item count {}", total)))?;
        let mut out_context = OutDeserializationContext {
            total_count,
            ..Default::default()
        };

        let mut items = Vec::new();
        if in_context.deserialize_header_only {
            out_context.unserialized = Some(reader.rest());
        } else {
            let mut caps = in_context.cap_condition.take();
            let result = scan_items(
                &mut reader,
                &in_context,
                caps.as_mut(),
                &mut items,
                &mut out_context,
            );
            in_context.cap_condition = caps;
            result?;
        }

        Ok(Self {
            metadata,
            items,
            virtual_count: virtual_count.unwrap_or(total),
            in_context,
            out_context,
        })
    }

    /// Encodes the index as a record
    pub fn serialize(&self) -> Result<Bytes> {
        let mut writer = RecordWriter::new();
        writer.write_u8(CURRENT_VERSION);
        writer.write_short_prefixed(self.metadata.as_deref().unwrap_or_default(), "metadata")?;
        writer.write_i32(self.virtual_count);

        let untouched = self
            .out_context
            .unserialized
            .as_ref()
            .filter(|rest| self.is_header_only() && !rest.is_empty());
        if let Some(rest) = untouched {
            writer.write_i32(count_i32(self.out_context.total_count)?);
            writer.write_bytes(rest);
            return Ok(writer.freeze());
        }

        writer.write_i32(count_i32(self.items.len())?);
        for item in &self.items {
            if item.item_id.is_empty() {
                return Err(Error::invalid_request(format!(
                    "Invalid ItemId - is null or length is zero for IndexId : {:?}",
                    self.in_context.index_id
                )));
            }
            writer.write_short_prefixed(&item.item_id, "item id")?;
            let tag_count = u8::try_from(item.tags.len()).map_err(|_| {
                Error::invalid_request(format!(
                    "item {:?} carries {} tags, at most 255 are supported",
                    item.item_id,
                    item.tags.len()
                ))
            })?;
            writer.write_u8(tag_count);
            for (hash, value) in &item.tags {
                writer.write_i32(*hash);
                if !value.is_empty() && self.in_context.is_string_hashed(*hash) {
                    let code = self
                        .in_context
                        .string_hashes
                        .add_string(self.in_context.type_id, value)?;
                    writer.write_short_prefixed(&code, "tag value")?;
                } else {
                    writer.write_short_prefixed(value, "tag value")?;
                }
            }
        }
        Ok(writer.freeze())
    }
}

fn count_i32(count: usize) -> Result<i32> {
    i32::try_from(count).map_err(|_| Error::Internal(format!("item count {} overflows", count)))
}

/// Decodes items until the admission bound is met or the record ends.
///
/// With an index condition, items before the enter condition first passes are
/// skipped and the scan stops at the first item failing the exit condition.
fn scan_items(
    reader: &mut RecordReader<'_>,
    ctx: &InDeserializationContext,
    mut caps: Option<&mut CapCondition>,
    items: &mut Vec<InternalItem>,
    out: &mut OutDeserializationContext,
) -> Result<()> {
    let total = out.total_count;
    let wanted = match ctx.max_items_per_index {
        0 => total,
        max => max.min(total),
    };

    let psi = &ctx.primary_sort_info;
    let (enter, exit): (Option<Condition>, Option<Condition>) = match &ctx.index_condition {
        Some(ic) => ic.create_conditions(
            &psi.field_name,
            psi.is_tag,
            &psi.sort_order_list.first().copied().unwrap_or_default(),
        ),
        None => (None, None),
    };
    let sort_key = TagKey::new(psi.field_name.as_str());
    let bounded = enter.is_some() || exit.is_some();
    let mut entered = false;

    let mut read = 0;
    while items.len() < wanted && read < total {
        read += 1;
        let item_id = reader.read_short_prefixed("item id")?;
        if item_id.is_empty() {
            return Err(Error::decode(format!(
                "Invalid ItemId - is null or length is zero for IndexId : {:?}",
                ctx.index_id
            )));
        }

        let pending_enter = enter.as_ref().filter(|_| !entered);
        if let Some(enter) = pending_enter.filter(|_| !psi.is_tag) {
            if !enter.process(Some(item_id)) {
                skip_item(reader)?;
                continue;
            }
            entered = true;
        }

        let item = decode_item(item_id, reader, ctx)?;
        if bounded {
            let sort_value = if psi.is_tag {
                item.tag_by_hash(sort_key.hash).ok_or_else(|| {
                    Error::decode(format!("PrimarySortTag Not found: {}", psi.field_name))
                })?
            } else {
                item.item_id.as_slice()
            };
            if let Some(enter) = enter.as_ref().filter(|_| !entered) {
                if !enter.process(Some(sort_value)) {
                    continue;
                }
                entered = true;
            }
            if let Some(exit) = &exit {
                if !exit.process(Some(sort_value)) {
                    break;
                }
            }
        }

        match admit(&item, caps.as_deref_mut(), ctx.filter.as_ref(), ctx.inclusive_filter) {
            Admission::Keep => items.push(item),
            Admission::Filtered if ctx.collect_filtered_items => out.filtered_items.push(item),
            Admission::Filtered | Admission::Drop => {}
        }
    }
    out.read_item_count = read;
    Ok(())
}

/// Applies the cap condition, then the filter that governs the item
fn admit(
    item: &InternalItem,
    caps: Option<&mut CapCondition>,
    filter: Option<&Filter>,
    inclusive: bool,
) -> Admission {
    let passes = |f: Option<&Filter>| f.map_or(true, |f| process_filter(item, f, inclusive));

    let caps = match caps.filter(|c| c.is_active()) {
        Some(caps) => caps,
        None => {
            return if passes(filter) {
                Admission::Keep
            } else {
                Admission::Filtered
            }
        }
    };

    let (slot, passed) = match caps.decide(item, filter) {
        (_, CapDecision::Uncapped) => (None, passes(filter)),
        (_, CapDecision::Exhausted) => return Admission::Drop,
        (slot, CapDecision::Capped(governing)) => (slot, passes(governing)),
    };
    if !passed {
        return Admission::Filtered;
    }
    if let Some(slot) = slot {
        caps.consume(slot);
    }
    Admission::Keep
}

fn decode_item(
    item_id: &[u8],
    reader: &mut RecordReader<'_>,
    ctx: &InDeserializationContext,
) -> Result<InternalItem> {
    let tag_count = reader.read_u8("tag count")?;
    let mut tags = Vec::with_capacity(tag_count as usize);
    for _ in 0..tag_count {
        let hash = reader.read_i32("tag hash")?;
        let raw = reader.read_short_prefixed("tag value")?;
        let value = if !raw.is_empty() && ctx.is_string_hashed(hash) {
            ctx.string_hashes.get_string_bytes(ctx.type_id, raw)?
        } else {
            raw.to_vec()
        };
        tags.push((hash, value));
    }
    Ok(InternalItem {
        item_id: item_id.to_vec(),
        tags,
    })
}

fn skip_item(reader: &mut RecordReader<'_>) -> Result<()> {
    let tag_count = reader.read_u8("tag count")?;
    for _ in 0..tag_count {
        reader.skip(4, "tag hash")?;
        let len = reader.read_u16("tag value length")? as usize;
        reader.skip(len, "tag value")?;
    }
    Ok(())
}
