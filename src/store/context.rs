//! Deserialization contexts
//!
//! An [`InDeserializationContext`] tells [`CacheIndexInternal::deserialize`]
//! how much of a record to materialize and which items to admit. The
//! [`OutDeserializationContext`] reports what the scan saw.
//!
//! [`CacheIndexInternal::deserialize`]: super::CacheIndexInternal::deserialize

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;

use super::InternalItem;
use crate::config::{Index, PrimarySortInfo};
use crate::context::StringHashCollection;
use crate::filter::{CapCondition, Filter, IndexCondition};
use crate::sort::TagKey;

/// Instructions for one fetch of an index
#[derive(Debug, Clone)]
pub struct InDeserializationContext {
    pub type_id: i16,
    pub index_id: Vec<u8>,
    pub index_name: String,
    /// Stop after admitting this many items, 0 for all
    pub max_items_per_index: usize,
    pub filter: Option<Filter>,
    /// `false` admits the items the filter rejects
    pub inclusive_filter: bool,
    pub index_condition: Option<IndexCondition>,
    /// Read metadata and counts only, keeping the item section opaque
    pub deserialize_header_only: bool,
    /// Keep the items the filter rejected
    pub collect_filtered_items: bool,
    pub primary_sort_info: PrimarySortInfo,
    pub local_identity_tags: Vec<TagKey>,
    pub string_hash_codes: HashSet<i32>,
    pub cap_condition: Option<CapCondition>,
    pub string_hashes: Arc<StringHashCollection>,
}

impl InDeserializationContext {
    /// Full, unfiltered fetch of `index`
    pub fn new(
        type_id: i16,
        index_id: &[u8],
        index: &Index,
        string_hashes: Arc<StringHashCollection>,
    ) -> Self {
        Self {
            type_id,
            index_id: index_id.to_vec(),
            index_name: index.index_name.clone(),
            max_items_per_index: 0,
            filter: None,
            inclusive_filter: true,
            index_condition: None,
            deserialize_header_only: false,
            collect_filtered_items: false,
            primary_sort_info: index.primary_sort_info.clone(),
            local_identity_tags: index.local_identity_tags().to_vec(),
            string_hash_codes: index.string_hash_codes().clone(),
            cap_condition: None,
            string_hashes,
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items_per_index = max_items;
        self
    }

    pub fn with_filter(mut self, filter: Option<Filter>, inclusive: bool) -> Self {
        self.filter = filter;
        self.inclusive_filter = inclusive;
        self
    }

    pub fn with_index_condition(mut self, index_condition: Option<IndexCondition>) -> Self {
        self.index_condition = index_condition;
        self
    }

    pub fn with_cap_condition(mut self, cap_condition: Option<CapCondition>) -> Self {
        self.cap_condition = cap_condition;
        self
    }

    pub fn header_only(mut self) -> Self {
        self.deserialize_header_only = true;
        self
    }

    pub fn collecting_filtered(mut self) -> Self {
        self.collect_filtered_items = true;
        self
    }

    /// True when `hash` names a tag stored string-hashed
    pub fn is_string_hashed(&self, hash: i32) -> bool {
        self.string_hash_codes.contains(&hash)
    }
}

/// What a deserialization produced besides the items
#[derive(Debug, Clone, Default)]
pub struct OutDeserializationContext {
    /// Item count recorded in the record
    pub total_count: usize,
    /// Items decoded or skipped before the scan stopped
    pub read_item_count: usize,
    /// Items rejected by the filter, when collected
    pub filtered_items: Vec<InternalItem>,
    /// Undecoded item section of a header-only fetch
    pub unserialized: Option<Bytes>,
}
