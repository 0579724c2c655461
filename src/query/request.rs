//! Query and command objects

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::item::{FullDataIdInfo, IndexDataItem, IndexItem};
use crate::codec::generate_primary_id;
use crate::filter::{CapCondition, Filter, IndexCondition};
use crate::sort::TagSort;

/// Which per-index headers a multi-index query returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GetIndexHeaderType {
    #[default]
    None,
    /// One header per index id that contributed a result item
    ResultItemsIndexIds,
    /// One header per requested index id that exists
    AllIndexIds,
}

/// Per-index-id override of a multi-index query's bound and filter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexIdParams {
    /// 0 falls back to the query's bound
    #[serde(default)]
    pub max_items: usize,
    #[serde(default)]
    pub filter: Option<Filter>,
}

/// Per-index-id filter of an intersection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntersectionQueryParams {
    #[serde(default)]
    pub filter: Option<Filter>,
}

// =============================================================================
// Single Index Queries
// =============================================================================

/// Slice `[offset, offset + item_num)` of one index, 1-based
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GetRangeQuery {
    pub index_id: Vec<u8>,
    pub target_index_name: String,
    pub offset: usize,
    pub item_num: usize,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub exclude_data: bool,
    #[serde(default)]
    pub get_metadata: bool,
    #[serde(default)]
    pub full_data_id_info: Option<FullDataIdInfo>,
}

/// Head and tail windows of one index
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FirstLastQuery {
    pub index_id: Vec<u8>,
    pub target_index_name: String,
    pub first_page_size: usize,
    pub last_page_size: usize,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub exclude_data: bool,
    #[serde(default)]
    pub get_metadata: bool,
    #[serde(default)]
    pub full_data_id_info: Option<FullDataIdInfo>,
}

/// Uniform sample of one index
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RandomQuery {
    pub index_id: Vec<u8>,
    pub target_index_name: String,
    pub count: usize,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub exclude_data: bool,
    #[serde(default)]
    pub get_metadata: bool,
    #[serde(default)]
    pub full_data_id_info: Option<FullDataIdInfo>,
}

/// Presence check of caller-supplied items in one index
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainsIndexQuery {
    pub index_id: Vec<u8>,
    pub target_index_name: String,
    pub index_items: Vec<IndexItem>,
    /// Indexes whose tags are merged into the found items
    #[serde(default)]
    pub tags_from_indexes: Vec<String>,
    #[serde(default)]
    pub exclude_data: bool,
    #[serde(default)]
    pub get_metadata: bool,
    #[serde(default)]
    pub full_data_id_info: Option<FullDataIdInfo>,
}

// =============================================================================
// Multi Index Queries
// =============================================================================

/// Parameters shared by paged and span queries
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiIndexIdQuery {
    pub index_id_list: Vec<Vec<u8>>,
    /// Empty, or one primary id per index id
    #[serde(default)]
    pub primary_id_list: Vec<i32>,
    #[serde(default, with = "super::byte_keyed")]
    pub index_id_params_mapping: BTreeMap<Vec<u8>, IndexIdParams>,
    pub target_index_name: String,
    #[serde(default)]
    pub tags_from_indexes: Vec<String>,
    #[serde(default)]
    pub tag_sort: Option<TagSort>,
    /// Per-index item bound, 0 for none
    #[serde(default)]
    pub max_items: usize,
    #[serde(default)]
    pub exclude_data: bool,
    #[serde(default)]
    pub get_index_header_type: GetIndexHeaderType,
    /// Report how many items matched beyond the returned ones
    #[serde(default)]
    pub get_additional_available_item_count: bool,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub index_condition: Option<IndexCondition>,
    #[serde(default)]
    pub full_data_id_info: Option<FullDataIdInfo>,
    #[serde(default)]
    pub cap_condition: Option<CapCondition>,
    /// Return the whole merged list; the caller slices it
    #[serde(default)]
    pub client_side_subset_processing_required: bool,
}

impl MultiIndexIdQuery {
    pub fn new(target_index_name: impl Into<String>, index_id_list: Vec<Vec<u8>>) -> Self {
        Self {
            target_index_name: target_index_name.into(),
            index_id_list,
            ..Default::default()
        }
    }

    /// Primary id of the index id at `at`
    pub fn primary_id(&self, at: usize) -> i32 {
        self.primary_id_list
            .get(at)
            .copied()
            .unwrap_or_else(|| generate_primary_id(&self.index_id_list[at]))
    }
}

/// Page `page_num` of the merged result, `page_num` 0 for everything
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PagedIndexQuery {
    pub page_size: usize,
    pub page_num: usize,
    /// `base.max_items` bounds every index
    pub base: MultiIndexIdQuery,
}

impl PagedIndexQuery {
    /// Upper bound of the merged list
    pub fn max_merge_count(&self) -> usize {
        if self.page_num == 0 {
            usize::MAX
        } else {
            self.page_num.saturating_mul(self.page_size)
        }
    }
}

/// `span` items of the merged result starting at the 1-based `offset`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpanQuery {
    pub offset: usize,
    /// 0 for everything
    pub span: usize,
    pub base: MultiIndexIdQuery,
}

impl SpanQuery {
    /// Upper bound of the merged list
    pub fn max_merge_count(&self) -> usize {
        if self.span == 0 {
            usize::MAX
        } else {
            self.offset.saturating_sub(1).saturating_add(self.span)
        }
    }
}

/// Items present in every listed index
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntersectionQuery {
    pub index_id_list: Vec<Vec<u8>>,
    #[serde(default)]
    pub primary_id_list: Vec<i32>,
    #[serde(default, with = "super::byte_keyed")]
    pub intersection_query_params_mapping: BTreeMap<Vec<u8>, IntersectionQueryParams>,
    pub target_index_name: String,
    #[serde(default)]
    pub exclude_data: bool,
    #[serde(default)]
    pub get_index_header: bool,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub full_data_id_info: Option<FullDataIdInfo>,
}

impl IntersectionQuery {
    pub fn new(target_index_name: impl Into<String>, index_id_list: Vec<Vec<u8>>) -> Self {
        Self {
            target_index_name: target_index_name.into(),
            index_id_list,
            ..Default::default()
        }
    }

    pub fn primary_id(&self, at: usize) -> i32 {
        self.primary_id_list
            .get(at)
            .copied()
            .unwrap_or_else(|| generate_primary_id(&self.index_id_list[at]))
    }
}

// =============================================================================
// Mutations
// =============================================================================

/// Changes to the indexes of one index id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CacheIndex {
    pub index_id: Vec<u8>,
    /// Derived from the index id when absent
    #[serde(default)]
    pub primary_id: Option<i32>,
    /// Single target index. When absent, `index_tag_mapping` names the
    /// indexes and the tags each of them keeps.
    #[serde(default)]
    pub target_index_name: Option<String>,
    #[serde(default)]
    pub index_tag_mapping: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub add_list: Vec<IndexDataItem>,
    #[serde(default)]
    pub delete_list: Vec<IndexItem>,
    #[serde(default)]
    pub metadata: Option<Vec<u8>>,
    #[serde(default)]
    pub update_metadata: bool,
    /// Discard the stored items before applying the add list
    #[serde(default)]
    pub replace_full_index: bool,
    /// Leave the data tier untouched
    #[serde(default)]
    pub preserve_data: bool,
    /// Virtual count updates per index name. Exclusive with add and delete lists.
    #[serde(default)]
    pub index_virtual_count_mapping: Option<BTreeMap<String, i32>>,
}

impl CacheIndex {
    /// Save into one named index
    pub fn new(index_id: impl Into<Vec<u8>>, target_index_name: impl Into<String>) -> Self {
        Self {
            index_id: index_id.into(),
            target_index_name: Some(target_index_name.into()),
            ..Default::default()
        }
    }

    pub fn primary_id(&self) -> i32 {
        self.primary_id
            .unwrap_or_else(|| generate_primary_id(&self.index_id))
    }
}

/// Removes the items of one index that match `delete_filter`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredIndexDeleteCommand {
    pub index_id: Vec<u8>,
    pub target_index_name: String,
    pub delete_filter: Filter,
}

/// Command carried by a [`CacheIndexUpdate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    FilteredIndexDelete(FilteredIndexDeleteCommand),
}

/// In-place update of stored indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheIndexUpdate {
    pub command: Command,
}

impl CacheIndexUpdate {
    pub fn new(command: Command) -> Self {
        Self { command }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_merge_counts() {
        let mut paged = PagedIndexQuery {
            page_size: 10,
            page_num: 3,
            ..Default::default()
        };
        assert_eq!(paged.max_merge_count(), 30);
        paged.page_num = 0;
        assert_eq!(paged.max_merge_count(), usize::MAX);

        let mut span = SpanQuery {
            offset: 5,
            span: 4,
            ..Default::default()
        };
        assert_eq!(span.max_merge_count(), 8);
        span.span = 0;
        assert_eq!(span.max_merge_count(), usize::MAX);
    }

    #[test]
    fn test_primary_ids_fall_back_to_derivation() {
        let mut query = MultiIndexIdQuery::new("byDate", vec![vec![7], vec![9]]);
        assert_eq!(query.primary_id(1), 9);
        query.primary_id_list = vec![70, 90];
        assert_eq!(query.primary_id(1), 90);
        assert_eq!(CacheIndex::new(vec![3], "byDate").primary_id(), 3);
    }

    #[test]
    fn test_byte_keyed_maps_survive_json() {
        let mut query = MultiIndexIdQuery::new("byDate", vec![vec![1, 2]]);
        query.index_id_params_mapping.insert(
            vec![1, 2],
            IndexIdParams {
                max_items: 4,
                filter: None,
            },
        );
        let json = serde_json::to_string(&query).unwrap();
        let back: MultiIndexIdQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(back, query);
    }
}
