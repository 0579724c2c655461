//! Query results
//!
//! Every result is structurally complete. A failed query carries its error
//! text in `exception_info`; a missing index reports `index_exists == false`
//! with sizes of -1.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::item::{IndexDataItem, IndexHeader, ResultItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRangeQueryResult {
    pub index_exists: bool,
    pub index_size: i32,
    pub metadata: Option<Vec<u8>>,
    pub result_items: Vec<ResultItem>,
    pub virtual_count: i32,
    pub exception_info: Option<String>,
}

impl Default for GetRangeQueryResult {
    fn default() -> Self {
        Self {
            index_exists: false,
            index_size: -1,
            metadata: None,
            result_items: Vec::new(),
            virtual_count: -1,
            exception_info: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstLastQueryResult {
    pub index_exists: bool,
    pub index_size: i32,
    pub metadata: Option<Vec<u8>>,
    pub first_page_items: Vec<ResultItem>,
    pub last_page_items: Vec<ResultItem>,
    pub virtual_count: i32,
    pub exception_info: Option<String>,
}

impl Default for FirstLastQueryResult {
    fn default() -> Self {
        Self {
            index_exists: false,
            index_size: -1,
            metadata: None,
            first_page_items: Vec::new(),
            last_page_items: Vec::new(),
            virtual_count: -1,
            exception_info: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomQueryResult {
    pub index_exists: bool,
    pub index_size: i32,
    pub metadata: Option<Vec<u8>>,
    pub result_items: Vec<ResultItem>,
    pub virtual_count: i32,
    pub exception_info: Option<String>,
}

impl Default for RandomQueryResult {
    fn default() -> Self {
        Self {
            index_exists: false,
            index_size: -1,
            metadata: None,
            result_items: Vec::new(),
            virtual_count: -1,
            exception_info: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainsIndexQueryResult {
    pub index_exists: bool,
    pub index_size: i32,
    pub metadata: Option<Vec<u8>>,
    /// Queried items found in the index, with their stored tags
    pub items: Vec<IndexDataItem>,
    pub virtual_count: i32,
    pub exception_info: Option<String>,
}

impl Default for ContainsIndexQueryResult {
    fn default() -> Self {
        Self {
            index_exists: false,
            index_size: -1,
            metadata: None,
            items: Vec::new(),
            virtual_count: -1,
            exception_info: None,
        }
    }
}

/// Result of a paged or span query
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MultiIndexIdQueryResult {
    pub result_items: Vec<ResultItem>,
    #[serde(default, with = "super::byte_keyed")]
    pub index_id_index_header_mapping: BTreeMap<Vec<u8>, IndexHeader>,
    /// Items stored across the fetched indexes
    pub total_count: i32,
    /// Items admitted across the fetched indexes
    pub additional_available_item_count: i32,
    pub exception_info: Option<String>,
}

pub type PagedIndexQueryResult = MultiIndexIdQueryResult;
pub type SpanQueryResult = MultiIndexIdQueryResult;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntersectionQueryResult {
    pub result_items: Vec<IndexDataItem>,
    #[serde(default, with = "super::byte_keyed")]
    pub index_id_index_header_mapping: BTreeMap<Vec<u8>, IndexHeader>,
    pub exception_info: Option<String>,
}

/// Appends an error to an exception info string, `" | "` separated
pub(crate) fn append_exception(info: &mut Option<String>, message: &str) {
    let text = info.get_or_insert_with(String::new);
    text.push_str(" | ");
    text.push_str(message);
}
