//! Items exchanged with callers

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::FullDataIdField;
use crate::sort::{Item, TagKey};

/// Tag values keyed by tag name
pub type TagMap = BTreeMap<String, Vec<u8>>;

fn lookup<'a>(tags: &'a TagMap, key: &TagKey) -> Option<&'a [u8]> {
    tags.get(&key.name).map(Vec::as_slice)
}

/// An index entry as supplied by or returned to a caller
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexItem {
    pub item_id: Vec<u8>,
    #[serde(default)]
    pub tags: TagMap,
}

impl IndexItem {
    pub fn new(item_id: impl Into<Vec<u8>>) -> Self {
        Self {
            item_id: item_id.into(),
            tags: TagMap::new(),
        }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }
}

impl Item for IndexItem {
    fn item_id(&self) -> &[u8] {
        &self.item_id
    }

    fn tag_value(&self, key: &TagKey) -> Option<&[u8]> {
        lookup(&self.tags, key)
    }
}

/// Index entry with its data-tier payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexDataItem {
    pub item_id: Vec<u8>,
    #[serde(default)]
    pub tags: TagMap,
    #[serde(default)]
    pub data: Option<Vec<u8>>,
}

impl IndexDataItem {
    pub fn new(item_id: impl Into<Vec<u8>>, tags: TagMap) -> Self {
        Self {
            item_id: item_id.into(),
            tags,
            data: None,
        }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// The entry without its payload
    pub fn to_index_item(&self) -> IndexItem {
        IndexItem {
            item_id: self.item_id.clone(),
            tags: self.tags.clone(),
        }
    }
}

impl Item for IndexDataItem {
    fn item_id(&self) -> &[u8] {
        &self.item_id
    }

    fn tag_value(&self, key: &TagKey) -> Option<&[u8]> {
        lookup(&self.tags, key)
    }
}

/// Entry of a multi-index result, tagged with the index it came from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultItem {
    pub index_id: Vec<u8>,
    pub item_id: Vec<u8>,
    #[serde(default)]
    pub data: Option<Vec<u8>>,
    #[serde(default)]
    pub tags: TagMap,
}

impl ResultItem {
    pub fn new(index_id: impl Into<Vec<u8>>, item_id: impl Into<Vec<u8>>, tags: TagMap) -> Self {
        Self {
            index_id: index_id.into(),
            item_id: item_id.into(),
            data: None,
            tags,
        }
    }
}

impl Item for ResultItem {
    fn item_id(&self) -> &[u8] {
        &self.item_id
    }

    fn tag_value(&self, key: &TagKey) -> Option<&[u8]> {
        lookup(&self.tags, key)
    }
}

/// Metadata and virtual count of one index
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexHeader {
    #[serde(default)]
    pub metadata: Option<Vec<u8>>,
    pub virtual_count: i32,
}

/// Per-query override of where payloads live and how their keys are built
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FullDataIdInfo {
    /// Data-tier type name; the configured related type when absent
    #[serde(default)]
    pub related_type_name: Option<String>,
    /// Key layout; the type's configured layout when empty
    #[serde(default)]
    pub full_data_id_fields: Vec<FullDataIdField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_expose_tags_by_name() {
        let item = IndexDataItem::new(vec![1], TagMap::new())
            .with_tag("date", vec![5])
            .with_data(b"payload".to_vec());
        assert_eq!(item.tag_value(&TagKey::new("date")), Some(&[5u8][..]));
        assert_eq!(item.tag_value(&TagKey::new("other")), None);
        assert_eq!(item.to_index_item(), IndexItem::new(vec![1]).with_tag("date", vec![5]));
    }
}
