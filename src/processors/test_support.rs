//! Fixture shared by the processor tests

use std::sync::Arc;

use crate::codec::{form_extended_id, generate_primary_id};
use crate::config::StorageConfig;
use crate::context::{IndexStoreContext, MessageContext};
use crate::query::{CacheIndex, IndexDataItem, ResultItem, TagMap};
use crate::store::InMemoryRelayStore;

pub(crate) const INDEX_TYPE: i16 = 10;
pub(crate) const DATA_TYPE: i16 = 11;
pub(crate) const BY_DATE: &str = "byDate";
pub(crate) const BY_ID: &str = "byId";

/// Posts indexed by date (tag sorted, with metadata) and by id.
/// Payloads live under `index id ++ item id` in type 11.
const CONFIG: &str = r#"
type_settings:
  - { type_id: 10, type_name: PostIndex, related_index_type_id: 11 }
  - { type_id: 11, type_name: Post }
index_type_mappings:
  - type_id: 10
    mode: databound
    query_override_settings:
      max_result_items_threshold_log: 100
    full_data_id_fields:
      - { part_name: IndexId }
      - { part_name: ItemId }
    indexes:
      - index_name: byDate
        extended_id_suffix: 0
        metadata_present: true
        primary_sort_info:
          is_tag: true
          field_name: date
          sort_order_list:
            - { data_type: Int64, sort_by: ASC }
        tags:
          - { name: date, data_type: Int64 }
          - { name: kind, data_type: Byte }
      - index_name: byId
        extended_id_suffix: 1
        primary_sort_info:
          is_tag: false
          sort_order_list:
            - { data_type: Byte, sort_by: ASC }
        tags:
          - { name: kind, data_type: Byte }
"#;

pub(crate) struct Fixture {
    pub ctx: IndexStoreContext,
    pub storage: Arc<InMemoryRelayStore>,
    pub data: Arc<InMemoryRelayStore>,
}

pub(crate) fn fixture() -> Fixture {
    fixture_with(CONFIG)
}

pub(crate) fn fixture_with(yaml: &str) -> Fixture {
    let config = StorageConfig::from_yaml_str(yaml).unwrap();
    let storage = Arc::new(InMemoryRelayStore::new("index"));
    let data = Arc::new(InMemoryRelayStore::new("data"));
    let ctx = IndexStoreContext::new(config, storage.clone(), data.clone());
    Fixture { ctx, storage, data }
}

/// Configuration text, for tests that tweak it
pub(crate) fn config_yaml() -> &'static str {
    CONFIG
}

/// A post with a date tag and a parity `kind` tag
pub(crate) fn post(id: u8, date: i64) -> IndexDataItem {
    IndexDataItem::new(vec![id], TagMap::new())
        .with_tag("date", date.to_le_bytes().to_vec())
        .with_tag("kind", vec![id % 2])
        .with_data(format!("data-{}", id).into_bytes())
}

pub(crate) fn item_ids(items: &[ResultItem]) -> Vec<u8> {
    items.iter().map(|i| i.item_id[0]).collect()
}

impl Fixture {
    pub fn msg(&self, index_id: &[u8]) -> MessageContext {
        MessageContext::new(INDEX_TYPE, index_id)
    }

    /// Saves `(item id, date)` posts into both indexes
    pub fn save(&self, index_id: &[u8], posts: &[(u8, i64)]) {
        let mut cache_index = CacheIndex {
            index_id: index_id.to_vec(),
            ..Default::default()
        };
        cache_index
            .index_tag_mapping
            .insert(BY_DATE.into(), vec!["date".into(), "kind".into()]);
        cache_index
            .index_tag_mapping
            .insert(BY_ID.into(), vec!["kind".into()]);
        cache_index.add_list = posts.iter().map(|(id, date)| post(*id, *date)).collect();
        super::save::process(&cache_index, &self.msg(index_id), &self.ctx).unwrap();
    }

    /// True when the data tier holds the payload of `item_id`
    pub fn has_data(&self, index_id: &[u8], item_id: u8) -> bool {
        let key = [index_id, &[item_id]].concat();
        self.data.contains(DATA_TYPE, generate_primary_id(&key), &key)
    }

    /// True when the record of index `suffix` exists
    pub fn has_index(&self, index_id: &[u8], suffix: i16) -> bool {
        self.storage.contains(
            INDEX_TYPE,
            generate_primary_id(index_id),
            &form_extended_id(index_id, suffix),
        )
    }
}
