//! CacheIndex Integration Tests
//!
//! Drives the public `IndexStore` entry point against in-memory relay stores:
//! - saves and the single-index and multi-index queries
//! - in-place updates and deletes, and their data-tier side effects
//! - concurrent mutations of one index id
//! - remote clustered queries

use std::sync::Arc;

use cacheindex::codec::{generate_primary_id, DataType};
use cacheindex::filter::{Condition, Filter, Operation};
use cacheindex::query::{
    CacheIndexUpdate, Command, ContainsIndexQuery, FilteredIndexDeleteCommand, GetRangeQuery,
    IndexDataItem, IndexItem, IntersectionQuery, MultiIndexIdQuery, PagedIndexQuery, ResultItem,
    SpanQuery, TagMap,
};
use cacheindex::{
    CacheIndex, InMemoryRelayStore, IndexQuery, IndexStore, IndexStoreContext, MessageContext,
    QueryResponse, StorageConfig,
};

const MESSAGES: i16 = 20;
const MESSAGE_BODIES: i16 = 21;
const BY_TIME: &str = "byTime";
const BY_SENDER: &str = "bySender";

/// Inbox index: newest first by time, plus a sender index sorted by sender
/// then item id. Bodies are keyed by item id alone.
const CONFIG: &str = r#"
my_zone: 3
type_settings:
  - { type_id: 20, type_name: Inbox, related_index_type_id: 21 }
  - { type_id: 21, type_name: MessageBody, compress: true }
index_type_mappings:
  - type_id: 20
    mode: databound
    full_data_id_fields:
      - { part_name: ItemId }
    indexes:
      - index_name: byTime
        extended_id_suffix: 0
        metadata_present: true
        primary_sort_info:
          is_tag: true
          field_name: time
          sort_order_list:
            - { data_type: Int64, sort_by: DESC }
        tags:
          - { name: time, data_type: Int64 }
          - { name: sender, data_type: Int32 }
          - { name: unread, data_type: Byte }
          - { name: subject, data_type: String, string_hash: true }
      - index_name: bySender
        extended_id_suffix: 1
        primary_sort_info:
          is_tag: true
          field_name: sender
          sort_order_list:
            - { data_type: Int32, sort_by: ASC }
        tags:
          - { name: sender, data_type: Int32, local_identity: true }
"#;

struct Harness {
    store: Arc<IndexStore>,
    storage: Arc<InMemoryRelayStore>,
    bodies: Arc<InMemoryRelayStore>,
}

fn harness() -> Harness {
    let config = StorageConfig::from_yaml_str(CONFIG).unwrap();
    let storage = Arc::new(InMemoryRelayStore::new("index"));
    let bodies = Arc::new(InMemoryRelayStore::new("bodies"));
    let ctx = IndexStoreContext::new(config, storage.clone(), bodies.clone());
    Harness {
        store: Arc::new(IndexStore::new(Arc::new(ctx))),
        storage,
        bodies,
    }
}

fn msg(inbox: &[u8]) -> MessageContext {
    MessageContext::new(MESSAGES, inbox).with_zone(3)
}

fn message(id: u16, time: i64, sender: i32, unread: bool) -> IndexDataItem {
    IndexDataItem::new(id.to_le_bytes().to_vec(), TagMap::new())
        .with_tag("time", time.to_le_bytes())
        .with_tag("sender", sender.to_le_bytes())
        .with_tag("unread", vec![u8::from(unread)])
        .with_data(format!("body {}", id).into_bytes())
}

fn save_inbox(h: &Harness, inbox: &[u8], messages: Vec<IndexDataItem>) {
    let mut cache_index = CacheIndex {
        index_id: inbox.to_vec(),
        add_list: messages,
        ..Default::default()
    };
    cache_index
        .index_tag_mapping
        .insert(BY_TIME.into(), vec!["time".into(), "sender".into(), "unread".into()]);
    cache_index
        .index_tag_mapping
        .insert(BY_SENDER.into(), vec!["sender".into()]);
    h.store.handle_save(&msg(inbox), &cache_index).unwrap();
}

fn ids(items: &[ResultItem]) -> Vec<u16> {
    items
        .iter()
        .map(|i| u16::from_le_bytes([i.item_id[0], i.item_id[1]]))
        .collect()
}

fn has_body(h: &Harness, id: u16) -> bool {
    let key = id.to_le_bytes();
    h.bodies.contains(MESSAGE_BODIES, generate_primary_id(&key), &key)
}

fn get_range(h: &Harness, inbox: &[u8], item_num: usize) -> cacheindex::query::GetRangeQueryResult {
    let query = IndexQuery::GetRange(GetRangeQuery {
        index_id: inbox.to_vec(),
        target_index_name: BY_TIME.into(),
        offset: 1,
        item_num,
        ..Default::default()
    });
    match h.store.handle_query(&msg(inbox), &query).unwrap() {
        QueryResponse::GetRange(result) => result,
        other => panic!("unexpected response {:?}", other),
    }
}

// =============================================================================
// Save And Query
// =============================================================================

mod save_query_tests {
    use super::*;

    #[test]
    fn test_save_then_get_range_newest_first() {
        let h = harness();
        save_inbox(
            &h,
            b"alice",
            vec![message(1, 100, 7, true), message(2, 300, 8, false), message(3, 200, 7, true)],
        );

        let result = get_range(&h, b"alice", 2);
        assert!(result.index_exists);
        assert_eq!(result.index_size, 3);
        assert_eq!(result.virtual_count, 3);
        assert_eq!(ids(&result.result_items), vec![2, 3]);
        assert_eq!(result.result_items[0].data.as_deref(), Some(&b"body 2"[..]));
        assert!(has_body(&h, 1));
    }

    fn save_subjects(h: &Harness, subjects: &[(u16, &[u8])]) -> cacheindex::Result<()> {
        let mut cache_index = CacheIndex::new(b"carol".to_vec(), BY_TIME);
        cache_index.add_list = subjects
            .iter()
            .map(|(id, subject)| message(*id, i64::from(*id), 7, true).with_tag("subject", subject.to_vec()))
            .collect();
        h.store.handle_save(&msg(b"carol"), &cache_index)
    }

    #[test]
    fn test_string_hashed_tag_round_trips() {
        let h = harness();
        save_subjects(&h, &[(1, "Grüße".as_bytes()), (2, b"lunch?")]).unwrap();

        let result = get_range(&h, b"carol", 10);
        assert_eq!(ids(&result.result_items), vec![2, 1]);
        assert_eq!(result.result_items[0].tags.get("subject"), Some(&b"lunch?".to_vec()));
        assert_eq!(
            result.result_items[1].tags.get("subject"),
            Some(&"Grüße".as_bytes().to_vec())
        );
    }

    #[test]
    fn test_non_utf8_string_hashed_tag_rejects_save() {
        let h = harness();
        let err = save_subjects(&h, &[(1, &[255, 1]), (2, &[254, 1])]).unwrap_err();
        assert!(matches!(err, cacheindex::Error::InvalidRequest(_)), "{}", err);

        let result = get_range(&h, b"carol", 10);
        assert!(!result.index_exists);
        assert!(!has_body(&h, 1) && !has_body(&h, 2));
    }

    #[test]
    fn test_get_range_of_unknown_inbox() {
        let h = harness();
        let result = get_range(&h, b"nobody", 5);
        assert!(!result.index_exists);
        assert!(result.result_items.is_empty());
        assert!(result.exception_info.is_none());
    }

    #[test]
    fn test_paged_and_span_across_inboxes() {
        let h = harness();
        save_inbox(&h, b"alice", vec![message(1, 100, 7, true), message(2, 400, 8, false)]);
        save_inbox(&h, b"bob", vec![message(3, 300, 7, true), message(4, 200, 9, true)]);
        let base = MultiIndexIdQuery::new(BY_TIME, vec![b"alice".to_vec(), b"bob".to_vec()]);

        let paged = IndexQuery::Paged(PagedIndexQuery {
            page_size: 3,
            page_num: 1,
            base: base.clone(),
        });
        let QueryResponse::Paged(result) = h.store.handle_query(&msg(b"alice"), &paged).unwrap() else {
            panic!("expected a paged result");
        };
        assert_eq!(ids(&result.result_items), vec![2, 3, 4]);
        assert_eq!(result.total_count, 4);
        assert!(result.result_items.iter().all(|i| i.data.is_some()));

        let span = IndexQuery::Span(SpanQuery {
            offset: 2,
            span: 2,
            base,
        });
        let QueryResponse::Span(result) = h.store.handle_query(&msg(b"alice"), &span).unwrap() else {
            panic!("expected a span result");
        };
        assert_eq!(ids(&result.result_items), vec![3, 4]);
    }

    #[test]
    fn test_contains_with_sender_index() {
        let h = harness();
        save_inbox(&h, b"alice", vec![message(1, 100, 7, true), message(2, 300, 8, false)]);

        let query = IndexQuery::Contains(ContainsIndexQuery {
            index_id: b"alice".to_vec(),
            target_index_name: BY_SENDER.into(),
            index_items: vec![
                IndexItem::new(2u16.to_le_bytes().to_vec()).with_tag("sender", 8i32.to_le_bytes()),
                IndexItem::new(9u16.to_le_bytes().to_vec()).with_tag("sender", 8i32.to_le_bytes()),
            ],
            exclude_data: true,
            ..Default::default()
        });
        let QueryResponse::Contains(result) = h.store.handle_query(&msg(b"alice"), &query).unwrap() else {
            panic!("expected a contains result");
        };
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].item_id, 2u16.to_le_bytes().to_vec());
    }

    #[test]
    fn test_intersection_of_sender_indexes() {
        let h = harness();
        save_inbox(&h, b"alice", vec![message(1, 100, 7, true), message(2, 300, 8, false)]);
        save_inbox(&h, b"bob", vec![message(2, 300, 8, false), message(3, 50, 9, true)]);

        let query = IndexQuery::Intersection(IntersectionQuery::new(
            BY_SENDER,
            vec![b"alice".to_vec(), b"bob".to_vec()],
        ));
        let QueryResponse::Intersection(result) = h.store.handle_query(&msg(b"alice"), &query).unwrap() else {
            panic!("expected an intersection result");
        };
        assert_eq!(result.result_items.len(), 1);
        assert_eq!(result.result_items[0].data.as_deref(), Some(&b"body 2"[..]));
    }
}

// =============================================================================
// Updates And Deletes
// =============================================================================

mod mutation_tests {
    use super::*;

    #[test]
    fn test_filtered_index_delete_prunes_read_messages() {
        let h = harness();
        save_inbox(
            &h,
            b"alice",
            vec![message(1, 100, 7, false), message(2, 200, 8, true), message(3, 300, 9, false)],
        );

        let update = CacheIndexUpdate::new(Command::FilteredIndexDelete(FilteredIndexDeleteCommand {
            index_id: b"alice".to_vec(),
            target_index_name: BY_TIME.into(),
            delete_filter: Filter::Condition(Condition::tag("unread", Operation::Equals, vec![0], DataType::Byte)),
        }));
        h.store.handle_update(&msg(b"alice"), &update).unwrap();

        let result = get_range(&h, b"alice", 10);
        assert_eq!(ids(&result.result_items), vec![2]);
        assert_eq!(result.virtual_count, 1);
        assert!(!has_body(&h, 1));
        assert!(!has_body(&h, 3));
        assert!(has_body(&h, 2));
    }

    #[test]
    fn test_delete_list_and_delete_message() {
        let h = harness();
        save_inbox(&h, b"alice", vec![message(1, 100, 7, true), message(2, 200, 8, true)]);

        let mut cache_index = CacheIndex::new(b"alice".to_vec(), BY_TIME);
        cache_index.delete_list = vec![IndexItem::new(1u16.to_le_bytes().to_vec())
            .with_tag("time", 100i64.to_le_bytes())];
        h.store.handle_save(&msg(b"alice"), &cache_index).unwrap();
        assert_eq!(ids(&get_range(&h, b"alice", 10).result_items), vec![2]);
        assert!(!has_body(&h, 1));

        h.store.handle_delete(&msg(b"alice")).unwrap();
        assert!(!get_range(&h, b"alice", 10).index_exists);
        assert!(!has_body(&h, 2));
    }

    #[test]
    fn test_delete_all_in_type() {
        let h = harness();
        save_inbox(&h, b"alice", vec![message(1, 100, 7, true)]);
        save_inbox(&h, b"bob", vec![message(2, 200, 8, true)]);

        h.store.handle_delete_all_in_type(&msg(b"alice")).unwrap();
        assert_eq!(h.storage.type_len(MESSAGES), 0);
        assert_eq!(h.bodies.type_len(MESSAGE_BODIES), 0);
        for inbox in [&b"alice"[..], b"bob"] {
            let result = get_range(&h, inbox, 10);
            assert!(!result.index_exists);
            assert!(result.result_items.is_empty());
        }
    }

    #[test]
    fn test_other_zone_leaves_bodies_alone() {
        let h = harness();
        let cache_index = CacheIndex {
            add_list: vec![message(1, 100, 7, true)],
            ..CacheIndex::new(b"alice".to_vec(), BY_TIME)
        };
        let foreign = MessageContext::new(MESSAGES, b"alice").with_zone(4);
        h.store.handle_save(&foreign, &cache_index).unwrap();
        assert_eq!(get_range(&h, b"alice", 10).index_size, 1);
        assert!(!has_body(&h, 1));
    }
}

// =============================================================================
// Concurrency
// =============================================================================

mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_saves_to_one_inbox() {
        let h = harness();
        let mut handles = Vec::new();
        for writer in 0u16..8 {
            let store = h.store.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                for i in 0u16..10 {
                    let id = writer * 100 + i;
                    let cache_index = CacheIndex {
                        add_list: vec![message(id, i64::from(id), 7, true)],
                        ..CacheIndex::new(b"shared".to_vec(), BY_TIME)
                    };
                    store.handle_save(&msg(b"shared"), &cache_index).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let result = get_range(&h, b"shared", 100);
        assert_eq!(result.index_size, 80);
        let times = ids(&result.result_items);
        assert!(times.windows(2).all(|w| w[0] > w[1]));
    }
}

// =============================================================================
// Remote Clustered Queries
// =============================================================================

mod remote_tests {
    use super::*;
    use cacheindex::error::Result;
    use cacheindex::query::{
        IntersectionQueryResult, PagedIndexQueryResult, RemoteRelayClient, SpanQueryResult,
    };

    /// Remote cluster that knows one message of bob's
    struct BobsCluster;

    impl RemoteRelayClient for BobsCluster {
        fn submit_paged(&self, _type_id: i16, query: &PagedIndexQuery) -> Result<PagedIndexQueryResult> {
            assert!(query.base.exclude_data);
            Ok(PagedIndexQueryResult {
                result_items: vec![ResultItem::new(
                    b"bob".to_vec(),
                    5u16.to_le_bytes().to_vec(),
                    TagMap::new(),
                )],
                total_count: 1,
                ..Default::default()
            })
        }

        fn submit_span(&self, _type_id: i16, _query: &SpanQuery) -> Result<SpanQueryResult> {
            Ok(SpanQueryResult::default())
        }

        fn submit_intersection(&self, _type_id: i16, _query: &IntersectionQuery) -> Result<IntersectionQueryResult> {
            Ok(IntersectionQueryResult::default())
        }
    }

    #[test]
    fn test_remote_paged_hydrates_from_local_tier() {
        let h = harness();
        save_inbox(&h, b"bob", vec![message(5, 100, 7, true)]);
        let ctx = h.store.context().clone();
        let store = IndexStore::new(ctx).with_remote_client(Arc::new(BobsCluster));

        let query = IndexQuery::RemoteClusteredPaged(PagedIndexQuery {
            page_size: 10,
            page_num: 1,
            base: MultiIndexIdQuery::new(BY_TIME, vec![b"bob".to_vec()]),
        });
        let QueryResponse::Paged(result) = store.handle_query(&msg(b"bob"), &query).unwrap() else {
            panic!("expected a paged result");
        };
        assert_eq!(ids(&result.result_items), vec![5]);
        assert_eq!(result.result_items[0].data.as_deref(), Some(&b"body 5"[..]));
    }
}
