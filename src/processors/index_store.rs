//! Entry point routing requests to their processors

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use super::{
    contains, delete, delete_all_in_type, first_last, get, get_range, intersection, paged, random, remote,
    save, span, update,
};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::{CacheIndex, CacheIndexUpdate, IndexQuery, QueryResponse, RemoteRelayClient};
use crate::store::{MessageType, Payload, RelayComponent, RelayMessage};

/// Secondary-index engine over a relay store.
///
/// Every handler is synchronous and may be called from many threads at once;
/// mutations serialize per primary id through the context's lock pool.
pub struct IndexStore {
    ctx: Arc<IndexStoreContext>,
    remote: Option<Arc<dyn RemoteRelayClient>>,
}

impl IndexStore {
    pub fn new(ctx: Arc<IndexStoreContext>) -> Self {
        info!(
            types = ctx.config().index_type_mappings.len(),
            locks = ctx.locking().pool_size(),
            "Initializing CacheIndex storage"
        );
        Self { ctx, remote: None }
    }

    /// Enables the remote clustered query variants
    pub fn with_remote_client(mut self, remote: Arc<dyn RemoteRelayClient>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn context(&self) -> &Arc<IndexStoreContext> {
        &self.ctx
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Answers a query. Request and data errors come back inside the
    /// response; only configuration defects are returned as errors.
    pub fn handle_query(&self, msg: &MessageContext, query: &IndexQuery) -> Result<QueryResponse> {
        debug!(type_id = msg.type_id, kind = query.kind(), "Handling query");
        let ctx = self.ctx.as_ref();
        let remote = self.remote.as_deref();
        let response = match query {
            IndexQuery::GetRange(q) => QueryResponse::GetRange(get_range::process(q, msg, ctx)?),
            IndexQuery::FirstLast(q) => QueryResponse::FirstLast(first_last::process(q, msg, ctx)?),
            IndexQuery::Random(q) => QueryResponse::Random(random::process(q, msg, ctx)?),
            IndexQuery::Contains(q) => QueryResponse::Contains(contains::process(q, msg, ctx)?),
            IndexQuery::Paged(q) => QueryResponse::Paged(paged::process(q, msg, ctx)?),
            IndexQuery::Span(q) => QueryResponse::Span(span::process(q, msg, ctx)?),
            IndexQuery::Intersection(q) => QueryResponse::Intersection(intersection::process(q, msg, ctx)?),
            IndexQuery::RemoteClusteredPaged(q) => {
                QueryResponse::Paged(remote::process_paged(q, msg, ctx, remote)?)
            }
            IndexQuery::RemoteClusteredSpan(q) => QueryResponse::Span(remote::process_span(q, msg, ctx, remote)?),
            IndexQuery::RemoteClusteredIntersection(q) => {
                QueryResponse::Intersection(remote::process_intersection(q, msg, ctx, remote)?)
            }
        };
        Ok(response)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub fn handle_save(&self, msg: &MessageContext, cache_index: &CacheIndex) -> Result<()> {
        save::process(cache_index, msg, &self.ctx)
    }

    pub fn handle_update(&self, msg: &MessageContext, update: &CacheIndexUpdate) -> Result<()> {
        update::process(update, msg, &self.ctx).map_err(|e| {
            error!(type_id = msg.type_id, error = %e, "TypeID {} -- Error processing update message", msg.type_id);
            e
        })
    }

    pub fn handle_delete(&self, msg: &MessageContext) -> Result<()> {
        delete::process(msg, &self.ctx)
    }

    pub fn handle_delete_all_in_type(&self, msg: &MessageContext) -> Result<()> {
        delete_all_in_type::process(msg, &self.ctx)
    }

    /// Raw record of the first index, `None` on a miss
    pub fn handle_get(&self, msg: &MessageContext) -> Result<Option<Bytes>> {
        let record = get::process(msg, &self.ctx)?;
        if record.is_none() {
            info!(
                "Miss in CacheIndexStorage for Id : {}, ExtendedId : {:?}",
                msg.primary_id, msg.extended_id
            );
        }
        Ok(record)
    }

    // =========================================================================
    // Relay Messages
    // =========================================================================

    /// Executes a relay message. Saves carry a JSON [`CacheIndex`]; gets are
    /// answered in the message's payload.
    pub fn handle_message(&self, msg: &MessageContext, message: &mut RelayMessage) -> Result<()> {
        match message.message_type {
            MessageType::Save => {
                let payload = message
                    .payload
                    .as_ref()
                    .ok_or_else(|| Error::invalid_request("Save message without payload"))?;
                let raw = self.ctx.decode_payload(payload)?;
                let cache_index: CacheIndex = serde_json::from_slice(&raw)?;
                self.handle_save(msg, &cache_index)
            }
            MessageType::Get => {
                message.payload = self
                    .handle_get(msg)?
                    .map(|record| self.ctx.encode_payload(msg.type_id, &record));
                Ok(())
            }
            MessageType::Delete => self.handle_delete(msg),
            MessageType::DeleteAllInType => self.handle_delete_all_in_type(msg),
            MessageType::DeleteAll | MessageType::DeleteInAllTypes => {
                warn!(
                    "CacheIndex storage does NOT support Message Type {:?}",
                    message.message_type
                );
                Ok(())
            }
        }
    }

    /// Flushes the interning tables
    pub fn shutdown(&self) {
        info!("Shutting down CacheIndex storage");
        self.ctx.shutdown();
    }
}

impl RelayComponent for IndexStore {
    /// Routes with a context read off the message: one relay hop left, from
    /// this node's zone
    fn handle_message(&self, message: &mut RelayMessage) -> Result<()> {
        let msg = MessageContext {
            type_id: message.type_id,
            primary_id: message.primary_id,
            extended_id: message.extended_id.clone(),
            relay_ttl: 1,
            source_zone: self.ctx.my_zone(),
            address_history: Vec::new(),
        };
        IndexStore::handle_message(self, &msg, message)
    }
}

/// Payload carrying a JSON-encoded save
pub fn save_payload(ctx: &IndexStoreContext, type_id: i16, cache_index: &CacheIndex) -> Result<Payload> {
    let raw = serde_json::to_vec(cache_index)?;
    Ok(ctx.encode_payload(type_id, &raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::generate_primary_id;
    use crate::processors::test_support::*;
    use crate::query::{GetRangeQuery, IndexDataItem, TagMap};

    fn store() -> (IndexStore, Fixture) {
        let fx = fixture();
        let ctx = Arc::new(IndexStoreContext::new(
            fx.ctx.config().clone(),
            fx.storage.clone(),
            fx.data.clone(),
        ));
        (IndexStore::new(ctx), fx)
    }

    fn range(index_id: &[u8]) -> IndexQuery {
        IndexQuery::GetRange(GetRangeQuery {
            index_id: index_id.to_vec(),
            target_index_name: BY_DATE.into(),
            offset: 1,
            item_num: 10,
            exclude_data: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_save_message_then_query() {
        let (store, fx) = store();
        let mut cache_index = CacheIndex::new(vec![1], BY_DATE);
        cache_index.add_list = vec![post(10, 100), post(11, 50)];
        let payload = save_payload(store.context(), INDEX_TYPE, &cache_index).unwrap();
        let mut message = RelayMessage::save(INDEX_TYPE, generate_primary_id(&[1]), vec![1], payload);
        RelayComponent::handle_message(&store, &mut message).unwrap();

        let response = store.handle_query(&fx.msg(&[1]), &range(&[1])).unwrap();
        let QueryResponse::GetRange(result) = response else {
            panic!("unexpected response {:?}", response);
        };
        assert_eq!(item_ids(&result.result_items), vec![11, 10]);
        assert!(fx.has_data(&[1], 10));
    }

    #[test]
    fn test_get_and_unsupported_messages() {
        let (store, fx) = store();
        let mut cache_index = CacheIndex::new(vec![1], BY_DATE);
        cache_index.add_list = vec![IndexDataItem::new(vec![10], TagMap::new()).with_tag("date", 5i64.to_le_bytes())];
        store.handle_save(&fx.msg(&[1]), &cache_index).unwrap();

        let mut get = RelayMessage::get(INDEX_TYPE, generate_primary_id(&[1]), vec![1]);
        RelayComponent::handle_message(&store, &mut get).unwrap();
        assert!(get.payload.is_some());

        let mut delete_all = RelayMessage::delete_all_in_type(INDEX_TYPE);
        delete_all.message_type = MessageType::DeleteInAllTypes;
        RelayComponent::handle_message(&store, &mut delete_all).unwrap();
        assert!(fx.has_index(&[1], 0));
    }

    #[test]
    fn test_remote_query_without_client_folds() {
        let (store, fx) = store();
        let query = IndexQuery::RemoteClusteredPaged(Default::default());
        let response = store.handle_query(&fx.msg(&[1]), &query).unwrap();
        assert!(response.exception_info().unwrap().contains("No remote relay client"));
    }
}
