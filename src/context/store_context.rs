//! Shared state every processor works against

use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use super::{LockingUtil, StringHashCollection, TagHashCollection};
use crate::config::{IndexTypeMapping, StorageConfig};
use crate::error::{Error, Result};
use crate::store::compression::CompressionManager;
use crate::store::relay::{Payload, RelayComponent};

/// Configuration, interning tables, locks and the two relay components the
/// engine talks to: local index storage and the data-tier forwarder.
pub struct IndexStoreContext {
    config: Arc<StorageConfig>,
    tag_hashes: Arc<TagHashCollection>,
    string_hashes: Arc<StringHashCollection>,
    locking: LockingUtil,
    storage: Arc<dyn RelayComponent>,
    forwarder: Arc<dyn RelayComponent>,
    compression: CompressionManager,
}

impl IndexStoreContext {
    /// Context with in-memory interning tables. `config` must be initialized.
    pub fn new(
        config: StorageConfig,
        storage: Arc<dyn RelayComponent>,
        forwarder: Arc<dyn RelayComponent>,
    ) -> Self {
        Self::with_hash_collections(
            config,
            storage,
            forwarder,
            Arc::new(TagHashCollection::in_memory()),
            Arc::new(StringHashCollection::in_memory()),
        )
    }

    /// Context with interning tables persisted to the files the config names
    pub fn open(
        config: StorageConfig,
        storage: Arc<dyn RelayComponent>,
        forwarder: Arc<dyn RelayComponent>,
    ) -> Result<Self> {
        let tags = TagHashCollection::open(&config.tag_hash_file)?;
        let strings = StringHashCollection::open(&config.string_hash_file)?;
        Ok(Self::with_hash_collections(
            config,
            storage,
            forwarder,
            Arc::new(tags),
            Arc::new(strings),
        ))
    }

    pub fn with_hash_collections(
        config: StorageConfig,
        storage: Arc<dyn RelayComponent>,
        forwarder: Arc<dyn RelayComponent>,
        tag_hashes: Arc<TagHashCollection>,
        string_hashes: Arc<StringHashCollection>,
    ) -> Self {
        let locking = LockingUtil::new(config.num_clusters_in_group, config.lock_multiplier);
        Self {
            config: Arc::new(config),
            tag_hashes,
            string_hashes,
            locking,
            storage,
            forwarder,
            compression: CompressionManager::new(),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn my_zone(&self) -> u16 {
        self.config.my_zone
    }

    pub fn tag_hashes(&self) -> &Arc<TagHashCollection> {
        &self.tag_hashes
    }

    pub fn string_hashes(&self) -> &Arc<StringHashCollection> {
        &self.string_hashes
    }

    pub fn locking(&self) -> &LockingUtil {
        &self.locking
    }

    /// Local index storage
    pub fn storage(&self) -> &dyn RelayComponent {
        self.storage.as_ref()
    }

    /// Data tier
    pub fn forwarder(&self) -> &dyn RelayComponent {
        self.forwarder.as_ref()
    }

    /// Index configuration of a type. A missing mapping is a deployment defect.
    pub fn index_type_mapping(&self, type_id: i16) -> Result<&IndexTypeMapping> {
        self.config
            .index_type_mapping(type_id)
            .ok_or(Error::TypeMappingNotFound { type_id })
    }

    /// Data-tier type holding the payloads indexed by `type_id`
    pub fn try_get_related_index_type_id(&self, type_id: i16) -> Option<i16> {
        self.config
            .type_setting(type_id)
            .and_then(|s| s.related_index_type_id)
            .filter(|related| *related > 0)
    }

    pub fn try_get_type_id(&self, type_name: &str) -> Option<i16> {
        self.config.type_id(type_name)
    }

    pub fn type_name(&self, type_id: i16) -> Option<&str> {
        self.config
            .type_setting(type_id)
            .map(|s| s.type_name.as_str())
    }

    /// Whether payloads of `type_id` are stored compressed
    pub fn compress_option(&self, type_id: i16) -> bool {
        self.config
            .type_setting(type_id)
            .map(|s| s.compress)
            .unwrap_or(false)
    }

    /// Payload for a record of `type_id`, compressed per the type's option
    pub fn encode_payload(&self, type_id: i16, data: &[u8]) -> Payload {
        self.compression.encode(data, self.compress_option(type_id))
    }

    /// Raw bytes of a stored payload
    pub fn decode_payload(&self, payload: &Payload) -> Result<Bytes> {
        self.compression.decode(payload)
    }

    /// Drops the interned tags and string values of a type
    pub fn remove_type(&self, type_id: i16) {
        self.tag_hashes.remove_type(type_id);
        self.string_hashes.remove_type(type_id);
    }

    /// Flushes the interning tables
    pub fn shutdown(&self) {
        self.tag_hashes.persist();
        self.string_hashes.persist();
        info!(
            tag_hash_file = %self.config.tag_hash_file,
            string_hash_file = %self.config.string_hash_file,
            "Saved hash collections"
        );
    }
}
