//! Relay message plumbing
//!
//! Both the local index storage and the data tier are reached through the
//! same message-oriented contract: a [`RelayMessage`] names a record by
//! `(type id, primary id, extended id)` and a [`RelayComponent`] executes it.
//! `Get` fills the payload in place, `Save` writes it, `Delete` removes it.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};

// =============================================================================
// Messages
// =============================================================================

/// Operation carried by a relay message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Get,
    Save,
    Delete,
    DeleteAllInType,
    DeleteAll,
    DeleteInAllTypes,
}

/// Stored record bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub data: Bytes,
    /// `data` is LZ4 compressed
    pub compressed: bool,
}

impl Payload {
    pub fn new(data: Bytes, compressed: bool) -> Self {
        Self { data, compressed }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A request to a relay component
#[derive(Debug, Clone)]
pub struct RelayMessage {
    pub type_id: i16,
    pub primary_id: i32,
    pub extended_id: Vec<u8>,
    pub message_type: MessageType,
    pub payload: Option<Payload>,
    /// Set on saves
    pub last_updated: Option<DateTime<Utc>>,
}

impl RelayMessage {
    fn new(type_id: i16, primary_id: i32, extended_id: Vec<u8>, message_type: MessageType) -> Self {
        Self {
            type_id,
            primary_id,
            extended_id,
            message_type,
            payload: None,
            last_updated: None,
        }
    }

    pub fn get(type_id: i16, primary_id: i32, extended_id: Vec<u8>) -> Self {
        Self::new(type_id, primary_id, extended_id, MessageType::Get)
    }

    pub fn save(type_id: i16, primary_id: i32, extended_id: Vec<u8>, payload: Payload) -> Self {
        Self {
            payload: Some(payload),
            last_updated: Some(Utc::now()),
            ..Self::new(type_id, primary_id, extended_id, MessageType::Save)
        }
    }

    pub fn delete(type_id: i16, primary_id: i32, extended_id: Vec<u8>) -> Self {
        Self::new(type_id, primary_id, extended_id, MessageType::Delete)
    }

    pub fn delete_all_in_type(type_id: i16) -> Self {
        Self::new(type_id, 0, Vec::new(), MessageType::DeleteAllInType)
    }
}

// =============================================================================
// Component Contract
// =============================================================================

/// Executes relay messages against a store
pub trait RelayComponent: Send + Sync {
    /// Execute one message, filling `payload` for gets
    fn handle_message(&self, message: &mut RelayMessage) -> Result<()>;

    /// Execute a batch of messages
    fn handle_messages(&self, messages: &mut [RelayMessage]) -> Result<()> {
        for message in messages.iter_mut() {
            self.handle_message(message)?;
        }
        Ok(())
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Operation counters of an [`InMemoryRelayStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStoreStats {
    pub object_count: u64,
    pub total_bytes: u64,
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
    /// Stamp of the newest save
    pub last_updated: Option<DateTime<Utc>>,
}

type RecordKey = (i32, Vec<u8>);

/// Relay component holding records in memory, one map per type
pub struct InMemoryRelayStore {
    name: &'static str,
    storage: DashMap<i16, DashMap<RecordKey, Payload>>,
    object_count: AtomicU64,
    total_bytes: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    last_updated: RwLock<Option<DateTime<Utc>>>,
}

impl InMemoryRelayStore {
    /// `name` labels the store in logs
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            storage: DashMap::new(),
            object_count: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            last_updated: RwLock::new(None),
        }
    }

    /// Stored payload of a record
    pub fn payload(&self, type_id: i16, primary_id: i32, extended_id: &[u8]) -> Option<Payload> {
        self.storage
            .get(&type_id)
            .and_then(|records| records.get(&(primary_id, extended_id.to_vec())).map(|p| p.clone()))
    }

    /// True when the record exists
    pub fn contains(&self, type_id: i16, primary_id: i32, extended_id: &[u8]) -> bool {
        self.payload(type_id, primary_id, extended_id).is_some()
    }

    /// Number of records of a type
    pub fn type_len(&self, type_id: i16) -> usize {
        self.storage.get(&type_id).map(|r| r.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> RelayStoreStats {
        RelayStoreStats {
            object_count: self.object_count.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            last_updated: *self.last_updated.read(),
        }
    }

    fn put(&self, type_id: i16, key: RecordKey, payload: Payload) {
        let size = payload.len() as u64;
        let records = self.storage.entry(type_id).or_default();
        match records.insert(key, payload) {
            Some(old) => {
                self.total_bytes.fetch_add(size, Ordering::Relaxed);
                self.total_bytes.fetch_sub(old.len() as u64, Ordering::Relaxed);
            }
            None => {
                self.object_count.fetch_add(1, Ordering::Relaxed);
                self.total_bytes.fetch_add(size, Ordering::Relaxed);
            }
        }
    }

    fn forget(&self, removed: u64, bytes: u64) {
        self.object_count.fetch_sub(removed, Ordering::Relaxed);
        self.total_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    fn remove(&self, type_id: i16, key: &RecordKey) {
        if let Some(records) = self.storage.get(&type_id) {
            if let Some((_, old)) = records.remove(key) {
                self.forget(1, old.len() as u64);
            }
        }
    }

    fn remove_type(&self, type_id: i16) {
        if let Some((_, records)) = self.storage.remove(&type_id) {
            let bytes: u64 = records.iter().map(|r| r.value().len() as u64).sum();
            self.forget(records.len() as u64, bytes);
        }
    }
}

impl Default for InMemoryRelayStore {
    fn default() -> Self {
        Self::new("relay-store")
    }
}

impl RelayComponent for InMemoryRelayStore {
    fn handle_message(&self, message: &mut RelayMessage) -> Result<()> {
        let key = (message.primary_id, message.extended_id.clone());
        match message.message_type {
            MessageType::Get => {
                self.reads.fetch_add(1, Ordering::Relaxed);
                message.payload = self
                    .storage
                    .get(&message.type_id)
                    .and_then(|records| records.get(&key).map(|p| p.clone()));
            }
            MessageType::Save => {
                self.writes.fetch_add(1, Ordering::Relaxed);
                let payload = message.payload.clone().ok_or_else(|| {
                    Error::Relay(format!(
                        "{}: save without payload for TypeId {}",
                        self.name, message.type_id
                    ))
                })?;
                self.put(message.type_id, key, payload);
                if let Some(stamp) = message.last_updated {
                    let mut last = self.last_updated.write();
                    if last.map_or(true, |seen| stamp > seen) {
                        *last = Some(stamp);
                    }
                }
            }
            MessageType::Delete => {
                self.deletes.fetch_add(1, Ordering::Relaxed);
                self.remove(message.type_id, &key);
            }
            MessageType::DeleteAllInType => {
                self.deletes.fetch_add(1, Ordering::Relaxed);
                self.remove_type(message.type_id);
                debug!(store = self.name, type_id = message.type_id, "Deleted all records of type");
            }
            MessageType::DeleteInAllTypes => {
                self.deletes.fetch_add(1, Ordering::Relaxed);
                let types: Vec<i16> = self.storage.iter().map(|e| *e.key()).collect();
                for type_id in types {
                    self.remove(type_id, &key);
                }
            }
            MessageType::DeleteAll => {
                self.deletes.fetch_add(1, Ordering::Relaxed);
                let types: Vec<i16> = self.storage.iter().map(|e| *e.key()).collect();
                for type_id in types {
                    self.remove_type(type_id);
                }
                warn!(store = self.name, "Deleted all records");
            }
        }
        Ok(())
    }
}
