//! Index storage
//!
//! # Components
//!
//! - [`CacheIndexInternal`] - one physical index and its record codec
//! - [`context`] - instructions for and results of a fetch
//! - [`adapter`] - conversion to caller-facing items
//! - [`relay`] - message contract of the storage and data-tier components
//! - [`compression`] - LZ4 payload compression

pub mod adapter;
pub mod cache_index_internal;
pub mod compression;
pub mod context;
pub mod internal_item;
pub mod relay;

pub use cache_index_internal::CacheIndexInternal;
pub use context::{InDeserializationContext, OutDeserializationContext};
pub use internal_item::InternalItem;
pub use relay::{InMemoryRelayStore, MessageType, Payload, RelayComponent, RelayMessage};
