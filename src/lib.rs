//! CacheIndex - sorted, filterable secondary indexes for a relay cache
//!
//! Items of a type are indexed under composite binary index ids. Each index
//! id owns one serialized, sorted record per configured index; queries read
//! windows of one record or merge many, filtering on binary tag values while
//! decoding. Mutations keep the data tier in step through forwarded save and
//! delete messages, serialized per key by a striped lock pool.
//!
//! # Architecture
//!
//! ```text
//!              ┌─────────────────────────────────────────┐
//!  request ───▶│ IndexStore  (processors: query/save/…)   │
//!              └──────┬──────────────────────┬───────────┘
//!                     │ index records        │ payloads
//!              ┌──────▼──────┐        ┌──────▼──────┐
//!              │  storage    │        │  forwarder  │
//!              │ (relay)     │        │ (data tier) │
//!              └─────────────┘        └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`codec`] - data types, typed comparison, record reader/writer, id derivation
//! - [`config`] - storage configuration tree and validation
//! - [`context`] - interning tables, lock pool, per-request and shared context
//! - [`error`] - Error types
//! - [`filter`] - filter trees, index conditions and caps
//! - [`processors`] - one processor per request shape, and the [`IndexStore`] entry point
//! - [`query`] - queries, commands and results
//! - [`sort`] - comparers, merge, intersection and random sampling
//! - [`store`] - in-memory index form, record codec and relay plumbing
//! - [`utils`] - data-tier and index-fetch helpers

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod processors;
pub mod query;
pub mod sort;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::StorageConfig;
pub use context::{IndexStoreContext, MessageContext};
pub use error::{Error, Result};
pub use processors::IndexStore;
pub use query::{CacheIndex, IndexQuery, QueryResponse};
pub use store::{InMemoryRelayStore, RelayComponent, RelayMessage};
