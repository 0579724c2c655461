//! Helpers shared by the processors
//!
//! - [`data_tier`] - forwarding rules, full data ids, payload hydration
//! - [`index_server`] - fetching stored indexes, metadata and tag merging

pub mod data_tier;
pub mod index_server;

pub use data_tier::{get_data, get_full_data_id, should_forward_to_data_tier};
pub use index_server::{add_missing_tags, get_cache_index_internal, get_query_metadata, get_tags};
