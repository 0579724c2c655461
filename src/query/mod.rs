//! Caller-facing queries, commands and results
//!
//! # Components
//!
//! - [`item`] - items and headers exchanged with callers
//! - [`request`] - one plain object per query shape plus save/update commands
//! - [`result`] - the matching results
//!
//! [`IndexQuery`] and [`QueryResponse`] wrap every query shape so a single
//! dispatcher can route them.

pub mod item;
pub mod request;
pub mod result;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use item::{FullDataIdInfo, IndexDataItem, IndexHeader, IndexItem, ResultItem, TagMap};
pub use request::{
    CacheIndex, CacheIndexUpdate, Command, ContainsIndexQuery, FilteredIndexDeleteCommand,
    FirstLastQuery, GetIndexHeaderType, GetRangeQuery, IndexIdParams, IntersectionQuery,
    IntersectionQueryParams, MultiIndexIdQuery, PagedIndexQuery, RandomQuery, SpanQuery,
};
pub use result::{
    ContainsIndexQueryResult, FirstLastQueryResult, GetRangeQueryResult,
    IntersectionQueryResult, MultiIndexIdQueryResult, PagedIndexQueryResult, RandomQueryResult,
    SpanQueryResult,
};

// =============================================================================
// Dispatch Types
// =============================================================================

/// Every query shape the store answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexQuery {
    GetRange(GetRangeQuery),
    FirstLast(FirstLastQuery),
    Random(RandomQuery),
    Contains(ContainsIndexQuery),
    Paged(PagedIndexQuery),
    Span(SpanQuery),
    Intersection(IntersectionQuery),
    /// Identifiers found by a remote cluster, payloads fetched locally
    RemoteClusteredPaged(PagedIndexQuery),
    RemoteClusteredSpan(SpanQuery),
    RemoteClusteredIntersection(IntersectionQuery),
}

impl IndexQuery {
    /// Name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            IndexQuery::GetRange(_) => "GetRangeQuery",
            IndexQuery::FirstLast(_) => "FirstLastQuery",
            IndexQuery::Random(_) => "RandomQuery",
            IndexQuery::Contains(_) => "ContainsIndexQuery",
            IndexQuery::Paged(_) => "PagedIndexQuery",
            IndexQuery::Span(_) => "SpanQuery",
            IndexQuery::Intersection(_) => "IntersectionQuery",
            IndexQuery::RemoteClusteredPaged(_) => "RemoteClusteredPagedIndexQuery",
            IndexQuery::RemoteClusteredSpan(_) => "RemoteClusteredSpanQuery",
            IndexQuery::RemoteClusteredIntersection(_) => "RemoteClusteredIntersectionQuery",
        }
    }
}

/// Result of an [`IndexQuery`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryResponse {
    GetRange(GetRangeQueryResult),
    FirstLast(FirstLastQueryResult),
    Random(RandomQueryResult),
    Contains(ContainsIndexQueryResult),
    Paged(PagedIndexQueryResult),
    Span(SpanQueryResult),
    Intersection(IntersectionQueryResult),
}

impl QueryResponse {
    /// Error text the query folded into its result
    pub fn exception_info(&self) -> Option<&str> {
        match self {
            QueryResponse::GetRange(r) => r.exception_info.as_deref(),
            QueryResponse::FirstLast(r) => r.exception_info.as_deref(),
            QueryResponse::Random(r) => r.exception_info.as_deref(),
            QueryResponse::Contains(r) => r.exception_info.as_deref(),
            QueryResponse::Paged(r) | QueryResponse::Span(r) => r.exception_info.as_deref(),
            QueryResponse::Intersection(r) => r.exception_info.as_deref(),
        }
    }
}

// =============================================================================
// Remote Cluster Client
// =============================================================================

/// Client for the relay clusters that own other partitions of a type.
///
/// Queries submitted here always have `exclude_data` set; payloads are
/// fetched from the local data tier afterwards.
pub trait RemoteRelayClient: Send + Sync {
    fn submit_paged(&self, type_id: i16, query: &PagedIndexQuery) -> Result<PagedIndexQueryResult>;

    fn submit_span(&self, type_id: i16, query: &SpanQuery) -> Result<SpanQueryResult>;

    fn submit_intersection(
        &self,
        type_id: i16,
        query: &IntersectionQuery,
    ) -> Result<IntersectionQueryResult>;
}

/// Serde for maps keyed by raw bytes, written as a list of pairs since JSON
/// object keys must be strings
pub(crate) mod byte_keyed {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<V, S>(map: &BTreeMap<Vec<u8>, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, V, D>(deserializer: D) -> Result<BTreeMap<Vec<u8>, V>, D::Error>
    where
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let pairs: Vec<(Vec<u8>, V)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
