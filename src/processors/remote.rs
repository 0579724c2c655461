//! Remote clustered variants of the multi-index queries
//!
//! The query is answered by the relay cluster that owns the indexes, asked
//! for identifiers only. Payloads are then fetched from the local data tier.

use tracing::debug;

use super::{fold_error, intersection};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::result::append_exception;
use crate::query::{
    FullDataIdInfo, IntersectionQuery, IntersectionQueryResult, PagedIndexQuery,
    PagedIndexQueryResult, RemoteRelayClient, SpanQuery, SpanQueryResult,
};
use crate::utils::data_tier::{self, Hydrate};

fn client(remote: Option<&dyn RemoteRelayClient>) -> Result<&dyn RemoteRelayClient> {
    remote.ok_or_else(|| Error::Remote("No remote relay client configured".to_string()))
}

fn hydrate<T: Hydrate>(
    items: &mut [T],
    msg: &MessageContext,
    ctx: &IndexStoreContext,
    info: Option<&FullDataIdInfo>,
) -> Result<()> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    data_tier::get_data(items, ctx, msg, &mapping.full_data_id_fields, info, None)
}

pub fn process_paged(
    query: &PagedIndexQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
    remote: Option<&dyn RemoteRelayClient>,
) -> Result<PagedIndexQueryResult> {
    let outcome = (|| -> Result<PagedIndexQueryResult> {
        let mut remote_query = query.clone();
        remote_query.base.exclude_data = true;
        let mut result = client(remote)?.submit_paged(msg.type_id, &remote_query)?;
        debug!(type_id = msg.type_id, items = result.result_items.len(), "Remote paged query answered");
        if !query.base.exclude_data {
            hydrate(&mut result.result_items, msg, ctx, query.base.full_data_id_info.as_ref())?;
        }
        Ok(result)
    })();
    fold_error(msg.type_id, "RemoteClusteredPagedIndexQuery", outcome, |info| {
        let mut failed = PagedIndexQueryResult::default();
        append_exception(&mut failed.exception_info, &info);
        failed
    })
}

pub fn process_span(
    query: &SpanQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
    remote: Option<&dyn RemoteRelayClient>,
) -> Result<SpanQueryResult> {
    let outcome = (|| -> Result<SpanQueryResult> {
        let mut remote_query = query.clone();
        remote_query.base.exclude_data = true;
        let mut result = client(remote)?.submit_span(msg.type_id, &remote_query)?;
        debug!(type_id = msg.type_id, items = result.result_items.len(), "Remote span query answered");
        if !query.base.exclude_data {
            hydrate(&mut result.result_items, msg, ctx, query.base.full_data_id_info.as_ref())?;
        }
        Ok(result)
    })();
    fold_error(msg.type_id, "RemoteClusteredSpanQuery", outcome, |info| {
        let mut failed = SpanQueryResult::default();
        append_exception(&mut failed.exception_info, &info);
        failed
    })
}

pub fn process_intersection(
    query: &IntersectionQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
    remote: Option<&dyn RemoteRelayClient>,
) -> Result<IntersectionQueryResult> {
    let outcome = (|| -> Result<IntersectionQueryResult> {
        intersection::validate(ctx.index_type_mapping(msg.type_id)?, query)?;
        let mut remote_query = query.clone();
        remote_query.exclude_data = true;
        let mut result = client(remote)?.submit_intersection(msg.type_id, &remote_query)?;
        if !query.exclude_data {
            hydrate(&mut result.result_items, msg, ctx, query.full_data_id_info.as_ref())?;
        }
        Ok(result)
    })();
    fold_error(msg.type_id, "RemoteClusteredIntersectionQuery", outcome, |info| {
        IntersectionQueryResult {
            exception_info: Some(info),
            ..Default::default()
        }
    })
}
