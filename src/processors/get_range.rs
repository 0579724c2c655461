//! GetRange: one window of one index

use tracing::debug;

use super::{fold_error, size_i32, target_index};
use crate::config::{Index, IndexTypeMapping};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::{GetRangeQuery, GetRangeQueryResult};
use crate::store::adapter;
use crate::utils::{data_tier, index_server};

pub fn process(
    query: &GetRangeQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<GetRangeQueryResult> {
    fold_error(msg.type_id, "GetRangeQuery", run(query, msg, ctx), |info| {
        GetRangeQueryResult {
            exception_info: Some(info),
            ..Default::default()
        }
    })
}

fn validate<'a>(mapping: &'a IndexTypeMapping, query: &GetRangeQuery) -> Result<&'a Index> {
    let index = target_index(mapping, &query.target_index_name)?;
    if query.index_id.is_empty() {
        return Err(Error::invalid_request("No IndexId present on the GetRangeQuery"));
    }
    if query.offset < 1 || query.item_num < 1 {
        return Err(Error::invalid_request(
            "Both GetRangeQuery.Offset and GetRangeQuery.ItemNum should be greater than 0",
        ));
    }
    Ok(index)
}

fn run(
    query: &GetRangeQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<GetRangeQueryResult> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    let index = validate(mapping, query)?;

    let max_items = (query.offset - 1).saturating_add(query.item_num);
    let in_context = index_server::in_context(ctx, msg.type_id, &query.index_id, index)
        .with_max_items(max_items)
        .with_filter(query.filter.clone(), true);
    let Some(cii) = index_server::get_cache_index_internal(ctx, msg.primary_id, index, in_context)?
    else {
        return Ok(GetRangeQueryResult::default());
    };
    debug!(
        type_id = msg.type_id,
        index_name = %index.index_name,
        total = cii.total_count(),
        read = cii.out_context().read_item_count,
        "Fetched index for GetRangeQuery"
    );

    let mut result = GetRangeQueryResult {
        index_exists: true,
        index_size: size_i32(cii.total_count()),
        virtual_count: cii.virtual_count(),
        result_items: adapter::result_items(&cii, query.offset, query.item_num, ctx.tag_hashes())?,
        ..Default::default()
    };
    if !query.exclude_data {
        data_tier::get_data(
            &mut result.result_items,
            ctx,
            msg,
            &mapping.full_data_id_fields,
            query.full_data_id_info.as_ref(),
            None,
        )?;
    }
    if query.get_metadata {
        result.metadata =
            index_server::get_query_metadata(ctx, mapping, msg.primary_id, &query.index_id, &[&cii])?;
    }
    Ok(result)
}
