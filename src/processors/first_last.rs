//! FirstLast: head and tail windows of one index

use super::{fold_error, size_i32, target_index};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::{FirstLastQuery, FirstLastQueryResult};
use crate::store::adapter;
use crate::utils::{data_tier, index_server};

pub fn process(
    query: &FirstLastQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<FirstLastQueryResult> {
    fold_error(msg.type_id, "FirstLastQuery", run(query, msg, ctx), |info| {
        FirstLastQueryResult {
            exception_info: Some(info),
            ..Default::default()
        }
    })
}

fn run(
    query: &FirstLastQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<FirstLastQueryResult> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    let index = target_index(mapping, &query.target_index_name)?;
    if query.index_id.is_empty() {
        return Err(Error::invalid_request("No IndexId present on the FirstLastQuery"));
    }
    let (first, last) = (query.first_page_size, query.last_page_size);
    if first < 1 && last < 1 {
        return Err(Error::invalid_request(
            "At least one of FirstLastQuery.FirstPageSize and FirstLastQuery.LastPageSize should be greater than 0",
        ));
    }

    // the tail needs the whole index
    let max_items = if last < 1 { first } else { 0 };
    let in_context = index_server::in_context(ctx, msg.type_id, &query.index_id, index)
        .with_max_items(max_items)
        .with_filter(query.filter.clone(), true);
    let Some(cii) = index_server::get_cache_index_internal(ctx, msg.primary_id, index, in_context)?
    else {
        return Ok(FirstLastQueryResult::default());
    };

    let mut result = FirstLastQueryResult {
        index_exists: true,
        index_size: size_i32(cii.total_count()),
        virtual_count: cii.virtual_count(),
        ..Default::default()
    };
    let count = cii.count();
    if first.saturating_add(last) <= count {
        result.first_page_items = adapter::result_items(&cii, 1, first, ctx.tag_hashes())?;
        result.last_page_items =
            adapter::result_items(&cii, count - last + 1, last, ctx.tag_hashes())?;
    } else {
        result.first_page_items = adapter::result_items(&cii, 1, count, ctx.tag_hashes())?;
    }

    if !query.exclude_data {
        for items in [&mut result.first_page_items, &mut result.last_page_items] {
            data_tier::get_data(
                items,
                ctx,
                msg,
                &mapping.full_data_id_fields,
                query.full_data_id_info.as_ref(),
                None,
            )?;
        }
    }
    if query.get_metadata {
        result.metadata =
            index_server::get_query_metadata(ctx, mapping, msg.primary_id, &query.index_id, &[&cii])?;
    }
    Ok(result)
}
