//! Shared core of the paged and span queries
//!
//! Every listed index id is fetched from the same target index, optionally
//! re-sorted, and merged into one list bounded by the query's merge count.
//! The caller's window is then cut from the merged list, extra tags and
//! index headers are attached, and the payloads are fetched.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;

use tracing::{debug, error};

use super::{size_i32, target_index};
use crate::codec::generate_primary_id;
use crate::config::{Index, IndexTypeMapping};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::result::append_exception;
use crate::query::{GetIndexHeaderType, IndexHeader, MultiIndexIdQuery, MultiIndexIdQueryResult, ResultItem};
use crate::sort::{merge_item_lists, BaseComparer};
use crate::store::{adapter, CacheIndexInternal};
use crate::utils::{add_missing_tags, data_tier, get_tags, index_server};

/// Fetched indexes keyed by `(index id, index name)`
type Fetched = HashMap<(Vec<u8>, String), CacheIndexInternal>;

/// Checks the parts common to every multi-index query
pub(crate) fn validate<'a>(mapping: &'a IndexTypeMapping, query: &MultiIndexIdQuery) -> Result<&'a Index> {
    let index = target_index(mapping, &query.target_index_name)?;
    if query.index_id_list.is_empty() {
        return Err(Error::invalid_request("No IndexIdList present on the query"));
    }
    if !query.primary_id_list.is_empty() && query.primary_id_list.len() != query.index_id_list.len() {
        return Err(Error::invalid_request(
            "PrimaryIdList.Count does not match with IndexIdList.Count",
        ));
    }
    Ok(index)
}

pub(crate) fn format_address_history(history: &[IpAddr]) -> String {
    history
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn query_info(query: &MultiIndexIdQuery) -> String {
    let filter = match &query.filter {
        Some(filter) => format!("{:?}", filter),
        None => "none".to_string(),
    };
    format!(
        "NumOfIndex: {}, MaxItemsPerIndex: {}, Filter: {}, ExcludeData: {}",
        query.index_id_list.len(),
        query.max_items,
        filter,
        query.exclude_data
    )
}

/// Runs a validated query against `index`.
///
/// `subset` is the `(start, len)` window cut from the merged list, `None` to
/// return all of it.
pub(crate) fn run(
    query: &MultiIndexIdQuery,
    index: &Index,
    max_merge_count: usize,
    subset: Option<(usize, usize)>,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
    query_info: &str,
) -> Result<MultiIndexIdQueryResult> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    let comparer = match &query.tag_sort {
        Some(tag_sort) => BaseComparer::from_tag_sort(tag_sort),
        None => index.comparer(),
    };

    let mut result = MultiIndexIdQueryResult::default();
    let mut fetched = Fetched::new();
    let mut cap = query.cap_condition.clone();
    let mut items: Vec<ResultItem> = Vec::new();
    let (mut total_count, mut available) = (0usize, 0usize);

    for (at, index_id) in query.index_id_list.iter().enumerate() {
        let (max_items, filter) = match query.index_id_params_mapping.get(index_id) {
            Some(params) => (params.max_items, params.filter.clone()),
            None => (query.max_items, query.filter.clone()),
        };
        let max_extract = if max_items > 0 {
            max_items
        } else if query.get_additional_available_item_count && filter.is_some() {
            0
        } else {
            max_merge_count
        };

        let in_context = index_server::in_context(ctx, msg.type_id, index_id, index)
            .with_max_items(max_extract)
            .with_filter(filter, true)
            .with_index_condition(query.index_condition.clone())
            .with_cap_condition(cap.clone());
        let Some(mut cii) = index_server::get_cache_index_internal(ctx, query.primary_id(at), index, in_context)?
        else {
            continue;
        };
        // budgets left over carry into the next index
        if cap.is_some() {
            cap = cii.take_cap_condition();
        }

        total_count += cii.total_count();
        available += cii.count();
        if let Some(tag_sort) = &query.tag_sort {
            cii.sort(tag_sort);
        }
        let list = adapter::result_items(&cii, 1, usize::MAX, ctx.tag_hashes())?;
        items = merge_item_lists(items, list, max_merge_count, &comparer);
        fetched.insert((index_id.clone(), index.index_name.clone()), cii);
    }

    if let Some((start, len)) = subset {
        items = items.into_iter().skip(start).take(len).collect();
    }

    if !query.tags_from_indexes.is_empty() {
        let extra = query
            .tags_from_indexes
            .iter()
            .map(|name| target_index(mapping, name))
            .collect::<Result<Vec<_>>>()?;
        attach_tags(query, &extra, &mut items, &mut fetched, &mut result, msg, ctx)?;
    }

    if query.get_index_header_type != GetIndexHeaderType::None {
        let header_ids: Vec<&Vec<u8>> = match query.get_index_header_type {
            GetIndexHeaderType::AllIndexIds => query.index_id_list.iter().collect(),
            _ => items.iter().map(|item| &item.index_id).collect(),
        };
        let mut headers = BTreeMap::new();
        for index_id in header_ids {
            if headers.contains_key(index_id) {
                continue;
            }
            let Some(target) = fetched.get(&(index_id.clone(), index.index_name.clone())) else {
                continue;
            };
            let header = index_header(ctx, mapping, query, &fetched, target, index_id, msg.type_id)?;
            headers.insert(index_id.clone(), header);
        }
        result.index_id_index_header_mapping = headers;
    }

    if !query.exclude_data {
        data_tier::get_data(
            &mut items,
            ctx,
            msg,
            &mapping.full_data_id_fields,
            query.full_data_id_info.as_ref(),
            None,
        )?;
    }

    let threshold = mapping.query_override_settings.max_result_items_threshold_log;
    if threshold > 0 && items.len() > threshold {
        error!(
            "Encountered potentially Bad Paged Query with Large Result Set of {}.  AddressHistory: {}.  Query Info: {}",
            items.len(),
            format_address_history(&msg.address_history),
            query_info
        );
    }
    debug!(
        "QueryInfo: {}, AddressHistory: {}",
        query_info,
        format_address_history(&msg.address_history)
    );

    result.result_items = items;
    result.total_count = size_i32(total_count);
    result.additional_available_item_count = size_i32(available);
    Ok(result)
}

/// Merges into each result item the tags it carries in the `extra` indexes
/// of its own index id. Each index is fetched at most once.
fn attach_tags(
    query: &MultiIndexIdQuery,
    extra: &[&Index],
    items: &mut [ResultItem],
    fetched: &mut Fetched,
    result: &mut MultiIndexIdQueryResult,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<()> {
    let mut missing = HashSet::new();
    for item in items.iter_mut() {
        for index in extra {
            let key = (item.index_id.clone(), index.index_name.clone());
            if missing.contains(&key) {
                continue;
            }
            if !fetched.contains_key(&key) {
                let primary_id = query
                    .index_id_list
                    .iter()
                    .position(|id| *id == item.index_id)
                    .map(|at| query.primary_id(at))
                    .unwrap_or_else(|| generate_primary_id(&item.index_id));
                match index_server::fetch_full(ctx, msg.type_id, primary_id, &item.index_id, index)? {
                    Some(cii) => {
                        fetched.insert(key.clone(), cii);
                    }
                    None => {
                        missing.insert(key);
                        continue;
                    }
                }
            }
            let Some(source) = fetched.get(&key) else {
                continue;
            };
            match get_tags(ctx, source, &*item) {
                Ok(Some(tags)) => add_missing_tags(&mut item.tags, tags),
                Ok(None) => {}
                Err(e) => {
                    error!(type_id = msg.type_id, error = %e, index_name = %index.index_name, "Failed to read tags");
                    append_exception(&mut result.exception_info, &e.to_string());
                }
            }
        }
    }
    Ok(())
}

fn index_header(
    ctx: &IndexStoreContext,
    mapping: &IndexTypeMapping,
    query: &MultiIndexIdQuery,
    fetched: &Fetched,
    target: &CacheIndexInternal,
    index_id: &[u8],
    type_id: i16,
) -> Result<IndexHeader> {
    let metadata_present = |name: &str| mapping.index(name).is_some_and(|i| i.metadata_present);

    let metadata = if mapping.metadata_stored_separately {
        index_server::separate_metadata(ctx, type_id, generate_primary_id(index_id), index_id)?
    } else {
        let mut metadata = None;
        if metadata_present(&query.target_index_name) {
            metadata = target.metadata().map(<[u8]>::to_vec);
        }
        for name in query.tags_from_indexes.iter().filter(|n| metadata_present(n)) {
            let carried = fetched
                .get(&(index_id.to_vec(), name.clone()))
                .and_then(|cii| cii.metadata());
            if let Some(carried) = carried {
                metadata = Some(carried.to_vec());
            }
        }
        metadata
    };

    Ok(IndexHeader {
        metadata,
        virtual_count: target.virtual_count(),
    })
}
