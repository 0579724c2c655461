//! Contains: which of the given items an index holds

use std::collections::HashMap;

use super::{fold_error, size_i32, target_index};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::{ContainsIndexQuery, ContainsIndexQueryResult};
use crate::store::{adapter, CacheIndexInternal};
use crate::utils::{add_missing_tags, data_tier, get_tags, index_server};

pub fn process(
    query: &ContainsIndexQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<ContainsIndexQueryResult> {
    fold_error(msg.type_id, "ContainsIndexQuery", run(query, msg, ctx), |info| {
        ContainsIndexQueryResult {
            exception_info: Some(info),
            ..Default::default()
        }
    })
}

fn run(
    query: &ContainsIndexQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<ContainsIndexQueryResult> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    let index = target_index(mapping, &query.target_index_name)?;
    if query.index_id.is_empty() {
        return Err(Error::invalid_request("No IndexId present on the ContainsIndexQuery"));
    }
    let extra_indexes = query
        .tags_from_indexes
        .iter()
        .map(|name| target_index(mapping, name))
        .collect::<Result<Vec<_>>>()?;

    let Some(cii) = index_server::fetch_full(ctx, msg.type_id, msg.primary_id, &query.index_id, index)?
    else {
        return Ok(ContainsIndexQueryResult::default());
    };

    // tag sources are fetched on first use; `None` marks a missing index
    let mut tag_sources: HashMap<&str, Option<CacheIndexInternal>> = HashMap::new();
    let mut items = Vec::new();
    for query_item in &query.index_items {
        let Some(pos) = cii.search(query_item)? else {
            continue;
        };
        let Some(found) = cii.get_item(pos) else {
            continue;
        };
        let mut item = adapter::to_index_data_item(found, msg.type_id, ctx.tag_hashes())?;

        for extra in &extra_indexes {
            let name = extra.index_name.as_str();
            if !tag_sources.contains_key(name) {
                let fetched =
                    index_server::fetch_full(ctx, msg.type_id, msg.primary_id, &query.index_id, extra)?;
                tag_sources.insert(name, fetched);
            }
            if let Some(Some(source)) = tag_sources.get(name) {
                if let Some(tags) = get_tags(ctx, source, query_item)? {
                    add_missing_tags(&mut item.tags, tags);
                }
            }
        }
        items.push(item);
    }

    let mut result = ContainsIndexQueryResult {
        index_exists: true,
        index_size: size_i32(cii.total_count()),
        virtual_count: cii.virtual_count(),
        items,
        ..Default::default()
    };
    if !query.exclude_data {
        data_tier::get_data(
            &mut result.items,
            ctx,
            msg,
            &mapping.full_data_id_fields,
            query.full_data_id_info.as_ref(),
            Some(&query.index_id),
        )?;
    }
    if query.get_metadata {
        let mut fetched = vec![&cii];
        fetched.extend(tag_sources.values().flatten());
        result.metadata =
            index_server::get_query_metadata(ctx, mapping, msg.primary_id, &query.index_id, &fetched)?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::*;
    use crate::query::IndexItem;
    use assert_matches::assert_matches;

    fn query(ids: &[u8]) -> ContainsIndexQuery {
        ContainsIndexQuery {
            index_id: vec![1],
            target_index_name: BY_ID.into(),
            index_items: ids.iter().map(|id| IndexItem::new(vec![*id])).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_found_items_are_hydrated() {
        let fx = fixture();
        fx.save(&[1], &[(10, 100), (20, 200), (30, 300)]);

        let result = process(&query(&[30, 40, 10]), &fx.msg(&[1]), &fx.ctx).unwrap();
        assert!(result.index_exists);
        let ids: Vec<u8> = result.items.iter().map(|i| i.item_id[0]).collect();
        assert_eq!(ids, vec![30, 10]);
        assert_eq!(result.items[0].data.as_deref(), Some(&b"data-30"[..]));
        assert!(!result.items[0].tags.contains_key("date"));
    }

    #[test]
    fn test_tags_from_other_indexes() {
        let fx = fixture();
        fx.save(&[1], &[(10, 100), (20, 200)]);

        let mut q = query(&[20]);
        q.tags_from_indexes = vec![BY_DATE.into()];
        q.exclude_data = true;
        q.get_metadata = true;
        let result = process(&q, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(
            result.items[0].tags.get("date"),
            Some(&200i64.to_le_bytes().to_vec())
        );
        assert_eq!(result.items[0].data, None);
        assert_eq!(result.metadata, None);
    }

    #[test]
    fn test_missing_index_and_unknown_tag_source() {
        let fx = fixture();
        let result = process(&query(&[10]), &fx.msg(&[1]), &fx.ctx).unwrap();
        assert!(!result.index_exists);
        assert!(result.items.is_empty());

        let mut q = query(&[10]);
        q.tags_from_indexes = vec!["byNothing".into()];
        let result = process(&q, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_matches!(result.exception_info, Some(info) if info.contains("byNothing"));
    }
}
