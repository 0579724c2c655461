//! Intersection: items present in every listed index id

use std::collections::BTreeMap;

use super::{fold_error, target_index};
use crate::codec::DataType;
use crate::config::{Index, IndexTypeMapping};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::{IndexHeader, IntersectionQuery, IntersectionQueryResult};
use crate::sort::{intersect, BaseComparer, SortBy, SortOrder, TagSort};
use crate::store::{adapter, CacheIndexInternal, InternalItem};
use crate::utils::{data_tier, index_server};

pub fn process(
    query: &IntersectionQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<IntersectionQueryResult> {
    fold_error(msg.type_id, "IntersectionQuery", run(query, msg, ctx), |info| {
        IntersectionQueryResult {
            exception_info: Some(info),
            ..Default::default()
        }
    })
}

/// Checks shared with the remote clustered variant
pub(crate) fn validate<'a>(mapping: &'a IndexTypeMapping, query: &IntersectionQuery) -> Result<&'a Index> {
    let index = target_index(mapping, &query.target_index_name)?;
    if query.index_id_list.is_empty() {
        return Err(Error::invalid_request("No IndexIdList present on the IntersectionQuery"));
    }
    if !query.primary_id_list.is_empty() && query.primary_id_list.len() != query.index_id_list.len() {
        return Err(Error::invalid_request(
            "PrimaryIdList.Count does not match with IndexIdList.Count",
        ));
    }
    if !query.exclude_data && mapping.full_data_id_uses_index_id() {
        return Err(Error::invalid_request(
            "IntersectionQuery.ExcludeData must be set to true since FullDataId contains IndexId",
        ));
    }
    Ok(index)
}

/// Sort by item id, used when the index sort does not identify items
fn item_id_sort() -> TagSort {
    TagSort::new("ItemId", false, SortOrder::new(DataType::ByteArray, SortBy::Asc))
}

fn run(
    query: &IntersectionQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<IntersectionQueryResult> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    let index = validate(mapping, query)?;

    let psi = &index.primary_sort_info;
    let local_identity = index.local_identity_tags();
    let sort_in_identity =
        !psi.is_tag || local_identity.iter().any(|key| key.name == psi.field_name);
    let comparer = if sort_in_identity {
        index.comparer()
    } else {
        BaseComparer::from_tag_sort(&item_id_sort())
    };

    let mut result = IntersectionQueryResult::default();
    let mut items: Option<Vec<InternalItem>> = None;

    for (at, index_id) in query.index_id_list.iter().enumerate() {
        let filter = match query.intersection_query_params_mapping.get(index_id) {
            Some(params) => params.filter.clone(),
            None => query.filter.clone(),
        };
        let in_context = index_server::in_context(ctx, msg.type_id, index_id, index).with_filter(filter, true);
        let fetched = index_server::get_cache_index_internal(ctx, query.primary_id(at), index, in_context)?;
        let Some(mut cii) = fetched.filter(|cii| cii.count() > 0) else {
            // one empty index empties the intersection
            return Ok(IntersectionQueryResult::default());
        };

        if query.get_index_header {
            let header = index_header(ctx, mapping, index, &cii, query.primary_id(at), index_id)?;
            result.index_id_index_header_mapping.insert(index_id.clone(), header);
        }
        if !sort_in_identity {
            cii.sort(&item_id_sort());
        }

        match items.as_mut() {
            None => items = Some(cii.into_items()),
            Some(items) => {
                intersect(items, cii.items(), &comparer, local_identity)?;
                if items.is_empty() {
                    break;
                }
            }
        }
    }

    let items = items.unwrap_or_default();
    if items.is_empty() {
        return Ok(IntersectionQueryResult {
            index_id_index_header_mapping: BTreeMap::new(),
            ..result
        });
    }

    result.result_items = items
        .iter()
        .map(|item| adapter::to_index_data_item(item, msg.type_id, ctx.tag_hashes()))
        .collect::<Result<_>>()?;
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
    Ok(result)
}

fn index_header(
    ctx: &IndexStoreContext,
    mapping: &IndexTypeMapping,
    index: &Index,
    cii: &CacheIndexInternal,
    primary_id: i32,
    index_id: &[u8],
) -> Result<IndexHeader> {
    let metadata = if mapping.metadata_stored_separately {
        index_server::separate_metadata(ctx, mapping.type_id, primary_id, index_id)?
    } else if index.metadata_present {
        cii.metadata().map(<[u8]>::to_vec)
    } else {
        None
    };
    Ok(IndexHeader {
        metadata,
        virtual_count: cii.virtual_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DataType;
    use crate::filter::{Condition, Filter, Operation};
    use crate::processors::test_support::*;
    use crate::query::IntersectionQueryParams;

    fn seeded(fx: &Fixture) {
        fx.save(&[1], &[(10, 100), (11, 300), (12, 500), (13, 700)]);
        fx.save(&[2], &[(11, 300), (12, 500), (20, 200)]);
        fx.save(&[3], &[(12, 500), (11, 300), (30, 50)]);
    }

    fn query(target: &str, ids: &[u8]) -> IntersectionQuery {
        IntersectionQuery {
            exclude_data: true,
            ..IntersectionQuery::new(target, ids.iter().map(|id| vec![*id]).collect())
        }
    }

    fn ids(result: &IntersectionQueryResult) -> Vec<u8> {
        result.result_items.iter().map(|i| i.item_id[0]).collect()
    }

    #[test]
    fn test_intersect_by_item_id_index() {
        let fx = fixture();
        seeded(&fx);
        let result = process(&query(BY_ID, &[1, 2, 3]), &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(ids(&result), vec![11, 12]);
        assert!(result.exception_info.is_none());
    }

    #[test]
    fn test_tag_sorted_index_intersects_by_item_id() {
        let fx = fixture();
        seeded(&fx);
        let mut q = query(BY_DATE, &[1, 2]);
        q.get_index_header = true;
        let result = process(&q, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(ids(&result), vec![11, 12]);
        assert_eq!(result.index_id_index_header_mapping.len(), 2);
        assert_eq!(result.index_id_index_header_mapping[&vec![2u8]].virtual_count, 3);
        assert!(result.result_items[0].tags.contains_key("date"));
    }

    #[test]
    fn test_per_index_filter_and_missing_index() {
        let fx = fixture();
        seeded(&fx);

        let mut q = query(BY_ID, &[1, 2]);
        q.intersection_query_params_mapping.insert(
            vec![2],
            IntersectionQueryParams {
                filter: Some(Filter::Condition(Condition::tag(
                    "kind",
                    Operation::Equals,
                    vec![0],
                    DataType::Byte,
                ))),
            },
        );
        let result = process(&q, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(ids(&result), vec![12]);

        let mut q = query(BY_ID, &[1, 9]);
        q.get_index_header = true;
        let result = process(&q, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert!(result.result_items.is_empty());
        assert!(result.index_id_index_header_mapping.is_empty());
    }

    #[test]
    fn test_data_requires_item_keyed_payloads() {
        let fx = fixture();
        seeded(&fx);
        let mut q = query(BY_ID, &[1, 2]);
        q.exclude_data = false;
        let result = process(&q, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert!(result
            .exception_info
            .unwrap()
            .contains("ExcludeData must be set to true"));

        let yaml = config_yaml().replace("      - { part_name: IndexId }\n", "");
        let fx = fixture_with(&yaml);
        seeded(&fx);
        let result = process(&q, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(ids(&result), vec![11, 12]);
        assert_eq!(result.result_items[0].data.as_deref(), Some(&b"data-11"[..]));
    }
}
