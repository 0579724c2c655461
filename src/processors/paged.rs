//! Paged: page `page_num` of the merged multi-index result

use tracing::{error, info};

use super::{fold_error, multi_index};
use crate::config::IndexTypeMapping;
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::Result;
use crate::query::result::append_exception;
use crate::query::{PagedIndexQuery, PagedIndexQueryResult};

pub fn process(
    query: &PagedIndexQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<PagedIndexQueryResult> {
    fold_error(msg.type_id, "PagedIndexQuery", run(query, msg, ctx), |info| {
        let mut failed = PagedIndexQueryResult::default();
        append_exception(&mut failed.exception_info, &info);
        failed
    })
}

fn run(query: &PagedIndexQuery, msg: &MessageContext, ctx: &IndexStoreContext) -> Result<PagedIndexQueryResult> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    let index = multi_index::validate(mapping, &query.base)?;
    let query = apply_overrides(mapping, query, msg);

    let subset = (!query.base.client_side_subset_processing_required && query.page_num != 0).then(|| {
        let start = (query.page_num - 1).saturating_mul(query.page_size);
        (start, query.page_size)
    });
    multi_index::run(
        &query.base,
        index,
        query.max_merge_count(),
        subset,
        msg,
        ctx,
        &query_info(&query),
    )
}

fn query_info(query: &PagedIndexQuery) -> String {
    format!(
        "{}, PageNum: {}, PageSize: {}",
        multi_index::query_info(&query.base),
        query.page_num,
        query.page_size
    )
}

/// Server-side guards against unbounded full-page queries
fn apply_overrides(mapping: &IndexTypeMapping, query: &PagedIndexQuery, msg: &MessageContext) -> PagedIndexQuery {
    let settings = mapping.query_override_settings;
    let mut query = query.clone();

    if settings.max_items_per_index_threshold != 0
        && query.base.index_id_list.len() > 1
        && query.page_num == 0
        && query.base.index_id_params_mapping.is_empty()
        && query.base.max_items == 0
        && query.base.filter.is_none()
    {
        error!(
            "Encountered Potentially Bad Paged Query.  Overriding MaxItemsPerIndex to {}.  AddressHistory {}.  Original Query Info: {}",
            settings.max_items_per_index_threshold,
            multi_index::format_address_history(&msg.address_history),
            query_info(&query)
        );
        query.base.max_items = settings.max_items_per_index_threshold;
    }

    if settings.disable_full_page_query && query.page_num == 0 && query.page_size != 0 {
        info!(
            "Configuration rules require overriding PageNum to 1.  AddressHistory {}.  Original Query Info: {}",
            multi_index::format_address_history(&msg.address_history),
            query_info(&query)
        );
        query.page_num = 1;
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DataType;
    use crate::filter::{CapCondition, Condition, Filter, FilterCap, Operation};
    use crate::processors::test_support::*;
    use crate::query::{GetIndexHeaderType, IndexIdParams, MultiIndexIdQuery};
    use crate::sort::{SortBy, SortOrder, TagSort};

    fn seeded() -> Fixture {
        let fx = fixture();
        fx.save(&[1], &[(10, 100), (11, 300), (12, 500)]);
        fx.save(&[2], &[(20, 200), (21, 400), (22, 600)]);
        fx
    }

    fn paged(page_size: usize, page_num: usize) -> PagedIndexQuery {
        PagedIndexQuery {
            page_size,
            page_num,
            base: MultiIndexIdQuery {
                exclude_data: true,
                ..MultiIndexIdQuery::new(BY_DATE, vec![vec![1], vec![2], vec![3]])
            },
        }
    }

    #[test]
    fn test_pages_of_merged_result() {
        let fx = seeded();
        let msg = fx.msg(&[1]);

        let first = process(&paged(2, 1), &msg, &fx.ctx).unwrap();
        assert_eq!(item_ids(&first.result_items), vec![10, 20]);
        assert_eq!(first.total_count, 6);

        let second = process(&paged(2, 2), &msg, &fx.ctx).unwrap();
        assert_eq!(item_ids(&second.result_items), vec![11, 21]);

        let all = process(&paged(2, 0), &msg, &fx.ctx).unwrap();
        assert_eq!(item_ids(&all.result_items), vec![10, 20, 11, 21, 12, 22]);

        let beyond = process(&paged(2, 9), &msg, &fx.ctx).unwrap();
        assert!(beyond.result_items.is_empty());
        assert!(beyond.exception_info.is_none());
    }

    #[test]
    fn test_client_side_subset_returns_merge_bound() {
        let fx = seeded();
        let mut query = paged(2, 2);
        query.base.client_side_subset_processing_required = true;
        let result = process(&query, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(item_ids(&result.result_items), vec![10, 20, 11, 21]);
    }

    #[test]
    fn test_tag_sort_and_per_index_params() {
        let fx = seeded();
        let mut query = paged(10, 1);
        query.base.tag_sort = Some(TagSort::new(
            "date",
            true,
            SortOrder::new(DataType::Int64, SortBy::Desc),
        ));
        query.base.index_id_params_mapping.insert(
            vec![2],
            IndexIdParams {
                max_items: 1,
                filter: None,
            },
        );
        let result = process(&query, &fx.msg(&[1]), &fx.ctx).unwrap();
        // index 2 contributes only its first stored item
        assert_eq!(item_ids(&result.result_items), vec![12, 11, 20, 10]);
        assert_eq!(result.additional_available_item_count, 4);
    }

    #[test]
    fn test_filter_and_headers() {
        let fx = seeded();
        let mut query = paged(10, 1);
        query.base.filter = Some(Filter::Condition(Condition::tag(
            "kind",
            Operation::Equals,
            vec![0],
            DataType::Byte,
        )));
        query.base.get_index_header_type = GetIndexHeaderType::AllIndexIds;
        let result = process(&query, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(item_ids(&result.result_items), vec![10, 20, 12, 22]);
        assert_eq!(result.index_id_index_header_mapping.len(), 2);
        assert_eq!(result.index_id_index_header_mapping[&vec![1u8]].virtual_count, 3);

        query.base.get_index_header_type = GetIndexHeaderType::ResultItemsIndexIds;
        query.page_size = 1;
        let result = process(&query, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(result.index_id_index_header_mapping.len(), 1);
    }

    #[test]
    fn test_cap_condition_spans_indexes() {
        let fx = seeded();
        let mut query = paged(10, 1);
        query.base.cap_condition = Some(CapCondition::new(
            "kind",
            vec![FilterCap::new(vec![0], 1), FilterCap::new(vec![1], 1)],
        ));
        let result = process(&query, &fx.msg(&[1]), &fx.ctx).unwrap();
        // one even and one odd item across both indexes
        assert_eq!(item_ids(&result.result_items), vec![10, 11]);
    }

    #[test]
    fn test_tags_from_indexes_and_data() {
        let fx = seeded();
        let mut query = paged(2, 1);
        query.base.target_index_name = BY_ID.into();
        query.base.tags_from_indexes = vec![BY_DATE.into()];
        query.base.exclude_data = false;
        let result = process(&query, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(item_ids(&result.result_items), vec![10, 11]);
        for item in &result.result_items {
            assert!(item.tags.contains_key("date"));
            assert!(item.data.is_some());
        }
    }

    #[test]
    fn test_validation_failures_fold_into_result() {
        let fx = seeded();
        let mut query = paged(2, 1);
        query.base.primary_id_list = vec![1];
        let result = process(&query, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(
            result.exception_info.as_deref(),
            Some(" | PrimaryIdList.Count does not match with IndexIdList.Count")
        );

        query.base.index_id_list.clear();
        let result = process(&query, &fx.msg(&[1]), &fx.ctx).unwrap();
        assert!(result.exception_info.unwrap().contains("No IndexIdList"));
    }

    #[test]
    fn test_full_page_override() {
        let yaml = config_yaml().replace(
            "      max_result_items_threshold_log: 100\n",
            "      max_result_items_threshold_log: 100\n      max_items_per_index_threshold: 1\n      disable_full_page_query: true\n",
        );
        let fx = fixture_with(&yaml);
        fx.save(&[1], &[(10, 100), (11, 300)]);
        fx.save(&[2], &[(20, 200), (21, 400)]);

        // page 0 becomes page 1 and each index is bounded to one item
        let result = process(&paged(5, 0), &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(item_ids(&result.result_items), vec![10, 20]);
    }
}
