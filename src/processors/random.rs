//! Random: uniform sample of one index

use rand::Rng;

use super::{fold_error, size_i32, target_index};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::{RandomQuery, RandomQueryResult};
use crate::sort::random_positions;
use crate::store::adapter;
use crate::utils::{data_tier, index_server};

pub fn process(
    query: &RandomQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<RandomQueryResult> {
    process_with_rng(query, msg, ctx, &mut rand::rng())
}

/// [`process`] drawing positions from `rng`
pub fn process_with_rng<R: Rng + ?Sized>(
    query: &RandomQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
    rng: &mut R,
) -> Result<RandomQueryResult> {
    fold_error(msg.type_id, "RandomQuery", run(query, msg, ctx, rng), |info| {
        RandomQueryResult {
            exception_info: Some(info),
            ..Default::default()
        }
    })
}

fn run<R: Rng + ?Sized>(
    query: &RandomQuery,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
    rng: &mut R,
) -> Result<RandomQueryResult> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    let index = target_index(mapping, &query.target_index_name)?;
    if query.index_id.is_empty() {
        return Err(Error::invalid_request("No IndexId present on the RandomQuery"));
    }
    if query.count < 1 {
        return Err(Error::invalid_request("RandomQuery.Count should be greater than 0"));
    }

    let in_context = index_server::in_context(ctx, msg.type_id, &query.index_id, index)
        .with_filter(query.filter.clone(), true);
    let Some(cii) = index_server::get_cache_index_internal(ctx, msg.primary_id, index, in_context)?
    else {
        return Ok(RandomQueryResult::default());
    };

    let positions = random_positions(rng, cii.count(), query.count);
    let mut result = RandomQueryResult {
        index_exists: true,
        index_size: size_i32(cii.total_count()),
        virtual_count: cii.virtual_count(),
        result_items: adapter::result_items_at(&cii, positions, ctx.tag_hashes())?,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn query(count: usize) -> RandomQuery {
        RandomQuery {
            index_id: vec![1],
            target_index_name: BY_DATE.into(),
            count,
            exclude_data: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_sample_is_distinct_subset() {
        let fx = fixture();
        fx.save(&[1], &[(10, 100), (20, 200), (30, 300), (40, 400), (50, 500)]);

        let mut rng = SmallRng::seed_from_u64(11);
        let result = process_with_rng(&query(3), &fx.msg(&[1]), &fx.ctx, &mut rng).unwrap();
        let ids = item_ids(&result.result_items);
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(ids.iter().all(|id| [10, 20, 30, 40, 50].contains(id)));
    }

    #[test]
    fn test_count_beyond_size_returns_all() {
        let fx = fixture();
        fx.save(&[1], &[(10, 100), (20, 200)]);

        let result = process(&query(9), &fx.msg(&[1]), &fx.ctx).unwrap();
        assert_eq!(item_ids(&result.result_items), vec![10, 20]);
        assert_eq!(result.virtual_count, 2);
    }

    #[test]
    fn test_zero_count_rejected() {
        let fx = fixture();
        let result = process(&query(0), &fx.msg(&[1]), &fx.ctx).unwrap();
        assert!(result.exception_info.is_some());
    }
}
