//! Span: `span` items of the merged multi-index result from `offset`

use super::{fold_error, multi_index};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::result::append_exception;
use crate::query::{SpanQuery, SpanQueryResult};

pub fn process(query: &SpanQuery, msg: &MessageContext, ctx: &IndexStoreContext) -> Result<SpanQueryResult> {
    fold_error(msg.type_id, "SpanQuery", run(query, msg, ctx), |info| {
        let mut failed = SpanQueryResult::default();
        append_exception(&mut failed.exception_info, &info);
        failed
    })
}

fn run(query: &SpanQuery, msg: &MessageContext, ctx: &IndexStoreContext) -> Result<SpanQueryResult> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    let index = multi_index::validate(mapping, &query.base)?;
    if query.offset < 1 && query.span != 0 {
        return Err(Error::invalid_request(
            "SpanQuery.Offset should be greater than zero except when SpanQuery.Span is zero",
        ));
    }

    let subset = (!query.base.client_side_subset_processing_required && query.span != 0)
        .then(|| (query.offset - 1, query.span));
    let info = format!(
        "{}, Span: {}, Offset: {}",
        multi_index::query_info(&query.base),
        query.span,
        query.offset
    );
    multi_index::run(&query.base, index, query.max_merge_count(), subset, msg, ctx, &info)
}
