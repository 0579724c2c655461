//! FilteredIndexDelete: remove the items of one index that match a filter

use tracing::debug;

use super::target_index;
use crate::codec::{form_extended_id, generate_primary_id};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::query::FilteredIndexDeleteCommand;
use crate::store::RelayMessage;
use crate::utils::{data_tier, index_server};

pub fn process(
    command: &FilteredIndexDeleteCommand,
    msg: &MessageContext,
    ctx: &IndexStoreContext,
) -> Result<()> {
    let _guard = ctx.locking().lock_key(msg.primary_id);
    apply(command, msg, ctx).map_err(|e| Error::processing(msg.type_id, "filtered index delete", e))
}

fn apply(command: &FilteredIndexDeleteCommand, msg: &MessageContext, ctx: &IndexStoreContext) -> Result<()> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    let index = target_index(mapping, &command.target_index_name)?;
    let primary_id = generate_primary_id(&command.index_id);

    // the filter rejects the doomed items, which are collected aside
    let in_context = index_server::in_context(ctx, msg.type_id, &command.index_id, index)
        .with_filter(Some(command.delete_filter.clone()), false)
        .collecting_filtered();
    let Some(mut cii) = index_server::get_cache_index_internal(ctx, primary_id, index, in_context)? else {
        return Ok(());
    };

    let removed = cii.take_filtered_items();
    let dropped = cii.total_count().saturating_sub(cii.count());
    let dropped = i32::try_from(dropped).unwrap_or(i32::MAX);
    cii.set_virtual_count(cii.virtual_count().saturating_sub(dropped));
    debug!(
        type_id = msg.type_id,
        index_id = ?command.index_id,
        total = cii.total_count(),
        removed = removed.len(),
        "Filtered index delete"
    );

    let record = cii.serialize()?;
    ctx.storage().handle_message(&mut RelayMessage::save(
        msg.type_id,
        primary_id,
        form_extended_id(&command.index_id, index.extended_id_suffix),
        ctx.encode_payload(msg.type_id, &record),
    ))?;

    let forward =
        data_tier::should_forward_to_data_tier(msg.relay_ttl, msg.source_zone, ctx.my_zone(), mapping.mode);
    if forward && !removed.is_empty() {
        let related = data_tier::related_type_id(ctx, msg.type_id)?;
        let mut messages: Vec<_> =
            data_tier::full_data_ids(Some(&command.index_id), &removed, &mapping.full_data_id_fields)
                .into_iter()
                .flatten()
                .map(|id| RelayMessage::delete(related, generate_primary_id(&id), id))
                .collect();
        if !messages.is_empty() {
            ctx.forwarder().handle_messages(&mut messages)?;
        }
    }
    Ok(())
}
