//! Delete: drop every index of an index id, and the payloads they name

use tracing::debug;

use crate::codec::{form_extended_id, generate_primary_id};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::store::RelayMessage;
use crate::utils::{data_tier, index_server};

/// Deletes the indexes of the index id carried as the message's extended id
pub fn process(msg: &MessageContext, ctx: &IndexStoreContext) -> Result<()> {
    let _guard = ctx.locking().lock_key(msg.primary_id);
    apply(msg, ctx).map_err(|e| Error::processing(msg.type_id, "delete message", e))
}

fn apply(msg: &MessageContext, ctx: &IndexStoreContext) -> Result<()> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    let index_id = msg.extended_id.as_slice();
    let forward =
        data_tier::should_forward_to_data_tier(msg.relay_ttl, msg.source_zone, ctx.my_zone(), mapping.mode);

    let mut data_messages = Vec::new();
    let mut index_messages = Vec::with_capacity(mapping.indexes.len() + 1);
    if mapping.metadata_stored_separately {
        index_messages.push(RelayMessage::delete(msg.type_id, msg.primary_id, index_id.to_vec()));
    }

    for index in &mapping.indexes {
        let Some(cii) = index_server::fetch_full(ctx, msg.type_id, msg.primary_id, index_id, index)? else {
            continue;
        };
        if forward {
            let related = data_tier::related_type_id(ctx, msg.type_id)?;
            for id in data_tier::full_data_ids(Some(index_id), cii.items(), &mapping.full_data_id_fields)
                .into_iter()
                .flatten()
            {
                data_messages.push(RelayMessage::delete(related, generate_primary_id(&id), id));
            }
        }
        index_messages.push(RelayMessage::delete(
            msg.type_id,
            msg.primary_id,
            form_extended_id(index_id, index.extended_id_suffix),
        ));
    }

    debug!(
        type_id = msg.type_id,
        index_id = ?index_id,
        indexes = index_messages.len(),
        payloads = data_messages.len(),
        "Deleting index"
    );
    if !data_messages.is_empty() {
        ctx.forwarder().handle_messages(&mut data_messages)?;
    }
    if !index_messages.is_empty() {
        ctx.storage().handle_messages(&mut index_messages)?;
    }
    Ok(())
}
