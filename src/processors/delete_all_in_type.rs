//! DeleteAllInType: wipe every index of a type

use tracing::info;

use crate::context::{IndexStoreContext, MessageContext};
use crate::error::{Error, Result};
use crate::store::RelayMessage;
use crate::utils::data_tier;

/// Clears the type's indexes, its related payloads when forwarding, and
/// its interned tag and string hashes. Runs exclusive of every other
/// mutation.
pub fn process(msg: &MessageContext, ctx: &IndexStoreContext) -> Result<()> {
    // TODO: lock per type once the lock pool can be partitioned by type id
    let _guard = ctx.locking().lock_all();
    apply(msg, ctx).map_err(|e| Error::processing(msg.type_id, "delete all in type message", e))
}

fn apply(msg: &MessageContext, ctx: &IndexStoreContext) -> Result<()> {
    let mapping = ctx.index_type_mapping(msg.type_id)?;
    if data_tier::should_forward_to_data_tier(msg.relay_ttl, msg.source_zone, ctx.my_zone(), mapping.mode) {
        let related = data_tier::related_type_id(ctx, msg.type_id)?;
        ctx.forwarder()
            .handle_message(&mut RelayMessage::delete_all_in_type(related))?;
    }
    ctx.storage()
        .handle_message(&mut RelayMessage::delete_all_in_type(msg.type_id))?;
    ctx.remove_type(msg.type_id);
    info!(type_id = msg.type_id, "Deleted all indexes in type");
    Ok(())
}
