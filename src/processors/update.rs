//! Update: dispatch of in-place index commands

use tracing::debug;

use super::filtered_index_delete;
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::Result;
use crate::query::{CacheIndexUpdate, Command};

pub fn process(update: &CacheIndexUpdate, msg: &MessageContext, ctx: &IndexStoreContext) -> Result<()> {
    match &update.command {
        Command::FilteredIndexDelete(command) => {
            debug!(type_id = msg.type_id, index_name = %command.target_index_name, "FilteredIndexDelete");
            filtered_index_delete::process(command, msg, ctx)
        }
    }
}
