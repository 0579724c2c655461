//! Get: raw record of the first index of an index id

use bytes::Bytes;
use tracing::info;

use crate::codec::{form_extended_id, generate_primary_id};
use crate::context::{IndexStoreContext, MessageContext};
use crate::error::Result;
use crate::store::RelayMessage;

/// Index type a get addresses: the message type when it is mapped, else
/// the mapped type whose payloads live in the message type.
fn index_type(msg: &MessageContext, ctx: &IndexStoreContext) -> Option<i16> {
    let config = ctx.config();
    if config.index_type_mapping(msg.type_id).is_some() {
        return Some(msg.type_id);
    }
    config
        .type_settings
        .iter()
        .find(|s| s.related_index_type_id == Some(msg.type_id) && config.index_type_mapping(s.type_id).is_some())
        .map(|s| s.type_id)
}

/// Reads the record stored under suffix 0 for the index id carried as the
/// message's extended id. `None` when the type is unknown or nothing is
/// stored.
pub fn process(msg: &MessageContext, ctx: &IndexStoreContext) -> Result<Option<Bytes>> {
    let Some(type_id) = index_type(msg, ctx) else {
        info!("Invalid TypeID for GetMessage {}", msg.type_id);
        return Ok(None);
    };
    let index_id = msg.extended_id.as_slice();
    let mut get = RelayMessage::get(type_id, generate_primary_id(index_id), form_extended_id(index_id, 0));
    ctx.storage().handle_message(&mut get)?;
    get.payload.map(|payload| ctx.decode_payload(&payload)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::*;
    use crate::store::{CacheIndexInternal, InDeserializationContext};

    #[test]
    fn test_reads_first_index_record() {
        let fx = fixture();
        fx.save(&[1], &[(10, 100), (11, 200)]);

        let record = process(&fx.msg(&[1]), &fx.ctx).unwrap().unwrap();
        let index = fx.ctx.index_type_mapping(INDEX_TYPE).unwrap().index(BY_DATE).unwrap();
        let in_context = InDeserializationContext::new(INDEX_TYPE, &[1], index, fx.ctx.string_hashes().clone());
        let cii = CacheIndexInternal::deserialize(&record, in_context).unwrap();
        assert_eq!(cii.count(), 2);
    }

    #[test]
    fn test_related_type_resolves_to_index_type() {
        let fx = fixture();
        fx.save(&[1], &[(10, 100)]);
        let msg = MessageContext::new(DATA_TYPE, &[1]);
        assert!(process(&msg, &fx.ctx).unwrap().is_some());
    }

    #[test]
    fn test_unknown_type_and_missing_record() {
        let fx = fixture();
        assert_eq!(process(&MessageContext::new(42, &[1]), &fx.ctx).unwrap(), None);
        assert_eq!(process(&fx.msg(&[5]), &fx.ctx).unwrap(), None);
    }
}
