//! Routing metadata of one incoming request

use std::net::IpAddr;

use crate::codec::generate_primary_id;

/// Where a request came from and how far it may still travel
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageContext {
    pub type_id: i16,
    pub primary_id: i32,
    pub extended_id: Vec<u8>,
    /// Remaining hops; forwarding to the data tier needs a positive value
    pub relay_ttl: i16,
    pub source_zone: u16,
    pub address_history: Vec<IpAddr>,
}

impl MessageContext {
    /// Context for a request on `index_id`, keyed the way the relay keys it
    pub fn new(type_id: i16, index_id: &[u8]) -> Self {
        Self {
            type_id,
            primary_id: generate_primary_id(index_id),
            extended_id: index_id.to_vec(),
            relay_ttl: 1,
            source_zone: 0,
            address_history: Vec::new(),
        }
    }

    pub fn with_zone(mut self, source_zone: u16) -> Self {
        self.source_zone = source_zone;
        self
    }

    pub fn with_ttl(mut self, relay_ttl: i16) -> Self {
        self.relay_ttl = relay_ttl;
        self
    }
}
