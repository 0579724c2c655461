//! Runtime context: interning tables, key locks, request routing metadata
//! and the shared [`IndexStoreContext`].

mod intern;
pub mod locking;
pub mod message;
pub mod store_context;
pub mod string_hash;
pub mod tag_hash;

pub use locking::{KeyGuard, LockingUtil};
pub use message::MessageContext;
pub use store_context::IndexStoreContext;
pub use string_hash::StringHashCollection;
pub use tag_hash::TagHashCollection;
