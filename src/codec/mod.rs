//! Binary codec primitives
//!
//! - [`data_type`] - typed views over little-endian tag bytes
//! - [`hash`] - stable string hashing and storage key derivation
//! - [`reader`] - bounds-checked record reader and writer

pub mod data_type;
pub mod hash;
pub mod reader;

pub use data_type::{compare_typed, DataType};
pub use hash::{form_extended_id, generate_primary_id, string_hash};
pub use reader::{RecordReader, RecordWriter};
