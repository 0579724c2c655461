//! Interning of string-hashed tag values

use std::path::Path;

use super::intern::InternTable;
use crate::codec::string_hash;
use crate::error::{Error, Result};

/// Maps string tag values to 4-byte codes so that index records store a
/// fixed-width hash instead of the text.
#[derive(Debug)]
pub struct StringHashCollection {
    table: InternTable,
}

impl StringHashCollection {
    /// Collection persisted to `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            table: InternTable::open("string_hash", path)?,
        })
    }

    /// Collection kept only in memory
    pub fn in_memory() -> Self {
        Self {
            table: InternTable::in_memory("string_hash"),
        }
    }

    /// Registers a string value, returning its little-endian hash bytes.
    /// Values that are not valid UTF-8 are rejected.
    pub fn add_string(&self, type_id: i16, value: &[u8]) -> Result<[u8; 4]> {
        let text = utf8(value)?;
        Ok(self.table.intern(type_id, text).to_le_bytes())
    }

    /// Hash bytes of a string value without registering it
    pub fn hash_code_bytes(value: &[u8]) -> Result<[u8; 4]> {
        Ok(string_hash(utf8(value)?).to_le_bytes())
    }

    /// Original bytes of a registered value
    pub fn get_string_bytes(&self, type_id: i16, hash_bytes: &[u8]) -> Result<Vec<u8>> {
        let raw: [u8; 4] = hash_bytes.try_into().map_err(|_| {
            Error::decode(format!(
                "string hash must be 4 bytes, found {}",
                hash_bytes.len()
            ))
        })?;
        let hash = i32::from_le_bytes(raw);
        self.table
            .lookup(type_id, hash)
            .map(String::into_bytes)
            .ok_or(Error::StringHashNotFound { type_id, hash })
    }

    /// Writes the collection to its file, if it has one
    pub fn persist(&self) {
        self.table.persist();
    }

    /// Drops every value of a type
    pub fn remove_type(&self, type_id: i16) {
        self.table.remove_type(type_id);
    }
}

fn utf8(value: &[u8]) -> Result<&str> {
    std::str::from_utf8(value).map_err(|e| {
        Error::invalid_request(format!(
            "string hashed tag value {:?} is not valid UTF-8: {}",
            value, e
        ))
    })
}

impl Default for StringHashCollection {
    fn default() -> Self {
        Self::in_memory()
    }
}
