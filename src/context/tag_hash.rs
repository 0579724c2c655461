//! Tag name interning

use std::path::Path;

use super::intern::InternTable;
use crate::codec::string_hash;
use crate::error::{Error, Result};

/// Maps tag names to the 32-bit codes stored in index records, per type.
///
/// Entries are only ever added, except when a whole type is dropped.
pub struct TagHashCollection {
    table: InternTable,
}

impl TagHashCollection {
    /// Collection persisted to `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            table: InternTable::open("tag_hash", path)?,
        })
    }

    /// Collection kept only in memory
    pub fn in_memory() -> Self {
        Self {
            table: InternTable::in_memory("tag_hash"),
        }
    }

    /// Hash code of a tag name
    pub fn tag_hash_code(tag_name: &str) -> i32 {
        string_hash(tag_name)
    }

    /// Registers a tag name for a type, returning its hash code
    pub fn add_tag(&self, type_id: i16, tag_name: &str) -> i32 {
        self.table.intern(type_id, tag_name)
    }

    /// Name registered for a hash code
    pub fn tag_name(&self, type_id: i16, hash: i32) -> Result<String> {
        self.table
            .lookup(type_id, hash)
            .ok_or(Error::TagHashNotFound { type_id, hash })
    }

    /// Writes the collection to its file, if it has one
    pub fn persist(&self) {
        self.table.persist();
    }

    /// Drops every tag of a type
    pub fn remove_type(&self, type_id: i16) {
        self.table.remove_type(type_id);
    }

    /// Number of tags registered for a type
    pub fn tag_count(&self, type_id: i16) -> usize {
        self.table.len(type_id)
    }
}

impl Default for TagHashCollection {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_add_and_resolve() {
        let tags = TagHashCollection::in_memory();
        let hash = tags.add_tag(3, "date");
        assert_eq!(hash, TagHashCollection::tag_hash_code("date"));
        assert_eq!(tags.tag_name(3, hash).unwrap(), "date");
        assert_matches!(tags.tag_name(4, hash), Err(Error::TagHashNotFound { .. }));
    }
}
