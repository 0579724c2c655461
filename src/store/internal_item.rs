//! Stored form of an index entry

use crate::sort::{Item, TagKey};

/// An index entry as kept inside a [`CacheIndexInternal`](super::CacheIndexInternal).
///
/// Tags are keyed by the hash code of their name; values are raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InternalItem {
    pub item_id: Vec<u8>,
    pub tags: Vec<(i32, Vec<u8>)>,
}

impl InternalItem {
    pub fn new(item_id: impl Into<Vec<u8>>) -> Self {
        Self {
            item_id: item_id.into(),
            tags: Vec::new(),
        }
    }

    /// Value stored under a tag hash code
    pub fn tag_by_hash(&self, hash: i32) -> Option<&[u8]> {
        self.tags
            .iter()
            .find(|(h, _)| *h == hash)
            .map(|(_, v)| v.as_slice())
    }

    /// Replaces the value of a tag in place, or appends the tag
    pub fn update_tag(&mut self, hash: i32, value: Vec<u8>) {
        match self.tags.iter_mut().rev().find(|(h, _)| *h == hash) {
            Some(slot) => slot.1 = value,
            None => self.tags.push((hash, value)),
        }
    }

    /// Builder form of [`InternalItem::update_tag`] keyed by tag name
    pub fn with_tag(mut self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        self.update_tag(TagKey::new(name).hash, value.into());
        self
    }
}

impl Item for InternalItem {
    fn item_id(&self) -> &[u8] {
        &self.item_id
    }

    fn tag_value(&self, key: &TagKey) -> Option<&[u8]> {
        self.tag_by_hash(key.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_tag_keeps_position() {
        let mut item = InternalItem::new(vec![1])
            .with_tag("a", vec![1])
            .with_tag("b", vec![2]);
        item.update_tag(TagKey::new("a").hash, vec![9]);
        item.update_tag(TagKey::new("c").hash, vec![3]);

        assert_eq!(item.tags.len(), 3);
        assert_eq!(item.tags[0].1, vec![9]);
        assert_eq!(item.tag_value(&TagKey::new("c")), Some(&[3u8][..]));
        assert_eq!(item.tag_value(&TagKey::new("d")), None);
    }
}
