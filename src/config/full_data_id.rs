//! Composition of data-tier keys from index items

use serde::{Deserialize, Serialize};

use crate::codec::DataType;
use crate::error::{Error, Result};
use crate::sort::TagKey;

/// How the parts of a list are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FullDataIdPartFormat {
    /// Parts are concatenated in order
    #[default]
    #[serde(alias = "sequential")]
    Sequential,
    /// Two parts are ordered by value, smaller first
    #[serde(alias = "minmax", alias = "minMax")]
    MinMax,
}

/// Source of one part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FullDataIdType {
    IndexId,
    ItemId,
    Tag(TagKey),
}

/// One part of a full data id.
///
/// A part with nested `parts` is built from them; otherwise it names its
/// source with `part_name` (`IndexId`, `ItemId`, or a tag name when
/// `is_tag` is set). `offset`, `count` and `data_type` matter for
/// [`FullDataIdPartFormat::MinMax`] lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FullDataIdField {
    #[serde(default)]
    pub format: FullDataIdPartFormat,
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub is_tag: bool,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub parts: Vec<FullDataIdField>,
}

impl FullDataIdField {
    pub fn index_id() -> Self {
        Self {
            part_name: "IndexId".into(),
            ..Default::default()
        }
    }

    pub fn item_id() -> Self {
        Self {
            part_name: "ItemId".into(),
            ..Default::default()
        }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            part_name: name.into(),
            is_tag: true,
            ..Default::default()
        }
    }

    /// Resolve the source of this part
    pub fn kind(&self) -> Result<FullDataIdType> {
        if self.is_tag {
            return Ok(FullDataIdType::Tag(TagKey::new(self.part_name.as_str())));
        }
        match self.part_name.to_ascii_lowercase().as_str() {
            "indexid" => Ok(FullDataIdType::IndexId),
            "itemid" => Ok(FullDataIdType::ItemId),
            _ => Err(Error::InvalidConfig(format!(
                "FullDataIdPart.PartName {} must be IndexId or ItemId when IsTag is false",
                self.part_name
            ))),
        }
    }

    /// True when this part or any nested part draws on the index id
    pub fn uses_index_id(&self) -> bool {
        if !self.parts.is_empty() {
            return self.parts.iter().any(|p| p.uses_index_id());
        }
        matches!(self.kind(), Ok(FullDataIdType::IndexId))
    }
}

/// Validates a full data id list
pub fn validate_parts(type_id: i16, parts: &[FullDataIdField]) -> Result<()> {
    if parts.is_empty() {
        return Ok(());
    }
    for part in parts {
        if !part.parts.is_empty() {
            validate_parts(type_id, &part.parts)?;
            continue;
        }
        part.kind()
            .map_err(|e| Error::InvalidConfig(format!("TypeId - {}, {}", type_id, e)))?;
        if let Some(size) = part.data_type.size() {
            if size != part.count {
                return Err(Error::InvalidConfig(format!(
                    "TypeId - {}, FullDataIdPart.PartName : {}, DataType {} has size {} which does not match Count {}",
                    type_id, part.part_name, part.data_type, size, part.count
                )));
            }
        }
    }

    if parts[0].format == FullDataIdPartFormat::MinMax {
        if parts.len() != 2 {
            return Err(Error::InvalidConfig(format!(
                "TypeId - {}, MinMax FullDataIdPart list needs exactly 2 parts, found {}",
                type_id,
                parts.len()
            )));
        }
        let mut problems = Vec::new();
        if parts[0].data_type != parts[1].data_type {
            problems.push(format!(
                "MinMax FullDataIdPart 1 DataType : {} does not match with MinMax FullDataIdPart 2 DataType : {}",
                parts[0].data_type, parts[1].data_type
            ));
        }
        if parts[0].count != parts[1].count {
            problems.push(format!(
                "MinMax FullDataIdPart 1 Count : {} does not match with MinMax FullDataIdPart 2 Count : {}",
                parts[0].count, parts[1].count
            ));
        }
        if !problems.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "TypeId - {}, {}",
                type_id,
                problems.join("; ")
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_kinds() {
        assert_eq!(FullDataIdField::index_id().kind().unwrap(), FullDataIdType::IndexId);
        assert_eq!(FullDataIdField::item_id().kind().unwrap(), FullDataIdType::ItemId);
        assert_matches!(FullDataIdField::tag("uid").kind().unwrap(), FullDataIdType::Tag(_));
        assert!(FullDataIdField {
            part_name: "bogus".into(),
            ..Default::default()
        }
        .kind()
        .is_err());
    }

    #[test]
    fn test_fixed_size_must_match_count() {
        let mut part = FullDataIdField::tag("uid");
        part.data_type = DataType::Int32;
        part.count = 2;
        assert_matches!(validate_parts(1, &[part]), Err(Error::InvalidConfig(_)));
    }

    #[test]
    fn test_min_max_validation() {
        let mut a = FullDataIdField::tag("a");
        a.format = FullDataIdPartFormat::MinMax;
        a.data_type = DataType::Int32;
        a.count = 4;
        let mut b = FullDataIdField::tag("b");
        b.data_type = DataType::Int32;
        b.count = 4;
        assert!(validate_parts(1, &[a.clone(), b.clone()]).is_ok());

        b.data_type = DataType::Int16;
        b.count = 2;
        assert!(validate_parts(1, &[a, b]).is_err());
    }

    #[test]
    fn test_uses_index_id() {
        let nested = FullDataIdField {
            parts: vec![FullDataIdField::item_id(), FullDataIdField::index_id()],
            ..Default::default()
        };
        assert!(nested.uses_index_id());
        assert!(!FullDataIdField::item_id().uses_index_id());
    }
}
