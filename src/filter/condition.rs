//! Leaf predicates over raw tag bytes

use std::cmp::Ordering;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::codec::data_type::{read_integral, width_mask};
use crate::codec::DataType;
use crate::sort::{BaseComparer, Item, TagKey};

/// Comparison or bitwise test applied by a [`Condition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    LessThan,
    GreaterThan,
    LessThanEquals,
    GreaterThanEquals,
    Equals,
    NotEquals,
    BitwiseComplement,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseShiftLeft,
    BitwiseShiftRight,
}

/// Compares one field of an item (a tag, or the item id) against an operand.
///
/// Relational operators read as `field <op> value`. An absent field is the
/// smallest possible value, so `LessThan` passes and `GreaterThan` fails
/// against a missing tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field_name: String,
    #[serde(default)]
    pub is_tag: bool,
    pub operation: Operation,
    #[serde(default)]
    pub value: Vec<u8>,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub expected_bitwise_result: Option<Vec<u8>>,
    #[serde(default)]
    pub shift_by: u8,
    #[serde(skip)]
    key: OnceCell<TagKey>,
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.field_name == other.field_name
            && self.is_tag == other.is_tag
            && self.operation == other.operation
            && self.value == other.value
            && self.data_type == other.data_type
            && self.expected_bitwise_result == other.expected_bitwise_result
            && self.shift_by == other.shift_by
    }
}

impl Condition {
    /// Condition on a tag or the item id
    pub fn new(
        field_name: impl Into<String>,
        is_tag: bool,
        operation: Operation,
        value: Vec<u8>,
        data_type: DataType,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            is_tag,
            operation,
            value,
            data_type,
            expected_bitwise_result: None,
            shift_by: 0,
            key: OnceCell::new(),
        }
    }

    /// Shorthand for a tag condition
    pub fn tag(
        name: impl Into<String>,
        operation: Operation,
        value: Vec<u8>,
        data_type: DataType,
    ) -> Self {
        Self::new(name, true, operation, value, data_type)
    }

    /// Expected result of a bitwise operation
    pub fn with_expected(mut self, expected: Vec<u8>) -> Self {
        self.expected_bitwise_result = Some(expected);
        self
    }

    /// Shift distance for the shift operations
    pub fn with_shift(mut self, shift_by: u8) -> Self {
        self.shift_by = shift_by;
        self
    }

    fn key(&self) -> &TagKey {
        self.key.get_or_init(|| TagKey::new(self.field_name.as_str()))
    }

    /// The field this condition inspects on `item`
    pub fn field_value<'a, I: Item + ?Sized>(&self, item: &'a I) -> Option<&'a [u8]> {
        if self.is_tag {
            item.tag_value(self.key())
        } else {
            Some(item.item_id())
        }
    }

    /// Evaluate against an item
    pub fn evaluate<I: Item + ?Sized>(&self, item: &I) -> bool {
        self.process(self.field_value(item))
    }

    /// Evaluate against a raw field value
    pub fn process(&self, field: Option<&[u8]>) -> bool {
        match self.operation {
            Operation::Equals => field == Some(self.value.as_slice()),
            Operation::NotEquals => field != Some(self.value.as_slice()),
            Operation::LessThan => self.relation(field) == Ordering::Greater,
            Operation::LessThanEquals => self.relation(field) != Ordering::Less,
            Operation::GreaterThan => self.relation(field) == Ordering::Less,
            Operation::GreaterThanEquals => self.relation(field) != Ordering::Greater,
            _ => self.bitwise(field).unwrap_or(false),
        }
    }

    /// Orders the operand against the field
    fn relation(&self, field: Option<&[u8]>) -> Ordering {
        BaseComparer::ascending(self.data_type).compare(Some(&self.value), field)
    }

    fn bitwise(&self, field: Option<&[u8]>) -> Option<bool> {
        let dt = self.data_type;
        let item = read_integral(field?, dt)?;
        let operand = |bytes: Option<&[u8]>| match bytes {
            Some(b) if !b.is_empty() => read_integral(b, dt),
            _ => Some(0),
        };
        let value = operand(Some(&self.value))?;
        let expected = operand(self.expected_bitwise_result.as_deref())?;
        let mask = width_mask(dt);
        let shift = self.shift_by as u32;

        let (lhs, rhs) = match self.operation {
            Operation::BitwiseComplement => (!item, value),
            Operation::BitwiseAnd => (item & value, expected),
            Operation::BitwiseOr => (item | value, expected),
            Operation::BitwiseXor => (item ^ value, expected),
            Operation::BitwiseShiftLeft => (item.wrapping_shl(shift), expected),
            Operation::BitwiseShiftRight => (item.wrapping_shr(shift), expected),
            _ => return None,
        };
        Some(lhs & mask == rhs & mask)
    }
}
