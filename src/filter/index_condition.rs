//! Range bounds on an index's primary sort field

use serde::{Deserialize, Serialize};

use super::{Condition, Operation};
use crate::sort::{SortBy, SortOrder};

/// Inclusive value range on the primary sort field.
///
/// Because the index is sorted on that field, the range becomes an *enter*
/// condition (skip items until it first passes) and an *exit* condition
/// (stop scanning once it fails).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexCondition {
    #[serde(default)]
    pub inclusive_max_value: Option<Vec<u8>>,
    #[serde(default)]
    pub inclusive_min_value: Option<Vec<u8>>,
}

impl IndexCondition {
    pub fn new(inclusive_min_value: Option<Vec<u8>>, inclusive_max_value: Option<Vec<u8>>) -> Self {
        Self {
            inclusive_max_value,
            inclusive_min_value,
        }
    }

    /// Returns `(enter, exit)` conditions for an index sorted by `sort_order`
    pub fn create_conditions(
        &self,
        field_name: &str,
        is_tag: bool,
        sort_order: &SortOrder,
    ) -> (Option<Condition>, Option<Condition>) {
        let bound = |value: &Option<Vec<u8>>, op: Operation| {
            value
                .as_ref()
                .filter(|v| !v.is_empty())
                .map(|v| Condition::new(field_name, is_tag, op, v.clone(), sort_order.data_type))
        };

        // descending scans meet the max first
        let enter = bound(&self.inclusive_max_value, Operation::LessThanEquals);
        let exit = bound(&self.inclusive_min_value, Operation::GreaterThanEquals);
        match sort_order.sort_by {
            SortBy::Desc => (enter, exit),
            SortBy::Asc => (exit, enter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DataType;

    #[test]
    fn test_ascending_swaps_bounds() {
        let ic = IndexCondition::new(Some(vec![1]), Some(vec![9]));
        let (enter, exit) =
            ic.create_conditions("d", true, &SortOrder::new(DataType::Byte, SortBy::Asc));
        let enter = enter.unwrap();
        let exit = exit.unwrap();
        assert_eq!(enter.operation, Operation::GreaterThanEquals);
        assert_eq!(enter.value, vec![1]);
        assert_eq!(exit.operation, Operation::LessThanEquals);
        assert_eq!(exit.value, vec![9]);
    }

    #[test]
    fn test_descending_and_open_bounds() {
        let ic = IndexCondition::new(None, Some(vec![9]));
        let (enter, exit) =
            ic.create_conditions("d", true, &SortOrder::new(DataType::Byte, SortBy::Desc));
        assert_eq!(enter.unwrap().operation, Operation::LessThanEquals);
        assert!(exit.is_none());
    }
}
