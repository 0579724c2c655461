//! Predicate trees evaluated against index items
//!
//! A [`Filter`] is either a leaf [`Condition`] or an `And`/`Or` aggregate.
//! Aggregates evaluate their leaf conditions before their nested aggregates
//! and stop at the first child that decides the outcome.
//!
//! ```text
//! And ─┬─ Condition(date >= 100)      evaluated first
//!      ├─ Condition(kind == 3)        evaluated second
//!      └─ Or ─┬─ Condition(...)       only reached if both passed
//!             └─ Condition(...)
//! ```

pub mod cap;
pub mod condition;
pub mod index_condition;

use serde::{Deserialize, Serialize};

use crate::sort::Item;

pub use cap::{CapCondition, FilterCap};
pub use condition::{Condition, Operation};
pub use index_condition::IndexCondition;

/// Boolean predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Condition(Condition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// Combine filters with AND
    pub fn and(children: Vec<Filter>) -> Self {
        Filter::And(children)
    }

    /// Combine filters with OR
    pub fn or(children: Vec<Filter>) -> Self {
        Filter::Or(children)
    }

    /// Evaluate against an item
    pub fn evaluate<I: Item + ?Sized>(&self, item: &I) -> bool {
        match self {
            Filter::Condition(condition) => condition.evaluate(item),
            Filter::And(children) => evaluate_aggregate(item, children, false),
            Filter::Or(children) => evaluate_aggregate(item, children, true),
        }
    }
}

impl From<Condition> for Filter {
    fn from(condition: Condition) -> Self {
        Filter::Condition(condition)
    }
}

/// `short_circuit` is the value that decides the aggregate on its own:
/// `false` for AND, `true` for OR. An empty AND passes, an empty OR fails.
fn evaluate_aggregate<I: Item + ?Sized>(item: &I, children: &[Filter], short_circuit: bool) -> bool {
    let leaves = children
        .iter()
        .filter(|f| matches!(f, Filter::Condition(_)));
    let nested = children
        .iter()
        .filter(|f| !matches!(f, Filter::Condition(_)));

    for child in leaves.chain(nested) {
        if child.evaluate(item) == short_circuit {
            return short_circuit;
        }
    }
    !short_circuit
}

/// Evaluates `filter`, negating the outcome when `inclusive` is false.
pub fn process_filter<I: Item + ?Sized>(item: &I, filter: &Filter, inclusive: bool) -> bool {
    filter.evaluate(item) == inclusive
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DataType;
    use crate::sort::comparer::tests::TestItem;
    use proptest::prelude::*;

    fn num(name: &str, op: Operation, v: i32) -> Filter {
        Condition::tag(name, op, v.to_le_bytes().to_vec(), DataType::Int32).into()
    }

    fn item(a: i32, b: i32) -> TestItem {
        TestItem::new(&[1])
            .tag("a", &a.to_le_bytes())
            .tag("b", &b.to_le_bytes())
    }

    #[test]
    fn test_and_or() {
        let f = Filter::and(vec![
            num("a", Operation::GreaterThan, 5),
            Filter::or(vec![
                num("b", Operation::Equals, 1),
                num("b", Operation::Equals, 2),
            ]),
        ]);
        assert!(f.evaluate(&item(6, 2)));
        assert!(!f.evaluate(&item(6, 3)));
        assert!(!f.evaluate(&item(5, 1)));
    }

    #[test]
    fn test_empty_aggregates() {
        assert!(Filter::and(vec![]).evaluate(&item(0, 0)));
        assert!(!Filter::or(vec![]).evaluate(&item(0, 0)));
    }

    #[test]
    fn test_inclusive_flag() {
        let f = num("a", Operation::LessThan, 150);
        assert!(process_filter(&item(100, 0), &f, true));
        assert!(!process_filter(&item(100, 0), &f, false));
    }

    #[test]
    fn test_filter_serde() {
        let f = Filter::or(vec![num("a", Operation::Equals, 1)]);
        let json = serde_json::to_string(&f).unwrap();
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }

    fn ops() -> impl Strategy<Value = Operation> {
        prop_oneof![
            Just(Operation::LessThan),
            Just(Operation::GreaterThan),
            Just(Operation::LessThanEquals),
            Just(Operation::GreaterThanEquals),
            Just(Operation::Equals),
            Just(Operation::NotEquals),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Inclusive and exclusive evaluation are always negations
        #[test]
        fn prop_inclusive_is_negation(
            a in -20i32..20,
            b in -20i32..20,
            op1 in ops(),
            op2 in ops(),
            v1 in -20i32..20,
            v2 in -20i32..20,
            use_and in any::<bool>(),
        ) {
            let children = vec![num("a", op1, v1), num("b", op2, v2)];
            let f = if use_and { Filter::and(children) } else { Filter::or(children) };
            let it = item(a, b);
            prop_assert_eq!(process_filter(&it, &f, true), !process_filter(&it, &f, false));
        }
    }
}
