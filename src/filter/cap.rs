//! Per-value admission caps

use serde::{Deserialize, Serialize};

use super::Filter;
use crate::sort::{Item, TagKey};

/// Admission budget for items whose capped tag equals `tag_value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCap {
    pub tag_value: Vec<u8>,
    pub cap: i32,
    #[serde(default)]
    pub filter: Option<Filter>,
    /// Evaluate the query's own filter instead of `filter`
    #[serde(default)]
    pub use_parent_filter: bool,
}

impl FilterCap {
    pub fn new(tag_value: Vec<u8>, cap: i32) -> Self {
        Self {
            tag_value,
            cap,
            filter: None,
            use_parent_filter: false,
        }
    }
}

/// Limits how many items per value of one tag a query may admit.
///
/// Budgets are consumed as items are admitted and carry over between the
/// indexes of one multi-index query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapCondition {
    pub field_name: String,
    #[serde(default)]
    pub filter_caps: Vec<FilterCap>,
}

/// Outcome of offering an item to a [`CapCondition`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapDecision<'a> {
    /// No cap covers the item; apply the query filter
    Uncapped,
    /// A cap covers the item; admit it if it passes this filter. `None`
    /// admits unconditionally.
    Capped(Option<&'a Filter>),
    /// The cap for the item's value is exhausted
    Exhausted,
}

impl CapCondition {
    pub fn new(field_name: impl Into<String>, filter_caps: Vec<FilterCap>) -> Self {
        Self {
            field_name: field_name.into(),
            filter_caps,
        }
    }

    /// True when at least one cap is configured
    pub fn is_active(&self) -> bool {
        !self.filter_caps.is_empty()
    }

    fn position<I: Item + ?Sized>(&self, item: &I) -> Option<usize> {
        let key = TagKey::new(self.field_name.as_str());
        let value = item.tag_value(&key)?;
        self.filter_caps.iter().position(|c| c.tag_value == value)
    }

    /// Decide how `item` is admitted. `parent` is the query's filter.
    pub fn decide<'a, I: Item + ?Sized>(
        &'a self,
        item: &I,
        parent: Option<&'a Filter>,
    ) -> (Option<usize>, CapDecision<'a>) {
        match self.position(item) {
            None => (None, CapDecision::Uncapped),
            Some(at) => {
                let cap = &self.filter_caps[at];
                if cap.cap <= 0 {
                    return (Some(at), CapDecision::Exhausted);
                }
                let filter = if cap.use_parent_filter {
                    parent
                } else {
                    cap.filter.as_ref()
                };
                (Some(at), CapDecision::Capped(filter))
            }
        }
    }

    /// Consume one unit of the cap at `at`
    pub fn consume(&mut self, at: usize) {
        if let Some(cap) = self.filter_caps.get_mut(at) {
            cap.cap -= 1;
        }
    }
}
