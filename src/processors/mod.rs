//! Request processors
//!
//! One module per request shape. Queries fold request and data errors into
//! their result's `exception_info`; configuration defects are returned as
//! errors. Mutations hold the key lock of their primary id for the whole
//! fetch-mutate-store sequence.
//!
//! ```text
//! IndexStore ─┬─ queries ── get_range, first_last, random, contains,
//!             │             paged, span, intersection, remote
//!             ├─ save
//!             ├─ update ── filtered_index_delete
//!             ├─ delete, delete_all_in_type
//!             └─ get
//! ```

pub mod contains;
pub mod delete;
pub mod delete_all_in_type;
pub mod filtered_index_delete;
pub mod first_last;
pub mod get;
pub mod get_range;
pub mod index_store;
pub mod intersection;
pub mod multi_index;
pub mod paged;
pub mod random;
pub mod remote;
pub mod save;
pub mod span;
pub mod update;

#[cfg(test)]
mod test_support;

use tracing::error;

use crate::config::{Index, IndexTypeMapping};
use crate::error::{Error, Result};

pub use index_store::IndexStore;

/// Index definition named by a request
pub(crate) fn target_index<'a>(mapping: &'a IndexTypeMapping, name: &str) -> Result<&'a Index> {
    mapping.index(name).ok_or_else(|| Error::UnknownIndex {
        name: name.to_string(),
    })
}

/// Turns a failed query into the result `failed` builds from the error text.
/// Configuration defects are returned as errors.
pub(crate) fn fold_error<T>(
    type_id: i16,
    query: &str,
    outcome: Result<T>,
    failed: impl FnOnce(String) -> T,
) -> Result<T> {
    match outcome {
        Ok(result) => Ok(result),
        Err(e) if e.is_config_defect() => Err(e),
        Err(e) => {
            error!(type_id, error = %e, "TypeId {} -- Error processing {}", type_id, query);
            Ok(failed(e.to_string()))
        }
    }
}

/// Count as reported in results
pub(crate) fn size_i32(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}
