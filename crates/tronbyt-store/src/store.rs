//! The record-store contract
//!
//! A deliberately small surface: keyed JSON rows grouped into tables, with
//! equality/null/range predicates and an atomic conditional update. This is
//! the entire persistence contract the pairing core relies on.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store answered but refused the request
    #[error("store rejected request: {0}")]
    Rejected(String),

    /// A row did not match the expected shape
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for tronbyt_core::Error {
    fn from(err: StoreError) -> Self {
        tronbyt_core::Error::StoreUnavailable(err.to_string())
    }
}

/// A single-column predicate on a table
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals value
    Eq(&'static str, Value),
    /// Column is SQL null (or absent)
    IsNull(&'static str),
    /// Column is strictly greater than value
    Gt(&'static str, Value),
}

impl Filter {
    /// Equality predicate from anything serializable as a JSON value
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(column, value.into())
    }

    /// Null predicate
    pub fn is_null(column: &'static str) -> Self {
        Filter::IsNull(column)
    }

    /// Greater-than predicate
    pub fn gt(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Gt(column, value.into())
    }

    /// The column this filter constrains
    pub fn column(&self) -> &'static str {
        match self {
            Filter::Eq(c, _) | Filter::IsNull(c) | Filter::Gt(c, _) => c,
        }
    }
}

/// Keyed, transactionally-consistent record persistence
///
/// All methods are fallible; callers in the claim flow translate failures
/// into business-visible rejections, never panics.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a row, or replace the row sharing the same conflict key.
    ///
    /// `conflict_key` names the column to merge on, or a comma-separated
    /// list for a composite key; `None` means the table's primary key
    /// (`id`).
    async fn upsert(
        &self,
        table: &str,
        record: Value,
        conflict_key: Option<&str>,
    ) -> StoreResult<Value>;

    /// Fetch all rows matching every filter (conjunction).
    async fn find(&self, table: &str, filters: &[Filter]) -> StoreResult<Vec<Value>>;

    /// Atomically patch all rows matching every filter.
    ///
    /// Returns the number of rows affected. Implementations must evaluate
    /// the predicate and apply the patch as one indivisible step; the claim
    /// flow depends on "update where claimed_by is null" admitting exactly
    /// one winner under concurrency.
    async fn conditional_update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> StoreResult<u64>;

    /// Delete all rows matching every filter, returning how many went away.
    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<u64>;
}
