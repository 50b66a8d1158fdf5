//! Time-Series Store
//!
//! Abstraction over value persistence. Implementations must serialize
//! appends per property and return every read sorted by timestamp.

mod memory;
mod redb_store;

pub use memory::InMemoryTimeSeriesStore;
pub use redb_store::RedbTimeSeriesStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thing_types::{PropertyId, Value};

/// Result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by a time-series store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The property has never received a value
    #[error("No values recorded for property {0}")]
    NotFound(PropertyId),

    /// Transient backend failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Storage backend for property value series
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Append a value; durable once this returns
    async fn append(&self, property: PropertyId, value: Value) -> StoreResult<()>;

    /// Up to `n` most recent values, newest first
    ///
    /// May fail with `NotFound` when the property has no values; callers must
    /// treat that exactly like an empty result.
    async fn latest(&self, property: PropertyId, n: usize) -> StoreResult<Vec<Value>>;

    /// Values with `from <= timestamp <= to`, oldest first
    async fn range(
        &self,
        property: PropertyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Value>>;

    /// Drop a property's whole series
    async fn delete_series(&self, property: PropertyId) -> StoreResult<()>;
}
