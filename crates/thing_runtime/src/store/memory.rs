//! In-memory time-series store

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use thing_types::{PropertyId, Value};

use super::{StoreError, StoreResult, TimeSeriesStore};

/// Series kept sorted by timestamp; equal timestamps keep append order
type Series = Arc<Mutex<Vec<Value>>>;

/// In-memory implementation of TimeSeriesStore
///
/// Each property has its own mutex, so writers to one property never block
/// readers or writers of another.
#[derive(Default)]
pub struct InMemoryTimeSeriesStore {
    series: DashMap<PropertyId, Series>,
}

impl InMemoryTimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn series(&self, property: PropertyId) -> Option<Series> {
        self.series.get(&property).map(|s| Arc::clone(s.value()))
    }
}

#[async_trait]
impl TimeSeriesStore for InMemoryTimeSeriesStore {
    async fn append(&self, property: PropertyId, value: Value) -> StoreResult<()> {
        let series = Arc::clone(self.series.entry(property).or_default().value());

        let mut values = series.lock();
        let at = values.partition_point(|v| v.timestamp <= value.timestamp);
        values.insert(at, value);
        Ok(())
    }

    async fn latest(&self, property: PropertyId, n: usize) -> StoreResult<Vec<Value>> {
        let series = self.series(property).ok_or(StoreError::NotFound(property))?;
        let values = series.lock();
        Ok(values.iter().rev().take(n).cloned().collect())
    }

    async fn range(
        &self,
        property: PropertyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Value>> {
        let Some(series) = self.series(property) else {
            return Ok(Vec::new());
        };
        let values = series.lock();
        let start = values.partition_point(|v| v.timestamp < from);
        let end = values.partition_point(|v| v.timestamp <= to);
        Ok(values.get(start..end).map(<[Value]>::to_vec).unwrap_or_default())
    }

    async fn delete_series(&self, property: PropertyId) -> StoreResult<()> {
        self.series.remove(&property);
        Ok(())
    }
}
