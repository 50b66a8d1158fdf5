//! Persistent time-series store backed by redb
//!
//! Values are keyed by (property id, unix seconds, subsecond nanos, sequence)
//! so a range scan over one property returns its series already sorted and
//! timestamps read back exactly as written. The sequence number keeps
//! samples sharing a timestamp in append order.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use thing_types::{Field, PropertyId, Value};

use super::{StoreError, StoreResult, TimeSeriesStore};

const VALUES_TABLE: TableDefinition<(&str, i64, u32, u64), &[u8]> =
    TableDefinition::new("values");

type Key<'a> = (&'a str, i64, u32, u64);

/// Every key of one property's series
fn series_bounds(pid: &str) -> std::ops::RangeInclusive<Key<'_>> {
    (pid, i64::MIN, 0, 0)..=(pid, i64::MAX, u32::MAX, u64::MAX)
}

/// Key prefix of an instant: whole seconds and the nanosecond remainder
fn instant(at: DateTime<Utc>) -> (i64, u32) {
    (at.timestamp(), at.timestamp_subsec_nanos())
}

/// Stored value format (timestamp lives in the key)
#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    f: Vec<Field>,
}

fn db_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// redb implementation of TimeSeriesStore
///
/// redb allows a single write transaction at a time, which serializes
/// appends to every property.
#[derive(Clone)]
pub struct RedbTimeSeriesStore {
    db: Arc<Database>,
}

impl RedbTimeSeriesStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(db_err)?;
            }
        }

        let db = Database::create(path)
            .map_err(|e| StoreError::Unavailable(format!("Failed to open database: {}", e)))?;

        // Ensure table exists
        let write_txn = db.begin_write().map_err(db_err)?;
        write_txn.open_table(VALUES_TABLE).map_err(db_err)?;
        write_txn.commit().map_err(db_err)?;

        tracing::info!(path = %path.display(), "Opened value store");

        Ok(Self { db: Arc::new(db) })
    }

    /// Run a blocking database operation off the async runtime
    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(db_err)?
    }
}

fn decode(secs: i64, nanos: u32, bytes: &[u8]) -> StoreResult<Value> {
    let stored: StoredValue = serde_json::from_slice(bytes).map_err(db_err)?;
    let timestamp = DateTime::from_timestamp(secs, nanos).ok_or_else(|| {
        StoreError::Unavailable(format!("Corrupt timestamp: {}s {}ns", secs, nanos))
    })?;
    Ok(Value::new(timestamp, stored.f))
}

#[async_trait]
impl TimeSeriesStore for RedbTimeSeriesStore {
    async fn append(&self, property: PropertyId, value: Value) -> StoreResult<()> {
        self.blocking(move |db| {
            let pid = property.to_string();
            let (secs, nanos) = instant(value.timestamp);
            let bytes = serde_json::to_vec(&StoredValue { f: value.fields }).map_err(db_err)?;

            let write_txn = db.begin_write().map_err(db_err)?;
            {
                let mut table = write_txn.open_table(VALUES_TABLE).map_err(db_err)?;
                let seq = match table
                    .range(
                        (pid.as_str(), secs, nanos, 0u64)..=(pid.as_str(), secs, nanos, u64::MAX),
                    )
                    .map_err(db_err)?
                    .next_back()
                {
                    Some(entry) => entry.map_err(db_err)?.0.value().3 + 1,
                    None => 0,
                };
                table
                    .insert((pid.as_str(), secs, nanos, seq), bytes.as_slice())
                    .map_err(db_err)?;
            }
            write_txn.commit().map_err(db_err)?;
            Ok(())
        })
        .await
    }

    async fn latest(&self, property: PropertyId, n: usize) -> StoreResult<Vec<Value>> {
        self.blocking(move |db| {
            let pid = property.to_string();
            let read_txn = db.begin_read().map_err(db_err)?;
            let table = read_txn.open_table(VALUES_TABLE).map_err(db_err)?;

            let range = table.range(series_bounds(&pid)).map_err(db_err)?;

            let mut values = Vec::new();
            for entry in range.rev().take(n) {
                let (key, bytes) = entry.map_err(db_err)?;
                let (_, secs, nanos, _) = key.value();
                values.push(decode(secs, nanos, bytes.value())?);
            }

            if values.is_empty() && n > 0 {
                return Err(StoreError::NotFound(property));
            }
            Ok(values)
        })
        .await
    }

    async fn range(
        &self,
        property: PropertyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Value>> {
        if from > to {
            return Ok(Vec::new());
        }

        self.blocking(move |db| {
            let pid = property.to_string();
            let (from_secs, from_nanos) = instant(from);
            let (to_secs, to_nanos) = instant(to);
            let start = (pid.as_str(), from_secs, from_nanos, 0u64);
            let end = (pid.as_str(), to_secs, to_nanos, u64::MAX);

            let read_txn = db.begin_read().map_err(db_err)?;
            let table = read_txn.open_table(VALUES_TABLE).map_err(db_err)?;

            let mut values = Vec::new();
            for entry in table.range(start..=end).map_err(db_err)? {
                let (key, bytes) = entry.map_err(db_err)?;
                let (_, secs, nanos, _) = key.value();
                values.push(decode(secs, nanos, bytes.value())?);
            }
            Ok(values)
        })
        .await
    }

    async fn delete_series(&self, property: PropertyId) -> StoreResult<()> {
        self.blocking(move |db| {
            let pid = property.to_string();
            let write_txn = db.begin_write().map_err(db_err)?;
            {
                let mut table = write_txn.open_table(VALUES_TABLE).map_err(db_err)?;
                let keys = table
                    .range(series_bounds(&pid))
                    .map_err(db_err)?
                    .map(|entry| {
                        entry.map(|(key, _)| {
                            let (_, secs, nanos, seq) = key.value();
                            (secs, nanos, seq)
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(db_err)?;

                for (secs, nanos, seq) in keys {
                    table.remove((pid.as_str(), secs, nanos, seq)).map_err(db_err)?;
                }
            }
            write_txn.commit().map_err(db_err)?;
            Ok(())
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn status(secs: i64, s: &str) -> Value {
        Value::new(DateTime::from_timestamp(secs, 0).unwrap(), vec![Field::text(s)])
    }

    #[tokio::test]
    async fn test_append_and_query() {
        let dir = tempdir().unwrap();
        let store = RedbTimeSeriesStore::open(dir.path().join("values.redb")).unwrap();
        let p = PropertyId::new();

        store.append(p, status(200, "Disconnected")).await.unwrap();
        store.append(p, status(100, "Connected")).await.unwrap();

        let latest = store.latest(p, 1).await.unwrap();
        assert_eq!(latest, vec![status(200, "Disconnected")]);

        let all = store
            .range(
                p,
                DateTime::from_timestamp(0, 0).unwrap(),
                DateTime::from_timestamp(1000, 0).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(all, vec![status(100, "Connected"), status(200, "Disconnected")]);
    }

    #[tokio::test]
    async fn test_series_are_isolated() {
        let dir = tempdir().unwrap();
        let store = RedbTimeSeriesStore::open(dir.path().join("values.redb")).unwrap();
        let a = PropertyId::new();
        let b = PropertyId::new();

        store.append(a, status(1, "Connected")).await.unwrap();
        assert!(matches!(store.latest(b, 5).await, Err(StoreError::NotFound(_))));

        store.delete_series(a).await.unwrap();
        assert!(matches!(store.latest(a, 5).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_append_order() {
        let dir = tempdir().unwrap();
        let store = RedbTimeSeriesStore::open(dir.path().join("values.redb")).unwrap();
        let p = PropertyId::new();

        store.append(p, status(5, "Connected")).await.unwrap();
        store.append(p, status(5, "Disconnected")).await.unwrap();

        let latest = store.latest(p, 2).await.unwrap();
        assert_eq!(latest, vec![status(5, "Disconnected"), status(5, "Connected")]);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("values.redb");
        let p = PropertyId::new();

        {
            let store = RedbTimeSeriesStore::open(&path).unwrap();
            store.append(p, status(42, "Connected")).await.unwrap();
        }

        let store = RedbTimeSeriesStore::open(&path).unwrap();
        assert_eq!(store.latest(p, 1).await.unwrap(), vec![status(42, "Connected")]);
    }

    #[tokio::test]
    async fn test_nanosecond_timestamps_read_back_exactly() {
        let dir = tempdir().unwrap();
        let store = RedbTimeSeriesStore::open(dir.path().join("values.redb")).unwrap();
        let p = PropertyId::new();

        let at = |nanos: u32| DateTime::from_timestamp(100, nanos).unwrap();
        let later = Value::new(at(123_456_789), vec![Field::text("Connected")]);
        let earlier = Value::new(at(123_456_001), vec![Field::text("Disconnected")]);
        store.append(p, later.clone()).await.unwrap();
        store.append(p, earlier.clone()).await.unwrap();

        assert_eq!(store.latest(p, 1).await.unwrap(), vec![later.clone()]);
        assert_eq!(
            store.range(p, at(0), at(999_999_999)).await.unwrap(),
            vec![earlier.clone(), later.clone()]
        );

        // Bounds are exact, not rounded to the microsecond
        assert_eq!(
            store.range(p, at(123_456_790), at(999_999_999)).await.unwrap(),
            Vec::<Value>::new()
        );
        assert_eq!(
            store.range(p, at(123_456_002), at(123_456_789)).await.unwrap(),
            vec![later]
        );
    }

    #[tokio::test]
    async fn test_full_range_bounds() {
        let dir = tempdir().unwrap();
        let store = RedbTimeSeriesStore::open(dir.path().join("values.redb")).unwrap();
        let p = PropertyId::new();
        store.append(p, status(-5, "Connected")).await.unwrap();
        store.append(p, status(5, "Disconnected")).await.unwrap();

        let all = store
            .range(p, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
            .await
            .unwrap();
        assert_eq!(all, vec![status(-5, "Connected"), status(5, "Disconnected")]);
    }
}
