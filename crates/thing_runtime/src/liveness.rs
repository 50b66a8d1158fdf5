//! Liveness Engine
//!
//! Derives whether a thing is online from the most recent sample of its
//! connectivity status property. There is no heartbeat channel: the last
//! status value a device wrote is the only signal, so the engine is a pure
//! read-side interpreter of (latest sample, current time) and keeps no state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thing_types::{Property, Thing, ThingId, TypeRegistry, Value};
use tracing::{debug, warn};

use crate::relative_time::humanize;
use crate::store::{StoreError, TimeSeriesStore};

/// Derived connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessState {
    Online,
    Offline,
    Unknown,
}

impl std::fmt::Display for LivenessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LivenessState::Online => write!(f, "online"),
            LivenessState::Offline => write!(f, "offline"),
            LivenessState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Liveness of one thing at the time it was evaluated
///
/// Never stored; recompute it whenever it is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessStatus {
    pub thing_id: ThingId,
    pub state: LivenessState,
    /// Timestamp of the status sample the state was derived from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
    /// `as_of` rendered relative to evaluation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_relative: Option<String>,
}

impl LivenessStatus {
    pub fn unknown(thing_id: ThingId) -> Self {
        Self {
            thing_id,
            state: LivenessState::Unknown,
            as_of: None,
            human_relative: None,
        }
    }
}

/// Classifies things as online, offline or unknown
#[derive(Clone)]
pub struct LivenessEngine {
    registry: Arc<TypeRegistry>,
    store: Arc<dyn TimeSeriesStore>,
}

impl LivenessEngine {
    pub fn new(registry: Arc<TypeRegistry>, store: Arc<dyn TimeSeriesStore>) -> Self {
        Self { registry, store }
    }

    /// First property whose type is the connectivity indicator
    pub fn status_property<'a>(&self, thing: &'a Thing) -> Option<&'a Property> {
        thing
            .properties
            .iter()
            .find(|p| self.registry.is_connectivity_indicator(&p.type_id))
    }

    /// Classify a thing from its latest status sample
    ///
    /// Field 0 of the status type carries the connection state. Only an
    /// exact match of the configured online value counts as online.
    pub fn classify(
        &self,
        thing_id: ThingId,
        sample: Option<&Value>,
        now: DateTime<Utc>,
    ) -> LivenessStatus {
        let Some(sample) = sample else {
            return LivenessStatus::unknown(thing_id);
        };

        let online = sample
            .primary()
            .is_some_and(|field| self.registry.is_online_value(field));

        LivenessStatus {
            thing_id,
            state: if online {
                LivenessState::Online
            } else {
                LivenessState::Offline
            },
            as_of: Some(sample.timestamp),
            human_relative: Some(humanize(sample.timestamp, now)),
        }
    }

    /// Evaluate a thing against the current time
    pub async fn evaluate(&self, thing: &Thing) -> LivenessStatus {
        self.evaluate_at(thing, Utc::now()).await
    }

    /// Evaluate a thing against the given instant
    ///
    /// Store failures are downgraded to `Unknown` for this thing only.
    pub async fn evaluate_at(&self, thing: &Thing, now: DateTime<Utc>) -> LivenessStatus {
        let Some(property) = self.status_property(thing) else {
            debug!(thing_id = %thing.id, "No connectivity property");
            return LivenessStatus::unknown(thing.id);
        };

        match self.store.latest(property.id, 1).await {
            Ok(values) => self.classify(thing.id, values.first(), now),
            Err(StoreError::NotFound(_)) => LivenessStatus::unknown(thing.id),
            Err(e) => {
                warn!(
                    thing_id = %thing.id,
                    property_id = %property.id,
                    "Status lookup failed, reporting unknown: {}",
                    e
                );
                LivenessStatus::unknown(thing.id)
            }
        }
    }

    /// Evaluate every thing; one result per input, in input order
    pub async fn evaluate_all(&self, things: &[Thing]) -> Vec<LivenessStatus> {
        let now = Utc::now();
        join_all(things.iter().map(|thing| self.evaluate_at(thing, now))).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryTimeSeriesStore, StoreResult};
    use async_trait::async_trait;
    use thing_types::{DEFAULT_CONNECTIVITY_TYPE, Field, OwnerId, PropertyId, TypeId};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn thing_with_status() -> (Thing, PropertyId) {
        let mut thing = Thing::new(OwnerId::new("alice"), "Sensor", "");
        let status = Property::new(thing.id, "status", "", TypeId::from(DEFAULT_CONNECTIVITY_TYPE));
        let temp = Property::new(thing.id, "temp", "", TypeId::from("temperature"));
        let status_id = status.id;
        thing.push_property(temp);
        thing.push_property(status);
        (thing, status_id)
    }

    fn engine(store: Arc<dyn TimeSeriesStore>) -> LivenessEngine {
        LivenessEngine::new(Arc::new(TypeRegistry::default()), store)
    }

    /// Store that fails every call for one property
    struct FlakyStore {
        inner: InMemoryTimeSeriesStore,
        broken: PropertyId,
    }

    #[async_trait]
    impl TimeSeriesStore for FlakyStore {
        async fn append(&self, property: PropertyId, value: Value) -> StoreResult<()> {
            self.inner.append(property, value).await
        }

        async fn latest(&self, property: PropertyId, n: usize) -> StoreResult<Vec<Value>> {
            if property == self.broken {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            self.inner.latest(property, n).await
        }

        async fn range(
            &self,
            property: PropertyId,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> StoreResult<Vec<Value>> {
            self.inner.range(property, from, to).await
        }

        async fn delete_series(&self, property: PropertyId) -> StoreResult<()> {
            self.inner.delete_series(property).await
        }
    }

    #[tokio::test]
    async fn test_no_status_property_is_unknown() {
        let engine = engine(Arc::new(InMemoryTimeSeriesStore::new()));
        let mut thing = Thing::new(OwnerId::new("alice"), "Sensor", "");
        thing.push_property(Property::new(thing.id, "temp", "", TypeId::from("temperature")));

        let status = engine.evaluate(&thing).await;
        assert_eq!(status, LivenessStatus::unknown(thing.id));
    }

    #[tokio::test]
    async fn test_empty_series_is_unknown() {
        let engine = engine(Arc::new(InMemoryTimeSeriesStore::new()));
        let (thing, _) = thing_with_status();

        let status = engine.evaluate(&thing).await;
        assert_eq!(status.state, LivenessState::Unknown);
        assert!(status.as_of.is_none());
    }

    #[tokio::test]
    async fn test_status_property_found_anywhere_in_list() {
        let engine = engine(Arc::new(InMemoryTimeSeriesStore::new()));
        let (thing, status_id) = thing_with_status();
        assert_eq!(engine.status_property(&thing).map(|p| p.id), Some(status_id));
    }

    #[tokio::test]
    async fn test_connected_is_online() {
        let store = Arc::new(InMemoryTimeSeriesStore::new());
        let engine = engine(store.clone());
        let (thing, status_id) = thing_with_status();

        store
            .append(status_id, Value::new(at(100), vec![Field::text("Connected")]))
            .await
            .unwrap();

        let status = engine.evaluate_at(&thing, at(280)).await;
        assert_eq!(status.state, LivenessState::Online);
        assert_eq!(status.as_of, Some(at(100)));
        assert_eq!(status.human_relative.as_deref(), Some("3 minutes ago"));
    }

    #[tokio::test]
    async fn test_anything_else_is_offline() {
        let store = Arc::new(InMemoryTimeSeriesStore::new());
        let engine = engine(store.clone());
        let (thing, status_id) = thing_with_status();

        for (secs, reported) in [(1, "Disconnected"), (2, "connected"), (3, "Connected ")] {
            store
                .append(status_id, Value::new(at(secs), vec![Field::text(reported)]))
                .await
                .unwrap();
            let status = engine.evaluate_at(&thing, at(10)).await;
            assert_eq!(status.state, LivenessState::Offline, "reported {:?}", reported);
            assert_eq!(status.as_of, Some(at(secs)));
        }
    }

    #[test]
    fn test_classify_is_deterministic() {
        let engine = engine(Arc::new(InMemoryTimeSeriesStore::new()));
        let id = ThingId::new();
        let sample = Value::new(at(100), vec![Field::text("Connected")]);

        let a = engine.classify(id, Some(&sample), at(105));
        let b = engine.classify(id, Some(&sample), at(105));
        assert_eq!(a, b);
        assert_eq!(engine.classify(id, None, at(105)), LivenessStatus::unknown(id));
    }

    #[tokio::test]
    async fn test_batch_survives_store_failure() {
        let (healthy, healthy_status) = thing_with_status();
        let (broken, broken_status) = thing_with_status();
        let bare = Thing::new(OwnerId::new("alice"), "Bare", "");

        let store = Arc::new(FlakyStore {
            inner: InMemoryTimeSeriesStore::new(),
            broken: broken_status,
        });
        store
            .append(healthy_status, Value::now(vec![Field::text("Connected")]))
            .await
            .unwrap();
        let engine = engine(store);

        let statuses = engine
            .evaluate_all(&[broken.clone(), healthy.clone(), bare.clone()])
            .await;

        let summary: Vec<_> = statuses.iter().map(|s| (s.thing_id, s.state)).collect();
        assert_eq!(
            summary,
            vec![
                (broken.id, LivenessState::Unknown),
                (healthy.id, LivenessState::Online),
                (bare.id, LivenessState::Unknown),
            ]
        );
    }

    #[test]
    fn test_status_serializes_lowercase_state() {
        let status = LivenessStatus::unknown(ThingId::new());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "unknown");
        assert!(json.get("as_of").is_none());
    }
}
