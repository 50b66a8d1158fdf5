//! End-to-end scenarios across the entity model, liveness and menu.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thing_runtime::{
    EntryKind, InMemoryTimeSeriesStore, LivenessEngine, LivenessState, RedbTimeSeriesStore,
    ThingError, ThingService, TimeSeriesStore, build_menu,
};
use thing_types::{
    DEFAULT_CONNECTIVITY_TYPE, Dimension, Field, OwnerId, PropertyType, TypeId, TypeRegistry,
    Value, ValueError,
};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn registry() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::default();
    registry
        .register(
            PropertyType::new("temperature", "Temperature")
                .add_dimension(Dimension::number("celsius", "Celsius").with_unit("°C")),
        )
        .unwrap();
    Arc::new(registry)
}

async fn status_transitions(store: Arc<dyn TimeSeriesStore>) {
    let registry = registry();
    let things = ThingService::new(registry.clone(), store.clone());
    let engine = LivenessEngine::new(registry, store);

    let t1 = things.create_thing(OwnerId::new("alice"), "T1", "");
    let status = things
        .add_property(t1.id, "P_status", "", TypeId::from(DEFAULT_CONNECTIVITY_TYPE))
        .unwrap();
    things
        .add_property(t1.id, "P_temp", "", TypeId::from("temperature"))
        .unwrap();

    things
        .append_value(&status, Value::new(at(100), vec![Field::text("Connected")]))
        .await
        .unwrap();
    let t1 = things.get_thing(t1.id).unwrap();
    let live = engine.evaluate_at(&t1, at(105)).await;
    assert_eq!(live.state, LivenessState::Online);
    assert_eq!(live.as_of, Some(at(100)));

    things
        .append_value(&status, Value::new(at(200), vec![Field::text("Disconnected")]))
        .await
        .unwrap();
    let live = engine.evaluate_at(&t1, at(205)).await;
    assert_eq!(live.state, LivenessState::Offline);
    assert_eq!(live.as_of, Some(at(200)));
}

#[tokio::test]
async fn test_status_transitions_in_memory() {
    status_transitions(Arc::new(InMemoryTimeSeriesStore::new())).await;
}

#[tokio::test]
async fn test_status_transitions_redb() {
    let dir = tempfile::tempdir().unwrap();
    let store = RedbTimeSeriesStore::open(dir.path().join("values.redb")).unwrap();
    status_transitions(Arc::new(store)).await;
}

#[tokio::test]
async fn test_menu_for_thing_with_two_properties() {
    let things = ThingService::new(registry(), Arc::new(InMemoryTimeSeriesStore::new()));

    let t1 = things.create_thing(OwnerId::new("alice"), "T1", "");
    let status = things
        .add_property(t1.id, "P_status", "", TypeId::from(DEFAULT_CONNECTIVITY_TYPE))
        .unwrap();
    let temp = things
        .add_property(t1.id, "P_temp", "", TypeId::from("temperature"))
        .unwrap();

    let menu = build_menu(&[things.get_thing(t1.id).unwrap()]);
    let shape: Vec<_> = menu.iter().map(|e| (e.kind, e.path.clone())).collect();
    assert_eq!(
        shape,
        vec![
            (EntryKind::Thing, t1.id.to_string()),
            (EntryKind::Property, format!("{}/properties/{}", t1.id, status.id)),
            (EntryKind::Property, format!("{}/properties/{}", t1.id, temp.id)),
        ]
    );
}

#[tokio::test]
async fn test_mismatched_value_leaves_store_unchanged() {
    let store = Arc::new(InMemoryTimeSeriesStore::new());
    let things = ThingService::new(registry(), store.clone());

    let t1 = things.create_thing(OwnerId::new("alice"), "T1", "");
    let temp = things
        .add_property(t1.id, "P_temp", "", TypeId::from("temperature"))
        .unwrap();

    things
        .append_value(&temp, Value::new(at(1), vec![Field::from(21.5)]))
        .await
        .unwrap();
    let rejected = things
        .append_value(
            &temp,
            Value::new(at(2), vec![Field::from(22.0), Field::from(40.0)]),
        )
        .await;
    assert_eq!(
        rejected,
        Err(ThingError::DimensionMismatch(ValueError::DimensionMismatch {
            expected: 1,
            actual: 2,
        }))
    );

    let series = things.values_in_range(temp.id, at(0), at(10)).await.unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].timestamp, at(1));
}
