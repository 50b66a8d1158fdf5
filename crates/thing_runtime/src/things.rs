//! Thing Service
//!
//! Owns the thing/property entity model and validates every value against
//! its property's type before handing it to the time-series store.
//!
//! Each thing carries a gate: appends hold it shared, deletions hold it
//! exclusively. A deletion removes value series before the entity, so a
//! failed delete leaves the entity in place, and an append never lands in a
//! series whose property is gone.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thing_types::{OwnerId, Property, PropertyId, Thing, ThingId, TypeId, TypeRegistry, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ThingError, ThingResult};
use crate::store::{StoreError, TimeSeriesStore};

/// A stored thing plus its creation sequence number
struct ThingRecord {
    seq: u64,
    thing: Thing,
    gate: Arc<RwLock<()>>,
}

/// Entity model service for things, properties and their values
pub struct ThingService {
    registry: Arc<TypeRegistry>,
    store: Arc<dyn TimeSeriesStore>,
    things: DashMap<ThingId, ThingRecord>,
    next_seq: AtomicU64,
}

impl ThingService {
    pub fn new(registry: Arc<TypeRegistry>, store: Arc<dyn TimeSeriesStore>) -> Self {
        Self {
            registry,
            store,
            things: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn TimeSeriesStore> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Things
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a new thing with no properties
    pub fn create_thing(
        &self,
        owner: OwnerId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Thing {
        let thing = Thing::new(owner, name, description);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.things.insert(
            thing.id,
            ThingRecord {
                seq,
                thing: thing.clone(),
                gate: Arc::default(),
            },
        );

        info!(thing_id = %thing.id, owner = %thing.owner_id, "Created thing {}", thing.name);
        thing
    }

    /// Get a snapshot of a thing
    pub fn get_thing(&self, id: ThingId) -> ThingResult<Thing> {
        self.things
            .get(&id)
            .map(|r| r.thing.clone())
            .ok_or(ThingError::ThingNotFound(id))
    }

    /// All things registered by `owner`, in creation order
    pub fn list_things(&self, owner: &OwnerId) -> Vec<Thing> {
        let mut records: Vec<_> = self
            .things
            .iter()
            .filter(|r| r.thing.owner_id == *owner)
            .map(|r| (r.seq, r.thing.clone()))
            .collect();
        records.sort_by_key(|(seq, _)| *seq);
        records.into_iter().map(|(_, thing)| thing).collect()
    }

    /// Delete a thing, its properties and their value series
    ///
    /// On a store failure the thing stays registered.
    pub async fn delete_thing(&self, id: ThingId) -> ThingResult<Thing> {
        let gate = self.gate(id)?;
        let _exclusive = gate.write().await;

        let properties = self.list_properties(id)?;
        for property in &properties {
            self.store.delete_series(property.id).await?;
        }

        let (_, record) = self.things.remove(&id).ok_or(ThingError::ThingNotFound(id))?;
        info!(
            thing_id = %id,
            properties = record.thing.properties.len(),
            "Deleted thing {}",
            record.thing.name
        );
        Ok(record.thing)
    }

    /// The thing's gate, without holding the map entry
    fn gate(&self, id: ThingId) -> ThingResult<Arc<RwLock<()>>> {
        self.things
            .get(&id)
            .map(|r| Arc::clone(&r.gate))
            .ok_or(ThingError::ThingNotFound(id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Properties
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a property of type `type_id` to a thing
    ///
    /// Fails with `UnknownType` if the registry cannot resolve `type_id`.
    pub fn add_property(
        &self,
        thing_id: ThingId,
        name: impl Into<String>,
        description: impl Into<String>,
        type_id: TypeId,
    ) -> ThingResult<Property> {
        if !self.registry.contains(&type_id) {
            return Err(ThingError::UnknownType(type_id));
        }

        let mut record = self
            .things
            .get_mut(&thing_id)
            .ok_or(ThingError::ThingNotFound(thing_id))?;

        let property = Property::new(thing_id, name, description, type_id);
        record.thing.push_property(property.clone());

        debug!(
            thing_id = %thing_id,
            property_id = %property.id,
            type_id = %property.type_id,
            "Added property {}",
            property.name
        );
        Ok(property)
    }

    /// Get one property of a thing
    pub fn get_property(&self, thing_id: ThingId, property_id: PropertyId) -> ThingResult<Property> {
        let record = self
            .things
            .get(&thing_id)
            .ok_or(ThingError::ThingNotFound(thing_id))?;
        record
            .thing
            .property(property_id)
            .cloned()
            .ok_or(ThingError::PropertyNotFound(property_id))
    }

    /// A thing's properties in insertion order
    pub fn list_properties(&self, thing_id: ThingId) -> ThingResult<Vec<Property>> {
        self.things
            .get(&thing_id)
            .map(|r| r.thing.properties.clone())
            .ok_or(ThingError::ThingNotFound(thing_id))
    }

    /// Remove a property and delete its value series
    ///
    /// On a store failure the property stays on the thing.
    pub async fn remove_property(
        &self,
        thing_id: ThingId,
        property_id: PropertyId,
    ) -> ThingResult<Property> {
        let gate = self.gate(thing_id)?;
        let _exclusive = gate.write().await;

        self.get_property(thing_id, property_id)?;
        self.store.delete_series(property_id).await?;

        let property = self
            .things
            .get_mut(&thing_id)
            .and_then(|mut record| record.thing.remove_property(property_id))
            .ok_or(ThingError::PropertyNotFound(property_id))?;
        debug!(thing_id = %thing_id, property_id = %property_id, "Removed property");
        Ok(property)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Values
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate a value against the property's type and append it
    ///
    /// `property` only names the target; the thing's current property is
    /// looked up under its gate, so an append racing a removal either lands
    /// before the series is deleted or fails with `PropertyNotFound`. A
    /// rejected value never reaches the store.
    pub async fn append_value(&self, property: &Property, value: Value) -> ThingResult<()> {
        let gate = self
            .gate(property.thing_id)
            .map_err(|_| ThingError::PropertyNotFound(property.id))?;
        let _shared = gate.read().await;

        let property = self
            .get_property(property.thing_id, property.id)
            .map_err(|_| ThingError::PropertyNotFound(property.id))?;
        let property_type = self
            .registry
            .get(&property.type_id)
            .map_err(|_| ThingError::UnknownType(property.type_id.clone()))?;
        property_type.check(&value)?;

        self.store.append(property.id, value).await?;
        debug!(property_id = %property.id, "Appended value");
        Ok(())
    }

    /// Up to `n` most recent values, newest first; empty if none recorded
    pub async fn latest_values(&self, property: PropertyId, n: usize) -> ThingResult<Vec<Value>> {
        match self.store.latest(property, n).await {
            Ok(values) => Ok(values),
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Values recorded in `[from, to]`, oldest first
    pub async fn values_in_range(
        &self,
        property: PropertyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ThingResult<Vec<Value>> {
        match self.store.range(property, from, to).await {
            Ok(values) => Ok(values),
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
