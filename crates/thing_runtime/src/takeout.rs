//! Takeout - full-account data export
//!
//! Collects every thing an owner registered, with each property's complete
//! value series. Exports are expensive and users tend to click twice, so
//! every export runs through a `SingleFlight` keyed by owner and session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thing_types::{OwnerId, PropertyId, ThingId, TypeId, Value};
use tracing::info;

use crate::error::ThingResult;
use crate::single_flight::{JobError, JobInfo, SingleFlight};
use crate::things::ThingService;

/// Exported property with its full series, oldest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyExport {
    pub id: PropertyId,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub type_id: TypeId,
    pub values: Vec<Value>,
}

/// Exported thing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThingExport {
    pub id: ThingId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub properties: Vec<PropertyExport>,
}

/// A complete export for one owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Takeout {
    pub owner: OwnerId,
    pub generated_at: DateTime<Utc>,
    pub things: Vec<ThingExport>,
}

impl Takeout {
    /// Total number of values across all properties
    pub fn value_count(&self) -> usize {
        self.things
            .iter()
            .flat_map(|t| &t.properties)
            .map(|p| p.values.len())
            .sum()
    }
}

/// Build an export of everything `owner` has registered
pub async fn collect(things: &ThingService, owner: &OwnerId) -> ThingResult<Takeout> {
    let mut exported = Vec::new();

    for thing in things.list_things(owner) {
        let mut properties = Vec::with_capacity(thing.properties.len());
        for property in thing.properties {
            let values = things
                .values_in_range(property.id, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
                .await?;
            properties.push(PropertyExport {
                id: property.id,
                name: property.name,
                description: property.description,
                type_id: property.type_id,
                values,
            });
        }

        exported.push(ThingExport {
            id: thing.id,
            name: thing.name,
            description: thing.description,
            created_at: thing.created_at,
            properties,
        });
    }

    Ok(Takeout {
        owner: owner.clone(),
        generated_at: Utc::now(),
        things: exported,
    })
}

/// Single-flight key of one owner's export
///
/// Session ids are client-supplied, so two owners may send the same one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionKey {
    pub owner: OwnerId,
    pub session: String,
}

impl SessionKey {
    pub fn new(owner: OwnerId, session: impl Into<String>) -> Self {
        Self {
            owner,
            session: session.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.session, self.owner)
    }
}

/// Export service with at most one export in flight per owner session
pub struct TakeoutService {
    things: Arc<ThingService>,
    flights: SingleFlight<SessionKey, Arc<Takeout>, crate::ThingError>,
}

impl TakeoutService {
    pub fn new(things: Arc<ThingService>) -> Self {
        Self {
            things,
            flights: SingleFlight::new(),
        }
    }

    /// Export `owner`'s data, joining an export already running for `session`
    pub async fn takeout(
        &self,
        session: impl Into<String>,
        owner: OwnerId,
    ) -> Result<Arc<Takeout>, JobError<crate::ThingError>> {
        let key = SessionKey::new(owner.clone(), session);
        let things = Arc::clone(&self.things);

        self.flights
            .run(key, move || async move {
                let takeout = collect(&things, &owner).await?;
                info!(
                    owner = %owner,
                    things = takeout.things.len(),
                    values = takeout.value_count(),
                    "Takeout collected"
                );
                Ok(Arc::new(takeout))
            })
            .await
    }

    /// Exports currently running
    pub fn in_flight(&self) -> Vec<JobInfo<SessionKey>> {
        self.flights.in_flight()
    }

    /// `owner`'s running exports
    pub fn in_flight_for(&self, owner: &OwnerId) -> Vec<JobInfo<SessionKey>> {
        self.in_flight()
            .into_iter()
            .filter(|job| job.key.owner == *owner)
            .collect()
    }
}
