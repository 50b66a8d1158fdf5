//! Things and their properties
//!
//! A thing exclusively owns an ordered list of properties. Each property
//! references one shared property type by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TypeId;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier of a thing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThingId(pub Uuid);

impl ThingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ThingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ThingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Globally unique identifier of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub Uuid);

impl PropertyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PropertyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PropertyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identity of the actor that registered a thing (the bearer token subject)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Property
// ─────────────────────────────────────────────────────────────────────────────

/// A named, typed time series belonging to exactly one thing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Shared type describing the field layout of this property's values
    #[serde(rename = "type")]
    pub type_id: TypeId,
    pub thing_id: ThingId,
}

impl Property {
    pub fn new(
        thing_id: ThingId,
        name: impl Into<String>,
        description: impl Into<String>,
        type_id: TypeId,
    ) -> Self {
        Self {
            id: PropertyId::new(),
            name: name.into(),
            description: description.into(),
            type_id,
            thing_id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Thing
// ─────────────────────────────────────────────────────────────────────────────

/// A registered device or virtual entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    pub id: ThingId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: OwnerId,
    pub created_at: DateTime<Utc>,
    /// Properties in insertion order
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Thing {
    pub fn new(owner_id: OwnerId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: ThingId::new(),
            name: name.into(),
            description: description.into(),
            owner_id,
            created_at: Utc::now(),
            properties: Vec::new(),
        }
    }

    /// Get a property by id
    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }

    /// Add a property, keeping ids unique within the thing
    ///
    /// Returns false if a property with the same id is already present.
    pub fn push_property(&mut self, property: Property) -> bool {
        if self.property(property.id).is_some() {
            return false;
        }
        self.properties.push(property);
        true
    }

    /// Remove a property, preserving the order of the rest
    pub fn remove_property(&mut self, id: PropertyId) -> Option<Property> {
        let index = self.properties.iter().position(|p| p.id == id)?;
        Some(self.properties.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_keep_insertion_order() {
        let mut thing = Thing::new(OwnerId::new("alice"), "Boiler", "");
        let a = Property::new(thing.id, "status", "", TypeId::from("status"));
        let b = Property::new(thing.id, "temp", "", TypeId::from("temperature"));
        let c = Property::new(thing.id, "humidity", "", TypeId::from("humidity"));
        assert!(thing.push_property(a.clone()));
        assert!(thing.push_property(b.clone()));
        assert!(thing.push_property(c.clone()));

        assert!(thing.remove_property(b.id).is_some());
        let names: Vec<_> = thing.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["status", "humidity"]);
    }

    #[test]
    fn test_duplicate_property_id_rejected() {
        let mut thing = Thing::new(OwnerId::new("alice"), "Boiler", "");
        let p = Property::new(thing.id, "status", "", TypeId::from("status"));
        assert!(thing.push_property(p.clone()));
        assert!(!thing.push_property(p));
        assert_eq!(thing.properties.len(), 1);
    }

    #[test]
    fn test_ids_parse_from_display() {
        let id = ThingId::new();
        let parsed: ThingId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<PropertyId>().is_err());
    }
}
