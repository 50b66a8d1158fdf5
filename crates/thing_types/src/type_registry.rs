//! Property Type Registry
//!
//! Resolves type ids to their shared `PropertyType` definitions. Types are
//! provisioned out of band and never change once registered, because
//! altering a type's dimensions would invalidate values already stored
//! against it.
//!
//! The registry also carries the connectivity configuration: which reserved
//! type marks a thing's status property, and which field value means
//! "online".

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

use crate::{Dimension, Field, PropertyType, TypeId};

// ─────────────────────────────────────────────────────────────────────────────
// Connectivity Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Reserved type id for MQTT connection status properties
pub const DEFAULT_CONNECTIVITY_TYPE: &str = "mqtt-connection-status";

/// Status value reported by devices while connected
pub const DEFAULT_ONLINE_VALUE: &str = "Connected";

/// Identifies the well-known connectivity status type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Type id whose properties carry connection status
    pub type_id: TypeId,
    /// Exact, case-sensitive value of field 0 meaning "online"
    pub online_value: String,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            type_id: TypeId::new(DEFAULT_CONNECTIVITY_TYPE),
            online_value: DEFAULT_ONLINE_VALUE.to_string(),
        }
    }
}

impl ConnectivityConfig {
    /// The built-in status type: a single string dimension
    pub fn status_type(&self) -> PropertyType {
        PropertyType::new(self.type_id.as_str(), "Connection status")
            .with_description("Last connection state reported by the device")
            .add_dimension(Dimension::string("status", "Status"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Type Registry Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur when working with the type registry
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeRegistryError {
    #[error("Type already exists: {0}")]
    TypeAlreadyExists(TypeId),
    #[error("Type not found: {0}")]
    TypeNotFound(TypeId),
    #[error("Invalid type definition: {0}")]
    InvalidDefinition(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Type Registry
// ─────────────────────────────────────────────────────────────────────────────

/// The central registry of property types
///
/// Thread-safe; share it behind an `Arc`.
pub struct TypeRegistry {
    /// All registered types by ID
    types: DashMap<TypeId, Arc<PropertyType>>,
    connectivity: ConnectivityConfig,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(ConnectivityConfig::default())
    }
}

impl TypeRegistry {
    /// Create a registry containing only the connectivity status type
    pub fn new(connectivity: ConnectivityConfig) -> Self {
        let types = DashMap::new();
        let status = connectivity.status_type();
        types.insert(status.id.clone(), Arc::new(status));

        Self {
            types,
            connectivity,
        }
    }

    /// Create a new type registry wrapped in an Arc
    pub fn new_shared(connectivity: ConnectivityConfig) -> Arc<Self> {
        Arc::new(Self::new(connectivity))
    }

    /// Register a new type
    ///
    /// Returns an error if a type with the same ID already exists or the
    /// definition has no dimensions or repeats a dimension id.
    pub fn register(&self, def: PropertyType) -> Result<(), TypeRegistryError> {
        validate(&def)?;

        match self.types.entry(def.id.clone()) {
            Entry::Occupied(_) => Err(TypeRegistryError::TypeAlreadyExists(def.id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(def));
                Ok(())
            }
        }
    }

    /// Get a type definition by ID
    pub fn get(&self, type_id: &TypeId) -> Result<Arc<PropertyType>, TypeRegistryError> {
        self.types
            .get(type_id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| TypeRegistryError::TypeNotFound(type_id.clone()))
    }

    /// Check if a type exists
    pub fn contains(&self, type_id: &TypeId) -> bool {
        self.types.contains_key(type_id)
    }

    /// Get all types, sorted by id
    pub fn all(&self) -> Vec<Arc<PropertyType>> {
        let mut types: Vec<_> = self.types.iter().map(|r| Arc::clone(r.value())).collect();
        types.sort_by(|a, b| a.id.cmp(&b.id));
        types
    }

    /// Get the number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn connectivity(&self) -> &ConnectivityConfig {
        &self.connectivity
    }

    /// Whether properties of this type carry connection status
    pub fn is_connectivity_indicator(&self, type_id: &TypeId) -> bool {
        *type_id == self.connectivity.type_id
    }

    /// Whether a status field means "online"
    ///
    /// Exact match against the configured value, no case or whitespace
    /// normalization.
    pub fn is_online_value(&self, field: &Field) -> bool {
        field.as_str() == Some(self.connectivity.online_value.as_str())
    }
}

fn validate(def: &PropertyType) -> Result<(), TypeRegistryError> {
    if def.id.as_str().is_empty() {
        return Err(TypeRegistryError::InvalidDefinition(
            "type id must not be empty".to_string(),
        ));
    }
    if def.dimensions.is_empty() {
        return Err(TypeRegistryError::InvalidDefinition(format!(
            "type {} has no dimensions",
            def.id
        )));
    }
    for (i, dim) in def.dimensions.iter().enumerate() {
        if def.dimensions[..i].iter().any(|d| d.id == dim.id) {
            return Err(TypeRegistryError::InvalidDefinition(format!(
                "type {} repeats dimension {}",
                def.id, dim.id
            )));
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
