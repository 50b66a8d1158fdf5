//! Property types and their dimensions
//!
//! A property type describes the positional layout of every value recorded
//! against a property: one field per dimension, in dimension order.

use serde::{Deserialize, Serialize};

use crate::{Field, Value, ValueError};

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier of a property type (e.g., "mqtt-connection-status", "temperature")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub String);

impl TypeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scalar Types
// ─────────────────────────────────────────────────────────────────────────────

/// Scalar type carried by a single dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Number,
    String,
}

impl ScalarType {
    /// Check whether a field's runtime type matches this scalar type
    pub fn accepts(&self, field: &Field) -> bool {
        matches!(
            (self, field),
            (ScalarType::Number, Field::Number(_)) | (ScalarType::String, Field::Text(_))
        )
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarType::Number => write!(f, "number"),
            ScalarType::String => write!(f, "string"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dimension
// ─────────────────────────────────────────────────────────────────────────────

/// One positional field of a property type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Unit label (e.g., "°C", "%"); empty for unitless dimensions
    #[serde(default)]
    pub unit: String,
    #[serde(rename = "type")]
    pub scalar_type: ScalarType,
}

impl Dimension {
    /// Create a numeric dimension
    pub fn number(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            scalar_type: ScalarType::Number,
        }
    }

    /// Create a string dimension
    pub fn string(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            scalar_type: ScalarType::String,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Property Type
// ─────────────────────────────────────────────────────────────────────────────

/// Shared schema for the values of many properties
///
/// Dimension order defines the field layout of every recorded value, so a
/// type is never mutated once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyType {
    pub id: TypeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub dimensions: Vec<Dimension>,
}

impl PropertyType {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TypeId::new(id),
            name: name.into(),
            description: String::new(),
            dimensions: Vec::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Append a dimension
    pub fn add_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    /// Number of fields every value of this type carries
    pub fn arity(&self) -> usize {
        self.dimensions.len()
    }

    /// Validate that a value conforms to this type's layout
    pub fn check(&self, value: &Value) -> Result<(), ValueError> {
        if value.fields.len() != self.dimensions.len() {
            return Err(ValueError::DimensionMismatch {
                expected: self.dimensions.len(),
                actual: value.fields.len(),
            });
        }

        for (index, (dimension, field)) in self.dimensions.iter().zip(&value.fields).enumerate() {
            if !dimension.scalar_type.accepts(field) {
                return Err(ValueError::FieldTypeMismatch {
                    index,
                    expected: dimension.scalar_type,
                });
            }
        }

        Ok(())
    }
}
