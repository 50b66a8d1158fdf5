//! Time-stamped samples recorded against a property
//!
//! A value is a positional record: `fields[i]` belongs to the i-th dimension
//! of the property's type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ScalarType;

/// A single field of a value
///
/// Serialized untagged so a value's fields read as a plain JSON array,
/// e.g. `["Connected"]` or `[21.5, 40]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Number(f64),
    Text(String),
}

impl Field {
    pub fn text(s: impl Into<String>) -> Self {
        Field::Text(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Text(s) => Some(s),
            Field::Number(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Field::Number(n) => Some(*n),
            Field::Text(_) => None,
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Field::Number(_) => ScalarType::Number,
            Field::Text(_) => ScalarType::String,
        }
    }
}

impl From<f64> for Field {
    fn from(n: f64) -> Self {
        Field::Number(n)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Text(s.to_string())
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Number(n) => write!(f, "{}", n),
            Field::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One time-stamped sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub timestamp: DateTime<Utc>,
    pub fields: Vec<Field>,
}

impl Value {
    pub fn new(timestamp: DateTime<Utc>, fields: Vec<Field>) -> Self {
        Self { timestamp, fields }
    }

    /// Create a value stamped with the current time
    pub fn now(fields: Vec<Field>) -> Self {
        Self::new(Utc::now(), fields)
    }

    /// First field, which carries the primary reading by convention
    pub fn primary(&self) -> Option<&Field> {
        self.fields.first()
    }
}

/// Errors raised when a value does not fit its property's type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("Dimension mismatch: expected {expected} fields, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Field {index} must be a {expected}")]
    FieldTypeMismatch { index: usize, expected: ScalarType },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_serialize_as_plain_array() {
        let value = Value::new(
            DateTime::from_timestamp(100, 0).unwrap(),
            vec![Field::text("Connected"), Field::Number(3.5)],
        );
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["fields"], serde_json::json!(["Connected", 3.5]));

        let back: Value = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_primary_is_first_field() {
        let value = Value::now(vec![Field::text("Disconnected")]);
        assert_eq!(value.primary().and_then(Field::as_str), Some("Disconnected"));
        assert!(Value::now(vec![]).primary().is_none());
    }
}
