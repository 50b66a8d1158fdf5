//! Errors surfaced by the thing services.

use thing_types::{PropertyId, ThingId, TypeId, ValueError};

use crate::store::StoreError;

/// Result type alias
pub type ThingResult<T> = std::result::Result<T, ThingError>;

/// Error types
///
/// `Clone` so one failed export can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThingError {
    #[error("Thing not found: {0}")]
    ThingNotFound(ThingId),

    #[error("Property not found: {0}")]
    PropertyNotFound(PropertyId),

    #[error("Unknown property type: {0}")]
    UnknownType(TypeId),

    #[error(transparent)]
    DimensionMismatch(#[from] ValueError),

    #[error("Time-series store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ThingError {
    /// Whether this error means the referenced entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ThingError::ThingNotFound(_) | ThingError::PropertyNotFound(_)
        )
    }
}

impl From<StoreError> for ThingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ThingError::PropertyNotFound(id),
            StoreError::Unavailable(msg) => ThingError::StoreUnavailable(msg),
        }
    }
}
