//! Type Provisioning
//!
//! Property types are reference data installed out of band. They are read
//! from a TOML document at startup:
//!
//! ```toml
//! [[types]]
//! id = "temperature"
//! name = "Temperature"
//!
//! [[types.dimensions]]
//! id = "celsius"
//! name = "Celsius"
//! type = "number"
//! unit = "°C"
//! ```

use std::path::Path;

use serde::Deserialize;
use thing_types::{PropertyType, TypeRegistry, TypeRegistryError};
use tokio::fs;
use tracing::{debug, info};

/// Error type for type provisioning
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Failed to read types file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error(transparent)]
    Registry(#[from] TypeRegistryError),
}

#[derive(Debug, Deserialize)]
struct TypesFile {
    #[serde(default)]
    types: Vec<PropertyType>,
}

/// Parse a types document
pub fn parse_types(content: &str) -> Result<Vec<PropertyType>, ProvisionError> {
    let file: TypesFile = toml::from_str(content)?;
    Ok(file.types)
}

/// Register every type in `types` into `registry`
///
/// Stops at the first invalid or duplicate definition.
pub fn register_all(
    registry: &TypeRegistry,
    types: Vec<PropertyType>,
) -> Result<usize, ProvisionError> {
    let count = types.len();
    for def in types {
        debug!(type_id = %def.id, dimensions = def.arity(), "Registering type {}", def.name);
        registry.register(def)?;
    }
    Ok(count)
}

/// Load the types file at `path` into `registry`; returns how many were added
pub async fn load_types(
    path: impl AsRef<Path>,
    registry: &TypeRegistry,
) -> Result<usize, ProvisionError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).await?;
    let count = register_all(registry, parse_types(&content)?)?;

    info!("Provisioned {} property types from {}", count, path.display());
    Ok(count)
}
