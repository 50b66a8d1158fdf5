//! Thing Types - Reference data and entity model for telemetry things
//!
//! This crate contains the pure data structures shared by the runtime and the
//! API server: property types and their dimensions, time-stamped values,
//! things and their properties, and the registry that resolves type ids.

mod entity;
mod type_registry;
mod types;
mod value;

pub use entity::*;
pub use type_registry::*;
pub use types::*;
pub use value::*;
