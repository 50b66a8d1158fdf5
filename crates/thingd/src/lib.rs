//! thingd - IoT thing registry server
//!
//! This crate provides the application around `thing_runtime`:
//! - Layered configuration (defaults, TOML file, environment)
//! - Out-of-band provisioning of property types
//! - Bearer-token HTTP API over things, values, liveness and takeout

// Configuration
pub mod config;

// Property type provisioning
pub mod provision;

// HTTP API
pub mod server;

// Graceful shutdown
pub mod shutdown;
