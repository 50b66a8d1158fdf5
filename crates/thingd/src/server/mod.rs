//! HTTP Server
//!
//! Thin JSON adapter over the thing services. Every route except `/health`
//! requires a bearer token naming the calling owner.

mod auth;
mod error;
mod handlers;
mod router;
mod state;

pub use auth::*;
pub use error::*;
pub use router::*;
pub use state::*;
