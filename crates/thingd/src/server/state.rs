//! Server Application State
//!
//! Shared state accessible by all handlers.

use std::collections::HashMap;
use std::sync::Arc;

use thing_runtime::{LivenessEngine, TakeoutService, ThingService, TimeSeriesStore};
use thing_types::{OwnerId, Thing, ThingId, TypeRegistry};

use super::error::ApiError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    things: Arc<ThingService>,
    liveness: LivenessEngine,
    takeout: TakeoutService,
    /// Bearer token -> owner
    tokens: HashMap<String, OwnerId>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        registry: Arc<TypeRegistry>,
        store: Arc<dyn TimeSeriesStore>,
        tokens: HashMap<String, String>,
    ) -> Self {
        let things = Arc::new(ThingService::new(registry.clone(), store.clone()));

        Self {
            inner: Arc::new(AppStateInner {
                liveness: LivenessEngine::new(registry, store),
                takeout: TakeoutService::new(things.clone()),
                things,
                tokens: tokens
                    .into_iter()
                    .map(|(token, owner)| (token, OwnerId::new(owner)))
                    .collect(),
            }),
        }
    }

    pub fn things(&self) -> &ThingService {
        &self.inner.things
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.inner.things.registry()
    }

    pub fn liveness(&self) -> &LivenessEngine {
        &self.inner.liveness
    }

    pub fn takeout(&self) -> &TakeoutService {
        &self.inner.takeout
    }

    /// Owner authenticated by `token`, if any
    pub fn owner_for_token(&self, token: &str) -> Option<OwnerId> {
        self.inner.tokens.get(token).cloned()
    }

    /// Fetch a thing on behalf of `owner`
    ///
    /// Things belonging to someone else are reported as missing.
    pub fn owned_thing(&self, owner: &OwnerId, id: ThingId) -> Result<Thing, ApiError> {
        let thing = self.inner.things.get_thing(id)?;
        if thing.owner_id != *owner {
            return Err(thing_runtime::ThingError::ThingNotFound(id).into());
        }
        Ok(thing)
    }
}
