//! HTTP Router

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::auth::require_owner;
use super::handlers::*;
use super::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/types", get(list_types))
        .route("/types/:id", get(get_type))
        .route("/things", get(list_things).post(create_thing))
        .route("/things/:id", get(get_thing).delete(delete_thing))
        .route("/things/:id/properties", post(add_property))
        .route("/things/:id/properties/:pid", delete(remove_property))
        .route(
            "/things/:id/properties/:pid/values",
            get(get_values).post(append_value),
        )
        .route("/things/:id/status", get(thing_status))
        .route("/status", get(all_status))
        .route("/menu", get(menu))
        .route("/takeout", get(takeout_jobs).post(start_takeout))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_owner));

    Router::new()
        // Health check for monitoring/load balancers
        .route("/health", get(health_check))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
