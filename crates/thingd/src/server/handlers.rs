//! Route handlers

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thing_runtime::{JobInfo, LivenessStatus, MenuEntry, SessionKey, Takeout, build_menu};
use thing_types::{Field, Property, PropertyId, PropertyType, Thing, ThingId, TypeId, Value};

use super::auth::Caller;
use super::error::ApiError;
use super::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    types: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        types: state.registry().len(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_types(State(state): State<AppState>) -> Json<Vec<PropertyType>> {
    Json(state.registry().all().iter().map(|t| t.as_ref().clone()).collect())
}

pub async fn get_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PropertyType>> {
    let def = state.registry().get(&TypeId::new(id))?;
    Ok(Json(def.as_ref().clone()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Things
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateThing {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub async fn list_things(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Json<Vec<Thing>> {
    Json(state.things().list_things(&caller.owner))
}

pub async fn create_thing(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateThing>,
) -> ApiResult<(StatusCode, Json<Thing>)> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Thing name must not be empty".to_string()));
    }
    let thing = state
        .things()
        .create_thing(caller.owner, req.name, req.description);
    Ok((StatusCode::CREATED, Json(thing)))
}

pub async fn get_thing(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<ThingId>,
) -> ApiResult<Json<Thing>> {
    Ok(Json(state.owned_thing(&caller.owner, id)?))
}

pub async fn delete_thing(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<ThingId>,
) -> ApiResult<StatusCode> {
    state.owned_thing(&caller.owner, id)?;
    state.things().delete_thing(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateProperty {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub type_id: TypeId,
}

pub async fn add_property(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<ThingId>,
    Json(req): Json<CreateProperty>,
) -> ApiResult<(StatusCode, Json<Property>)> {
    state.owned_thing(&caller.owner, id)?;
    let property = state
        .things()
        .add_property(id, req.name, req.description, req.type_id)?;
    Ok((StatusCode::CREATED, Json(property)))
}

pub async fn remove_property(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((id, pid)): Path<(ThingId, PropertyId)>,
) -> ApiResult<StatusCode> {
    state.owned_thing(&caller.owner, id)?;
    state.things().remove_property(id, pid).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────────────────────────
// Values
// ─────────────────────────────────────────────────────────────────────────────

/// `?latest=n`, or an inclusive `?from=..&to=..` window (either bound optional)
#[derive(Debug, Default, Deserialize)]
pub struct ValuesQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub latest: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AppendValue {
    /// Defaults to the time the request is handled
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: Vec<Field>,
}

pub async fn get_values(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((id, pid)): Path<(ThingId, PropertyId)>,
    Query(query): Query<ValuesQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let thing = state.owned_thing(&caller.owner, id)?;
    let property = thing
        .property(pid)
        .ok_or(thing_runtime::ThingError::PropertyNotFound(pid))?;

    let values = match query.latest {
        Some(n) if query.from.is_some() || query.to.is_some() => {
            return Err(ApiError::BadRequest(format!(
                "latest={} cannot be combined with from/to",
                n
            )));
        }
        Some(n) => state.things().latest_values(property.id, n).await?,
        None => {
            let from = query.from.unwrap_or(DateTime::<Utc>::MIN_UTC);
            let to = query.to.unwrap_or(DateTime::<Utc>::MAX_UTC);
            state.things().values_in_range(property.id, from, to).await?
        }
    };
    Ok(Json(values))
}

pub async fn append_value(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((id, pid)): Path<(ThingId, PropertyId)>,
    Json(req): Json<AppendValue>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let thing = state.owned_thing(&caller.owner, id)?;
    let property = thing
        .property(pid)
        .ok_or(thing_runtime::ThingError::PropertyNotFound(pid))?;

    let value = Value::new(req.timestamp.unwrap_or_else(Utc::now), req.fields);
    state.things().append_value(property, value.clone()).await?;
    Ok((StatusCode::CREATED, Json(value)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Liveness & menu
// ─────────────────────────────────────────────────────────────────────────────

pub async fn thing_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<ThingId>,
) -> ApiResult<Json<LivenessStatus>> {
    let thing = state.owned_thing(&caller.owner, id)?;
    Ok(Json(state.liveness().evaluate(&thing).await))
}

pub async fn all_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Json<Vec<LivenessStatus>> {
    let things = state.things().list_things(&caller.owner);
    Json(state.liveness().evaluate_all(&things).await)
}

pub async fn menu(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Json<Vec<MenuEntry>> {
    Json(build_menu(&state.things().list_things(&caller.owner)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Takeout
// ─────────────────────────────────────────────────────────────────────────────

pub async fn start_takeout(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Takeout>> {
    let takeout = state
        .takeout()
        .takeout(caller.session, caller.owner)
        .await?;
    Ok(Json(takeout.as_ref().clone()))
}

/// The caller's export, if one is running
pub async fn takeout_jobs(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Json<Vec<JobInfo<SessionKey>>> {
    let jobs = state
        .takeout()
        .in_flight_for(&caller.owner)
        .into_iter()
        .filter(|job| job.key.session == caller.session)
        .collect();
    Json(jobs)
}
