//! Bearer-token authentication

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use thing_types::OwnerId;
use tracing::debug;

use super::error::ApiError;
use super::state::AppState;

/// Optional header naming the client session; defaults to the owner id
pub const SESSION_HEADER: &str = "x-session-id";

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub owner: OwnerId,
    /// Key for per-session jobs such as takeout
    pub session: String,
}

/// Middleware resolving `Authorization: Bearer <token>` to a `Caller`
pub async fn require_owner(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let owner = state.owner_for_token(token.trim()).ok_or_else(|| {
        debug!(path = %request.uri().path(), "Rejected unknown token");
        ApiError::Unauthorized
    })?;

    let session = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| owner.to_string());

    request.extensions_mut().insert(Caller { owner, session });
    Ok(next.run(request).await)
}
