//! API error responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thing_runtime::{JobError, ThingError};
use thing_types::TypeRegistryError;

/// Error returned by handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Thing(#[from] ThingError),

    #[error(transparent)]
    Type(#[from] TypeRegistryError),

    #[error("Job aborted: {0}")]
    Aborted(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Missing or invalid bearer token")]
    Unauthorized,
}

impl From<JobError<ThingError>> for ApiError {
    fn from(err: JobError<ThingError>) -> Self {
        match err {
            JobError::Failed(e) => ApiError::Thing(e),
            JobError::Aborted(msg) => ApiError::Aborted(msg),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Thing(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Thing(ThingError::UnknownType(_) | ThingError::DimensionMismatch(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Thing(ThingError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Thing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Type(TypeRegistryError::TypeNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Type(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
