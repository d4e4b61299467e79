use crate::domain::errors::SlaError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
    Conflict(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                ApiError::Conflict("Request conflicts with existing references".to_string())
            }
            err => {
                tracing::error!(error = %err, "Database error");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

// Client-facing messages stay generic for anything that is not the caller's fault.
impl From<SlaError> for ApiError {
    fn from(err: SlaError) -> Self {
        match err {
            SlaError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            SlaError::Validation(msg) => ApiError::BadRequest(msg),
            SlaError::InvalidDuration(value) => {
                ApiError::BadRequest(format!("Invalid SLA duration: {}", value))
            }
            SlaError::UnmetSlaEventAlreadyExists(_) => {
                ApiError::Conflict("An unmet SLA event already exists".to_string())
            }
            SlaError::NextResponseNotConfigured(_) => {
                ApiError::BadRequest("SLA policy has no next response time".to_string())
            }
            SlaError::Database(db) => ApiError::from(db),
            err if err.is_configuration() => {
                tracing::warn!(error = %err, "SLA configuration error");
                ApiError::BadRequest(
                    "Business hours or timezone are not configured correctly".to_string(),
                )
            }
            err => {
                tracing::error!(error = %err, "SLA request failed");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
