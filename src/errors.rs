use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error body returned to API clients: `{code, message, details?}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Insufficient remaining: {0}")]
    InsufficientRemaining(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("A sync is already in progress")]
    SyncBusy,

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream malformed: {0}")]
    UpstreamMalformed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable code for the API error body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Database(_) => "database_error",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Validation(_) => "validation",
            ServiceError::InvalidTransition(_) => "invalid_transition",
            ServiceError::InsufficientRemaining(_) => "insufficient_remaining",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::SyncBusy => "sync_busy",
            ServiceError::UpstreamUnavailable(_) => "upstream_unavailable",
            ServiceError::UpstreamMalformed(_) => "upstream_malformed",
            ServiceError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidTransition(_)
            | ServiceError::InsufficientRemaining(_)
            | ServiceError::Conflict(_)
            | ServiceError::SyncBusy => StatusCode::CONFLICT,
            ServiceError::UpstreamUnavailable(_) | ServiceError::UpstreamMalformed(_) => {
                StatusCode::BAD_GATEWAY
            }
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Database internals never reach clients.
        let message = match &self {
            ServiceError::Database(e) => {
                tracing::error!(error = %e, "database error surfaced to handler");
                "Database error".to_string()
            }
            ServiceError::Internal(e) => {
                tracing::error!(error = %e, "internal error surfaced to handler");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            code: self.code(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            ServiceError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InsufficientRemaining("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(ServiceError::SyncBusy.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ServiceError::UpstreamUnavailable("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ServiceError::SyncBusy.code(), "sync_busy");
        assert_eq!(
            ServiceError::InvalidTransition("x".into()).code(),
            "invalid_transition"
        );
    }
}
