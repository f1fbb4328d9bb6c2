use crate::domain::payment::{ErrorEnvelope, ErrorPayload};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SagaError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("missing or invalid credential")]
    Unauthorized,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("duplicate: {0}")]
    Duplicate(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transient dependency failure: {0}")]
    Transient(String),
    #[error("terminal failure: {0}")]
    Terminal(String),
    #[error("invariant violation: {0}")]
    Invariant(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SagaError {
    pub fn code(&self) -> &'static str {
        match self {
            SagaError::Validation(_) => "VALIDATION",
            SagaError::Unauthorized => "UNAUTHORIZED",
            SagaError::RateLimited => "RATE_LIMITED",
            SagaError::Conflict(_) => "CONFLICT",
            SagaError::Duplicate(_) => "DUPLICATE",
            SagaError::NotFound(_) => "NOT_FOUND",
            SagaError::Transient(_) => "TRANSIENT",
            SagaError::Terminal(_) => "TERMINAL",
            SagaError::Invariant(_) => "INVARIANT_VIOLATION",
            SagaError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SagaError::Validation(_) => StatusCode::BAD_REQUEST,
            SagaError::Unauthorized => StatusCode::UNAUTHORIZED,
            SagaError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            SagaError::Conflict(_) | SagaError::Duplicate(_) => StatusCode::CONFLICT,
            SagaError::NotFound(_) => StatusCode::NOT_FOUND,
            SagaError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            SagaError::Terminal(_) | SagaError::Invariant(_) | SagaError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorPayload {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        }
    }
}

impl IntoResponse for SagaError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.envelope())).into_response()
    }
}
