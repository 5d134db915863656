//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps engagement-layer errors and business rejections to HTTP status
//! codes with a JSON body of the form
//! `{ "error": { "code", "message", "details"? } }`.
//! Store failures are logged and never echoed to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use broski_engagement::EngagementError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "ALREADY_COMPLETED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context for rejections the client can act on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No authenticated user on the request (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The current challenge was completed less than a cycle ago (409).
    #[error("challenge already completed; next one unlocks at {retry_at}")]
    AlreadyCompleted {
        completed_at: DateTime<Utc>,
        retry_at: DateTime<Utc>,
    },

    /// Today's trial requests are used up (403).
    #[error("daily trial limit of {limit} requests reached")]
    TrialQuotaExceeded { count: u32, limit: u32 },

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),

    /// A dependency is not reachable (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::AlreadyCompleted { .. } => (StatusCode::CONFLICT, "ALREADY_COMPLETED"),
            Self::TrialQuotaExceeded { .. } => (StatusCode::FORBIDDEN, "TRIAL_QUOTA_EXCEEDED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::AlreadyCompleted {
                completed_at,
                retry_at,
            } => Some(serde_json::json!({
                "completed_at": completed_at,
                "retry_at": retry_at,
            })),
            Self::TrialQuotaExceeded { count, limit } => Some(serde_json::json!({
                "count": count,
                "limit": limit,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<broski_core::ValidationError> for AppError {
    fn from(err: broski_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<EngagementError> for AppError {
    fn from(err: EngagementError) -> Self {
        match err {
            EngagementError::NotFound(_) => Self::NotFound(err.to_string()),
            EngagementError::AlreadyExists(_) => Self::Conflict(err.to_string()),
            EngagementError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}
