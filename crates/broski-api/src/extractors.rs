//! # Request Extraction Helpers
//!
//! Handlers take `Result<Json<T>, JsonRejection>` and path strings so that
//! malformed input turns into the structured [`AppError`] body instead of
//! Axum's plain-text rejection.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use broski_core::UserId;

use crate::error::AppError;

/// Unwrap a JSON body or map the rejection to a 422.
pub fn extract_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Parse a `{user_id}` path segment.
pub fn parse_user_id(raw: &str) -> Result<UserId, AppError> {
    Ok(UserId::parse(raw)?)
}
