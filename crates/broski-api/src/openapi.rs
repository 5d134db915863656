//! # OpenAPI Specification Assembly
//!
//! Collects the utoipa-documented routes into one OpenAPI document served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Broski API",
        version = "0.1.0",
        description = "Engagement backend for the Broski coaching app.\n\nProvides:\n- **Daily challenge** rotation on a rolling 24-hour cycle, completion with XP, levels and streaks\n- **Trial quota** of 40 AI requests per UTC day while in a free trial\n- **Entitlement sync** from the billing provider\n- **Usage limits** per subscription tier"
    ),
    servers(
        (url = "http://localhost:4000", description = "Local development server"),
    ),
    paths(
        crate::routes::users::register,
        crate::routes::users::list_users,
        crate::routes::users::get_profile,
        crate::routes::users::delete_user,
        crate::routes::users::get_challenge,
        crate::routes::users::complete_challenge,
        crate::routes::users::consume_trial,
        crate::routes::users::sync_entitlement,
        crate::routes::users::check_usage,
        crate::routes::users::increment_usage,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::users::RegisterRequest,
            crate::routes::users::ProfileResponse,
            crate::routes::users::UserListResponse,
            crate::routes::users::TrialStatusBody,
            crate::routes::users::ChallengeResponse,
            crate::routes::users::CompletionResponse,
            crate::routes::users::TrialConsumeResponse,
            crate::routes::users::EntitlementRequest,
            crate::routes::users::UsageRequest,
            crate::routes::users::UsageResponse,
        ),
    ),
    tags(
        (name = "users", description = "Registration, profile and entitlement sync"),
        (name = "challenges", description = "Daily challenge rotation and completion"),
        (name = "trial", description = "Per-day trial request quota"),
        (name = "usage", description = "Per-tier daily analysis limits"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI JSON document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
