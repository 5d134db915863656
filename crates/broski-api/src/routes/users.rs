//! # User Engagement Routes
//!
//! Routes:
//! - POST   /api/user: Register a user's engagement record
//! - GET    /api/user: Every registered profile
//! - GET    /api/user/{user_id}: Profile with derived level fields
//! - DELETE /api/user/{user_id}: Remove a user's engagement record
//! - GET    /api/user/{user_id}/challenge: Current daily challenge (rotates lazily)
//! - POST   /api/user/{user_id}/challenge/complete: Complete the current challenge
//! - POST   /api/user/{user_id}/trial/consume: Check and consume one trial request
//! - PUT    /api/user/{user_id}/entitlement: Apply a billing entitlement snapshot
//! - POST   /api/user/usage/check: Per-tier daily analysis limit
//! - POST   /api/user/usage/increment: Per-tier limit after one more analysis
//!
//! Handlers stay thin: they parse, call `EngagementService`, and shape the
//! response. Rejections a client can act on (already completed, quota
//! exhausted) become structured error bodies.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use broski_core::UserId;
use broski_engagement::challenge::cycle_ends_at;
use broski_engagement::trial::trial_status;
use broski_engagement::{
    CompletionOutcome, EngagementState, EntitlementSnapshot, PeriodType, SubscriptionTier,
    TrialDecision, UsageCheck,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_json, parse_user_id};
use crate::middleware::metrics::{record_completion, record_trial_denial};
use crate::state::AppState;

/// Assemble the user engagement router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/user", post(register).get(list_users))
        .route("/api/user/usage/check", post(check_usage))
        .route("/api/user/usage/increment", post(increment_usage))
        .route("/api/user/{user_id}", get(get_profile).delete(delete_user))
        .route("/api/user/{user_id}/challenge", get(get_challenge))
        .route("/api/user/{user_id}/challenge/complete", post(complete_challenge))
        .route("/api/user/{user_id}/trial/consume", post(consume_trial))
        .route("/api/user/{user_id}/entitlement", put(sync_entitlement))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Registration request. A missing `user_id` is generated.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

/// Today's trial usage.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrialStatusBody {
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
}

/// A user's engagement profile.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub current_challenge_id: Option<i64>,
    pub challenge_assigned_at: Option<DateTime<Utc>>,
    pub daily_challenge_completed: bool,
    pub challenge_completed_at: Option<DateTime<Utc>>,
    pub challenge_streak: u32,
    pub total_xp: u32,
    pub challenge_level: u32,
    pub challenge_level_name: String,
    /// XP still needed for the next level.
    pub xp_to_next_level: u32,
    pub subscription_tier: String,
    pub subscription_plan: Option<String>,
    pub is_subscribed: bool,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub is_in_trial_period: bool,
    /// Present only while in a trial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial: Option<TrialStatusBody>,
}

/// All registered profiles.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<ProfileResponse>,
    pub count: usize,
}

/// The current daily challenge.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChallengeResponse {
    pub challenge_id: i64,
    /// Prompt text. Absent when the catalog is empty.
    pub prompt: Option<String>,
    pub xp_reward: u32,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// When the next challenge unlocks.
    pub next_challenge_at: Option<DateTime<Utc>>,
    pub challenge_streak: u32,
    pub catalog_version: u32,
}

/// An accepted completion.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompletionResponse {
    pub current_challenge_id: i64,
    pub xp_awarded: u32,
    pub total_xp: u32,
    pub challenge_level: u32,
    pub challenge_level_name: String,
    pub challenge_streak: u32,
    pub daily_challenge_completed: bool,
    pub challenge_completed_at: DateTime<Utc>,
}

/// Result of consuming a trial request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrialConsumeResponse {
    pub allowed: bool,
    pub in_trial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TrialStatusBody>,
}

/// Normalized billing entitlement.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EntitlementRequest {
    pub is_active: bool,
    #[serde(default)]
    pub product_identifier: Option<String>,
    /// `trial`, `intro` or `normal`, case-insensitive.
    #[serde(default)]
    pub period_type: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Usage limit request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsageRequest {
    /// `free`, `pro`, `elite` (or `gold`). Unknown tiers count as `free`.
    #[serde(default)]
    pub subscription_tier: Option<String>,
    #[serde(default)]
    pub daily_analysis_count: u32,
}

/// Usage limit result.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsageResponse {
    pub can_use: bool,
    pub current_usage: u32,
    pub limit: u32,
    pub remaining: u32,
}

impl From<UsageCheck> for UsageResponse {
    fn from(check: UsageCheck) -> Self {
        Self {
            can_use: check.can_use,
            current_usage: check.current_usage,
            limit: check.limit,
            remaining: check.remaining,
        }
    }
}

fn profile_response(state: &AppState, id: UserId, s: &EngagementState) -> ProfileResponse {
    let level = s.level();
    let next_level_xp = level.number.saturating_mul(broski_engagement::XP_PER_LEVEL);
    ProfileResponse {
        user_id: id.0,
        current_challenge_id: s.current_challenge_id,
        challenge_assigned_at: s.challenge_assigned_at,
        daily_challenge_completed: s.daily_challenge_completed,
        challenge_completed_at: s.challenge_completed_at,
        challenge_streak: s.challenge_streak,
        total_xp: s.total_xp,
        challenge_level: level.number,
        challenge_level_name: level.name.to_string(),
        xp_to_next_level: next_level_xp.saturating_sub(s.total_xp),
        subscription_tier: s.subscription_tier.to_string(),
        subscription_plan: s.subscription_plan.map(|p| p.as_str().to_string()),
        is_subscribed: s.is_subscribed,
        subscription_expires_at: s.subscription_expires_at,
        is_in_trial_period: s.is_in_trial_period,
        trial: trial_status(s, state.engagement.today()).map(|u| TrialStatusBody {
            count: u.count,
            limit: u.limit,
            remaining: u.remaining,
        }),
    }
}

fn parse_period_type(raw: &str) -> Result<PeriodType, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trial" => Ok(PeriodType::Trial),
        "intro" => Ok(PeriodType::Intro),
        "normal" => Ok(PeriodType::Normal),
        other => Err(AppError::Validation(format!("unknown period_type: {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Register a user's engagement record.
#[utoipa::path(
    post,
    path = "/api/user",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = ProfileResponse),
        (status = 409, description = "User already exists", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProfileResponse>), AppError> {
    let req = extract_json(body)?;
    let id = req.user_id.map(UserId::from).unwrap_or_default();
    let stored = state.engagement.register(id).await?;
    Ok((StatusCode::CREATED, Json(profile_response(&state, id, &stored))))
}

/// Read a user's engagement profile.
#[utoipa::path(
    get,
    path = "/api/user/{user_id}",
    params(("user_id" = String, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let id = parse_user_id(&user_id)?;
    let stored = state.engagement.profile(id).await?;
    Ok(Json(profile_response(&state, id, &stored)))
}

/// List every registered profile, ordered by user id.
#[utoipa::path(
    get,
    path = "/api/user",
    responses(
        (status = 200, description = "All profiles", body = UserListResponse),
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>, AppError> {
    let users: Vec<ProfileResponse> = state
        .engagement
        .list_users()
        .await?
        .iter()
        .map(|(id, s)| profile_response(&state, *id, s))
        .collect();
    Ok(Json(UserListResponse {
        count: users.len(),
        users,
    }))
}

/// Delete a user's engagement record.
#[utoipa::path(
    delete,
    path = "/api/user/{user_id}",
    params(("user_id" = String, Path, description = "User UUID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_user_id(&user_id)?;
    state.engagement.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Return the current daily challenge, rotating or healing it first.
#[utoipa::path(
    get,
    path = "/api/user/{user_id}/challenge",
    params(("user_id" = String, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Current challenge", body = ChallengeResponse),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    tag = "challenges"
)]
pub async fn get_challenge(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ChallengeResponse>, AppError> {
    let id = parse_user_id(&user_id)?;
    let s = state.engagement.ensure_daily_challenge(id).await?;
    let catalog = state.engagement.catalog();
    let challenge_id = s.current_challenge_id.unwrap_or_else(|| catalog.first_id());
    let definition = catalog.get(challenge_id);

    Ok(Json(ChallengeResponse {
        challenge_id,
        prompt: definition.map(|d| d.prompt.clone()),
        xp_reward: catalog.reward_for(Some(challenge_id)),
        assigned_at: s.challenge_assigned_at,
        completed: s.daily_challenge_completed,
        completed_at: s.challenge_completed_at,
        next_challenge_at: cycle_ends_at(&s),
        challenge_streak: s.challenge_streak,
        catalog_version: catalog.version(),
    }))
}

/// Complete the current daily challenge.
#[utoipa::path(
    post,
    path = "/api/user/{user_id}/challenge/complete",
    params(("user_id" = String, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Challenge completed", body = CompletionResponse),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Already completed this cycle", body = ErrorBody),
    ),
    tag = "challenges"
)]
pub async fn complete_challenge(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<CompletionResponse>, AppError> {
    let id = parse_user_id(&user_id)?;
    let (_, outcome) = state.engagement.complete_challenge(id).await?;
    record_completion(&outcome);

    match outcome {
        CompletionOutcome::Accepted(receipt) => Ok(Json(CompletionResponse {
            current_challenge_id: receipt.challenge_id,
            xp_awarded: receipt.xp_awarded,
            total_xp: receipt.total_xp,
            challenge_level: receipt.level.number,
            challenge_level_name: receipt.level.name.to_string(),
            challenge_streak: receipt.challenge_streak,
            daily_challenge_completed: true,
            challenge_completed_at: receipt.completed_at,
        })),
        CompletionOutcome::AlreadyCompleted {
            completed_at,
            retry_at,
        } => Err(AppError::AlreadyCompleted {
            completed_at,
            retry_at,
        }),
    }
}

/// Check the trial quota and consume one request.
#[utoipa::path(
    post,
    path = "/api/user/{user_id}/trial/consume",
    params(("user_id" = String, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Request allowed", body = TrialConsumeResponse),
        (status = 403, description = "Daily trial limit reached", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    tag = "trial"
)]
pub async fn consume_trial(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<TrialConsumeResponse>, AppError> {
    let id = parse_user_id(&user_id)?;
    match state.engagement.check_and_consume_trial_quota(id).await? {
        TrialDecision::Bypassed => Ok(Json(TrialConsumeResponse {
            allowed: true,
            in_trial: false,
            usage: None,
        })),
        TrialDecision::Allowed(usage) => Ok(Json(TrialConsumeResponse {
            allowed: true,
            in_trial: true,
            usage: Some(TrialStatusBody {
                count: usage.count,
                limit: usage.limit,
                remaining: usage.remaining,
            }),
        })),
        TrialDecision::Denied { count, limit } => {
            record_trial_denial();
            Err(AppError::TrialQuotaExceeded { count, limit })
        }
    }
}

/// Apply a billing entitlement snapshot.
#[utoipa::path(
    put,
    path = "/api/user/{user_id}/entitlement",
    params(("user_id" = String, Path, description = "User UUID")),
    request_body = EntitlementRequest,
    responses(
        (status = 200, description = "Entitlement applied", body = ProfileResponse),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 422, description = "Invalid entitlement", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn sync_entitlement(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Result<Json<EntitlementRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>, AppError> {
    let id = parse_user_id(&user_id)?;
    let req = extract_json(body)?;
    let snapshot = EntitlementSnapshot {
        is_active: req.is_active,
        product_identifier: req.product_identifier,
        period_type: req.period_type.as_deref().map(parse_period_type).transpose()?,
        expires_at: req.expires_at,
    };
    let stored = state.engagement.sync_entitlement(id, &snapshot).await?;
    Ok(Json(profile_response(&state, id, &stored)))
}

/// Evaluate the per-tier daily analysis limit.
#[utoipa::path(
    post,
    path = "/api/user/usage/check",
    request_body = UsageRequest,
    responses(
        (status = 200, description = "Usage evaluated", body = UsageResponse),
    ),
    tag = "usage"
)]
pub async fn check_usage(
    body: Result<Json<UsageRequest>, JsonRejection>,
) -> Result<Json<UsageResponse>, AppError> {
    let req = extract_json(body)?;
    let tier = SubscriptionTier::parse_lenient(req.subscription_tier.as_deref().unwrap_or(""));
    Ok(Json(UsageCheck::evaluate(tier, req.daily_analysis_count).into()))
}

/// Evaluate the per-tier daily analysis limit after one more analysis.
#[utoipa::path(
    post,
    path = "/api/user/usage/increment",
    request_body = UsageRequest,
    responses(
        (status = 200, description = "Usage after increment", body = UsageResponse),
    ),
    tag = "usage"
)]
pub async fn increment_usage(
    body: Result<Json<UsageRequest>, JsonRejection>,
) -> Result<Json<UsageResponse>, AppError> {
    let req = extract_json(body)?;
    let tier = SubscriptionTier::parse_lenient(req.subscription_tier.as_deref().unwrap_or(""));
    Ok(Json(
        UsageCheck::after_increment(tier, req.daily_analysis_count).into(),
    ))
}
