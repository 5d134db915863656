//! # Integration Tests for broski-api
//!
//! Drives the router end to end over the in-memory store with a fixed
//! clock: registration, challenge rotation and completion, the trial quota
//! (endpoint and gate middleware), entitlement sync, usage limits, user
//! listing and deletion, probes, and the OpenAPI document.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use axum::routing::post;
use axum::{Extension, Router};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use broski_api::middleware::trial_gate::{gated, AuthenticatedUser, TrialInfo};
use broski_api::state::{AppConfig, AppState};
use broski_core::UserId;
use broski_engagement::{
    ChallengeCatalog, EngagementState, FixedClock, InMemoryUserStore, StoreError, Transition,
    UserStore,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
}

/// Helper: state over the in-memory store and a controllable clock.
fn test_state(config: AppConfig) -> (AppState, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(start()));
    let state = AppState::with_store(
        config,
        Arc::new(InMemoryUserStore::new()),
        clock.clone(),
        Arc::new(ChallengeCatalog::builtin()),
    );
    (state, clock)
}

/// Helper: build the test app and hand back its clock.
fn test_app() -> (Router, Arc<FixedClock>) {
    let (state, clock) = test_state(AppConfig::default());
    (broski_api::app(state), clock)
}

/// Helper: read response body as string.
async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Helper: read response body as JSON.
async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

fn get(uri: &str) -> Request {
    axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, body: Value) -> Request {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request {
    axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Helper: register a user and return its id.
async fn register(app: &Router) -> UserId {
    let id = UserId::new();
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/user", json!({ "user_id": id.0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    id
}

async fn start_trial(app: &Router, id: UserId) {
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/user/{}/entitlement", id.0),
            json!({
                "is_active": true,
                "product_identifier": "broski_pro_weekly",
                "period_type": "TRIAL",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn liveness_probe() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/health/liveness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn readiness_probe() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/health/readiness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

#[tokio::test]
async fn api_health_reports_catalog() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "broski-api");
    assert_eq!(body["catalog_version"], 1);
    assert!(body["catalog_size"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn metrics_without_recorder_is_unavailable() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], "SERVICE_UNAVAILABLE");
}

/// Store whose health check fails.
struct UnreachableStore(InMemoryUserStore);

#[async_trait]
impl UserStore for UnreachableStore {
    async fn get(&self, id: UserId) -> Result<EngagementState, StoreError> {
        self.0.get(id).await
    }

    async fn insert(
        &self,
        id: UserId,
        state: EngagementState,
    ) -> Result<EngagementState, StoreError> {
        self.0.insert(id, state).await
    }

    async fn modify(
        &self,
        id: UserId,
        transition: &mut Transition<'_>,
    ) -> Result<EngagementState, StoreError> {
        self.0.modify(id, transition).await
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        self.0.delete(id).await
    }

    async fn list(&self) -> Result<Vec<(UserId, EngagementState)>, StoreError> {
        self.0.list().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

#[tokio::test]
async fn readiness_fails_when_store_unreachable() {
    let state = AppState::with_store(
        AppConfig::default(),
        Arc::new(UnreachableStore(InMemoryUserStore::new())),
        Arc::new(FixedClock::new(start())),
        Arc::new(ChallengeCatalog::builtin()),
    );
    let app = broski_api::app(state);

    let response = app.clone().oneshot(get("/health/readiness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("user store unreachable"));

    let response = app.oneshot(get("/health/liveness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_route_absent_when_disabled() {
    let config = AppConfig {
        metrics_enabled: false,
        ..AppConfig::default()
    };
    let (state, _) = test_state(config);
    let response = broski_api::app(state).oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Registration and profile -------------------------------------------------

#[tokio::test]
async fn register_returns_defaults() {
    let (app, _) = test_app();
    let response = app
        .oneshot(send_json("POST", "/api/user", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["current_challenge_id"], 0);
    assert_eq!(body["total_xp"], 0);
    assert_eq!(body["challenge_level"], 1);
    assert_eq!(body["challenge_level_name"], "Rookie");
    assert_eq!(body["subscription_tier"], "free");
    assert_eq!(body["is_in_trial_period"], false);
    assert!(body.get("trial").is_none());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (app, _) = test_app();
    let id = register(&app).await;
    let response = app
        .oneshot(send_json("POST", "/api/user", json!({ "user_id": id.0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let (app, _) = test_app();
    let uri = format!("/api/user/{}", UserId::new().0);
    let response = app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn malformed_user_id_is_rejected() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/api/user/not-a-uuid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/api/user")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn list_users_returns_every_profile() {
    let (app, _) = test_app();
    let response = app.clone().oneshot(get("/api/user")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 0);
    assert_eq!(body["users"], json!([]));

    let mut ids = vec![register(&app).await, register(&app).await, register(&app).await];
    ids.sort_by_key(|id| id.0);

    let body = body_json(app.oneshot(get("/api/user")).await.unwrap()).await;
    assert_eq!(body["count"], 3);
    let listed: Vec<String> = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["user_id"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<String> = ids.iter().map(|id| id.0.to_string()).collect();
    assert_eq!(listed, expected);
    assert_eq!(body["users"][0]["challenge_level_name"], "Rookie");
}

#[tokio::test]
async fn delete_user_removes_record() {
    let (app, _) = test_app();
    let id = register(&app).await;
    let uri = format!("/api/user/{}", id.0);
    let delete = || {
        axum::http::Request::builder()
            .method("DELETE")
            .uri(&uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_string(response).await.is_empty());

    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");

    let body = body_json(app.oneshot(get("/api/user")).await.unwrap()).await;
    assert_eq!(body["count"], 0);
}

// -- Daily challenge ----------------------------------------------------------

#[tokio::test]
async fn challenge_completion_cycle() {
    let (app, clock) = test_app();
    let id = register(&app).await;
    let challenge_uri = format!("/api/user/{}/challenge", id.0);
    let complete_uri = format!("/api/user/{}/challenge/complete", id.0);

    let response = app.clone().oneshot(get(&challenge_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let challenge = body_json(response).await;
    assert_eq!(challenge["challenge_id"], 0);
    assert_eq!(challenge["xp_reward"], 20);
    assert_eq!(challenge["completed"], false);
    assert!(challenge["prompt"].as_str().unwrap().len() > 10);

    let response = app.clone().oneshot(post_empty(&complete_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let done = body_json(response).await;
    assert_eq!(done["xp_awarded"], 20);
    assert_eq!(done["total_xp"], 20);
    assert_eq!(done["challenge_streak"], 1);
    assert_eq!(done["daily_challenge_completed"], true);

    // Same cycle: rejected with the unlock time.
    clock.advance(TimeDelta::hours(3));
    let response = app.clone().oneshot(post_empty(&complete_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "ALREADY_COMPLETED");
    let retry_at: DateTime<Utc> =
        serde_json::from_value(body["error"]["details"]["retry_at"].clone()).unwrap();
    assert_eq!(retry_at, start() + TimeDelta::hours(24));

    // A full cycle later the next challenge is assigned.
    clock.advance(TimeDelta::hours(21));
    let response = app.clone().oneshot(get(&challenge_uri)).await.unwrap();
    let challenge = body_json(response).await;
    assert_eq!(challenge["challenge_id"], 1);
    assert_eq!(challenge["completed"], false);
    assert_eq!(challenge["xp_reward"], 15);

    let response = app.clone().oneshot(post_empty(&complete_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let done = body_json(response).await;
    assert_eq!(done["current_challenge_id"], 1);
    assert_eq!(done["total_xp"], 35);
    assert_eq!(done["challenge_streak"], 2);

    let response = app.oneshot(get(&format!("/api/user/{}", id.0))).await.unwrap();
    let profile = body_json(response).await;
    assert_eq!(profile["total_xp"], 35);
    assert_eq!(profile["xp_to_next_level"], 15);
}

#[tokio::test]
async fn completing_for_unknown_user_is_not_found() {
    let (app, _) = test_app();
    let uri = format!("/api/user/{}/challenge/complete", UserId::new().0);
    let response = app.oneshot(post_empty(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Trial quota --------------------------------------------------------------

#[tokio::test]
async fn non_trial_user_bypasses_quota() {
    let (app, _) = test_app();
    let id = register(&app).await;
    let uri = format!("/api/user/{}/trial/consume", id.0);
    let response = app.oneshot(post_empty(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["allowed"], true);
    assert_eq!(body["in_trial"], false);
    assert!(body.get("usage").is_none());
}

#[tokio::test]
async fn trial_quota_exhausts_and_resets_next_day() {
    let (app, clock) = test_app();
    let id = register(&app).await;
    start_trial(&app, id).await;
    let uri = format!("/api/user/{}/trial/consume", id.0);

    for n in 1..=40u32 {
        let response = app.clone().oneshot(post_empty(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {n}");
        let body = body_json(response).await;
        assert_eq!(body["usage"]["count"], n);
        assert_eq!(body["usage"]["remaining"], 40 - n);
    }

    let response = app.clone().oneshot(post_empty(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "TRIAL_QUOTA_EXCEEDED");
    assert_eq!(body["error"]["details"]["count"], 40);
    assert_eq!(body["error"]["details"]["limit"], 40);

    // Midnight UTC starts a fresh allowance.
    clock.set(Utc.with_ymd_and_hms(2026, 4, 2, 0, 0, 0).unwrap());
    let response = app.clone().oneshot(post_empty(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["usage"]["count"], 1);

    let response = app.oneshot(get(&format!("/api/user/{}", id.0))).await.unwrap();
    let profile = body_json(response).await;
    assert_eq!(profile["trial"]["count"], 1);
    assert_eq!(profile["trial"]["remaining"], 39);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_trial_requests_split_at_the_ceiling() {
    let (app, _) = test_app();
    let id = register(&app).await;
    start_trial(&app, id).await;
    let uri = format!("/api/user/{}/trial/consume", id.0);

    let handles: Vec<_> = (0..45)
        .map(|_| {
            let app = app.clone();
            let request = post_empty(&uri);
            tokio::spawn(async move { app.oneshot(request).await.unwrap().status() })
        })
        .collect();

    let (mut ok, mut forbidden) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::FORBIDDEN => forbidden += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!((ok, forbidden), (40, 5));
}

// -- Entitlement --------------------------------------------------------------

#[tokio::test]
async fn entitlement_sync_updates_subscription() {
    let (app, _) = test_app();
    let id = register(&app).await;
    let uri = format!("/api/user/{}/entitlement", id.0);

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &uri,
            json!({
                "is_active": true,
                "product_identifier": "broski_pro_yearly",
                "period_type": "normal",
                "expires_at": "2027-04-01T00:00:00Z",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["subscription_tier"], "pro");
    assert_eq!(body["subscription_plan"], "yearly");
    assert_eq!(body["is_subscribed"], true);
    assert_eq!(body["is_in_trial_period"], false);

    let response = app
        .clone()
        .oneshot(send_json("PUT", &uri, json!({ "is_active": false })))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["subscription_tier"], "free");
    assert_eq!(body["is_subscribed"], false);
    assert!(body["subscription_plan"].is_null());

    let response = app
        .oneshot(send_json(
            "PUT",
            &uri,
            json!({ "is_active": true, "period_type": "prepaid" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// -- Usage limits -------------------------------------------------------------

#[tokio::test]
async fn usage_check_per_tier() {
    let (app, _) = test_app();
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/user/usage/check",
            json!({ "subscription_tier": "free", "daily_analysis_count": 2 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["can_use"], false);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["remaining"], 0);

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/user/usage/check",
            json!({ "subscription_tier": "gold", "daily_analysis_count": 10 }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["can_use"], true);
    assert_eq!(body["limit"], 1000);
    assert_eq!(body["remaining"], 990);
}

#[tokio::test]
async fn usage_increment_counts_one_more() {
    let (app, _) = test_app();
    let response = app
        .oneshot(send_json(
            "POST",
            "/api/user/usage/increment",
            json!({ "subscription_tier": "pro", "daily_analysis_count": 49 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["current_usage"], 50);
    assert_eq!(body["can_use"], false);
    assert_eq!(body["remaining"], 0);
}

// -- OpenAPI ------------------------------------------------------------------

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["paths"]["/api/user/{user_id}/challenge/complete"].is_object());
}

// -- Trial gate ---------------------------------------------------------------

/// Stand-in for the authentication layer: trusts an `x-user-id` header.
async fn header_auth(mut request: Request, next: Next) -> Response {
    let user = request
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| UserId::parse(v).ok());
    if let Some(user) = user {
        request.extensions_mut().insert(AuthenticatedUser(user));
    }
    next.run(request).await
}

async fn analyze(Extension(info): Extension<TrialInfo>) -> String {
    match info {
        TrialInfo::NotInTrial => "not in trial".to_string(),
        TrialInfo::Trial(usage) => format!("remaining {}", usage.remaining),
    }
}

fn gated_app() -> (Router, Router) {
    let (state, _) = test_state(AppConfig::default());
    let feature = gated(Router::new().route("/api/ai/analyze", post(analyze)), state.clone())
        .layer(from_fn(header_auth))
        .with_state(state.clone());
    (feature, broski_api::app(state))
}

fn analyze_as(user: Option<UserId>) -> Request {
    let mut builder = axum::http::Request::builder().method("POST").uri("/api/ai/analyze");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.0.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn gate_requires_authentication() {
    let (feature, _) = gated_app();
    let response = feature.oneshot(analyze_as(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn gate_passes_non_trial_users_through() {
    let (feature, api) = gated_app();
    let id = register(&api).await;
    let response = feature.oneshot(analyze_as(Some(id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "not in trial");
}

#[tokio::test]
async fn gate_counts_and_denies_trial_requests() {
    let (feature, api) = gated_app();
    let id = register(&api).await;
    start_trial(&api, id).await;

    let response = feature.clone().oneshot(analyze_as(Some(id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "remaining 39");

    for _ in 0..39 {
        let response = feature.clone().oneshot(analyze_as(Some(id))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = feature.oneshot(analyze_as(Some(id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"]["code"], "TRIAL_QUOTA_EXCEEDED");
}

#[tokio::test]
async fn gate_reports_unknown_user() {
    let (feature, _) = gated_app();
    let response = feature
        .oneshot(analyze_as(Some(UserId::new())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
