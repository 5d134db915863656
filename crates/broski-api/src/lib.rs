//! # broski-api: Axum API Service for the Broski Backend
//!
//! Serves the daily engagement state machine over HTTP: challenge rotation
//! and completion, the trial request quota, entitlement sync, and per-tier
//! usage limits. Engagement logic lives in `broski-engagement`; this crate
//! owns transport, persistence, and observability.
//!
//! ## API Surface
//!
//! | Prefix                    | Module              | Domain              |
//! |---------------------------|---------------------|---------------------|
//! | `/api/user/*`             | [`routes::users`]   | Engagement          |
//! | `/api/health`, `/health/*`| this module         | Probes              |
//! | `/metrics`                | this module         | Prometheus scrape   |
//! | `/openapi.json`           | [`openapi`]         | API document        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```
//!
//! AI-feature routes mounted by the host are wrapped with
//! [`middleware::trial_gate::gated`], which runs after authentication.

pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Probes and `/metrics` sit outside the request metrics layer so scrapes
/// do not count themselves.
pub fn app(state: AppState) -> Router {
    let metrics_on = state.config.metrics_enabled;

    let mut api = Router::new()
        .merge(routes::users::router())
        .merge(openapi::router())
        .route("/api/health", get(health));

    if metrics_on {
        api = api.layer(from_fn(middleware::metrics::metrics_middleware));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let mut probes = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    if metrics_on {
        probes = probes.route("/metrics", get(prometheus_metrics));
    }

    Router::new().merge(probes.with_state(state)).merge(api)
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    catalog_version: u32,
    catalog_size: usize,
}

/// GET /api/health: service summary.
async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let catalog = state.engagement.catalog();
    Json(HealthBody {
        status: "ok",
        service: "broski-api",
        version: env!("CARGO_PKG_VERSION"),
        catalog_version: catalog.version(),
        catalog_size: catalog.len(),
    })
}

/// Liveness probe. Always 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. 200 "ready" once the user store answers, 503 `SERVICE_UNAVAILABLE` otherwise.
async fn readiness(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state
        .engagement
        .store()
        .ping()
        .await
        .map_err(|e| AppError::ServiceUnavailable(format!("user store unreachable: {e}")))?;
    Ok("ready")
}

/// GET /metrics: Prometheus text exposition.
async fn prometheus_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let handle = state.metrics.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("metrics recorder not installed".into())
    })?;
    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    ))
}
