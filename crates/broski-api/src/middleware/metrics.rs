//! # Prometheus Metrics
//!
//! Counters and histograms go through the `metrics` facade; the Prometheus
//! recorder installed at startup renders them at `/metrics`.
//!
//! HTTP-level metrics are recorded in [`metrics_middleware`]. Engagement
//! outcomes are recorded by the handlers that produce them.

use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use broski_engagement::CompletionOutcome;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const HTTP_REQUESTS_TOTAL: &str = "broski_http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "broski_http_request_duration_seconds";
pub const CHALLENGE_COMPLETIONS_TOTAL: &str = "broski_challenge_completions_total";
pub const CHALLENGE_REJECTIONS_TOTAL: &str = "broski_challenge_rejections_total";
pub const TRIAL_DENIALS_TOTAL: &str = "broski_trial_denials_total";

/// How often the recorder drains histogram buckets.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Install the global Prometheus recorder and describe the metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_counter!(CHALLENGE_COMPLETIONS_TOTAL, "Accepted daily challenge completions");
    describe_counter!(
        CHALLENGE_REJECTIONS_TOTAL,
        "Completion attempts rejected because the cycle was already completed"
    );
    describe_counter!(TRIAL_DENIALS_TOTAL, "Trial requests denied at the daily ceiling");

    Ok(handle)
}

/// Middleware that counts requests and records latency per matched route.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path)
        .record(start.elapsed().as_secs_f64());

    response
}

/// Count a completion attempt by outcome.
pub fn record_completion(outcome: &CompletionOutcome) {
    match outcome {
        CompletionOutcome::Accepted(_) => counter!(CHALLENGE_COMPLETIONS_TOTAL).increment(1),
        CompletionOutcome::AlreadyCompleted { .. } => {
            counter!(CHALLENGE_REJECTIONS_TOTAL).increment(1)
        }
    }
}

/// Count a trial request denied at the ceiling.
pub fn record_trial_denial() {
    counter!(TRIAL_DENIALS_TOTAL).increment(1);
}
