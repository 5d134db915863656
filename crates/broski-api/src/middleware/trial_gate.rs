//! # Trial Gate
//!
//! Wraps AI-feature routes. For every request it consumes one unit of the
//! authenticated user's daily trial quota:
//!
//! - no [`AuthenticatedUser`] in the request extensions: 401,
//! - quota exhausted: 403 with `{ count, limit }` in the error details,
//! - otherwise the request proceeds with a [`TrialInfo`] extension.
//!
//! Users outside a trial pass through uncounted with
//! [`TrialInfo::NotInTrial`].
//!
//! Authentication itself happens upstream; whatever validates the caller
//! inserts `AuthenticatedUser` before this layer runs.

use axum::extract::{Request, State};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use axum::Router;
use broski_core::UserId;
use broski_engagement::{TrialDecision, TrialUsage};

use crate::error::AppError;
use crate::middleware::metrics::record_trial_denial;
use crate::state::AppState;

/// The caller, as established by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

/// Trial quota seen by a gated handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialInfo {
    /// Not in a trial; nothing was counted.
    NotInTrial,
    /// One trial request was consumed.
    Trial(TrialUsage),
}

/// Consume one trial request for the authenticated user.
pub async fn trial_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(AuthenticatedUser(user)) = request.extensions().get::<AuthenticatedUser>().copied()
    else {
        return Err(AppError::Unauthorized("authentication required".into()));
    };

    let info = match state.engagement.check_and_consume_trial_quota(user).await? {
        TrialDecision::Bypassed => TrialInfo::NotInTrial,
        TrialDecision::Allowed(usage) => TrialInfo::Trial(usage),
        TrialDecision::Denied { count, limit } => {
            record_trial_denial();
            return Err(AppError::TrialQuotaExceeded { count, limit });
        }
    };

    request.extensions_mut().insert(info);
    Ok(next.run(request).await)
}

/// Put every route of `router` behind [`trial_gate`].
pub fn gated(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(from_fn_with_state(state, trial_gate))
}
