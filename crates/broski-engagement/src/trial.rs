//! # Trial Quota
//!
//! Users in a subscription trial get a fixed number of AI requests per UTC
//! calendar day. Users not in a trial are never limited here.
//!
//! The counter resets lazily: the first request on a new day observes a
//! stale `last_trial_request_reset_date` and starts from zero. The reset and
//! the increment are one transition, and the service runs it with the user's
//! record locked, so two concurrent first-requests of the day cannot both
//! reset.

use broski_core::CalendarDay;
use serde::{Deserialize, Serialize};

use crate::state::EngagementState;

/// Trial requests allowed per UTC calendar day.
pub const TRIAL_DAILY_LIMIT: u32 = 40;

/// Trial usage after an allowed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialUsage {
    /// Requests consumed today, including this one.
    pub count: u32,
    /// Daily ceiling.
    pub limit: u32,
    /// Requests left today.
    pub remaining: u32,
}

impl TrialUsage {
    fn new(count: u32) -> Self {
        Self {
            count,
            limit: TRIAL_DAILY_LIMIT,
            remaining: TRIAL_DAILY_LIMIT.saturating_sub(count),
        }
    }
}

/// Answer to a trial quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TrialDecision {
    /// The user is not in a trial. Nothing was counted.
    Bypassed,
    /// The request was counted.
    Allowed(TrialUsage),
    /// Today's quota is exhausted. Nothing was counted.
    Denied {
        /// Requests already consumed today.
        count: u32,
        /// Daily ceiling.
        limit: u32,
    },
}

impl TrialDecision {
    /// Whether the caller may proceed.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }
}

/// Count of trial requests consumed on `today`, treating a stale reset date
/// as zero.
pub fn effective_count(state: &EngagementState, today: CalendarDay) -> u32 {
    if state.last_trial_request_reset_date == Some(today) {
        state.trial_request_count
    } else {
        0
    }
}

/// Read-only view of today's trial usage. `None` when the user is not in a trial.
pub fn trial_status(state: &EngagementState, today: CalendarDay) -> Option<TrialUsage> {
    state
        .is_in_trial_period
        .then(|| TrialUsage::new(effective_count(state, today)))
}

/// Check and, if allowed, consume one trial request on `today`.
pub fn consume_trial_quota(
    state: &EngagementState,
    today: CalendarDay,
) -> (EngagementState, TrialDecision) {
    if !state.is_in_trial_period {
        return (state.clone(), TrialDecision::Bypassed);
    }

    let mut next = state.clone();
    if next.last_trial_request_reset_date != Some(today) {
        next.trial_request_count = 0;
        next.last_trial_request_reset_date = Some(today);
    }

    if next.trial_request_count >= TRIAL_DAILY_LIMIT {
        let decision = TrialDecision::Denied {
            count: next.trial_request_count,
            limit: TRIAL_DAILY_LIMIT,
        };
        return (next, decision);
    }

    next.trial_request_count += 1;
    let usage = TrialUsage::new(next.trial_request_count);
    (next, TrialDecision::Allowed(usage))
}
