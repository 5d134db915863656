//! # Daily Challenge Rotation and Completion
//!
//! Pure transitions over [`EngagementState`]. Both functions take the current
//! snapshot, the catalog and the current instant, and return the next state.
//! Nothing here touches storage; see [`crate::service`] for how transitions
//! run against a locked record.
//!
//! ## Cycle
//!
//! A challenge cycle is a rolling 24 hours measured from assignment (if not
//! completed) or from completion (if completed). Expiry is a plain duration
//! comparison, not a calendar-day boundary.
//!
//! ```text
//!             assign ──(complete)──▶ completed ──(24h since completion)──▶ assign next
//!               │
//!               └──(24h since assignment, not completed)──▶ assign next
//! ```
//!
//! ## Self-Healing
//!
//! Bad data never fails a transition:
//! - a missing or unknown `current_challenge_id` is replaced by its successor,
//! - a completed record without `challenge_completed_at` is backfilled from
//!   the legacy `last_challenge_date`, or stamped `now` if that is unusable,
//! - an uncompleted record with a stray `challenge_completed_at` has it cleared,
//! - a missing `challenge_assigned_at` is stamped `now`.
//!
//! Missing timestamps are never treated as expired.

use broski_core::CalendarDay;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ChallengeCatalog;
use crate::level::Level;
use crate::state::EngagementState;
use crate::streak::next_streak;

/// Length of a challenge cycle in hours.
pub const CHALLENGE_CYCLE_HOURS: i64 = 24;

/// Length of a challenge cycle.
pub fn cycle_length() -> TimeDelta {
    TimeDelta::hours(CHALLENGE_CYCLE_HOURS)
}

/// Whether a full cycle has passed since `since`. `None` never expires.
fn cycle_elapsed(since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    since.is_some_and(|t| now.signed_duration_since(t) >= cycle_length())
}

fn assign_next(state: &mut EngagementState, catalog: &ChallengeCatalog, now: DateTime<Utc>) {
    let next_id = catalog.successor(state.current_challenge_id);
    tracing::debug!(
        from = ?state.current_challenge_id,
        to = next_id,
        "assigning next daily challenge"
    );
    state.current_challenge_id = Some(next_id);
    state.challenge_assigned_at = Some(now);
    state.daily_challenge_completed = false;
    state.challenge_completed_at = None;
}

/// Return a state with a valid, unexpired challenge assignment.
///
/// Calling this twice at the same instant yields the same state.
pub fn ensure_daily_challenge(
    state: &EngagementState,
    catalog: &ChallengeCatalog,
    now: DateTime<Utc>,
) -> EngagementState {
    let mut next = state.clone();

    if !catalog.is_valid(next.current_challenge_id) {
        tracing::debug!(id = ?next.current_challenge_id, "challenge id not in catalog");
        assign_next(&mut next, catalog, now);
        return next;
    }

    if next.challenge_assigned_at.is_none() {
        next.challenge_assigned_at = Some(now);
    }

    if next.daily_challenge_completed {
        if next.challenge_completed_at.is_none() {
            next.challenge_completed_at = Some(next.legacy_completion().unwrap_or(now));
        }
        if cycle_elapsed(next.challenge_completed_at, now) {
            assign_next(&mut next, catalog, now);
        }
    } else {
        next.challenge_completed_at = None;
        if cycle_elapsed(next.challenge_assigned_at, now) {
            assign_next(&mut next, catalog, now);
        }
    }

    next
}

/// When the current cycle ends, if it has a start time.
pub fn cycle_ends_at(state: &EngagementState) -> Option<DateTime<Utc>> {
    let start = if state.daily_challenge_completed {
        state.challenge_completed_at
    } else {
        state.challenge_assigned_at
    };
    start.and_then(|t| t.checked_add_signed(cycle_length()))
}

/// Details of an accepted completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReceipt {
    /// The challenge that was completed.
    pub challenge_id: i64,
    /// XP awarded for this completion.
    pub xp_awarded: u32,
    /// Lifetime XP after the award.
    pub total_xp: u32,
    /// Level after the award.
    pub level: Level,
    /// Streak after this completion.
    pub challenge_streak: u32,
    /// When the completion was recorded.
    pub completed_at: DateTime<Utc>,
}

/// Result of a completion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// XP was awarded.
    Accepted(CompletionReceipt),
    /// The current challenge was completed less than a cycle ago.
    AlreadyCompleted {
        /// When the current challenge was completed.
        completed_at: DateTime<Utc>,
        /// Earliest instant at which the next completion can be accepted.
        retry_at: DateTime<Utc>,
    },
}

impl CompletionOutcome {
    /// Whether XP was awarded.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Complete the current challenge at `now`.
///
/// The previous completion time and streak are read before rotation runs.
/// Rotation clears `challenge_completed_at` when the previous cycle expired,
/// and the streak decision needs the time that was cleared.
pub fn complete_challenge(
    state: &EngagementState,
    catalog: &ChallengeCatalog,
    now: DateTime<Utc>,
) -> (EngagementState, CompletionOutcome) {
    let previous_completion = state.previous_completion();
    let previous_streak = state.challenge_streak;

    let mut next = ensure_daily_challenge(state, catalog, now);

    if next.daily_challenge_completed {
        let completed_at = next.challenge_completed_at.unwrap_or(now);
        let outcome = CompletionOutcome::AlreadyCompleted {
            completed_at,
            retry_at: completed_at
                .checked_add_signed(cycle_length())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        return (next, outcome);
    }

    let xp_awarded = catalog.reward_for(next.current_challenge_id);
    let today = CalendarDay::of(&now);
    let streak = next_streak(
        previous_completion.map(|t| CalendarDay::of(&t)),
        previous_streak,
        today,
    );

    next.total_xp = next.total_xp.saturating_add(xp_awarded);
    next.daily_challenge_completed = true;
    next.challenge_completed_at = Some(now);
    next.challenge_streak = streak;
    next.last_challenge_date = Some(today.to_string());

    let receipt = CompletionReceipt {
        challenge_id: next.current_challenge_id.unwrap_or_else(|| catalog.first_id()),
        xp_awarded,
        total_xp: next.total_xp,
        level: next.level(),
        challenge_streak: streak,
        completed_at: now,
    };
    (next, CompletionOutcome::Accepted(receipt))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::catalog::ChallengeDefinition;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn catalog(n: u32) -> ChallengeCatalog {
        let entries = (0..n)
            .map(|id| ChallengeDefinition {
                id: id * 3 + 1,
                prompt: String::new(),
                xp_reward: 10 + id,
            })
            .collect();
        ChallengeCatalog::new(1, entries).unwrap()
    }

    fn arb_state() -> impl Strategy<Value = EngagementState> {
        (
            proptest::option::of(any::<i64>()),
            proptest::option::of(-200i64..200),
            any::<bool>(),
            proptest::option::of(-200i64..200),
            0u32..500,
        )
            .prop_map(|(id, assigned_h, completed, completed_h, xp)| {
                let base = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
                let mut s = EngagementState::new_registration(base, 0);
                s.current_challenge_id = id;
                s.challenge_assigned_at = assigned_h.map(|h| base + TimeDelta::try_hours(h).unwrap());
                s.daily_challenge_completed = completed;
                s.challenge_completed_at =
                    completed_h.map(|h| base + TimeDelta::try_hours(h).unwrap());
                s.total_xp = xp;
                s
            })
    }

    proptest! {
        /// Rotation always leaves a valid id and a consistent completion pair.
        #[test]
        fn rotation_heals_any_record(state in arb_state(), n in 0u32..20) {
            let c = catalog(n);
            let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
            let next = ensure_daily_challenge(&state, &c, now);
            prop_assert!(c.is_valid(next.current_challenge_id));
            prop_assert_eq!(next.challenge_completed_at.is_some(), next.daily_challenge_completed);
            prop_assert!(next.challenge_assigned_at.is_some());
            prop_assert_eq!(next.total_xp, state.total_xp);
        }

        /// A second rotation at the same instant changes nothing.
        #[test]
        fn rotation_is_idempotent(state in arb_state(), n in 0u32..20) {
            let c = catalog(n);
            let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
            let once = ensure_daily_challenge(&state, &c, now);
            prop_assert_eq!(ensure_daily_challenge(&once, &c, now), once);
        }

        /// Completion never awards XP twice at the same instant.
        #[test]
        fn completion_awards_at_most_once(state in arb_state(), n in 0u32..20) {
            let c = catalog(n);
            let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
            let (first, _) = complete_challenge(&state, &c, now);
            let (second, outcome) = complete_challenge(&first, &c, now);
            prop_assert!(!outcome.is_accepted());
            prop_assert_eq!(second.total_xp, first.total_xp);
        }
    }
}
