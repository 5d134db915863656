//! # Engagement State and Field Patches
//!
//! `EngagementState` is the slice of a user record this crate reads and
//! writes. Transitions never write it back wholesale: the service diffs the
//! state before and after a transition into an [`EngagementPatch`] and the
//! store applies only the changed fields, conditioned on the record version.
//!
//! ## Invariants
//!
//! - `challenge_completed_at.is_some() == daily_challenge_completed` after
//!   any transition in [`crate::challenge`].
//! - The challenge level is derived from `total_xp` on read; it has no field.
//! - `version` is owned by the store. Transitions never touch it.

use broski_core::{parse_legacy_instant, CalendarDay};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::level::Level;
use crate::subscription::{SubscriptionPlan, SubscriptionTier};

/// Per-user engagement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementState {
    /// Id of the assigned challenge. `None` when missing from a legacy record.
    pub current_challenge_id: Option<i64>,
    /// When the current challenge was assigned.
    pub challenge_assigned_at: Option<DateTime<Utc>>,
    /// Whether the current challenge has been completed.
    pub daily_challenge_completed: bool,
    /// When the current challenge was completed.
    pub challenge_completed_at: Option<DateTime<Utc>>,
    /// Free-form completion date kept by older clients. Written as `YYYY-MM-DD`.
    pub last_challenge_date: Option<String>,
    /// Consecutive calendar days with a completion.
    pub challenge_streak: u32,
    /// Lifetime XP from challenges.
    pub total_xp: u32,
    /// Set by entitlement sync.
    pub is_in_trial_period: bool,
    /// Trial requests consumed on `last_trial_request_reset_date`.
    pub trial_request_count: u32,
    /// Day the trial counter was last reset.
    pub last_trial_request_reset_date: Option<CalendarDay>,
    pub subscription_tier: SubscriptionTier,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub is_subscribed: bool,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    /// Write counter, bumped by the store on every persisted change.
    pub version: i64,
}

impl EngagementState {
    /// Defaults for a freshly registered user.
    pub fn new_registration(now: DateTime<Utc>, first_challenge_id: i64) -> Self {
        Self {
            current_challenge_id: Some(first_challenge_id),
            challenge_assigned_at: Some(now),
            daily_challenge_completed: false,
            challenge_completed_at: None,
            last_challenge_date: None,
            challenge_streak: 0,
            total_xp: 0,
            is_in_trial_period: false,
            trial_request_count: 0,
            last_trial_request_reset_date: None,
            subscription_tier: SubscriptionTier::Free,
            subscription_plan: None,
            is_subscribed: false,
            subscription_expires_at: None,
            version: 0,
        }
    }

    /// Level derived from `total_xp`.
    pub fn level(&self) -> Level {
        Level::from_xp(self.total_xp)
    }

    /// Legacy completion date parsed into an instant, if present and valid.
    pub fn legacy_completion(&self) -> Option<DateTime<Utc>> {
        self.last_challenge_date
            .as_deref()
            .and_then(parse_legacy_instant)
    }

    /// Best-known time of the most recent completion.
    pub fn previous_completion(&self) -> Option<DateTime<Utc>> {
        self.challenge_completed_at.or_else(|| self.legacy_completion())
    }
}

/// A single changed field with its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    CurrentChallengeId(Option<i64>),
    ChallengeAssignedAt(Option<DateTime<Utc>>),
    DailyChallengeCompleted(bool),
    ChallengeCompletedAt(Option<DateTime<Utc>>),
    LastChallengeDate(Option<String>),
    ChallengeStreak(u32),
    TotalXp(u32),
    IsInTrialPeriod(bool),
    TrialRequestCount(u32),
    LastTrialRequestResetDate(Option<CalendarDay>),
    SubscriptionTier(SubscriptionTier),
    SubscriptionPlan(Option<SubscriptionPlan>),
    IsSubscribed(bool),
    SubscriptionExpiresAt(Option<DateTime<Utc>>),
}

impl FieldChange {
    /// Storage column name of the changed field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::CurrentChallengeId(_) => "current_challenge_id",
            Self::ChallengeAssignedAt(_) => "challenge_assigned_at",
            Self::DailyChallengeCompleted(_) => "daily_challenge_completed",
            Self::ChallengeCompletedAt(_) => "challenge_completed_at",
            Self::LastChallengeDate(_) => "last_challenge_date",
            Self::ChallengeStreak(_) => "challenge_streak",
            Self::TotalXp(_) => "total_xp",
            Self::IsInTrialPeriod(_) => "is_in_trial_period",
            Self::TrialRequestCount(_) => "trial_request_count",
            Self::LastTrialRequestResetDate(_) => "last_trial_request_reset_date",
            Self::SubscriptionTier(_) => "subscription_tier",
            Self::SubscriptionPlan(_) => "subscription_plan",
            Self::IsSubscribed(_) => "is_subscribed",
            Self::SubscriptionExpiresAt(_) => "subscription_expires_at",
        }
    }

    fn apply(&self, state: &mut EngagementState) {
        match self {
            Self::CurrentChallengeId(v) => state.current_challenge_id = *v,
            Self::ChallengeAssignedAt(v) => state.challenge_assigned_at = *v,
            Self::DailyChallengeCompleted(v) => state.daily_challenge_completed = *v,
            Self::ChallengeCompletedAt(v) => state.challenge_completed_at = *v,
            Self::LastChallengeDate(v) => state.last_challenge_date = v.clone(),
            Self::ChallengeStreak(v) => state.challenge_streak = *v,
            Self::TotalXp(v) => state.total_xp = *v,
            Self::IsInTrialPeriod(v) => state.is_in_trial_period = *v,
            Self::TrialRequestCount(v) => state.trial_request_count = *v,
            Self::LastTrialRequestResetDate(v) => state.last_trial_request_reset_date = *v,
            Self::SubscriptionTier(v) => state.subscription_tier = *v,
            Self::SubscriptionPlan(v) => state.subscription_plan = *v,
            Self::IsSubscribed(v) => state.is_subscribed = *v,
            Self::SubscriptionExpiresAt(v) => state.subscription_expires_at = *v,
        }
    }
}

/// The set of fields a transition changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngagementPatch {
    changes: Vec<FieldChange>,
}

impl EngagementPatch {
    /// Fields that differ between `before` and `after`, carrying `after`'s values.
    pub fn diff(before: &EngagementState, after: &EngagementState) -> Self {
        let mut changes = Vec::new();
        macro_rules! track {
            ($field:ident, $variant:ident) => {
                if before.$field != after.$field {
                    changes.push(FieldChange::$variant(after.$field.clone()));
                }
            };
        }
        track!(current_challenge_id, CurrentChallengeId);
        track!(challenge_assigned_at, ChallengeAssignedAt);
        track!(daily_challenge_completed, DailyChallengeCompleted);
        track!(challenge_completed_at, ChallengeCompletedAt);
        track!(last_challenge_date, LastChallengeDate);
        track!(challenge_streak, ChallengeStreak);
        track!(total_xp, TotalXp);
        track!(is_in_trial_period, IsInTrialPeriod);
        track!(trial_request_count, TrialRequestCount);
        track!(last_trial_request_reset_date, LastTrialRequestResetDate);
        track!(subscription_tier, SubscriptionTier);
        track!(subscription_plan, SubscriptionPlan);
        track!(is_subscribed, IsSubscribed);
        track!(subscription_expires_at, SubscriptionExpiresAt);
        Self { changes }
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The changed fields, in declaration order.
    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    /// Column names of the changed fields.
    pub fn fields(&self) -> Vec<&'static str> {
        self.changes.iter().map(FieldChange::field).collect()
    }

    /// Write the changed fields into `state`. Does not touch `version`.
    pub fn apply_to(&self, state: &mut EngagementState) {
        for change in &self.changes {
            change.apply(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn registration_defaults() {
        let s = EngagementState::new_registration(now(), 0);
        assert_eq!(s.current_challenge_id, Some(0));
        assert_eq!(s.challenge_assigned_at, Some(now()));
        assert!(!s.daily_challenge_completed);
        assert!(s.challenge_completed_at.is_none());
        assert_eq!(s.challenge_streak, 0);
        assert_eq!(s.level().number, 1);
        assert_eq!(s.subscription_tier, SubscriptionTier::Free);
    }

    #[test]
    fn diff_of_identical_states_is_empty() {
        let s = EngagementState::new_registration(now(), 0);
        assert!(EngagementPatch::diff(&s, &s.clone()).is_empty());
    }

    #[test]
    fn diff_ignores_version() {
        let s = EngagementState::new_registration(now(), 0);
        let mut t = s.clone();
        t.version = 9;
        assert!(EngagementPatch::diff(&s, &t).is_empty());
    }

    #[test]
    fn diff_lists_changed_fields() {
        let s = EngagementState::new_registration(now(), 0);
        let mut t = s.clone();
        t.total_xp = 20;
        t.daily_challenge_completed = true;
        t.challenge_completed_at = Some(now());
        let patch = EngagementPatch::diff(&s, &t);
        assert_eq!(
            patch.fields(),
            vec!["daily_challenge_completed", "challenge_completed_at", "total_xp"]
        );
    }

    #[test]
    fn apply_reproduces_target() {
        let s = EngagementState::new_registration(now(), 0);
        let mut t = s.clone();
        t.current_challenge_id = Some(3);
        t.last_challenge_date = Some("2026-06-01".into());
        t.last_trial_request_reset_date = Some(CalendarDay::of(&now()));
        t.subscription_plan = Some(SubscriptionPlan::Monthly);
        let patch = EngagementPatch::diff(&s, &t);
        let mut applied = s.clone();
        patch.apply_to(&mut applied);
        assert_eq!(applied, t);
    }

    #[test]
    fn previous_completion_prefers_timestamp() {
        let mut s = EngagementState::new_registration(now(), 0);
        s.last_challenge_date = Some("2026-05-30".into());
        assert_eq!(
            s.previous_completion(),
            Some(Utc.with_ymd_and_hms(2026, 5, 30, 0, 0, 0).unwrap())
        );
        s.challenge_completed_at = Some(now());
        assert_eq!(s.previous_completion(), Some(now()));
    }

    #[test]
    fn unparseable_legacy_date_is_ignored() {
        let mut s = EngagementState::new_registration(now(), 0);
        s.last_challenge_date = Some("someday".into());
        assert!(s.previous_completion().is_none());
    }
}
