//! # Engagement Service
//!
//! Runs the pure transitions against a [`UserStore`]. Every mutating
//! operation is one [`UserStore::modify`] call:
//!
//! 1. the store locks the user's record,
//! 2. the transition runs at `clock.now()` against the locked record,
//! 3. the store writes the difference and releases the lock.
//!
//! A request that waits on the lock decides from the record the previous
//! writer left, so none of them fail because of a concurrent writer. An
//! unchanged record is never written.

use std::sync::Arc;

use broski_core::{CalendarDay, UserId};
use chrono::{DateTime, Utc};

use crate::catalog::ChallengeCatalog;
use crate::challenge::{self, CompletionOutcome};
use crate::clock::Clock;
use crate::error::EngagementError;
use crate::state::EngagementState;
use crate::store::UserStore;
use crate::subscription::{apply_entitlement, EntitlementSnapshot};
use crate::trial::{self, TrialDecision};

/// Entry point for the engagement operations.
#[derive(Clone)]
pub struct EngagementService {
    store: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    catalog: Arc<ChallengeCatalog>,
}

impl std::fmt::Debug for EngagementService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngagementService")
            .field("catalog_version", &self.catalog.version())
            .field("catalog_len", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

impl EngagementService {
    pub fn new(
        store: Arc<dyn UserStore>,
        clock: Arc<dyn Clock>,
        catalog: Arc<ChallengeCatalog>,
    ) -> Self {
        Self {
            store,
            clock,
            catalog,
        }
    }

    pub fn catalog(&self) -> &ChallengeCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Current instant from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current UTC calendar day.
    pub fn today(&self) -> CalendarDay {
        CalendarDay::of(&self.clock.now())
    }

    /// Create a record with registration defaults.
    pub async fn register(&self, id: UserId) -> Result<EngagementState, EngagementError> {
        let state = EngagementState::new_registration(self.clock.now(), self.catalog.first_id());
        let stored = self.store.insert(id, state).await?;
        tracing::info!(user = %id, challenge = ?stored.current_challenge_id, "registered user");
        Ok(stored)
    }

    /// Read a record without transitioning it.
    pub async fn profile(&self, id: UserId) -> Result<EngagementState, EngagementError> {
        Ok(self.store.get(id).await?)
    }

    /// Remove a user's record.
    pub async fn delete_user(&self, id: UserId) -> Result<(), EngagementError> {
        self.store.delete(id).await?;
        tracing::info!(user = %id, "deleted user");
        Ok(())
    }

    /// All records, ordered by user id.
    pub async fn list_users(&self) -> Result<Vec<(UserId, EngagementState)>, EngagementError> {
        Ok(self.store.list().await?)
    }

    /// Rotate or heal the user's daily challenge as needed and return the
    /// resulting record.
    pub async fn ensure_daily_challenge(
        &self,
        id: UserId,
    ) -> Result<EngagementState, EngagementError> {
        let catalog = Arc::clone(&self.catalog);
        let (state, ()) = self
            .transact(id, "ensure_daily_challenge", move |s, now| {
                (challenge::ensure_daily_challenge(s, &catalog, now), ())
            })
            .await?;
        Ok(state)
    }

    /// Complete the user's current challenge.
    pub async fn complete_challenge(
        &self,
        id: UserId,
    ) -> Result<(EngagementState, CompletionOutcome), EngagementError> {
        let catalog = Arc::clone(&self.catalog);
        let (state, outcome) = self
            .transact(id, "complete_challenge", move |s, now| {
                challenge::complete_challenge(s, &catalog, now)
            })
            .await?;
        match &outcome {
            CompletionOutcome::Accepted(receipt) => tracing::info!(
                user = %id,
                challenge = receipt.challenge_id,
                xp = receipt.xp_awarded,
                total_xp = receipt.total_xp,
                streak = receipt.challenge_streak,
                "challenge completed"
            ),
            CompletionOutcome::AlreadyCompleted { retry_at, .. } => tracing::info!(
                user = %id,
                retry_at = %retry_at,
                "challenge already completed this cycle"
            ),
        }
        Ok((state, outcome))
    }

    /// Check the trial quota and consume one request if allowed.
    pub async fn check_and_consume_trial_quota(
        &self,
        id: UserId,
    ) -> Result<TrialDecision, EngagementError> {
        let (_, decision) = self
            .transact(id, "consume_trial_quota", |s, now| {
                trial::consume_trial_quota(s, CalendarDay::of(&now))
            })
            .await?;
        if let TrialDecision::Denied { count, limit } = decision {
            tracing::info!(user = %id, count, limit, "trial quota exhausted");
        }
        Ok(decision)
    }

    /// Apply a billing entitlement snapshot.
    pub async fn sync_entitlement(
        &self,
        id: UserId,
        snapshot: &EntitlementSnapshot,
    ) -> Result<EngagementState, EngagementError> {
        let (state, ()) = self
            .transact(id, "sync_entitlement", |s, _| (apply_entitlement(s, snapshot), ()))
            .await?;
        tracing::info!(
            user = %id,
            tier = %state.subscription_tier,
            trial = state.is_in_trial_period,
            "entitlement synced"
        );
        Ok(state)
    }

    async fn transact<T, F>(
        &self,
        id: UserId,
        operation: &'static str,
        mut transition: F,
    ) -> Result<(EngagementState, T), EngagementError>
    where
        F: FnMut(&EngagementState, DateTime<Utc>) -> (EngagementState, T) + Send,
        T: Send,
    {
        let clock = &self.clock;
        let mut outcome = None;
        let stored = self
            .store
            .modify(id, &mut |current: &EngagementState| {
                let (next, decided) = transition(current, clock.now());
                outcome = Some(decided);
                next
            })
            .await?;
        let outcome = outcome.ok_or_else(|| {
            EngagementError::Store(format!("{operation}: store returned without running the transition"))
        })?;
        tracing::debug!(user = %id, operation, version = stored.version, "engagement transition committed");
        Ok((stored, outcome))
    }
}
