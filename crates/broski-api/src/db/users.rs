//! User engagement persistence.
//!
//! [`PgUserStore`] implements [`UserStore`] over the `users` table. A
//! modify runs in one transaction holding the row lock:
//!
//! ```sql
//! SELECT ... FROM users WHERE id = $1 FOR UPDATE
//! -- transition runs here
//! UPDATE users SET version = version + 1, updated_at = now(), <changed columns>
//! WHERE id = $1
//! RETURNING ...
//! ```
//!
//! Concurrent modifies of the same user queue on the lock instead of
//! failing.

use async_trait::async_trait;
use broski_core::{CalendarDay, UserId};
use broski_engagement::{
    EngagementPatch, EngagementState, FieldChange, StoreError, SubscriptionPlan,
    SubscriptionTier, Transition, UserStore,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const COLUMNS: &str = "id, current_challenge_id, challenge_assigned_at, daily_challenge_completed, \
     challenge_completed_at, last_challenge_date, challenge_streak, total_xp, is_in_trial_period, \
     trial_request_count, last_trial_request_reset_date, subscription_tier, subscription_plan, \
     is_subscribed, subscription_expires_at, version";

/// Postgres-backed [`UserStore`].
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Non-negative counters are `INTEGER` columns.
fn to_db_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn from_db_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get(&self, id: UserId) -> Result<EngagementState, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(UserRow::into_state).ok_or(StoreError::NotFound(id))
    }

    async fn insert(
        &self,
        id: UserId,
        state: EngagementState,
    ) -> Result<EngagementState, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, current_challenge_id, challenge_assigned_at, \
             daily_challenge_completed, challenge_completed_at, last_challenge_date, \
             challenge_streak, total_xp, is_in_trial_period, trial_request_count, \
             last_trial_request_reset_date, subscription_tier, subscription_plan, \
             is_subscribed, subscription_expires_at, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 0)
             ON CONFLICT (id) DO NOTHING
             RETURNING {COLUMNS}"
        ))
        .bind(id.0)
        .bind(state.current_challenge_id)
        .bind(state.challenge_assigned_at)
        .bind(state.daily_challenge_completed)
        .bind(state.challenge_completed_at)
        .bind(&state.last_challenge_date)
        .bind(to_db_count(state.challenge_streak))
        .bind(to_db_count(state.total_xp))
        .bind(state.is_in_trial_period)
        .bind(to_db_count(state.trial_request_count))
        .bind(state.last_trial_request_reset_date.map(|d| *d.as_naive()))
        .bind(state.subscription_tier.as_str())
        .bind(state.subscription_plan.map(|p| p.as_str()))
        .bind(state.is_subscribed)
        .bind(state.subscription_expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(UserRow::into_state)
            .ok_or(StoreError::AlreadyExists(id))
    }

    async fn modify(
        &self,
        id: UserId,
        transition: &mut Transition<'_>,
    ) -> Result<EngagementState, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;
        let current = row.map(UserRow::into_state).ok_or(StoreError::NotFound(id))?;

        let next = transition(&current);
        let patch = EngagementPatch::diff(&current, &next);
        if patch.is_empty() {
            tx.commit().await.map_err(backend)?;
            return Ok(current);
        }

        let mut qb = update_statement(id, &patch);
        let stored = qb
            .build_query_as::<UserRow>()
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        tracing::debug!(user = %id, version = stored.version, fields = ?patch.fields(), "updated user row");
        Ok(stored.into_state())
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(UserId, EngagementState)>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("SELECT {COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|row| (UserId(row.id), row.into_state()))
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(backend)
    }
}

/// `UPDATE` writing the changed columns of one already-locked row.
fn update_statement(id: UserId, patch: &EngagementPatch) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "UPDATE users SET version = version + 1, updated_at = now()",
    );
    for change in patch.changes() {
        qb.push(", ").push(change.field()).push(" = ");
        push_value(&mut qb, change);
    }
    qb.push(" WHERE id = ")
        .push_bind(id.0)
        .push(" RETURNING ")
        .push(COLUMNS);
    qb
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, change: &FieldChange) {
    match change {
        FieldChange::CurrentChallengeId(v) => qb.push_bind(*v),
        FieldChange::ChallengeAssignedAt(v) => qb.push_bind(*v),
        FieldChange::DailyChallengeCompleted(v) => qb.push_bind(*v),
        FieldChange::ChallengeCompletedAt(v) => qb.push_bind(*v),
        FieldChange::LastChallengeDate(v) => qb.push_bind(v.clone()),
        FieldChange::ChallengeStreak(v) => qb.push_bind(to_db_count(*v)),
        FieldChange::TotalXp(v) => qb.push_bind(to_db_count(*v)),
        FieldChange::IsInTrialPeriod(v) => qb.push_bind(*v),
        FieldChange::TrialRequestCount(v) => qb.push_bind(to_db_count(*v)),
        FieldChange::LastTrialRequestResetDate(v) => qb.push_bind(v.map(|d| *d.as_naive())),
        FieldChange::SubscriptionTier(v) => qb.push_bind(v.as_str()),
        FieldChange::SubscriptionPlan(v) => qb.push_bind(v.map(|p| p.as_str())),
        FieldChange::IsSubscribed(v) => qb.push_bind(*v),
        FieldChange::SubscriptionExpiresAt(v) => qb.push_bind(*v),
    };
}

/// Database row for the `users` table.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    current_challenge_id: Option<i64>,
    challenge_assigned_at: Option<DateTime<Utc>>,
    daily_challenge_completed: bool,
    challenge_completed_at: Option<DateTime<Utc>>,
    last_challenge_date: Option<String>,
    challenge_streak: i32,
    total_xp: i32,
    is_in_trial_period: bool,
    trial_request_count: i32,
    last_trial_request_reset_date: Option<NaiveDate>,
    subscription_tier: String,
    subscription_plan: Option<String>,
    is_subscribed: bool,
    subscription_expires_at: Option<DateTime<Utc>>,
    version: i64,
}

impl UserRow {
    fn into_state(self) -> EngagementState {
        EngagementState {
            current_challenge_id: self.current_challenge_id,
            challenge_assigned_at: self.challenge_assigned_at,
            daily_challenge_completed: self.daily_challenge_completed,
            challenge_completed_at: self.challenge_completed_at,
            last_challenge_date: self.last_challenge_date,
            challenge_streak: from_db_count(self.challenge_streak),
            total_xp: from_db_count(self.total_xp),
            is_in_trial_period: self.is_in_trial_period,
            trial_request_count: from_db_count(self.trial_request_count),
            last_trial_request_reset_date: self
                .last_trial_request_reset_date
                .map(CalendarDay::from_naive),
            subscription_tier: SubscriptionTier::parse_lenient(&self.subscription_tier),
            subscription_plan: self
                .subscription_plan
                .as_deref()
                .and_then(SubscriptionPlan::parse),
            is_subscribed: self.is_subscribed,
            subscription_expires_at: self.subscription_expires_at,
            version: self.version,
        }
    }
}
