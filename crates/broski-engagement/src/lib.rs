//! # broski-engagement: Daily Engagement State Machine
//!
//! Per-user bookkeeping for the daily challenge loop and the trial request
//! quota:
//!
//! - **Rotation** ([`challenge::ensure_daily_challenge`]): lazily assigns the
//!   next challenge once a rolling 24h cycle has passed, and heals records
//!   whose challenge id or timestamps are missing or invalid.
//! - **Completion** ([`challenge::complete_challenge`]): awards XP once per
//!   cycle, updates the consecutive-day streak and the derived level.
//! - **Trial quota** ([`trial::consume_trial_quota`]): 40 requests per UTC
//!   calendar day for users in a subscription trial.
//! - **Entitlement sync** ([`subscription::apply_entitlement`]) and per-tier
//!   **usage limits** ([`usage::UsageCheck`]).
//!
//! The transitions are pure functions of `(state, catalog, now)`.
//! [`EngagementService`] runs them inside [`UserStore::modify`], which
//! serializes read-modify-write cycles per user, so concurrent requests for
//! the same user cannot double-award XP or slip past the trial ceiling.
//!
//! ## Crate Policy
//!
//! - Depends only on `broski-core` within the workspace.
//! - No HTTP, no SQL. Storage backends implement [`UserStore`] elsewhere.
//! - Time enters only through [`Clock`].

pub mod catalog;
pub mod challenge;
pub mod clock;
pub mod error;
pub mod level;
pub mod service;
pub mod state;
pub mod store;
pub mod streak;
pub mod subscription;
pub mod trial;
pub mod usage;

pub use catalog::{ChallengeCatalog, ChallengeDefinition, DEFAULT_CHALLENGE_REWARD};
pub use challenge::{CompletionOutcome, CompletionReceipt, CHALLENGE_CYCLE_HOURS};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CatalogError, EngagementError, StoreError};
pub use level::{Level, LevelName, XP_PER_LEVEL};
pub use service::EngagementService;
pub use state::{EngagementPatch, EngagementState, FieldChange};
pub use store::{InMemoryUserStore, Transition, UserStore};
pub use subscription::{
    EntitlementSnapshot, PeriodType, SubscriptionPlan, SubscriptionTier,
};
pub use trial::{TrialDecision, TrialUsage, TRIAL_DAILY_LIMIT};
pub use usage::UsageCheck;
