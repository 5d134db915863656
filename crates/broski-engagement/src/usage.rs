//! Per-tier daily analysis limits.
//!
//! Stateless: the caller supplies the current count. Nothing is persisted.

use serde::{Deserialize, Serialize};

use crate::subscription::SubscriptionTier;

/// Daily analysis allowance for a tier.
pub fn daily_limit(tier: SubscriptionTier) -> u32 {
    match tier {
        SubscriptionTier::Free => 2,
        SubscriptionTier::Pro => 50,
        SubscriptionTier::Elite => 1000,
    }
}

/// Result of a usage check or increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCheck {
    /// Whether another analysis may run.
    pub can_use: bool,
    /// Analyses counted so far today.
    pub current_usage: u32,
    /// Daily allowance for the tier.
    pub limit: u32,
    /// Analyses left today.
    pub remaining: u32,
}

impl UsageCheck {
    /// Evaluate `count` against the tier's allowance.
    pub fn evaluate(tier: SubscriptionTier, count: u32) -> Self {
        let limit = daily_limit(tier);
        Self {
            can_use: count < limit,
            current_usage: count,
            limit,
            remaining: limit.saturating_sub(count),
        }
    }

    /// Evaluate the count after one more analysis.
    pub fn after_increment(tier: SubscriptionTier, count: u32) -> Self {
        Self::evaluate(tier, count.saturating_add(1))
    }
}
