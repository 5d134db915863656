//! # Entitlement Sync
//!
//! Applies a billing entitlement snapshot to a user's engagement record.
//! This is the collaborator that decides `is_in_trial_period`, which the
//! trial quota reads.
//!
//! The snapshot is provider-neutral: whatever receives webhooks or polls the
//! billing provider normalizes its payload into an [`EntitlementSnapshot`]
//! before calling in here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::EngagementState;

/// Subscription tier of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    /// No paid entitlement.
    #[default]
    Free,
    /// Paid "pro" entitlement.
    Pro,
    /// Top tier. Older clients call it "gold".
    #[serde(alias = "gold")]
    Elite,
}

impl SubscriptionTier {
    /// Parse a tier name. Case-insensitive; `gold` maps to `Elite`; anything
    /// unrecognised is `Free`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pro" => Self::Pro,
            "elite" | "gold" => Self::Elite,
            _ => Self::Free,
        }
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Elite => "elite",
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing period of a subscription product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    Weekly,
    Monthly,
    Yearly,
}

impl SubscriptionPlan {
    /// Infer the plan from a store product identifier such as
    /// `broski_pro_monthly_v2`. Checked in weekly, monthly, yearly order.
    pub fn from_product_identifier(product: &str) -> Option<Self> {
        if product.contains("weekly") {
            Some(Self::Weekly)
        } else if product.contains("monthly") {
            Some(Self::Monthly)
        } else if product.contains("yearly") {
            Some(Self::Yearly)
        } else {
            None
        }
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Parse the stable lowercase name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }
}

/// Period type of the active entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    /// Free trial.
    Trial,
    /// Discounted introductory period.
    Intro,
    /// Regular paid period.
    Normal,
}

/// Normalized entitlement as reported by the billing provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSnapshot {
    /// Whether the "pro" entitlement is currently active.
    pub is_active: bool,
    /// Store product identifier backing the entitlement.
    #[serde(default)]
    pub product_identifier: Option<String>,
    /// Period type of the current billing period.
    #[serde(default)]
    pub period_type: Option<PeriodType>,
    /// When the entitlement lapses.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl EntitlementSnapshot {
    /// Whether this snapshot puts the user in a trial period.
    pub fn is_trial(&self) -> bool {
        self.is_active && self.period_type == Some(PeriodType::Trial)
    }
}

/// Apply an entitlement snapshot to a state, returning the updated state.
pub fn apply_entitlement(state: &EngagementState, snapshot: &EntitlementSnapshot) -> EngagementState {
    let mut next = state.clone();
    next.subscription_tier = if snapshot.is_active {
        SubscriptionTier::Pro
    } else {
        SubscriptionTier::Free
    };
    next.subscription_plan = snapshot
        .product_identifier
        .as_deref()
        .and_then(SubscriptionPlan::from_product_identifier);
    next.is_subscribed = snapshot.is_active;
    next.is_in_trial_period = snapshot.is_trial();
    next.subscription_expires_at = snapshot.expires_at;
    next
}
