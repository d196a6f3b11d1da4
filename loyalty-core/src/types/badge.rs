//! Badge Types
//!
//! A badge is a permanent, one-time achievement. Awards are write-once:
//! at most one `BadgeAward` per (user, badge), enforced by the store's
//! uniqueness primitive rather than application logic alone.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{BadgeCode, UserId};
use super::event::UserCounters;

/// Badge definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    /// Unique code, primary key of the catalog
    pub code: BadgeCode,
    /// Display name
    pub name: String,
    /// Unlock requirement
    pub requirement: BadgeRequirement,
    /// Bonus points credited on award
    pub points_reward: i64,
    /// Hidden from the public catalog until awarded
    pub is_secret: bool,
    /// Inactive badges are never evaluated
    pub is_active: bool,
}

/// Closed set of badge unlock requirements
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeRequirement {
    /// Lifetime completed purchases reaches the threshold
    PurchaseCount { threshold: u64 },
    /// Lifetime spend reaches the threshold
    TotalSpent { threshold: Decimal },
    /// Lifetime published reviews reaches the threshold
    ReviewCount { threshold: u64 },
    /// Lifetime confirmed referrals reaches the threshold
    ReferralCount { threshold: u64 },
    /// A per-user streak counter reaches the threshold
    Streak { metric: StreakMetric, periods: u32 },
    /// Predicate keyed on the badge code, evaluated per event
    Special { predicate: SpecialBadge },
}

impl BadgeRequirement {
    /// Compare the caller-supplied lifetime counters against a threshold
    /// requirement. Streak and special requirements are evaluated
    /// elsewhere and always return false here.
    pub fn met_by_counters(&self, counters: &UserCounters) -> bool {
        match self {
            BadgeRequirement::PurchaseCount { threshold } => {
                counters.purchase_count >= *threshold
            }
            BadgeRequirement::TotalSpent { threshold } => counters.total_spent >= *threshold,
            BadgeRequirement::ReviewCount { threshold } => counters.review_count >= *threshold,
            BadgeRequirement::ReferralCount { threshold } => {
                counters.referral_count >= *threshold
            }
            BadgeRequirement::Streak { .. } | BadgeRequirement::Special { .. } => false,
        }
    }
}

/// Streak metrics tracked per user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreakMetric {
    /// Consecutive calendar months with at least one purchase
    MonthlyPurchase,
}

impl StreakMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreakMetric::MonthlyPurchase => "monthly_purchase",
        }
    }
}

/// Closed set of special (secret) badge predicates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecialBadge {
    /// Purchase completed before 08:00
    EarlyBird,
    /// Fifth purchase completed on a weekend
    WeekendWarrior,
}

impl SpecialBadge {
    /// Named per-user counter backing the predicate, if it needs one
    pub fn counter_name(&self) -> Option<&'static str> {
        match self {
            SpecialBadge::EarlyBird => None,
            SpecialBadge::WeekendWarrior => Some("weekend_purchases"),
        }
    }
}

/// Record of a badge having been awarded to a user, write-once
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BadgeAward {
    pub user_id: UserId,
    pub badge_code: BadgeCode,
    pub awarded_at: DateTime<Utc>,
}

/// Per-user consecutive-period counter backing STREAK requirements.
/// Advances when the observed period immediately follows the recorded
/// one, stays put on a replay of the same period, resets otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreakCounter {
    pub user_id: UserId,
    pub metric: StreakMetric,
    pub current: u32,
    pub last_period_key: String,
}
