//! Challenge Types
//!
//! A challenge is a recurring or one-time goal tracked over a defined time
//! window. Progress rows are keyed on (user, challenge, period); repeatable
//! challenges "reset" implicitly because the next period computes a new
//! period key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{ChallengeId, UserId};
use super::event::EventKind;

/// Challenge recurrence kind; drives the period key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeKind {
    Daily,
    Weekly,
    Monthly,
    OneTime,
    Special,
}

/// What a challenge counts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeTarget {
    /// Completed purchases
    PurchaseCount,
    /// Whole currency units spent
    SpendTotal,
    /// Submitted reviews
    ReviewCount,
    /// Confirmed referrals
    ReferralCount,
    /// Page visits (exploration)
    VisitCount,
    /// Wishlist additions (exploration)
    WishlistCount,
}

impl ChallengeTarget {
    /// Progress delta contributed by an event, if the event counts toward
    /// this target at all. Purchase amounts accrue as whole currency units
    /// so progress stays an integer counter.
    pub fn delta_for(&self, kind: &EventKind) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;
        match (self, kind) {
            (ChallengeTarget::PurchaseCount, EventKind::PurchaseCompleted { .. }) => Some(1),
            (ChallengeTarget::SpendTotal, EventKind::PurchaseCompleted { amount, .. }) => {
                amount.trunc().to_i64().filter(|v| *v > 0)
            }
            (ChallengeTarget::ReviewCount, EventKind::ReviewSubmitted { .. }) => Some(1),
            (ChallengeTarget::ReferralCount, EventKind::ReferralConfirmed { .. }) => Some(1),
            (ChallengeTarget::VisitCount, EventKind::PageVisited) => Some(1),
            (ChallengeTarget::WishlistCount, EventKind::WishlistAdded) => Some(1),
            _ => None,
        }
    }
}

/// Challenge definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// Definition identifier
    pub id: ChallengeId,
    /// Unique code; generated recurring definitions embed the period,
    /// e.g. `DAILY_VISIT:2026-08-29`
    pub code: String,
    /// Display name
    pub name: String,
    /// Recurrence kind
    pub kind: ChallengeKind,
    /// What is counted
    pub target: ChallengeTarget,
    /// Value `current_value` must reach
    pub target_value: i64,
    /// Points credited on completion
    pub points_reward: i64,
    /// Whether the challenge can complete in more than one period
    pub is_repeatable: bool,
    /// Upper bound on completions across all periods
    pub max_completions: u32,
    /// Start of the qualifying window (inclusive)
    pub starts_at: DateTime<Utc>,
    /// End of the qualifying window (exclusive); None = open-ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    /// Inactive challenges accept no progress
    pub is_active: bool,
}

impl Challenge {
    /// Whether an event at `ts` falls inside `[starts_at, ends_at)`
    pub fn is_open_at(&self, ts: DateTime<Utc>) -> bool {
        if ts < self.starts_at {
            return false;
        }
        match self.ends_at {
            Some(end) => ts < end,
            None => true,
        }
    }
}

/// Progress status for one (user, challenge, period) row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    InProgress,
    Completed,
}

/// Per-user, per-period progress against a challenge. Created lazily on
/// the first qualifying event of a period, mutated until completion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeProgress {
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub period_key: String,
    pub current_value: i64,
    /// Completions across all periods of this challenge for this user
    pub completions: u32,
    pub status: ProgressStatus,
    pub updated_at: DateTime<Utc>,
}

impl ChallengeProgress {
    /// Fresh row for the first qualifying event of a period
    pub fn new(user_id: UserId, challenge_id: ChallengeId, period_key: impl Into<String>) -> Self {
        Self {
            user_id,
            challenge_id,
            period_key: period_key.into(),
            current_value: 0,
            completions: 0,
            status: ProgressStatus::InProgress,
            updated_at: Utc::now(),
        }
    }
}
