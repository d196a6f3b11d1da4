//! Reward and Redemption Types
//!
//! A redemption exchanges points for a reward and moves through
//! `Pending -> {Approved -> Completed | Rejected}`. Auto-fulfillable
//! rewards skip straight to `Completed` at request time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{RedemptionId, RewardId, UserId};
use crate::tier::Tier;

/// Reward kind; decides the fulfillment path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardKind {
    /// Percentage discount coupon, issued automatically
    Discount,
    /// Free-shipping coupon, issued automatically
    FreeShipping,
    /// Physical item, shipped after admin approval
    PhysicalReward,
    /// Access grant (early sales, members-only pages), admin approved
    ExclusiveAccess,
}

impl RewardKind {
    /// Whether redemption completes without an admin decision
    pub fn is_auto_fulfilled(&self) -> bool {
        matches!(self, RewardKind::Discount | RewardKind::FreeShipping)
    }
}

/// Reward definition with stock and eligibility rules
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub name: String,
    pub kind: RewardKind,
    /// Points debited on redemption
    pub points_cost: i64,
    /// None = unlimited stock; Some(n) = initial stock limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_limit: Option<u32>,
    /// Remaining stock; only meaningful when stock_limit is set.
    /// Mutated exclusively through the store's conditional primitives.
    pub current_stock: u32,
    /// None = unlimited redemptions per user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_user: Option<u32>,
    /// Minimum tier, if gated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_tier: Option<Tier>,
    pub valid_from: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Reward {
    /// Whether the reward is active and inside `[valid_from, valid_until)`
    pub fn is_redeemable_at(&self, ts: DateTime<Utc>) -> bool {
        if !self.is_active || ts < self.valid_from {
            return false;
        }
        match self.valid_until {
            Some(until) => ts < until,
            None => true,
        }
    }

    /// Whether stock accounting applies to this reward
    pub fn is_stock_limited(&self) -> bool {
        self.stock_limit.is_some()
    }
}

/// Redemption lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl RedemptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionStatus::Pending => "PENDING",
            RedemptionStatus::Approved => "APPROVED",
            RedemptionStatus::Rejected => "REJECTED",
            RedemptionStatus::Completed => "COMPLETED",
        }
    }

    /// Allowed transitions: Pending -> Approved | Rejected | Completed
    /// (direct Completed covers auto-fulfilled rewards), Approved -> Completed.
    pub fn can_transition_to(&self, to: RedemptionStatus) -> bool {
        matches!(
            (self, to),
            (RedemptionStatus::Pending, RedemptionStatus::Approved)
                | (RedemptionStatus::Pending, RedemptionStatus::Rejected)
                | (RedemptionStatus::Pending, RedemptionStatus::Completed)
                | (RedemptionStatus::Approved, RedemptionStatus::Completed)
        )
    }

    /// Statuses that count against `max_per_user` (invariant 5)
    pub fn counts_toward_limit(&self) -> bool {
        !matches!(self, RedemptionStatus::Rejected)
    }
}

/// A request to exchange points for a reward
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: RedemptionId,
    pub user_id: UserId,
    pub reward_id: RewardId,
    /// Points debited when the redemption was created; refunded on reject
    pub points_spent: i64,
    pub status: RedemptionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl Redemption {
    pub fn new(user_id: UserId, reward_id: RewardId, points_spent: i64, status: RedemptionStatus) -> Self {
        Self {
            id: RedemptionId::generate(),
            user_id,
            reward_id,
            points_spent,
            status,
            created_at: Utc::now(),
            decided_at: None,
            rejection_reason: None,
        }
    }
}

/// Coupon issued when an auto-fulfillable redemption completes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub redemption_id: RedemptionId,
    pub user_id: UserId,
    pub kind: RewardKind,
    pub issued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_auto_fulfillment_split() {
        assert!(RewardKind::Discount.is_auto_fulfilled());
        assert!(RewardKind::FreeShipping.is_auto_fulfilled());
        assert!(!RewardKind::PhysicalReward.is_auto_fulfilled());
        assert!(!RewardKind::ExclusiveAccess.is_auto_fulfilled());
    }

    #[test]
    fn test_status_transitions() {
        use RedemptionStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Completed));
        assert!(Approved.can_transition_to(Completed));

        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Completed.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Rejected));
    }

    #[test]
    fn test_rejected_frees_limit_slot() {
        assert!(RedemptionStatus::Pending.counts_toward_limit());
        assert!(RedemptionStatus::Approved.counts_toward_limit());
        assert!(RedemptionStatus::Completed.counts_toward_limit());
        assert!(!RedemptionStatus::Rejected.counts_toward_limit());
    }

    #[test]
    fn test_redeemable_window() {
        let reward = Reward {
            id: RewardId::new("rwd:1"),
            name: "10% off".to_string(),
            kind: RewardKind::Discount,
            points_cost: 250,
            stock_limit: None,
            current_stock: 0,
            max_per_user: Some(3),
            requires_tier: None,
            valid_from: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            valid_until: Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()),
            is_active: true,
        };

        assert!(reward.is_redeemable_at(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()));
        assert!(!reward.is_redeemable_at(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()));
        assert!(!reward.is_redeemable_at(Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap()));
    }
}
