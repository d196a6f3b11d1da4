//! Loyalty Domain Types

pub mod badge;
pub mod challenge;
pub mod common;
pub mod event;
pub mod ledger;
pub mod reward;

pub use badge::{Badge, BadgeAward, BadgeRequirement, SpecialBadge, StreakCounter, StreakMetric};
pub use challenge::{
    Challenge, ChallengeKind, ChallengeProgress, ChallengeTarget, ProgressStatus,
};
pub use common::{BadgeCode, ChallengeId, RedemptionId, RewardId, UserId};
pub use event::{DomainEvent, EventKind, UserCounters};
pub use ledger::PointTransaction;
pub use reward::{Coupon, Redemption, RedemptionStatus, Reward, RewardKind};
