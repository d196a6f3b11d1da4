//! Gamification Engine
//!
//! Service layer of the loyalty program. One [`GamificationEngine`] owns
//! the four services and fans inbound domain events out to all of them:
//!
//! - [`PointLedger`] - append-only point accounting
//! - [`BadgeEvaluator`] - one-time achievements with bonus credits
//! - [`ChallengeTracker`] - recurring goals with per-period progress
//! - [`RedemptionWorkflow`] - points-for-rewards exchange
//!
//! All services share one [`LoyaltyStore`]; correctness under concurrency
//! comes from the store's atomic primitives, not from engine-level locks.

pub mod admin;
pub mod badges;
pub mod challenges;
pub mod ledger;
pub mod retry;
pub mod rewards;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use loyalty_core::tier::Tier;
use loyalty_core::types::{
    BadgeAward, BadgeCode, ChallengeProgress, DomainEvent, StreakMetric, UserCounters, UserId,
};
use loyalty_core::LoyaltyResult;
use loyalty_store::LoyaltyStore;

pub use admin::{AdminOps, GenerationSummary};
pub use badges::BadgeEvaluator;
pub use challenges::{ChallengeCompletion, ChallengeTracker};
pub use ledger::PointLedger;
pub use retry::RetryPolicy;
pub use rewards::{CouponFulfillment, Fulfillment, RedemptionReceipt, RedemptionWorkflow};

/// Everything one ingested event produced
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub badges_awarded: Vec<BadgeCode>,
    pub challenges_completed: Vec<ChallengeCompletion>,
    /// Points credited by this event across badges and challenges
    pub points_credited: i64,
    /// Balance after all credits
    pub balance: i64,
}

/// User-facing gamification profile
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub balance: i64,
    pub lifetime_earned: i64,
    pub tier: Tier,
    /// Points still needed for the next tier, absent at the top tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_to_next_tier: Option<i64>,
    pub badges: Vec<BadgeAward>,
    pub challenges: Vec<ChallengeProgress>,
    pub monthly_purchase_streak: u32,
}

/// The assembled engine
pub struct GamificationEngine {
    store: Arc<dyn LoyaltyStore>,
    ledger: PointLedger,
    badges: BadgeEvaluator,
    challenges: ChallengeTracker,
    redemptions: RedemptionWorkflow,
    admin: AdminOps,
}

impl GamificationEngine {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self {
            ledger: PointLedger::new(store.clone()),
            badges: BadgeEvaluator::new(store.clone()),
            challenges: ChallengeTracker::new(store.clone()),
            redemptions: RedemptionWorkflow::new(store.clone()),
            admin: AdminOps::new(store.clone()),
            store,
        }
    }

    pub fn ledger(&self) -> &PointLedger {
        &self.ledger
    }

    pub fn badges(&self) -> &BadgeEvaluator {
        &self.badges
    }

    pub fn challenges(&self) -> &ChallengeTracker {
        &self.challenges
    }

    pub fn redemptions(&self) -> &RedemptionWorkflow {
        &self.redemptions
    }

    pub fn admin(&self) -> &AdminOps {
        &self.admin
    }

    /// Ingest one domain event: evaluate badges, advance challenges,
    /// report everything it earned. Safe to replay; all credits are
    /// dedup-keyed.
    pub async fn ingest(
        &self,
        event: &DomainEvent,
        counters: &UserCounters,
    ) -> LoyaltyResult<EventOutcome> {
        let awarded = self.badges.evaluate(event, counters).await?;
        let completions = self.challenges.record_event(event).await?;

        let points_credited: i64 = awarded.iter().map(|b| b.points_reward).sum::<i64>()
            + completions.iter().map(|c| c.points_awarded).sum::<i64>();
        let balance = self.store.balance(&event.user_id).await?;

        tracing::debug!(
            user_id = %event.user_id,
            event = event.kind.name(),
            badges = awarded.len(),
            completions = completions.len(),
            points_credited,
            "event ingested"
        );
        Ok(EventOutcome {
            badges_awarded: awarded.into_iter().map(|b| b.code).collect(),
            challenges_completed: completions,
            points_credited,
            balance,
        })
    }

    /// Assemble the gamification profile for one user
    pub async fn profile(&self, user_id: &UserId) -> LoyaltyResult<UserProfile> {
        let balance = self.store.balance(user_id).await?;
        let lifetime_earned = self.store.lifetime_earned(user_id).await?;
        let badges = self.store.list_awards(user_id).await?;
        let challenges = self.store.list_progress(user_id).await?;
        let streak = self
            .store
            .get_streak(user_id, StreakMetric::MonthlyPurchase)
            .await?;

        Ok(UserProfile {
            user_id: user_id.clone(),
            balance,
            lifetime_earned,
            tier: Tier::for_lifetime_points(lifetime_earned),
            points_to_next_tier: Tier::points_to_next(lifetime_earned),
            badges,
            challenges,
            monthly_purchase_streak: streak.map(|s| s.current).unwrap_or(0),
        })
    }
}
