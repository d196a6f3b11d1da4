//! Redemption Workflow
//!
//! Exchanges points for rewards. The hot path is a small saga over the
//! store's conditional primitives:
//!
//! 1. validate (no side effects): existence, window, tier gate
//! 2. conditionally take one unit of stock
//! 3. conditionally debit the points; on insufficient balance the stock
//!    unit goes back
//! 4. write the redemption row through the limit-checked insert; hitting
//!    `max_per_user` here rolls the debit and the stock unit back
//! 5. auto-fulfillable kinds complete immediately through the
//!    [`Fulfillment`] seam, the rest await an admin decision
//!
//! Rejection commits through the conditional Pending -> Rejected transition;
//! the compensations after it (stock back under a per-redemption token,
//! points refunded under a dedup key) are idempotent, and a rejection that
//! finds the row already Rejected re-applies them, so a rejection that died
//! between commit and compensation converges on retry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use loyalty_core::tier::Tier;
use loyalty_core::types::{
    Coupon, PointTransaction, Redemption, RedemptionId, RedemptionStatus, Reward, RewardId,
    RewardKind, UserId,
};
use loyalty_core::{LoyaltyError, LoyaltyResult};
use loyalty_store::{
    DebitOutcome, LoyaltyStore, RedemptionInsertOutcome, StockOutcome, TransitionOutcome,
};

use crate::retry::RetryPolicy;

/// Side-effect seam for delivering a redeemed reward.
///
/// Invoked at most once per redemption, guarded by the winning status
/// transition: at request time for auto-fulfilled kinds, at approval for
/// the rest.
#[async_trait]
pub trait Fulfillment: Send + Sync {
    async fn fulfill(
        &self,
        redemption: &Redemption,
        kind: RewardKind,
    ) -> LoyaltyResult<Option<Coupon>>;
}

/// Default fulfillment: mints a coupon for couponable kinds and leaves
/// manual kinds (shipping, access grants) to operations
pub struct CouponFulfillment;

#[async_trait]
impl Fulfillment for CouponFulfillment {
    async fn fulfill(
        &self,
        redemption: &Redemption,
        kind: RewardKind,
    ) -> LoyaltyResult<Option<Coupon>> {
        if kind.is_auto_fulfilled() {
            Ok(Some(issue_coupon(redemption, kind)))
        } else {
            Ok(None)
        }
    }
}

/// Result of a successful redemption request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub redemption: Redemption,
    /// Present for auto-fulfilled kinds (discount, free shipping)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<Coupon>,
    /// Balance after the debit
    pub balance: i64,
}

/// Runs the redemption lifecycle
pub struct RedemptionWorkflow {
    store: Arc<dyn LoyaltyStore>,
    fulfillment: Arc<dyn Fulfillment>,
    retry: RetryPolicy,
}

impl RedemptionWorkflow {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self::with_fulfillment(store, Arc::new(CouponFulfillment))
    }

    pub fn with_fulfillment(
        store: Arc<dyn LoyaltyStore>,
        fulfillment: Arc<dyn Fulfillment>,
    ) -> Self {
        Self {
            store,
            fulfillment,
            retry: RetryPolicy::default(),
        }
    }

    /// Redeem a reward for a user
    pub async fn redeem(
        &self,
        user_id: &UserId,
        reward_id: &RewardId,
    ) -> LoyaltyResult<RedemptionReceipt> {
        let now = Utc::now();
        let reward = self
            .store
            .get_reward(reward_id)
            .await?
            .ok_or_else(|| LoyaltyError::RewardNotFound {
                id: reward_id.as_str().to_string(),
            })?;

        if !reward.is_redeemable_at(now) {
            return Err(LoyaltyError::RewardExpired {
                id: reward_id.as_str().to_string(),
            });
        }
        if let Some(required) = reward.requires_tier {
            let actual = Tier::for_lifetime_points(self.store.lifetime_earned(user_id).await?);
            if actual < required {
                return Err(LoyaltyError::NotEligibleTier {
                    id: reward_id.as_str().to_string(),
                    required,
                    actual,
                });
            }
        }
        // Created before any side effect so the rollback paths can key
        // their compensations off the redemption id
        let status = if reward.kind.is_auto_fulfilled() {
            RedemptionStatus::Completed
        } else {
            RedemptionStatus::Pending
        };
        let mut redemption =
            Redemption::new(user_id.clone(), reward_id.clone(), reward.points_cost, status);
        let rollback_token = format!("rollback:{}", redemption.id.as_str());

        let stock_taken = match self
            .retry
            .run(|| async {
                self.store
                    .try_decrement_stock(reward_id)
                    .await
                    .map_err(LoyaltyError::from)
            })
            .await?
        {
            StockOutcome::Decremented { .. } => true,
            StockOutcome::Unlimited => false,
            StockOutcome::OutOfStock => {
                return Err(LoyaltyError::OutOfStock {
                    id: reward_id.as_str().to_string(),
                })
            }
        };

        let debit = PointTransaction::debit(
            user_id.clone(),
            reward.points_cost,
            format!("REDEEM:{}", reward_id.as_str()),
        );
        let balance = match self.store.append_debit(&debit).await {
            Ok(DebitOutcome::Applied { balance }) => balance,
            Ok(DebitOutcome::Insufficient { balance }) => {
                if stock_taken {
                    self.store.restore_stock(reward_id, &rollback_token).await?;
                }
                return Err(LoyaltyError::InsufficientBalance {
                    user_id: user_id.as_str().to_string(),
                    required: reward.points_cost,
                    available: balance,
                });
            }
            Err(err) => {
                if stock_taken {
                    self.store.restore_stock(reward_id, &rollback_token).await?;
                }
                return Err(err.into());
            }
        };

        if reward.kind.is_auto_fulfilled() {
            redemption.decided_at = Some(now);
        }
        let outcome = self
            .store
            .insert_redemption(&redemption, reward.max_per_user)
            .await?;
        if let RedemptionInsertOutcome::LimitReached { held } = outcome {
            let refund = PointTransaction::credit(
                user_id.clone(),
                reward.points_cost,
                format!("REFUND:{}", reward_id.as_str()),
                Some(format!("REFUND:{}", redemption.id.as_str())),
            );
            self.store.append_credit(&refund).await?;
            if stock_taken {
                self.store.restore_stock(reward_id, &rollback_token).await?;
            }
            return Err(LoyaltyError::RedemptionLimitReached {
                id: reward_id.as_str().to_string(),
                max_per_user: reward.max_per_user.unwrap_or(held),
            });
        }

        let coupon = if reward.kind.is_auto_fulfilled() {
            self.fulfillment.fulfill(&redemption, reward.kind).await?
        } else {
            None
        };

        tracing::info!(
            user_id = %user_id,
            reward_id = %reward_id,
            redemption_id = %redemption.id,
            status = redemption.status.as_str(),
            points = reward.points_cost,
            "reward redeemed"
        );
        Ok(RedemptionReceipt {
            redemption,
            coupon,
            balance,
        })
    }

    /// Approve a pending redemption. Fulfillment runs once, guarded by
    /// winning the Pending -> Approved transition; a replayed approval
    /// fails the transition and never reaches the hook.
    pub async fn approve(&self, id: &RedemptionId) -> LoyaltyResult<Redemption> {
        match self
            .transition(id, RedemptionStatus::Pending, RedemptionStatus::Approved, None)
            .await?
        {
            TransitionOutcome::Transitioned(redemption) => {
                if let Some(reward) = self.store.get_reward(&redemption.reward_id).await? {
                    self.fulfillment.fulfill(&redemption, reward.kind).await?;
                }
                tracing::info!(redemption_id = %id, "redemption approved");
                Ok(redemption)
            }
            TransitionOutcome::WrongStatus(actual) => Err(invalid_transition(
                id,
                actual,
                RedemptionStatus::Approved,
            )),
        }
    }

    /// Mark an approved redemption fulfilled
    pub async fn complete(&self, id: &RedemptionId) -> LoyaltyResult<Redemption> {
        match self
            .transition(id, RedemptionStatus::Approved, RedemptionStatus::Completed, None)
            .await?
        {
            TransitionOutcome::Transitioned(redemption) => {
                tracing::info!(redemption_id = %id, "redemption completed");
                Ok(redemption)
            }
            TransitionOutcome::WrongStatus(actual) => Err(invalid_transition(
                id,
                actual,
                RedemptionStatus::Completed,
            )),
        }
    }

    /// Reject a pending redemption, restoring stock and refunding points.
    ///
    /// The status transition is the commit point; both compensations after
    /// it are idempotent. Finding the row already Rejected means an earlier
    /// rejection committed but may have died before compensating, so the
    /// compensations are re-applied rather than the call failing.
    pub async fn reject(&self, id: &RedemptionId, reason: &str) -> LoyaltyResult<Redemption> {
        let redemption = match self
            .transition(
                id,
                RedemptionStatus::Pending,
                RedemptionStatus::Rejected,
                Some(reason.to_string()),
            )
            .await?
        {
            TransitionOutcome::Transitioned(redemption) => redemption,
            TransitionOutcome::WrongStatus(RedemptionStatus::Rejected) => self
                .store
                .get_redemption(id)
                .await?
                .ok_or_else(|| LoyaltyError::RedemptionNotFound {
                    id: id.as_str().to_string(),
                })?,
            TransitionOutcome::WrongStatus(actual) => {
                return Err(invalid_transition(id, actual, RedemptionStatus::Rejected))
            }
        };

        if let Some(reward) = self.store.get_reward(&redemption.reward_id).await? {
            if reward.is_stock_limited() {
                let token = format!("reject:{}", redemption.id.as_str());
                self.retry
                    .run(|| async {
                        self.store
                            .restore_stock(&redemption.reward_id, &token)
                            .await
                            .map_err(LoyaltyError::from)
                    })
                    .await?;
            }
        }

        let refund = PointTransaction::credit(
            redemption.user_id.clone(),
            redemption.points_spent,
            format!("REFUND:{}", redemption.reward_id.as_str()),
            Some(format!("REFUND:{}", redemption.id.as_str())),
        );
        self.store.append_credit(&refund).await?;

        tracing::info!(
            redemption_id = %id,
            user_id = %redemption.user_id,
            refunded = redemption.points_spent,
            reason,
            "redemption rejected"
        );
        Ok(redemption)
    }

    /// Currently redeemable catalog: active and inside the validity window.
    /// Tier-gated entries are included so clients can render locked rewards.
    pub async fn catalog(&self) -> LoyaltyResult<Vec<Reward>> {
        let now = Utc::now();
        let rewards = self.store.list_rewards().await?;
        Ok(rewards
            .into_iter()
            .filter(|r| r.is_redeemable_at(now))
            .collect())
    }

    /// Redemption history for a user, oldest first
    pub async fn history(&self, user_id: &UserId) -> LoyaltyResult<Vec<Redemption>> {
        Ok(self.store.list_redemptions_for_user(user_id).await?)
    }

    async fn transition(
        &self,
        id: &RedemptionId,
        from: RedemptionStatus,
        to: RedemptionStatus,
        reason: Option<String>,
    ) -> LoyaltyResult<TransitionOutcome> {
        match self.store.transition_redemption(id, from, to, reason).await {
            Ok(outcome) => Ok(outcome),
            Err(loyalty_store::StoreError::NotFound { .. }) => {
                Err(LoyaltyError::RedemptionNotFound {
                    id: id.as_str().to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn invalid_transition(id: &RedemptionId, from: RedemptionStatus, to: RedemptionStatus) -> LoyaltyError {
    LoyaltyError::InvalidRedemptionTransition {
        id: id.as_str().to_string(),
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    }
}

/// Mint a coupon for an auto-fulfilled redemption
fn issue_coupon(redemption: &Redemption, kind: RewardKind) -> Coupon {
    let token = Uuid::new_v4().simple().to_string();
    Coupon {
        code: format!("CPN-{}", token[..12].to_uppercase()),
        redemption_id: redemption.id.clone(),
        user_id: redemption.user_id.clone(),
        kind,
        issued_at: Utc::now(),
    }
}
