//! Challenge Tracker
//!
//! Routes qualifying events into per-period progress rows and pays the
//! reward the moment a row completes. The store decides completion
//! atomically, so two racing events can both add progress but only one
//! observes the completion; the payout credit is keyed on
//! (challenge, user, period) as a second line of defense against replays.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loyalty_core::period::period_key;
use loyalty_core::types::{
    Challenge, ChallengeId, ChallengeProgress, DomainEvent, PointTransaction, UserId,
};
use loyalty_core::{LoyaltyError, LoyaltyResult};
use loyalty_store::LoyaltyStore;

use crate::retry::RetryPolicy;

/// A challenge completion produced by one event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeCompletion {
    pub challenge_id: ChallengeId,
    pub code: String,
    pub points_awarded: i64,
}

/// Tracks challenge progress and completion payouts
pub struct ChallengeTracker {
    store: Arc<dyn LoyaltyStore>,
    retry: RetryPolicy,
}

impl ChallengeTracker {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Fan one event out to every active challenge it counts toward.
    /// Challenges whose window does not contain the event timestamp are
    /// skipped without error.
    pub async fn record_event(&self, event: &DomainEvent) -> LoyaltyResult<Vec<ChallengeCompletion>> {
        let challenges = self.store.list_active_challenges().await?;
        let mut completions = Vec::new();

        for challenge in &challenges {
            let Some(delta) = challenge.target.delta_for(&event.kind) else {
                continue;
            };
            if !challenge.is_open_at(event.occurred_at) {
                continue;
            }
            if let Some(completion) = self
                .advance(challenge, &event.user_id, event.occurred_at, delta)
                .await?
            {
                completions.push(completion);
            }
        }
        Ok(completions)
    }

    /// Directly add progress to one challenge, for callers outside the
    /// event path. Unlike [`record_event`](Self::record_event), a closed
    /// window here is an error.
    pub async fn record_progress(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
        delta: i64,
        at: DateTime<Utc>,
    ) -> LoyaltyResult<ChallengeProgress> {
        let challenge = self
            .store
            .get_challenge(challenge_id)
            .await?
            .ok_or_else(|| LoyaltyError::ChallengeNotFound {
                id: challenge_id.as_str().to_string(),
            })?;
        if delta <= 0 {
            return Err(LoyaltyError::InvalidProgressDelta {
                code: challenge.code.clone(),
                delta,
            });
        }
        if !challenge.is_active || !challenge.is_open_at(at) {
            return Err(LoyaltyError::ChallengeExpired {
                code: challenge.code.clone(),
                at: at.to_rfc3339(),
            });
        }

        let key = period_key(challenge.kind, at);
        let update = self
            .retry
            .run(|| async {
                self.store
                    .apply_progress(&challenge, user_id, &key, delta)
                    .await
                    .map_err(LoyaltyError::from)
            })
            .await?;
        if update.completed_now {
            self.pay_completion(&challenge, user_id, &key).await?;
        }
        Ok(update.progress)
    }

    /// Progress rows for a user across all challenges and periods
    pub async fn progress_for(&self, user_id: &UserId) -> LoyaltyResult<Vec<ChallengeProgress>> {
        Ok(self.store.list_progress(user_id).await?)
    }

    /// Active challenge definitions
    pub async fn active_challenges(&self) -> LoyaltyResult<Vec<Challenge>> {
        Ok(self.store.list_active_challenges().await?)
    }

    async fn advance(
        &self,
        challenge: &Challenge,
        user_id: &UserId,
        at: DateTime<Utc>,
        delta: i64,
    ) -> LoyaltyResult<Option<ChallengeCompletion>> {
        let key = period_key(challenge.kind, at);
        let update = self
            .retry
            .run(|| async {
                self.store
                    .apply_progress(challenge, user_id, &key, delta)
                    .await
                    .map_err(LoyaltyError::from)
            })
            .await?;

        if !update.completed_now {
            return Ok(None);
        }
        self.pay_completion(challenge, user_id, &key).await?;
        Ok(Some(ChallengeCompletion {
            challenge_id: challenge.id.clone(),
            code: challenge.code.clone(),
            points_awarded: challenge.points_reward,
        }))
    }

    async fn pay_completion(
        &self,
        challenge: &Challenge,
        user_id: &UserId,
        period: &str,
    ) -> LoyaltyResult<()> {
        if challenge.points_reward <= 0 {
            return Ok(());
        }
        let tx = PointTransaction::credit(
            user_id.clone(),
            challenge.points_reward,
            format!("CHALLENGE:{}", challenge.code),
            Some(format!(
                "{}:{}:{}",
                challenge.id.as_str(),
                user_id.as_str(),
                period
            )),
        );
        self.store.append_credit(&tx).await?;
        tracing::info!(
            user_id = %user_id,
            challenge = %challenge.code,
            period,
            points = challenge.points_reward,
            "challenge completed"
        );
        Ok(())
    }
}
