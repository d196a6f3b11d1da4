//! Admin Maintenance Operations
//!
//! Catalog seeding and recurring challenge generation. Every operation here
//! is idempotent: badge init upserts by code, challenge generation is
//! create-if-absent on period-scoped codes, so schedulers can re-run them
//! freely.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loyalty_core::catalog::{
    daily_challenge_templates, default_badges, weekly_challenge_templates, ChallengeTemplate,
};
use loyalty_core::types::{Redemption, Reward};
use loyalty_core::{LoyaltyError, LoyaltyResult};
use loyalty_store::{LoyaltyStore, OverviewStats};

/// Outcome of one challenge generation run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Definitions created by this run
    pub created: u32,
    /// Definitions that already existed for the period
    pub skipped: u32,
}

/// Administrative operations over the catalogs and redemption queue
pub struct AdminOps {
    store: Arc<dyn LoyaltyStore>,
}

impl AdminOps {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self { store }
    }

    /// Seed or refresh the default badge catalog. Returns the number of
    /// badges written.
    pub async fn init_badges(&self) -> LoyaltyResult<u32> {
        let badges = default_badges();
        for badge in &badges {
            self.store.upsert_badge(badge).await?;
        }
        tracing::info!(count = badges.len(), "badge catalog initialized");
        Ok(badges.len() as u32)
    }

    /// Generate the daily challenge definitions for the day containing `now`
    pub async fn generate_daily(&self, now: DateTime<Utc>) -> LoyaltyResult<GenerationSummary> {
        self.generate(&daily_challenge_templates(), now).await
    }

    /// Generate the weekly challenge definitions for the week containing `now`
    pub async fn generate_weekly(&self, now: DateTime<Utc>) -> LoyaltyResult<GenerationSummary> {
        self.generate(&weekly_challenge_templates(), now).await
    }

    /// Create or replace a reward definition
    pub async fn upsert_reward(&self, reward: &Reward) -> LoyaltyResult<()> {
        if reward.points_cost <= 0 {
            return Err(LoyaltyError::validation(format!(
                "reward {} must cost a positive number of points",
                reward.id.as_str()
            )));
        }
        if let Some(limit) = reward.stock_limit {
            if reward.current_stock > limit {
                return Err(LoyaltyError::validation(format!(
                    "reward {} stock {} exceeds its limit {}",
                    reward.id.as_str(),
                    reward.current_stock,
                    limit
                )));
            }
        }
        self.store.upsert_reward(reward).await?;
        tracing::info!(reward_id = %reward.id, "reward upserted");
        Ok(())
    }

    /// Redemptions awaiting a decision, oldest first
    pub async fn pending_redemptions(&self) -> LoyaltyResult<Vec<Redemption>> {
        Ok(self
            .store
            .list_redemptions_by_status(loyalty_core::types::RedemptionStatus::Pending)
            .await?)
    }

    /// Aggregate program statistics
    pub async fn overview(&self) -> LoyaltyResult<OverviewStats> {
        Ok(self.store.overview().await?)
    }

    async fn generate(
        &self,
        templates: &[ChallengeTemplate],
        now: DateTime<Utc>,
    ) -> LoyaltyResult<GenerationSummary> {
        let mut summary = GenerationSummary::default();
        for template in templates {
            let challenge = template.for_period(now);
            if self.store.ensure_challenge(&challenge).await? {
                summary.created += 1;
            } else {
                summary.skipped += 1;
            }
        }
        tracing::info!(
            created = summary.created,
            skipped = summary.skipped,
            "challenge generation run"
        );
        Ok(summary)
    }
}
