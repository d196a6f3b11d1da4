//! Badge Evaluator
//!
//! Evaluates the badge catalog against each inbound event. Threshold
//! requirements compare the lifetime counters supplied with the event;
//! streak and special requirements consume engine-maintained state
//! (streak counters, named per-user counters).
//!
//! Awards are exactly-once per (user, badge): the store's unique-insert
//! primitive decides the winner under concurrent evaluation, and the bonus
//! credit is keyed so replays never double-pay. A failed credit rolls the
//! award row back, keeping "awarded implies credited".

use std::sync::Arc;

use chrono::{DateTime, Utc};

use loyalty_core::period::{period_key, previous_period_key};
use loyalty_core::types::{
    Badge, BadgeAward, BadgeCode, BadgeRequirement, ChallengeKind, DomainEvent, EventKind,
    PointTransaction, SpecialBadge, StreakMetric, UserCounters, UserId,
};
use loyalty_core::{LoyaltyError, LoyaltyResult};
use loyalty_store::LoyaltyStore;

use crate::retry::RetryPolicy;

/// Hour of day before which a purchase counts as early-bird. Compared in
/// UTC: event timestamps arrive without a customer timezone, so "morning"
/// is the platform's morning, not the buyer's local one.
const EARLY_BIRD_HOUR: u32 = 8;

/// Weekend purchases needed for the weekend-warrior badge
const WEEKEND_WARRIOR_COUNT: u64 = 5;

/// Evaluates badge requirements and issues awards
pub struct BadgeEvaluator {
    store: Arc<dyn LoyaltyStore>,
    retry: RetryPolicy,
}

impl BadgeEvaluator {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Evaluate every active badge against one event, awarding all that
    /// are newly met. Returns the badges awarded by this call.
    pub async fn evaluate(
        &self,
        event: &DomainEvent,
        counters: &UserCounters,
    ) -> LoyaltyResult<Vec<Badge>> {
        let badges = self.store.list_badges().await?;

        // Event-derived signals, computed once per event
        let mut streak = None;
        let mut weekend_purchases = None;
        if matches!(event.kind, EventKind::PurchaseCompleted { .. }) {
            let key = period_key(ChallengeKind::Monthly, event.occurred_at);
            let previous = previous_period_key(ChallengeKind::Monthly, event.occurred_at);
            let current = self
                .retry
                .run(|| async {
                    self.store
                        .advance_streak(
                            &event.user_id,
                            StreakMetric::MonthlyPurchase,
                            &key,
                            &previous,
                        )
                        .await
                        .map_err(LoyaltyError::from)
                })
                .await?;
            streak = Some(current);

            if event.is_weekend() {
                let count = self
                    .store
                    .increment_counter(&event.user_id, "weekend_purchases")
                    .await?;
                weekend_purchases = Some(count);
            }
        }

        let mut awarded = Vec::new();
        for badge in badges.iter().filter(|b| b.is_active) {
            let met = match &badge.requirement {
                BadgeRequirement::PurchaseCount { .. }
                | BadgeRequirement::TotalSpent { .. }
                | BadgeRequirement::ReviewCount { .. }
                | BadgeRequirement::ReferralCount { .. } => {
                    badge.requirement.met_by_counters(counters)
                }
                BadgeRequirement::Streak { periods, .. } => {
                    streak.is_some_and(|current| current >= *periods)
                }
                BadgeRequirement::Special {
                    predicate: SpecialBadge::EarlyBird,
                } => {
                    matches!(event.kind, EventKind::PurchaseCompleted { .. })
                        && event.hour() < EARLY_BIRD_HOUR
                }
                BadgeRequirement::Special {
                    predicate: SpecialBadge::WeekendWarrior,
                } => weekend_purchases.is_some_and(|count| count >= WEEKEND_WARRIOR_COUNT),
            };

            if met && self.award(&event.user_id, badge, event.occurred_at).await? {
                awarded.push(badge.clone());
            }
        }
        Ok(awarded)
    }

    /// Award a badge by code, crediting its bonus points. Returns false
    /// when the user already holds it.
    pub async fn award_by_code(&self, user_id: &UserId, code: &BadgeCode) -> LoyaltyResult<bool> {
        let badge = self
            .store
            .get_badge(code)
            .await?
            .ok_or_else(|| LoyaltyError::BadgeNotFound {
                code: code.as_str().to_string(),
            })?;
        self.award(user_id, &badge, Utc::now()).await
    }

    /// Badges awarded to a user, oldest first
    pub async fn awards(&self, user_id: &UserId) -> LoyaltyResult<Vec<BadgeAward>> {
        Ok(self.store.list_awards(user_id).await?)
    }

    /// The badge catalog. `include_secret` controls whether secret badges
    /// appear before being earned.
    pub async fn catalog(&self, include_secret: bool) -> LoyaltyResult<Vec<Badge>> {
        let badges = self.store.list_badges().await?;
        Ok(badges
            .into_iter()
            .filter(|b| b.is_active && (include_secret || !b.is_secret))
            .collect())
    }

    async fn award(
        &self,
        user_id: &UserId,
        badge: &Badge,
        at: DateTime<Utc>,
    ) -> LoyaltyResult<bool> {
        let award = BadgeAward {
            user_id: user_id.clone(),
            badge_code: badge.code.clone(),
            awarded_at: at,
        };
        if !self.store.try_award_badge(&award).await? {
            return Ok(false);
        }

        if badge.points_reward > 0 {
            let tx = PointTransaction::credit(
                user_id.clone(),
                badge.points_reward,
                format!("BADGE:{}", badge.code.as_str()),
                Some(format!("{}:{}", badge.code.as_str(), user_id.as_str())),
            );
            if let Err(err) = self.store.append_credit(&tx).await {
                if let Err(rollback_err) = self.store.remove_award(user_id, &badge.code).await {
                    tracing::error!(
                        user_id = %user_id,
                        badge = %badge.code,
                        error = %rollback_err,
                        "failed to roll back award after credit failure"
                    );
                }
                return Err(err.into());
            }
        }

        tracing::info!(user_id = %user_id, badge = %badge.code, points = badge.points_reward, "badge awarded");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use loyalty_core::catalog::default_badges;
    use loyalty_store::MemoryStore;
    use rust_decimal::Decimal;

    async fn evaluator() -> (Arc<MemoryStore>, BadgeEvaluator) {
        let store = Arc::new(MemoryStore::new());
        let evaluator = BadgeEvaluator::new(store.clone());
        for badge in default_badges() {
            store.upsert_badge(&badge).await.unwrap();
        }
        (store, evaluator)
    }

    fn purchase(amount: i64, at: DateTime<Utc>) -> DomainEvent {
        DomainEvent::new(
            UserId::new("user:1"),
            at,
            EventKind::PurchaseCompleted {
                order_id: "ord:1".to_string(),
                amount: Decimal::new(amount, 0),
                category: None,
            },
        )
    }

    fn weekday_noon() -> DateTime<Utc> {
        // Monday
        Utc.with_ymd_and_hms(2026, 8, 31, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_first_purchase_awards_fifty_points() {
        let (store, evaluator) = evaluator().await;
        let counters = UserCounters {
            purchase_count: 1,
            total_spent: Decimal::new(30, 0),
            ..UserCounters::default()
        };

        let awarded = evaluator
            .evaluate(&purchase(30, weekday_noon()), &counters)
            .await
            .unwrap();
        assert_eq!(awarded.len(), 1);
        assert_eq!(awarded[0].code.as_str(), "FIRST_PURCHASE");
        assert_eq!(store.balance(&UserId::new("user:1")).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_replayed_event_awards_nothing_new() {
        let (store, evaluator) = evaluator().await;
        let counters = UserCounters {
            purchase_count: 1,
            ..UserCounters::default()
        };
        let event = purchase(30, weekday_noon());

        evaluator.evaluate(&event, &counters).await.unwrap();
        let second = evaluator.evaluate(&event, &counters).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(store.balance(&UserId::new("user:1")).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_early_bird_fires_before_eight() {
        let (_, evaluator) = evaluator().await;
        let counters = UserCounters::default();

        let at = Utc.with_ymd_and_hms(2026, 8, 31, 7, 59, 0).unwrap();
        let awarded = evaluator.evaluate(&purchase(20, at), &counters).await.unwrap();
        assert!(awarded.iter().any(|b| b.code.as_str() == "EARLY_BIRD"));

        let at = Utc.with_ymd_and_hms(2026, 8, 31, 8, 0, 0).unwrap();
        let awarded = evaluator
            .evaluate(
                &DomainEvent::new(
                    UserId::new("user:2"),
                    at,
                    EventKind::PurchaseCompleted {
                        order_id: "ord:2".to_string(),
                        amount: Decimal::new(20, 0),
                        category: None,
                    },
                ),
                &counters,
            )
            .await
            .unwrap();
        assert!(!awarded.iter().any(|b| b.code.as_str() == "EARLY_BIRD"));
    }

    #[tokio::test]
    async fn test_weekend_warrior_needs_five_weekend_purchases() {
        let (_, evaluator) = evaluator().await;
        let counters = UserCounters::default();
        // Saturdays across five weekends
        for week in 0..5u64 {
            let at = Utc.with_ymd_and_hms(2026, 9, 5, 12, 0, 0).unwrap()
                + chrono::Duration::weeks(week as i64);
            let awarded = evaluator.evaluate(&purchase(10, at), &counters).await.unwrap();
            let has_warrior = awarded.iter().any(|b| b.code.as_str() == "WEEKEND_WARRIOR");
            assert_eq!(has_warrior, week == 4, "week {week}");
        }
    }

    #[tokio::test]
    async fn test_monthly_streak_badge() {
        let (_, evaluator) = evaluator().await;
        let counters = UserCounters::default();
        // One purchase in each of three consecutive months
        for (month, expect) in [(1u32, false), (2, false), (3, true)] {
            let at = Utc.with_ymd_and_hms(2026, month, 15, 12, 0, 0).unwrap();
            let awarded = evaluator.evaluate(&purchase(10, at), &counters).await.unwrap();
            let has_regular = awarded.iter().any(|b| b.code.as_str() == "MONTHLY_REGULAR");
            assert_eq!(has_regular, expect, "month {month}");
        }
    }

    #[tokio::test]
    async fn test_review_event_does_not_touch_purchase_state() {
        let (store, evaluator) = evaluator().await;
        let counters = UserCounters {
            review_count: 1,
            ..UserCounters::default()
        };
        let event = DomainEvent::new(
            UserId::new("user:1"),
            weekday_noon(),
            EventKind::ReviewSubmitted {
                review_id: "rev:1".to_string(),
            },
        );

        let awarded = evaluator.evaluate(&event, &counters).await.unwrap();
        assert_eq!(awarded.len(), 1);
        assert_eq!(awarded[0].code.as_str(), "FIRST_REVIEW");
        assert!(store
            .get_streak(&UserId::new("user:1"), StreakMetric::MonthlyPurchase)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_secret_badges_hidden_from_public_catalog() {
        let (_, evaluator) = evaluator().await;
        let public = evaluator.catalog(false).await.unwrap();
        assert!(!public.iter().any(|b| b.is_secret));
        let full = evaluator.catalog(true).await.unwrap();
        assert!(full.iter().any(|b| b.is_secret));
    }
}
