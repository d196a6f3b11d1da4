//! In-Memory Storage
//!
//! Backend for tests and development. All state sits behind a single
//! `RwLock`, so every trait primitive executes as one critical section and
//! the conditional semantics (balance floor, stock floor, unique awards,
//! at-most-once completion) hold under concurrent callers.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use loyalty_core::types::{
    Badge, BadgeAward, BadgeCode, Challenge, ChallengeId, ChallengeProgress, PointTransaction,
    ProgressStatus, Redemption, RedemptionId, RedemptionStatus, Reward, RewardId, StreakCounter,
    StreakMetric, UserId,
};

use crate::error::{StoreError, StoreResult};
use crate::{
    CreditOutcome, DebitOutcome, LoyaltyStore, OverviewStats, ProgressUpdate,
    RedemptionInsertOutcome, StockOutcome, TransitionOutcome,
};

/// Per-user ledger state
#[derive(Default)]
struct Account {
    balance: i64,
    lifetime_earned: i64,
    transactions: Vec<PointTransaction>,
    seen_source_ids: HashMap<String, ()>,
    counters: HashMap<String, u64>,
}

#[derive(Default)]
struct MemoryInner {
    accounts: HashMap<UserId, Account>,
    badges: HashMap<BadgeCode, Badge>,
    awards: HashMap<UserId, HashMap<BadgeCode, BadgeAward>>,
    streaks: HashMap<(UserId, StreakMetric), StreakCounter>,
    challenges: HashMap<ChallengeId, Challenge>,
    challenge_codes: HashMap<String, ChallengeId>,
    progress: HashMap<(UserId, ChallengeId, String), ChallengeProgress>,
    completions: HashMap<(UserId, ChallengeId), u32>,
    rewards: HashMap<RewardId, Reward>,
    stock_restores: HashSet<(RewardId, String)>,
    redemptions: HashMap<RedemptionId, Redemption>,
}

/// Thread-safe in-memory store
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoyaltyStore for MemoryStore {
    // ==================== Ledger ====================

    async fn append_credit(&self, tx: &PointTransaction) -> StoreResult<CreditOutcome> {
        let mut inner = self.inner.write().await;
        let account = inner.accounts.entry(tx.user_id.clone()).or_default();

        if let Some(source_id) = &tx.source_event_id {
            if account.seen_source_ids.contains_key(source_id) {
                return Ok(CreditOutcome::Duplicate {
                    balance: account.balance,
                });
            }
            account.seen_source_ids.insert(source_id.clone(), ());
        }

        account.balance += tx.amount;
        account.lifetime_earned += tx.amount;
        account.transactions.push(tx.clone());

        Ok(CreditOutcome::Applied {
            balance: account.balance,
        })
    }

    async fn append_debit(&self, tx: &PointTransaction) -> StoreResult<DebitOutcome> {
        let mut inner = self.inner.write().await;
        let account = inner.accounts.entry(tx.user_id.clone()).or_default();
        let debit = -tx.amount;

        if account.balance < debit {
            return Ok(DebitOutcome::Insufficient {
                balance: account.balance,
            });
        }

        account.balance += tx.amount;
        account.transactions.push(tx.clone());

        Ok(DebitOutcome::Applied {
            balance: account.balance,
        })
    }

    async fn balance(&self, user_id: &UserId) -> StoreResult<i64> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.get(user_id).map(|a| a.balance).unwrap_or(0))
    }

    async fn lifetime_earned(&self, user_id: &UserId) -> StoreResult<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .get(user_id)
            .map(|a| a.lifetime_earned)
            .unwrap_or(0))
    }

    async fn transactions(&self, user_id: &UserId) -> StoreResult<Vec<PointTransaction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .get(user_id)
            .map(|a| a.transactions.clone())
            .unwrap_or_default())
    }

    // ==================== Badges ====================

    async fn upsert_badge(&self, badge: &Badge) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.badges.insert(badge.code.clone(), badge.clone());
        Ok(())
    }

    async fn get_badge(&self, code: &BadgeCode) -> StoreResult<Option<Badge>> {
        let inner = self.inner.read().await;
        Ok(inner.badges.get(code).cloned())
    }

    async fn list_badges(&self) -> StoreResult<Vec<Badge>> {
        let inner = self.inner.read().await;
        let mut badges: Vec<_> = inner.badges.values().cloned().collect();
        badges.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(badges)
    }

    async fn try_award_badge(&self, award: &BadgeAward) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let user_awards = inner.awards.entry(award.user_id.clone()).or_default();
        if user_awards.contains_key(&award.badge_code) {
            return Ok(false);
        }
        user_awards.insert(award.badge_code.clone(), award.clone());
        Ok(true)
    }

    async fn remove_award(&self, user_id: &UserId, code: &BadgeCode) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(user_awards) = inner.awards.get_mut(user_id) {
            user_awards.remove(code);
        }
        Ok(())
    }

    async fn list_awards(&self, user_id: &UserId) -> StoreResult<Vec<BadgeAward>> {
        let inner = self.inner.read().await;
        let mut awards: Vec<_> = inner
            .awards
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        awards.sort_by(|a: &BadgeAward, b: &BadgeAward| a.awarded_at.cmp(&b.awarded_at));
        Ok(awards)
    }

    async fn advance_streak(
        &self,
        user_id: &UserId,
        metric: StreakMetric,
        period_key: &str,
        previous_key: &str,
    ) -> StoreResult<u32> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .streaks
            .entry((user_id.clone(), metric))
            .or_insert_with(|| StreakCounter {
                user_id: user_id.clone(),
                metric,
                current: 0,
                last_period_key: String::new(),
            });

        if entry.last_period_key == period_key {
            return Ok(entry.current);
        }
        entry.current = if entry.last_period_key == previous_key && entry.current > 0 {
            entry.current + 1
        } else {
            1
        };
        entry.last_period_key = period_key.to_string();
        Ok(entry.current)
    }

    async fn get_streak(
        &self,
        user_id: &UserId,
        metric: StreakMetric,
    ) -> StoreResult<Option<StreakCounter>> {
        let inner = self.inner.read().await;
        Ok(inner.streaks.get(&(user_id.clone(), metric)).cloned())
    }

    async fn increment_counter(&self, user_id: &UserId, name: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let account = inner.accounts.entry(user_id.clone()).or_default();
        let counter = account.counters.entry(name.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    // ==================== Challenges ====================

    async fn ensure_challenge(&self, challenge: &Challenge) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.challenge_codes.contains_key(&challenge.code) {
            return Ok(false);
        }
        inner
            .challenge_codes
            .insert(challenge.code.clone(), challenge.id.clone());
        inner
            .challenges
            .insert(challenge.id.clone(), challenge.clone());
        Ok(true)
    }

    async fn upsert_challenge(&self, challenge: &Challenge) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .challenge_codes
            .insert(challenge.code.clone(), challenge.id.clone());
        inner
            .challenges
            .insert(challenge.id.clone(), challenge.clone());
        Ok(())
    }

    async fn get_challenge(&self, id: &ChallengeId) -> StoreResult<Option<Challenge>> {
        let inner = self.inner.read().await;
        Ok(inner.challenges.get(id).cloned())
    }

    async fn list_active_challenges(&self) -> StoreResult<Vec<Challenge>> {
        let inner = self.inner.read().await;
        let mut challenges: Vec<_> = inner
            .challenges
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        challenges.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(challenges)
    }

    async fn apply_progress(
        &self,
        challenge: &Challenge,
        user_id: &UserId,
        period_key: &str,
        delta: i64,
    ) -> StoreResult<ProgressUpdate> {
        let mut inner = self.inner.write().await;
        let inner = &mut *inner;

        let total_completions = inner
            .completions
            .get(&(user_id.clone(), challenge.id.clone()))
            .copied()
            .unwrap_or(0);

        let row = inner
            .progress
            .entry((user_id.clone(), challenge.id.clone(), period_key.to_string()))
            .or_insert_with(|| {
                let mut fresh =
                    ChallengeProgress::new(user_id.clone(), challenge.id.clone(), period_key);
                fresh.completions = total_completions;
                fresh
            });

        row.current_value += delta;
        row.updated_at = Utc::now();

        let mut completed_now = false;
        if row.status != ProgressStatus::Completed && row.current_value >= challenge.target_value {
            let allowed = if challenge.is_repeatable {
                total_completions < challenge.max_completions
            } else {
                total_completions == 0
            };
            if allowed {
                row.status = ProgressStatus::Completed;
                row.completions = total_completions + 1;
                completed_now = true;
                inner
                    .completions
                    .insert((user_id.clone(), challenge.id.clone()), total_completions + 1);
            }
        }

        Ok(ProgressUpdate {
            progress: row.clone(),
            completed_now,
        })
    }

    async fn list_progress(&self, user_id: &UserId) -> StoreResult<Vec<ChallengeProgress>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner
            .progress
            .iter()
            .filter(|((uid, _, _), _)| uid == user_id)
            .map(|(_, row)| row.clone())
            .collect();
        rows.sort_by(|a, b| {
            (a.challenge_id.as_str(), a.period_key.as_str())
                .cmp(&(b.challenge_id.as_str(), b.period_key.as_str()))
        });
        Ok(rows)
    }

    // ==================== Rewards ====================

    async fn upsert_reward(&self, reward: &Reward) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.rewards.insert(reward.id.clone(), reward.clone());
        Ok(())
    }

    async fn get_reward(&self, id: &RewardId) -> StoreResult<Option<Reward>> {
        let inner = self.inner.read().await;
        Ok(inner.rewards.get(id).cloned())
    }

    async fn list_rewards(&self) -> StoreResult<Vec<Reward>> {
        let inner = self.inner.read().await;
        let mut rewards: Vec<_> = inner.rewards.values().cloned().collect();
        rewards.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rewards)
    }

    async fn try_decrement_stock(&self, id: &RewardId) -> StoreResult<StockOutcome> {
        let mut inner = self.inner.write().await;
        let reward = inner
            .rewards
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("Reward", id.as_str()))?;

        if reward.stock_limit.is_none() {
            return Ok(StockOutcome::Unlimited);
        }
        if reward.current_stock == 0 {
            return Ok(StockOutcome::OutOfStock);
        }
        reward.current_stock -= 1;
        Ok(StockOutcome::Decremented {
            remaining: reward.current_stock,
        })
    }

    async fn restore_stock(&self, id: &RewardId, token: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let inner = &mut *inner;
        let reward = inner
            .rewards
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("Reward", id.as_str()))?;
        if !inner
            .stock_restores
            .insert((id.clone(), token.to_string()))
        {
            // Token already applied
            return Ok(());
        }

        if let Some(limit) = reward.stock_limit {
            reward.current_stock = (reward.current_stock + 1).min(limit);
        }
        Ok(())
    }

    // ==================== Redemptions ====================

    async fn insert_redemption(
        &self,
        redemption: &Redemption,
        max_per_user: Option<u32>,
    ) -> StoreResult<RedemptionInsertOutcome> {
        let mut inner = self.inner.write().await;
        if let Some(max) = max_per_user {
            let held = inner
                .redemptions
                .values()
                .filter(|r| {
                    r.user_id == redemption.user_id
                        && r.reward_id == redemption.reward_id
                        && r.status.counts_toward_limit()
                })
                .count() as u32;
            if held >= max {
                return Ok(RedemptionInsertOutcome::LimitReached { held });
            }
        }
        inner
            .redemptions
            .insert(redemption.id.clone(), redemption.clone());
        Ok(RedemptionInsertOutcome::Inserted)
    }

    async fn get_redemption(&self, id: &RedemptionId) -> StoreResult<Option<Redemption>> {
        let inner = self.inner.read().await;
        Ok(inner.redemptions.get(id).cloned())
    }

    async fn transition_redemption(
        &self,
        id: &RedemptionId,
        from: RedemptionStatus,
        to: RedemptionStatus,
        rejection_reason: Option<String>,
    ) -> StoreResult<TransitionOutcome> {
        let mut inner = self.inner.write().await;
        let redemption = inner
            .redemptions
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("Redemption", id.as_str()))?;

        if redemption.status != from {
            return Ok(TransitionOutcome::WrongStatus(redemption.status));
        }
        redemption.status = to;
        redemption.decided_at = Some(Utc::now());
        if rejection_reason.is_some() {
            redemption.rejection_reason = rejection_reason;
        }
        Ok(TransitionOutcome::Transitioned(redemption.clone()))
    }

    async fn list_redemptions_by_status(
        &self,
        status: RedemptionStatus,
    ) -> StoreResult<Vec<Redemption>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner
            .redemptions
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn list_redemptions_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Redemption>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner
            .redemptions
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    // ==================== Stats ====================

    async fn overview(&self) -> StoreResult<OverviewStats> {
        let inner = self.inner.read().await;

        let points_issued: i64 = inner.accounts.values().map(|a| a.lifetime_earned).sum();
        let points_redeemed: i64 = inner
            .accounts
            .values()
            .flat_map(|a| a.transactions.iter())
            .filter(|tx| tx.amount < 0)
            .map(|tx| -tx.amount)
            .sum();

        Ok(OverviewStats {
            users_with_points: inner.accounts.len() as u64,
            points_issued,
            points_redeemed,
            badges_awarded: inner.awards.values().map(|m| m.len() as u64).sum(),
            challenges_completed: inner.completions.values().map(|c| *c as u64).sum(),
            pending_redemptions: inner
                .redemptions
                .values()
                .filter(|r| r.status == RedemptionStatus::Pending)
                .count() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user() -> UserId {
        UserId::new("user:1")
    }

    fn visit_challenge(target_value: i64, repeatable: bool, max: u32) -> Challenge {
        use loyalty_core::types::{ChallengeKind, ChallengeTarget};
        Challenge {
            id: ChallengeId::new("chl:visit"),
            code: "DAILY_VISIT".to_string(),
            name: "Daily Visit".to_string(),
            kind: ChallengeKind::Daily,
            target: ChallengeTarget::VisitCount,
            target_value,
            points_reward: 10,
            is_repeatable: repeatable,
            max_completions: max,
            starts_at: chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            ends_at: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_balance_is_sum_of_signed_amounts() {
        let store = MemoryStore::new();

        store
            .append_credit(&PointTransaction::credit(user(), 100, "TEST", None))
            .await
            .unwrap();
        store
            .append_credit(&PointTransaction::credit(user(), 50, "TEST", None))
            .await
            .unwrap();
        store
            .append_debit(&PointTransaction::debit(user(), 30, "TEST"))
            .await
            .unwrap();

        assert_eq!(store.balance(&user()).await.unwrap(), 120);
        assert_eq!(store.lifetime_earned(&user()).await.unwrap(), 150);

        let txs = store.transactions(&user()).await.unwrap();
        let sum: i64 = txs.iter().map(|t| t.amount).sum();
        assert_eq!(sum, 120);
    }

    #[tokio::test]
    async fn test_credit_dedup_on_source_event_id() {
        let store = MemoryStore::new();
        let tx = PointTransaction::credit(user(), 50, "BADGE:X", Some("X:user:1".to_string()));

        let first = store.append_credit(&tx).await.unwrap();
        let second = store.append_credit(&tx).await.unwrap();

        assert_eq!(first, CreditOutcome::Applied { balance: 50 });
        assert_eq!(second, CreditOutcome::Duplicate { balance: 50 });
        assert_eq!(store.balance(&user()).await.unwrap(), 50);
        assert_eq!(store.transactions(&user()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_debit_never_goes_negative() {
        let store = MemoryStore::new();
        store
            .append_credit(&PointTransaction::credit(user(), 100, "TEST", None))
            .await
            .unwrap();

        let outcome = store
            .append_debit(&PointTransaction::debit(user(), 150, "TEST"))
            .await
            .unwrap();

        assert_eq!(outcome, DebitOutcome::Insufficient { balance: 100 });
        assert_eq!(store.balance(&user()).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_award_badge_is_unique_per_pair() {
        let store = MemoryStore::new();
        let award = BadgeAward {
            user_id: user(),
            badge_code: BadgeCode::new("FIRST_PURCHASE"),
            awarded_at: Utc::now(),
        };

        assert!(store.try_award_badge(&award).await.unwrap());
        assert!(!store.try_award_badge(&award).await.unwrap());
        assert_eq!(store.list_awards(&user()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_streak_advances_and_resets() {
        let store = MemoryStore::new();
        let metric = StreakMetric::MonthlyPurchase;

        assert_eq!(
            store
                .advance_streak(&user(), metric, "2026-01", "2025-12")
                .await
                .unwrap(),
            1
        );
        // Replay of the same period: unchanged
        assert_eq!(
            store
                .advance_streak(&user(), metric, "2026-01", "2025-12")
                .await
                .unwrap(),
            1
        );
        // Consecutive period: +1
        assert_eq!(
            store
                .advance_streak(&user(), metric, "2026-02", "2026-01")
                .await
                .unwrap(),
            2
        );
        // Skipped a period: reset
        assert_eq!(
            store
                .advance_streak(&user(), metric, "2026-05", "2026-04")
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_progress_completes_once_per_period() {
        let store = MemoryStore::new();
        let challenge = visit_challenge(1, true, 100);

        let first = store
            .apply_progress(&challenge, &user(), "2026-08-29", 1)
            .await
            .unwrap();
        assert!(first.completed_now);

        let second = store
            .apply_progress(&challenge, &user(), "2026-08-29", 1)
            .await
            .unwrap();
        assert!(!second.completed_now);
        assert_eq!(second.progress.current_value, 2);
        assert_eq!(second.progress.status, ProgressStatus::Completed);

        // New period, new row, completion possible again
        let next_day = store
            .apply_progress(&challenge, &user(), "2026-08-30", 1)
            .await
            .unwrap();
        assert!(next_day.completed_now);
        assert_eq!(next_day.progress.completions, 2);
    }

    #[tokio::test]
    async fn test_non_repeatable_completes_only_once() {
        let store = MemoryStore::new();
        let challenge = visit_challenge(1, false, 1);

        let first = store
            .apply_progress(&challenge, &user(), "p1", 1)
            .await
            .unwrap();
        assert!(first.completed_now);

        let second = store
            .apply_progress(&challenge, &user(), "p2", 1)
            .await
            .unwrap();
        assert!(!second.completed_now);
    }

    #[tokio::test]
    async fn test_max_completions_cap() {
        let store = MemoryStore::new();
        let challenge = visit_challenge(1, true, 2);

        assert!(store
            .apply_progress(&challenge, &user(), "p1", 1)
            .await
            .unwrap()
            .completed_now);
        assert!(store
            .apply_progress(&challenge, &user(), "p2", 1)
            .await
            .unwrap()
            .completed_now);
        assert!(!store
            .apply_progress(&challenge, &user(), "p3", 1)
            .await
            .unwrap()
            .completed_now);
    }

    #[tokio::test]
    async fn test_stock_decrement_floor() {
        use loyalty_core::types::RewardKind;
        let store = MemoryStore::new();
        let reward = Reward {
            id: RewardId::new("rwd:shirt"),
            name: "Camiseta Premium".to_string(),
            kind: RewardKind::PhysicalReward,
            points_cost: 500,
            stock_limit: Some(1),
            current_stock: 1,
            max_per_user: None,
            requires_tier: None,
            valid_from: chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            valid_until: None,
            is_active: true,
        };
        store.upsert_reward(&reward).await.unwrap();

        assert_eq!(
            store.try_decrement_stock(&reward.id).await.unwrap(),
            StockOutcome::Decremented { remaining: 0 }
        );
        assert_eq!(
            store.try_decrement_stock(&reward.id).await.unwrap(),
            StockOutcome::OutOfStock
        );

        store.restore_stock(&reward.id, "t1").await.unwrap();
        // Restoration saturates at the limit
        store.restore_stock(&reward.id, "t2").await.unwrap();
        let restored = store.get_reward(&reward.id).await.unwrap().unwrap();
        assert_eq!(restored.current_stock, 1);
    }

    #[tokio::test]
    async fn test_restore_stock_token_applies_once() {
        use loyalty_core::types::RewardKind;
        let store = MemoryStore::new();
        let reward = Reward {
            id: RewardId::new("rwd:shirt"),
            name: "Camiseta Premium".to_string(),
            kind: RewardKind::PhysicalReward,
            points_cost: 500,
            stock_limit: Some(5),
            current_stock: 2,
            max_per_user: None,
            requires_tier: None,
            valid_from: chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            valid_until: None,
            is_active: true,
        };
        store.upsert_reward(&reward).await.unwrap();

        store.restore_stock(&reward.id, "reject:rdm:1").await.unwrap();
        // Replaying the same token is a no-op
        store.restore_stock(&reward.id, "reject:rdm:1").await.unwrap();
        let after = store.get_reward(&reward.id).await.unwrap().unwrap();
        assert_eq!(after.current_stock, 3);
    }

    #[tokio::test]
    async fn test_transition_redemption_is_conditional() {
        let store = MemoryStore::new();
        let redemption = Redemption::new(
            user(),
            RewardId::new("rwd:1"),
            250,
            RedemptionStatus::Pending,
        );
        store.insert_redemption(&redemption, None).await.unwrap();

        let outcome = store
            .transition_redemption(
                &redemption.id,
                RedemptionStatus::Pending,
                RedemptionStatus::Rejected,
                Some("stock damaged".to_string()),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, TransitionOutcome::Transitioned(_)));

        // Second attempt sees the new status and changes nothing
        let outcome = store
            .transition_redemption(
                &redemption.id,
                RedemptionStatus::Pending,
                RedemptionStatus::Approved,
                None,
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::WrongStatus(RedemptionStatus::Rejected)
        );
    }

    #[tokio::test]
    async fn test_insert_redemption_enforces_limit() {
        let store = MemoryStore::new();
        let reward_id = RewardId::new("rwd:1");

        let first = Redemption::new(user(), reward_id.clone(), 100, RedemptionStatus::Pending);
        assert_eq!(
            store.insert_redemption(&first, Some(1)).await.unwrap(),
            RedemptionInsertOutcome::Inserted
        );

        let second = Redemption::new(user(), reward_id.clone(), 100, RedemptionStatus::Pending);
        assert_eq!(
            store.insert_redemption(&second, Some(1)).await.unwrap(),
            RedemptionInsertOutcome::LimitReached { held: 1 }
        );

        // A rejected row frees the slot
        store
            .transition_redemption(
                &first.id,
                RedemptionStatus::Pending,
                RedemptionStatus::Rejected,
                Some("oos".to_string()),
            )
            .await
            .unwrap();
        let third = Redemption::new(user(), reward_id, 100, RedemptionStatus::Pending);
        assert_eq!(
            store.insert_redemption(&third, Some(1)).await.unwrap(),
            RedemptionInsertOutcome::Inserted
        );
    }

    #[tokio::test]
    async fn test_concurrent_credits_all_land() {
        use std::sync::Arc;
        let store = Arc::new(MemoryStore::new());

        let mut handles = vec![];
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_credit(&PointTransaction::credit(
                        UserId::new("user:1"),
                        1,
                        "TEST",
                        Some(format!("evt:{i}")),
                    ))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.balance(&UserId::new("user:1")).await.unwrap(), 50);
    }
}
