//! Sled Persistent Storage
//!
//! Embedded persistent backend. Values are serde_json-encoded; composite
//! keys are built from length-prefixed segments, so ids may contain any
//! bytes (including the odd separator character) without two (user,
//! resource) pairs ever colliding, and per-user ranges still come out of
//! prefix scans.
//!
//! Atomicity mapping:
//! - ledger appends run as multi-tree sled transactions (account meta,
//!   transaction log and dedup index move together or not at all)
//! - challenge progress runs as a transaction across the progress row and
//!   the per-(user, challenge) completion counter
//! - redemption inserts and transitions run as transactions across the
//!   row and the per-(user, reward) held-count, which is what enforces
//!   `max_per_user` without a check-then-write split
//! - stock restoration is transactional against a per-token marker so a
//!   replayed compensation applies once
//! - the remaining single-row conditionals (stock decrement, streaks) are
//!   bounded compare-and-swap loops; exhausting the bound surfaces
//!   [`StoreError::Conflict`] for the engine's retry policy

use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use std::path::Path;

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

const ACCOUNTS_TREE: &str = "accounts";
const TRANSACTIONS_TREE: &str = "transactions";
const DEDUP_TREE: &str = "dedup";
const COUNTERS_TREE: &str = "counters";
const BADGES_TREE: &str = "badges";
const AWARDS_TREE: &str = "awards";
const STREAKS_TREE: &str = "streaks";
const CHALLENGES_TREE: &str = "challenges";
const CHALLENGE_CODES_TREE: &str = "challenge_codes";
const PROGRESS_TREE: &str = "progress";
const COMPLETIONS_TREE: &str = "completions";
const REWARDS_TREE: &str = "rewards";
const STOCK_RESTORES_TREE: &str = "stock_restores";
const REDEMPTIONS_TREE: &str = "redemptions";
const REDEMPTION_COUNTS_TREE: &str = "redemption_counts";

/// Bound on compare-and-swap retries before reporting a conflict
const CAS_MAX_ATTEMPTS: u32 = 16;

/// Per-user ledger metadata kept as a single row so conditional updates
/// stay row-scoped
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
struct AccountMeta {
    balance: i64,
    lifetime_earned: i64,
    tx_count: u64,
}

/// Sled-backed store
pub struct SledStore {
    db: sled::Db,
    accounts: sled::Tree,
    transactions: sled::Tree,
    dedup: sled::Tree,
    counters: sled::Tree,
    badges: sled::Tree,
    awards: sled::Tree,
    streaks: sled::Tree,
    challenges: sled::Tree,
    challenge_codes: sled::Tree,
    progress: sled::Tree,
    completions: sled::Tree,
    rewards: sled::Tree,
    stock_restores: sled::Tree,
    redemptions: sled::Tree,
    redemption_counts: sled::Tree,
}

impl SledStore {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        tracing::debug!(path = %path.as_ref().display(), "opening sled database");
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Open a throwaway in-memory-backed database (tests)
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> StoreResult<Self> {
        Ok(Self {
            accounts: db.open_tree(ACCOUNTS_TREE)?,
            transactions: db.open_tree(TRANSACTIONS_TREE)?,
            dedup: db.open_tree(DEDUP_TREE)?,
            counters: db.open_tree(COUNTERS_TREE)?,
            badges: db.open_tree(BADGES_TREE)?,
            awards: db.open_tree(AWARDS_TREE)?,
            streaks: db.open_tree(STREAKS_TREE)?,
            challenges: db.open_tree(CHALLENGES_TREE)?,
            challenge_codes: db.open_tree(CHALLENGE_CODES_TREE)?,
            progress: db.open_tree(PROGRESS_TREE)?,
            completions: db.open_tree(COMPLETIONS_TREE)?,
            rewards: db.open_tree(REWARDS_TREE)?,
            stock_restores: db.open_tree(STOCK_RESTORES_TREE)?,
            redemptions: db.open_tree(REDEMPTIONS_TREE)?,
            redemption_counts: db.open_tree(REDEMPTION_COUNTS_TREE)?,
            db,
        })
    }

    /// Flush all dirty pages to disk
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn serialize<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Append one length-prefixed segment. The prefix makes segment
    /// boundaries unambiguous, so ids containing separator bytes cannot
    /// alias another composite key.
    fn key_part(buf: &mut Vec<u8>, segment: &str) {
        buf.extend_from_slice(&(segment.len() as u32).to_be_bytes());
        buf.extend_from_slice(segment.as_bytes());
    }

    /// Scan prefix covering every composite key whose first segment is `a`
    fn key_prefix(a: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + a.len());
        Self::key_part(&mut buf, a);
        buf
    }

    fn key2(a: &str, b: &str) -> Vec<u8> {
        let mut buf = Self::key_prefix(a);
        Self::key_part(&mut buf, b);
        buf
    }

    fn key3(a: &str, b: &str, c: &str) -> Vec<u8> {
        let mut buf = Self::key2(a, b);
        Self::key_part(&mut buf, c);
        buf
    }

    fn account(&self, user_id: &UserId) -> StoreResult<AccountMeta> {
        match self.accounts.get(user_id.as_str().as_bytes())? {
            Some(bytes) => Self::deserialize(&bytes),
            None => Ok(AccountMeta::default()),
        }
    }
}

/// serde failure inside a sled transaction closure
fn abort_ser(e: serde_json::Error) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(StoreError::Serialization(e.to_string()))
}

/// Map a finished sled transaction back to a store result
fn unwrap_tx<T>(result: Result<T, TransactionError<StoreError>>) -> StoreResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err),
        Err(TransactionError::Storage(err)) => Err(StoreError::Backend(err.to_string())),
    }
}

#[async_trait]
impl LoyaltyStore for SledStore {
    // ==================== Ledger ====================

    async fn append_credit(&self, tx: &PointTransaction) -> StoreResult<CreditOutcome> {
        let user_key = tx.user_id.as_str().as_bytes().to_vec();
        let dedup_key = tx
            .source_event_id
            .as_ref()
            .map(|sid| Self::key2(tx.user_id.as_str(), sid));
        let tx_bytes = Self::serialize(tx)?;

        let result = (&self.accounts, &self.transactions, &self.dedup).transaction(
            |(accounts, transactions, dedup)| {
                let mut meta: AccountMeta = match accounts.get(&user_key)? {
                    Some(bytes) => serde_json::from_slice(&bytes).map_err(abort_ser)?,
                    None => AccountMeta::default(),
                };

                if let Some(dkey) = &dedup_key {
                    if dedup.get(dkey.as_slice())?.is_some() {
                        return Ok(CreditOutcome::Duplicate {
                            balance: meta.balance,
                        });
                    }
                    dedup.insert(dkey.as_slice(), Vec::<u8>::new())?;
                }

                // Fixed-width sequence keeps per-user history in append order
                let seq_key =
                    Self::key2(tx.user_id.as_str(), &format!("{:020}", meta.tx_count));
                meta.balance += tx.amount;
                meta.lifetime_earned += tx.amount;
                meta.tx_count += 1;

                transactions.insert(seq_key.as_slice(), tx_bytes.clone())?;
                accounts.insert(
                    user_key.as_slice(),
                    serde_json::to_vec(&meta).map_err(abort_ser)?,
                )?;

                Ok(CreditOutcome::Applied {
                    balance: meta.balance,
                })
            },
        );
        unwrap_tx(result)
    }

    async fn append_debit(&self, tx: &PointTransaction) -> StoreResult<DebitOutcome> {
        let user_key = tx.user_id.as_str().as_bytes().to_vec();
        let tx_bytes = Self::serialize(tx)?;
        let debit = -tx.amount;

        let result =
            (&self.accounts, &self.transactions).transaction(|(accounts, transactions)| {
                let mut meta: AccountMeta = match accounts.get(&user_key)? {
                    Some(bytes) => serde_json::from_slice(&bytes).map_err(abort_ser)?,
                    None => AccountMeta::default(),
                };

                if meta.balance < debit {
                    return Ok(DebitOutcome::Insufficient {
                        balance: meta.balance,
                    });
                }

                let seq_key =
                    Self::key2(tx.user_id.as_str(), &format!("{:020}", meta.tx_count));
                meta.balance += tx.amount;
                meta.tx_count += 1;

                transactions.insert(seq_key.as_slice(), tx_bytes.clone())?;
                accounts.insert(
                    user_key.as_slice(),
                    serde_json::to_vec(&meta).map_err(abort_ser)?,
                )?;

                Ok(DebitOutcome::Applied {
                    balance: meta.balance,
                })
            });
        unwrap_tx(result)
    }

    async fn balance(&self, user_id: &UserId) -> StoreResult<i64> {
        Ok(self.account(user_id)?.balance)
    }

    async fn lifetime_earned(&self, user_id: &UserId) -> StoreResult<i64> {
        Ok(self.account(user_id)?.lifetime_earned)
    }

    async fn transactions(&self, user_id: &UserId) -> StoreResult<Vec<PointTransaction>> {
        let prefix = Self::key_prefix(user_id.as_str());
        let mut out = Vec::new();
        for entry in self.transactions.scan_prefix(&prefix) {
            let (_, bytes) = entry?;
            out.push(Self::deserialize(&bytes)?);
        }
        Ok(out)
    }

    // ==================== Badges ====================

    async fn upsert_badge(&self, badge: &Badge) -> StoreResult<()> {
        self.badges
            .insert(badge.code.as_str().as_bytes(), Self::serialize(badge)?)?;
        Ok(())
    }

    async fn get_badge(&self, code: &BadgeCode) -> StoreResult<Option<Badge>> {
        match self.badges.get(code.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_badges(&self) -> StoreResult<Vec<Badge>> {
        let mut out = Vec::new();
        for entry in self.badges.iter() {
            let (_, bytes) = entry?;
            out.push(Self::deserialize(&bytes)?);
        }
        Ok(out)
    }

    async fn try_award_badge(&self, award: &BadgeAward) -> StoreResult<bool> {
        let key = Self::key2(award.user_id.as_str(), award.badge_code.as_str());
        let bytes = Self::serialize(award)?;
        // Insert-if-absent: the None expectation is the uniqueness constraint
        let outcome =
            self.awards
                .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))?;
        Ok(outcome.is_ok())
    }

    async fn remove_award(&self, user_id: &UserId, code: &BadgeCode) -> StoreResult<()> {
        let key = Self::key2(user_id.as_str(), code.as_str());
        self.awards.remove(key)?;
        Ok(())
    }

    async fn list_awards(&self, user_id: &UserId) -> StoreResult<Vec<BadgeAward>> {
        let prefix = Self::key_prefix(user_id.as_str());
        let mut out: Vec<BadgeAward> = Vec::new();
        for entry in self.awards.scan_prefix(&prefix) {
            let (_, bytes) = entry?;
            out.push(Self::deserialize(&bytes)?);
        }
        out.sort_by(|a, b| a.awarded_at.cmp(&b.awarded_at));
        Ok(out)
    }

    async fn advance_streak(
        &self,
        user_id: &UserId,
        metric: StreakMetric,
        period_key: &str,
        previous_key: &str,
    ) -> StoreResult<u32> {
        let key = Self::key2(user_id.as_str(), metric.as_str());

        for _ in 0..CAS_MAX_ATTEMPTS {
            let current = self.streaks.get(&key)?;
            let existing: Option<StreakCounter> = match &current {
                Some(bytes) => Some(Self::deserialize(bytes)?),
                None => None,
            };

            if let Some(counter) = &existing {
                if counter.last_period_key == period_key {
                    return Ok(counter.current);
                }
            }

            let next = StreakCounter {
                user_id: user_id.clone(),
                metric,
                current: match &existing {
                    Some(c) if c.last_period_key == previous_key && c.current > 0 => c.current + 1,
                    _ => 1,
                },
                last_period_key: period_key.to_string(),
            };
            let bytes = Self::serialize(&next)?;

            if self
                .streaks
                .compare_and_swap(&key, current, Some(bytes))?
                .is_ok()
            {
                return Ok(next.current);
            }
        }
        tracing::warn!(
            user_id = %user_id.as_str(),
            metric = metric.as_str(),
            "streak compare-and-swap exhausted its retry bound"
        );
        Err(StoreError::conflict(format!(
            "streak:{}:{}",
            user_id.as_str(),
            metric.as_str()
        )))
    }

    async fn get_streak(
        &self,
        user_id: &UserId,
        metric: StreakMetric,
    ) -> StoreResult<Option<StreakCounter>> {
        let key = Self::key2(user_id.as_str(), metric.as_str());
        match self.streaks.get(key)? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn increment_counter(&self, user_id: &UserId, name: &str) -> StoreResult<u64> {
        let key = Self::key2(user_id.as_str(), name);
        let updated = self.counters.update_and_fetch(key, |old| {
            let current = old
                .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
                .map(u64::from_be_bytes)
                .unwrap_or(0);
            Some((current + 1).to_be_bytes().to_vec())
        })?;
        let bytes = updated.ok_or_else(|| StoreError::Backend("counter vanished".to_string()))?;
        let value = <[u8; 8]>::try_from(bytes.as_ref())
            .map(u64::from_be_bytes)
            .map_err(|_| StoreError::Serialization("malformed counter value".to_string()))?;
        Ok(value)
    }

    // ==================== Challenges ====================

    async fn ensure_challenge(&self, challenge: &Challenge) -> StoreResult<bool> {
        // Reserve the code first; losing the race means another writer
        // already created this definition.
        let reserved = self
            .challenge_codes
            .compare_and_swap(
                challenge.code.as_bytes(),
                None as Option<&[u8]>,
                Some(challenge.id.as_str().as_bytes()),
            )?
            .is_ok();
        if !reserved {
            return Ok(false);
        }
        self.challenges.insert(
            challenge.id.as_str().as_bytes(),
            Self::serialize(challenge)?,
        )?;
        Ok(true)
    }

    async fn upsert_challenge(&self, challenge: &Challenge) -> StoreResult<()> {
        self.challenge_codes.insert(
            challenge.code.as_bytes(),
            challenge.id.as_str().as_bytes(),
        )?;
        self.challenges.insert(
            challenge.id.as_str().as_bytes(),
            Self::serialize(challenge)?,
        )?;
        Ok(())
    }

    async fn get_challenge(&self, id: &ChallengeId) -> StoreResult<Option<Challenge>> {
        match self.challenges.get(id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_active_challenges(&self) -> StoreResult<Vec<Challenge>> {
        let mut out: Vec<Challenge> = Vec::new();
        for entry in self.challenges.iter() {
            let (_, bytes) = entry?;
            let challenge: Challenge = Self::deserialize(&bytes)?;
            if challenge.is_active {
                out.push(challenge);
            }
        }
        out.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(out)
    }

    async fn apply_progress(
        &self,
        challenge: &Challenge,
        user_id: &UserId,
        period_key: &str,
        delta: i64,
    ) -> StoreResult<ProgressUpdate> {
        let progress_key = Self::key3(user_id.as_str(), challenge.id.as_str(), period_key);
        let completions_key = Self::key2(user_id.as_str(), challenge.id.as_str());
        let now = Utc::now();

        let result = (&self.progress, &self.completions).transaction(
            |(progress_tree, completions_tree)| {
                let total: u32 = match completions_tree.get(completions_key.as_slice())? {
                    Some(bytes) => serde_json::from_slice(&bytes).map_err(abort_ser)?,
                    None => 0,
                };

                let mut row: ChallengeProgress =
                    match progress_tree.get(progress_key.as_slice())? {
                        Some(bytes) => serde_json::from_slice(&bytes).map_err(abort_ser)?,
                        None => {
                            let mut fresh = ChallengeProgress::new(
                                user_id.clone(),
                                challenge.id.clone(),
                                period_key,
                            );
                            fresh.completions = total;
                            fresh
                        }
                    };

                row.current_value += delta;
                row.updated_at = now;

                let mut completed_now = false;
                if row.status != ProgressStatus::Completed
                    && row.current_value >= challenge.target_value
                {
                    let allowed = if challenge.is_repeatable {
                        total < challenge.max_completions
                    } else {
                        total == 0
                    };
                    if allowed {
                        row.status = ProgressStatus::Completed;
                        row.completions = total + 1;
                        completed_now = true;
                        completions_tree.insert(
                            completions_key.as_slice(),
                            serde_json::to_vec(&(total + 1)).map_err(abort_ser)?,
                        )?;
                    }
                }

                progress_tree.insert(
                    progress_key.as_slice(),
                    serde_json::to_vec(&row).map_err(abort_ser)?,
                )?;

                Ok(ProgressUpdate {
                    progress: row,
                    completed_now,
                })
            },
        );
        unwrap_tx(result)
    }

    async fn list_progress(&self, user_id: &UserId) -> StoreResult<Vec<ChallengeProgress>> {
        let prefix = Self::key_prefix(user_id.as_str());
        let mut out: Vec<ChallengeProgress> = Vec::new();
        for entry in self.progress.scan_prefix(&prefix) {
            let (_, bytes) = entry?;
            out.push(Self::deserialize(&bytes)?);
        }
        out.sort_by(|a, b| {
            (a.challenge_id.as_str(), a.period_key.as_str())
                .cmp(&(b.challenge_id.as_str(), b.period_key.as_str()))
        });
        Ok(out)
    }

    // ==================== Rewards ====================

    async fn upsert_reward(&self, reward: &Reward) -> StoreResult<()> {
        self.rewards
            .insert(reward.id.as_str().as_bytes(), Self::serialize(reward)?)?;
        Ok(())
    }

    async fn get_reward(&self, id: &RewardId) -> StoreResult<Option<Reward>> {
        match self.rewards.get(id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_rewards(&self) -> StoreResult<Vec<Reward>> {
        let mut out: Vec<Reward> = Vec::new();
        for entry in self.rewards.iter() {
            let (_, bytes) = entry?;
            out.push(Self::deserialize(&bytes)?);
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn try_decrement_stock(&self, id: &RewardId) -> StoreResult<StockOutcome> {
        let key = id.as_str().as_bytes().to_vec();

        for _ in 0..CAS_MAX_ATTEMPTS {
            let current = self
                .rewards
                .get(&key)?
                .ok_or_else(|| StoreError::not_found("Reward", id.as_str()))?;
            let mut reward: Reward = Self::deserialize(&current)?;

            if reward.stock_limit.is_none() {
                return Ok(StockOutcome::Unlimited);
            }
            if reward.current_stock == 0 {
                return Ok(StockOutcome::OutOfStock);
            }
            reward.current_stock -= 1;
            let remaining = reward.current_stock;
            let bytes = Self::serialize(&reward)?;

            if self
                .rewards
                .compare_and_swap(&key, Some(current), Some(bytes))?
                .is_ok()
            {
                return Ok(StockOutcome::Decremented { remaining });
            }
        }
        tracing::warn!(
            reward_id = %id.as_str(),
            "stock compare-and-swap exhausted its retry bound"
        );
        Err(StoreError::conflict(format!("stock:{}", id.as_str())))
    }

    async fn restore_stock(&self, id: &RewardId, token: &str) -> StoreResult<()> {
        let key = id.as_str().as_bytes().to_vec();
        let token_key = Self::key2(id.as_str(), token);

        let result = (&self.rewards, &self.stock_restores).transaction(|(rewards, restores)| {
            let current = rewards.get(key.as_slice())?.ok_or_else(|| {
                ConflictableTransactionError::Abort(StoreError::not_found(
                    "Reward",
                    id.as_str(),
                ))
            })?;
            if restores.get(token_key.as_slice())?.is_some() {
                // Token already applied, replayed compensation
                return Ok(());
            }
            restores.insert(token_key.as_slice(), Vec::<u8>::new())?;

            let mut reward: Reward = serde_json::from_slice(&current).map_err(abort_ser)?;
            if let Some(limit) = reward.stock_limit {
                reward.current_stock = (reward.current_stock + 1).min(limit);
                rewards.insert(
                    key.as_slice(),
                    serde_json::to_vec(&reward).map_err(abort_ser)?,
                )?;
            }
            Ok(())
        });
        unwrap_tx(result)
    }

    // ==================== Redemptions ====================

    async fn insert_redemption(
        &self,
        redemption: &Redemption,
        max_per_user: Option<u32>,
    ) -> StoreResult<RedemptionInsertOutcome> {
        let row_key = redemption.id.as_str().as_bytes().to_vec();
        let count_key = Self::key2(redemption.user_id.as_str(), redemption.reward_id.as_str());
        let row_bytes = Self::serialize(redemption)?;

        let result = (&self.redemptions, &self.redemption_counts).transaction(
            |(redemptions, counts)| {
                let held: u32 = match counts.get(count_key.as_slice())? {
                    Some(bytes) => serde_json::from_slice(&bytes).map_err(abort_ser)?,
                    None => 0,
                };
                if let Some(max) = max_per_user {
                    if held >= max {
                        return Ok(RedemptionInsertOutcome::LimitReached { held });
                    }
                }
                redemptions.insert(row_key.as_slice(), row_bytes.clone())?;
                // Counted even for unlimited rewards so a limit added later
                // still sees the full history
                counts.insert(
                    count_key.as_slice(),
                    serde_json::to_vec(&(held + 1)).map_err(abort_ser)?,
                )?;
                Ok(RedemptionInsertOutcome::Inserted)
            },
        );
        unwrap_tx(result)
    }

    async fn get_redemption(&self, id: &RedemptionId) -> StoreResult<Option<Redemption>> {
        match self.redemptions.get(id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn transition_redemption(
        &self,
        id: &RedemptionId,
        from: RedemptionStatus,
        to: RedemptionStatus,
        rejection_reason: Option<String>,
    ) -> StoreResult<TransitionOutcome> {
        let key = id.as_str().as_bytes().to_vec();
        let now = Utc::now();

        let result = (&self.redemptions, &self.redemption_counts).transaction(
            |(redemptions, counts)| {
                let current = redemptions.get(key.as_slice())?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(StoreError::not_found(
                        "Redemption",
                        id.as_str(),
                    ))
                })?;
                let mut redemption: Redemption =
                    serde_json::from_slice(&current).map_err(abort_ser)?;

                if redemption.status != from {
                    return Ok(TransitionOutcome::WrongStatus(redemption.status));
                }
                redemption.status = to;
                redemption.decided_at = Some(now);
                if rejection_reason.is_some() {
                    redemption.rejection_reason = rejection_reason.clone();
                }

                // Leaving the counting statuses frees the user's limit slot
                if from.counts_toward_limit() && !to.counts_toward_limit() {
                    let count_key = Self::key2(
                        redemption.user_id.as_str(),
                        redemption.reward_id.as_str(),
                    );
                    let held: u32 = match counts.get(count_key.as_slice())? {
                        Some(bytes) => serde_json::from_slice(&bytes).map_err(abort_ser)?,
                        None => 0,
                    };
                    counts.insert(
                        count_key.as_slice(),
                        serde_json::to_vec(&held.saturating_sub(1)).map_err(abort_ser)?,
                    )?;
                }

                redemptions.insert(
                    key.as_slice(),
                    serde_json::to_vec(&redemption).map_err(abort_ser)?,
                )?;
                Ok(TransitionOutcome::Transitioned(redemption))
            },
        );
        unwrap_tx(result)
    }

    async fn list_redemptions_by_status(
        &self,
        status: RedemptionStatus,
    ) -> StoreResult<Vec<Redemption>> {
        let mut out: Vec<Redemption> = Vec::new();
        for entry in self.redemptions.iter() {
            let (_, bytes) = entry?;
            let redemption: Redemption = Self::deserialize(&bytes)?;
            if redemption.status == status {
                out.push(redemption);
            }
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn list_redemptions_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Redemption>> {
        let mut out: Vec<Redemption> = Vec::new();
        for entry in self.redemptions.iter() {
            let (_, bytes) = entry?;
            let redemption: Redemption = Self::deserialize(&bytes)?;
            if &redemption.user_id == user_id {
                out.push(redemption);
            }
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    // ==================== Stats ====================

    async fn overview(&self) -> StoreResult<OverviewStats> {
        let mut stats = OverviewStats::default();

        for entry in self.accounts.iter() {
            let (_, bytes) = entry?;
            let meta: AccountMeta = Self::deserialize(&bytes)?;
            stats.users_with_points += 1;
            stats.points_issued += meta.lifetime_earned;
        }
        for entry in self.transactions.iter() {
            let (_, bytes) = entry?;
            let tx: PointTransaction = Self::deserialize(&bytes)?;
            if tx.amount < 0 {
                stats.points_redeemed += -tx.amount;
            }
        }
        stats.badges_awarded = self.awards.len() as u64;
        for entry in self.completions.iter() {
            let (_, bytes) = entry?;
            let count: u32 = Self::deserialize(&bytes)?;
            stats.challenges_completed += count as u64;
        }
        for entry in self.redemptions.iter() {
            let (_, bytes) = entry?;
            let redemption: Redemption = Self::deserialize(&bytes)?;
            if redemption.status == RedemptionStatus::Pending {
                stats.pending_redemptions += 1;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use loyalty_core::types::{ChallengeKind, ChallengeTarget, RewardKind};

    fn user() -> UserId {
        UserId::new("user:1")
    }

    fn store() -> SledStore {
        SledStore::temporary().unwrap()
    }

    #[tokio::test]
    async fn test_credit_debit_roundtrip() {
        let store = store();

        let outcome = store
            .append_credit(&PointTransaction::credit(user(), 100, "TEST", None))
            .await
            .unwrap();
        assert_eq!(outcome, CreditOutcome::Applied { balance: 100 });

        let outcome = store
            .append_debit(&PointTransaction::debit(user(), 40, "TEST"))
            .await
            .unwrap();
        assert_eq!(outcome, DebitOutcome::Applied { balance: 60 });

        assert_eq!(store.balance(&user()).await.unwrap(), 60);
        assert_eq!(store.lifetime_earned(&user()).await.unwrap(), 100);
        assert_eq!(store.transactions(&user()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_credit_dedup() {
        let store = store();
        let tx = PointTransaction::credit(user(), 50, "BADGE:X", Some("X:user:1".to_string()));

        assert_eq!(
            store.append_credit(&tx).await.unwrap(),
            CreditOutcome::Applied { balance: 50 }
        );
        assert_eq!(
            store.append_credit(&tx).await.unwrap(),
            CreditOutcome::Duplicate { balance: 50 }
        );
        assert_eq!(store.transactions(&user()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_debit_insufficient_leaves_no_trace() {
        let store = store();
        let outcome = store
            .append_debit(&PointTransaction::debit(user(), 10, "TEST"))
            .await
            .unwrap();
        assert_eq!(outcome, DebitOutcome::Insufficient { balance: 0 });
        assert!(store.transactions(&user()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_award_uniqueness() {
        let store = store();
        let award = BadgeAward {
            user_id: user(),
            badge_code: BadgeCode::new("FIRST_PURCHASE"),
            awarded_at: Utc::now(),
        };
        assert!(store.try_award_badge(&award).await.unwrap());
        assert!(!store.try_award_badge(&award).await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_challenge_create_if_absent() {
        let store = store();
        let challenge = Challenge {
            id: ChallengeId::new("chl:1"),
            code: "DAILY_VISIT:2026-08-29".to_string(),
            name: "Daily Visit".to_string(),
            kind: ChallengeKind::Daily,
            target: ChallengeTarget::VisitCount,
            target_value: 1,
            points_reward: 10,
            is_repeatable: false,
            max_completions: 1,
            starts_at: chrono::Utc.with_ymd_and_hms(2026, 8, 29, 0, 0, 0).unwrap(),
            ends_at: None,
            is_active: true,
        };

        assert!(store.ensure_challenge(&challenge).await.unwrap());
        assert!(!store.ensure_challenge(&challenge).await.unwrap());
        assert_eq!(store.list_active_challenges().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_completion_pays_once_per_period() {
        let store = store();
        let challenge = Challenge {
            id: ChallengeId::new("chl:visit"),
            code: "DAILY_VISIT".to_string(),
            name: "Daily Visit".to_string(),
            kind: ChallengeKind::Daily,
            target: ChallengeTarget::VisitCount,
            target_value: 2,
            points_reward: 10,
            is_repeatable: true,
            max_completions: 10,
            starts_at: chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            ends_at: None,
            is_active: true,
        };

        let first = store
            .apply_progress(&challenge, &user(), "2026-08-29", 1)
            .await
            .unwrap();
        assert!(!first.completed_now);
        assert_eq!(first.progress.current_value, 1);

        let second = store
            .apply_progress(&challenge, &user(), "2026-08-29", 1)
            .await
            .unwrap();
        assert!(second.completed_now);
        assert_eq!(second.progress.status, ProgressStatus::Completed);

        let third = store
            .apply_progress(&challenge, &user(), "2026-08-29", 1)
            .await
            .unwrap();
        assert!(!third.completed_now);
    }

    #[tokio::test]
    async fn test_stock_conditional_decrement() {
        let store = store();
        let reward = Reward {
            id: RewardId::new("rwd:shirt"),
            name: "Camiseta Premium".to_string(),
            kind: RewardKind::PhysicalReward,
            points_cost: 500,
            stock_limit: Some(2),
            current_stock: 2,
            max_per_user: None,
            requires_tier: None,
            valid_from: chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            valid_until: None,
            is_active: true,
        };
        store.upsert_reward(&reward).await.unwrap();

        assert_eq!(
            store.try_decrement_stock(&reward.id).await.unwrap(),
            StockOutcome::Decremented { remaining: 1 }
        );
        assert_eq!(
            store.try_decrement_stock(&reward.id).await.unwrap(),
            StockOutcome::Decremented { remaining: 0 }
        );
        assert_eq!(
            store.try_decrement_stock(&reward.id).await.unwrap(),
            StockOutcome::OutOfStock
        );
    }

    #[tokio::test]
    async fn test_counters_increment() {
        let store = store();
        assert_eq!(
            store.increment_counter(&user(), "weekend_purchases").await.unwrap(),
            1
        );
        assert_eq!(
            store.increment_counter(&user(), "weekend_purchases").await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store
                .append_credit(&PointTransaction::credit(user(), 75, "TEST", None))
                .await
                .unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.balance(&user()).await.unwrap(), 75);
    }

    #[tokio::test]
    async fn test_composite_keys_keep_users_with_separator_ids_disjoint() {
        let store = store();
        let plain = UserId::new("u");
        let tricky = UserId::new("u|a");

        store
            .append_credit(&PointTransaction::credit(tricky.clone(), 30, "TEST", None))
            .await
            .unwrap();
        let award = BadgeAward {
            user_id: tricky.clone(),
            badge_code: BadgeCode::new("FIRST_PURCHASE"),
            awarded_at: Utc::now(),
        };
        store.try_award_badge(&award).await.unwrap();

        assert!(store.transactions(&plain).await.unwrap().is_empty());
        assert!(store.list_awards(&plain).await.unwrap().is_empty());
        assert_eq!(store.transactions(&tricky).await.unwrap().len(), 1);
        assert_eq!(store.list_awards(&tricky).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_stock_applies_each_token_once() {
        let store = store();
        let reward = Reward {
            id: RewardId::new("rwd:mug"),
            name: "Mug".to_string(),
            kind: RewardKind::PhysicalReward,
            points_cost: 200,
            stock_limit: Some(5),
            current_stock: 2,
            max_per_user: None,
            requires_tier: None,
            valid_from: chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            valid_until: None,
            is_active: true,
        };
        store.upsert_reward(&reward).await.unwrap();

        store.restore_stock(&reward.id, "t1").await.unwrap();
        store.restore_stock(&reward.id, "t1").await.unwrap();
        let stored = store.get_reward(&reward.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 3);

        store.restore_stock(&reward.id, "t2").await.unwrap();
        let stored = store.get_reward(&reward.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 4);
    }

    #[tokio::test]
    async fn test_insert_redemption_enforces_limit_until_rejection() {
        let store = store();
        let reward_id = RewardId::new("rwd:vip");

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
        assert!(store.get_redemption(&second.id).await.unwrap().is_none());

        store
            .transition_redemption(
                &first.id,
                RedemptionStatus::Pending,
                RedemptionStatus::Rejected,
                Some("out of budget".to_string()),
            )
            .await
            .unwrap();

        let third = Redemption::new(user(), reward_id, 100, RedemptionStatus::Pending);
        assert_eq!(
            store.insert_redemption(&third, Some(1)).await.unwrap(),
            RedemptionInsertOutcome::Inserted
        );
    }
}
