//! Loyalty Storage Layer
//!
//! Defines the [`LoyaltyStore`] trait and its backends. Every invariant of
//! the engine rests on the primitives here being whole atomic operations:
//! no check-then-write is ever split across two calls, so the service layer
//! scales horizontally without in-process locks.
//!
//! Backends:
//! - [`MemoryStore`] - in-memory, for tests and development
//! - [`SledStore`] - embedded persistent store

pub mod error;
pub mod memory;
pub mod sled;

use async_trait::async_trait;

use loyalty_core::types::{
    Badge, BadgeAward, BadgeCode, Challenge, ChallengeId, ChallengeProgress, PointTransaction,
    Redemption, RedemptionId, RedemptionStatus, Reward, RewardId, StreakCounter, StreakMetric,
    UserId,
};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sled::SledStore;

/// Outcome of a dedup-keyed credit append
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Transaction written; new balance
    Applied { balance: i64 },
    /// `source_event_id` already seen for this user; balance unchanged
    Duplicate { balance: i64 },
}

impl CreditOutcome {
    pub fn balance(&self) -> i64 {
        match self {
            CreditOutcome::Applied { balance } | CreditOutcome::Duplicate { balance } => *balance,
        }
    }
}

/// Outcome of a conditional debit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Transaction written; new balance
    Applied { balance: i64 },
    /// Balance was below the debit amount; nothing written
    Insufficient { balance: i64 },
}

/// Outcome of a conditional stock decrement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockOutcome {
    /// Stock-limited reward, one unit taken
    Decremented { remaining: u32 },
    /// Stock-limited reward with zero stock; nothing changed
    OutOfStock,
    /// Reward has no stock limit; nothing to decrement
    Unlimited,
}

/// Outcome of an atomic progress upsert
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    /// Row state after the increment
    pub progress: ChallengeProgress,
    /// True exactly once per (user, challenge, period): the call that
    /// flipped the row to Completed
    pub completed_now: bool,
}

/// Outcome of a conditional redemption status transition
#[derive(Clone, Debug, PartialEq)]
pub enum TransitionOutcome {
    /// Row was in the expected status and has been moved
    Transitioned(Redemption),
    /// Row was in a different status; nothing changed
    WrongStatus(RedemptionStatus),
}

/// Outcome of a limit-checked redemption insert
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedemptionInsertOutcome {
    /// Row written
    Inserted,
    /// The user already holds `held` counting redemptions of this reward;
    /// nothing written
    LimitReached { held: u32 },
}

/// Aggregate stats for the admin overview
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverviewStats {
    /// Users holding at least one ledger transaction
    pub users_with_points: u64,
    /// Sum of all positive transaction amounts
    pub points_issued: i64,
    /// Sum of all debited points (positive number)
    pub points_redeemed: i64,
    /// Badge awards created
    pub badges_awarded: u64,
    /// Challenge completions paid out
    pub challenges_completed: u64,
    /// Redemptions awaiting an admin decision
    pub pending_redemptions: u64,
}

/// Storage interface for the loyalty engine.
///
/// Mutating methods are atomic with respect to each other: concurrent
/// callers serialize per row (per user balance, per reward stock, per
/// progress row), and conditional methods either apply fully or report a
/// typed outcome without side effects.
#[async_trait]
pub trait LoyaltyStore: Send + Sync {
    // ==================== Ledger ====================

    /// Append a credit (`tx.amount > 0`). If `tx.source_event_id` is set
    /// and already recorded for this user, nothing is written.
    async fn append_credit(&self, tx: &PointTransaction) -> StoreResult<CreditOutcome>;

    /// Append a debit (`tx.amount < 0`) conditioned on the resulting
    /// balance staying non-negative.
    async fn append_debit(&self, tx: &PointTransaction) -> StoreResult<DebitOutcome>;

    /// Current spendable balance (0 for unknown users)
    async fn balance(&self, user_id: &UserId) -> StoreResult<i64>;

    /// Lifetime points earned: sum of positive amounts, independent of spend
    async fn lifetime_earned(&self, user_id: &UserId) -> StoreResult<i64>;

    /// Full transaction history, oldest first
    async fn transactions(&self, user_id: &UserId) -> StoreResult<Vec<PointTransaction>>;

    // ==================== Badges ====================

    /// Create or replace a badge definition by code
    async fn upsert_badge(&self, badge: &Badge) -> StoreResult<()>;

    async fn get_badge(&self, code: &BadgeCode) -> StoreResult<Option<Badge>>;

    async fn list_badges(&self) -> StoreResult<Vec<Badge>>;

    /// Create the award if no (user, badge) pair exists yet.
    /// Returns false when the pair already exists (treated as a no-op by
    /// callers, never an error).
    async fn try_award_badge(&self, award: &BadgeAward) -> StoreResult<bool>;

    /// Remove an award row; used only to roll back a failed award+credit pair
    async fn remove_award(&self, user_id: &UserId, code: &BadgeCode) -> StoreResult<()>;

    async fn list_awards(&self, user_id: &UserId) -> StoreResult<Vec<BadgeAward>>;

    /// Advance a per-user streak counter for the period `period_key`:
    /// same period as recorded -> unchanged; recorded == `previous_key`
    /// -> incremented; anything else -> reset to 1. Returns the new count.
    async fn advance_streak(
        &self,
        user_id: &UserId,
        metric: StreakMetric,
        period_key: &str,
        previous_key: &str,
    ) -> StoreResult<u32>;

    async fn get_streak(
        &self,
        user_id: &UserId,
        metric: StreakMetric,
    ) -> StoreResult<Option<StreakCounter>>;

    /// Atomically increment a named per-user counter, returning the new value
    async fn increment_counter(&self, user_id: &UserId, name: &str) -> StoreResult<u64>;

    // ==================== Challenges ====================

    /// Create the definition if no challenge with the same code exists.
    /// Returns true when created. Never mutates existing progress.
    async fn ensure_challenge(&self, challenge: &Challenge) -> StoreResult<bool>;

    /// Create or replace a challenge definition by id
    async fn upsert_challenge(&self, challenge: &Challenge) -> StoreResult<()>;

    async fn get_challenge(&self, id: &ChallengeId) -> StoreResult<Option<Challenge>>;

    async fn list_active_challenges(&self) -> StoreResult<Vec<Challenge>>;

    /// Atomically upsert the (user, challenge, period) row, increment
    /// `current_value` by `delta`, and flip to Completed at most once per
    /// row, honoring `max_completions` across periods.
    async fn apply_progress(
        &self,
        challenge: &Challenge,
        user_id: &UserId,
        period_key: &str,
        delta: i64,
    ) -> StoreResult<ProgressUpdate>;

    async fn list_progress(&self, user_id: &UserId) -> StoreResult<Vec<ChallengeProgress>>;

    // ==================== Rewards ====================

    /// Create or replace a reward definition by id
    async fn upsert_reward(&self, reward: &Reward) -> StoreResult<()>;

    async fn get_reward(&self, id: &RewardId) -> StoreResult<Option<Reward>>;

    async fn list_rewards(&self) -> StoreResult<Vec<Reward>>;

    /// Conditionally take one unit of stock (`current_stock > 0`).
    /// Rewards without a stock limit report [`StockOutcome::Unlimited`].
    async fn try_decrement_stock(&self, id: &RewardId) -> StoreResult<StockOutcome>;

    /// Put one unit of stock back (reject compensation / debit rollback),
    /// at most once per `token`: replaying a token is a no-op, so the
    /// calling compensation can safely re-run. Saturates at the configured
    /// stock limit.
    async fn restore_stock(&self, id: &RewardId, token: &str) -> StoreResult<()>;

    // ==================== Redemptions ====================

    /// Insert the redemption row, atomically enforcing `max_per_user`
    /// against the user's Pending/Approved/Completed rows for the reward.
    /// The count and the insert happen in one critical section; two
    /// concurrent inserts against a limit of N can never both land as row
    /// N+1.
    async fn insert_redemption(
        &self,
        redemption: &Redemption,
        max_per_user: Option<u32>,
    ) -> StoreResult<RedemptionInsertOutcome>;

    async fn get_redemption(&self, id: &RedemptionId) -> StoreResult<Option<Redemption>>;

    /// Move a redemption from `from` to `to` if and only if it is
    /// currently in `from`; the decision timestamp and rejection reason
    /// are recorded with the transition.
    async fn transition_redemption(
        &self,
        id: &RedemptionId,
        from: RedemptionStatus,
        to: RedemptionStatus,
        rejection_reason: Option<String>,
    ) -> StoreResult<TransitionOutcome>;

    async fn list_redemptions_by_status(
        &self,
        status: RedemptionStatus,
    ) -> StoreResult<Vec<Redemption>>;

    async fn list_redemptions_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Redemption>>;

    // ==================== Stats ====================

    async fn overview(&self) -> StoreResult<OverviewStats>;
}
