//! Loyalty Error Code Registry
//!
//! Error code format: LOY-{module}-{sequence}
//! - LOY-LEDGER: Point ledger errors
//! - LOY-BADGE: Badge evaluation errors
//! - LOY-CHAL: Challenge tracking errors
//! - LOY-REWARD: Reward catalog / redemption errors
//! - LOY-STORE: Storage-level errors surfaced to callers

use rust_decimal::Decimal;
use thiserror::Error;

use crate::tier::Tier;

/// Loyalty result type
pub type LoyaltyResult<T> = Result<T, LoyaltyError>;

/// Loyalty engine error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoyaltyError {
    // ============================================================
    // Ledger Errors (LOY-LEDGER-*)
    // ============================================================
    /// [LOY-LEDGER-001] Point amount must be strictly positive
    #[error("[LOY-LEDGER-001] Invalid point amount {amount}: {reason}")]
    InvalidAmount { amount: i64, reason: String },

    /// [LOY-LEDGER-002] Debit would make the balance negative
    #[error("[LOY-LEDGER-002] Insufficient balance for {user_id}: required {required}, available {available}")]
    InsufficientBalance {
        user_id: String,
        required: i64,
        available: i64,
    },

    // ============================================================
    // Badge Errors (LOY-BADGE-*)
    // ============================================================
    /// [LOY-BADGE-001] Badge definition missing from the catalog
    #[error("[LOY-BADGE-001] Badge {code} not found")]
    BadgeNotFound { code: String },

    /// [LOY-BADGE-002] Requirement value missing or inconsistent
    #[error("[LOY-BADGE-002] Invalid badge requirement for {code}: {reason}")]
    InvalidBadgeRequirement { code: String, reason: String },

    // ============================================================
    // Challenge Errors (LOY-CHAL-*)
    // ============================================================
    /// [LOY-CHAL-001] Challenge definition missing
    #[error("[LOY-CHAL-001] Challenge {id} not found")]
    ChallengeNotFound { id: String },

    /// [LOY-CHAL-002] Event timestamp outside the challenge window
    #[error("[LOY-CHAL-002] Challenge {code} not open at {at}")]
    ChallengeExpired { code: String, at: String },

    /// [LOY-CHAL-003] Progress delta must be strictly positive
    #[error("[LOY-CHAL-003] Invalid progress delta {delta} for challenge {code}")]
    InvalidProgressDelta { code: String, delta: i64 },

    // ============================================================
    // Reward / Redemption Errors (LOY-REWARD-*)
    // ============================================================
    /// [LOY-REWARD-001] Reward definition missing
    #[error("[LOY-REWARD-001] Reward {id} not found")]
    RewardNotFound { id: String },

    /// [LOY-REWARD-002] Reward inactive or outside its validity window
    #[error("[LOY-REWARD-002] Reward {id} is not currently redeemable")]
    RewardExpired { id: String },

    /// [LOY-REWARD-003] Stock-limited reward has no stock left
    #[error("[LOY-REWARD-003] Reward {id} is out of stock")]
    OutOfStock { id: String },

    /// [LOY-REWARD-004] User already holds max_per_user redemptions
    #[error("[LOY-REWARD-004] Redemption limit reached for reward {id}: max {max_per_user} per user")]
    RedemptionLimitReached { id: String, max_per_user: u32 },

    /// [LOY-REWARD-005] User tier below the reward's gate
    #[error("[LOY-REWARD-005] Reward {id} requires tier {required}, user is {actual}")]
    NotEligibleTier {
        id: String,
        required: Tier,
        actual: Tier,
    },

    /// [LOY-REWARD-006] Redemption row missing
    #[error("[LOY-REWARD-006] Redemption {id} not found")]
    RedemptionNotFound { id: String },

    /// [LOY-REWARD-007] Status transition not allowed
    #[error("[LOY-REWARD-007] Invalid redemption transition {from} -> {to} for {id}")]
    InvalidRedemptionTransition {
        id: String,
        from: String,
        to: String,
    },

    // ============================================================
    // Storage Errors (LOY-STORE-*)
    // ============================================================
    /// [LOY-STORE-001] Conditional update lost to a concurrent writer
    /// after bounded retries. Transient, safe to retry.
    #[error("[LOY-STORE-001] Concurrent modification on {resource}")]
    ConcurrentModification { resource: String },

    /// [LOY-STORE-002] Backend failure
    #[error("[LOY-STORE-002] Storage error: {0}")]
    Storage(String),

    // ============================================================
    // General Errors
    // ============================================================
    /// Malformed input
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

impl LoyaltyError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LoyaltyError::InvalidAmount { .. } => "INVALID_AMOUNT",
            LoyaltyError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LoyaltyError::BadgeNotFound { .. } => "BADGE_NOT_FOUND",
            LoyaltyError::InvalidBadgeRequirement { .. } => "INVALID_BADGE_REQUIREMENT",
            LoyaltyError::ChallengeNotFound { .. } => "CHALLENGE_NOT_FOUND",
            LoyaltyError::ChallengeExpired { .. } => "CHALLENGE_EXPIRED",
            LoyaltyError::InvalidProgressDelta { .. } => "INVALID_PROGRESS_DELTA",
            LoyaltyError::RewardNotFound { .. } => "REWARD_NOT_FOUND",
            LoyaltyError::RewardExpired { .. } => "REWARD_EXPIRED",
            LoyaltyError::OutOfStock { .. } => "OUT_OF_STOCK",
            LoyaltyError::RedemptionLimitReached { .. } => "REDEMPTION_LIMIT_REACHED",
            LoyaltyError::NotEligibleTier { .. } => "NOT_ELIGIBLE_TIER",
            LoyaltyError::RedemptionNotFound { .. } => "REDEMPTION_NOT_FOUND",
            LoyaltyError::InvalidRedemptionTransition { .. } => "INVALID_REDEMPTION_TRANSITION",
            LoyaltyError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            LoyaltyError::Storage(_) => "STORAGE_ERROR",
            LoyaltyError::Validation { .. } => "VALIDATION_ERROR",
            LoyaltyError::Serialization(_) => "SERIALIZATION_ERROR",
            LoyaltyError::NotFound { .. } => "NOT_FOUND",
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, LoyaltyError::ConcurrentModification { .. })
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        LoyaltyError::Validation {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for LoyaltyError {
    fn from(err: serde_json::Error) -> Self {
        LoyaltyError::Serialization(err.to_string())
    }
}

/// Validate a monetary amount coming in from an external event.
pub fn non_negative_amount(amount: Decimal) -> LoyaltyResult<Decimal> {
    if amount.is_sign_negative() {
        return Err(LoyaltyError::validation(format!(
            "monetary amount {amount} must not be negative"
        )));
    }
    Ok(amount)
}
