//! Point Ledger Types
//!
//! The ledger is the sole source of truth for a user's point balance:
//! `balance(user) == sum of signed transaction amounts`. Transactions are
//! immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::UserId;

/// A single point-affecting event, append-only
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointTransaction {
    /// User whose balance this affects
    pub user_id: UserId,
    /// Signed amount: positive = credit, negative = debit
    pub amount: i64,
    /// Reason code, e.g. `BADGE:FIRST_PURCHASE` or `REDEEM:rwd:discount10`
    pub reason: String,
    /// Deterministic dedup key; replaying the same key for the same user
    /// never writes a second transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_event_id: Option<String>,
    /// When the transaction was written
    pub created_at: DateTime<Utc>,
}

impl PointTransaction {
    /// Build a credit transaction (amount stored positive)
    pub fn credit(
        user_id: UserId,
        amount: i64,
        reason: impl Into<String>,
        source_event_id: Option<String>,
    ) -> Self {
        Self {
            user_id,
            amount,
            reason: reason.into(),
            source_event_id,
            created_at: Utc::now(),
        }
    }

    /// Build a debit transaction (amount stored negative)
    pub fn debit(user_id: UserId, amount: i64, reason: impl Into<String>) -> Self {
        Self {
            user_id,
            amount: -amount,
            reason: reason.into(),
            source_event_id: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this transaction added points
    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_is_stored_negative() {
        let tx = PointTransaction::debit(UserId::new("user:1"), 250, "REDEEM:rwd:1");
        assert_eq!(tx.amount, -250);
        assert!(!tx.is_credit());
    }

    #[test]
    fn test_credit_carries_dedup_key() {
        let tx = PointTransaction::credit(
            UserId::new("user:1"),
            50,
            "BADGE:FIRST_PURCHASE",
            Some("FIRST_PURCHASE:user:1".to_string()),
        );
        assert!(tx.is_credit());
        assert_eq!(tx.source_event_id.as_deref(), Some("FIRST_PURCHASE:user:1"));
    }
}
