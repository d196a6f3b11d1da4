//! Point Ledger Service
//!
//! Thin service over the ledger primitives. Amount validation lives here;
//! balance-floor enforcement and dedup live inside the store so they hold
//! under concurrency.

use std::sync::Arc;

use loyalty_core::types::{PointTransaction, UserId};
use loyalty_core::{LoyaltyError, LoyaltyResult};
use loyalty_store::{DebitOutcome, LoyaltyStore};

/// Append-only point ledger
pub struct PointLedger {
    store: Arc<dyn LoyaltyStore>,
}

impl PointLedger {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self { store }
    }

    /// Credit points to a user and return the new balance.
    ///
    /// When `source_event_id` is set the credit is idempotent: replaying
    /// the same key returns the unchanged balance without a second write.
    pub async fn credit(
        &self,
        user_id: &UserId,
        amount: i64,
        reason: &str,
        source_event_id: Option<String>,
    ) -> LoyaltyResult<i64> {
        if amount <= 0 {
            return Err(LoyaltyError::InvalidAmount {
                amount,
                reason: "credit amount must be positive".to_string(),
            });
        }
        let tx = PointTransaction::credit(user_id.clone(), amount, reason, source_event_id);
        let outcome = self.store.append_credit(&tx).await?;
        tracing::debug!(user_id = %user_id, amount, reason, "points credited");
        Ok(outcome.balance())
    }

    /// Debit points from a user and return the new balance.
    /// Fails with `InsufficientBalance` when the balance would go negative.
    pub async fn debit(&self, user_id: &UserId, amount: i64, reason: &str) -> LoyaltyResult<i64> {
        if amount <= 0 {
            return Err(LoyaltyError::InvalidAmount {
                amount,
                reason: "debit amount must be positive".to_string(),
            });
        }
        let tx = PointTransaction::debit(user_id.clone(), amount, reason);
        match self.store.append_debit(&tx).await? {
            DebitOutcome::Applied { balance } => {
                tracing::debug!(user_id = %user_id, amount, reason, "points debited");
                Ok(balance)
            }
            DebitOutcome::Insufficient { balance } => Err(LoyaltyError::InsufficientBalance {
                user_id: user_id.as_str().to_string(),
                required: amount,
                available: balance,
            }),
        }
    }

    /// Current spendable balance
    pub async fn balance(&self, user_id: &UserId) -> LoyaltyResult<i64> {
        Ok(self.store.balance(user_id).await?)
    }

    /// Lifetime points earned, the tier input
    pub async fn lifetime_earned(&self, user_id: &UserId) -> LoyaltyResult<i64> {
        Ok(self.store.lifetime_earned(user_id).await?)
    }

    /// Full transaction history, oldest first
    pub async fn history(&self, user_id: &UserId) -> LoyaltyResult<Vec<PointTransaction>> {
        Ok(self.store.transactions(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loyalty_store::MemoryStore;

    fn ledger() -> PointLedger {
        PointLedger::new(Arc::new(MemoryStore::new()))
    }

    fn user() -> UserId {
        UserId::new("user:1")
    }

    #[tokio::test]
    async fn test_credit_then_debit() {
        let ledger = ledger();
        assert_eq!(ledger.credit(&user(), 300, "TEST", None).await.unwrap(), 300);
        assert_eq!(ledger.debit(&user(), 250, "REDEEM:rwd:1").await.unwrap(), 50);
        assert_eq!(ledger.balance(&user()).await.unwrap(), 50);
        assert_eq!(ledger.lifetime_earned(&user()).await.unwrap(), 300);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amounts() {
        let ledger = ledger();
        assert!(matches!(
            ledger.credit(&user(), 0, "TEST", None).await,
            Err(LoyaltyError::InvalidAmount { .. })
        ));
        assert!(matches!(
            ledger.debit(&user(), -5, "TEST").await,
            Err(LoyaltyError::InvalidAmount { .. })
        ));
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_typed() {
        let ledger = ledger();
        ledger.credit(&user(), 100, "TEST", None).await.unwrap();
        let err = ledger.debit(&user(), 250, "TEST").await.unwrap_err();
        assert_eq!(
            err,
            LoyaltyError::InsufficientBalance {
                user_id: "user:1".to_string(),
                required: 250,
                available: 100,
            }
        );
        // Failed debit leaves no trace
        assert_eq!(ledger.balance(&user()).await.unwrap(), 100);
        assert_eq!(ledger.history(&user()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replayed_credit_is_deduplicated() {
        let ledger = ledger();
        let key = Some("FIRST_PURCHASE:user:1".to_string());
        assert_eq!(
            ledger.credit(&user(), 50, "BADGE:FIRST_PURCHASE", key.clone()).await.unwrap(),
            50
        );
        assert_eq!(
            ledger.credit(&user(), 50, "BADGE:FIRST_PURCHASE", key).await.unwrap(),
            50
        );
        assert_eq!(ledger.history(&user()).await.unwrap().len(), 1);
    }
}
