//! Bounded Retry for Transient Conflicts
//!
//! Conditional store primitives can lose to a concurrent writer and surface
//! [`LoyaltyError::ConcurrentModification`]. Every such primitive is
//! idempotent or effect-free on failure, so re-running the call is safe.

use std::future::Future;
use std::time::Duration;

use loyalty_core::LoyaltyResult;

/// Exponential backoff policy for transient errors
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Ceiling on the computed delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying with backoff while it fails transiently.
    /// Non-transient errors and the final transient error pass through.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> LoyaltyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LoyaltyResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Err(err) if err.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self
                        .base_delay
                        .saturating_mul(2u32.saturating_pow(attempt))
                        .min(self.max_delay);
                    tracing::warn!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "transient conflict, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
