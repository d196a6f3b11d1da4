//! Loyalty & Gamification Domain Layer
//!
//! Pure domain types and rules for the storefront's loyalty engine:
//! point accounting, badge unlocking, recurring challenge progress, tier
//! computation and reward redemption. No I/O lives here; the storage and
//! service layers build on these types.
//!
//! # Hard invariants
//!
//! | Invariant | Core requirement |
//! |-----------|------------------|
//! | **Ledger truth** | `balance(user)` equals the sum of signed transaction amounts; debits never drive it negative |
//! | **Award once** | At most one `BadgeAward` per (user, badge) |
//! | **Window bound** | No challenge progress or payout outside `[starts_at, ends_at)` |
//! | **Stock floor** | `current_stock` never goes below zero; no redemption at zero stock |
//! | **Per-user cap** | Pending/Approved/Completed redemptions per reward never exceed `max_per_user` |
//!
//! Every point-crediting action carries a deterministic `source_event_id`
//! so at-least-once event delivery never double-credits.

pub mod catalog;
pub mod error;
pub mod period;
pub mod tier;
pub mod types;

pub use error::{LoyaltyError, LoyaltyResult};
pub use period::{period_key, previous_period_key, ALL_TIME_PERIOD};
pub use tier::{Tier, TIER_THRESHOLDS};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_reexports_compile() {
        let tier = Tier::for_lifetime_points(0);
        assert_eq!(tier, Tier::Bronze);
        let user = UserId::new("user:1");
        assert_eq!(user.as_str(), "user:1");
    }
}
