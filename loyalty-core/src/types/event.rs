//! Inbound Domain Events
//!
//! Events are produced by the out-of-scope order/review/referral services
//! and enter the engine through a single ingestion contract. Delivery is
//! at-least-once: everything downstream must tolerate replays.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::UserId;

/// A domain event consumed by the gamification engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// User the event belongs to
    pub user_id: UserId,
    /// When the event happened (producer clock)
    pub occurred_at: DateTime<Utc>,
    /// Event payload, closed union
    pub kind: EventKind,
}

/// Closed set of event kinds the engine reacts to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// An order reached the completed state
    PurchaseCompleted {
        order_id: String,
        amount: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
    },
    /// A product review passed submission
    ReviewSubmitted { review_id: String },
    /// A referred user completed signup
    ReferralConfirmed { referred_user_id: UserId },
    /// A storefront page was visited (exploration challenges)
    PageVisited,
    /// A product was added to a wishlist (exploration challenges)
    WishlistAdded,
}

impl EventKind {
    /// Short name used in logs and reason codes
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PurchaseCompleted { .. } => "PURCHASE_COMPLETED",
            EventKind::ReviewSubmitted { .. } => "REVIEW_SUBMITTED",
            EventKind::ReferralConfirmed { .. } => "REFERRAL_CONFIRMED",
            EventKind::PageVisited => "PAGE_VISITED",
            EventKind::WishlistAdded => "WISHLIST_ADDED",
        }
    }
}

impl DomainEvent {
    pub fn new(user_id: UserId, occurred_at: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            user_id,
            occurred_at,
            kind,
        }
    }

    /// Whether the event timestamp falls on a Saturday or Sunday
    pub fn is_weekend(&self) -> bool {
        matches!(self.occurred_at.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Hour of day (UTC) for time-of-day predicates
    pub fn hour(&self) -> u32 {
        self.occurred_at.hour()
    }
}

/// Lifetime counters for a user, owned by the external order/review/referral
/// services and supplied alongside each event. The engine never recomputes
/// these; it only compares them against badge thresholds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCounters {
    /// Completed purchases, lifetime
    pub purchase_count: u64,
    /// Total amount spent, lifetime
    pub total_spent: Decimal,
    /// Published reviews, lifetime
    pub review_count: u64,
    /// Confirmed referrals, lifetime
    pub referral_count: u64,
}
