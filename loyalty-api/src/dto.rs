//! Data Transfer Objects for API requests and responses
//!
//! Responses mostly reuse the engine's serializable aggregates
//! (`EventOutcome`, `UserProfile`, `RedemptionReceipt`); only the inbound
//! request shapes live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loyalty_core::types::{EventKind, UserCounters};

/// Ingest event request
#[derive(Debug, Deserialize)]
pub struct IngestEventRequest {
    /// User the event belongs to
    pub user_id: String,
    /// Event timestamp; defaults to now
    pub occurred_at: Option<DateTime<Utc>>,
    /// Event payload, discriminated on `type`
    pub event: EventKind,
    /// Lifetime counters after this event, as reported by the producer.
    /// Absent counters disable threshold badge evaluation for this event.
    #[serde(default)]
    pub counters: UserCounters,
}

/// Redeem reward request
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub user_id: String,
}

/// Reject redemption request
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Badge catalog initialization response
#[derive(Debug, Serialize)]
pub struct InitBadgesResponse {
    pub badges: u32,
}
