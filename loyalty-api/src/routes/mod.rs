//! API route handlers

pub mod admin;
pub mod events;
pub mod health;
pub mod profile;
pub mod rewards;

use axum::{routing::get, routing::post, Router};

use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Event ingestion
        .route("/events", post(events::ingest_event))
        // User-facing gamification
        .route("/gamification/profile/:user_id", get(profile::get_profile))
        .route("/gamification/badges", get(profile::list_badges))
        .route("/rewards", get(rewards::list_rewards))
        .route("/rewards/:reward_id/redeem", post(rewards::redeem))
        // Admin: catalogs
        .route("/admin/badges/init", post(admin::init_badges))
        .route("/admin/challenges/generate-daily", post(admin::generate_daily))
        .route("/admin/challenges/generate-weekly", post(admin::generate_weekly))
        .route("/admin/rewards", post(admin::upsert_reward))
        // Admin: redemption queue
        .route("/admin/redemptions/pending", get(admin::pending_redemptions))
        .route("/admin/redemptions/:redemption_id/approve", post(admin::approve_redemption))
        .route("/admin/redemptions/:redemption_id/reject", post(admin::reject_redemption))
        .route("/admin/redemptions/:redemption_id/complete", post(admin::complete_redemption))
        // Admin: stats
        .route("/admin/gamification/overview", get(admin::overview))
        // State
        .with_state(state)
}
