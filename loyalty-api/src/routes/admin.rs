//! Administrative endpoints: catalog seeding, challenge generation and the
//! redemption decision queue

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use loyalty_core::types::{Redemption, RedemptionId, Reward};
use loyalty_engine::GenerationSummary;
use loyalty_store::OverviewStats;

use crate::dto::{InitBadgesResponse, RejectRequest};
use crate::error::ApiResult;
use crate::state::AppState;

/// Seed the default badge catalog (idempotent)
pub async fn init_badges(State(state): State<AppState>) -> ApiResult<Json<InitBadgesResponse>> {
    let badges = state.engine.admin().init_badges().await?;
    Ok(Json(InitBadgesResponse { badges }))
}

/// Generate today's daily challenges (create-if-absent)
pub async fn generate_daily(State(state): State<AppState>) -> ApiResult<Json<GenerationSummary>> {
    let summary = state.engine.admin().generate_daily(Utc::now()).await?;
    Ok(Json(summary))
}

/// Generate this week's challenges (create-if-absent)
pub async fn generate_weekly(State(state): State<AppState>) -> ApiResult<Json<GenerationSummary>> {
    let summary = state.engine.admin().generate_weekly(Utc::now()).await?;
    Ok(Json(summary))
}

/// Create or replace a reward definition
pub async fn upsert_reward(
    State(state): State<AppState>,
    Json(reward): Json<Reward>,
) -> ApiResult<Json<Reward>> {
    state.engine.admin().upsert_reward(&reward).await?;
    Ok(Json(reward))
}

/// Redemptions awaiting a decision
pub async fn pending_redemptions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Redemption>>> {
    let pending = state.engine.admin().pending_redemptions().await?;
    Ok(Json(pending))
}

/// Approve a pending redemption
pub async fn approve_redemption(
    State(state): State<AppState>,
    Path(redemption_id): Path<String>,
) -> ApiResult<Json<Redemption>> {
    let redemption = state
        .engine
        .redemptions()
        .approve(&RedemptionId::new(redemption_id))
        .await?;
    Ok(Json(redemption))
}

/// Reject a pending redemption, refunding points and restoring stock
pub async fn reject_redemption(
    State(state): State<AppState>,
    Path(redemption_id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<Json<Redemption>> {
    let redemption = state
        .engine
        .redemptions()
        .reject(&RedemptionId::new(redemption_id), &req.reason)
        .await?;
    Ok(Json(redemption))
}

/// Mark an approved redemption fulfilled
pub async fn complete_redemption(
    State(state): State<AppState>,
    Path(redemption_id): Path<String>,
) -> ApiResult<Json<Redemption>> {
    let redemption = state
        .engine
        .redemptions()
        .complete(&RedemptionId::new(redemption_id))
        .await?;
    Ok(Json(redemption))
}

/// Aggregate program statistics
pub async fn overview(State(state): State<AppState>) -> ApiResult<Json<OverviewStats>> {
    let stats = state.engine.admin().overview().await?;
    Ok(Json(stats))
}
