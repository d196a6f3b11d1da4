//! Reward catalog and redemption endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use loyalty_core::types::{Reward, RewardId, UserId};
use loyalty_engine::RedemptionReceipt;

use crate::dto::RedeemRequest;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Currently redeemable rewards
pub async fn list_rewards(State(state): State<AppState>) -> ApiResult<Json<Vec<Reward>>> {
    let rewards = state.engine.redemptions().catalog().await?;
    Ok(Json(rewards))
}

/// Redeem a reward
pub async fn redeem(
    State(state): State<AppState>,
    Path(reward_id): Path<String>,
    Json(req): Json<RedeemRequest>,
) -> ApiResult<Json<RedemptionReceipt>> {
    if req.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
    }
    let receipt = state
        .engine
        .redemptions()
        .redeem(&UserId::new(req.user_id), &RewardId::new(reward_id))
        .await?;
    Ok(Json(receipt))
}
