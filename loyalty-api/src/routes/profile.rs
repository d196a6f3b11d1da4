//! User-facing gamification endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use loyalty_core::types::{Badge, UserId};
use loyalty_engine::UserProfile;

use crate::error::ApiResult;
use crate::state::AppState;

/// Gamification profile: balance, tier, badges, challenge progress
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserProfile>> {
    let profile = state.engine.profile(&UserId::new(user_id)).await?;
    Ok(Json(profile))
}

/// Public badge catalog. Secret badges stay hidden until earned.
pub async fn list_badges(State(state): State<AppState>) -> ApiResult<Json<Vec<Badge>>> {
    let badges = state.engine.badges().catalog(false).await?;
    Ok(Json(badges))
}
