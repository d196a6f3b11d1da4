//! Domain event ingestion endpoint

use axum::{extract::State, Json};
use chrono::Utc;

use loyalty_core::types::{DomainEvent, UserId};
use loyalty_engine::EventOutcome;

use crate::dto::IngestEventRequest;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Ingest one domain event
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(req): Json<IngestEventRequest>,
) -> ApiResult<Json<EventOutcome>> {
    if req.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
    }
    let event = DomainEvent::new(
        UserId::new(req.user_id),
        req.occurred_at.unwrap_or_else(Utc::now),
        req.event,
    );

    let outcome = state.engine.ingest(&event, &req.counters).await?;
    Ok(Json(outcome))
}
