//! API Error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use loyalty_core::LoyaltyError;
use serde::Serialize;
use thiserror::Error;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// HTTP status for a domain error
fn loyalty_status(err: &LoyaltyError) -> StatusCode {
    match err {
        LoyaltyError::Validation { .. }
        | LoyaltyError::InvalidAmount { .. }
        | LoyaltyError::InvalidProgressDelta { .. }
        | LoyaltyError::InvalidBadgeRequirement { .. }
        | LoyaltyError::Serialization(_) => StatusCode::BAD_REQUEST,

        LoyaltyError::BadgeNotFound { .. }
        | LoyaltyError::ChallengeNotFound { .. }
        | LoyaltyError::RewardNotFound { .. }
        | LoyaltyError::RedemptionNotFound { .. }
        | LoyaltyError::NotFound { .. } => StatusCode::NOT_FOUND,

        LoyaltyError::NotEligibleTier { .. } => StatusCode::FORBIDDEN,

        LoyaltyError::InsufficientBalance { .. }
        | LoyaltyError::OutOfStock { .. }
        | LoyaltyError::RedemptionLimitReached { .. }
        | LoyaltyError::InvalidRedemptionTransition { .. } => StatusCode::CONFLICT,

        LoyaltyError::RewardExpired { .. } | LoyaltyError::ChallengeExpired { .. } => {
            StatusCode::GONE
        }

        LoyaltyError::ConcurrentModification { .. } => StatusCode::SERVICE_UNAVAILABLE,

        LoyaltyError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
            ApiError::Loyalty(err) => (loyalty_status(err), err.code(), err.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_status_mapping() {
        let cases = [
            (
                LoyaltyError::validation("bad"),
                StatusCode::BAD_REQUEST,
            ),
            (
                LoyaltyError::RewardNotFound {
                    id: "rwd:1".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                LoyaltyError::OutOfStock {
                    id: "rwd:1".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                LoyaltyError::RewardExpired {
                    id: "rwd:1".to_string(),
                },
                StatusCode::GONE,
            ),
            (
                LoyaltyError::ConcurrentModification {
                    resource: "stock:rwd:1".to_string(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(loyalty_status(&err), expected, "{err}");
        }
    }
}
