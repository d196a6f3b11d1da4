//! Storage Error Types

use loyalty_core::LoyaltyError;
use thiserror::Error;

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-level errors. Domain outcomes (insufficient balance, out of
/// stock, duplicate award) are modeled as typed outcomes on the trait
/// methods, not errors; these are the genuinely exceptional cases.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A conditional update lost to a concurrent writer and the bounded
    /// compare-and-swap loop gave up. Transient.
    #[error("concurrent modification on {resource}")]
    Conflict { resource: String },

    /// Entity missing where the caller requires it to exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Backend failure
    #[error("backend error: {0}")]
    Backend(String),

    /// Value (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>) -> Self {
        StoreError::Conflict {
            resource: resource.into(),
        }
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<StoreError> for LoyaltyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { resource } => {
                LoyaltyError::ConcurrentModification { resource }
            }
            StoreError::NotFound { entity, id } => LoyaltyError::NotFound { entity, id },
            StoreError::Backend(msg) => LoyaltyError::Storage(msg),
            StoreError::Serialization(msg) => LoyaltyError::Serialization(msg),
        }
    }
}
