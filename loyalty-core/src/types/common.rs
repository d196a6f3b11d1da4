//! Basic Identifier Types
//!
//! Naming conventions:
//! - `_id` suffix: primary key identifiers
//! - `_code` suffix: human-readable unique codes (badges, challenges)
//!
//! Identifiers are string newtypes so they cannot be swapped for one
//! another at call sites.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id! {
    /// User identifier, owned by the out-of-scope account service
    UserId
}

string_id! {
    /// Unique badge code (e.g. `FIRST_PURCHASE`)
    BadgeCode
}

string_id! {
    /// Challenge definition identifier
    ChallengeId
}

string_id! {
    /// Reward definition identifier
    RewardId
}

string_id! {
    /// Redemption identifier
    RedemptionId
}

impl RedemptionId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self::new(format!("rdm:{}", Uuid::new_v4()))
    }
}

impl ChallengeId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self::new(format!("chl:{}", Uuid::new_v4()))
    }
}
