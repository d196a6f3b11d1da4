//! Tier Computation
//!
//! A tier is derived from lifetime points earned (sum of positive ledger
//! amounts), never from the spendable balance, so spending points cannot
//! demote a user. Not a stored entity.

use serde::{Deserialize, Serialize};

/// Loyalty tiers, ascending
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

/// Lifetime-earned thresholds, ascending with [`Tier`]
pub const TIER_THRESHOLDS: [(Tier, i64); 5] = [
    (Tier::Bronze, 0),
    (Tier::Silver, 1_000),
    (Tier::Gold, 5_000),
    (Tier::Platinum, 15_000),
    (Tier::Diamond, 50_000),
];

impl Tier {
    /// Pure tier function over lifetime earned points
    pub fn for_lifetime_points(lifetime_earned: i64) -> Tier {
        let mut tier = Tier::Bronze;
        for (candidate, threshold) in TIER_THRESHOLDS {
            if lifetime_earned >= threshold {
                tier = candidate;
            }
        }
        tier
    }

    /// Points still needed to reach the next tier, None at Diamond
    pub fn points_to_next(lifetime_earned: i64) -> Option<i64> {
        TIER_THRESHOLDS
            .iter()
            .find(|(_, threshold)| lifetime_earned < *threshold)
            .map(|(_, threshold)| threshold - lifetime_earned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "BRONZE",
            Tier::Silver => "SILVER",
            Tier::Gold => "GOLD",
            Tier::Platinum => "PLATINUM",
            Tier::Diamond => "DIAMOND",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Bronze
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(Tier::for_lifetime_points(0), Tier::Bronze);
        assert_eq!(Tier::for_lifetime_points(999), Tier::Bronze);
        assert_eq!(Tier::for_lifetime_points(1_000), Tier::Silver);
        assert_eq!(Tier::for_lifetime_points(4_999), Tier::Silver);
        assert_eq!(Tier::for_lifetime_points(5_000), Tier::Gold);
        assert_eq!(Tier::for_lifetime_points(15_000), Tier::Platinum);
        assert_eq!(Tier::for_lifetime_points(50_000), Tier::Diamond);
        assert_eq!(Tier::for_lifetime_points(i64::MAX), Tier::Diamond);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Bronze < Tier::Silver);
        assert!(Tier::Gold < Tier::Diamond);
    }

    #[test]
    fn test_points_to_next() {
        assert_eq!(Tier::points_to_next(0), Some(1_000));
        assert_eq!(Tier::points_to_next(4_500), Some(500));
        assert_eq!(Tier::points_to_next(50_000), None);
    }
}
