//! Seed Catalogs
//!
//! Default badge definitions and recurring challenge templates consumed by
//! the admin maintenance operations. Seeding is an idempotent upsert by
//! code, so re-running initialization never duplicates rows.

use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;

use crate::period::period_key;
use crate::types::{
    Badge, BadgeCode, BadgeRequirement, Challenge, ChallengeId, ChallengeKind, ChallengeTarget,
    SpecialBadge, StreakMetric,
};

/// The default badge catalog
pub fn default_badges() -> Vec<Badge> {
    vec![
        badge(
            "FIRST_PURCHASE",
            "First Purchase",
            BadgeRequirement::PurchaseCount { threshold: 1 },
            50,
            false,
        ),
        badge(
            "LOYAL_BUYER",
            "Loyal Buyer",
            BadgeRequirement::PurchaseCount { threshold: 10 },
            200,
            false,
        ),
        badge(
            "BIG_SPENDER",
            "Big Spender",
            BadgeRequirement::TotalSpent {
                threshold: Decimal::new(1_000, 0),
            },
            300,
            false,
        ),
        badge(
            "FIRST_REVIEW",
            "First Review",
            BadgeRequirement::ReviewCount { threshold: 1 },
            25,
            false,
        ),
        badge(
            "CRITIC",
            "Critic",
            BadgeRequirement::ReviewCount { threshold: 10 },
            150,
            false,
        ),
        badge(
            "AMBASSADOR",
            "Ambassador",
            BadgeRequirement::ReferralCount { threshold: 5 },
            500,
            false,
        ),
        badge(
            "MONTHLY_REGULAR",
            "Monthly Regular",
            BadgeRequirement::Streak {
                metric: StreakMetric::MonthlyPurchase,
                periods: 3,
            },
            250,
            false,
        ),
        badge(
            "EARLY_BIRD",
            "Early Bird",
            BadgeRequirement::Special {
                predicate: SpecialBadge::EarlyBird,
            },
            100,
            true,
        ),
        badge(
            "WEEKEND_WARRIOR",
            "Weekend Warrior",
            BadgeRequirement::Special {
                predicate: SpecialBadge::WeekendWarrior,
            },
            150,
            true,
        ),
    ]
}

fn badge(
    code: &str,
    name: &str,
    requirement: BadgeRequirement,
    points_reward: i64,
    is_secret: bool,
) -> Badge {
    Badge {
        code: BadgeCode::new(code),
        name: name.to_string(),
        requirement,
        points_reward,
        is_secret,
        is_active: true,
    }
}

/// Template for a recurring challenge definition
#[derive(Clone, Debug)]
pub struct ChallengeTemplate {
    pub code: &'static str,
    pub name: &'static str,
    pub kind: ChallengeKind,
    pub target: ChallengeTarget,
    pub target_value: i64,
    pub points_reward: i64,
}

/// Daily challenge templates generated each day by AdminOps
pub fn daily_challenge_templates() -> Vec<ChallengeTemplate> {
    vec![
        ChallengeTemplate {
            code: "DAILY_VISIT",
            name: "Daily Visit",
            kind: ChallengeKind::Daily,
            target: ChallengeTarget::VisitCount,
            target_value: 1,
            points_reward: 10,
        },
        ChallengeTemplate {
            code: "DAILY_WISHLIST",
            name: "Wishlist Explorer",
            kind: ChallengeKind::Daily,
            target: ChallengeTarget::WishlistCount,
            target_value: 3,
            points_reward: 15,
        },
    ]
}

/// Weekly challenge templates generated each week by AdminOps
pub fn weekly_challenge_templates() -> Vec<ChallengeTemplate> {
    vec![
        ChallengeTemplate {
            code: "WEEKLY_SHOPPER",
            name: "Weekly Shopper",
            kind: ChallengeKind::Weekly,
            target: ChallengeTarget::PurchaseCount,
            target_value: 3,
            points_reward: 100,
        },
        ChallengeTemplate {
            code: "WEEKLY_REVIEWER",
            name: "Weekly Reviewer",
            kind: ChallengeKind::Weekly,
            target: ChallengeTarget::ReviewCount,
            target_value: 2,
            points_reward: 50,
        },
    ]
}

impl ChallengeTemplate {
    /// Materialize a definition for the period containing `now`.
    ///
    /// The code embeds the period key, which is what makes generation
    /// create-if-absent: re-running for the same period resolves to the
    /// same code. The window covers exactly the period.
    pub fn for_period(&self, now: DateTime<Utc>) -> Challenge {
        let key = period_key(self.kind, now);
        let (starts_at, ends_at) = self.window(now);
        Challenge {
            id: ChallengeId::new(format!("chl:{}:{}", self.code, key)),
            code: format!("{}:{}", self.code, key),
            name: self.name.to_string(),
            kind: self.kind,
            target: self.target,
            target_value: self.target_value,
            points_reward: self.points_reward,
            is_repeatable: false,
            max_completions: 1,
            starts_at,
            ends_at: Some(ends_at),
            is_active: true,
        }
    }

    fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let date = now.date_naive();
        match self.kind {
            ChallengeKind::Daily => {
                let start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
                (start, start + Duration::days(1))
            }
            ChallengeKind::Weekly => {
                let days_from_monday = date.weekday().num_days_from_monday() as i64;
                let monday = date - Duration::days(days_from_monday);
                let start = monday.and_hms_opt(0, 0, 0).unwrap().and_utc();
                (start, start + Duration::days(7))
            }
            // Recurring templates are daily or weekly; anything else gets
            // an open month-sized window starting today.
            _ => {
                let start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
                (start, start + Duration::days(30))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn test_default_badges_have_unique_codes() {
        let badges = default_badges();
        let mut codes: Vec<_> = badges.iter().map(|b| b.code.as_str()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), badges.len());
    }

    #[test]
    fn test_first_purchase_pays_fifty() {
        let badges = default_badges();
        let first = badges
            .iter()
            .find(|b| b.code.as_str() == "FIRST_PURCHASE")
            .unwrap();
        assert_eq!(first.points_reward, 50);
        assert!(!first.is_secret);
    }

    #[test]
    fn test_daily_template_window_covers_one_day() {
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 15, 30, 0).unwrap();
        let challenge = daily_challenge_templates()[0].for_period(now);

        assert_eq!(challenge.code, "DAILY_VISIT:2026-08-29");
        assert!(challenge.is_open_at(now));
        assert!(!challenge.is_open_at(now + Duration::days(1)));
        assert_eq!(challenge.max_completions, 1);
    }

    #[test]
    fn test_weekly_template_window_starts_monday() {
        // Saturday
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 10, 0, 0).unwrap();
        let challenge = weekly_challenge_templates()[0].for_period(now);

        assert_eq!(challenge.starts_at.date_naive().weekday(), chrono::Weekday::Mon);
        assert!(challenge.is_open_at(now));
        assert_eq!(
            challenge.ends_at.unwrap() - challenge.starts_at,
            Duration::days(7)
        );
    }

    #[test]
    fn test_same_period_materializes_same_code() {
        let morning = Utc.with_ymd_and_hms(2026, 8, 29, 8, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2026, 8, 29, 22, 0, 0).unwrap();
        let template = &daily_challenge_templates()[0];
        assert_eq!(
            template.for_period(morning).code,
            template.for_period(evening).code
        );
    }
}
