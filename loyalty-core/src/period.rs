//! Period Keys
//!
//! A period key is a deterministic string identifying which recurring
//! window (day/week/month) a progress or streak record belongs to.
//! Formats: DAILY `YYYY-MM-DD`, WEEKLY `YYYY-Www` (ISO week-year),
//! MONTHLY `YYYY-MM`, ONE_TIME/SPECIAL a constant.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::types::ChallengeKind;

/// Period key for non-recurring challenges
pub const ALL_TIME_PERIOD: &str = "all-time";

/// Compute the period key for a challenge kind at a timestamp
pub fn period_key(kind: ChallengeKind, ts: DateTime<Utc>) -> String {
    let date = ts.date_naive();
    match kind {
        ChallengeKind::Daily => daily_key(date),
        ChallengeKind::Weekly => weekly_key(date),
        ChallengeKind::Monthly => monthly_key(date),
        ChallengeKind::OneTime | ChallengeKind::Special => ALL_TIME_PERIOD.to_string(),
    }
}

/// Period key for the window immediately before the one containing `ts`.
/// Streak advancement compares a counter's recorded period against this.
pub fn previous_period_key(kind: ChallengeKind, ts: DateTime<Utc>) -> String {
    let date = ts.date_naive();
    match kind {
        ChallengeKind::Daily => daily_key(date - Duration::days(1)),
        ChallengeKind::Weekly => weekly_key(date - Duration::days(7)),
        ChallengeKind::Monthly => {
            let first_of_month = date.with_day(1).unwrap_or(date);
            monthly_key(first_of_month - Duration::days(1))
        }
        ChallengeKind::OneTime | ChallengeKind::Special => ALL_TIME_PERIOD.to_string(),
    }
}

fn daily_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn weekly_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{:04}-W{:02}", week.year(), week.week())
}

fn monthly_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_key() {
        assert_eq!(period_key(ChallengeKind::Daily, at(2026, 8, 29)), "2026-08-29");
    }

    #[test]
    fn test_monthly_key() {
        assert_eq!(period_key(ChallengeKind::Monthly, at(2026, 8, 29)), "2026-08");
    }

    #[test]
    fn test_weekly_key_uses_iso_week_year() {
        // 2025-12-29 falls in ISO week 1 of 2026
        assert_eq!(period_key(ChallengeKind::Weekly, at(2025, 12, 29)), "2026-W01");
        // 2027-01-01 falls in ISO week 53 of 2026
        assert_eq!(period_key(ChallengeKind::Weekly, at(2027, 1, 1)), "2026-W53");
    }

    #[test]
    fn test_one_time_key_is_constant() {
        assert_eq!(period_key(ChallengeKind::OneTime, at(2026, 8, 29)), ALL_TIME_PERIOD);
        assert_eq!(period_key(ChallengeKind::Special, at(1999, 1, 1)), ALL_TIME_PERIOD);
    }

    #[test]
    fn test_previous_daily_crosses_month_boundary() {
        assert_eq!(
            previous_period_key(ChallengeKind::Daily, at(2026, 9, 1)),
            "2026-08-31"
        );
    }

    #[test]
    fn test_previous_monthly_crosses_year_boundary() {
        assert_eq!(
            previous_period_key(ChallengeKind::Monthly, at(2026, 1, 15)),
            "2025-12"
        );
    }

    #[test]
    fn test_previous_weekly_is_seven_days_back() {
        assert_eq!(
            previous_period_key(ChallengeKind::Weekly, at(2026, 1, 5)),
            period_key(ChallengeKind::Weekly, at(2025, 12, 29))
        );
    }

    #[test]
    fn test_consecutive_days_chain() {
        // previous(d+1) == key(d) for every day of a leap February
        for day in 1..=28 {
            let cur = at(2028, 2, day);
            let next = at(2028, 2, day + 1);
            assert_eq!(
                previous_period_key(ChallengeKind::Daily, next),
                period_key(ChallengeKind::Daily, cur)
            );
        }
    }
}
