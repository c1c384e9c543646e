//! Billing period math
//!
//! Pure functions over timestamps. Each has an `*_at` form taking an
//! explicit `now` so tests never depend on the wall clock, plus a
//! `now_utc` convenience wrapper for callers.

use time::{Duration, OffsetDateTime};

/// Number of days in a trial period.
pub const TRIAL_DAYS: i64 = 14;

/// Whole days until `t`, rounded up, floored at 0.
///
/// Never negative: an expired timestamp reads as 0 days remaining, not
/// "-3 days".
pub fn days_until_at(t: OffsetDateTime, now: OffsetDateTime) -> i64 {
    let remaining = t - now;
    if remaining <= Duration::ZERO {
        return 0;
    }
    let days = remaining.whole_days();
    if remaining - Duration::days(days) > Duration::ZERO {
        days + 1
    } else {
        days
    }
}

pub fn days_until(t: OffsetDateTime) -> i64 {
    days_until_at(t, OffsetDateTime::now_utc())
}

/// Fraction of the period elapsed, clamped to [0, 1].
///
/// Clamped even when `now` falls outside the interval so clock skew or a
/// stale snapshot can never produce an out-of-range progress bar. A
/// degenerate interval (end <= start) reads as fully elapsed.
pub fn period_progress_at(
    period_start: OffsetDateTime,
    period_end: OffsetDateTime,
    now: OffsetDateTime,
) -> f64 {
    let total = (period_end - period_start).whole_seconds();
    if total <= 0 {
        return 1.0;
    }
    let elapsed = (now - period_start).whole_seconds();
    (elapsed as f64 / total as f64).clamp(0.0, 1.0)
}

pub fn period_progress(period_start: OffsetDateTime, period_end: OffsetDateTime) -> f64 {
    period_progress_at(period_start, period_end, OffsetDateTime::now_utc())
}

/// True when the trial has `threshold_days` or fewer days remaining.
pub fn is_trial_ending_soon_at(
    trial_end: OffsetDateTime,
    threshold_days: i64,
    now: OffsetDateTime,
) -> bool {
    days_until_at(trial_end, now) <= threshold_days
}

pub fn is_trial_ending_soon(trial_end: OffsetDateTime, threshold_days: i64) -> bool {
    is_trial_ending_soon_at(trial_end, threshold_days, OffsetDateTime::now_utc())
}

/// End of a billing period starting at `start` for the given interval.
///
/// Calendar-aware: a monthly period starting Jan 31 ends Feb 28/29 (clamped
/// to the target month's last day), matching how the hosted processor
/// anchors renewal dates.
pub fn period_end_for(
    start: OffsetDateTime,
    interval: tradecrm_shared::BillingInterval,
) -> OffsetDateTime {
    use tradecrm_shared::BillingInterval;

    match interval {
        BillingInterval::Month => add_months(start, 1),
        BillingInterval::Year => add_months(start, 12),
    }
}

fn add_months(t: OffsetDateTime, months: i32) -> OffsetDateTime {
    let total = (t.year() * 12 + t.month() as i32 - 1) + months;
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12) as u8;
    let month = time::Month::January.nth_next(month0);
    let day = t.day().min(days_in_month(year, month));
    t.replace_date(time::Date::from_calendar_date(year, month, day).unwrap_or(t.date()))
}

fn days_in_month(year: i32, month: time::Month) -> u8 {
    month.length(year)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use time::macros::datetime;
    use tradecrm_shared::BillingInterval;

    #[test]
    fn test_days_until_future() {
        let now = datetime!(2026-03-01 00:00 UTC);
        assert_eq!(days_until_at(now + Duration::days(3), now), 3);
        // Partial day rounds up
        assert_eq!(days_until_at(now + Duration::hours(25), now), 2);
        assert_eq!(days_until_at(now + Duration::minutes(1), now), 1);
    }

    #[test]
    fn test_days_until_never_negative() {
        let now = datetime!(2026-03-01 00:00 UTC);
        assert_eq!(days_until_at(now - Duration::days(10), now), 0);
        assert_eq!(days_until_at(now, now), 0);
    }

    #[test]
    fn test_period_progress_midway() {
        let start = datetime!(2026-03-01 00:00 UTC);
        let end = datetime!(2026-03-31 00:00 UTC);
        let mid = datetime!(2026-03-16 00:00 UTC);
        let progress = period_progress_at(start, end, mid);
        assert!((progress - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_period_progress_clamped_outside_interval() {
        let start = datetime!(2026-03-01 00:00 UTC);
        let end = datetime!(2026-03-31 00:00 UTC);
        // Clock skew: now before the period started
        assert_eq!(period_progress_at(start, end, start - Duration::days(5)), 0.0);
        // Stale snapshot: now past the period end
        assert_eq!(period_progress_at(start, end, end + Duration::days(5)), 1.0);
    }

    #[test]
    fn test_period_progress_degenerate_interval() {
        let t = datetime!(2026-03-01 00:00 UTC);
        assert_eq!(period_progress_at(t, t, t), 1.0);
        assert_eq!(period_progress_at(t, t - Duration::days(1), t), 1.0);
    }

    #[test]
    fn test_trial_ending_soon() {
        let now = datetime!(2026-03-01 00:00 UTC);
        let trial_end = now + Duration::days(3);
        assert!(is_trial_ending_soon_at(trial_end, 3, now));
        assert!(!is_trial_ending_soon_at(trial_end, 2, now));
        // Already expired counts as ending soon at any threshold
        assert!(is_trial_ending_soon_at(now - Duration::days(1), 0, now));
    }

    #[test]
    fn test_period_end_monthly() {
        let start = datetime!(2026-03-15 09:30 UTC);
        let end = period_end_for(start, BillingInterval::Month);
        assert_eq!(end, datetime!(2026-04-15 09:30 UTC));
    }

    #[test]
    fn test_period_end_monthly_clamps_to_month_length() {
        let start = datetime!(2026-01-31 00:00 UTC);
        let end = period_end_for(start, BillingInterval::Month);
        assert_eq!(end, datetime!(2026-02-28 00:00 UTC));
    }

    #[test]
    fn test_period_end_annual() {
        let start = datetime!(2026-03-15 09:30 UTC);
        let end = period_end_for(start, BillingInterval::Year);
        assert_eq!(end, datetime!(2027-03-15 09:30 UTC));
    }

    #[test]
    fn test_period_end_annual_leap_day() {
        let start = datetime!(2028-02-29 00:00 UTC);
        let end = period_end_for(start, BillingInterval::Year);
        assert_eq!(end, datetime!(2029-02-28 00:00 UTC));
    }
}
