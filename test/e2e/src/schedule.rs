//! Cron-window arithmetic for schedule-driven tests.
//!
//! Sync plans with a `*/N` cron expression fire on every multiple of N
//! minutes past the hour. A test that creates such a plan close to a
//! boundary can see it fire early, so tests first check the guard window and
//! wait it out if needed.

use std::time::Duration;

use chrono::{DateTime, DurationRound, TimeDelta, Timelike, Utc};

pub use satrig_remote::SYNC_DATE_FMT;

/// Format a date the way sync plans expect it.
pub fn format_sync_date(date: DateTime<Utc>) -> String {
    date.format(SYNC_DATE_FMT).to_string()
}

/// The first `every_minutes` boundary strictly after `now`. Boundaries count
/// from the Unix epoch, which for divisors of 60 is the top of the hour.
pub fn next_boundary(now: DateTime<Utc>, every_minutes: u32) -> DateTime<Utc> {
    let step = TimeDelta::minutes(i64::from(every_minutes.max(1)));
    let floor = now.duration_trunc(step).unwrap_or(now);
    floor + step
}

/// How long to wait before creating a plan so that at least `guard` remains
/// before its first occurrence.
///
/// Mirrors the rule: when the minute within the current window is past the
/// guard (in whole minutes), wait the guard time out.
pub fn guard_wait(now: DateTime<Utc>, every_minutes: u32, guard: Duration) -> Duration {
    let every = every_minutes.max(1);
    let guard_minutes = guard.as_secs() / 60;
    if u64::from(now.minute() % every) > guard_minutes {
        guard
    } else {
        Duration::ZERO
    }
}

/// A start date `delay` after `now`, with seconds truncated.
pub fn future_sync_date(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    let truncated = now
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(now);
    truncated + TimeDelta::from_std(delay).unwrap_or(TimeDelta::zero())
}

/// A start date `offset` in the past, for plans whose first run already
/// happened.
pub fn past_sync_date(now: DateTime<Utc>, offset: Duration) -> DateTime<Utc> {
    now - TimeDelta::from_std(offset).unwrap_or(TimeDelta::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, h, m, s).unwrap()
    }

    #[rstest]
    #[case(at(10, 0, 0), at(10, 5, 0))]
    #[case(at(10, 3, 59), at(10, 5, 0))]
    #[case(at(10, 5, 0), at(10, 10, 0))]
    #[case(at(10, 58, 30), at(11, 0, 0))]
    fn test_next_boundary(#[case] now: DateTime<Utc>, #[case] expected: DateTime<Utc>) {
        assert_eq!(next_boundary(now, 5), expected);
    }

    #[rstest]
    #[case(at(10, 0, 0), 0)]
    #[case(at(10, 3, 10), 0)]
    #[case(at(10, 4, 0), 180)]
    #[case(at(10, 9, 0), 180)]
    fn test_guard_wait(#[case] now: DateTime<Utc>, #[case] expected_secs: u64) {
        let wait = guard_wait(now, 5, Duration::from_secs(180));
        assert_eq!(wait, Duration::from_secs(expected_secs));
    }

    #[test]
    fn test_future_sync_date_truncates_seconds() {
        let date = future_sync_date(at(10, 2, 41), Duration::from_secs(300));
        assert_eq!(date, at(10, 7, 0));
        assert_eq!(format_sync_date(date), "2026-01-05 10:07:00 UTC");
    }

    #[test]
    fn test_past_sync_date() {
        let date = past_sync_date(at(10, 0, 0), Duration::from_secs(3600 - 120));
        assert_eq!(date, at(9, 2, 0));
    }
}
