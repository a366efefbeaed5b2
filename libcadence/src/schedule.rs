//! Recurrence math for pipeline schedules
//!
//! Pure calendar arithmetic: given a pipeline's frequency and the instant it
//! was last scheduled for, compute the next due instant. Callers inject the
//! current time so the math stays deterministic under test.

use chrono::{DateTime, Duration, Months, Utc};

use crate::types::Frequency;

/// Compute the next due instant for a pipeline.
///
/// A `last_scheduled` in the past is first clamped forward to `now`, so a
/// pipeline that sat idle through downtime resumes one interval from now
/// instead of accumulating a backlog of missed runs.
///
/// Monthly recurrence clamps to the end of shorter months (Jan 31 + 1 month
/// is Feb 29 in a leap year), following chrono's month arithmetic.
pub fn next_run_at(frequency: Frequency, last_scheduled: i64, now: i64) -> i64 {
    let base = if last_scheduled < now { now } else { last_scheduled };
    let base_dt = DateTime::<Utc>::from_timestamp(base, 0).unwrap_or_else(Utc::now);

    let next = match frequency {
        Frequency::Daily => base_dt + Duration::days(1),
        Frequency::Weekly => base_dt + Duration::days(7),
        Frequency::BiWeekly => base_dt + Duration::days(14),
        Frequency::Monthly => base_dt
            .checked_add_months(Months::new(1))
            .unwrap_or(base_dt + Duration::days(30)),
    };

    next.timestamp()
}

/// Seconds until `next_run_at`, or zero if the instant is already due.
pub fn seconds_until_due(next_run_at: i64, now: i64) -> i64 {
    (next_run_at - now).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> i64 {
        DateTime::parse_from_rfc3339(s).unwrap().timestamp()
    }

    const DAY: i64 = 86_400;

    #[test]
    fn test_daily_adds_one_day() {
        let now = ts("2024-06-01T09:00:00Z");
        let next = next_run_at(Frequency::Daily, now, now);
        assert_eq!(next, now + DAY);
    }

    #[test]
    fn test_weekly_adds_seven_days() {
        let now = ts("2024-06-01T09:00:00Z");
        assert_eq!(next_run_at(Frequency::Weekly, now, now), now + 7 * DAY);
    }

    #[test]
    fn test_bi_weekly_adds_fourteen_days() {
        let now = ts("2024-06-01T09:00:00Z");
        assert_eq!(next_run_at(Frequency::BiWeekly, now, now), now + 14 * DAY);
    }

    #[test]
    fn test_past_instant_clamped_to_now() {
        // A pipeline last scheduled three days ago resumes one interval from
        // now, not three overdue intervals.
        let now = ts("2024-06-10T12:00:00Z");
        let stale = now - 3 * DAY;

        let next = next_run_at(Frequency::Daily, stale, now);
        assert_eq!(next, now + DAY);
    }

    #[test]
    fn test_future_instant_not_clamped() {
        let now = ts("2024-06-10T12:00:00Z");
        let future = now + 2 * DAY;

        let next = next_run_at(Frequency::Daily, future, now);
        assert_eq!(next, future + DAY);
    }

    #[test]
    fn test_never_schedules_into_the_past() {
        let now = ts("2024-06-10T12:00:00Z");
        for frequency in [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::BiWeekly,
            Frequency::Monthly,
        ] {
            for offset in [1, DAY, 40 * DAY, 500 * DAY] {
                let next = next_run_at(frequency, now - offset, now);
                assert!(
                    next > now,
                    "{} from {}s ago landed at {} (now {})",
                    frequency,
                    offset,
                    next,
                    now
                );
            }
        }
    }

    #[test]
    fn test_monthly_overflow_clamps_to_month_end() {
        // Jan 31 + 1 month lands on the last day of February.
        let now = ts("2024-01-01T00:00:00Z");

        let next = next_run_at(Frequency::Monthly, ts("2024-01-31T10:00:00Z"), now);
        assert_eq!(next, ts("2024-02-29T10:00:00Z"));

        let non_leap = next_run_at(Frequency::Monthly, ts("2023-01-31T10:00:00Z"), ts("2023-01-01T00:00:00Z"));
        assert_eq!(non_leap, ts("2023-02-28T10:00:00Z"));
    }

    #[test]
    fn test_monthly_plain_add() {
        let now = ts("2024-03-01T00:00:00Z");
        let next = next_run_at(Frequency::Monthly, ts("2024-03-15T18:30:00Z"), now);
        assert_eq!(next, ts("2024-04-15T18:30:00Z"));
    }

    #[test]
    fn test_monotonic_across_repeated_advances() {
        let now = ts("2024-01-31T10:00:00Z");
        let mut scheduled = now;
        let mut previous = scheduled;

        for _ in 0..24 {
            scheduled = next_run_at(Frequency::Monthly, scheduled, now);
            assert!(scheduled > previous);
            previous = scheduled;
        }

        // Two years of monthly advances stay in calendar range.
        let end = chrono::Utc.timestamp_opt(scheduled, 0).unwrap();
        assert_eq!(end.format("%Y-%m").to_string(), "2026-01");
    }

    #[test]
    fn test_seconds_until_due() {
        assert_eq!(seconds_until_due(1_000, 900), 100);
        assert_eq!(seconds_until_due(900, 1_000), 0);
    }
}
