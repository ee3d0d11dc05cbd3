//! Time and duration utilities.

use certgen_types::{CertgenError, Result};
use chrono::{DateTime, Datelike, Duration, DurationRound, Utc};

/// Current time truncated to whole seconds.
///
/// X.509 validity has second precision; truncating up front keeps
/// `NotBefore` identical to the recorded generation time.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::seconds(1)).unwrap_or(now)
}

/// `start` moved forward by whole calendar years.
///
/// A day that does not exist in the target year rolls into the next month,
/// so Feb 29 becomes Mar 1.
pub fn years_after(start: DateTime<Utc>, years: u32) -> Result<DateTime<Utc>> {
    let out_of_range = || CertgenError::Validation(format!("{} + {} years is out of range", start, years));

    let year = i32::try_from(years)
        .ok()
        .and_then(|years| start.year().checked_add(years))
        .ok_or_else(out_of_range)?;
    let first_of_month = start
        .with_day(1)
        .and_then(|date| date.with_year(year))
        .ok_or_else(out_of_range)?;
    first_of_month
        .checked_add_signed(Duration::days(i64::from(start.day()) - 1))
        .ok_or_else(out_of_range)
}

/// Format a duration in human-readable form.
pub fn pretty_duration(duration: Duration) -> String {
    let millis = duration.num_milliseconds();
    let secs = duration.num_seconds();

    if secs < 1 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{:01}s", secs, (millis % 1000) / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    }
}

/// Measure execution time of a function.
pub fn measure<F, R>(f: F) -> (R, Duration)
where
    F: FnOnce() -> R,
{
    let start = Utc::now();
    let result = f();
    let duration = Utc::now().signed_duration_since(start);
    (result, duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_now_has_no_subseconds() {
        assert_eq!(now().nanosecond(), 0);
    }

    #[test]
    fn test_years_after() {
        let start = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        let end = years_after(start, 5).unwrap();
        assert_eq!(end.year(), 2029);
        assert_eq!(end.month(), 3);
        assert_eq!(end.day(), 1);
        assert_eq!(end.hour(), 12);

        let start = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        assert_eq!(years_after(start, 4).unwrap(), Utc.with_ymd_and_hms(2028, 2, 29, 12, 0, 0).unwrap());

        let start = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(years_after(start, 2).unwrap(), Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap());

        let start = Utc.with_ymd_and_hms(2026, 10, 18, 8, 30, 0).unwrap();
        assert_eq!(years_after(start, 2).unwrap(), Utc.with_ymd_and_hms(2028, 10, 18, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_pretty_duration() {
        assert_eq!(pretty_duration(Duration::milliseconds(250)), "250ms");
        assert_eq!(pretty_duration(Duration::milliseconds(2500)), "2.5s");
        assert_eq!(pretty_duration(Duration::seconds(125)), "2m 5s");
        assert_eq!(pretty_duration(Duration::seconds(3720)), "1h 2m");
    }
}
