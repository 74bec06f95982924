use std::time::Duration;

use chrono::{DateTime, Utc};

/// True when strictly more than `threshold` has passed between `since` and `now`.
/// A `since` in the future never exceeds anything.
pub fn elapsed_exceeds(now: DateTime<Utc>, since: DateTime<Utc>, threshold: Duration) -> bool {
    (now - since)
        .to_std()
        .map(|elapsed| elapsed > threshold)
        .unwrap_or(false)
}

/// Like `elapsed_exceeds` but inclusive.
pub fn elapsed_at_least(now: DateTime<Utc>, since: DateTime<Utc>, threshold: Duration) -> bool {
    (now - since)
        .to_std()
        .map(|elapsed| elapsed >= threshold)
        .unwrap_or(false)
}

/// Renders a span as `1h 02m 03s`, `2m 05s` or `7s`. Negative spans render as `0s`.
pub fn format_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let secs = (end - start).num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Coarse time bucket used to cache-bust Twitch preview images.
pub fn time_bucket(now: DateTime<Utc>, bucket: Duration) -> i64 {
    let size = bucket.as_secs().max(1) as i64;
    now.timestamp().div_euclid(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    #[test]
    fn test_elapsed_is_strict() {
        let t = Duration::from_secs(90);
        assert!(!elapsed_exceeds(at(90), at(0), t));
        assert!(elapsed_exceeds(at(91), at(0), t));
        assert!(elapsed_at_least(at(90), at(0), t));
        assert!(!elapsed_exceeds(at(0), at(100), t));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(at(0), at(7)), "7s");
        assert_eq!(format_duration(at(0), at(125)), "2m 05s");
        assert_eq!(format_duration(at(0), at(3723)), "1h 02m 03s");
        assert_eq!(format_duration(at(10), at(0)), "0s");
    }

    #[test]
    fn test_time_bucket_is_stable_within_window() {
        let five_min = Duration::from_secs(300);
        let start = Utc.timestamp_opt(1_700_000_100, 0).single().unwrap();
        let later = Utc.timestamp_opt(1_700_000_150, 0).single().unwrap();
        assert_eq!(time_bucket(start, five_min), time_bucket(later, five_min));
        assert_ne!(time_bucket(start, five_min), time_bucket(at(400), five_min));
    }
}
