//! Timestamp normalization and local-time formatting helpers

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::model::PhotoRecord;

/// Key used for photos without a creation time
pub const UNKNOWN_DAY: &str = "unknown_day";

/// Timestamps above this are milliseconds rather than seconds
const MILLIS_CUTOFF: i64 = 1_000_000_000_000;

/// Normalize a raw creation timestamp to whole seconds.
///
/// Absent and zero timestamps are unknown. Values above 1e12 are treated as
/// milliseconds and floor-divided by 1000.
pub fn to_secs(raw: Option<i64>) -> Option<i64> {
    match raw {
        None | Some(0) => None,
        Some(t) if t > MILLIS_CUTOFF => Some(t.div_euclid(1000)),
        Some(t) => Some(t),
    }
}

fn local_time(secs: i64, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.with_timezone(tz))
}

/// Local calendar day as `YYYY-MM-DD`, or `unknown_day`
pub fn day_key(secs: Option<i64>, tz: &FixedOffset) -> String {
    secs.and_then(|s| local_time(s, tz))
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN_DAY.to_string())
}

/// Human-readable title for a day key, e.g. "Mon, Jan 15, 2024"
pub fn format_day_title(day_key: &str) -> String {
    if day_key == UNKNOWN_DAY {
        return "Unknown day".to_string();
    }
    match NaiveDate::parse_from_str(day_key, "%Y-%m-%d") {
        Ok(date) => date.format("%a, %b %-d, %Y").to_string(),
        Err(_) => day_key.to_string(),
    }
}

/// Title for a run of photos: source day plus earliest and latest clock time,
/// e.g. "Jan 15 14:30–14:32"
pub fn format_time_range(items: &[&PhotoRecord], tz: &FixedOffset) -> String {
    let mut times: Vec<i64> = items.iter().filter_map(|p| p.created_secs()).collect();
    times.sort_unstable();

    let first = times.first().and_then(|&s| local_time(s, tz));
    let last = times.last().and_then(|&s| local_time(s, tz));

    let Some(first) = first else {
        return "Unknown time".to_string();
    };

    let day = first.format("%b %-d");
    let t1 = first.format("%H:%M");
    match last {
        Some(last) => format!("{} {}–{}", day, t1, last.format("%H:%M")),
        None => format!("{} {}", day, t1),
    }
}
