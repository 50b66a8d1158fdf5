//! Human-relative rendering of timestamps ("3 minutes ago", "in an hour").

use chrono::{DateTime, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Render `at` relative to `now`
///
/// Bucket thresholds round the way people speak: 50 seconds is "a minute",
/// 40 minutes is "40 minutes", 50 minutes is "an hour".
pub fn humanize(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - at).num_seconds();
    let phrase = span(delta.unsigned_abs() as i64);

    if delta < 0 {
        format!("in {}", phrase)
    } else {
        format!("{} ago", phrase)
    }
}

fn span(secs: i64) -> String {
    let round = |unit: i64| ((secs + unit / 2) / unit).max(1);

    match secs {
        s if s < 45 => "a few seconds".to_string(),
        s if s < 90 => "a minute".to_string(),
        s if s < 45 * MINUTE => format!("{} minutes", round(MINUTE)),
        s if s < 90 * MINUTE => "an hour".to_string(),
        s if s < 22 * HOUR => format!("{} hours", round(HOUR)),
        s if s < 36 * HOUR => "a day".to_string(),
        s if s < 26 * DAY => format!("{} days", round(DAY)),
        s if s < 45 * DAY => "a month".to_string(),
        s if s < 320 * DAY => format!("{} months", round(30 * DAY)),
        s if s < 548 * DAY => "a year".to_string(),
        _ => format!("{} years", round(365 * DAY)),
    }
}
