//! Lenient timestamp parsing and millisecond arithmetic.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

/// Parse a wire timestamp.
///
/// Accepts RFC 3339 (`2025-11-05T10:00:00.123Z`, `...+02:00`) and naive
/// ISO-8601 without an offset (`2025-11-05T10:00:00.123456`, also with a
/// space separator), which is read as UTC. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Signed difference `later - earlier` in fractional milliseconds
/// (microsecond precision).
pub fn millis_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000.0,
        None => delta.num_milliseconds() as f64,
    }
}

/// `start + ms`, rounded to whole microseconds. Saturates at the ends of
/// the representable range instead of overflowing.
pub fn add_millis(start: DateTime<Utc>, ms: f64) -> DateTime<Utc> {
    let delta = TimeDelta::microseconds((ms * 1_000.0).round() as i64);
    start.checked_add_signed(delta).unwrap_or(if ms < 0.0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Format a millisecond duration the way the waterfall labels bars:
/// `<0.01s` for very short spans, otherwise seconds with two decimals.
pub fn format_bar_duration(ms: f64) -> String {
    let seconds = ms / 1_000.0;
    if seconds < 0.01 {
        "<0.01s".to_string()
    } else {
        format!("{seconds:.2}s")
    }
}

/// Human-readable duration for headers and details.
pub fn format_duration(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.0}µs", ms * 1_000.0)
    } else if ms < 1_000.0 {
        format!("{ms:.0}ms")
    } else if ms < 60_000.0 {
        format!("{:.2}s", ms / 1_000.0)
    } else {
        let mins = (ms / 60_000.0).floor();
        let secs = (ms - mins * 60_000.0) / 1_000.0;
        format!("{mins:.0}m{secs:.1}s")
    }
}
