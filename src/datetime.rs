//! Date/time display formatting

use crate::config::DEFAULT_DATE_PATTERN;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt::{Display, Write};
use tracing::{debug, warn};

/// Timestamps carrying their own offset
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

/// Wall-clock timestamps, read in the target timezone
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Formats a timestamp as `YYYY-MM-DD HH:MM:SS` in the host's local timezone.
///
/// Empty or missing input, and input that cannot be parsed, yield `""`.
pub fn format_date_time(input: Option<&str>) -> String {
    format_date_time_in(input, &Local, DEFAULT_DATE_PATTERN)
}

/// Formats a timestamp in `tz` with a chrono strftime `pattern`.
///
/// Accepts RFC 3339 and ISO 8601 timestamps (with or without an offset),
/// bare dates, and integer epoch milliseconds. Naive values are taken as
/// wall-clock time in `tz`.
pub fn format_date_time_in<Tz>(input: Option<&str>, tz: &Tz, pattern: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let Some(text) = input.map(str::trim).filter(|t| !t.is_empty()) else {
        return String::new();
    };

    let Some(parsed) = parse_in(text, tz) else {
        debug!(input = text, "unparseable date");
        return String::new();
    };

    let mut out = String::new();
    if write!(out, "{}", parsed.format(pattern)).is_err() {
        warn!(pattern, "invalid date pattern");
        return String::new();
    }
    out
}

fn parse_in<Tz: TimeZone>(text: &str, tz: &Tz) -> Option<DateTime<Tz>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(tz));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(tz));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        });
    if let Some(naive) = naive {
        return tz.from_local_datetime(&naive).earliest();
    }

    let millis: i64 = text.parse().ok()?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.with_timezone(tz))
}
