//! Receipt date parsing.
//!
//! Header dates are RFC 2822. Body dates are whatever the vendor template
//! prints, so a short list of calendar formats is tried in order. Dates
//! without a time of day resolve to midnight UTC. A leading weekday that
//! disagrees with the calendar date is ignored.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

const DATE_FORMATS: &[&str] = &[
    "%a, %b %d, %Y",
    "%A, %B %d, %Y",
    "%a, %B %d, %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%a, %d %b %Y",
    "%d %b %Y",
    "%m/%d/%Y",
    "%Y-%m-%d",
];

/// Parse a date as printed in a receipt header or body.
pub fn parse_receipt_date(text: &str) -> Option<DateTime<Utc>> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }
    parse_normalized(&normalized).or_else(|| strip_weekday(&normalized).and_then(parse_normalized))
}

fn parse_normalized(normalized: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(normalized) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(normalized) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(normalized, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(normalized, format) {
            return Some(parsed.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(normalized, format) {
            return parsed.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc());
        }
    }
    None
}

/// `"Thu, 06 Sep 2024"` -> `"06 Sep 2024"`.
fn strip_weekday(text: &str) -> Option<&str> {
    let (day, rest) = text.split_once(',')?;
    if day.is_empty() || !day.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let rest = rest.trim_start();
    (!rest.is_empty()).then_some(rest)
}

/// Collapse whitespace and drop a trailing RFC 2822 comment such as `(UTC)`.
fn normalize(text: &str) -> String {
    let mut trimmed = text.trim();
    if trimmed.ends_with(')') {
        if let Some(open) = trimmed.rfind('(') {
            trimmed = trimmed[..open].trim_end();
        }
    }
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}
