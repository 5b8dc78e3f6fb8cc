//! Time-arithmetic helpers for template parameters
//!
//! Turns human offsets like "1 day 2 hours" into RFC 3339 timestamps
//! relative to a reference instant. Used by the CLI to prepopulate
//! `now`, `deadline` and `expires` template parameters.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{GantryError, Result};

static OFFSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(years?|months?|weeks?|days?|hours?|minutes?|seconds?)")
        .expect("offset regex")
});

/// Current time in wire format
pub fn current_json_time() -> String {
    format_json_time(Utc::now())
}

/// Offset from now, e.g. `json_time_from_now("1 day")`
pub fn json_time_from_now(offset: &str) -> Result<String> {
    time_from(offset, Utc::now())
}

/// Offset from an explicit reference instant
pub fn time_from(offset: &str, reference: DateTime<Utc>) -> Result<String> {
    let mut total = Duration::zero();
    let mut consumed = 0usize;

    for caps in OFFSET_RE.captures_iter(offset) {
        let amount: i64 = caps[1]
            .parse()
            .map_err(|_| GantryError::InvalidTimeOffset {
                offset: offset.to_string(),
            })?;
        let unit = caps[2].to_ascii_lowercase();

        // Calendar-free approximations, matching the original helpers
        total = total
            + match unit.trim_end_matches('s') {
                "year" => Duration::days(365 * amount),
                "month" => Duration::days(30 * amount),
                "week" => Duration::weeks(amount),
                "day" => Duration::days(amount),
                "hour" => Duration::hours(amount),
                "minute" => Duration::minutes(amount),
                "second" => Duration::seconds(amount),
                _ => unreachable!("units constrained by the regex"),
            };
        consumed += caps[0].chars().filter(|c| !c.is_whitespace()).count();
    }

    // Reject inputs not made entirely of offset terms
    let significant = offset.chars().filter(|c| !c.is_whitespace()).count();
    if consumed == 0 || consumed != significant {
        return Err(GantryError::InvalidTimeOffset {
            offset: offset.to_string(),
        });
    }

    Ok(format_json_time(reference + total))
}

fn format_json_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}
