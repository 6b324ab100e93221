//! Expiry timestamp handling — epoch coercion, ISO-8601 parsing and
//! formatting, day-extension arithmetic.
//!
//! Panels disagree on how they report expiry: epoch seconds, epoch
//! milliseconds, or ISO-8601 strings. Everything is coerced to epoch
//! seconds; zero or absent means "no expiry".

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

pub const SECS_PER_DAY: i64 = 86_400;

/// Epochs above this are milliseconds (≈ year 5138 in seconds).
const EPOCH_MS_THRESHOLD: i64 = 100_000_000_000;

/// Write format for ISO-8601 expiries: microseconds plus a trailing `Z`.
const ISO_MICROS: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z");

/// ISO-8601 without an offset, assumed UTC.
const ISO_NAIVE: &[time::format_description::BorrowedFormatItem<'static>] = format_description!(
    version = 2,
    "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
);

/// Current unix timestamp in seconds.
#[inline]
#[allow(clippy::cast_possible_wrap)]
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Coerce a panel-reported expiry value to epoch seconds.
///
/// Accepts integer epochs (milliseconds are detected and divided down),
/// floats, and ISO-8601 strings. Non-positive epochs mean "no expiry"
/// and yield `None`.
#[allow(clippy::cast_possible_truncation)]
pub fn parse_expire(value: &Value) -> Option<i64> {
    let epoch = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => parse_iso(s)?,
        _ => return None,
    };
    if epoch <= 0 {
        return None;
    }
    if epoch > EPOCH_MS_THRESHOLD {
        Some(epoch / 1000)
    } else {
        Some(epoch)
    }
}

/// Parse an ISO-8601 timestamp to epoch seconds.
///
/// RFC 3339 strings (trailing `Z` or explicit offset) are handled
/// directly; offset-less strings are assumed UTC.
pub fn parse_iso(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(t.unix_timestamp());
    }
    PrimitiveDateTime::parse(s, ISO_NAIVE)
        .ok()
        .map(|t| t.assume_utc().unix_timestamp())
}

/// Format epoch seconds in the form remnawave writes expect:
/// `%Y-%m-%dT%H:%M:%S.%fZ` with six subsecond digits.
pub fn format_iso_micros(ts: i64) -> String {
    OffsetDateTime::from_unix_timestamp(ts.max(0))
        .ok()
        .and_then(|t| t.format(&ISO_MICROS).ok())
        .unwrap_or_default()
}

/// Base timestamp for a day-extension: the stored expiry while it is
/// still in the future, `now` once it has passed (or was never set).
#[inline]
pub fn extension_base(current: Option<i64>, now: i64) -> i64 {
    match current {
        Some(ts) if ts > 0 => ts.max(now),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn epoch_seconds_pass_through() {
        assert_eq!(parse_expire(&json!(1_800_000_000)), Some(1_800_000_000));
        assert_eq!(parse_expire(&json!(0)), None);
        assert_eq!(parse_expire(&json!(-5)), None);
        assert_eq!(parse_expire(&Value::Null), None);
    }

    #[test]
    fn epoch_millis_divided_down() {
        assert_eq!(parse_expire(&json!(1_800_000_000_000_i64)), Some(1_800_000_000));
    }

    #[test]
    fn iso_with_zulu() {
        assert_eq!(
            parse_expire(&json!("1970-01-01T00:01:00Z")),
            Some(60)
        );
        assert_eq!(
            parse_expire(&json!("1970-01-01T00:01:00.500000Z")),
            Some(60)
        );
    }

    #[test]
    fn iso_with_offset_and_naive() {
        assert_eq!(
            parse_expire(&json!("1970-01-01T01:01:00+01:00")),
            Some(60)
        );
        // Offset-less strings are assumed UTC.
        assert_eq!(parse_expire(&json!("1970-01-01T00:01:00")), Some(60));
        assert_eq!(parse_expire(&json!("not a date")), None);
    }

    #[test]
    fn iso_micros_format() {
        assert_eq!(format_iso_micros(60), "1970-01-01T00:01:00.000000Z");
        assert_eq!(
            format_iso_micros(1_700_000_000),
            "2023-11-14T22:13:20.000000Z"
        );
    }

    #[test]
    fn format_then_parse_roundtrip() {
        let ts = 1_750_000_000;
        assert_eq!(parse_iso(&format_iso_micros(ts)), Some(ts));
    }

    #[test]
    fn extension_base_rules() {
        let now = 1_000_000;
        // Unexpired: extend from the stored end.
        assert_eq!(extension_base(Some(1_000_500), now), 1_000_500);
        // Expired: extend from today.
        assert_eq!(extension_base(Some(999_000), now), now);
        // Never set / zero: extend from today.
        assert_eq!(extension_base(None, now), now);
        assert_eq!(extension_base(Some(0), now), now);
    }
}
