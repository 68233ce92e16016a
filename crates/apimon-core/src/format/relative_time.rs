//! Human-readable "time since" strings for last-used columns

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use crate::models::{present_number, present_text, PLACEHOLDER};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Time elapsed since `last_used` (epoch milliseconds), relative to the
/// current clock. Never cached: every call reads the clock again.
pub fn relative(last_used: Option<i64>) -> String {
    relative_to(last_used, Utc::now())
}

/// Time elapsed since `last_used`, relative to `now`
pub fn relative_to(last_used: Option<i64>, now: DateTime<Utc>) -> String {
    let Some(last_used) = last_used else {
        return PLACEHOLDER.to_string();
    };

    let elapsed = now.timestamp_millis().saturating_sub(last_used).max(0) / 1000;
    if elapsed < 1 {
        return "just now".to_string();
    }

    let (amount, unit) = match elapsed {
        s if s >= YEAR => (s / YEAR, "year"),
        s if s >= MONTH => (s / MONTH, "month"),
        s if s >= DAY => (s / DAY, "day"),
        s if s >= HOUR => (s / HOUR, "hour"),
        s if s >= MINUTE => (s / MINUTE, "minute"),
        s => (s, "second"),
    };
    let plural = if amount == 1 { "" } else { "s" };
    format!("{amount} {unit}{plural} ago")
}

/// Epoch milliseconds of an engine timestamp.
///
/// Numbers (or numeric strings) are read by magnitude as seconds,
/// milliseconds, microseconds or nanoseconds; other strings are parsed as
/// RFC 3339. Sentinels, anything unparsable and instants outside the
/// representable calendar range yield `None`.
#[allow(clippy::cast_possible_truncation)]
pub fn parse_timestamp(value: Option<&Value>) -> Option<i64> {
    if let Some(number) = present_number(value) {
        let millis = match number.abs() {
            x if x >= 1e17 => number / 1e6,
            x if x >= 1e14 => number / 1e3,
            x if x >= 1e11 => number,
            _ => number * 1e3,
        }
        .round();
        // i64 covers roughly +/-9.2e18 ms
        if !millis.is_finite() || millis.abs() >= 9.0e18 {
            return None;
        }
        let millis = millis as i64;
        return Utc.timestamp_millis_opt(millis).single().map(|_| millis);
    }

    match value? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.timestamp_millis()),
        _ => None,
    }
}

/// RFC 3339 form of an engine timestamp, for absolute last-used columns.
/// Non-numeric text is passed through unchanged.
pub fn absolute(value: Option<&Value>) -> Option<String> {
    if present_number(value).is_none() {
        return present_text(value);
    }
    let millis = parse_timestamp(value)?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    #[rstest]
    #[case(0, "just now")]
    #[case(1_000, "1 second ago")]
    #[case(45_000, "45 seconds ago")]
    #[case(5 * 60_000, "5 minutes ago")]
    #[case(60 * 60_000, "1 hour ago")]
    #[case(3 * 24 * 3_600_000, "3 days ago")]
    #[case(65 * 24 * 3_600_000, "2 months ago")]
    #[case(800 * 24 * 3_600_000, "2 years ago")]
    fn test_relative_units(#[case] ago_ms: i64, #[case] expected: &str) {
        let last_used = now().timestamp_millis() - ago_ms;
        assert_eq!(relative_to(Some(last_used), now()), expected);
    }

    #[test]
    fn test_missing_is_placeholder() {
        assert_eq!(relative(None), "-");
    }

    #[test]
    fn test_future_timestamps_clamp() {
        let future = now().timestamp_millis() + 60_000;
        assert_eq!(relative_to(Some(future), now()), "just now");
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        assert!(relative_to(Some(i64::MIN), now()).ends_with("years ago"));
        assert_eq!(relative_to(Some(i64::MAX), now()), "just now");

        assert_eq!(parse_timestamp(Some(&json!("-1e25"))), None);
        assert_eq!(parse_timestamp(Some(&json!(1e300))), None);
        assert_eq!(relative_to(parse_timestamp(Some(&json!("-1e25"))), now()), "-");
    }

    #[test]
    fn test_parse_timestamp_magnitudes() {
        let expected = Some(1_640_995_200_000);
        assert_eq!(parse_timestamp(Some(&json!(1_640_995_200))), expected);
        assert_eq!(parse_timestamp(Some(&json!(1_640_995_200_000_i64))), expected);
        assert_eq!(parse_timestamp(Some(&json!("1640995200000000"))), expected);
        assert_eq!(parse_timestamp(Some(&json!("1640995200000000000"))), expected);
        assert_eq!(parse_timestamp(Some(&json!("2022-01-01T00:00:00Z"))), expected);
        assert_eq!(parse_timestamp(Some(&json!("n/a"))), None);
        assert_eq!(parse_timestamp(None), None);
    }

    #[test]
    fn test_absolute() {
        assert_eq!(
            absolute(Some(&json!("1640995200000000"))).as_deref(),
            Some("2022-01-01T00:00:00.000Z")
        );
        assert_eq!(
            absolute(Some(&json!("2024-01-15T10:30:00Z"))).as_deref(),
            Some("2024-01-15T10:30:00Z")
        );
        assert_eq!(absolute(Some(&json!("n/a"))), None);
    }

    proptest! {
        #[test]
        fn test_relative_is_monotonic(a in 0i64..10_000_000_000, b in 0i64..10_000_000_000) {
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            let base = now().timestamp_millis();
            let seconds = |s: &str| -> i64 {
                if s == "just now" {
                    return 0;
                }
                let mut parts = s.split_whitespace();
                let amount: i64 = parts.next().unwrap().parse().unwrap();
                let unit = parts.next().unwrap().trim_end_matches('s');
                amount * match unit {
                    "second" => 1,
                    "minute" => MINUTE,
                    "hour" => HOUR,
                    "day" => DAY,
                    "month" => MONTH,
                    _ => YEAR,
                }
            };
            let near_s = seconds(&relative_to(Some(base - near), now()));
            let far_s = seconds(&relative_to(Some(base - far), now()));
            prop_assert!(near_s <= far_s);
        }
    }
}
