//! Flexible timestamp parsing for query parameters.
//!
//! Callers write range bounds as epoch seconds, epoch milliseconds, or
//! ISO 8601 strings; everything normalizes to fractional epoch seconds.
//! Naive timestamps (no offset) are read as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Numeric values above this are taken as epoch milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// Parse one timestamp parameter into epoch seconds.
pub fn parse_instant(raw: &str) -> Result<f64, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty timestamp".to_string());
    }

    if let Ok(value) = raw.parse::<f64>() {
        if !value.is_finite() {
            return Err(format!("non-finite timestamp: '{raw}'"));
        }
        if value > EPOCH_MILLIS_THRESHOLD {
            return Ok(value / 1000.0);
        }
        return Ok(value);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc).timestamp_micros() as f64 / 1e6);
    }

    // ISO 8601 without an offset, with or without fractional seconds
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc().timestamp_micros() as f64 / 1e6);
        }
    }

    // A bare date means midnight UTC
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        return Ok(midnight.and_utc().timestamp() as f64);
    }

    Err(format!(
        "unrecognized timestamp: '{raw}' (expected epoch seconds, epoch millis, or ISO 8601)"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_seconds_pass_through() {
        assert_eq!(parse_instant("1700000000").unwrap(), 1_700_000_000.0);
        assert_eq!(parse_instant("1700000000.25").unwrap(), 1_700_000_000.25);
    }

    #[test]
    fn test_epoch_millis_scaled_down() {
        assert_eq!(parse_instant("1700000000000").unwrap(), 1_700_000_000.0);
    }

    #[test]
    fn test_rfc3339_with_offset() {
        let secs = parse_instant("2023-11-14T22:13:20+00:00").unwrap();
        assert_eq!(secs, 1_700_000_000.0);
        // Offset applied, not ignored
        let shifted = parse_instant("2023-11-14T23:13:20+01:00").unwrap();
        assert_eq!(shifted, 1_700_000_000.0);
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        assert_eq!(
            parse_instant("2023-11-14T22:13:20").unwrap(),
            1_700_000_000.0
        );
        assert_eq!(
            parse_instant("2023-11-14 22:13:20").unwrap(),
            1_700_000_000.0
        );
    }

    #[test]
    fn test_bare_date_is_midnight_utc() {
        assert_eq!(parse_instant("2023-11-14").unwrap(), 1_699_920_000.0);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_instant("yesterday").is_err());
        assert!(parse_instant("").is_err());
        assert!(parse_instant("nan").is_err());
        assert!(parse_instant("inf").is_err());
    }
}
