// Timestamp normalization.
// Every timestamp shape found in the exports ends up as UTC epoch milliseconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;

/// Returned when a value matches none of the recognized timestamp shapes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unparsable timestamp: {0}")]
pub struct UnparsableTimestamp(pub String);

/// Epoch values with more integer digits than this are milliseconds,
/// anything shorter is seconds.
const SECONDS_MAX_DIGITS: usize = 10;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Normalizes a raw JSON timestamp into epoch milliseconds.
pub fn normalize(value: &Value) -> Result<i64, UnparsableTimestamp> {
    match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                from_epoch_integer(integer).ok_or_else(|| unparsable(value))
            } else if let Some(float) = number.as_f64() {
                from_epoch_float(float).ok_or_else(|| unparsable(value))
            } else {
                Err(unparsable(value))
            }
        }
        Value::String(s) => normalize_str(s),
        Value::Object(map) => {
            if let Some(seconds) = map.get("seconds") {
                let seconds = integer_field(seconds).ok_or_else(|| unparsable(value))?;
                let nanos = match map.get("nanos") {
                    Some(nanos) => integer_field(nanos).ok_or_else(|| unparsable(value))?,
                    None => 0,
                };
                if seconds < 0 || !(0..1_000_000_000).contains(&nanos) {
                    return Err(unparsable(value));
                }
                return seconds
                    .checked_mul(1000)
                    .and_then(|ms| ms.checked_add(nanos / 1_000_000))
                    .ok_or_else(|| unparsable(value));
            }
            if let Some(inner) = map.get("timestampMs").or_else(|| map.get("timestamp")) {
                return normalize(inner);
            }
            Err(unparsable(value))
        }
        _ => Err(unparsable(value)),
    }
}

/// Normalizes the first present, non-null field among `keys`.
///
/// Returns `None` when none of the keys is present, so callers can tell a
/// missing timestamp from a malformed one.
pub fn first_field(
    object: &Value,
    keys: &[&str],
) -> Option<Result<i64, UnparsableTimestamp>> {
    keys.iter()
        .filter_map(|key| object.get(key))
        .find(|value| !value.is_null())
        .map(normalize)
}

pub fn normalize_str(raw: &str) -> Result<i64, UnparsableTimestamp> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(UnparsableTimestamp(raw.to_string()));
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse::<i64>()
            .ok()
            .and_then(|n| scale_by_digits(n, s.len()))
            .ok_or_else(|| UnparsableTimestamp(raw.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.timestamp_millis());
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp_millis());
        }
    }

    Err(UnparsableTimestamp(raw.to_string()))
}

fn from_epoch_integer(n: i64) -> Option<i64> {
    if n < 0 {
        return None;
    }
    scale_by_digits(n, digit_count(n))
}

fn from_epoch_float(f: f64) -> Option<i64> {
    if !f.is_finite() || f < 0.0 || f >= i64::MAX as f64 {
        return None;
    }
    let whole = f.trunc() as i64;
    if digit_count(whole) > SECONDS_MAX_DIGITS {
        Some(f.round() as i64)
    } else {
        Some((f * 1000.0).round() as i64)
    }
}

fn scale_by_digits(n: i64, digits: usize) -> Option<i64> {
    if digits > SECONDS_MAX_DIGITS {
        Some(n)
    } else {
        n.checked_mul(1000)
    }
}

fn digit_count(n: i64) -> usize {
    let mut n = n.unsigned_abs();
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

fn integer_field(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn unparsable(value: &Value) -> UnparsableTimestamp {
    UnparsableTimestamp(value.to_string())
}
