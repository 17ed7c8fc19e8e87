//! Defensive coercion of persisted values.
//!
//! Anything read back from durable storage went through an untyped JSON blob
//! and may have been written by an older build or corrupted on disk. These
//! functions are total: they always produce a usable value, substituting the
//! current time or an empty sequence when the raw value cannot be understood.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Epoch values at or above this magnitude are interpreted as milliseconds.
const EPOCH_MILLIS_CUTOFF: i64 = 100_000_000_000;

/// Coerce a raw JSON value into a valid timestamp.
///
/// Accepts RFC 3339 and RFC 2822 text plus integer epoch seconds or
/// milliseconds. Everything else, including null and absent values, becomes
/// the current time.
pub fn coerce_timestamp(raw: &Value) -> DateTime<Utc> {
    match raw {
        Value::String(s) => parse_text_timestamp(s).unwrap_or_else(Utc::now),
        Value::Number(n) => n
            .as_i64()
            .and_then(from_epoch)
            .unwrap_or_else(Utc::now),
        _ => Utc::now(),
    }
}

fn parse_text_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    if n.abs() >= EPOCH_MILLIS_CUTOFF {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}

/// Coerce a raw JSON value into a sequence, dropping elements that do not
/// deserialize. Non-array values become the empty sequence.
pub fn coerce_seq<T: DeserializeOwned>(raw: Value) -> Vec<T> {
    match raw {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// `deserialize_with` adapter over [`coerce_timestamp`].
pub fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(coerce_timestamp(&raw))
}

/// `deserialize_with` adapter over [`coerce_seq`].
pub fn de_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(coerce_seq(raw))
}

/// `deserialize_with` adapter that falls back to `T::default()` when the raw
/// value has the wrong shape.
pub fn de_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}
