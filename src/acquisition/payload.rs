//! Ingestion payload validation
//!
//! One JSON object per reading. Policy:
//! - all ten channels are required, by id (`bearing_temperature`) or CSV
//!   column name (`Bearing_Temperature_C`)
//! - channel values must be finite numbers
//! - `timestamp` (RFC 3339, `YYYY-MM-DD HH:MM:SS` or unix seconds),
//!   `source` and `machine_status` are optional
//! - any other field is rejected
//!
//! Malformed payloads never reach the ingestion queue.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Channel, SensorReading, NUM_CHANNELS};

#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("missing channel '{}'", .0.id())]
    MissingChannel(Channel),

    #[error("channel '{}' given more than once", .0.id())]
    DuplicateChannel(Channel),

    #[error("field '{0}' must be a number")]
    NotANumber(String),

    #[error("channel '{}' is not finite", .0.id())]
    NonFinite(Channel),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("field '{0}' must be a non-empty string")]
    InvalidString(&'static str),
}

/// Parse a raw request body.
pub fn parse_payload(
    body: &[u8],
    default_source: &str,
    received_at: DateTime<Utc>,
) -> Result<SensorReading, PayloadError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
    reading_from_value(&value, default_source, received_at)
}

/// Validate a decoded JSON value and build a reading.
pub fn reading_from_value(
    value: &Value,
    default_source: &str,
    received_at: DateTime<Utc>,
) -> Result<SensorReading, PayloadError> {
    let obj = value.as_object().ok_or(PayloadError::NotAnObject)?;

    let mut values = [0.0; NUM_CHANNELS];
    let mut seen = [false; NUM_CHANNELS];
    let mut timestamp = None;
    let mut source = None;
    let mut machine_status = None;

    for (key, v) in obj {
        match key.as_str() {
            "timestamp" => timestamp = Some(parse_timestamp_value(v)?),
            "source" => source = Some(non_empty_str(v, "source")?),
            "machine_status" => {
                if !v.is_null() {
                    machine_status = Some(non_empty_str(v, "machine_status")?);
                }
            }
            other => {
                let ch = Channel::from_name(other)
                    .ok_or_else(|| PayloadError::UnknownField(other.to_string()))?;
                if seen[ch.index()] {
                    return Err(PayloadError::DuplicateChannel(ch));
                }
                let x = v
                    .as_f64()
                    .ok_or_else(|| PayloadError::NotANumber(other.to_string()))?;
                if !x.is_finite() {
                    return Err(PayloadError::NonFinite(ch));
                }
                values[ch.index()] = x;
                seen[ch.index()] = true;
            }
        }
    }

    if let Some(ch) = Channel::ALL.into_iter().find(|ch| !seen[ch.index()]) {
        return Err(PayloadError::MissingChannel(ch));
    }

    Ok(SensorReading {
        source: source.unwrap_or_else(|| default_source.to_string()),
        timestamp: timestamp.unwrap_or(received_at),
        values,
        machine_status,
    })
}

/// Flat JSON payload for a reading, keyed by channel id.
pub fn to_payload(reading: &SensorReading) -> Value {
    let mut obj = Map::new();
    obj.insert("timestamp".into(), Value::String(reading.timestamp.to_rfc3339()));
    obj.insert("source".into(), Value::String(reading.source.clone()));
    for ch in Channel::ALL {
        obj.insert(ch.id().into(), Value::from(reading.value(ch)));
    }
    if let Some(status) = &reading.machine_status {
        obj.insert("machine_status".into(), Value::String(status.clone()));
    }
    Value::Object(obj)
}

fn non_empty_str(v: &Value, field: &'static str) -> Result<String, PayloadError> {
    match v.as_str().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(PayloadError::InvalidString(field)),
    }
}

fn parse_timestamp_value(v: &Value) -> Result<DateTime<Utc>, PayloadError> {
    match v {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => {
            let secs = n
                .as_f64()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| PayloadError::InvalidTimestamp(n.to_string()))?;
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9) as u32;
            Utc.timestamp_opt(whole, nanos)
                .single()
                .ok_or_else(|| PayloadError::InvalidTimestamp(n.to_string()))
        }
        other => Err(PayloadError::InvalidTimestamp(other.to_string())),
    }
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (taken as UTC) or unix seconds.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, PayloadError> {
    let s = s.trim();

    if let Ok(epoch) = s.parse::<i64>() {
        return Utc
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| PayloadError::InvalidTimestamp(s.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(PayloadError::InvalidTimestamp(s.to_string()))
}
