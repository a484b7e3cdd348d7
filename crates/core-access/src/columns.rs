//! Typed column accessors over `turso::Row`.
//!
//! Rows are read through `get_value` so that nullable columns and integer
//! booleans decode the same way everywhere.

use crate::CoreAccessError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use turso::{Row, Value};

pub fn text(row: &Row, idx: usize) -> Result<String, CoreAccessError> {
    match row.get_value(idx)? {
        Value::Text(s) => Ok(s),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Real(f) => Ok(f.to_string()),
        other => Err(CoreAccessError::DataIntegrity(format!(
            "expected text in column {idx}, found {other:?}"
        ))),
    }
}

pub fn opt_text(row: &Row, idx: usize) -> Result<Option<String>, CoreAccessError> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        Value::Integer(i) => Ok(Some(i.to_string())),
        Value::Real(f) => Ok(Some(f.to_string())),
        other => Err(CoreAccessError::DataIntegrity(format!(
            "expected nullable text in column {idx}, found {other:?}"
        ))),
    }
}

pub fn integer(row: &Row, idx: usize) -> Result<i64, CoreAccessError> {
    match row.get_value(idx)? {
        Value::Integer(i) => Ok(i),
        Value::Real(f) => Ok(f as i64),
        Value::Null => Ok(0),
        other => Err(CoreAccessError::DataIntegrity(format!(
            "expected integer in column {idx}, found {other:?}"
        ))),
    }
}

pub fn opt_integer(row: &Row, idx: usize) -> Result<Option<i64>, CoreAccessError> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Integer(i) => Ok(Some(i)),
        Value::Real(f) => Ok(Some(f as i64)),
        other => Err(CoreAccessError::DataIntegrity(format!(
            "expected nullable integer in column {idx}, found {other:?}"
        ))),
    }
}

pub fn opt_real(row: &Row, idx: usize) -> Result<Option<f64>, CoreAccessError> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Real(f) => Ok(Some(f)),
        Value::Integer(i) => Ok(Some(i as f64)),
        other => Err(CoreAccessError::DataIntegrity(format!(
            "expected nullable real in column {idx}, found {other:?}"
        ))),
    }
}

pub fn boolean(row: &Row, idx: usize) -> Result<bool, CoreAccessError> {
    Ok(integer(row, idx)? != 0)
}

pub fn timestamp(row: &Row, idx: usize) -> Result<DateTime<Utc>, CoreAccessError> {
    let raw = text(row, idx)?;
    parse_timestamp(&raw)
}

/// Accepts RFC 3339 as written by the application and the `CURRENT_TIMESTAMP`
/// format SQLite produces for column defaults.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CoreAccessError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        .map_err(|e| CoreAccessError::DataIntegrity(format!("Failed to parse date '{raw}': {e}")))
}

/// The canonical textual form for every timestamp the application writes.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}
