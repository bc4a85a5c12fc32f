use rusqlite::types::Value;

use crate::types::DbValue;

/// Convert a single `DbValue` to a rusqlite `Value`.
///
/// `SQLite` has no boolean, timestamp or JSON storage class: booleans are stored as 0/1,
/// timestamps as `YYYY-MM-DD HH:MM:SS.fff` text and JSON as its text form.
#[must_use]
pub fn to_sqlite_value(value: &DbValue) -> Value {
    match value {
        DbValue::Null => Value::Null,
        DbValue::Int(i) => Value::Integer(*i),
        DbValue::Float(f) => Value::Real(*f),
        DbValue::Bool(b) => Value::Integer(i64::from(*b)),
        DbValue::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        DbValue::Text(s) => Value::Text(s.clone()),
        DbValue::Json(j) => Value::Text(j.to_string()),
        DbValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Convert a rusqlite `Value` read from a row back into a `DbValue`.
#[must_use]
pub fn from_sqlite_value(value: Value) -> DbValue {
    match value {
        Value::Null => DbValue::Null,
        Value::Integer(i) => DbValue::Int(i),
        Value::Real(f) => DbValue::Float(f),
        Value::Text(s) => DbValue::Text(s),
        Value::Blob(b) => DbValue::Blob(b),
    }
}
