use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, Row, SimpleQueryMessage};

use super::params::as_refs;
use crate::error::DbManagerError;
use crate::results::DataTable;
use crate::types::DbValue;

/// Extracts a `DbValue` from a `tokio_postgres` row at the given index.
///
/// # Errors
/// Returns `DbManagerError::ExecutionError` for column types with no `DbValue` mapping.
pub fn postgres_extract_value(row: &Row, idx: usize) -> Result<DbValue, DbManagerError> {
    let ty = row.columns()[idx].type_().clone();
    let value = match ty {
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(|v| DbValue::Int(i64::from(v))),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(|v| DbValue::Int(i64::from(v))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(DbValue::Int),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(|v| DbValue::Int(i64::from(v))),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| DbValue::Float(f64::from(v))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(DbValue::Float),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(DbValue::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(DbValue::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| DbValue::Timestamp(v.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| DbValue::Timestamp(d.and_time(chrono::NaiveTime::MIN))),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?.map(DbValue::Json),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(DbValue::Blob),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx)?.map(DbValue::Text)
        }
        other => {
            return Err(DbManagerError::ExecutionError(format!(
                "column '{}' has unsupported postgres type '{}'; cast it to text",
                row.columns()[idx].name(),
                other.name()
            )));
        }
    };
    Ok(value.unwrap_or(DbValue::Null))
}

/// Prepare, run and fill a `DataTable`. Column names come from the statement so an empty
/// result still carries its columns.
///
/// # Errors
/// Returns driver errors or unsupported column types.
pub async fn fill(client: &Client, sql: &str, params: &[DbValue]) -> Result<DataTable, DbManagerError> {
    let stmt = client.prepare(sql).await?;
    let rows = client.query(&stmt, &as_refs(params)).await?;

    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();
    let mut table = DataTable::with_column_names(column_names, rows.len());

    for row in &rows {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(postgres_extract_value(row, idx)?);
        }
        table.push_filled(values);
    }
    Ok(table)
}

/// First column of the first row, or `Null`.
///
/// # Errors
/// Returns driver errors or unsupported column types.
pub async fn scalar(client: &Client, sql: &str, params: &[DbValue]) -> Result<DbValue, DbManagerError> {
    let rows = client.query(sql, &as_refs(params)).await?;
    match rows.first() {
        Some(row) if !row.is_empty() => postgres_extract_value(row, 0),
        _ => Ok(DbValue::Null),
    }
}

/// Execute and return rows affected. Without parameters the text may hold several statements,
/// run through the simple query protocol.
///
/// # Errors
/// Returns driver errors.
pub async fn execute(client: &Client, sql: &str, params: &[DbValue]) -> Result<u64, DbManagerError> {
    if params.is_empty() {
        let messages = client.simple_query(sql).await?;
        return Ok(messages
            .iter()
            .map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => *n,
                _ => 0,
            })
            .sum());
    }
    Ok(client.execute(sql, &as_refs(params)).await?)
}
