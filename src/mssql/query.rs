use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::numeric::Numeric;
use tiberius::{ColumnType, Row, Uuid};

use super::config::MssqlClient;
use super::params::bind_query_params;
use crate::error::DbManagerError;
use crate::results::DataTable;
use crate::types::DbValue;

/// Error for a column whose SQL Server type has no `DbValue` mapping.
fn unsupported_column(name: &str, column_type: ColumnType) -> DbManagerError {
    DbManagerError::ExecutionError(format!(
        "column '{name}' has unsupported SQL Server type {column_type:?}; cast it to nvarchar"
    ))
}

/// Extract a value from a row at a specific index.
///
/// Tiberius reports a type mismatch as an error, so each supported Rust type is tried in turn;
/// a value that is `NULL` for the matching type comes back as `Null`.
///
/// # Errors
/// Returns `DbManagerError::ExecutionError` for column types with no `DbValue` mapping.
fn extract_value(row: &Row, idx: usize) -> Result<DbValue, DbManagerError> {
    macro_rules! try_as {
        ($t:ty, $map:expr) => {
            if let Ok(v) = row.try_get::<$t, _>(idx) {
                return Ok(v.map_or(DbValue::Null, $map));
            }
        };
    }

    try_as!(u8, |v| DbValue::Int(i64::from(v)));
    try_as!(i16, |v| DbValue::Int(i64::from(v)));
    try_as!(i32, |v| DbValue::Int(i64::from(v)));
    try_as!(i64, DbValue::Int);
    try_as!(f32, |v| DbValue::Float(f64::from(v)));
    try_as!(f64, DbValue::Float);
    try_as!(Numeric, |v| DbValue::Float(f64::from(v)));
    try_as!(bool, DbValue::Bool);
    try_as!(NaiveDateTime, DbValue::Timestamp);
    try_as!(DateTime<FixedOffset>, |v| DbValue::Timestamp(v.naive_utc()));
    try_as!(NaiveDate, |d| DbValue::Timestamp(d.and_time(NaiveTime::MIN)));
    try_as!(NaiveTime, |t| DbValue::Text(t.to_string()));
    try_as!(Uuid, |u| DbValue::Text(u.to_string()));
    try_as!(&str, |s| DbValue::Text(s.to_string()));
    try_as!(&[u8], |b| DbValue::Blob(b.to_vec()));

    match row.columns().get(idx) {
        Some(col) if col.column_type() == ColumnType::Null => Ok(DbValue::Null),
        Some(col) => Err(unsupported_column(col.name(), col.column_type())),
        None => Err(DbManagerError::ExecutionError(format!(
            "column index {idx} is out of range"
        ))),
    }
}

/// Run a query and fill a `DataTable` from its first result set.
///
/// Statements that produce no result set yield an empty table without columns.
///
/// # Errors
/// Returns the driver error from execution or row fetching.
pub async fn fill(
    client: &mut MssqlClient,
    sql: &str,
    params: &[DbValue],
) -> Result<DataTable, DbManagerError> {
    let mut stream = bind_query_params(sql, params).query(client).await?;

    let column_names: Vec<String> = match stream.columns().await? {
        Some(columns) => columns.iter().map(|c| c.name().to_string()).collect(),
        None => Vec::new(),
    };
    let rows = stream.into_first_result().await?;

    let col_count = column_names.len();
    let mut table = DataTable::with_column_names(column_names, rows.len());
    for row in &rows {
        let values = (0..col_count)
            .map(|i| extract_value(row, i))
            .collect::<Result<Vec<_>, _>>()?;
        table.push_filled(values);
    }
    Ok(table)
}

/// First column of the first row, or `Null`.
///
/// # Errors
/// Returns the driver error from execution.
pub async fn scalar(
    client: &mut MssqlClient,
    sql: &str,
    params: &[DbValue],
) -> Result<DbValue, DbManagerError> {
    let row = bind_query_params(sql, params)
        .query(client)
        .await?
        .into_row()
        .await?;
    match row {
        Some(r) if r.len() > 0 => extract_value(&r, 0),
        _ => Ok(DbValue::Null),
    }
}

/// Execute and return the total rows affected across all statements.
///
/// # Errors
/// Returns the driver error from execution.
pub async fn execute(
    client: &mut MssqlClient,
    sql: &str,
    params: &[DbValue],
) -> Result<u64, DbManagerError> {
    let result = bind_query_params(sql, params).execute(client).await?;
    Ok(result.rows_affected().iter().sum())
}
