use rusqlite::Statement;
use rusqlite::types::Value;

use super::params::{from_sqlite_value, to_sqlite_value};
use crate::command::{Command, CommandKind};
use crate::error::DbManagerError;
use crate::results::DataTable;
use crate::types::DbValue;

/// Bind the command's parameters to a prepared statement.
///
/// Text commands bind by position; procedure commands bind by their `:name`.
///
/// # Errors
/// Returns `DbManagerError::ParameterError` if a named parameter does not occur in the statement.
pub fn bind_parameters(stmt: &mut Statement<'_>, cmd: &Command) -> Result<(), DbManagerError> {
    for (pos, param) in cmd.parameters.iter().enumerate() {
        let idx = match cmd.kind {
            CommandKind::Text => pos + 1,
            CommandKind::StoredProcedure => {
                stmt.parameter_index(&param.name)?.ok_or_else(|| {
                    DbManagerError::ParameterError(format!(
                        "parameter '{}' does not occur in the statement",
                        param.name
                    ))
                })?
            }
        };
        stmt.raw_bind_parameter(idx, to_sqlite_value(&param.value))?;
    }
    Ok(())
}

/// Run a bound statement and fill a `DataTable` with every row.
///
/// # Errors
/// Returns driver errors from stepping the statement.
pub fn fill_data_table(stmt: &mut Statement<'_>) -> Result<DataTable, DbManagerError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();
    let mut table = DataTable::with_column_names(column_names, 16);

    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let value: Value = row.get(i)?;
            values.push(from_sqlite_value(value));
        }
        table.push_filled(values);
    }
    Ok(table)
}

/// First column of the first row, or `Null` when there is no row.
///
/// # Errors
/// Returns driver errors from stepping the statement.
pub fn first_value(stmt: &mut Statement<'_>) -> Result<DbValue, DbManagerError> {
    if stmt.column_count() == 0 {
        stmt.raw_execute()?;
        return Ok(DbValue::Null);
    }
    let mut rows = stmt.raw_query();
    match rows.next()? {
        Some(row) => {
            let value: Value = row.get(0)?;
            Ok(from_sqlite_value(value))
        }
        None => Ok(DbValue::Null),
    }
}
