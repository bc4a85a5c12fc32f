//! Statement generation for writing [`DataTable`] changes back to their base table.
//!
//! The base table is taken from the select statement that produced the table. Rows are
//! addressed by key columns, which the caller may declare on the table or which are looked up
//! from the database catalog.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::command::Command;
use crate::error::DbManagerError;
use crate::provider::ProviderKind;
use crate::results::{DataTable, RowState};
use crate::types::DbValue;

static SELECT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*select\s+.+?\bfrom\s+(.*)$").expect("select pattern is valid")
});

static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^((?:\[[^\]]+\]|"[^"]+"|[A-Za-z0-9_$#@]+)(?:\.(?:\[[^\]]+\]|"[^"]+"|[A-Za-z0-9_$#@]+)){0,2})(.*)$"#)
        .expect("table name pattern is valid")
});

static CLAUSE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:where|group|order|having|limit|offset|union|except|intersect)\b")
        .expect("clause pattern is valid")
});

static MULTI_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i),|\bjoin\b|\b(?:inner|left|right|full|cross|outer)\s")
        .expect("join pattern is valid")
});

fn not_a_table_select() -> DbManagerError {
    DbManagerError::ConfigError("update requires a SELECT ... FROM <table> statement".to_string())
}

/// Extract the single base table named by a select statement.
///
/// Only the `FROM` clause is inspected for joins, so function calls such as `left(...)` in a
/// `WHERE` clause are fine. Derived tables (`FROM (SELECT ...)`) are rejected.
///
/// # Errors
/// Returns `DbManagerError::ConfigError` if the statement is not a select over exactly one table.
pub fn base_table(select_sql: &str) -> Result<String, DbManagerError> {
    let from = SELECT_FROM
        .captures(select_sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_start())
        .ok_or_else(not_a_table_select)?;
    if from.starts_with('(') {
        return Err(DbManagerError::ConfigError(
            "update is not supported against a derived table".to_string(),
        ));
    }

    let caps = TABLE_NAME.captures(from).ok_or_else(not_a_table_select)?;
    let rest = caps.get(2).map_or("", |m| m.as_str());
    let from_clause = CLAUSE_START.find(rest).map_or(rest, |m| &rest[..m.start()]);
    if MULTI_TABLE.is_match(from_clause) {
        return Err(DbManagerError::ConfigError(
            "update is not supported against a select over more than one table".to_string(),
        ));
    }
    Ok(caps[1].to_string())
}

/// Strip quoting from the last segment of a possibly qualified table name.
fn unqualified_name(table: &str) -> &str {
    if let Some(stripped) = table.strip_suffix(']') {
        stripped.rfind('[').map_or(stripped, |i| &stripped[i + 1..])
    } else if let Some(stripped) = table.strip_suffix('"') {
        stripped.rfind('"').map_or(stripped, |i| &stripped[i + 1..])
    } else {
        table.rsplit('.').next().unwrap_or(table)
    }
}

/// Catalog query returning the key column names of `table`, in key order.
///
/// Postgres and SQL Server resolve the name as written (`regclass`, `OBJECT_ID`), so a
/// schema-qualified name only matches that schema's table.
#[must_use]
pub fn key_lookup_command(
    provider: ProviderKind,
    table: &str,
    timeout: Option<Duration>,
) -> Command {
    let (sql, name) = match provider {
        ProviderKind::Sqlite => (
            "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk",
            unqualified_name(table),
        ),
        ProviderKind::Postgres => (
            "SELECT a.attname::text FROM pg_index i \
             JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
             WHERE i.indrelid = ($1::text)::regclass AND i.indisprimary \
             ORDER BY a.attnum",
            table,
        ),
        ProviderKind::Mssql => (
            "SELECT c.name FROM sys.indexes i \
             JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
             JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
             WHERE i.is_primary_key = 1 AND i.object_id = OBJECT_ID(@P1) \
             ORDER BY ic.key_ordinal",
            table,
        ),
    };
    Command::positional(sql.to_string(), vec![DbValue::Text(name.to_string())], timeout)
}

/// Catalog query returning the columns of `table` the database fills in on insert: identity
/// columns, `serial`/`nextval` defaults, and the `INTEGER PRIMARY KEY` rowid alias on `SQLite`.
#[must_use]
pub fn identity_lookup_command(
    provider: ProviderKind,
    table: &str,
    timeout: Option<Duration>,
) -> Command {
    let (sql, name) = match provider {
        ProviderKind::Sqlite => (
            "SELECT name FROM pragma_table_info(?1) \
             WHERE pk = 1 AND upper(type) = 'INTEGER' \
             AND (SELECT COUNT(*) FROM pragma_table_info(?1) WHERE pk > 0) = 1",
            unqualified_name(table),
        ),
        ProviderKind::Postgres => (
            "SELECT a.attname::text FROM pg_attribute a \
             LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
             WHERE a.attrelid = ($1::text)::regclass AND a.attnum > 0 AND NOT a.attisdropped \
             AND (a.attidentity IN ('a', 'd') OR pg_get_expr(d.adbin, d.adrelid) LIKE 'nextval(%') \
             ORDER BY a.attnum",
            table,
        ),
        ProviderKind::Mssql => (
            "SELECT c.name FROM sys.columns c \
             WHERE c.object_id = OBJECT_ID(@P1) \
             AND COLUMNPROPERTY(c.object_id, c.name, 'IsIdentity') = 1",
            table,
        ),
    };
    Command::positional(sql.to_string(), vec![DbValue::Text(name.to_string())], timeout)
}

/// Generates the insert, update and delete statements for one base table.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    provider: ProviderKind,
    table: String,
    key_columns: Vec<usize>,
    timeout: Option<Duration>,
}

impl CommandBuilder {
    /// Resolve `key_columns` against the table's columns.
    ///
    /// # Errors
    /// Returns `DbManagerError::ConfigError` if a key column is not part of the table.
    pub fn new(
        provider: ProviderKind,
        table: impl Into<String>,
        data: &DataTable,
        key_columns: &[String],
        timeout: Option<Duration>,
    ) -> Result<Self, DbManagerError> {
        let mut keys = Vec::with_capacity(key_columns.len());
        for key in key_columns {
            let idx = data.column_index(key).ok_or_else(|| {
                DbManagerError::ConfigError(format!(
                    "key column '{key}' is not part of the selected columns"
                ))
            })?;
            keys.push(idx);
        }
        Ok(Self {
            provider,
            table: table.into(),
            key_columns: keys,
            timeout,
        })
    }

    /// The statement that writes row `row` back, or `None` if the row needs no statement.
    ///
    /// # Errors
    /// Returns `DbManagerError::ConfigError` when an update or delete has no key columns.
    pub fn row_command(
        &self,
        data: &DataTable,
        row: usize,
    ) -> Result<Option<Command>, DbManagerError> {
        let Some(data_row) = data.rows().get(row) else {
            return Ok(None);
        };
        match data_row.state() {
            RowState::Unchanged => Ok(None),
            RowState::Added => Ok(Some(self.insert(data, row))),
            RowState::Modified => self.update(data, row),
            RowState::Deleted => self.delete(data, row).map(Some),
        }
    }

    fn quote(&self, ident: &str) -> String {
        self.provider.quote_identifier(ident)
    }

    fn insert(&self, data: &DataTable, row: usize) -> Command {
        let values = data.rows()[row].values();
        let mut columns = Vec::new();
        let mut params = Vec::new();
        for (col, value) in data.columns().iter().zip(values) {
            if col.auto_increment && value.is_null() {
                continue;
            }
            columns.push(self.quote(&col.name));
            params.push(value.clone());
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.table)
        } else {
            let placeholders: Vec<String> = (1..=params.len())
                .map(|i| self.provider.placeholder(i))
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        Command::positional(sql, params, self.timeout)
    }

    fn update(&self, data: &DataTable, row: usize) -> Result<Option<Command>, DbManagerError> {
        self.require_keys("update")?;
        let data_row = &data.rows()[row];

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (idx, col) in data.columns().iter().enumerate() {
            if col.auto_increment {
                continue;
            }
            let current = data_row.get_by_index(idx);
            if current == data_row.original_by_index(idx) {
                continue;
            }
            params.push(current.cloned().unwrap_or_default());
            assignments.push(format!(
                "{} = {}",
                self.quote(&col.name),
                self.provider.placeholder(params.len())
            ));
        }
        if assignments.is_empty() {
            return Ok(None);
        }

        let predicate = self.key_predicate(data, row, &mut params);
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table,
            assignments.join(", "),
            predicate
        );
        Ok(Some(Command::positional(sql, params, self.timeout)))
    }

    fn delete(&self, data: &DataTable, row: usize) -> Result<Command, DbManagerError> {
        self.require_keys("delete")?;
        let mut params = Vec::new();
        let predicate = self.key_predicate(data, row, &mut params);
        let sql = format!("DELETE FROM {} WHERE {}", self.table, predicate);
        Ok(Command::positional(sql, params, self.timeout))
    }

    /// `WHERE` clause matching the row's original key values; appends to `params`.
    fn key_predicate(&self, data: &DataTable, row: usize, params: &mut Vec<DbValue>) -> String {
        let data_row = &data.rows()[row];
        let columns = data.columns();
        self.key_columns
            .iter()
            .map(|&idx| {
                let name = self.quote(&columns[idx].name);
                match data_row
                    .original_by_index(idx)
                    .or_else(|| data_row.get_by_index(idx))
                {
                    Some(DbValue::Null) | None => format!("{name} IS NULL"),
                    Some(value) => {
                        params.push(value.clone());
                        format!("{name} = {}", self.provider.placeholder(params.len()))
                    }
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn require_keys(&self, action: &str) -> Result<(), DbManagerError> {
        if self.key_columns.is_empty() {
            return Err(DbManagerError::ConfigError(format!(
                "cannot generate {action} statements for {}: no key column information",
                self.table
            )));
        }
        Ok(())
    }
}
