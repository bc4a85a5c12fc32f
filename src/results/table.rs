use std::sync::Arc;

use serde::Serialize;

use super::row::{DataRow, RowState};
use crate::error::DbManagerError;
use crate::types::DbValue;

/// Column metadata of a [`DataTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataColumn {
    pub name: String,
    /// Value is generated by the database; the column is left out of inserts while `NULL`
    pub auto_increment: bool,
}

impl DataColumn {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auto_increment: false,
        }
    }

    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// In-memory tabular result of a select, with per-row change tracking.
///
/// Filled tables start with every row `Unchanged`; edits made through [`DataTable::set`],
/// [`DataTable::add_row`] and [`DataTable::delete`] are written back by
/// [`crate::DatabaseManager::update_table`].
/// ```rust
/// use db_manager::prelude::*;
///
/// let mut table = DataTable::new(vec![DataColumn::new("id"), DataColumn::new("name")]);
/// table.add_row(vec![1.into(), "a".into()]).unwrap();
/// assert_eq!(table.rows().len(), 1);
/// assert_eq!(table.value(0, "NAME").and_then(DbValue::as_text), Some("a"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataTable {
    columns: Arc<Vec<DataColumn>>,
    rows: Vec<DataRow>,
    primary_key: Vec<String>,
}

impl DataTable {
    #[must_use]
    pub fn new(columns: Vec<DataColumn>) -> Self {
        Self {
            columns: Arc::new(columns),
            rows: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Create an empty table with room for `capacity` rows.
    pub(crate) fn with_column_names(names: Vec<String>, capacity: usize) -> Self {
        Self {
            columns: Arc::new(names.into_iter().map(DataColumn::new).collect()),
            rows: Vec::with_capacity(capacity),
            primary_key: Vec::new(),
        }
    }

    /// Append a row read from the database.
    pub(crate) fn push_filled(&mut self, values: Vec<DbValue>) {
        self.rows.push(DataRow::unchanged(values));
    }

    #[must_use]
    pub fn columns(&self) -> &[DataColumn] {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Index of a column, matched case-insensitively.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
    }

    /// Mark a column as database generated.
    ///
    /// # Errors
    /// Returns `DbManagerError::ConfigError` if the column does not exist.
    pub fn set_auto_increment(&mut self, name: &str) -> Result<(), DbManagerError> {
        let idx = self.require_column(name)?;
        Arc::make_mut(&mut self.columns)[idx].auto_increment = true;
        Ok(())
    }

    #[must_use]
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Declare the key columns used to address rows on update and delete.
    ///
    /// # Errors
    /// Returns `DbManagerError::ConfigError` if any column does not exist.
    pub fn set_primary_key<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<(), DbManagerError> {
        let mut key = Vec::with_capacity(columns.len());
        for col in columns {
            let idx = self.require_column(col.as_ref())?;
            key.push(self.columns[idx].name.clone());
        }
        self.primary_key = key;
        Ok(())
    }

    /// All rows, including those marked deleted.
    #[must_use]
    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    /// Number of rows not marked deleted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.state != RowState::Deleted)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value at `row`, `column`.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&DbValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get_by_index(idx)
    }

    /// Append a new row; it is inserted on the next update.
    ///
    /// # Errors
    /// Returns `DbManagerError::ParameterError` if the value count does not match the columns.
    pub fn add_row(&mut self, values: Vec<DbValue>) -> Result<usize, DbManagerError> {
        if values.len() != self.columns.len() {
            return Err(DbManagerError::ParameterError(format!(
                "row has {} values but the table has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(DataRow::added(values));
        Ok(self.rows.len() - 1)
    }

    /// Change a value; an unchanged row becomes modified.
    ///
    /// # Errors
    /// Returns an error if the row or column does not exist or the row is deleted.
    pub fn set(
        &mut self,
        row: usize,
        column: &str,
        value: impl Into<DbValue>,
    ) -> Result<(), DbManagerError> {
        let idx = self.require_column(column)?;
        let data_row = self.rows.get_mut(row).ok_or_else(|| {
            DbManagerError::ParameterError(format!("row {row} does not exist"))
        })?;
        if data_row.state == RowState::Deleted {
            return Err(DbManagerError::ParameterError(format!(
                "row {row} is deleted"
            )));
        }
        data_row.set_by_index(idx, value.into());
        Ok(())
    }

    /// Mark a row for deletion. A row that was never inserted is removed outright, which shifts
    /// the indexes of the rows after it.
    ///
    /// # Errors
    /// Returns `DbManagerError::ParameterError` if the row does not exist.
    pub fn delete(&mut self, row: usize) -> Result<(), DbManagerError> {
        let state = self
            .rows
            .get(row)
            .map(DataRow::state)
            .ok_or_else(|| DbManagerError::ParameterError(format!("row {row} does not exist")))?;
        if state == RowState::Added {
            self.rows.remove(row);
        } else {
            self.rows[row].state = RowState::Deleted;
        }
        Ok(())
    }

    /// Indexes of rows that differ from the database, in row order.
    #[must_use]
    pub fn pending_changes(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.state != RowState::Unchanged)
            .map(|(i, _)| i)
            .collect()
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.rows.iter().any(|r| r.state != RowState::Unchanged)
    }

    /// Commit one row locally. Returns `true` if the row was removed (it was deleted).
    pub(crate) fn accept_row(&mut self, row: usize) -> bool {
        match self.rows.get(row).map(DataRow::state) {
            Some(RowState::Deleted) => {
                self.rows.remove(row);
                true
            }
            Some(_) => {
                self.rows[row].accept();
                false
            }
            None => false,
        }
    }

    /// Drop deleted rows and mark every remaining row unchanged.
    pub fn accept_changes(&mut self) {
        self.rows.retain(|r| r.state != RowState::Deleted);
        for row in &mut self.rows {
            row.accept();
        }
    }

    /// Serialize as a JSON array of objects keyed by column name; deleted rows are skipped.
    #[must_use]
    pub fn to_json_rows(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .filter(|r| r.state != RowState::Deleted)
            .map(|r| {
                let obj: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .zip(r.values())
                    .map(|(c, v)| {
                        (
                            c.name.clone(),
                            serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::Value::Array(rows)
    }

    fn require_column(&self, name: &str) -> Result<usize, DbManagerError> {
        self.column_index(name).ok_or_else(|| {
            DbManagerError::ConfigError(format!("column '{name}' does not exist"))
        })
    }
}
