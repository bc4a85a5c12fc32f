use serde::Serialize;

use crate::types::DbValue;

/// Change tracking state of a [`DataRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowState {
    /// Matches the database as of the last fill or accepted update
    Unchanged,
    /// Created locally, not yet inserted
    Added,
    /// One or more values changed since the last fill
    Modified,
    /// Marked for deletion
    Deleted,
}

/// A single row of a [`super::DataTable`].
///
/// Keeps the values read from the database next to the current ones so updates and deletes
/// can address the row by its original key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataRow {
    pub(crate) values: Vec<DbValue>,
    #[serde(skip)]
    pub(crate) original: Option<Vec<DbValue>>,
    pub(crate) state: RowState,
}

impl DataRow {
    pub(crate) fn unchanged(values: Vec<DbValue>) -> Self {
        Self {
            original: Some(values.clone()),
            values,
            state: RowState::Unchanged,
        }
    }

    pub(crate) fn added(values: Vec<DbValue>) -> Self {
        Self {
            values,
            original: None,
            state: RowState::Added,
        }
    }

    #[must_use]
    pub fn state(&self) -> RowState {
        self.state
    }

    #[must_use]
    pub fn values(&self) -> &[DbValue] {
        &self.values
    }

    /// Value by column index.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&DbValue> {
        self.values.get(index)
    }

    /// The value as last read from the database; `None` for added rows.
    #[must_use]
    pub fn original_by_index(&self, index: usize) -> Option<&DbValue> {
        self.original.as_ref().and_then(|o| o.get(index))
    }

    pub(crate) fn set_by_index(&mut self, index: usize, value: DbValue) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
            if self.state == RowState::Unchanged {
                self.state = RowState::Modified;
            }
        }
    }

    pub(crate) fn accept(&mut self) {
        self.original = Some(self.values.clone());
        self.state = RowState::Unchanged;
    }
}
