use tokio::runtime::{Builder, Runtime};

use crate::config::ManagerConfig;
use crate::error::DbManagerError;
use crate::manager::{DatabaseManager, DbManager};
use crate::results::DataTable;
use crate::types::{DbValue, Parameters};

/// Synchronous front end to [`DbManager`] for callers without an async runtime.
///
/// Owns a current-thread tokio runtime and blocks on each operation. Calling these methods from
/// inside an async context panics, as with any nested `block_on`.
#[derive(Debug)]
pub struct BlockingDbManager {
    inner: DbManager,
    runtime: Runtime,
}

impl BlockingDbManager {
    /// # Errors
    /// Same as [`DbManager::new`], plus `ExecutionError` if the runtime cannot be started.
    pub fn new(provider_name: &str, connection_string: &str) -> Result<Self, DbManagerError> {
        Self::wrap(DbManager::new(provider_name, connection_string)?)
    }

    /// # Errors
    /// Same as [`DbManager::from_config`], plus `ExecutionError` if the runtime cannot be started.
    pub fn from_config(config: &ManagerConfig) -> Result<Self, DbManagerError> {
        Self::wrap(DbManager::from_config(config)?)
    }

    /// # Errors
    /// Returns `ExecutionError` if the runtime cannot be started.
    pub fn wrap(inner: DbManager) -> Result<Self, DbManagerError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbManagerError::ExecutionError(format!("cannot start runtime: {e}")))?;
        Ok(Self { inner, runtime })
    }

    #[must_use]
    pub fn inner(&self) -> &DbManager {
        &self.inner
    }

    /// # Errors
    /// See [`DatabaseManager::execute_stored_procedure`].
    pub fn execute_stored_procedure(
        &self,
        parameters: &Parameters,
        procedure_name: &str,
    ) -> Result<DataTable, DbManagerError> {
        self.runtime
            .block_on(self.inner.execute_stored_procedure(parameters, procedure_name))
    }

    /// # Errors
    /// See [`DatabaseManager::execute_stored_procedure_scalar`].
    pub fn execute_stored_procedure_scalar(
        &self,
        parameters: &Parameters,
        procedure_name: &str,
    ) -> Result<DbValue, DbManagerError> {
        self.runtime
            .block_on(self.inner.execute_stored_procedure_scalar(parameters, procedure_name))
    }

    /// # Errors
    /// See [`DatabaseManager::execute_select_statement`].
    pub fn execute_select_statement(&self, sql: &str) -> Result<DataTable, DbManagerError> {
        self.runtime.block_on(self.inner.execute_select_statement(sql))
    }

    /// # Errors
    /// See [`DatabaseManager::execute_select_statement_scalar`].
    pub fn execute_select_statement_scalar(&self, sql: &str) -> Result<DbValue, DbManagerError> {
        self.runtime
            .block_on(self.inner.execute_select_statement_scalar(sql))
    }

    /// # Errors
    /// See [`DatabaseManager::update_table`].
    pub fn update_table(
        &self,
        select_sql: &str,
        table: &mut DataTable,
    ) -> Result<u64, DbManagerError> {
        self.runtime
            .block_on(self.inner.update_table(select_sql, table))
    }

    /// # Errors
    /// See [`DatabaseManager::execute_non_query`].
    pub fn execute_non_query(&self, sql: &str) -> Result<u64, DbManagerError> {
        self.runtime.block_on(self.inner.execute_non_query(sql))
    }

    #[must_use]
    pub fn command_timeout(&self) -> u64 {
        self.inner.command_timeout()
    }

    pub fn set_command_timeout(&mut self, secs: u64) {
        self.inner.set_command_timeout(secs);
    }
}
