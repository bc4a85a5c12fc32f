use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::command::Command;
use crate::config::{DEFAULT_COMMAND_TIMEOUT_SECS, DbManagerBuilder, ManagerConfig};
use crate::connection::ProviderConnection;
use crate::error::DbManagerError;
use crate::provider::ProviderKind;
use crate::results::{DataTable, RowState};
use crate::types::{DbValue, Parameters};
use crate::update::{self, CommandBuilder};

/// The operations a database manager offers.
///
/// Every call opens its own connection, runs one command and closes the connection again,
/// whether it succeeds or fails. Failures are logged and wrapped in
/// [`DbManagerError::OperationFailed`] naming the operation.
#[async_trait]
pub trait DatabaseManager: Send + Sync {
    /// Run a stored procedure and return its first result set.
    async fn execute_stored_procedure(
        &self,
        parameters: &Parameters,
        procedure_name: &str,
    ) -> Result<DataTable, DbManagerError>;

    /// Run a stored procedure and return the first column of its first row.
    async fn execute_stored_procedure_scalar(
        &self,
        parameters: &Parameters,
        procedure_name: &str,
    ) -> Result<DbValue, DbManagerError>;

    async fn execute_select_statement(&self, sql: &str) -> Result<DataTable, DbManagerError>;

    async fn execute_select_statement_scalar(&self, sql: &str) -> Result<DbValue, DbManagerError>;

    /// Write the pending changes of `table` back to the table `select_sql` reads from.
    ///
    /// Returns the number of rows affected.
    async fn update_table(
        &self,
        select_sql: &str,
        table: &mut DataTable,
    ) -> Result<u64, DbManagerError>;

    /// Run a statement that returns no rows and report the rows affected.
    async fn execute_non_query(&self, sql: &str) -> Result<u64, DbManagerError>;

    /// Seconds each command may run; `0` means no limit.
    fn command_timeout(&self) -> u64;

    fn set_command_timeout(&mut self, secs: u64);
}

/// Database manager bound to one provider and connection string.
#[derive(Clone)]
pub struct DbManager {
    provider: ProviderKind,
    connection_string: String,
    command_timeout: u64,
}

// Manual Debug implementation so connection strings (and their passwords) stay out of logs
impl std::fmt::Debug for DbManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbManager")
            .field("provider", &self.provider)
            .field("connection_string", &"<redacted>")
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

fn qualified(operation: &str) -> String {
    format!("{}::DbManager::{operation}()", module_path!())
}

fn log_failure(operation: &str, err: &DbManagerError) {
    tracing::error!("{} - Exception thrown", qualified(operation));
    tracing::error!("{err}");
}

/// Text values of the first column, as returned by the catalog lookups.
fn first_column_names(table: &DataTable) -> Vec<String> {
    table
        .rows()
        .iter()
        .filter_map(|r| r.get_by_index(0).and_then(DbValue::as_text))
        .map(str::to_string)
        .collect()
}

/// Close the connection after a successful command; after a failure the connection is dropped.
async fn finish<R>(
    conn: ProviderConnection,
    result: Result<R, DbManagerError>,
) -> Result<R, DbManagerError> {
    match result {
        Ok(value) => {
            conn.close().await?;
            Ok(value)
        }
        Err(err) => {
            drop(conn);
            Err(err)
        }
    }
}

impl DbManager {
    /// Create a manager for `provider_name`.
    ///
    /// The provider name accepts the short names (`mssql`, `postgres`, `sqlite`) as well as the
    /// common ADO.NET invariant names such as `System.Data.SqlClient`.
    ///
    /// # Errors
    /// Returns `DbManagerError::InvalidArgument` if either argument is empty, or
    /// `DbManagerError::ConfigError` if the provider is unknown.
    pub fn new(provider_name: &str, connection_string: &str) -> Result<Self, DbManagerError> {
        Self::with_timeout(provider_name, connection_string, DEFAULT_COMMAND_TIMEOUT_SECS)
    }

    /// Create a manager from a [`ManagerConfig`].
    ///
    /// # Errors
    /// Same as [`DbManager::new`].
    pub fn from_config(config: &ManagerConfig) -> Result<Self, DbManagerError> {
        Self::with_timeout(
            &config.provider,
            &config.connection_string,
            config.command_timeout_secs,
        )
    }

    #[must_use]
    pub fn builder(
        provider_name: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> DbManagerBuilder {
        DbManagerBuilder::new(provider_name, connection_string)
    }

    fn with_timeout(
        provider_name: &str,
        connection_string: &str,
        command_timeout: u64,
    ) -> Result<Self, DbManagerError> {
        let resolved = Self::validate(provider_name, connection_string);
        match resolved {
            Ok(provider) => {
                tracing::debug!("DbManager created for provider {provider}");
                Ok(Self {
                    provider,
                    connection_string: connection_string.to_string(),
                    command_timeout,
                })
            }
            Err(err) => {
                log_failure("new", &err);
                Err(err)
            }
        }
    }

    fn validate(provider_name: &str, connection_string: &str) -> Result<ProviderKind, DbManagerError> {
        if provider_name.trim().is_empty() {
            return Err(DbManagerError::InvalidArgument {
                name: "provider_name",
                message: "a database provider must be named".to_string(),
            });
        }
        if connection_string.trim().is_empty() {
            return Err(DbManagerError::InvalidArgument {
                name: "connection_string",
                message: "a connection string is required".to_string(),
            });
        }
        ProviderKind::from_name(provider_name)
    }

    #[must_use]
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// The command timeout as a duration, `None` when unlimited.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.command_timeout > 0).then(|| Duration::from_secs(self.command_timeout))
    }

    /// Fix up a parameter name for this manager's provider.
    ///
    /// # Errors
    /// Returns `DbManagerError::ParameterError` for names that are not plain identifiers.
    pub fn fix_parameter_name(&self, name: &str) -> Result<String, DbManagerError> {
        self.provider.fix_parameter_name(name)
    }

    fn fail(&self, operation: &str, err: DbManagerError) -> DbManagerError {
        log_failure(operation, &err);
        DbManagerError::OperationFailed {
            operation: qualified(operation),
            source: Box::new(err),
        }
    }

    async fn open(&self) -> Result<ProviderConnection, DbManagerError> {
        ProviderConnection::open(self.provider, &self.connection_string, self.timeout()).await
    }

    async fn fill(&self, cmd: &Command) -> Result<DataTable, DbManagerError> {
        tracing::debug!("{} fill: {}", self.provider, cmd.text);
        let started = Instant::now();
        let mut conn = self.open().await?;
        let result = conn.fill(cmd).await;
        tracing::debug!("{} fill finished in {:?}", self.provider, started.elapsed());
        finish(conn, result).await
    }

    async fn scalar(&self, cmd: &Command) -> Result<DbValue, DbManagerError> {
        tracing::debug!("{} scalar: {}", self.provider, cmd.text);
        let started = Instant::now();
        let mut conn = self.open().await?;
        let result = conn.scalar(cmd).await;
        tracing::debug!("{} scalar finished in {:?}", self.provider, started.elapsed());
        finish(conn, result).await
    }

    async fn execute(&self, cmd: &Command) -> Result<u64, DbManagerError> {
        tracing::debug!("{} execute: {}", self.provider, cmd.text);
        let started = Instant::now();
        let mut conn = self.open().await?;
        let result = conn.execute(cmd).await;
        tracing::debug!("{} execute finished in {:?}", self.provider, started.elapsed());
        finish(conn, result).await
    }

    async fn write_changes(
        &self,
        conn: &mut ProviderConnection,
        base_table: &str,
        table: &mut DataTable,
    ) -> Result<u64, DbManagerError> {
        let timeout = self.timeout();
        let needs_keys = table
            .rows()
            .iter()
            .any(|r| matches!(r.state(), RowState::Modified | RowState::Deleted));
        let writes_values = table
            .rows()
            .iter()
            .any(|r| matches!(r.state(), RowState::Added | RowState::Modified));

        let keys: Vec<String> = if !table.primary_key().is_empty() || !needs_keys {
            table.primary_key().to_vec()
        } else {
            let lookup = update::key_lookup_command(self.provider, base_table, timeout);
            first_column_names(&conn.fill(&lookup).await?)
        };
        tracing::debug!("updating {base_table} keyed on {keys:?}");

        if writes_values && !table.columns().iter().any(|c| c.auto_increment) {
            let lookup = update::identity_lookup_command(self.provider, base_table, timeout);
            for name in first_column_names(&conn.fill(&lookup).await?) {
                // identity columns that were not selected have nothing to skip
                if table.column_index(&name).is_some() {
                    table.set_auto_increment(&name)?;
                }
            }
        }

        let builder = CommandBuilder::new(self.provider, base_table, table, &keys, timeout)?;
        let mut total = 0;
        let mut idx = 0;
        while idx < table.rows().len() {
            let state = table.rows()[idx].state();
            if state == RowState::Unchanged {
                idx += 1;
                continue;
            }
            if let Some(cmd) = builder.row_command(table, idx)? {
                tracing::debug!("{} update row {idx}: {}", self.provider, cmd.text);
                let affected = conn.execute(&cmd).await?;
                if affected == 0 && state != RowState::Added {
                    return Err(DbManagerError::ConcurrencyViolation(format!(
                        "the {state:?} command for row {idx} affected 0 of the expected 1 records"
                    )));
                }
                total += affected;
            }
            if !table.accept_row(idx) {
                idx += 1;
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl DatabaseManager for DbManager {
    async fn execute_stored_procedure(
        &self,
        parameters: &Parameters,
        procedure_name: &str,
    ) -> Result<DataTable, DbManagerError> {
        let outcome = async {
            let cmd =
                Command::stored_procedure(self.provider, procedure_name, parameters, self.timeout())?;
            self.fill(&cmd).await
        }
        .await;
        outcome.map_err(|e| self.fail("execute_stored_procedure", e))
    }

    async fn execute_stored_procedure_scalar(
        &self,
        parameters: &Parameters,
        procedure_name: &str,
    ) -> Result<DbValue, DbManagerError> {
        let outcome = async {
            let cmd =
                Command::stored_procedure(self.provider, procedure_name, parameters, self.timeout())?;
            self.scalar(&cmd).await
        }
        .await;
        outcome.map_err(|e| self.fail("execute_stored_procedure_scalar", e))
    }

    async fn execute_select_statement(&self, sql: &str) -> Result<DataTable, DbManagerError> {
        let cmd = Command::text(sql, self.timeout());
        self.fill(&cmd)
            .await
            .map_err(|e| self.fail("execute_select_statement", e))
    }

    async fn execute_select_statement_scalar(&self, sql: &str) -> Result<DbValue, DbManagerError> {
        let cmd = Command::text(sql, self.timeout());
        self.scalar(&cmd)
            .await
            .map_err(|e| self.fail("execute_select_statement_scalar", e))
    }

    async fn update_table(
        &self,
        select_sql: &str,
        table: &mut DataTable,
    ) -> Result<u64, DbManagerError> {
        let outcome = async {
            let base_table = update::base_table(select_sql)?;
            if !table.has_changes() {
                return Ok(0);
            }
            let mut conn = self.open().await?;
            let result = self.write_changes(&mut conn, &base_table, table).await;
            finish(conn, result).await
        }
        .await;
        outcome.map_err(|e| self.fail("update_table", e))
    }

    async fn execute_non_query(&self, sql: &str) -> Result<u64, DbManagerError> {
        let cmd = Command::text(sql, self.timeout());
        self.execute(&cmd)
            .await
            .map_err(|e| self.fail("execute_non_query", e))
    }

    fn command_timeout(&self) -> u64 {
        self.command_timeout
    }

    fn set_command_timeout(&mut self, secs: u64) {
        self.command_timeout = secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_arguments_are_rejected() {
        let err = DbManager::new("", "Data Source=x.db").unwrap_err();
        assert!(matches!(
            err,
            DbManagerError::InvalidArgument { name: "provider_name", .. }
        ));
        let err = DbManager::new("sqlite", "  ").unwrap_err();
        assert!(matches!(
            err,
            DbManagerError::InvalidArgument { name: "connection_string", .. }
        ));
    }

    #[test]
    fn unknown_provider_fails_at_construction() {
        let err = DbManager::new("Oracle.DataAccess.Client", "Data Source=x").unwrap_err();
        assert!(matches!(err, DbManagerError::ConfigError(_)));
    }

    #[test]
    fn timeout_defaults_and_zero_means_unlimited() {
        let mut mgr = DbManager::new("System.Data.SqlClient", "Server=.;Database=db").unwrap();
        assert_eq!(mgr.provider(), ProviderKind::Mssql);
        assert_eq!(mgr.command_timeout(), 300);
        assert_eq!(mgr.timeout(), Some(Duration::from_secs(300)));
        mgr.set_command_timeout(0);
        assert_eq!(mgr.timeout(), None);
    }

    #[test]
    fn debug_output_hides_connection_string() {
        let mgr = DbManager::new("postgres", "Host=h;Database=d;Password=hunter2").unwrap();
        let shown = format!("{mgr:?}");
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn failures_name_the_operation() {
        let mgr = DbManager::new("sqlite", "Data Source=x.db").unwrap();
        let err = mgr.fail(
            "execute_non_query",
            DbManagerError::ExecutionError("boom".into()),
        );
        match err {
            DbManagerError::OperationFailed { operation, source } => {
                assert!(operation.ends_with("DbManager::execute_non_query()"));
                assert!(matches!(*source, DbManagerError::ExecutionError(_)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
