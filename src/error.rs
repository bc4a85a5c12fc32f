use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "mssql")]
use tiberius;
#[cfg(feature = "postgres")]
use tokio_postgres;

#[derive(Debug, Error)]
pub enum DbManagerError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("{name} may not be empty: {message}")]
    InvalidArgument { name: &'static str, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    #[error("Concurrency violation: {0}")]
    ConcurrencyViolation(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    /// Wraps any failure raised inside a [`crate::DbManager`] operation.
    #[error("{operation} - Exception thrown")]
    OperationFailed {
        operation: String,
        #[source]
        source: Box<DbManagerError>,
    },
}

impl DbManagerError {
    /// The innermost error, looking through `OperationFailed` wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &DbManagerError {
        match self {
            DbManagerError::OperationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<tokio::task::JoinError> for DbManagerError {
    fn from(err: tokio::task::JoinError) -> Self {
        DbManagerError::ExecutionError(format!("blocking task failed: {err}"))
    }
}
