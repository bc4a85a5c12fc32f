use std::time::Duration;

use crate::command::Command;
use crate::error::DbManagerError;
use crate::provider::ProviderKind;
use crate::results::DataTable;
use crate::types::DbValue;

#[cfg(feature = "mssql")]
use crate::mssql;
#[cfg(feature = "postgres")]
use crate::postgres;
#[cfg(feature = "sqlite")]
use crate::sqlite;

/// An open connection to one of the enabled providers.
///
/// Dropping the value closes the underlying connection; [`ProviderConnection::close`] does the
/// same but lets the driver finish its shutdown handshake and report errors.
pub enum ProviderConnection {
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SharedSqliteConnection),
    #[cfg(feature = "postgres")]
    Postgres(postgres::PostgresConnection),
    #[cfg(feature = "mssql")]
    Mssql(Box<mssql::MssqlClient>),
}

// Manual Debug implementation because the tiberius client doesn't implement Debug
impl std::fmt::Debug for ProviderConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => f.debug_tuple("Sqlite").field(&"<Connection>").finish(),
            #[cfg(feature = "postgres")]
            Self::Postgres(conn) => f.debug_tuple("Postgres").field(conn).finish(),
            #[cfg(feature = "mssql")]
            Self::Mssql(_) => f.debug_tuple("Mssql").field(&"<TiberiusClient>").finish(),
            #[allow(unreachable_patterns)]
            _ => f.write_str("ProviderConnection"),
        }
    }
}

fn not_enabled(provider: ProviderKind) -> DbManagerError {
    DbManagerError::Unimplemented(format!(
        "the {provider} provider is not enabled in the current build"
    ))
}

impl ProviderConnection {
    /// Open a connection for `provider` from its connection string.
    ///
    /// `timeout` doubles as the `SQLite` busy timeout.
    ///
    /// # Errors
    /// Returns configuration errors for a malformed connection string, driver errors when the
    /// database cannot be reached, or `Unimplemented` when the provider's feature is disabled.
    #[allow(unused_variables)]
    pub async fn open(
        provider: ProviderKind,
        connection_string: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, DbManagerError> {
        match provider {
            #[cfg(feature = "sqlite")]
            ProviderKind::Sqlite => {
                let opts = sqlite::SqliteOptions::from_connection_string(connection_string)?;
                Ok(ProviderConnection::Sqlite(
                    sqlite::open_connection(opts, timeout).await?,
                ))
            }
            #[cfg(feature = "postgres")]
            ProviderKind::Postgres => {
                let cfg = postgres::postgres_config(connection_string)?;
                Ok(ProviderConnection::Postgres(
                    postgres::open_connection(&cfg).await?,
                ))
            }
            #[cfg(feature = "mssql")]
            ProviderKind::Mssql => {
                let cfg = mssql::mssql_config(connection_string)?;
                Ok(ProviderConnection::Mssql(Box::new(
                    mssql::open_connection(cfg).await?,
                )))
            }
            #[allow(unreachable_patterns)]
            other => Err(not_enabled(other)),
        }
    }

    /// Execute a command and fill a `DataTable` with its rows.
    ///
    /// # Errors
    /// Returns the provider's execution error.
    pub async fn fill(&mut self, cmd: &Command) -> Result<DataTable, DbManagerError> {
        match self {
            #[cfg(feature = "sqlite")]
            ProviderConnection::Sqlite(conn) => sqlite::fill(conn, cmd).await,
            #[cfg(feature = "postgres")]
            ProviderConnection::Postgres(conn) => postgres::fill(conn, cmd).await,
            #[cfg(feature = "mssql")]
            ProviderConnection::Mssql(client) => mssql::fill(client, cmd).await,
            #[allow(unreachable_patterns)]
            _ => Err(DbManagerError::Unimplemented(
                "no database provider is enabled in the current build".to_string(),
            )),
        }
    }

    /// Execute a command and return the first column of its first row.
    ///
    /// # Errors
    /// Returns the provider's execution error.
    pub async fn scalar(&mut self, cmd: &Command) -> Result<DbValue, DbManagerError> {
        match self {
            #[cfg(feature = "sqlite")]
            ProviderConnection::Sqlite(conn) => sqlite::scalar(conn, cmd).await,
            #[cfg(feature = "postgres")]
            ProviderConnection::Postgres(conn) => postgres::scalar(conn, cmd).await,
            #[cfg(feature = "mssql")]
            ProviderConnection::Mssql(client) => mssql::scalar(client, cmd).await,
            #[allow(unreachable_patterns)]
            _ => Err(DbManagerError::Unimplemented(
                "no database provider is enabled in the current build".to_string(),
            )),
        }
    }

    /// Execute a command and return the number of rows affected.
    ///
    /// # Errors
    /// Returns the provider's execution error.
    pub async fn execute(&mut self, cmd: &Command) -> Result<u64, DbManagerError> {
        match self {
            #[cfg(feature = "sqlite")]
            ProviderConnection::Sqlite(conn) => sqlite::execute(conn, cmd).await,
            #[cfg(feature = "postgres")]
            ProviderConnection::Postgres(conn) => postgres::execute(conn, cmd).await,
            #[cfg(feature = "mssql")]
            ProviderConnection::Mssql(client) => mssql::execute(client, cmd).await,
            #[allow(unreachable_patterns)]
            _ => Err(DbManagerError::Unimplemented(
                "no database provider is enabled in the current build".to_string(),
            )),
        }
    }

    /// Close the connection.
    ///
    /// # Errors
    /// Returns the driver error if shutdown fails.
    pub async fn close(self) -> Result<(), DbManagerError> {
        match self {
            #[cfg(feature = "sqlite")]
            ProviderConnection::Sqlite(conn) => sqlite::close(conn).await,
            #[cfg(feature = "postgres")]
            ProviderConnection::Postgres(conn) => postgres::close(conn).await,
            #[cfg(feature = "mssql")]
            ProviderConnection::Mssql(client) => mssql::close(*client).await,
            #[allow(unreachable_patterns)]
            _ => Err(DbManagerError::Unimplemented(
                "no database provider is enabled in the current build".to_string(),
            )),
        }
    }
}
