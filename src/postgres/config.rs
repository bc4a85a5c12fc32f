use std::str::FromStr;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config as PgConfig, NoTls};

use crate::connection_string::ConnectionString;
use crate::error::DbManagerError;

/// An open client plus the task driving its socket.
pub struct PostgresConnection {
    pub client: Client,
    driver: JoinHandle<()>,
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection").finish_non_exhaustive()
    }
}

/// Build a driver config from a connection string.
///
/// URLs (`postgres://...`) and libpq `key=value` strings without `;` are handed to
/// `tokio-postgres` as they are. Otherwise the ADO form is read: `Host`/`Server`, `Port`,
/// `Database`/`Initial Catalog`, `Username`/`User Id`, `Password`, `Timeout` (connect seconds)
/// and `Application Name`.
///
/// # Errors
/// Returns `DbManagerError::ConfigError` for missing host/database or malformed values.
pub fn postgres_config(raw: &str) -> Result<PgConfig, DbManagerError> {
    let trimmed = raw.trim();
    if trimmed.starts_with("postgres://")
        || trimmed.starts_with("postgresql://")
        || !trimmed.contains(';')
    {
        if let Ok(cfg) = PgConfig::from_str(trimmed) {
            if cfg.get_hosts().is_empty() || cfg.get_dbname().is_none() {
                return Err(DbManagerError::ConfigError(
                    "postgres connection string needs a host and a database".to_string(),
                ));
            }
            return Ok(cfg);
        }
    }

    let cs = ConnectionString::parse(trimmed)?;
    let mut cfg = PgConfig::new();
    cfg.host(cs.require(&["Host", "Server", "Data Source"])?);
    cfg.dbname(cs.require(&["Database", "Initial Catalog"])?);
    if let Some(port) = cs.get(&["Port"]) {
        let port = port.parse::<u16>().map_err(|e| {
            DbManagerError::ConfigError(format!("invalid postgres port '{port}': {e}"))
        })?;
        cfg.port(port);
    }
    if let Some(user) = cs.get(&["Username", "User Id", "User", "UID"]) {
        cfg.user(user);
    }
    if let Some(password) = cs.get(&["Password", "PWD"]) {
        cfg.password(password);
    }
    if let Some(secs) = cs.get(&["Timeout", "Connect Timeout"]) {
        let secs = secs.parse::<u64>().map_err(|e| {
            DbManagerError::ConfigError(format!("invalid postgres timeout '{secs}': {e}"))
        })?;
        cfg.connect_timeout(Duration::from_secs(secs));
    }
    if let Some(app) = cs.get(&["Application Name", "ApplicationName"]) {
        cfg.application_name(app);
    }
    Ok(cfg)
}

/// Connect and spawn the connection driver task.
///
/// # Errors
/// Returns the driver error if the server cannot be reached or rejects the login.
pub async fn open_connection(cfg: &PgConfig) -> Result<PostgresConnection, DbManagerError> {
    let (client, connection) = cfg.connect(NoTls).await?;
    let driver = tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!("postgres connection closed with error: {e}");
        }
    });
    Ok(PostgresConnection { client, driver })
}

/// Drop the client and wait for the driver task to finish.
///
/// # Errors
/// Returns `ExecutionError` if the driver task panicked.
pub async fn close(conn: PostgresConnection) -> Result<(), DbManagerError> {
    let PostgresConnection { client, driver } = conn;
    drop(client);
    driver.await?;
    Ok(())
}
