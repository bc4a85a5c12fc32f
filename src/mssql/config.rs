use tiberius::{Client, Config as TiberiusConfig, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::DbManagerError;

/// Type alias for an open SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Parse an ADO.NET connection string (`Server=...;Database=...;User Id=...;Password=...`).
///
/// # Errors
/// Returns `DbManagerError::ConfigError` if `tiberius` rejects the string.
pub fn mssql_config(raw: &str) -> Result<TiberiusConfig, DbManagerError> {
    TiberiusConfig::from_ado_string(raw).map_err(|e| {
        DbManagerError::ConfigError(format!("invalid SQL Server connection string: {e}"))
    })
}

/// Connect over TCP, resolving a named instance through the SQL Browser when one is given.
///
/// # Errors
/// Returns `DbManagerError::ConnectionError` for socket failures and the driver error for
/// login failures.
pub async fn open_connection(config: TiberiusConfig) -> Result<MssqlClient, DbManagerError> {
    let tcp = TcpStream::connect_named(&config).await.map_err(|e| {
        DbManagerError::ConnectionError(format!("SQL Server connect error: {e}"))
    })?;
    tcp.set_nodelay(true).map_err(|e| {
        DbManagerError::ConnectionError(format!("SQL Server socket setup error: {e}"))
    })?;
    Ok(Client::connect(config, tcp.compat_write()).await?)
}

/// Close the client, ending the session on the server.
///
/// # Errors
/// Returns the driver error if the close handshake fails.
pub async fn close(client: MssqlClient) -> Result<(), DbManagerError> {
    Ok(client.close().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ado_strings() {
        let cfg = mssql_config(
            "Server=tcp:db.local,1444;Database=master;User Id=sa;Password=secret;TrustServerCertificate=true",
        )
        .unwrap();
        assert_eq!(cfg.get_addr(), "db.local:1444");
    }
}
