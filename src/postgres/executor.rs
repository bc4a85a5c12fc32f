use std::future::Future;

use tokio_postgres::NoTls;

use super::config::PostgresConnection;
use super::query;
use crate::command::Command;
use crate::error::DbManagerError;
use crate::provider::ProviderKind;
use crate::results::DataTable;
use crate::types::DbValue;

/// Await `fut` within the command timeout, asking the server to cancel the query on expiry.
async fn with_timeout<F, R>(
    conn: &PostgresConnection,
    cmd: &Command,
    fut: F,
) -> Result<R, DbManagerError>
where
    F: Future<Output = Result<R, DbManagerError>>,
{
    let Some(limit) = cmd.timeout else {
        return fut.await;
    };
    let cancel = conn.client.cancel_token();
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            if let Err(e) = cancel.cancel_query(NoTls).await {
                tracing::warn!("postgres cancel request failed: {e}");
            }
            Err(DbManagerError::Timeout(limit.as_secs()))
        }
    }
}

/// Execute a command and fill a `DataTable`.
///
/// # Errors
/// Returns driver errors or `Timeout`.
pub async fn fill(conn: &PostgresConnection, cmd: &Command) -> Result<DataTable, DbManagerError> {
    let sql = cmd.effective_sql(ProviderKind::Postgres);
    let values = cmd.values();
    with_timeout(conn, cmd, query::fill(&conn.client, &sql, &values)).await
}

/// Execute a command and return the first column of the first row.
///
/// # Errors
/// Returns driver errors or `Timeout`.
pub async fn scalar(conn: &PostgresConnection, cmd: &Command) -> Result<DbValue, DbManagerError> {
    let sql = cmd.effective_sql(ProviderKind::Postgres);
    let values = cmd.values();
    with_timeout(conn, cmd, query::scalar(&conn.client, &sql, &values)).await
}

/// Execute a command and return rows affected.
///
/// # Errors
/// Returns driver errors or `Timeout`.
pub async fn execute(conn: &PostgresConnection, cmd: &Command) -> Result<u64, DbManagerError> {
    let sql = cmd.effective_sql(ProviderKind::Postgres);
    let values = cmd.values();
    with_timeout(conn, cmd, query::execute(&conn.client, &sql, &values)).await
}
