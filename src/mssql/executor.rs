use std::future::Future;
use std::time::Duration;

use super::config::MssqlClient;
use super::query;
use crate::command::Command;
use crate::error::DbManagerError;
use crate::provider::ProviderKind;
use crate::results::DataTable;
use crate::types::DbValue;

/// Await `fut` within `limit`. An expired command leaves the session mid-response, so the
/// caller discards the client afterwards instead of reusing it.
async fn with_timeout<F, R>(limit: Option<Duration>, fut: F) -> Result<R, DbManagerError>
where
    F: Future<Output = Result<R, DbManagerError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| DbManagerError::Timeout(limit.as_secs()))?,
        None => fut.await,
    }
}

/// Execute a command and fill a `DataTable`.
///
/// # Errors
/// Returns driver errors or `Timeout`.
pub async fn fill(client: &mut MssqlClient, cmd: &Command) -> Result<DataTable, DbManagerError> {
    let sql = cmd.effective_sql(ProviderKind::Mssql);
    let values = cmd.values();
    with_timeout(cmd.timeout, query::fill(client, &sql, &values)).await
}

/// Execute a command and return the first column of the first row.
///
/// # Errors
/// Returns driver errors or `Timeout`.
pub async fn scalar(client: &mut MssqlClient, cmd: &Command) -> Result<DbValue, DbManagerError> {
    let sql = cmd.effective_sql(ProviderKind::Mssql);
    let values = cmd.values();
    with_timeout(cmd.timeout, query::scalar(client, &sql, &values)).await
}

/// Execute a command and return rows affected.
///
/// # Errors
/// Returns driver errors or `Timeout`.
pub async fn execute(client: &mut MssqlClient, cmd: &Command) -> Result<u64, DbManagerError> {
    let sql = cmd.effective_sql(ProviderKind::Mssql);
    let values = cmd.values();
    with_timeout(cmd.timeout, query::execute(client, &sql, &values)).await
}
