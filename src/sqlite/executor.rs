use std::time::Duration;

use tokio::task::spawn_blocking;

use super::config::SharedSqliteConnection;
use super::query::{bind_parameters, fill_data_table, first_value};
use crate::command::Command;
use crate::error::DbManagerError;
use crate::results::DataTable;
use crate::types::DbValue;

/// Run synchronous work against the connection on the blocking pool.
///
/// When `timeout` elapses the running statement is interrupted and `Timeout` is returned.
async fn run_blocking<F, R>(
    conn: &SharedSqliteConnection,
    timeout: Option<Duration>,
    func: F,
) -> Result<R, DbManagerError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, DbManagerError> + Send + 'static,
    R: Send + 'static,
{
    let interrupt = conn.lock().await.get_interrupt_handle();
    let handle = SharedSqliteConnection::clone(conn);
    let task = spawn_blocking(move || {
        let mut guard = handle.blocking_lock();
        func(&mut guard)
    });

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined?,
            Err(_) => {
                interrupt.interrupt();
                Err(DbManagerError::Timeout(limit.as_secs()))
            }
        },
        None => task.await?,
    }
}

/// Execute a command and fill a `DataTable`.
///
/// # Errors
/// Returns driver errors, parameter binding errors or `Timeout`.
pub async fn fill(conn: &SharedSqliteConnection, cmd: &Command) -> Result<DataTable, DbManagerError> {
    let cmd_owned = cmd.clone();
    run_blocking(conn, cmd.timeout, move |guard| {
        let mut stmt = guard.prepare(&cmd_owned.text)?;
        bind_parameters(&mut stmt, &cmd_owned)?;
        fill_data_table(&mut stmt)
    })
    .await
}

/// Execute a command and return the first column of the first row.
///
/// # Errors
/// Returns driver errors, parameter binding errors or `Timeout`.
pub async fn scalar(conn: &SharedSqliteConnection, cmd: &Command) -> Result<DbValue, DbManagerError> {
    let cmd_owned = cmd.clone();
    run_blocking(conn, cmd.timeout, move |guard| {
        let mut stmt = guard.prepare(&cmd_owned.text)?;
        bind_parameters(&mut stmt, &cmd_owned)?;
        first_value(&mut stmt)
    })
    .await
}

/// Execute a command and return the number of rows it changed.
///
/// Commands without parameters may hold several `;`-separated statements; the count then covers
/// all of them.
///
/// # Errors
/// Returns driver errors, parameter binding errors or `Timeout`.
pub async fn execute(conn: &SharedSqliteConnection, cmd: &Command) -> Result<u64, DbManagerError> {
    let cmd_owned = cmd.clone();
    run_blocking(conn, cmd.timeout, move |guard| {
        if cmd_owned.parameters.is_empty() {
            let before: i64 = guard.query_row("SELECT total_changes()", [], |r| r.get(0))?;
            guard.execute_batch(&cmd_owned.text)?;
            let after: i64 = guard.query_row("SELECT total_changes()", [], |r| r.get(0))?;
            return u64::try_from(after - before).map_err(|e| {
                DbManagerError::ExecutionError(format!("sqlite affected rows conversion error: {e}"))
            });
        }
        let mut stmt = guard.prepare(&cmd_owned.text)?;
        bind_parameters(&mut stmt, &cmd_owned)?;
        let affected = stmt.raw_execute()?;
        u64::try_from(affected).map_err(|e| {
            DbManagerError::ExecutionError(format!("sqlite affected rows conversion error: {e}"))
        })
    })
    .await
}

/// Release the connection on a blocking thread.
///
/// # Errors
/// Returns the driver error if `SQLite` refuses to close (e.g. unfinalized statements).
pub async fn close(conn: SharedSqliteConnection) -> Result<(), DbManagerError> {
    spawn_blocking(move || match std::sync::Arc::try_unwrap(conn) {
        Ok(mutex) => mutex
            .into_inner()
            .close()
            .map_err(|(_, e)| DbManagerError::SqliteError(e)),
        // a timed-out statement still holds a handle; it closes when that thread finishes
        Err(_) => Ok(()),
    })
    .await?
}
