use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tokio::sync::Mutex;

use crate::connection_string::{ConnectionString, parse_bool};
use crate::error::DbManagerError;

/// Connection shared with the blocking thread that runs each statement.
pub type SharedSqliteConnection = Arc<Mutex<Connection>>;

/// `SQLite` settings read from a connection string.
///
/// Recognised keys: `Data Source` (or `DataSource`, `Filename`), `Mode` (`ReadWriteCreate`,
/// `ReadWrite`, `ReadOnly`, `Memory`), `Foreign Keys` and `Read Only`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteOptions {
    pub db_path: String,
    pub flags: OpenFlags,
    pub foreign_keys: Option<bool>,
}

impl SqliteOptions {
    /// # Errors
    /// Returns `DbManagerError::ConfigError` for a missing data source or an unknown mode.
    pub fn from_connection_string(raw: &str) -> Result<Self, DbManagerError> {
        let cs = ConnectionString::parse(raw)?;
        let db_path = cs
            .require(&["Data Source", "DataSource", "Filename"])?
            .to_string();

        let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match cs
            .get(&["Mode"])
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            None | Some("readwritecreate") => {
                flags |= OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
            }
            Some("readwrite") => flags |= OpenFlags::SQLITE_OPEN_READ_WRITE,
            Some("readonly") => flags |= OpenFlags::SQLITE_OPEN_READ_ONLY,
            Some("memory") => {
                flags |= OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_MEMORY;
            }
            Some(other) => {
                return Err(DbManagerError::ConfigError(format!(
                    "unknown SQLite mode '{other}'"
                )));
            }
        }
        if cs.get(&["Read Only"]).and_then(parse_bool) == Some(true) {
            flags.remove(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE);
            flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        }

        let foreign_keys = cs.get(&["Foreign Keys"]).and_then(parse_bool);

        Ok(Self {
            db_path,
            flags,
            foreign_keys,
        })
    }
}

/// Open a connection on a blocking thread.
///
/// `busy_timeout` is set to the command timeout so lock waits are bounded by it too.
///
/// # Errors
/// Returns the driver error if the database cannot be opened.
pub async fn open_connection(
    opts: SqliteOptions,
    busy_timeout: Option<Duration>,
) -> Result<SharedSqliteConnection, DbManagerError> {
    let conn = tokio::task::spawn_blocking(move || -> Result<Connection, DbManagerError> {
        let conn = Connection::open_with_flags(&opts.db_path, opts.flags)?;
        if let Some(timeout) = busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        match opts.foreign_keys {
            Some(true) => conn.execute_batch("PRAGMA foreign_keys = ON;")?,
            Some(false) => conn.execute_batch("PRAGMA foreign_keys = OFF;")?,
            None => {}
        }
        Ok(conn)
    })
    .await??;
    Ok(Arc::new(Mutex::new(conn)))
}
