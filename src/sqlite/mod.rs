// SQLite provider
//
// - config: connection string parsing and connection setup
// - params: value conversion between `DbValue` and rusqlite
// - query: parameter binding and table filling
// - executor: command execution on the blocking pool

pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use config::{SharedSqliteConnection, SqliteOptions, open_connection};
pub use executor::{close, execute, fill, scalar};
