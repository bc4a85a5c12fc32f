// PostgreSQL provider
//
// - config: connection string parsing and client setup
// - params: `DbValue` as a `tokio-postgres` parameter
// - query: row extraction, table filling and statement execution
// - executor: command execution with timeout and cancellation

pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use config::{PostgresConnection, close, open_connection, postgres_config};
pub use executor::{execute, fill, scalar};
