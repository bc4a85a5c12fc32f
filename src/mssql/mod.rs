// SQL Server provider
//
// - config: ADO connection string parsing and client setup
// - params: binding `DbValue`s to `@Pn` placeholders
// - query: row extraction, table filling and statement execution
// - executor: command execution with timeout

pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use config::{MssqlClient, close, mssql_config, open_connection};
pub use executor::{execute, fill, scalar};
