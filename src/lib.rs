//! Provider-neutral database access for `SQL Server`, `PostgreSQL` and `SQLite`.
//!
//! A [`DbManager`] is bound to one provider and connection string. Each operation opens a
//! connection, runs a single command, and closes the connection again:
//!
//! ```rust,no_run
//! use db_manager::prelude::*;
//!
//! # async fn demo() -> Result<(), DbManagerError> {
//! let mgr = DbManager::new("sqlite", "Data Source=app.db")?;
//! let count = mgr.execute_select_statement_scalar("SELECT COUNT(*) FROM users").await?;
//!
//! let params = Parameters::new().with("id", 7);
//! let table = mgr
//!     .execute_stored_procedure(&params, "SELECT * FROM users WHERE id = :id")
//!     .await?;
//! println!("{count} users, {} matched", table.len());
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod command;
pub mod config;
pub mod connection;
pub mod connection_string;
pub mod error;
pub mod manager;
pub mod prelude;
pub mod provider;
pub mod results;
pub mod types;
pub mod update;

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use blocking::BlockingDbManager;
pub use config::{DEFAULT_COMMAND_TIMEOUT_SECS, DbManagerBuilder, ManagerConfig};
pub use error::DbManagerError;
pub use manager::{DatabaseManager, DbManager};
pub use provider::{ParameterStyle, ProviderKind};
pub use results::{DataColumn, DataRow, DataTable, RowState};
pub use types::{DbValue, Parameters};
