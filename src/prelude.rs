//! Convenient imports for common functionality.
//!
//! This module re-exports the types needed to create a manager, run commands and work with
//! their results.

pub use crate::blocking::BlockingDbManager;
pub use crate::config::{DbManagerBuilder, ManagerConfig};
pub use crate::connection_string::ConnectionString;
pub use crate::error::DbManagerError;
pub use crate::manager::{DatabaseManager, DbManager};
pub use crate::provider::{ParameterStyle, ProviderKind};
pub use crate::results::{DataColumn, DataRow, DataTable, RowState};
pub use crate::types::{DbValue, Parameters};
