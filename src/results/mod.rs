pub mod row;
pub mod table;

pub use row::{DataRow, RowState};
pub use table::{DataColumn, DataTable};
