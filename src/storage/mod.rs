//! Storage engine module
//!
//! This module contains the storage engine components:
//! - Flat-file table store
//! - Typed values for comparisons
//! - Write-ahead log

pub mod table;
pub mod value;
pub mod wal;

pub use table::{join_row, row_id, split_row, TableStore, DELIMITER};
pub use value::{compare_loose, format_number, Value};
pub use wal::{LogManager, WalEntry, WalOp};
