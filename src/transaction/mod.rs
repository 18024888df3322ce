//! Transaction module
//!
//! Per-identity transactions buffered in memory and made durable through
//! the write-ahead log on commit.

pub mod transaction;

pub use transaction::{CommitOutcome, Transaction, TransactionManager, TransactionState};
