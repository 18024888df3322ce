//! Query execution module
//!
//! This module runs parsed commands: DDL, DML, SELECT pipelines with joins
//! and aggregation, transactions, and post-mutation maintenance.

mod aggregate;
mod condition;
pub mod executor;
mod maintenance;
mod select;

pub use aggregate::{Aggregate, AggregateFunction};
pub use condition::evaluate_chain;
pub use executor::{ExecutionResult, Executor};
pub use select::Relation;
