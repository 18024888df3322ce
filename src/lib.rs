//! MaungDB - a flat-file database engine driven by MaungQL
//!
//! This library provides the components of the engine:
//! - MaungQL parsing (lexer, keywords, command tree)
//! - Execution (CRUD, joins, grouping, views, triggers)
//! - Storage engine (flat table files, write-ahead log)
//! - Secondary indexes (hash and full-text)
//! - Transactions, sessions and the replication role
//!
//! Statement text enters through [`query::parse`] and runs through
//! [`Executor::execute`], or both at once with [`Executor::run`].

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod index;
pub mod query;
pub mod replication;
pub mod storage;
pub mod transaction;

pub use config::{EngineConfig, MaintenanceMode};
pub use error::{Error, ErrorKind, Result};
pub use executor::{ExecutionResult, Executor};
pub use query::{parse, Command};
