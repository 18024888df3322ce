//! Catalog module
//!
//! This module contains table schemas and their data types, the column
//! definition parser, and the persisted views and triggers.

pub mod catalog;
pub mod definition;
pub mod schema;
pub mod triggers;
pub mod types;
pub mod views;

pub use catalog::{Catalog, SchemaProvider};
pub use definition::{parse_columns, split_columns};
pub use schema::{
    is_null, validate_name, Access, Column, ForeignKey, Permissions, RowLookup, TableSchema,
    NULL_TEXT,
};
pub use triggers::{Trigger, TriggerEvent, TriggerStore};
pub use types::DataType;
pub use views::ViewStore;
