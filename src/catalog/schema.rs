//! Schema definitions for MaungDB
//!
//! This module defines table schemas, column constraints and the
//! role-based permissions attached to each table.

use super::types::DataType;
use crate::auth::Role;
use crate::error::{Error, Result};
use crate::storage::DELIMITER;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text that stands for a missing value
pub const NULL_TEXT: &str = "NULL";

/// Whether a raw field holds no value
pub fn is_null(value: &str) -> bool {
    value.is_empty() || value == NULL_TEXT
}

/// Table, view and column names are restricted to `[A-Za-z0-9_]+`
pub fn validate_name(name: &str) -> Result<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

/// Reference from a column to `table.column`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

/// Column definition in a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Is this the primary key?
    pub primary_key: bool,
    /// Is this column unique?
    pub unique: bool,
    /// Does this column reject nulls?
    pub not_null: bool,
    /// Referenced column, if any
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    /// Create a new column without constraints
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
            unique: false,
            not_null: false,
            foreign_key: None,
        }
    }

    /// Set primary key flag; a primary key is also unique and not null
    pub fn primary_key(mut self, pk: bool) -> Self {
        self.primary_key = pk;
        if pk {
            self.unique = true;
            self.not_null = true;
        }
        self
    }

    /// Set unique flag
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Set not-null flag
    pub fn not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Reference another table's column
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
        });
        self
    }
}

/// Kind of access a command needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
        }
    }
}

/// Roles allowed to read and write a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub read: Vec<Role>,
    pub write: Vec<Role>,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            read: vec![Role::User, Role::Admin, Role::SuperMaung],
            write: vec![Role::Admin, Role::SuperMaung],
        }
    }
}

/// Existing committed values, used for unique and foreign-key checks
pub trait RowLookup {
    /// All values currently stored in `table.column`
    fn column_values(&self, table: &str, column: &str) -> Result<Vec<String>>;
}

/// Table schema - columns plus permissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Owning database
    pub database: String,
    /// Table name
    pub name: String,
    /// Ordered list of columns; the first is the row identifier
    pub columns: Vec<Column>,
    /// Access rules
    pub permissions: Permissions,
}

impl TableSchema {
    pub fn new(
        database: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<Column>,
        permissions: Permissions,
    ) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
            columns,
            permissions,
        }
    }

    /// Whether `role` may perform `access` on this table
    pub fn can(&self, role: Role, access: Access) -> bool {
        match access {
            Access::Read => self.permissions.read.contains(&role),
            Access::Write => self.permissions.write.contains(&role),
        }
    }

    /// Fail with `PermissionDenied` unless `role` may perform `access`
    pub fn require(&self, role: Role, access: Access) -> Result<()> {
        if self.can(role, access) {
            Ok(())
        } else {
            Err(Error::PermissionDenied {
                table: self.name.clone(),
                role: role.to_string(),
                access: access.to_string(),
            })
        }
    }

    /// Get column names
    pub fn field_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Get column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Validate a delimiter-joined payload against this schema
    pub fn validate_row(&self, payload: &str, lookup: &dyn RowLookup) -> Result<()> {
        let fields: Vec<&str> = payload.split(DELIMITER).collect();
        if fields.len() != self.columns.len() {
            return Err(Error::FieldCountMismatch {
                expected: self.columns.len(),
                found: fields.len(),
            });
        }

        for (column, value) in self.columns.iter().zip(&fields) {
            self.validate_field(column, value)?;
        }

        for (column, value) in self.columns.iter().zip(&fields) {
            if is_null(value) {
                continue;
            }
            if column.unique {
                let existing = lookup.column_values(&self.name, &column.name)?;
                if existing.iter().any(|v| v == value) {
                    return Err(Error::ConstraintViolation(format!(
                        "duplicate value '{}' for unique column '{}'",
                        value, column.name
                    )));
                }
            }
            if let Some(fk) = &column.foreign_key {
                let referenced = lookup.column_values(&fk.table, &fk.column)?;
                if !referenced.iter().any(|v| v == value) {
                    return Err(Error::ConstraintViolation(format!(
                        "value '{}' of '{}' has no match in {}.{}",
                        value, column.name, fk.table, fk.column
                    )));
                }
            }
        }

        Ok(())
    }

    /// Check nullability and type conformance of a single field
    pub fn validate_field(&self, column: &Column, value: &str) -> Result<()> {
        if value.contains(DELIMITER) {
            return Err(Error::ConstraintViolation(format!(
                "value for '{}' may not contain '{}'",
                column.name, DELIMITER
            )));
        }
        // One row per line in the table file
        if value.contains(['\n', '\r']) {
            return Err(Error::ConstraintViolation(format!(
                "value for '{}' may not contain a line break",
                column.name
            )));
        }
        if is_null(value) {
            if column.not_null {
                return Err(Error::NullNotAllowed(column.name.clone()));
            }
            return Ok(());
        }
        if !column.data_type.accepts(value) {
            return Err(Error::TypeMismatch {
                column: column.name.clone(),
                expected: column.data_type.to_string(),
                value: value.to_string(),
            });
        }
        Ok(())
    }
}
