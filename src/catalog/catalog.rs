//! System Catalog for MaungDB
//!
//! This module persists table schemas as JSON files under
//! `db_<database>/schema/<table>.json` and caches them in memory.

use super::schema::{validate_name, Column, Permissions, TableSchema};
use crate::config::database_path;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::info;

/// Directory inside a database that holds schema files
pub const SCHEMA_DIR: &str = "schema";

/// Source of table schemas
pub trait SchemaProvider: Send + Sync {
    /// Register a new table schema
    fn create(
        &self,
        database: &str,
        table: &str,
        columns: Vec<Column>,
        permissions: Permissions,
    ) -> Result<Arc<TableSchema>>;

    /// Load an existing schema
    fn load(&self, database: &str, table: &str) -> Result<Arc<TableSchema>>;

    /// Check whether a table is defined
    fn exists(&self, database: &str, table: &str) -> bool;
}

/// File-backed catalog
#[derive(Debug)]
pub struct Catalog {
    /// Root data directory
    data_dir: PathBuf,
    /// Loaded schemas keyed by (database, table)
    cache: RwLock<HashMap<(String, String), Arc<TableSchema>>>,
}

impl Catalog {
    /// Create a catalog rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn schema_path(&self, database: &str, table: &str) -> PathBuf {
        database_path(&self.data_dir, database)
            .join(SCHEMA_DIR)
            .join(format!("{}.json", table))
    }

    /// List the tables defined in a database
    pub fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        let dir = database_path(&self.data_dir, database).join(SCHEMA_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut tables: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                match path.extension() {
                    Some(ext) if ext == "json" => path
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned()),
                    _ => None,
                }
            })
            .collect();
        tables.sort();
        Ok(tables)
    }
}

fn write_schema(path: &Path, schema: &TableSchema) -> Result<()> {
    let json = serde_json::to_string_pretty(schema)?;
    fs::write(path, json)?;
    Ok(())
}

impl SchemaProvider for Catalog {
    fn create(
        &self,
        database: &str,
        table: &str,
        columns: Vec<Column>,
        permissions: Permissions,
    ) -> Result<Arc<TableSchema>> {
        validate_name(table)?;
        for column in &columns {
            validate_name(&column.name)?;
        }

        let db_dir = database_path(&self.data_dir, database);
        if !db_dir.is_dir() {
            return Err(Error::DatabaseNotFound(database.to_string()));
        }

        let mut cache = self.cache.write().map_err(Error::poisoned)?;
        let path = self.schema_path(database, table);
        if path.exists() {
            return Err(Error::TableAlreadyExists(table.to_string()));
        }

        fs::create_dir_all(db_dir.join(SCHEMA_DIR))?;
        let schema = Arc::new(TableSchema::new(database, table, columns, permissions));
        write_schema(&path, &schema)?;

        info!(database, table, columns = schema.columns.len(), "table schema created");
        cache.insert((database.to_string(), table.to_string()), schema.clone());
        Ok(schema)
    }

    fn load(&self, database: &str, table: &str) -> Result<Arc<TableSchema>> {
        let key = (database.to_string(), table.to_string());
        if let Some(schema) = self.cache.read().map_err(Error::poisoned)?.get(&key) {
            return Ok(schema.clone());
        }

        let path = self.schema_path(database, table);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::TableNotFound(table.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let schema: Arc<TableSchema> = Arc::new(serde_json::from_str(&content)?);

        self.cache
            .write()
            .map_err(Error::poisoned)?
            .insert(key, schema.clone());
        Ok(schema)
    }

    fn exists(&self, database: &str, table: &str) -> bool {
        self.schema_path(database, table).exists()
    }
}
