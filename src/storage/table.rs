//! Table storage for MaungDB
//!
//! One flat file per table at `db_<database>/<table>.mg`. Each row is a
//! line of `|`-joined text fields; the first field identifies the row.
//!
//! Every write path takes the table's mutex, and whole-file rewrites go
//! through a sibling temp file that is synced and renamed over the table.

use crate::catalog::validate_name;
use crate::catalog::catalog::SCHEMA_DIR;
use crate::config::database_path;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::debug;

/// Field delimiter inside a row
pub const DELIMITER: char = '|';

/// Extension of table files
pub const TABLE_EXTENSION: &str = "mg";

/// Identifier of a raw row (its first field)
pub fn row_id(row: &str) -> &str {
    row.split(DELIMITER).next().unwrap_or("")
}

/// Split a raw row into fields
pub fn split_row(row: &str) -> Vec<String> {
    row.split(DELIMITER).map(str::to_string).collect()
}

/// Join fields into a raw row
pub fn join_row(fields: &[String]) -> String {
    let mut buf = [0u8; 4];
    fields.join(&*DELIMITER.encode_utf8(&mut buf))
}

/// Flat-file row store
#[derive(Debug)]
pub struct TableStore {
    /// Root data directory
    data_dir: PathBuf,
    /// fsync appends and rewrites
    sync_writes: bool,
    /// One writer lock per table file
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl TableStore {
    pub fn new(data_dir: impl Into<PathBuf>, sync_writes: bool) -> Self {
        Self {
            data_dir: data_dir.into(),
            sync_writes,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Root data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory of a database
    pub fn database_dir(&self, database: &str) -> PathBuf {
        database_path(&self.data_dir, database)
    }

    /// Path of a table file
    pub fn table_path(&self, database: &str, table: &str) -> PathBuf {
        self.database_dir(database)
            .join(format!("{}.{}", table, TABLE_EXTENSION))
    }

    // ========== Databases ==========

    /// Create `db_<name>/` with its schema directory
    pub fn create_database(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.database_dir(name);
        if dir.exists() {
            return Err(Error::DatabaseAlreadyExists(name.to_string()));
        }
        fs::create_dir_all(dir.join(SCHEMA_DIR))?;
        Ok(())
    }

    pub fn database_exists(&self, name: &str) -> bool {
        self.database_dir(name).is_dir()
    }

    /// Names of all databases, sorted
    pub fn list_databases(&self) -> Result<Vec<String>> {
        if !self.data_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(name) = file_name.strip_prefix("db_") {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    // ========== Tables ==========

    fn lock_for(&self, path: &Path) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(Error::poisoned)?;
        Ok(locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Create an empty table file
    pub fn init_table(&self, database: &str, table: &str) -> Result<()> {
        if !self.database_exists(database) {
            return Err(Error::DatabaseNotFound(database.to_string()));
        }
        let path = self.table_path(database, table);
        let lock = self.lock_for(&path)?;
        let _guard = lock.lock().map_err(Error::poisoned)?;
        File::create(&path)?;
        Ok(())
    }

    /// Append a single row
    pub fn append(&self, database: &str, table: &str, row: &str) -> Result<()> {
        let path = self.table_path(database, table);
        let lock = self.lock_for(&path)?;
        let _guard = lock.lock().map_err(Error::poisoned)?;

        let mut file = match OpenOptions::new().append(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::TableFileMissing(table.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", row)?;
        if self.sync_writes {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Read every row in file order, skipping blank lines
    pub fn read_all(&self, database: &str, table: &str) -> Result<Vec<String>> {
        let path = self.table_path(database, table);
        read_rows(&path, table)
    }

    /// Hand every row to `f` while holding the table's writer lock, so no
    /// write lands between the read and whatever `f` derives from it
    pub fn read_locked<T>(
        &self,
        database: &str,
        table: &str,
        f: impl FnOnce(Vec<String>) -> Result<T>,
    ) -> Result<T> {
        let path = self.table_path(database, table);
        let lock = self.lock_for(&path)?;
        let _guard = lock.lock().map_err(Error::poisoned)?;
        f(read_rows(&path, table)?)
    }

    /// Replace the whole table with `rows`
    pub fn rewrite(&self, database: &str, table: &str, rows: &[String]) -> Result<()> {
        let rows = rows.to_vec();
        self.modify(database, table, move |_| Ok((rows, ())))
    }

    /// Read, transform and rewrite a table while holding its writer lock
    ///
    /// The closure receives the current rows and returns the rows to store
    /// plus a value handed back to the caller.
    pub fn modify<T>(
        &self,
        database: &str,
        table: &str,
        f: impl FnOnce(Vec<String>) -> Result<(Vec<String>, T)>,
    ) -> Result<T> {
        let path = self.table_path(database, table);
        let lock = self.lock_for(&path)?;
        let _guard = lock.lock().map_err(Error::poisoned)?;

        let rows = read_rows(&path, table)?;
        let (rows, out) = f(rows)?;
        self.write_atomic(&path, &rows)?;
        debug!(database, table, rows = rows.len(), "table rewritten");
        Ok(out)
    }

    /// Replace the row identified by `id`
    pub fn commit_update(&self, database: &str, table: &str, id: &str, new_row: &str) -> Result<()> {
        self.modify(database, table, |mut rows| {
            let pos = rows
                .iter()
                .position(|row| row_id(row) == id)
                .ok_or_else(|| Error::RowNotFound {
                    table: table.to_string(),
                    id: id.to_string(),
                })?;
            rows[pos] = new_row.to_string();
            Ok((rows, ()))
        })
    }

    /// Remove the row identified by `id`
    pub fn commit_delete(&self, database: &str, table: &str, id: &str) -> Result<()> {
        self.modify(database, table, |mut rows| {
            let pos = rows
                .iter()
                .position(|row| row_id(row) == id)
                .ok_or_else(|| Error::RowNotFound {
                    table: table.to_string(),
                    id: id.to_string(),
                })?;
            rows.remove(pos);
            Ok((rows, ()))
        })
    }

    fn write_atomic(&self, path: &Path, rows: &[String]) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| Error::Internal(format!("{} has no parent", path.display())))?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        for row in rows {
            writeln!(tmp, "{}", row)?;
        }
        tmp.flush()?;
        if self.sync_writes {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(path).map_err(|e| Error::IoError(e.error))?;

        if self.sync_writes {
            if let Ok(dir) = File::open(dir) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

fn read_rows(path: &Path, table: &str) -> Result<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::TableFileMissing(table.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}
