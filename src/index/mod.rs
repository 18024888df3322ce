//! Secondary indexes
//!
//! Two kinds of per-column index, both persisted as a JSON map from a key
//! to the list of primary keys holding it:
//! - hash index (`<table>.<column>.idx`): exact field value -> ids
//! - inverted index (`<table>.<column>.fts`): lowercase token -> ids
//!
//! Every load-modify-save of an index file happens under one lock.

use crate::config::database_path;
use crate::error::{Error, Result};
use crate::storage::{row_id, TableStore, DELIMITER};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Persisted index contents
pub type IndexData = IndexMap<String, Vec<String>>;

/// Kind of secondary index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Exact-match value index
    Hash,
    /// Token index for full-text search
    FullText,
}

impl IndexKind {
    fn extension(&self) -> &'static str {
        match self {
            IndexKind::Hash => "idx",
            IndexKind::FullText => "fts",
        }
    }

    /// Keys a field value contributes to this kind of index
    fn keys(&self, value: &str) -> Vec<String> {
        match self {
            IndexKind::Hash => vec![value.to_string()],
            IndexKind::FullText => tokenize(value),
        }
    }
}

/// Lowercase `text` and split it into unique alphanumeric tokens longer
/// than two characters, in first-seen order
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut seen = HashSet::new();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .filter(|word| seen.insert(*word))
        .map(str::to_string)
        .collect()
}

/// Index manager for all databases under one data directory
#[derive(Debug)]
pub struct IndexManager {
    data_dir: PathBuf,
    storage: Arc<TableStore>,
    lock: Mutex<()>,
}

impl IndexManager {
    pub fn new(data_dir: impl Into<PathBuf>, storage: Arc<TableStore>) -> Self {
        Self {
            data_dir: data_dir.into(),
            storage,
            lock: Mutex::new(()),
        }
    }

    fn path(&self, database: &str, table: &str, column: &str, kind: IndexKind) -> PathBuf {
        database_path(&self.data_dir, database).join(format!(
            "{}.{}.{}",
            table,
            column,
            kind.extension()
        ))
    }

    /// Whether an index file exists for `table.column`
    pub fn exists(&self, database: &str, table: &str, column: &str, kind: IndexKind) -> bool {
        self.path(database, table, column, kind).is_file()
    }

    /// Columns of `table` that carry an index of `kind`
    pub fn indexed_columns(&self, database: &str, table: &str, kind: IndexKind) -> Result<Vec<String>> {
        let dir = database_path(&self.data_dir, database);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}.", table);
        let suffix = format!(".{}", kind.extension());
        let mut columns = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(column) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
            {
                if !column.is_empty() && !column.contains('.') {
                    columns.push(column.to_string());
                }
            }
        }
        columns.sort();
        Ok(columns)
    }

    fn load(&self, database: &str, table: &str, column: &str, kind: IndexKind) -> Result<IndexData> {
        let path = self.path(database, table, column, kind);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::IndexNotFound {
                table: table.to_string(),
                column: column.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn save(
        &self,
        database: &str,
        table: &str,
        column: &str,
        kind: IndexKind,
        data: &IndexData,
    ) -> Result<()> {
        let path = self.path(database, table, column, kind);
        fs::write(path, serde_json::to_string(data)?)?;
        Ok(())
    }

    /// Rebuild an index from the current table contents, replacing any
    /// existing one. Returns the number of distinct keys.
    ///
    /// The table stays write-locked until the index file is saved. Lock
    /// order is table first, then index.
    pub fn build(
        &self,
        database: &str,
        table: &str,
        column: &str,
        column_index: usize,
        kind: IndexKind,
    ) -> Result<usize> {
        let keys = self.storage.read_locked(database, table, |rows| {
            let _guard = self.lock.lock().map_err(Error::poisoned)?;

            let mut data = IndexData::new();
            for row in &rows {
                let Some(value) = row.split(DELIMITER).nth(column_index) else {
                    continue;
                };
                let id = row_id(row);
                for key in kind.keys(value) {
                    data.entry(key).or_default().push(id.to_string());
                }
            }

            self.save(database, table, column, kind, &data)?;
            Ok(data.len())
        })?;

        info!(database, table, column, ?kind, keys, "index built");
        Ok(keys)
    }

    /// Primary keys holding exactly `value`
    pub fn lookup(&self, database: &str, table: &str, column: &str, value: &str) -> Result<Vec<String>> {
        let _guard = self.lock.lock().map_err(Error::poisoned)?;
        let data = self.load(database, table, column, IndexKind::Hash)?;
        Ok(data.get(value).cloned().unwrap_or_default())
    }

    /// Primary keys whose indexed text contains `token`
    pub fn search(&self, database: &str, table: &str, column: &str, token: &str) -> Result<Vec<String>> {
        let _guard = self.lock.lock().map_err(Error::poisoned)?;
        let data = self.load(database, table, column, IndexKind::FullText)?;
        let token = token.trim().to_lowercase();
        Ok(data.get(&token).cloned().unwrap_or_default())
    }

    /// Add a freshly inserted row to every index on its table
    pub fn update_on_insert(
        &self,
        database: &str,
        table: &str,
        field_names: &[String],
        row: &str,
    ) -> Result<()> {
        let fields: Vec<&str> = row.split(DELIMITER).collect();
        let id = row_id(row);

        for kind in [IndexKind::Hash, IndexKind::FullText] {
            for column in self.indexed_columns(database, table, kind)? {
                let Some(value) = field_names
                    .iter()
                    .position(|name| *name == column)
                    .and_then(|i| fields.get(i))
                else {
                    continue;
                };

                let _guard = self.lock.lock().map_err(Error::poisoned)?;
                let mut data = match self.load(database, table, &column, kind) {
                    Ok(data) => data,
                    Err(Error::IndexNotFound { .. }) => continue,
                    Err(e) => return Err(e),
                };
                for key in kind.keys(value) {
                    let ids = data.entry(key).or_default();
                    if !ids.iter().any(|existing| existing == id) {
                        ids.push(id.to_string());
                    }
                }
                self.save(database, table, &column, kind, &data)?;
                debug!(database, table, column = %column, id, "index patched on insert");
            }
        }
        Ok(())
    }

    /// Strip `id` from every index on `table`, dropping emptied keys
    pub fn remove(&self, database: &str, table: &str, id: &str) -> Result<()> {
        for kind in [IndexKind::Hash, IndexKind::FullText] {
            for column in self.indexed_columns(database, table, kind)? {
                let _guard = self.lock.lock().map_err(Error::poisoned)?;
                let mut data = match self.load(database, table, &column, kind) {
                    Ok(data) => data,
                    Err(Error::IndexNotFound { .. }) => continue,
                    Err(e) => return Err(e),
                };

                let before = data.values().map(Vec::len).sum::<usize>();
                data.retain(|_, ids| {
                    ids.retain(|existing| existing != id);
                    !ids.is_empty()
                });
                let after = data.values().map(Vec::len).sum::<usize>();

                if before != after {
                    self.save(database, table, &column, kind, &data)?;
                    debug!(database, table, column = %column, id, "index entries removed");
                }
            }
        }
        Ok(())
    }
}
