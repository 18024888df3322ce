//! Stored views
//!
//! A view is its raw query text saved as `db_<database>/<name>.view`.
//! Nothing is materialized; the text is parsed and run on every reference.

use crate::config::database_path;
use crate::error::{Error, Result};
use std::fs;
use std::path::PathBuf;

#[derive(Debug)]
pub struct ViewStore {
    data_dir: PathBuf,
}

impl ViewStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path(&self, database: &str, name: &str) -> PathBuf {
        database_path(&self.data_dir, database).join(format!("{}.view", name))
    }

    pub fn is_view(&self, database: &str, name: &str) -> bool {
        self.path(database, name).is_file()
    }

    /// Save (or replace) a view definition
    pub fn save(&self, database: &str, name: &str, query: &str) -> Result<()> {
        let db_dir = database_path(&self.data_dir, database);
        if !db_dir.is_dir() {
            return Err(Error::DatabaseNotFound(database.to_string()));
        }
        fs::write(self.path(database, name), query)?;
        Ok(())
    }

    pub fn load(&self, database: &str, name: &str) -> Result<String> {
        match fs::read_to_string(self.path(database, name)) {
            Ok(query) => Ok(query),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::TableNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
