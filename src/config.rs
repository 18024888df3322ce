//! Engine configuration
//!
//! Paths and policies shared by every component of the engine.

use std::path::{Path, PathBuf};

use tokio::runtime::Handle;

/// Default root directory for all databases
pub const DEFAULT_DATA_DIR: &str = "./maung_data";

/// File name of the write-ahead log inside the data directory
pub const WAL_FILE_NAME: &str = "wal.log";

/// Default limit for view/trigger re-entry
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 16;

/// How post-mutation maintenance (index patching, trigger cascades) runs
#[derive(Debug, Clone, Default)]
pub enum MaintenanceMode {
    /// Run before `execute` returns
    #[default]
    Inline,
    /// Dispatch onto a tokio runtime; await `Executor::settle` to observe it
    Background(Handle),
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory holding one `db_<name>` directory per database
    pub data_dir: PathBuf,
    /// Explicit WAL location; `None` means `<data_dir>/wal.log`
    pub wal_path: Option<PathBuf>,
    /// Maximum depth of view expansion and trigger cascades
    pub max_nesting_depth: usize,
    /// Index/trigger maintenance policy
    pub maintenance: MaintenanceMode,
    /// fsync WAL appends and rewritten table files
    pub sync_writes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            wal_path: None,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            maintenance: MaintenanceMode::Inline,
            sync_writes: true,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the WAL location. A path ending in `.log` is used as-is,
    /// anything else is treated as a directory for `wal.log`.
    pub fn wal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.wal_path = Some(path.into());
        self
    }

    /// Set the view/trigger nesting limit
    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Set the maintenance mode
    pub fn maintenance(mut self, mode: MaintenanceMode) -> Self {
        self.maintenance = mode;
        self
    }

    /// Enable or disable fsync on writes
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Resolved WAL file path
    pub fn resolved_wal_path(&self) -> PathBuf {
        match &self.wal_path {
            Some(p) if has_log_extension(p) => p.clone(),
            Some(dir) => dir.join(WAL_FILE_NAME),
            None => self.data_dir.join(WAL_FILE_NAME),
        }
    }

    /// Directory of a single database
    pub fn database_dir(&self, database: &str) -> PathBuf {
        database_path(&self.data_dir, database)
    }
}

/// `<data_dir>/db_<database>`
pub fn database_path(data_dir: &Path, database: &str) -> PathBuf {
    data_dir.join(format!("db_{}", database))
}

fn has_log_extension(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wal_path_resolution() {
        let config = EngineConfig::new().data_dir("/tmp/maung");
        assert_eq!(
            config.resolved_wal_path(),
            PathBuf::from("/tmp/maung/wal.log")
        );

        let config = config.wal_path("/var/log/maung/tx.log");
        assert_eq!(
            config.resolved_wal_path(),
            PathBuf::from("/var/log/maung/tx.log")
        );

        let config = EngineConfig::new().wal_path("/var/lib/maung");
        assert_eq!(
            config.resolved_wal_path(),
            PathBuf::from("/var/lib/maung/wal.log")
        );
    }

    #[test]
    fn test_database_dir() {
        let config = EngineConfig::new().data_dir("data");
        assert_eq!(config.database_dir("toko"), PathBuf::from("data/db_toko"));
    }
}
