//! Write-Ahead Log (WAL) Manager
//!
//! Committed transaction operations are appended here as JSON lines and
//! synced before they touch any table file. The log is an audit trail: it
//! is never replayed on startup.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Type of a logged operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalOp {
    Insert,
    Update,
    Delete,
}

/// A single log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number, assigned when the entry is written
    pub lsn: u64,
    /// Owning transaction
    pub tx_id: String,
    /// Identity that issued the operation
    pub user: String,
    /// Milliseconds since the Unix epoch when the operation was buffered
    pub timestamp_ms: u64,
    /// Type of operation
    pub op: WalOp,
    pub database: String,
    pub table: String,
    /// Identifier of the affected row (the previous one for UPDATE)
    pub row_id: String,
    /// New row (after image); empty for DELETE
    pub data: String,
    /// Previous row (before image) for UPDATE and DELETE
    pub prev_data: Option<String>,
}

impl WalEntry {
    /// Build an entry with no LSN yet
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tx_id: impl Into<String>,
        user: impl Into<String>,
        op: WalOp,
        database: impl Into<String>,
        table: impl Into<String>,
        row_id: impl Into<String>,
        data: impl Into<String>,
        prev_data: Option<String>,
    ) -> Self {
        Self {
            lsn: 0,
            tx_id: tx_id.into(),
            user: user.into(),
            timestamp_ms: now_millis(),
            op,
            database: database.into(),
            table: table.into(),
            row_id: row_id.into(),
            data: data.into(),
            prev_data,
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug)]
struct LogState {
    file: File,
    next_lsn: u64,
}

/// Manages the write-ahead log file
#[derive(Debug)]
pub struct LogManager {
    path: PathBuf,
    sync_writes: bool,
    state: Mutex<LogState>,
}

impl LogManager {
    /// Open (or create) the log, continuing after the highest LSN in it
    pub fn open(path: impl Into<PathBuf>, sync_writes: bool) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let next_lsn = if path.exists() {
            read_log(&path)?
                .iter()
                .map(|entry| entry.lsn)
                .max()
                .map_or(1, |lsn| lsn + 1)
        } else {
            1
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            sync_writes,
            state: Mutex::new(LogState { file, next_lsn }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Assign LSNs to `entries` and append them, then flush to disk
    pub fn append_all(&self, entries: &mut [WalEntry]) -> Result<()> {
        let mut state = self.state.lock().map_err(Error::poisoned)?;

        let mut buf = Vec::new();
        let mut lsn = state.next_lsn;
        for entry in entries.iter_mut() {
            entry.lsn = lsn;
            lsn += 1;
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }

        state.file.write_all(&buf)?;
        state.file.flush()?;
        if self.sync_writes {
            state.file.sync_all()?;
        }
        state.next_lsn = lsn;

        debug!(entries = entries.len(), last_lsn = lsn - 1, "wal appended");
        Ok(())
    }

    /// Read every entry currently in the log
    pub fn entries(&self) -> Result<Vec<WalEntry>> {
        let _state = self.state.lock().map_err(Error::poisoned)?;
        read_log(&self.path)
    }
}

fn read_log(path: &Path) -> Result<Vec<WalEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WalEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line = number + 1, error = %e, "skipping unreadable wal line"),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(op: WalOp, data: &str) -> WalEntry {
        WalEntry::new("tx_1_asep", "asep", op, "toko", "barang", "1", data, None)
    }

    #[test]
    fn test_append_assigns_lsn() {
        let dir = TempDir::new().unwrap();
        let wal = LogManager::open(dir.path().join("wal.log"), true).unwrap();

        let mut batch = vec![entry(WalOp::Insert, "1|a"), entry(WalOp::Insert, "2|b")];
        wal.append_all(&mut batch).unwrap();
        assert_eq!(batch[0].lsn, 1);
        assert_eq!(batch[1].lsn, 2);

        let raw = fs::read_to_string(dir.path().join("wal.log")).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.contains("\"op\":\"INSERT\""));
    }

    #[test]
    fn test_lsn_continues_after_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("wal.log");

        {
            let wal = LogManager::open(&path, true).unwrap();
            wal.append_all(&mut [entry(WalOp::Insert, "1|a")]).unwrap();
        }

        let wal = LogManager::open(&path, true).unwrap();
        let mut batch = vec![entry(WalOp::Delete, "")];
        wal.append_all(&mut batch).unwrap();
        assert_eq!(batch[0].lsn, 2);

        let entries = wal.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].op, WalOp::Delete);
    }
}
