//! Transaction Manager
//!
//! Handles the transaction lifecycle (Begin, Commit, Rollback). Each
//! identity has at most one active transaction; its mutations are buffered
//! in memory, written to the WAL on commit and only then applied to the
//! table files, in the order they were issued.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::storage::wal::now_millis;
use crate::storage::{LogManager, TableStore, WalEntry, WalOp};

/// Transaction State
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
}

/// Transaction Context
#[derive(Debug, Clone)]
pub struct Transaction {
    /// `tx_<nanos>_<user>`
    pub id: String,
    pub user: String,
    pub state: TransactionState,
    pub started_at_ms: u64,
    /// Buffered operations in issue order
    pub changes: Vec<WalEntry>,
}

/// Result of a successful commit
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub tx_id: String,
    /// Entries as logged and applied; empty for a no-op commit
    pub applied: Vec<WalEntry>,
}

/// Transaction Manager
#[derive(Debug)]
pub struct TransactionManager {
    /// Log Manager
    log_manager: Arc<LogManager>,
    /// Row store that committed entries are applied to
    storage: Arc<TableStore>,
    /// Active transactions keyed by username
    transactions: RwLock<HashMap<String, Transaction>>,
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new(log_manager: Arc<LogManager>, storage: Arc<TableStore>) -> Self {
        Self {
            log_manager,
            storage,
            transactions: RwLock::new(HashMap::new()),
        }
    }

    /// Get the log manager
    pub fn log_manager(&self) -> Arc<LogManager> {
        self.log_manager.clone()
    }

    /// Begin a new transaction for `user`
    pub fn begin(&self, user: &str) -> Result<String> {
        let mut transactions = self.transactions.write().map_err(Error::poisoned)?;
        if transactions.contains_key(user) {
            return Err(Error::TransactionAlreadyActive(user.to_string()));
        }

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let id = format!("tx_{}_{}", nanos, user);

        transactions.insert(
            user.to_string(),
            Transaction {
                id: id.clone(),
                user: user.to_string(),
                state: TransactionState::Active,
                started_at_ms: now_millis(),
                changes: Vec::new(),
            },
        );

        info!(tx_id = %id, user, "transaction started");
        Ok(id)
    }

    /// Check if `user` has an active transaction
    pub fn is_active(&self, user: &str) -> bool {
        self.transactions
            .read()
            .map(|transactions| transactions.contains_key(user))
            .unwrap_or(false)
    }

    /// Number of operations buffered for `user`
    pub fn pending(&self, user: &str) -> usize {
        self.transactions
            .read()
            .ok()
            .and_then(|transactions| transactions.get(user).map(|tx| tx.changes.len()))
            .unwrap_or(0)
    }

    /// Buffer an operation in `user`'s active transaction
    ///
    /// `row_id` is the identifier of the row the operation locates: the new
    /// row for INSERT, the previous row for UPDATE and DELETE.
    #[allow(clippy::too_many_arguments)]
    pub fn buffer(
        &self,
        user: &str,
        op: WalOp,
        database: &str,
        table: &str,
        row_id: &str,
        data: &str,
        prev_data: Option<String>,
    ) -> Result<()> {
        let mut transactions = self.transactions.write().map_err(Error::poisoned)?;
        let tx = transactions
            .get_mut(user)
            .ok_or_else(|| Error::NoActiveTransaction(user.to_string()))?;

        tx.changes.push(WalEntry::new(
            tx.id.clone(),
            user,
            op,
            database,
            table,
            row_id,
            data,
            prev_data,
        ));
        debug!(tx_id = %tx.id, ?op, table, "operation buffered");
        Ok(())
    }

    /// Commit `user`'s transaction
    ///
    /// Entries are synced to the WAL before any of them is applied. If
    /// writing the log fails the transaction stays active. If applying
    /// fails the logged entries remain on disk and the error is reported as
    /// [`Error::CommitApplyFailed`], carrying the entries already applied.
    pub fn commit(&self, user: &str) -> Result<CommitOutcome> {
        let mut tx = self
            .transactions
            .write()
            .map_err(Error::poisoned)?
            .remove(user)
            .ok_or_else(|| Error::NoActiveTransaction(user.to_string()))?;

        if tx.changes.is_empty() {
            info!(tx_id = %tx.id, user, "empty transaction committed");
            return Ok(CommitOutcome {
                tx_id: tx.id,
                applied: Vec::new(),
            });
        }

        if let Err(e) = self.log_manager.append_all(&mut tx.changes) {
            self.transactions
                .write()
                .map_err(Error::poisoned)?
                .insert(user.to_string(), tx);
            return Err(e);
        }

        for (done, entry) in tx.changes.iter().enumerate() {
            if let Err(e) = self.apply(entry) {
                return Err(Error::CommitApplyFailed {
                    tx_id: tx.id.clone(),
                    source: Box::new(e),
                    applied: tx.changes[..done].to_vec(),
                });
            }
        }

        tx.state = TransactionState::Committed;
        info!(tx_id = %tx.id, user, entries = tx.changes.len(), "transaction committed");
        Ok(CommitOutcome {
            tx_id: tx.id,
            applied: tx.changes,
        })
    }

    /// Discard `user`'s transaction. Returns its id and the number of
    /// dropped operations.
    pub fn rollback(&self, user: &str) -> Result<(String, usize)> {
        let tx = self
            .transactions
            .write()
            .map_err(Error::poisoned)?
            .remove(user)
            .ok_or_else(|| Error::NoActiveTransaction(user.to_string()))?;

        info!(tx_id = %tx.id, user, discarded = tx.changes.len(), "transaction rolled back");
        Ok((tx.id, tx.changes.len()))
    }

    fn apply(&self, entry: &WalEntry) -> Result<()> {
        match entry.op {
            WalOp::Insert => self.storage.append(&entry.database, &entry.table, &entry.data),
            WalOp::Update => self.storage.commit_update(
                &entry.database,
                &entry.table,
                &entry.row_id,
                &entry.data,
            ),
            WalOp::Delete => {
                self.storage
                    .commit_delete(&entry.database, &entry.table, &entry.row_id)
            }
        }
    }
}
