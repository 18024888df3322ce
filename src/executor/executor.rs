//! Command Executor for MaungDB
//!
//! This module runs parsed commands against the storage engine, the index
//! manager and the transaction manager, on behalf of the identity reported
//! by the session provider.

use std::fs;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::condition::row_matches;
use super::maintenance::Maintenance;
use crate::auth::{Identity, Role, SessionProvider};
use crate::catalog::{
    is_null, parse_columns, Access, Catalog, Permissions, RowLookup, SchemaProvider, TableSchema,
    Trigger, TriggerEvent, TriggerStore, ViewStore,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::index::{IndexKind, IndexManager};
use crate::query::{
    parse, Command, Condition, ReplicationControl, TransactionControl, TriggerDefinition,
};
use crate::replication::ReplicationManager;
use crate::storage::{
    join_row, row_id, split_row, LogManager, TableStore, WalEntry, WalOp, DELIMITER,
};
use crate::transaction::TransactionManager;
use indexmap::IndexMap;

/// Result of executing one command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Column headers
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<Vec<String>>,
    /// Message
    pub message: Option<String>,
}

impl ExecutionResult {
    /// Create a result with a message
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            message: Some(message.into()),
        }
    }

    /// Create a result with rows
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            columns,
            rows,
            message: None,
        }
    }
}

/// Command executor
///
/// Cheap to clone; clones share every store.
#[derive(Clone)]
pub struct Executor {
    pub(super) config: Arc<EngineConfig>,
    pub(super) session: Arc<dyn SessionProvider>,
    pub(super) schemas: Arc<dyn SchemaProvider>,
    pub(super) storage: Arc<TableStore>,
    pub(super) indexes: Arc<IndexManager>,
    pub(super) transactions: Arc<TransactionManager>,
    pub(super) views: Arc<ViewStore>,
    pub(super) triggers: Arc<TriggerStore>,
    pub(super) replication: Arc<ReplicationManager>,
    pub(super) maintenance: Arc<Maintenance>,
}

impl Executor {
    /// Open an executor over `config.data_dir` with the default stores
    pub fn open(config: EngineConfig, session: Arc<dyn SessionProvider>) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let storage = Arc::new(TableStore::new(
            config.data_dir.clone(),
            config.sync_writes,
        ));
        let log_manager = Arc::new(LogManager::open(
            config.resolved_wal_path(),
            config.sync_writes,
        )?);
        let transactions = Arc::new(TransactionManager::new(log_manager, storage.clone()));

        info!(data_dir = %config.data_dir.display(), "executor opened");

        Ok(Self {
            schemas: Arc::new(Catalog::new(config.data_dir.clone())),
            indexes: Arc::new(IndexManager::new(config.data_dir.clone(), storage.clone())),
            views: Arc::new(ViewStore::new(config.data_dir.clone())),
            triggers: Arc::new(TriggerStore::new(config.data_dir.clone())),
            replication: Arc::new(ReplicationManager::new()),
            maintenance: Arc::new(Maintenance::new(config.maintenance.clone())),
            config: Arc::new(config),
            session,
            storage,
            transactions,
        })
    }

    /// Replace the schema provider
    pub fn with_schema_provider(mut self, schemas: Arc<dyn SchemaProvider>) -> Self {
        self.schemas = schemas;
        self
    }

    /// Share an existing transaction registry
    pub fn with_transaction_manager(mut self, transactions: Arc<TransactionManager>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn storage(&self) -> Arc<TableStore> {
        self.storage.clone()
    }

    pub fn indexes(&self) -> Arc<IndexManager> {
        self.indexes.clone()
    }

    pub fn transactions(&self) -> Arc<TransactionManager> {
        self.transactions.clone()
    }

    pub fn replication(&self) -> Arc<ReplicationManager> {
        self.replication.clone()
    }

    /// Create a new, empty database
    pub fn create_database(&self, name: &str) -> Result<()> {
        self.storage.create_database(name)?;
        info!(database = name, "database created");
        Ok(())
    }

    /// Parse and execute one statement
    pub fn run(&self, text: &str) -> Result<ExecutionResult> {
        self.execute(parse(text)?)
    }

    /// Execute a command as the current session identity
    pub fn execute(&self, command: Command) -> Result<ExecutionResult> {
        let identity = self.session.current_identity()?;
        self.execute_as(&identity, command, 0)
    }

    /// Wait for background maintenance dispatched so far
    pub async fn settle(&self) {
        self.maintenance.settle().await;
    }

    /// Execute at view/trigger nesting `depth`
    pub(super) fn execute_as(
        &self,
        identity: &Identity,
        command: Command,
        depth: usize,
    ) -> Result<ExecutionResult> {
        if depth > self.config.max_nesting_depth {
            return Err(Error::NestingTooDeep(self.config.max_nesting_depth));
        }
        self.authorize(identity, &command)?;
        debug!(kind = command.kind(), user = %identity.username, depth, "executing");

        match command {
            Command::ShowDatabases => self.execute_show_databases(),
            Command::Replication(control) => self.execute_replication(control),
            command => {
                let database = identity.require_database()?;
                self.execute_in(identity, database, command, depth)
            }
        }
    }

    /// Execute a command scoped to the selected database
    fn execute_in(
        &self,
        identity: &Identity,
        database: &str,
        command: Command,
        depth: usize,
    ) -> Result<ExecutionResult> {
        match command {
            Command::CreateTable { table, definition } => {
                self.execute_create_table(database, &table, &definition)
            }
            Command::Insert { table, payload } => {
                self.execute_insert(identity, database, &table, payload, depth)
            }
            Command::Select(select) => self.execute_select(identity, database, select, depth),
            Command::Update {
                table,
                assignments,
                where_clause,
            } => self.execute_update(identity, database, &table, &assignments, &where_clause, depth),
            Command::Delete {
                table,
                where_clause,
            } => self.execute_delete(identity, database, &table, &where_clause, depth),
            Command::Transaction(TransactionControl::Begin) => self.execute_begin(identity),
            Command::Transaction(TransactionControl::Commit) => self.execute_commit(identity),
            Command::Transaction(TransactionControl::Rollback) => self.execute_rollback(identity),
            Command::CreateIndex { table, column } => {
                self.execute_create_index(database, &table, &column, IndexKind::Hash)
            }
            Command::CreateFullText { table, column } => {
                self.execute_create_index(database, &table, &column, IndexKind::FullText)
            }
            Command::FullTextSearch {
                table,
                column,
                keyword,
            } => self.execute_search(identity, database, &table, &column, &keyword),
            Command::CreateView { name, query } => self.execute_create_view(database, &name, &query),
            Command::CreateTrigger(definition) => self.execute_create_trigger(database, definition),
            other @ (Command::ShowDatabases | Command::Replication(_)) => {
                Err(Error::Unsupported(other.kind().to_string()))
            }
        }
    }

    /// Role, database and replica checks that do not depend on a table
    fn authorize(&self, identity: &Identity, command: &Command) -> Result<()> {
        match command {
            Command::ShowDatabases => return Ok(()),
            Command::Replication(_) => return identity.require_role(Role::SuperMaung),
            _ => {}
        }

        identity.require_database()?;
        if matches!(
            command,
            Command::CreateTable { .. }
                | Command::CreateView { .. }
                | Command::CreateTrigger(_)
                | Command::CreateIndex { .. }
                | Command::CreateFullText { .. }
        ) {
            identity.require_role(Role::Admin)?;
        }
        if command.is_mutation() {
            self.replication.ensure_writable()?;
        }
        Ok(())
    }

    // ========== DDL ==========

    fn execute_create_table(
        &self,
        database: &str,
        table: &str,
        definition: &str,
    ) -> Result<ExecutionResult> {
        if self.views.is_view(database, table) {
            return Err(Error::TableAlreadyExists(table.to_string()));
        }
        let columns = parse_columns(definition)?;
        let schema = self
            .schemas
            .create(database, table, columns, Permissions::default())?;
        self.storage.init_table(database, table)?;

        info!(database, table, columns = schema.columns.len(), "table created");
        Ok(ExecutionResult::with_message(format!(
            "Table '{}' created with {} columns",
            table,
            schema.columns.len()
        )))
    }

    fn execute_create_index(
        &self,
        database: &str,
        table: &str,
        column: &str,
        kind: IndexKind,
    ) -> Result<ExecutionResult> {
        let schema = self.schemas.load(database, table)?;
        let column_index = schema
            .column_index(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string(), table.to_string()))?;

        let keys = self
            .indexes
            .build(database, table, column, column_index, kind)?;
        let label = match kind {
            IndexKind::Hash => "Index",
            IndexKind::FullText => "Full-text index",
        };
        Ok(ExecutionResult::with_message(format!(
            "{} created on {}.{} ({} keys)",
            label, table, column, keys
        )))
    }

    fn execute_create_view(&self, database: &str, name: &str, query: &str) -> Result<ExecutionResult> {
        if self.schemas.exists(database, name) {
            return Err(Error::TableAlreadyExists(name.to_string()));
        }
        self.views.save(database, name, query)?;

        info!(database, view = name, "view created");
        Ok(ExecutionResult::with_message(format!(
            "View '{}' created",
            name
        )))
    }

    fn execute_create_trigger(
        &self,
        database: &str,
        definition: TriggerDefinition,
    ) -> Result<ExecutionResult> {
        // The firing table must exist
        self.schemas.load(database, &definition.table)?;

        let trigger = Trigger::new(
            definition.name,
            definition.event,
            definition.table,
            definition.action,
        );
        self.triggers.save(database, &trigger)?;

        info!(
            database,
            trigger = %trigger.name,
            table = %trigger.table,
            event = %trigger.event,
            "trigger created"
        );
        Ok(ExecutionResult::with_message(format!(
            "Trigger '{}' created for {} on '{}'",
            trigger.name, trigger.event, trigger.table
        )))
    }

    // ========== DML ==========

    fn execute_insert(
        &self,
        identity: &Identity,
        database: &str,
        table: &str,
        payload: String,
        depth: usize,
    ) -> Result<ExecutionResult> {
        let schema = self.schemas.load(database, table)?;
        schema.require(identity.role, Access::Write)?;
        schema.validate_row(&payload, &self.stored_values(database))?;

        if self.transactions.is_active(&identity.username) {
            self.transactions.buffer(
                &identity.username,
                WalOp::Insert,
                database,
                table,
                row_id(&payload),
                &payload,
                None,
            )?;
            return Ok(ExecutionResult::with_message(format!(
                "1 row buffered for '{}' in the current transaction",
                table
            )));
        }

        self.storage.append(database, table, &payload)?;
        self.patch_indexes(database, &schema, Vec::new(), vec![payload]);
        self.fire_triggers(identity, database, table, TriggerEvent::Insert, depth);

        Ok(ExecutionResult::with_message(format!(
            "1 row inserted into '{}'",
            table
        )))
    }

    fn execute_update(
        &self,
        identity: &Identity,
        database: &str,
        table: &str,
        assignments: &IndexMap<String, String>,
        where_clause: &[Condition],
        depth: usize,
    ) -> Result<ExecutionResult> {
        let schema = self.schemas.load(database, table)?;
        schema.require(identity.role, Access::Write)?;

        let lookup = self.stored_values(database);
        let mut targets = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            let idx = schema
                .column_index(column)
                .ok_or_else(|| Error::ColumnNotFound(column.clone(), table.to_string()))?;
            let target = &schema.columns[idx];
            schema.validate_field(target, value)?;
            if let Some(fk) = target.foreign_key.as_ref().filter(|_| !is_null(value)) {
                if !lookup
                    .column_values(&fk.table, &fk.column)?
                    .iter()
                    .any(|v| v == value)
                {
                    return Err(Error::ConstraintViolation(format!(
                        "value '{}' of '{}' has no match in {}.{}",
                        value, target.name, fk.table, fk.column
                    )));
                }
            }
            targets.push((idx, value.as_str()));
        }

        let rewrite = |rows: Vec<String>| -> Result<(Vec<String>, Vec<(String, String)>)> {
            let split: Vec<Vec<String>> = rows.iter().map(|row| split_row(row)).collect();
            let matched = split
                .iter()
                .map(|fields| row_matches(&schema, fields, where_clause))
                .collect::<Result<Vec<bool>>>()?;
            check_unique_assignments(&schema, &targets, &split, &matched)?;

            let mut changed = Vec::new();
            let mut out = Vec::with_capacity(rows.len());
            for ((row, mut fields), is_match) in rows.into_iter().zip(split).zip(matched) {
                if is_match {
                    fields.resize(schema.columns.len(), String::new());
                    for (idx, value) in &targets {
                        fields[*idx] = value.to_string();
                    }
                    let new_row = join_row(&fields);
                    out.push(new_row.clone());
                    changed.push((row, new_row));
                } else {
                    out.push(row);
                }
            }
            Ok((out, changed))
        };

        if self.transactions.is_active(&identity.username) {
            let rows = self.storage.read_all(database, table)?;
            let (_, changed) = rewrite(rows)?;
            for (old_row, new_row) in &changed {
                self.transactions.buffer(
                    &identity.username,
                    WalOp::Update,
                    database,
                    table,
                    row_id(old_row),
                    new_row,
                    Some(old_row.clone()),
                )?;
            }
            return Ok(ExecutionResult::with_message(format!(
                "{} row(s) buffered for update in the current transaction",
                changed.len()
            )));
        }

        let changed = self.storage.modify(database, table, rewrite)?;
        let count = changed.len();
        if count > 0 {
            let (old_rows, new_rows): (Vec<String>, Vec<String>) = changed.into_iter().unzip();
            self.patch_indexes(database, &schema, old_rows, new_rows);
            self.fire_triggers(identity, database, table, TriggerEvent::Update, depth);
        }

        Ok(ExecutionResult::with_message(format!(
            "{} row(s) updated in '{}'",
            count, table
        )))
    }

    fn execute_delete(
        &self,
        identity: &Identity,
        database: &str,
        table: &str,
        where_clause: &[Condition],
        depth: usize,
    ) -> Result<ExecutionResult> {
        let schema = self.schemas.load(database, table)?;
        schema.require(identity.role, Access::Write)?;

        let partition = |rows: Vec<String>| -> Result<(Vec<String>, Vec<String>)> {
            let mut kept = Vec::with_capacity(rows.len());
            let mut removed = Vec::new();
            for row in rows {
                if row_matches(&schema, &split_row(&row), where_clause)? {
                    removed.push(row);
                } else {
                    kept.push(row);
                }
            }
            Ok((kept, removed))
        };

        if self.transactions.is_active(&identity.username) {
            let rows = self.storage.read_all(database, table)?;
            let (_, removed) = partition(rows)?;
            for row in &removed {
                self.transactions.buffer(
                    &identity.username,
                    WalOp::Delete,
                    database,
                    table,
                    row_id(row),
                    "",
                    Some(row.clone()),
                )?;
            }
            return Ok(ExecutionResult::with_message(format!(
                "{} row(s) buffered for delete in the current transaction",
                removed.len()
            )));
        }

        let removed = self.storage.modify(database, table, partition)?;
        let count = removed.len();
        if count > 0 {
            self.patch_indexes(database, &schema, removed, Vec::new());
            self.fire_triggers(identity, database, table, TriggerEvent::Delete, depth);
        }

        Ok(ExecutionResult::with_message(format!(
            "{} row(s) deleted from '{}'",
            count, table
        )))
    }

    fn execute_search(
        &self,
        identity: &Identity,
        database: &str,
        table: &str,
        column: &str,
        keyword: &str,
    ) -> Result<ExecutionResult> {
        let schema = self.schemas.load(database, table)?;
        schema.require(identity.role, Access::Read)?;
        if schema.column(column).is_none() {
            return Err(Error::ColumnNotFound(column.to_string(), table.to_string()));
        }

        let ids = self.indexes.search(database, table, column, keyword)?;
        let rows = self
            .storage
            .read_all(database, table)?
            .into_iter()
            .filter(|row| ids.iter().any(|id| id == row_id(row)))
            .map(|row| split_row(&row))
            .collect();

        Ok(ExecutionResult::with_rows(schema.field_names(), rows))
    }

    // ========== Transactions ==========

    fn execute_begin(&self, identity: &Identity) -> Result<ExecutionResult> {
        let tx_id = self.transactions.begin(&identity.username)?;
        Ok(ExecutionResult::with_message(format!(
            "Transaction {} started",
            tx_id
        )))
    }

    fn execute_commit(&self, identity: &Identity) -> Result<ExecutionResult> {
        let outcome = match self.transactions.commit(&identity.username) {
            Ok(outcome) => outcome,
            Err(e) => {
                // Entries applied before the failure are committed all the same
                if let Error::CommitApplyFailed { applied, .. } = &e {
                    self.patch_committed(applied.clone());
                }
                return Err(e);
            }
        };
        let count = outcome.applied.len();
        self.patch_committed(outcome.applied);

        Ok(ExecutionResult::with_message(format!(
            "Transaction {} committed ({} operations)",
            outcome.tx_id, count
        )))
    }

    fn execute_rollback(&self, identity: &Identity) -> Result<ExecutionResult> {
        let (tx_id, discarded) = self.transactions.rollback(&identity.username)?;
        Ok(ExecutionResult::with_message(format!(
            "Transaction {} rolled back ({} operations discarded)",
            tx_id, discarded
        )))
    }

    // ========== Cluster & catalog ==========

    fn execute_show_databases(&self) -> Result<ExecutionResult> {
        let rows = self
            .storage
            .list_databases()?
            .into_iter()
            .map(|name| vec![name])
            .collect();
        Ok(ExecutionResult::with_rows(vec!["database".to_string()], rows))
    }

    fn execute_replication(&self, control: ReplicationControl) -> Result<ExecutionResult> {
        match control {
            ReplicationControl::BecomeMaster => {
                self.replication.become_master()?;
                Ok(ExecutionResult::with_message("Node is now master (read/write)"))
            }
            ReplicationControl::BecomeReplica { master_host } => {
                self.replication.become_replica(&master_host)?;
                Ok(ExecutionResult::with_message(format!(
                    "Node is now a read-only replica of {}",
                    master_host
                )))
            }
        }
    }

    // ========== Maintenance ==========

    /// Drop `removed` rows from the table's indexes, then add `added` rows
    fn patch_indexes(
        &self,
        database: &str,
        schema: &Arc<TableSchema>,
        removed: Vec<String>,
        added: Vec<String>,
    ) {
        let indexes = self.indexes.clone();
        let schema = schema.clone();
        let database = database.to_string();
        self.maintenance.dispatch("index", move || {
            for row in &removed {
                indexes.remove(&database, &schema.name, row_id(row))?;
            }
            let field_names = schema.field_names();
            for row in &added {
                indexes.update_on_insert(&database, &schema.name, &field_names, row)?;
            }
            Ok(())
        });
    }

    /// Patch indexes for every entry a commit applied
    fn patch_committed(&self, applied: Vec<WalEntry>) {
        if applied.is_empty() {
            return;
        }
        let indexes = self.indexes.clone();
        let schemas = self.schemas.clone();
        self.maintenance.dispatch("index", move || {
            for entry in &applied {
                let (database, table) = (entry.database.as_str(), entry.table.as_str());
                if matches!(entry.op, WalOp::Update | WalOp::Delete) {
                    indexes.remove(database, table, &entry.row_id)?;
                }
                if matches!(entry.op, WalOp::Insert | WalOp::Update) {
                    let field_names = schemas.load(database, table)?.field_names();
                    indexes.update_on_insert(database, table, &field_names, &entry.data)?;
                }
            }
            Ok(())
        });
    }

    /// Run every trigger registered for `table` and `event`, one level
    /// deeper than the mutation that fired them
    fn fire_triggers(
        &self,
        identity: &Identity,
        database: &str,
        table: &str,
        event: TriggerEvent,
        depth: usize,
    ) {
        let triggers = match self.triggers.for_event(database, table, event) {
            Ok(triggers) => triggers,
            Err(e) => {
                warn!(database, table, %event, error = %e, "failed to load triggers");
                return;
            }
        };

        for trigger in triggers {
            debug!(trigger = %trigger.name, table, %event, depth, "firing trigger");
            let executor = self.clone();
            let identity = identity.clone();
            self.maintenance.dispatch("trigger", move || {
                let command = parse(&trigger.action)?;
                executor.execute_as(&identity, command, depth + 1)?;
                Ok(())
            });
        }
    }

    fn stored_values<'a>(&'a self, database: &'a str) -> StoredValues<'a> {
        StoredValues {
            executor: self,
            database,
        }
    }
}

/// Reject assignments that would duplicate a unique column's value, either
/// against a row the update leaves alone or across several updated rows
fn check_unique_assignments(
    schema: &TableSchema,
    targets: &[(usize, &str)],
    rows: &[Vec<String>],
    matched: &[bool],
) -> Result<()> {
    let hits = matched.iter().filter(|m| **m).count();
    for &(idx, value) in targets {
        let column = &schema.columns[idx];
        if !column.unique || is_null(value) || hits == 0 {
            continue;
        }
        let clash = hits > 1
            || rows
                .iter()
                .zip(matched)
                .any(|(fields, is_match)| !is_match && fields.get(idx).map(String::as_str) == Some(value));
        if clash {
            return Err(Error::ConstraintViolation(format!(
                "duplicate value '{}' for unique column '{}'",
                value, column.name
            )));
        }
    }
    Ok(())
}

/// Committed column values, read straight from table files
struct StoredValues<'a> {
    executor: &'a Executor,
    database: &'a str,
}

impl RowLookup for StoredValues<'_> {
    fn column_values(&self, table: &str, column: &str) -> Result<Vec<String>> {
        let schema = self.executor.schemas.load(self.database, table)?;
        let idx = schema
            .column_index(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string(), table.to_string()))?;
        Ok(self
            .executor
            .storage
            .read_all(self.database, table)?
            .iter()
            .filter_map(|row| row.split(DELIMITER).nth(idx).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticSession;
    use tempfile::TempDir;

    fn create_test_executor(role: Role) -> (TempDir, Executor) {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(StaticSession::logged_in(
            Identity::new("asep", role).with_database("kantor"),
        ));
        let config = EngineConfig::new().data_dir(dir.path()).sync_writes(false);
        let executor = Executor::open(config, session).unwrap();
        executor.create_database("kantor").unwrap();
        (dir, executor)
    }

    fn seed(executor: &Executor) {
        executor
            .run("DAMEL pegawai id:INT:PK, nama:STRING, gaji:FLOAT")
            .unwrap();
        executor.run("SIMPEN pegawai 1|Asep|9000000").unwrap();
        executor.run("SIMPEN pegawai 2|Euis|4000000").unwrap();
        executor.run("SIMPEN pegawai 3|Dadang|7500000").unwrap();
    }

    #[test]
    fn test_create_table() {
        let (_dir, executor) = create_test_executor(Role::Admin);
        let result = executor
            .run("DAMEL pegawai id:INT:PK, nama:STRING")
            .unwrap();
        assert!(result.message.unwrap().contains("created"));

        assert!(matches!(
            executor.run("DAMEL pegawai id:INT"),
            Err(Error::TableAlreadyExists(_))
        ));
    }

    #[test]
    fn test_insert_and_select() {
        let (_dir, executor) = create_test_executor(Role::Admin);
        seed(&executor);

        let result = executor.run("TINGALI pegawai").unwrap();
        assert_eq!(result.columns, vec!["id", "nama", "gaji"]);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0], vec!["1", "Asep", "9000000"]);

        let result = executor
            .run("TINGALI nama, gaji TI pegawai DIMANA gaji > 5000000 RUNTUYKEUN gaji TURUN")
            .unwrap();
        assert_eq!(result.columns, vec!["nama", "gaji"]);
        assert_eq!(
            result.rows,
            vec![vec!["Asep", "9000000"], vec!["Dadang", "7500000"]]
        );

        // Ordering only sees projected columns
        assert!(matches!(
            executor.run("TINGALI nama TI pegawai RUNTUYKEUN gaji"),
            Err(Error::ColumnNotFound(_, _))
        ));
    }

    #[test]
    fn test_insert_validation() {
        let (_dir, executor) = create_test_executor(Role::Admin);
        seed(&executor);

        assert!(matches!(
            executor.run("SIMPEN pegawai 1|Dup|1"),
            Err(Error::ConstraintViolation(_))
        ));
        assert!(matches!(
            executor.run("SIMPEN pegawai 4|Ujang"),
            Err(Error::FieldCountMismatch { .. })
        ));
        assert!(matches!(
            executor.run("SIMPEN pegawai 4|Ujang|loba"),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_update_and_delete() {
        let (_dir, executor) = create_test_executor(Role::Admin);
        seed(&executor);

        let result = executor
            .run("OMEAN pegawai JADI gaji=100 DIMANA gaji < 8000000")
            .unwrap();
        assert!(result.message.unwrap().starts_with("2 row(s) updated"));

        let result = executor.run("TINGALI pegawai DIMANA gaji = 100").unwrap();
        assert_eq!(result.rows.len(), 2);

        assert!(matches!(
            executor.run("OMEAN pegawai JADI umur=1"),
            Err(Error::ColumnNotFound(_, _))
        ));
        assert!(matches!(
            executor.run("OMEAN pegawai JADI gaji=mahal"),
            Err(Error::TypeMismatch { .. })
        ));

        let result = executor.run("MICEUN TI pegawai DIMANA id = 2").unwrap();
        assert!(result.message.unwrap().starts_with("1 row(s) deleted"));
        let ids: Vec<String> = executor
            .run("TINGALI pegawai")
            .unwrap()
            .rows
            .into_iter()
            .map(|r| r[0].clone())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_transaction_messages() {
        let (_dir, executor) = create_test_executor(Role::Admin);
        seed(&executor);

        let result = executor.run("MIMITIAN").unwrap();
        assert!(result.message.unwrap().contains("started"));
        executor.run("SIMPEN pegawai 4|Ujang|1").unwrap();
        // Buffered writes are not visible before commit
        assert_eq!(executor.run("TINGALI pegawai").unwrap().rows.len(), 3);

        let result = executor.run("JADIKEUN").unwrap();
        assert!(result.message.unwrap().contains("committed (1 operations)"));
        assert_eq!(executor.run("TINGALI pegawai").unwrap().rows.len(), 4);

        assert!(matches!(
            executor.run("BATALKEUN"),
            Err(Error::NoActiveTransaction(_))
        ));
    }

    #[test]
    fn test_authorization() {
        let (_dir, executor) = create_test_executor(Role::User);
        assert!(matches!(
            executor.run("DAMEL t id:INT"),
            Err(Error::InsufficientRole { .. })
        ));
        assert!(matches!(
            executor.run("JADI INDUNG"),
            Err(Error::InsufficientRole { .. })
        ));
        // Listing databases needs no database and no role
        let result = executor.run("TINGALI PANGKAL").unwrap();
        assert_eq!(result.rows, vec![vec!["kantor"]]);
    }

    #[test]
    fn test_unknown_source() {
        let (_dir, executor) = create_test_executor(Role::Admin);
        assert!(matches!(
            executor.run("TINGALI hantu"),
            Err(Error::TableNotFound(_))
        ));
    }
}
