//! Stored triggers
//!
//! Each trigger is a JSON file `db_<database>/triggers/<table>_<EVENT>_<name>.json`
//! holding the action query text to run after a matching mutation.

use crate::config::database_path;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Directory inside a database that holds trigger files
pub const TRIGGER_DIR: &str = "triggers";

/// Mutation that fires a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl TriggerEvent {
    /// Parse an event keyword, accepting the bilingual synonyms
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_uppercase().as_str() {
            "INSERT" | "SIMPEN" | "TENDEUN" => Some(TriggerEvent::Insert),
            "UPDATE" | "OMEAN" | "ROBIH" => Some(TriggerEvent::Update),
            "DELETE" | "MICEUN" | "PICEUN" => Some(TriggerEvent::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerEvent::Insert => "INSERT",
            TriggerEvent::Update => "UPDATE",
            TriggerEvent::Delete => "DELETE",
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    pub event: TriggerEvent,
    pub table: String,
    /// Query text run after the mutation
    pub action: String,
    pub created_at_ms: u64,
}

impl Trigger {
    pub fn new(
        name: impl Into<String>,
        event: TriggerEvent,
        table: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            name: name.into(),
            event,
            table: table.into(),
            action: action.into(),
            created_at_ms,
        }
    }
}

#[derive(Debug)]
pub struct TriggerStore {
    data_dir: PathBuf,
    lock: RwLock<()>,
}

impl TriggerStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock: RwLock::new(()),
        }
    }

    fn dir(&self, database: &str) -> PathBuf {
        database_path(&self.data_dir, database).join(TRIGGER_DIR)
    }

    /// Persist a trigger, replacing one with the same table, event and name
    pub fn save(&self, database: &str, trigger: &Trigger) -> Result<()> {
        let _guard = self.lock.write().map_err(Error::poisoned)?;

        let db_dir = database_path(&self.data_dir, database);
        if !db_dir.is_dir() {
            return Err(Error::DatabaseNotFound(database.to_string()));
        }
        let dir = self.dir(database);
        fs::create_dir_all(&dir)?;

        let file = format!("{}_{}_{}.json", trigger.table, trigger.event, trigger.name);
        fs::write(dir.join(file), serde_json::to_string_pretty(trigger)?)?;
        Ok(())
    }

    /// Triggers registered for `table` and `event`, ordered by name
    pub fn for_event(
        &self,
        database: &str,
        table: &str,
        event: TriggerEvent,
    ) -> Result<Vec<Trigger>> {
        let _guard = self.lock.read().map_err(Error::poisoned)?;

        let dir = self.dir(database);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}_{}_", table, event);
        let mut triggers = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.starts_with(&prefix) || !file_name.ends_with(".json") {
                continue;
            }
            let trigger: Trigger = serde_json::from_str(&fs::read_to_string(entry.path())?)?;
            // The prefix match is ambiguous when table names contain '_'
            if trigger.table == table && trigger.event == event {
                triggers.push(trigger);
            }
        }
        triggers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(triggers)
    }
}
