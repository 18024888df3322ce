//! Session and role model
//!
//! The engine never reads process-wide session state. It asks an injected
//! [`SessionProvider`] who is calling, and checks roles against the fixed
//! order `supermaung > admin > user`.

use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Caller role, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    SuperMaung,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperMaung => "supermaung",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "supermaung" => Ok(Role::SuperMaung),
            other => Err(Error::ExecutionError(format!("unknown role '{}'", other))),
        }
    }
}

/// Who is executing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub role: Role,
    /// Currently selected database
    pub database: Option<String>,
}

impl Identity {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
            database: None,
        }
    }

    /// Select a database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Fail unless the identity holds at least `min`
    pub fn require_role(&self, min: Role) -> Result<()> {
        if self.role >= min {
            Ok(())
        } else {
            Err(Error::InsufficientRole {
                required: min.to_string(),
                actual: self.role.to_string(),
            })
        }
    }

    /// The selected database, or an error if none is selected
    pub fn require_database(&self) -> Result<&str> {
        self.database
            .as_deref()
            .filter(|db| !db.is_empty())
            .ok_or(Error::NoDatabaseSelected)
    }
}

/// Source of the caller's identity
pub trait SessionProvider: Send + Sync {
    /// The identity of the current caller
    fn current_identity(&self) -> Result<Identity>;

    /// Fail unless the current caller holds at least `min`
    fn require_role(&self, min: Role) -> Result<()> {
        self.current_identity()?.require_role(min)
    }
}

/// In-memory session holding at most one logged-in identity
#[derive(Debug, Default)]
pub struct StaticSession {
    identity: RwLock<Option<Identity>>,
}

impl StaticSession {
    /// A session with nobody logged in
    pub fn new() -> Self {
        Self::default()
    }

    /// A session already logged in as `identity`
    pub fn logged_in(identity: Identity) -> Self {
        Self {
            identity: RwLock::new(Some(identity)),
        }
    }

    pub fn login(&self, identity: Identity) -> Result<()> {
        *self.identity.write().map_err(Error::poisoned)? = Some(identity);
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        *self.identity.write().map_err(Error::poisoned)? = None;
        Ok(())
    }

    /// Switch the selected database of the logged-in identity
    pub fn use_database(&self, database: impl Into<String>) -> Result<()> {
        let mut guard = self.identity.write().map_err(Error::poisoned)?;
        let identity = guard.as_mut().ok_or(Error::NotLoggedIn)?;
        identity.database = Some(database.into());
        Ok(())
    }
}

impl SessionProvider for StaticSession {
    fn current_identity(&self) -> Result<Identity> {
        self.identity
            .read()
            .map_err(Error::poisoned)?
            .clone()
            .ok_or(Error::NotLoggedIn)
    }
}
