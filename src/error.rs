//! Error types for MaungDB
//!
//! Every failure the engine can report, grouped by the layer that raises it.
//! Callers that only care about the category can use [`Error::kind`].

use thiserror::Error;

use crate::storage::WalEntry;

/// The main error type for MaungDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Parse Errors ==========
    #[error("Parse error: empty query")]
    EmptyQuery,

    #[error("Parse error: unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Parse error: unexpected token '{found}', expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Parse error: unexpected end of input, expected {0}")]
    UnexpectedEof(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Parse error: invalid column definition '{0}'")]
    InvalidColumnDefinition(String),

    // ========== Authorization Errors ==========
    #[error("Authorization error: not logged in")]
    NotLoggedIn,

    #[error("Authorization error: role '{actual}' is below required role '{required}'")]
    InsufficientRole { required: String, actual: String },

    #[error("Authorization error: no database selected")]
    NoDatabaseSelected,

    #[error("Authorization error: role '{role}' has no {access} permission on table '{table}'")]
    PermissionDenied {
        table: String,
        role: String,
        access: String,
    },

    #[error("Authorization error: this node is a read-only replica")]
    ReadOnlyReplica,

    // ========== Schema Errors ==========
    #[error("Schema error: table '{0}' not found")]
    TableNotFound(String),

    #[error("Schema error: table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Schema error: column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Schema error: invalid name '{0}'")]
    InvalidName(String),

    #[error("Schema error: expected {expected} fields, got {found}")]
    FieldCountMismatch { expected: usize, found: usize },

    #[error("Schema error: value '{value}' is not a valid {expected} for column '{column}'")]
    TypeMismatch {
        column: String,
        expected: String,
        value: String,
    },

    #[error("Schema error: null value not allowed for column '{0}'")]
    NullNotAllowed(String),

    #[error("Schema error: constraint violation - {0}")]
    ConstraintViolation(String),

    // ========== Storage Errors ==========
    #[error("Storage error: table file '{0}' not found")]
    TableFileMissing(String),

    #[error("Storage error: row '{id}' not found in table '{table}'")]
    RowNotFound { table: String, id: String },

    #[error("Storage error: database '{0}' already exists")]
    DatabaseAlreadyExists(String),

    #[error("Storage error: database '{0}' not found")]
    DatabaseNotFound(String),

    #[error("Storage error: index on '{table}.{column}' not found")]
    IndexNotFound { table: String, column: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    // ========== Transaction Errors ==========
    #[error("Transaction error: '{0}' already has an active transaction")]
    TransactionAlreadyActive(String),

    #[error("Transaction error: '{0}' has no active transaction")]
    NoActiveTransaction(String),

    #[error("Transaction error: transaction {tx_id} was logged but failed to apply: {source}")]
    CommitApplyFailed {
        tx_id: String,
        #[source]
        source: Box<Error>,
        /// Entries applied before the failing one
        applied: Vec<WalEntry>,
    },

    // ========== Execution Errors ==========
    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Execution error: unsupported command {0}")]
    Unsupported(String),

    #[error("Execution error: nesting depth {0} exceeded (recursive view or trigger?)")]
    NestingTooDeep(usize),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error category, one per layer of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Authorization,
    Schema,
    Storage,
    Transaction,
    Execution,
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyQuery
            | Error::UnknownCommand(_)
            | Error::UnexpectedToken { .. }
            | Error::UnexpectedEof(_)
            | Error::ParseError(_)
            | Error::InvalidColumnDefinition(_) => ErrorKind::Parse,

            Error::NotLoggedIn
            | Error::InsufficientRole { .. }
            | Error::NoDatabaseSelected
            | Error::PermissionDenied { .. }
            | Error::ReadOnlyReplica => ErrorKind::Authorization,

            Error::TableNotFound(_)
            | Error::TableAlreadyExists(_)
            | Error::ColumnNotFound(_, _)
            | Error::InvalidName(_)
            | Error::FieldCountMismatch { .. }
            | Error::TypeMismatch { .. }
            | Error::NullNotAllowed(_)
            | Error::ConstraintViolation(_) => ErrorKind::Schema,

            Error::TableFileMissing(_)
            | Error::RowNotFound { .. }
            | Error::DatabaseAlreadyExists(_)
            | Error::DatabaseNotFound(_)
            | Error::IndexNotFound { .. }
            | Error::IoError(_)
            | Error::SerdeError(_) => ErrorKind::Storage,

            Error::TransactionAlreadyActive(_)
            | Error::NoActiveTransaction(_)
            | Error::CommitApplyFailed { .. } => ErrorKind::Transaction,

            Error::ExecutionError(_)
            | Error::Unsupported(_)
            | Error::NestingTooDeep(_)
            | Error::Internal(_) => ErrorKind::Execution,
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Error::ParseError(message.into())
    }

    pub(crate) fn poisoned<T>(_: std::sync::PoisonError<T>) -> Self {
        Error::Internal("lock poisoned".to_string())
    }
}

/// Result type alias for MaungDB operations
pub type Result<T> = std::result::Result<T, Error>;
