//! MaungQL command tree
//!
//! One [`Command`] per statement, produced by the parser and consumed by
//! the executor.

use crate::catalog::TriggerEvent;
use indexmap::IndexMap;
use std::fmt;

/// A parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// CREATE table with raw column definitions
    CreateTable { table: String, definition: String },
    /// INSERT of one delimiter-joined row
    Insert { table: String, payload: String },
    /// SELECT query
    Select(SelectCommand),
    /// UPDATE with ordered assignments
    Update {
        table: String,
        assignments: IndexMap<String, String>,
        where_clause: Vec<Condition>,
    },
    /// DELETE
    Delete {
        table: String,
        where_clause: Vec<Condition>,
    },
    /// BEGIN / COMMIT / ROLLBACK
    Transaction(TransactionControl),
    /// Build a hash index on `table.column`
    CreateIndex { table: String, column: String },
    /// Store a view
    CreateView { name: String, query: String },
    /// Store a trigger
    CreateTrigger(TriggerDefinition),
    /// List databases
    ShowDatabases,
    /// Build an inverted index on `table.column`
    CreateFullText { table: String, column: String },
    /// Look up one token in an inverted index
    FullTextSearch {
        table: String,
        column: String,
        keyword: String,
    },
    /// Switch replication role
    Replication(ReplicationControl),
}

impl Command {
    /// Short name of the command kind
    pub fn kind(&self) -> &'static str {
        match self {
            Command::CreateTable { .. } => "CREATE",
            Command::Insert { .. } => "INSERT",
            Command::Select(_) => "SELECT",
            Command::Update { .. } => "UPDATE",
            Command::Delete { .. } => "DELETE",
            Command::Transaction(_) => "TRANSACTION",
            Command::CreateIndex { .. } => "INDEX",
            Command::CreateView { .. } => "CREATE_VIEW",
            Command::CreateTrigger(_) => "CREATE_TRIGGER",
            Command::ShowDatabases => "SHOW_DATABASES",
            Command::CreateFullText { .. } => "CREATE_FULLTEXT",
            Command::FullTextSearch { .. } => "FULLTEXT_SEARCH",
            Command::Replication(_) => "REPLICATION",
        }
    }

    /// Whether the command changes stored state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::CreateTable { .. }
                | Command::Insert { .. }
                | Command::Update { .. }
                | Command::Delete { .. }
                | Command::CreateIndex { .. }
                | Command::CreateView { .. }
                | Command::CreateTrigger(_)
                | Command::CreateFullText { .. }
                | Command::Transaction(TransactionControl::Commit)
        )
    }
}

/// SELECT query
#[derive(Debug, Clone, PartialEq)]
pub struct SelectCommand {
    /// Projected fields or aggregate expressions; `*` for all columns
    pub fields: Vec<String>,
    /// Source table or view
    pub table: String,
    /// JOIN clauses in written order
    pub joins: Vec<JoinClause>,
    /// WHERE chain
    pub where_clause: Vec<Condition>,
    /// GROUP BY column
    pub group_by: Option<String>,
    /// HAVING chain
    pub having: Vec<Condition>,
    /// ORDER BY column and direction
    pub order_by: Option<OrderBy>,
    /// Row limit; zero or negative means unbounded
    pub limit: i64,
    /// Rows to skip
    pub offset: i64,
}

impl SelectCommand {
    /// `SELECT * FROM table`
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            fields: vec!["*".to_string()],
            table: table.into(),
            joins: Vec::new(),
            where_clause: Vec::new(),
            group_by: None,
            having: Vec::new(),
            order_by: None,
            limit: -1,
            offset: 0,
        }
    }

    /// Whether every column is projected
    pub fn is_wildcard(&self) -> bool {
        self.fields.len() == 1 && self.fields[0] == "*"
    }
}

/// ORDER BY target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    /// Case-insensitive substring match
    Contains,
}

impl Operator {
    /// Parse an operator symbol
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Operator::Eq),
            "!=" => Some(Operator::Neq),
            ">" => Some(Operator::Gt),
            "<" => Some(Operator::Lt),
            ">=" => Some(Operator::Gte),
            "<=" => Some(Operator::Lte),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Eq => "=",
            Operator::Neq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Contains => "LIKE",
        };
        f.write_str(symbol)
    }
}

/// Logic word linking a condition to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

/// One `field op value` test in a WHERE or HAVING chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    /// Literal with surrounding quotes removed
    pub value: String,
    /// How this condition combines with the next; `None` on the last one
    pub connector: Option<Connector>,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
            connector: None,
        }
    }
}

/// Join kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

/// `<kind> JOIN <table> ON <left> = <right>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: String,
    pub left: String,
    pub right: String,
}

/// Transaction control statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionControl {
    Begin,
    Commit,
    Rollback,
}

/// Trigger definition as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDefinition {
    pub name: String,
    pub event: TriggerEvent,
    pub table: String,
    /// Raw action query text
    pub action: String,
}

/// Replication role switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationControl {
    BecomeMaster,
    BecomeReplica { master_host: String },
}
