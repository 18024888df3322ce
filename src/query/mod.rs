//! MaungQL front end
//!
//! Lexing, keyword tables, the command tree and the statement parser.

pub mod ast;
pub mod keyword;
pub mod lexer;
pub mod parser;

pub use ast::{
    Command, Condition, Connector, JoinClause, JoinKind, Operator, OrderBy, ReplicationControl,
    SelectCommand, TransactionControl, TriggerDefinition,
};
pub use keyword::Keyword;
pub use parser::{parse, Parser};
