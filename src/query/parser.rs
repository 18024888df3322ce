//! MaungQL Parser
//!
//! This module parses statement text into a [`Command`]. The leading word
//! selects the statement grammar; each grammar walks the token list with a
//! cursor and fails on the first malformed clause.

use super::ast::*;
use super::keyword::{is_clause_start, Keyword};
use super::lexer::{clean, skip_words, tokenize, unquote};
use crate::catalog::{validate_name, TriggerEvent};
use crate::error::{Error, Result};
use indexmap::IndexMap;

/// Parse a single statement
pub fn parse(text: &str) -> Result<Command> {
    Parser::new(text)?.parse()
}

/// MaungQL Parser
pub struct Parser<'a> {
    /// Cleaned statement text, used for raw payloads
    source: &'a str,
    tokens: Vec<String>,
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser from statement text
    pub fn new(text: &'a str) -> Result<Self> {
        let source = clean(text);
        let tokens = tokenize(source);
        if tokens.is_empty() {
            return Err(Error::EmptyQuery);
        }
        Ok(Self {
            source,
            tokens,
            position: 0,
        })
    }

    /// Parse the statement
    pub fn parse(&mut self) -> Result<Command> {
        let verb = self.tokens[0].clone();

        if Keyword::Create.matches(&verb) {
            self.parse_create()
        } else if Keyword::Insert.matches(&verb) {
            self.parse_insert()
        } else if Keyword::Select.matches(&verb) {
            self.parse_select()
        } else if Keyword::Update.matches(&verb) {
            self.parse_update()
        } else if Keyword::Delete.matches(&verb) {
            self.parse_delete()
        } else if Keyword::Index.matches(&verb) {
            self.parse_index()
        } else if Keyword::Search.matches(&verb) {
            self.parse_search()
        } else if Keyword::Begin.matches(&verb) {
            self.parse_transaction(TransactionControl::Begin)
        } else if Keyword::Commit.matches(&verb) {
            self.parse_transaction(TransactionControl::Commit)
        } else if Keyword::Rollback.matches(&verb) {
            self.parse_transaction(TransactionControl::Rollback)
        } else if Keyword::Become.matches(&verb) {
            self.parse_replication()
        } else {
            Err(Error::UnknownCommand(verb))
        }
    }

    // ========== CREATE ==========

    fn parse_create(&mut self) -> Result<Command> {
        self.advance();

        if self.check(Keyword::View) {
            return self.parse_create_view();
        }
        if self.check(Keyword::Trigger) {
            return self.parse_create_trigger();
        }
        if self.check(Keyword::FullText) {
            return self.parse_create_fulltext();
        }

        self.consume(Keyword::Table);
        let table = self.expect_name("table name")?;
        let definition = self.raw_rest();
        if definition.is_empty() {
            return Err(Error::UnexpectedEof("column definitions".to_string()));
        }

        Ok(Command::CreateTable {
            table,
            definition: definition.to_string(),
        })
    }

    fn parse_create_view(&mut self) -> Result<Command> {
        self.advance();
        let name = self.expect_name("view name")?;
        self.expect(Keyword::As)?;

        let query = self.raw_rest();
        if query.is_empty() {
            return Err(Error::UnexpectedEof("view query".to_string()));
        }
        match parse(query)? {
            Command::Select(_) => {}
            other => {
                return Err(Error::parse(format!(
                    "a view must be a SELECT query, got {}",
                    other.kind()
                )))
            }
        }

        Ok(Command::CreateView {
            name,
            query: query.to_string(),
        })
    }

    fn parse_create_trigger(&mut self) -> Result<Command> {
        self.advance();
        let name = self.expect_name("trigger name")?;
        self.expect(Keyword::When)?;

        let word = self.expect_token("trigger event")?;
        let event = TriggerEvent::from_keyword(&word).ok_or_else(|| Error::UnexpectedToken {
            expected: "INSERT, UPDATE or DELETE".to_string(),
            found: word.clone(),
        })?;

        self.expect(Keyword::TriggerOn)?;
        let table = self.expect_name("table name")?;
        self.expect(Keyword::Do)?;

        let action = self.raw_rest();
        if action.is_empty() {
            return Err(Error::UnexpectedEof("trigger action".to_string()));
        }
        parse(action)?;

        Ok(Command::CreateTrigger(TriggerDefinition {
            name,
            event,
            table,
            action: action.to_string(),
        }))
    }

    fn parse_create_fulltext(&mut self) -> Result<Command> {
        self.advance();
        let table = self.expect_name("table name")?;
        self.expect(Keyword::On)?;
        let column = self.expect_name("column name")?;
        self.expect_end()?;
        Ok(Command::CreateFullText { table, column })
    }

    // ========== INSERT ==========

    fn parse_insert(&mut self) -> Result<Command> {
        self.advance();
        let table = self.expect_name("table name")?;
        let payload = self.raw_rest();
        if payload.is_empty() {
            return Err(Error::UnexpectedEof("row data".to_string()));
        }
        Ok(Command::Insert {
            table,
            payload: payload.to_string(),
        })
    }

    // ========== SELECT ==========

    fn parse_select(&mut self) -> Result<Command> {
        self.advance();

        if self.check(Keyword::Databases) {
            self.advance();
            self.expect_end()?;
            return Ok(Command::ShowDatabases);
        }

        // FROM must appear before the first clause keyword
        let from = (self.position..self.tokens.len())
            .take_while(|&i| !is_clause_start(&self.tokens[i]))
            .find(|&i| Keyword::From.matches(&self.tokens[i]));

        let mut cmd = match from {
            Some(from) => {
                if from == self.position {
                    return Err(Error::parse("no fields listed before FROM"));
                }
                let fields = parse_field_list(&self.tokens[self.position..from].join(" "))?;
                self.position = from + 1;
                let mut cmd = SelectCommand::all(self.expect_name("table name")?);
                cmd.fields = fields;
                cmd
            }
            None => SelectCommand::all(self.expect_name("table name")?),
        };

        while let Some(token) = self.current().map(str::to_string) {
            if let Some(kind) = self.join_kind() {
                let join = self.parse_join(kind)?;
                cmd.joins.push(join);
            } else if Keyword::Where.matches(&token) {
                self.advance();
                cmd.where_clause = self.take_conditions("WHERE")?;
            } else if Keyword::Group.matches(&token) {
                self.advance();
                self.consume(Keyword::By);
                cmd.group_by = Some(self.expect_field("GROUP BY column")?);
            } else if Keyword::Having.matches(&token) {
                self.advance();
                self.consume(Keyword::HavingFiller);
                cmd.having = self.take_conditions("HAVING")?;
            } else if Keyword::Order.matches(&token) {
                self.advance();
                self.consume(Keyword::By);
                let column = self.expect_field("ORDER BY column")?;
                let descending = if self.consume(Keyword::Desc) {
                    true
                } else {
                    self.consume(Keyword::Asc);
                    false
                };
                cmd.order_by = Some(OrderBy { column, descending });
            } else if Keyword::Limit.matches(&token) {
                self.advance();
                cmd.limit = self.expect_integer("LIMIT")?;
            } else if Keyword::Offset.matches(&token) {
                self.advance();
                cmd.offset = self.expect_integer("OFFSET")?;
            } else {
                return Err(Error::UnexpectedToken {
                    expected: "JOIN, WHERE, GROUP BY, HAVING, ORDER BY, LIMIT or OFFSET"
                        .to_string(),
                    found: token,
                });
            }
        }

        Ok(Command::Select(cmd))
    }

    fn join_kind(&self) -> Option<JoinKind> {
        let token = self.current()?;
        [
            (Keyword::Inner, JoinKind::Inner),
            (Keyword::Left, JoinKind::Left),
            (Keyword::Right, JoinKind::Right),
            (Keyword::Full, JoinKind::Full),
            (Keyword::Join, JoinKind::Inner),
        ]
        .into_iter()
        .find(|(kw, _)| kw.matches(token))
        .map(|(_, kind)| kind)
    }

    fn parse_join(&mut self, kind: JoinKind) -> Result<JoinClause> {
        if !self.consume(Keyword::Join) {
            // Type keyword first, then the JOIN word
            self.advance();
            self.expect(Keyword::Join)?;
        }

        let table = self.expect_name("join table")?;
        self.expect(Keyword::On)?;
        let left = self.expect_field("join column")?;
        let op = self.expect_token("=")?;
        if op != "=" {
            return Err(Error::UnexpectedToken {
                expected: "=".to_string(),
                found: op,
            });
        }
        let right = self.expect_field("join column")?;

        Ok(JoinClause {
            kind,
            table,
            left,
            right,
        })
    }

    /// Consume tokens up to the next clause keyword and parse them as a
    /// condition chain
    fn take_conditions(&mut self, clause: &str) -> Result<Vec<Condition>> {
        let start = self.position;
        while let Some(token) = self.current() {
            if is_clause_start(token) {
                break;
            }
            self.advance();
        }
        parse_conditions(&self.tokens[start..self.position], clause)
    }

    // ========== UPDATE / DELETE ==========

    fn parse_update(&mut self) -> Result<Command> {
        self.advance();
        let table = self.expect_name("table name")?;
        self.expect(Keyword::Set)?;

        let start = self.position;
        let end = (start..self.tokens.len())
            .find(|&i| Keyword::Where.matches(&self.tokens[i]))
            .unwrap_or(self.tokens.len());
        if start == end {
            return Err(Error::UnexpectedEof("column assignments".to_string()));
        }
        let assignments = parse_assignments(&self.tokens[start..end].join(" "))?;
        self.position = end;

        let where_clause = if self.consume(Keyword::Where) {
            self.rest_conditions("WHERE")?
        } else {
            Vec::new()
        };

        Ok(Command::Update {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<Command> {
        self.advance();
        self.expect(Keyword::From)?;
        let table = self.expect_name("table name")?;

        let where_clause = if self.is_at_end() {
            Vec::new()
        } else {
            self.expect(Keyword::Where)?;
            self.rest_conditions("WHERE")?
        };

        Ok(Command::Delete {
            table,
            where_clause,
        })
    }

    fn rest_conditions(&mut self, clause: &str) -> Result<Vec<Condition>> {
        let conditions = parse_conditions(&self.tokens[self.position..], clause)?;
        self.position = self.tokens.len();
        Ok(conditions)
    }

    // ========== Other statements ==========

    fn parse_index(&mut self) -> Result<Command> {
        self.advance();
        let table = self.expect_name("table name")?;
        self.expect(Keyword::On)?;
        let column = self.expect_name("column name")?;
        self.expect_end()?;
        Ok(Command::CreateIndex { table, column })
    }

    fn parse_search(&mut self) -> Result<Command> {
        self.advance();
        let table = self.expect_name("table name")?;
        self.expect(Keyword::On)?;
        let column = self.expect_name("column name")?;
        self.expect(Keyword::For)?;

        let keyword = unquote(self.raw_rest()).trim();
        if keyword.is_empty() {
            return Err(Error::UnexpectedEof("search keyword".to_string()));
        }
        Ok(Command::FullTextSearch {
            table,
            column,
            keyword: keyword.to_string(),
        })
    }

    fn parse_transaction(&mut self, control: TransactionControl) -> Result<Command> {
        self.advance();
        self.expect_end()?;
        Ok(Command::Transaction(control))
    }

    fn parse_replication(&mut self) -> Result<Command> {
        self.advance();

        if self.consume(Keyword::Master) {
            self.expect_end()?;
            return Ok(Command::Replication(ReplicationControl::BecomeMaster));
        }
        if self.consume(Keyword::Replica) {
            self.expect(Keyword::Of)?;
            let host = self.raw_rest();
            if host.is_empty() {
                return Err(Error::UnexpectedEof("master host".to_string()));
            }
            return Ok(Command::Replication(ReplicationControl::BecomeReplica {
                master_host: host.to_string(),
            }));
        }

        match self.current() {
            Some(token) => Err(Error::UnexpectedToken {
                expected: "MASTER or REPLICA".to_string(),
                found: token.to_string(),
            }),
            None => Err(Error::UnexpectedEof("MASTER or REPLICA".to_string())),
        }
    }

    // ========== Helper Methods ==========

    fn current(&self) -> Option<&str> {
        self.tokens.get(self.position).map(String::as_str)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn check(&self, keyword: Keyword) -> bool {
        self.current().map_or(false, |token| keyword.matches(token))
    }

    fn consume(&mut self, keyword: Keyword) -> bool {
        if self.check(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, keyword: Keyword) -> Result<()> {
        match self.current() {
            Some(token) if keyword.matches(token) => {
                self.advance();
                Ok(())
            }
            Some(token) => Err(Error::UnexpectedToken {
                expected: keyword.canonical().to_string(),
                found: token.to_string(),
            }),
            None => Err(Error::UnexpectedEof(keyword.canonical().to_string())),
        }
    }

    fn expect_token(&mut self, what: &str) -> Result<String> {
        let token = self
            .current()
            .ok_or_else(|| Error::UnexpectedEof(what.to_string()))?
            .to_string();
        self.advance();
        Ok(token)
    }

    /// A table, view or column name
    fn expect_name(&mut self, what: &str) -> Result<String> {
        let token = self.expect_token(what)?;
        validate_name(&token).map_err(|_| Error::UnexpectedToken {
            expected: what.to_string(),
            found: token.clone(),
        })?;
        Ok(token)
    }

    /// A possibly qualified column reference that is not a keyword
    fn expect_field(&mut self, what: &str) -> Result<String> {
        match self.current() {
            Some(token) if !is_clause_start(token) => self.expect_token(what),
            Some(token) => Err(Error::UnexpectedToken {
                expected: what.to_string(),
                found: token.to_string(),
            }),
            None => Err(Error::UnexpectedEof(what.to_string())),
        }
    }

    fn expect_integer(&mut self, clause: &str) -> Result<i64> {
        let token = self.expect_token(&format!("{} count", clause))?;
        token
            .parse::<i64>()
            .map_err(|_| Error::parse(format!("{} needs a number, got '{}'", clause, token)))
    }

    fn expect_end(&self) -> Result<()> {
        match self.current() {
            None => Ok(()),
            Some(token) => Err(Error::UnexpectedToken {
                expected: "end of statement".to_string(),
                found: token.to_string(),
            }),
        }
    }

    /// Source text after the consumed tokens
    ///
    /// Only valid while every consumed token is a keyword or a plain name,
    /// which tokenize identically before and after normalization.
    fn raw_rest(&self) -> &'a str {
        skip_words(self.source, self.position)
    }
}

/// Split a projection list on commas; whitespace inside an expression is
/// dropped so `COUNT( id )` reads as `COUNT(id)`
fn parse_field_list(text: &str) -> Result<Vec<String>> {
    text.split(',')
        .map(|field| {
            let field: String = field.chars().filter(|c| !c.is_whitespace()).collect();
            if field.is_empty() {
                Err(Error::parse("empty field in projection list"))
            } else {
                Ok(field)
            }
        })
        .collect()
}

/// Parse `col=val[,col=val...]`
fn parse_assignments(text: &str) -> Result<IndexMap<String, String>> {
    let mut assignments = IndexMap::new();
    for pair in text.split(',') {
        let parts: Vec<&str> = pair.split('=').collect();
        let [column, value] = parts.as_slice() else {
            return Err(Error::parse(format!(
                "assignment '{}' must be column=value",
                pair.trim()
            )));
        };
        let column = column.trim();
        if validate_name(column).is_err() {
            return Err(Error::parse(format!(
                "invalid column '{}' in assignment",
                column
            )));
        }
        assignments.insert(column.to_string(), unquote(value.trim()).to_string());
    }
    Ok(assignments)
}

/// Parse a flat `field op value [AND|OR field op value ...]` chain
fn parse_conditions(tokens: &[String], clause: &str) -> Result<Vec<Condition>> {
    if tokens.is_empty() {
        return Err(Error::UnexpectedEof(format!("{} condition", clause)));
    }

    let mut conditions = Vec::new();
    let mut i = 0;
    loop {
        let field = tokens
            .get(i)
            .ok_or_else(|| Error::UnexpectedEof(format!("{} condition", clause)))?;
        let symbol = tokens
            .get(i + 1)
            .ok_or_else(|| Error::UnexpectedEof("comparison operator".to_string()))?;
        let op = if Keyword::Contains.matches(symbol) {
            Operator::Contains
        } else {
            Operator::from_symbol(symbol).ok_or_else(|| Error::UnexpectedToken {
                expected: "comparison operator".to_string(),
                found: symbol.clone(),
            })?
        };
        let (value, next) = read_value(tokens, i + 2)?;
        let mut condition = Condition::new(field.clone(), op, value);

        match tokens.get(next) {
            None => {
                conditions.push(condition);
                return Ok(conditions);
            }
            Some(word) => {
                condition.connector = Some(if Keyword::And.matches(word) {
                    Connector::And
                } else if Keyword::Or.matches(word) {
                    Connector::Or
                } else {
                    return Err(Error::UnexpectedToken {
                        expected: "AND or OR".to_string(),
                        found: word.clone(),
                    });
                });
                conditions.push(condition);
                i = next + 1;
                if i >= tokens.len() {
                    return Err(Error::UnexpectedEof(format!("condition after '{}'", word)));
                }
            }
        }
    }
}

/// Read a condition value starting at `start`; a quoted value may span
/// several tokens. Returns the unquoted value and the next index.
fn read_value(tokens: &[String], start: usize) -> Result<(String, usize)> {
    let first = tokens
        .get(start)
        .ok_or_else(|| Error::UnexpectedEof("condition value".to_string()))?;

    let quote = first.chars().next().filter(|c| *c == '\'' || *c == '"');
    if let Some(quote) = quote {
        if first.len() == 1 || !first.ends_with(quote) {
            let mut parts = vec![first.as_str()];
            let mut end = start + 1;
            loop {
                let token = tokens
                    .get(end)
                    .ok_or_else(|| Error::parse("unterminated quoted value"))?;
                parts.push(token);
                end += 1;
                if token.ends_with(quote) {
                    break;
                }
            }
            let joined = parts.join(" ");
            return Ok((unquote(&joined).to_string(), end));
        }
    }

    Ok((unquote(first).to_string(), start + 1))
}
