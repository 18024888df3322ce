//! SELECT execution
//!
//! The source table or view is loaded into a [`Relation`], joined with
//! nested loops, filtered by the WHERE chain, projected (with grouping and
//! aggregation), sorted and finally sliced by OFFSET and LIMIT.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::aggregate::Aggregate;
use super::condition::{compare_rendered, compare_typed, evaluate_chain};
use super::executor::{ExecutionResult, Executor};
use crate::auth::{Identity, Role};
use crate::catalog::{is_null, Access, DataType, TableSchema, NULL_TEXT};
use crate::error::{Error, Result};
use crate::index::IndexKind;
use crate::query::{parse, Command, Condition, JoinClause, JoinKind, Operator, SelectCommand};
use crate::storage::{compare_loose, row_id, split_row};

/// Rows with a header, the unit every SELECT stage works on
#[derive(Debug, Clone)]
pub struct Relation {
    /// Source name used in error messages
    pub name: String,
    /// Header shown to the caller
    pub columns: Vec<String>,
    /// `source.column` for every column
    pub qualified: Vec<String>,
    /// Column types used for typed comparison
    pub types: Vec<DataType>,
    /// Rows, each exactly as wide as the header
    pub rows: Vec<Vec<String>>,
}

impl Relation {
    /// Load raw table rows under the table's schema
    pub fn from_table(schema: &TableSchema, raw_rows: Vec<String>) -> Self {
        let columns = schema.field_names();
        let width = columns.len();
        Self {
            name: schema.name.clone(),
            qualified: columns
                .iter()
                .map(|c| format!("{}.{}", schema.name, c))
                .collect(),
            columns,
            types: schema.columns.iter().map(|c| c.data_type.clone()).collect(),
            rows: raw_rows
                .iter()
                .map(|raw| {
                    let mut fields = split_row(raw);
                    fields.resize(width, String::new());
                    fields
                })
                .collect(),
        }
    }

    /// Wrap a view's result; every column is STRING typed
    pub fn from_view(name: &str, result: ExecutionResult) -> Self {
        let width = result.columns.len();
        Self {
            name: name.to_string(),
            qualified: result
                .columns
                .iter()
                .map(|c| format!("{}.{}", name, c))
                .collect(),
            types: vec![DataType::String; width],
            columns: result.columns,
            rows: result
                .rows
                .into_iter()
                .map(|mut row| {
                    row.resize(width, String::new());
                    row
                })
                .collect(),
        }
    }

    /// Find a column by header name, qualified name, or bare name
    ///
    /// A bare name resolves to the first column ending in `.<name>`.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        if let Some(idx) = self.columns.iter().position(|c| c == name) {
            return Some(idx);
        }
        if let Some(idx) = self.qualified.iter().position(|c| c == name) {
            return Some(idx);
        }
        if name.contains('.') {
            return None;
        }
        let suffix = format!(".{}", name);
        self.qualified.iter().position(|c| c.ends_with(&suffix))
    }

    /// Like [`Relation::resolve`] but fails with `ColumnNotFound`
    pub fn require(&self, name: &str) -> Result<usize> {
        self.resolve(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string(), self.name.clone()))
    }

    /// Test one condition against a row; unknown columns never match
    fn test(&self, row: &[String], condition: &Condition) -> bool {
        match self.resolve(&condition.field) {
            Some(idx) => compare_typed(
                &row[idx],
                &self.types[idx],
                condition.op,
                &condition.value,
            ),
            None => false,
        }
    }

    /// Nested-loop join with `right`; the result header is fully qualified
    pub fn join(self, right: Relation, clause: &JoinClause) -> Result<Relation> {
        let (left_idx, right_idx) = match (self.resolve(&clause.left), right.resolve(&clause.right)) {
            (Some(l), Some(r)) => (l, r),
            // ON written with the sides swapped
            _ => match (self.resolve(&clause.right), right.resolve(&clause.left)) {
                (Some(l), Some(r)) => (l, r),
                _ => {
                    return Err(match self.resolve(&clause.left) {
                        None => Error::ColumnNotFound(clause.left.clone(), self.name.clone()),
                        Some(_) => Error::ColumnNotFound(clause.right.clone(), right.name.clone()),
                    })
                }
            },
        };

        let left_width = self.qualified.len();
        let right_width = right.qualified.len();
        let keep_left = matches!(clause.kind, JoinKind::Left | JoinKind::Full);
        let keep_right = matches!(clause.kind, JoinKind::Right | JoinKind::Full);

        let mut rows = Vec::new();
        let mut right_matched = vec![false; right.rows.len()];
        for left_row in &self.rows {
            let mut matched = false;
            for (j, right_row) in right.rows.iter().enumerate() {
                if join_keys_equal(&left_row[left_idx], &right_row[right_idx]) {
                    matched = true;
                    right_matched[j] = true;
                    rows.push(concat(left_row, right_row));
                }
            }
            if !matched && keep_left {
                rows.push(concat(left_row, &null_row(right_width)));
            }
        }
        if keep_right {
            for (right_row, matched) in right.rows.iter().zip(&right_matched) {
                if !matched {
                    rows.push(concat(&null_row(left_width), right_row));
                }
            }
        }

        let mut qualified = self.qualified;
        qualified.extend(right.qualified);
        let mut types = self.types;
        types.extend(right.types);

        Ok(Relation {
            name: self.name,
            columns: qualified.clone(),
            qualified,
            types,
            rows,
        })
    }
}

fn join_keys_equal(left: &str, right: &str) -> bool {
    !is_null(left) && !is_null(right) && left == right
}

fn concat(left: &[String], right: &[String]) -> Vec<String> {
    let mut row = Vec::with_capacity(left.len() + right.len());
    row.extend_from_slice(left);
    row.extend_from_slice(right);
    row
}

fn null_row(width: usize) -> Vec<String> {
    vec![NULL_TEXT.to_string(); width]
}

impl Executor {
    pub(super) fn execute_select(
        &self,
        identity: &Identity,
        database: &str,
        cmd: SelectCommand,
        depth: usize,
    ) -> Result<ExecutionResult> {
        let shortcut = match cmd.where_clause.as_slice() {
            [condition] if cmd.joins.is_empty() && condition.op == Operator::Eq => Some(condition),
            _ => None,
        };

        let mut relation = self.load_source(identity, database, &cmd.table, shortcut, depth)?;
        for clause in &cmd.joins {
            let right = self.load_source(identity, database, &clause.table, None, depth)?;
            relation = relation.join(right, clause)?;
        }

        let rows = std::mem::take(&mut relation.rows);
        for row in rows {
            if evaluate_chain(&cmd.where_clause, |c| Ok(relation.test(&row, c)))? {
                relation.rows.push(row);
            }
        }

        let (columns, mut rows) = project(&relation, &cmd)?;

        if let Some(order) = &cmd.order_by {
            let idx = resolve_header(&columns, &order.column)
                .ok_or_else(|| Error::ColumnNotFound(order.column.clone(), cmd.table.clone()))?;
            rows.sort_by(|a, b| {
                let ordering = compare_loose(&a[idx], &b[idx]);
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        Ok(ExecutionResult::with_rows(
            columns,
            paginate(rows, cmd.limit, cmd.offset),
        ))
    }

    /// Load a table or view as a relation
    fn load_source(
        &self,
        identity: &Identity,
        database: &str,
        name: &str,
        shortcut: Option<&Condition>,
        depth: usize,
    ) -> Result<Relation> {
        if self.schemas.exists(database, name) {
            let schema = self.schemas.load(database, name)?;
            schema.require(identity.role, Access::Read)?;

            let rows = self.storage.read_all(database, name)?;
            let rows = match shortcut.and_then(|c| self.index_candidates(database, &schema, c)) {
                Some(ids) => rows
                    .into_iter()
                    .filter(|row| ids.contains(row_id(row)))
                    .collect(),
                None => rows,
            };
            return Ok(Relation::from_table(&schema, rows));
        }

        if self.views.is_view(database, name) {
            identity.require_role(Role::User)?;
            let query = self.views.load(database, name)?;
            let Command::Select(select) = parse(&query)? else {
                return Err(Error::ExecutionError(format!(
                    "view '{}' does not hold a SELECT query",
                    name
                )));
            };
            let result = self.execute_as(identity, Command::Select(select), depth + 1)?;
            return Ok(Relation::from_view(name, result));
        }

        Err(Error::TableNotFound(name.to_string()))
    }

    /// Primary keys an equality condition can be narrowed to through a hash
    /// index, if one applies
    ///
    /// Only text-compared columns qualify: their typed equality is exact
    /// string equality, so the narrowed scan returns the same rows.
    fn index_candidates(
        &self,
        database: &str,
        schema: &TableSchema,
        condition: &Condition,
    ) -> Option<HashSet<String>> {
        let column = condition
            .field
            .strip_prefix(&schema.name)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(&condition.field);
        let data_type = &schema.column(column)?.data_type;
        if data_type.is_numeric() || *data_type == DataType::Bool || is_null(&condition.value) {
            return None;
        }
        if !self
            .indexes
            .exists(database, &schema.name, column, IndexKind::Hash)
        {
            return None;
        }

        match self
            .indexes
            .lookup(database, &schema.name, column, &condition.value)
        {
            Ok(ids) => {
                debug!(table = %schema.name, column, candidates = ids.len(), "using hash index");
                Some(ids.into_iter().collect())
            }
            Err(e) => {
                warn!(table = %schema.name, column, error = %e, "index lookup failed, scanning");
                None
            }
        }
    }
}

/// Project filtered rows, grouping and aggregating when asked to
fn project(relation: &Relation, cmd: &SelectCommand) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let fields = if cmd.is_wildcard() {
        relation.columns.clone()
    } else {
        cmd.fields.clone()
    };
    let aggregates = fields
        .iter()
        .map(|field| Aggregate::parse(field))
        .collect::<Result<Vec<_>>>()?;

    if let Some(group_by) = &cmd.group_by {
        let group_idx = relation.require(group_by)?;
        let mut buckets: IndexMap<&str, Vec<&Vec<String>>> = IndexMap::new();
        for row in &relation.rows {
            let value = row[group_idx].as_str();
            let key = if is_null(value) { NULL_TEXT } else { value };
            buckets.entry(key).or_default().push(row);
        }

        let mut rows = Vec::new();
        for bucket in buckets.values() {
            if having_holds(relation, bucket, &cmd.having)? {
                rows.push(project_bucket(relation, &fields, &aggregates, bucket)?);
            }
        }
        return Ok((fields, rows));
    }

    if aggregates.iter().any(Option::is_some) {
        let bucket: Vec<&Vec<String>> = relation.rows.iter().collect();
        let rows = if having_holds(relation, &bucket, &cmd.having)? {
            vec![project_bucket(relation, &fields, &aggregates, &bucket)?]
        } else {
            Vec::new()
        };
        return Ok((fields, rows));
    }

    if !cmd.having.is_empty() {
        return Err(Error::ExecutionError(
            "HAVING needs GROUP BY or an aggregate field".to_string(),
        ));
    }

    let indices = fields
        .iter()
        .map(|field| relation.require(field))
        .collect::<Result<Vec<_>>>()?;
    let rows = relation
        .rows
        .iter()
        .map(|row| indices.iter().map(|&idx| row[idx].clone()).collect())
        .collect();
    Ok((fields, rows))
}

/// One output row for a bucket; plain columns take the first row's value
fn project_bucket(
    relation: &Relation,
    fields: &[String],
    aggregates: &[Option<Aggregate>],
    bucket: &[&Vec<String>],
) -> Result<Vec<String>> {
    fields
        .iter()
        .zip(aggregates)
        .map(|(field, aggregate)| match aggregate {
            Some(aggregate) => aggregate.compute(relation, bucket),
            None => {
                let idx = relation.require(field)?;
                Ok(bucket
                    .first()
                    .map(|row| row[idx].clone())
                    .unwrap_or_else(|| NULL_TEXT.to_string()))
            }
        })
        .collect()
}

fn having_holds(relation: &Relation, bucket: &[&Vec<String>], having: &[Condition]) -> Result<bool> {
    evaluate_chain(having, |condition| match Aggregate::parse(&condition.field)? {
        Some(aggregate) => {
            let value = aggregate.compute(relation, bucket)?;
            Ok(compare_rendered(&value, condition.op, &condition.value))
        }
        None => Ok(bucket
            .first()
            .map_or(false, |row| relation.test(row, condition))),
    })
}

/// Find an output column by exact name, then by `.<name>` suffix
fn resolve_header(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| c == name).or_else(|| {
        let suffix = format!(".{}", name);
        columns.iter().position(|c| c.ends_with(&suffix))
    })
}

/// Apply OFFSET then LIMIT; a non-positive limit keeps everything
fn paginate(rows: Vec<Vec<String>>, limit: i64, offset: i64) -> Vec<Vec<String>> {
    let skip = usize::try_from(offset).unwrap_or(0);
    let take = if limit > 0 {
        usize::try_from(limit).unwrap_or(usize::MAX)
    } else {
        usize::MAX
    };
    rows.into_iter().skip(skip).take(take).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(name: &str, columns: &[&str], rows: &[&[&str]]) -> Relation {
        Relation {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            qualified: columns.iter().map(|c| format!("{}.{}", name, c)).collect(),
            types: vec![DataType::String; columns.len()],
            rows: rows
                .iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }

    fn join_clause(kind: JoinKind) -> JoinClause {
        JoinClause {
            kind,
            table: "b".to_string(),
            left: "a.id".to_string(),
            right: "b.aid".to_string(),
        }
    }

    #[test]
    fn test_resolve() {
        let rel = relation("pegawai", &["id", "nama"], &[]);
        assert_eq!(rel.resolve("nama"), Some(1));
        assert_eq!(rel.resolve("pegawai.nama"), Some(1));
        assert_eq!(rel.resolve("divisi.nama"), None);
        assert!(matches!(rel.require("gaji"), Err(Error::ColumnNotFound(_, _))));
    }

    #[test]
    fn test_inner_join() {
        let a = relation("a", &["id", "x"], &[&["1", "p"], &["2", "q"]]);
        let b = relation("b", &["aid", "y"], &[&["2", "r"], &["2", "s"], &["3", "t"]]);
        let joined = a.join(b, &join_clause(JoinKind::Inner)).unwrap();

        assert_eq!(joined.columns, vec!["a.id", "a.x", "b.aid", "b.y"]);
        assert_eq!(joined.rows.len(), 2);
        assert_eq!(joined.rows[0], vec!["2", "q", "2", "r"]);
        assert_eq!(joined.rows[1], vec!["2", "q", "2", "s"]);
    }

    #[test]
    fn test_outer_joins() {
        let a = || relation("a", &["id"], &[&["1"], &["2"]]);
        let b = || relation("b", &["aid"], &[&["2"], &["3"]]);

        let left = a().join(b(), &join_clause(JoinKind::Left)).unwrap();
        assert_eq!(left.rows, vec![vec!["1", "NULL"], vec!["2", "2"]]);

        let right = a().join(b(), &join_clause(JoinKind::Right)).unwrap();
        assert_eq!(right.rows, vec![vec!["2", "2"], vec!["NULL", "3"]]);

        let full = a().join(b(), &join_clause(JoinKind::Full)).unwrap();
        assert_eq!(full.rows.len(), 3);
    }

    #[test]
    fn test_join_swapped_and_unknown() {
        let a = relation("a", &["id"], &[&["1"]]);
        let b = relation("b", &["aid"], &[&["1"]]);
        let mut clause = join_clause(JoinKind::Inner);
        std::mem::swap(&mut clause.left, &mut clause.right);
        assert_eq!(a.join(b, &clause).unwrap().rows.len(), 1);

        let a = relation("a", &["id"], &[&["1"]]);
        let b = relation("b", &["aid"], &[&["1"]]);
        clause.right = "a.nope".to_string();
        assert!(matches!(a.join(b, &clause), Err(Error::ColumnNotFound(_, _))));
    }

    #[test]
    fn test_project_group_by() {
        let rel = relation(
            "sales",
            &["id", "region"],
            &[&["1", "west"], &["2", "east"], &["3", "west"], &["4", ""]],
        );
        let mut cmd = SelectCommand::all("sales");
        cmd.fields = vec!["region".to_string(), "COUNT(id)".to_string()];
        cmd.group_by = Some("region".to_string());

        let (columns, rows) = project(&rel, &cmd).unwrap();
        assert_eq!(columns, vec!["region", "COUNT(id)"]);
        assert_eq!(
            rows,
            vec![vec!["west", "2"], vec!["east", "1"], vec!["", "1"]]
        );

        cmd.having = vec![Condition::new("COUNT(id)", Operator::Gt, "1")];
        let (_, rows) = project(&rel, &cmd).unwrap();
        assert_eq!(rows, vec![vec!["west", "2"]]);
    }

    #[test]
    fn test_project_aggregate_without_group() {
        let rel = relation("t", &["id"], &[&["1"], &["2"]]);
        let mut cmd = SelectCommand::all("t");
        cmd.fields = vec!["COUNT(*)".to_string()];
        assert_eq!(project(&rel, &cmd).unwrap().1, vec![vec!["2"]]);

        let mut cmd = SelectCommand::all("t");
        cmd.having = vec![Condition::new("id", Operator::Eq, "1")];
        assert!(matches!(project(&rel, &cmd), Err(Error::ExecutionError(_))));
    }

    #[test]
    fn test_paginate() {
        let rows: Vec<Vec<String>> = (0..5).map(|i| vec![i.to_string()]).collect();
        assert_eq!(paginate(rows.clone(), 2, 1), rows[1..3].to_vec());
        assert_eq!(paginate(rows.clone(), -1, 0), rows);
        assert_eq!(paginate(rows.clone(), 0, 3), rows[3..].to_vec());
        assert!(paginate(rows.clone(), 10, 99).is_empty());
        assert_eq!(paginate(rows.clone(), 2, -4), rows[..2].to_vec());
    }
}
