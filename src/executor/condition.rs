//! Condition evaluation
//!
//! WHERE and HAVING chains are flat. Each condition is tested on its own and
//! the results are folded left to right, using the connector written after
//! the previous condition. There is no precedence: `a OR b AND c` is
//! `(a OR b) AND c`.

use std::cmp::Ordering;

use crate::catalog::{DataType, TableSchema};
use crate::error::Result;
use crate::query::{Condition, Connector, Operator};
use crate::storage::{compare_loose, Value};

/// Fold a condition chain, testing each condition with `test`
///
/// An empty chain matches everything.
pub fn evaluate_chain(
    conditions: &[Condition],
    mut test: impl FnMut(&Condition) -> Result<bool>,
) -> Result<bool> {
    let Some(first) = conditions.first() else {
        return Ok(true);
    };

    let mut acc = test(first)?;
    for pair in conditions.windows(2) {
        let result = test(&pair[1])?;
        acc = match pair[0].connector {
            Some(Connector::Or) => acc || result,
            _ => acc && result,
        };
    }
    Ok(acc)
}

/// Compare a stored field against a literal using the column type
///
/// Numeric comparisons against text that does not parse are false, as are
/// ordering comparisons on BOOL columns.
pub fn compare_typed(raw: &str, data_type: &DataType, op: Operator, literal: &str) -> bool {
    if op == Operator::Contains {
        return contains(raw, literal);
    }
    if *data_type == DataType::Bool && !matches!(op, Operator::Eq | Operator::Neq) {
        return false;
    }

    let left = Value::from_field(raw, data_type);
    let right = Value::from_field(literal, data_type);
    match left.compare(&right) {
        Some(ordering) => holds(op, ordering),
        None => false,
    }
}

/// Compare two rendered values numerically when both parse, else as text
pub fn compare_rendered(value: &str, op: Operator, literal: &str) -> bool {
    if op == Operator::Contains {
        return contains(value, literal);
    }
    holds(op, compare_loose(value, literal))
}

/// Test one condition against a raw row of `schema`
///
/// The field may be bare or qualified with the table name. An unknown field
/// never matches.
pub fn row_matches(schema: &TableSchema, fields: &[String], conditions: &[Condition]) -> Result<bool> {
    evaluate_chain(conditions, |condition| {
        let name = condition
            .field
            .strip_prefix(&schema.name)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(&condition.field);

        Ok(match schema.column_index(name) {
            Some(idx) => fields.get(idx).map_or(false, |raw| {
                compare_typed(
                    raw,
                    &schema.columns[idx].data_type,
                    condition.op,
                    &condition.value,
                )
            }),
            None => false,
        })
    })
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn holds(op: Operator, ordering: Ordering) -> bool {
    match op {
        Operator::Eq => ordering == Ordering::Equal,
        Operator::Neq => ordering != Ordering::Equal,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Gte => ordering != Ordering::Less,
        Operator::Lte => ordering != Ordering::Greater,
        Operator::Contains => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, Permissions};

    fn chain(parts: &[(bool, Option<Connector>)]) -> Vec<(Condition, bool)> {
        parts
            .iter()
            .enumerate()
            .map(|(i, (result, connector))| {
                let mut condition = Condition::new(format!("c{}", i), Operator::Eq, "x");
                condition.connector = *connector;
                (condition, *result)
            })
            .collect()
    }

    fn fold(parts: &[(bool, Option<Connector>)]) -> bool {
        let pairs = chain(parts);
        let conditions: Vec<Condition> = pairs.iter().map(|(c, _)| c.clone()).collect();
        evaluate_chain(&conditions, |c| {
            Ok(pairs.iter().find(|(p, _)| p.field == c.field).unwrap().1)
        })
        .unwrap()
    }

    #[test]
    fn test_left_to_right_fold() {
        // (true OR false) AND false
        assert!(!fold(&[
            (true, Some(Connector::Or)),
            (false, Some(Connector::And)),
            (false, None),
        ]));
        // (false AND true) OR true
        assert!(fold(&[
            (false, Some(Connector::And)),
            (true, Some(Connector::Or)),
            (true, None),
        ]));
        assert!(fold(&[]));
    }

    #[test]
    fn test_typed_comparison() {
        assert!(compare_typed("9000000", &DataType::Float, Operator::Gt, "5000000"));
        assert!(compare_typed("10", &DataType::Int, Operator::Gt, "9"));
        // Text compares lexicographically
        assert!(!compare_typed("10", &DataType::String, Operator::Gt, "9"));
        assert!(!compare_typed("abc", &DataType::Int, Operator::Neq, "1"));
        assert!(compare_typed("TRUE", &DataType::Bool, Operator::Eq, "true"));
        assert!(!compare_typed("true", &DataType::Bool, Operator::Gt, "false"));
        assert!(compare_typed("Asep Sunandar", &DataType::Date, Operator::Contains, "SUN"));
        assert!(compare_typed("NULL", &DataType::Int, Operator::Eq, "NULL"));
    }

    #[test]
    fn test_rendered_comparison() {
        assert!(compare_rendered("3", Operator::Gt, "1"));
        assert!(compare_rendered("10", Operator::Gt, "9"));
        assert!(compare_rendered("bandung", Operator::Lte, "bandung"));
    }

    #[test]
    fn test_row_matches() {
        let schema = TableSchema::new(
            "kantor",
            "pegawai",
            vec![
                Column::new("id", DataType::Int).primary_key(true),
                Column::new("gaji", DataType::Float),
            ],
            Permissions::default(),
        );
        let row = vec!["1".to_string(), "9000000".to_string()];

        let where_clause = vec![Condition::new("pegawai.gaji", Operator::Gte, "9000000")];
        assert!(row_matches(&schema, &row, &where_clause).unwrap());

        let where_clause = vec![Condition::new("umur", Operator::Eq, "1")];
        assert!(!row_matches(&schema, &row, &where_clause).unwrap());
    }
}
