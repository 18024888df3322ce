//! Aggregate functions
//!
//! A projected field written as `FUNC(arg)` is an aggregate. Aggregates are
//! computed over a bucket of rows: one bucket per GROUP BY value, or the
//! whole filtered set when there is no GROUP BY.

use super::select::Relation;
use crate::catalog::{is_null, NULL_TEXT};
use crate::error::{Error, Result};
use crate::storage::{compare_loose, format_number};

/// Supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            _ => None,
        }
    }
}

/// An aggregate call such as `COUNT(id)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    /// Column reference, or `*` for COUNT
    pub argument: String,
}

impl Aggregate {
    /// Recognize an aggregate expression; plain columns give `Ok(None)`
    pub fn parse(expr: &str) -> Result<Option<Self>> {
        let Some(open) = expr.find('(') else {
            return Ok(None);
        };
        if !expr.ends_with(')') {
            return Ok(None);
        }

        let name = expr[..open].trim();
        let argument = expr[open + 1..expr.len() - 1].trim();
        let function = AggregateFunction::from_name(name).ok_or_else(|| {
            Error::ExecutionError(format!("unknown aggregate function '{}'", name))
        })?;
        if argument.is_empty() {
            return Err(Error::ExecutionError(format!(
                "aggregate '{}' needs an argument",
                expr
            )));
        }
        if argument == "*" && function != AggregateFunction::Count {
            return Err(Error::ExecutionError(format!(
                "only COUNT accepts '*', got '{}'",
                expr
            )));
        }

        Ok(Some(Self {
            function,
            argument: argument.to_string(),
        }))
    }

    /// Compute the aggregate over `rows` of `relation`
    pub fn compute(&self, relation: &Relation, rows: &[&Vec<String>]) -> Result<String> {
        if self.argument == "*" {
            return Ok(rows.len().to_string());
        }

        let idx = relation.require(&self.argument)?;
        let values: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.get(idx))
            .map(String::as_str)
            .filter(|value| !is_null(value))
            .collect();
        let numbers: Vec<f64> = values.iter().filter_map(|v| v.parse().ok()).collect();

        let result = match self.function {
            AggregateFunction::Count => values.len().to_string(),
            AggregateFunction::Sum => format_number(numbers.iter().sum()),
            AggregateFunction::Avg => {
                if numbers.is_empty() {
                    NULL_TEXT.to_string()
                } else {
                    format_number(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
            AggregateFunction::Min => values
                .iter()
                .copied()
                .min_by(|a, b| compare_loose(a, b))
                .unwrap_or(NULL_TEXT)
                .to_string(),
            AggregateFunction::Max => values
                .iter()
                .copied()
                .max_by(|a, b| compare_loose(a, b))
                .unwrap_or(NULL_TEXT)
                .to_string(),
        };
        Ok(result)
    }
}
