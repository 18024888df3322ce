//! Value type for MaungDB
//!
//! Rows stay as text on disk. At the comparison boundary a field is lifted
//! into a [`Value`] using its column type so numeric columns compare as
//! numbers and everything else compares as text.

use crate::catalog::{is_null, DataType};
use std::cmp::Ordering;
use std::fmt;

/// A typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value (64-bit)
    Integer(i64),
    /// Float value (64-bit)
    Float(f64),
    /// Text value, also used for numeric text that failed to parse
    Text(String),
}

impl Value {
    /// Lift a raw field using the column's type
    pub fn from_field(raw: &str, data_type: &DataType) -> Value {
        if is_null(raw) {
            return Value::Null;
        }
        match data_type {
            DataType::Int => raw
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            DataType::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            DataType::Bool => match raw.to_lowercase().as_str() {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                _ => Value::Text(raw.to_string()),
            },
            _ => Value::Text(raw.to_string()),
        }
    }

    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Compare two values of the same kind
    ///
    /// Values of different kinds are incomparable, so a typed comparison
    /// against unparseable text yields `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", format_number(*x)),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Compare two raw fields numerically when both parse, else as text
pub fn compare_loose(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Render a number, dropping the fractional part of whole values
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
