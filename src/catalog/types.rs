//! Data types for MaungDB
//!
//! Rows are stored as text; a column's type decides which text is valid and
//! how values compare.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Column data types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer
    Int,
    /// Double-precision floating point
    Float,
    /// Short free text
    String,
    /// Long free text
    Text,
    /// `true` / `false`
    Bool,
    /// `YYYY-MM-DD`
    Date,
    /// Text of at most n characters
    Char(usize),
    /// One of a fixed set of variants
    Enum(Vec<String>),
}

impl DataType {
    /// Build a type from its name and optional parenthesized arguments
    pub fn from_parts(name: &str, args: &[String]) -> Result<Self> {
        let no_args = |ty: DataType| {
            if args.is_empty() {
                Ok(ty)
            } else {
                Err(Error::InvalidColumnDefinition(format!(
                    "type {} takes no arguments",
                    name
                )))
            }
        };

        match name.to_uppercase().as_str() {
            "INT" | "INTEGER" => no_args(DataType::Int),
            "FLOAT" | "DOUBLE" => no_args(DataType::Float),
            "STRING" | "VARCHAR" => no_args(DataType::String),
            "TEXT" => no_args(DataType::Text),
            "BOOL" | "BOOLEAN" => no_args(DataType::Bool),
            "DATE" => no_args(DataType::Date),
            "CHAR" => match args {
                [n] => n
                    .trim()
                    .parse::<usize>()
                    .map(DataType::Char)
                    .map_err(|_| Error::InvalidColumnDefinition(format!("CHAR({})", n))),
                _ => Err(Error::InvalidColumnDefinition(
                    "CHAR needs exactly one length argument".to_string(),
                )),
            },
            "ENUM" => {
                let variants: Vec<String> = args
                    .iter()
                    .map(|v| v.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                if variants.is_empty() {
                    return Err(Error::InvalidColumnDefinition(
                        "ENUM needs at least one variant".to_string(),
                    ));
                }
                Ok(DataType::Enum(variants))
            }
            other => Err(Error::InvalidColumnDefinition(format!(
                "unknown type {}",
                other
            ))),
        }
    }

    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }

    /// Check whether a non-null text value conforms to this type
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            DataType::Int => value.parse::<i64>().is_ok(),
            DataType::Float => value.parse::<f64>().is_ok(),
            DataType::String | DataType::Text => true,
            DataType::Bool => {
                value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
            }
            DataType::Date => is_valid_date(value),
            DataType::Char(n) => value.chars().count() <= *n,
            DataType::Enum(variants) => variants.iter().any(|v| v == value),
        }
    }
}

fn is_valid_date(value: &str) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        return false;
    };
    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return false;
    }
    let (Ok(year), Ok(month), Ok(day)) = (
        year.parse::<u32>(),
        month.parse::<u32>(),
        day.parse::<u32>(),
    ) else {
        return false;
    };

    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let max_day = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => return false,
    };
    (1..=max_day).contains(&day)
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::String => write!(f, "STRING"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Bool => write!(f, "BOOL"),
            DataType::Date => write!(f, "DATE"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
            DataType::Enum(variants) => write!(f, "ENUM({})", variants.join(",")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts() {
        assert_eq!(DataType::from_parts("int", &[]).unwrap(), DataType::Int);
        assert_eq!(
            DataType::from_parts("CHAR", &["3".to_string()]).unwrap(),
            DataType::Char(3)
        );
        assert_eq!(
            DataType::from_parts("ENUM", &["a".to_string(), " b".to_string()]).unwrap(),
            DataType::Enum(vec!["a".to_string(), "b".to_string()])
        );
        assert!(DataType::from_parts("INT", &["4".to_string()]).is_err());
        assert!(DataType::from_parts("BLOB", &[]).is_err());
    }

    #[test]
    fn test_accepts() {
        assert!(DataType::Int.accepts("-42"));
        assert!(!DataType::Int.accepts("4.2"));
        assert!(DataType::Float.accepts("9000000"));
        assert!(DataType::Bool.accepts("TRUE"));
        assert!(!DataType::Bool.accepts("yes"));
        assert!(DataType::Char(3).accepts("abc"));
        assert!(!DataType::Char(3).accepts("abcd"));
        assert!(DataType::Enum(vec!["L".into(), "P".into()]).accepts("P"));
        assert!(!DataType::Enum(vec!["L".into(), "P".into()]).accepts("X"));
    }

    #[test]
    fn test_dates() {
        assert!(DataType::Date.accepts("2024-02-29"));
        assert!(!DataType::Date.accepts("2023-02-29"));
        assert!(!DataType::Date.accepts("2023-13-01"));
        assert!(!DataType::Date.accepts("2023-1-01"));
        assert!(!DataType::Date.accepts("kamari"));
    }
}
