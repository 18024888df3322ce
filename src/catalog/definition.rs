//! Column definition parsing
//!
//! `CREATE` carries its columns as raw text: a comma-separated list of
//! `name:TYPE(args):constraint...` items. Commas inside a type's argument
//! list belong to that type, so the list is split by paren depth first and
//! each item is then parsed with nom.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, opt, recognize, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use super::schema::Column;
use super::types::DataType;
use crate::error::{Error, Result};

/// Split on commas that are not nested inside parentheses
pub fn split_columns(input: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;

    for ch in input.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() {
        fields.push(current.trim().to_string());
    }

    fields
}

#[derive(Debug, Clone, PartialEq)]
enum Constraint {
    PrimaryKey,
    Unique,
    NotNull,
    ForeignKey(String, String),
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn type_args(input: &str) -> IResult<&str, Vec<String>> {
    delimited(
        char('('),
        separated_list0(
            char(','),
            map(take_while(|c| c != ',' && c != ')'), |s: &str| {
                s.trim().to_string()
            }),
        ),
        char(')'),
    )(input)
}

fn reference(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(identifier, char('.'), identifier)(input)
}

fn foreign_key(input: &str) -> IResult<&str, (&str, &str)> {
    alt((
        delimited(pair(tag_no_case("FK"), char('(')), reference, char(')')),
        preceded(
            tuple((
                tag_no_case("FOREIGN"),
                multispace1,
                tag_no_case("KEY"),
                multispace1,
            )),
            reference,
        ),
        preceded(pair(tag_no_case("REF"), multispace1), reference),
    ))(input)
}

fn constraint(input: &str) -> IResult<&str, Constraint> {
    alt((
        value(
            Constraint::PrimaryKey,
            alt((
                tag_no_case("PRIMARY_KEY"),
                recognize(tuple((
                    tag_no_case("PRIMARY"),
                    multispace1,
                    tag_no_case("KEY"),
                ))),
                tag_no_case("PK"),
            )),
        ),
        value(Constraint::Unique, tag_no_case("UNIQUE")),
        value(
            Constraint::NotNull,
            alt((
                tag_no_case("NOT_NULL"),
                recognize(tuple((
                    tag_no_case("NOT"),
                    multispace1,
                    tag_no_case("NULL"),
                ))),
            )),
        ),
        map(foreign_key, |(table, column)| {
            Constraint::ForeignKey(table.to_string(), column.to_string())
        }),
    ))(input)
}

type RawColumn<'a> = (&'a str, &'a str, Option<Vec<String>>, Vec<Constraint>);

fn column_def(input: &str) -> IResult<&str, RawColumn<'_>> {
    all_consuming(terminated(
        tuple((
            delimited(multispace0, identifier, multispace0),
            preceded(pair(char(':'), multispace0), identifier),
            opt(type_args),
            many0(preceded(
                tuple((multispace0, char(':'), multispace0)),
                constraint,
            )),
        )),
        multispace0,
    ))(input)
}

/// Parse a single `name:TYPE(args):constraint...` item
pub fn parse_column(definition: &str) -> Result<Column> {
    let (_, (name, type_name, args, constraints)) = column_def(definition)
        .map_err(|_| Error::InvalidColumnDefinition(definition.to_string()))?;

    let data_type = DataType::from_parts(type_name, &args.unwrap_or_default())?;
    let mut column = Column::new(name, data_type);
    for constraint in constraints {
        column = match constraint {
            Constraint::PrimaryKey => column.primary_key(true),
            Constraint::Unique => column.unique(true),
            Constraint::NotNull => column.not_null(true),
            Constraint::ForeignKey(table, col) => column.references(table, col),
        };
    }
    Ok(column)
}

/// Parse the full column list of a CREATE statement
pub fn parse_columns(definition: &str) -> Result<Vec<Column>> {
    let items = split_columns(definition);
    if items.is_empty() {
        return Err(Error::InvalidColumnDefinition(definition.to_string()));
    }

    let mut columns: Vec<Column> = Vec::with_capacity(items.len());
    for item in &items {
        let column = parse_column(item)?;
        if columns.iter().any(|c| c.name == column.name) {
            return Err(Error::InvalidColumnDefinition(format!(
                "duplicate column '{}'",
                column.name
            )));
        }
        columns.push(column);
    }
    Ok(columns)
}
