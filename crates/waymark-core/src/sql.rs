//! Rendering of the generic statement primitives into SQL text plus
//! positional parameters.
//!
//! Identifiers passed by callers are always quoted; values are always bound
//! as parameters, never spliced into the statement text.

use crate::value::{Predicate, Value};

/// A rendered statement and the values to bind to its `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
  pub sql:    String,
  pub params: Vec<Value>,
}

/// Quote an identifier (`"name"`), doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal (`'value'`), doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
  format!("'{}'", value.replace('\'', "''"))
}

fn render_predicate(predicate: &Predicate, params: &mut Vec<Value>) -> String {
  match predicate {
    Predicate::Eq { column, value } => {
      params.push(value.clone());
      format!("{} = ?", quote_ident(column))
    }
    Predicate::IsNull { column } => format!("{} IS NULL", quote_ident(column)),
    Predicate::And(all) if all.is_empty() => "1".to_owned(),
    Predicate::And(all) => all
      .iter()
      .map(|p| format!("({})", render_predicate(p, params)))
      .collect::<Vec<_>>()
      .join(" AND "),
  }
}

fn where_clause(filter: Option<&Predicate>, params: &mut Vec<Value>) -> String {
  filter
    .map(|p| format!(" WHERE {}", render_predicate(p, params)))
    .unwrap_or_default()
}

pub fn insert(table: &str, values: &[(&str, Value)]) -> Statement {
  let columns = values
    .iter()
    .map(|(c, _)| quote_ident(c))
    .collect::<Vec<_>>()
    .join(", ");
  let placeholders = vec!["?"; values.len()].join(", ");
  Statement {
    sql:    format!(
      "INSERT INTO {} ({columns}) VALUES ({placeholders})",
      quote_ident(table)
    ),
    params: values.iter().map(|(_, v)| v.clone()).collect(),
  }
}

pub fn update(
  table: &str,
  values: &[(&str, Value)],
  filter: Option<&Predicate>,
) -> Statement {
  let mut params: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();
  let assignments = values
    .iter()
    .map(|(c, _)| format!("{} = ?", quote_ident(c)))
    .collect::<Vec<_>>()
    .join(", ");
  let filter = where_clause(filter, &mut params);
  Statement {
    sql: format!("UPDATE {} SET {assignments}{filter}", quote_ident(table)),
    params,
  }
}

pub fn delete(table: &str, filter: Option<&Predicate>) -> Statement {
  let mut params = Vec::new();
  let filter = where_clause(filter, &mut params);
  Statement {
    sql: format!("DELETE FROM {}{filter}", quote_ident(table)),
    params,
  }
}

/// `SELECT` the given columns (all columns when empty).
pub fn select(
  table: &str,
  columns: &[&str],
  filter: Option<&Predicate>,
) -> Statement {
  let mut params = Vec::new();
  let projection = if columns.is_empty() {
    "*".to_owned()
  } else {
    columns
      .iter()
      .map(|c| quote_ident(c))
      .collect::<Vec<_>>()
      .join(", ")
  };
  let filter = where_clause(filter, &mut params);
  Statement {
    sql: format!("SELECT {projection} FROM {}{filter}", quote_ident(table)),
    params,
  }
}

pub fn count(table: &str, filter: Option<&Predicate>) -> Statement {
  let mut params = Vec::new();
  let filter = where_clause(filter, &mut params);
  Statement {
    sql: format!("SELECT COUNT(*) FROM {}{filter}", quote_ident(table)),
    params,
  }
}
