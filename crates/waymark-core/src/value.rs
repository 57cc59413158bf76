//! Owned column values and row predicates for the generic statement
//! primitives.

use serde::{Deserialize, Serialize};

/// A single SQLite storage-class value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
  Blob(Vec<u8>),
}

impl Value {
  pub fn as_text(&self) -> Option<&str> {
    match self {
      Value::Text(s) => Some(s),
      _ => None,
    }
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self { Value::Integer(v) }
}

impl From<i32> for Value {
  fn from(v: i32) -> Self { Value::Integer(v.into()) }
}

impl From<bool> for Value {
  fn from(v: bool) -> Self { Value::Integer(v.into()) }
}

impl From<f64> for Value {
  fn from(v: f64) -> Self { Value::Real(v) }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self { Value::Text(v.to_owned()) }
}

impl From<String> for Value {
  fn from(v: String) -> Self { Value::Text(v) }
}

impl From<Vec<u8>> for Value {
  fn from(v: Vec<u8>) -> Self { Value::Blob(v) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self { v.map_or(Value::Null, Into::into) }
}

/// A row filter, rendered to a parameterised `WHERE` clause by
/// [`crate::sql`].
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
  Eq { column: String, value: Value },
  IsNull { column: String },
  And(Vec<Predicate>),
}

impl Predicate {
  pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
    Predicate::Eq {
      column: column.into(),
      value:  value.into(),
    }
  }

  pub fn is_null(column: impl Into<String>) -> Self {
    Predicate::IsNull {
      column: column.into(),
    }
  }

  pub fn and(self, other: Predicate) -> Self {
    match self {
      Predicate::And(mut all) => {
        all.push(other);
        Predicate::And(all)
      }
      first => Predicate::And(vec![first, other]),
    }
  }
}
