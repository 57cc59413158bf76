//! The `Database` trait: generic statement primitives the migration engine
//! and the rest of the application are written against.
//!
//! Implemented by storage backends (e.g. `waymark-store-sqlite`). All
//! identifiers are plain table/column names; filtering is expressed with
//! [`Predicate`] and values are always bound, never spliced.

use crate::{
  Result,
  value::{Predicate, Value},
};

pub trait Database {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Execute a single statement that returns no rows (DDL or DML).
  fn execute(&mut self, sql: &str) -> Result<(), Self::Error>;

  /// Insert one row; returns its rowid.
  fn insert(
    &mut self,
    table: &str,
    values: &[(&str, Value)],
  ) -> Result<i64, Self::Error>;

  /// Update matching rows; returns the number of rows changed.
  fn update(
    &mut self,
    table: &str,
    values: &[(&str, Value)],
    filter: Option<&Predicate>,
  ) -> Result<usize, Self::Error>;

  /// Delete matching rows (all rows when `filter` is `None`); returns the
  /// number of rows removed.
  fn delete(
    &mut self,
    table: &str,
    filter: Option<&Predicate>,
  ) -> Result<usize, Self::Error>;

  /// Select `columns` (every column when empty) from matching rows.
  fn query(
    &mut self,
    table: &str,
    columns: &[&str],
    filter: Option<&Predicate>,
  ) -> Result<Vec<Vec<Value>>, Self::Error>;

  /// Number of matching rows (all rows when `filter` is `None`).
  fn count(
    &mut self,
    table: &str,
    filter: Option<&Predicate>,
  ) -> Result<usize, Self::Error>;

  fn table_exists(&mut self, table: &str) -> Result<bool, Self::Error>;

  fn column_exists(
    &mut self,
    table: &str,
    column: &str,
  ) -> Result<bool, Self::Error>;

  /// Run `f` atomically: either every statement it issued is kept, or none
  /// is. Transactions nest; an inner failure rolls back only the inner
  /// scope, but the error still propagates outward.
  fn transaction<T, F>(&mut self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Self) -> Result<T>;
}
