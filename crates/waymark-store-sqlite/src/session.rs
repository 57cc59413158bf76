//! [`Database`] over a borrowed rusqlite connection.

use rusqlite::{Connection, params_from_iter};
use tracing::warn;
use waymark_core::{
  SchemaVersion,
  database::Database,
  sql,
  value::{Predicate, Value},
};

use crate::encode::{decode_value, encode_params};

/// A borrowed connection plus the savepoint nesting depth.
///
/// Transactions are implemented with savepoints, so a step can run inside
/// the open sequence's outer transaction and still roll back on its own.
pub struct Session<'c> {
  conn:  &'c Connection,
  depth: usize,
}

impl<'c> Session<'c> {
  pub fn new(conn: &'c Connection) -> Self { Self { conn, depth: 0 } }

  /// The persisted schema version (`PRAGMA user_version`).
  pub fn user_version(&self) -> rusqlite::Result<SchemaVersion> {
    self
      .conn
      .pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))
      .map(SchemaVersion::new)
  }

  pub fn set_user_version(
    &self,
    version: SchemaVersion,
  ) -> rusqlite::Result<()> {
    self.conn.pragma_update(None, "user_version", version.get())
  }

  /// Names of all user tables, sorted.
  pub fn table_names(&self) -> rusqlite::Result<Vec<String>> {
    let mut stmt = self.conn.prepare(
      "SELECT name FROM sqlite_master
       WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
       ORDER BY name",
    )?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
  }

  fn run(&self, stmt: &sql::Statement) -> rusqlite::Result<usize> {
    self
      .conn
      .execute(&stmt.sql, params_from_iter(encode_params(&stmt.params)))
  }
}

impl Database for Session<'_> {
  type Error = rusqlite::Error;

  fn execute(&mut self, sql: &str) -> rusqlite::Result<()> {
    self.conn.execute_batch(sql)
  }

  fn insert(
    &mut self,
    table: &str,
    values: &[(&str, Value)],
  ) -> rusqlite::Result<i64> {
    self.run(&sql::insert(table, values))?;
    Ok(self.conn.last_insert_rowid())
  }

  fn update(
    &mut self,
    table: &str,
    values: &[(&str, Value)],
    filter: Option<&Predicate>,
  ) -> rusqlite::Result<usize> {
    self.run(&sql::update(table, values, filter))
  }

  fn delete(
    &mut self,
    table: &str,
    filter: Option<&Predicate>,
  ) -> rusqlite::Result<usize> {
    self.run(&sql::delete(table, filter))
  }

  fn query(
    &mut self,
    table: &str,
    columns: &[&str],
    filter: Option<&Predicate>,
  ) -> rusqlite::Result<Vec<Vec<Value>>> {
    let select = sql::select(table, columns, filter);
    let mut stmt = self.conn.prepare(&select.sql)?;
    let width = stmt.column_count();
    let rows = stmt
      .query_map(params_from_iter(encode_params(&select.params)), |row| {
        (0..width)
          .map(|i| row.get::<_, rusqlite::types::Value>(i).map(decode_value))
          .collect::<rusqlite::Result<Vec<_>>>()
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn count(
    &mut self,
    table: &str,
    filter: Option<&Predicate>,
  ) -> rusqlite::Result<usize> {
    let count = sql::count(table, filter);
    let rows = self.conn.query_row(
      &count.sql,
      params_from_iter(encode_params(&count.params)),
      |row| row.get::<_, i64>(0),
    )?;
    Ok(rows.max(0) as usize)
  }

  fn table_exists(&mut self, table: &str) -> rusqlite::Result<bool> {
    self.conn.query_row(
      "SELECT EXISTS (
         SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
       )",
      [table],
      |row| row.get(0),
    )
  }

  fn column_exists(
    &mut self,
    table: &str,
    column: &str,
  ) -> rusqlite::Result<bool> {
    self.conn.query_row(
      "SELECT EXISTS (SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2)",
      [table, column],
      |row| row.get(0),
    )
  }

  fn transaction<T, F>(&mut self, f: F) -> waymark_core::Result<T>
  where
    F: FnOnce(&mut Self) -> waymark_core::Result<T>,
  {
    let name = format!("waymark_{}", self.depth);
    let begin = format!("SAVEPOINT {name}");
    self
      .conn
      .execute_batch(&begin)
      .map_err(|e| waymark_core::Error::statement(begin, e))?;

    self.depth += 1;
    let result = f(self);
    self.depth -= 1;

    match result {
      Ok(value) => {
        let release = format!("RELEASE {name}");
        self
          .conn
          .execute_batch(&release)
          .map_err(|e| waymark_core::Error::statement(release, e))?;
        Ok(value)
      }
      Err(err) => {
        let rollback = format!("ROLLBACK TO {name}; RELEASE {name}");
        if let Err(e) = self.conn.execute_batch(&rollback) {
          warn!(savepoint = %name, error = %e, "rollback failed");
        }
        Err(err)
      }
    }
  }
}
