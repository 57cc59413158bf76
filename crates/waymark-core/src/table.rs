//! Static table and index definitions, and their DDL rendering.
//!
//! Every type here is `const`-constructible so the catalog and the migration
//! registry can be plain `const` data.

use std::fmt::Write as _;

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

// ─── Columns ─────────────────────────────────────────────────────────────────

/// Declared column type. SQLite only honours the affinity, but the declared
/// name is what `PRAGMA table_info` reports, so it must stay stable.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
  Integer,
  Real,
  Text,
  Blob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
  pub name:     &'static str,
  pub sql_type: SqlType,
  pub not_null: bool,
  /// Raw SQL literal, e.g. `'[]'` or `0`.
  pub default:  Option<&'static str>,
}

impl Column {
  pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
    Self {
      name,
      sql_type,
      not_null: true,
      default: None,
    }
  }

  pub const fn nullable(mut self) -> Self {
    self.not_null = false;
    self
  }

  pub const fn with_default(mut self, literal: &'static str) -> Self {
    self.default = Some(literal);
    self
  }

  /// Column definition as it appears inside `CREATE TABLE` or after
  /// `ALTER TABLE ... ADD COLUMN`.
  pub fn definition(&self) -> String {
    let mut def = format!("{} {}", self.name, self.sql_type);
    if self.not_null {
      def.push_str(" NOT NULL");
    }
    if let Some(default) = self.default {
      let _ = write!(def, " DEFAULT {default}");
    }
    def
  }
}

/// Shorthand constructors used by the catalog.
pub const fn integer(name: &'static str) -> Column {
  Column::new(name, SqlType::Integer)
}

pub const fn real(name: &'static str) -> Column {
  Column::new(name, SqlType::Real)
}

pub const fn text(name: &'static str) -> Column {
  Column::new(name, SqlType::Text)
}

pub const fn blob(name: &'static str) -> Column {
  Column::new(name, SqlType::Blob)
}

// ─── Keys and indexes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "columns", rename_all = "snake_case")]
pub enum PrimaryKey {
  None,
  /// A single `INTEGER PRIMARY KEY AUTOINCREMENT` column.
  AutoIncrement(&'static str),
  /// A (possibly compound) key declared as a table constraint.
  Columns(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexDefinition {
  pub name:    &'static str,
  pub table:   &'static str,
  pub columns: &'static [&'static str],
}

impl IndexDefinition {
  pub const fn new(
    name: &'static str,
    table: &'static str,
    columns: &'static [&'static str],
  ) -> Self {
    Self {
      name,
      table,
      columns,
    }
  }

  pub fn create_sql(&self) -> String {
    format!(
      "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
      self.name,
      self.table,
      self.columns.join(", ")
    )
  }
}

// ─── Tables ──────────────────────────────────────────────────────────────────

/// The current shape of one table, including the indexes that belong to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
  pub name:        &'static str,
  pub columns:     &'static [Column],
  pub primary_key: PrimaryKey,
  pub indexes:     &'static [IndexDefinition],
}

impl TableDefinition {
  pub fn column(&self, name: &str) -> Option<&Column> {
    self.columns.iter().find(|c| c.name == name)
  }

  pub fn create_sql(&self) -> String {
    let mut parts: Vec<String> = self
      .columns
      .iter()
      .map(|c| match self.primary_key {
        PrimaryKey::AutoIncrement(pk) if pk == c.name => {
          format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", c.name)
        }
        _ => c.definition(),
      })
      .collect();
    if let PrimaryKey::Columns(columns) = self.primary_key {
      parts.push(format!("PRIMARY KEY ({})", columns.join(", ")));
    }
    format!(
      "CREATE TABLE IF NOT EXISTS {} ({})",
      self.name,
      parts.join(", ")
    )
  }

  /// `CREATE TABLE` followed by every `CREATE INDEX` for this table.
  pub fn statements(&self) -> impl Iterator<Item = String> + '_ {
    std::iter::once(self.create_sql())
      .chain(self.indexes.iter().map(IndexDefinition::create_sql))
  }
}
