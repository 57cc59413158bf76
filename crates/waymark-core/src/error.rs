//! Error types for `waymark-core`.

use thiserror::Error;

use crate::SchemaVersion;

#[derive(Debug, Error)]
pub enum Error {
  /// The underlying database rejected a statement.
  #[error("statement failed: {sql}: {source}")]
  Statement {
    sql:    String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// The stored schema is newer than anything this build understands.
  #[error("database schema version {stored} is newer than supported version {target}")]
  Downgrade {
    stored: SchemaVersion,
    target: SchemaVersion,
  },
}

impl Error {
  /// Wrap a backend error together with the statement that produced it.
  pub fn statement<E>(sql: impl Into<String>, source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Statement {
      sql:    sql.into(),
      source: Box::new(source),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
