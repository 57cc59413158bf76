//! Error type for `waymark-store-sqlite`.

use thiserror::Error;
use waymark_core::SchemaVersion;

#[derive(Debug, Error)]
pub enum Error {
  #[error("schema error: {0}")]
  Schema(#[from] waymark_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  /// Fresh databases are only created at the current version, and no
  /// database is upgraded past it.
  #[error("cannot open at schema version {target}; this build supports {current}")]
  UnsupportedTarget {
    target:  SchemaVersion,
    current: SchemaVersion,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
