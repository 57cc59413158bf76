//! The open sequence and [`SqliteStore`], the async handle the application
//! holds once the schema is at its target version.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tracing::{info, warn};
use waymark_core::{
  SchemaVersion,
  catalog,
  database::Database,
  engine::{self, UpgradeReport},
  registry,
  value::{Predicate, Value},
};

use crate::{
  Error,
  Result,
  encode::borrow_pairs,
  session::Session,
};

// ─── Open sequence ───────────────────────────────────────────────────────────

/// What happened to the schema while opening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OpenOutcome {
  Created {
    version: SchemaVersion,
  },
  Upgraded {
    from:   SchemaVersion,
    to:     SchemaVersion,
    report: UpgradeReport,
  },
  Unchanged {
    version: SchemaVersion,
  },
}

impl OpenOutcome {
  pub fn version(&self) -> SchemaVersion {
    match self {
      OpenOutcome::Created { version } | OpenOutcome::Unchanged { version } => {
        *version
      }
      OpenOutcome::Upgraded { to, .. } => *to,
    }
  }
}

/// Bring the schema of `conn` to `target`.
///
/// Reads the stored version, creates the full catalog (stored version `0`)
/// or replays the registry, and writes `target` only once that succeeded.
/// Everything happens inside one transaction: on error the file is left
/// exactly as it was.
pub fn initialize(conn: &Connection, target: SchemaVersion) -> Result<OpenOutcome> {
  if target > SchemaVersion::CURRENT {
    return Err(Error::UnsupportedTarget {
      target,
      current: SchemaVersion::CURRENT,
    });
  }

  // `None` means a fresh file was asked for an older version than current.
  let mut session = Session::new(conn);
  let outcome = session.transaction(|db| {
    let stored = db
      .user_version()
      .map_err(|e| waymark_core::Error::statement("PRAGMA user_version", e))?;

    let outcome = if stored.is_empty() {
      if target != SchemaVersion::CURRENT {
        return Ok(None);
      }
      engine::create_fresh(db, catalog::full_schema())?;
      OpenOutcome::Created { version: target }
    } else if stored == target {
      return Ok(Some(OpenOutcome::Unchanged { version: stored }));
    } else {
      let report = engine::upgrade(db, registry::steps(), stored, target)?;
      OpenOutcome::Upgraded {
        from: stored,
        to: target,
        report,
      }
    };

    db.set_user_version(target)
      .map_err(|e| waymark_core::Error::statement("PRAGMA user_version", e))?;
    Ok(Some(outcome))
  })?;

  outcome.ok_or(Error::UnsupportedTarget {
    target,
    current: SchemaVersion::CURRENT,
  })
}

/// Peek at the stored schema version of the file at `path` without opening
/// it for writing. Returns `None` when there is no file.
pub fn read_version(path: impl AsRef<Path>) -> Result<Option<SchemaVersion>> {
  let path = path.as_ref();
  if !path.exists() {
    return Ok(None);
  }
  let conn = Connection::open_with_flags(
    path,
    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
  )?;
  Ok(Some(Session::new(&conn).user_version()?))
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Handle to an opened Waymark database.
///
/// Clones share one background connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  outcome: OpenOutcome,
}

impl SqliteStore {
  /// Open (or create) the store at `path`, migrating it to
  /// [`SchemaVersion::CURRENT`].
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_at_version(path, SchemaVersion::CURRENT).await
  }

  /// Open (or create) the store at `path`, migrating it to `target`.
  pub async fn open_at_version(
    path: impl AsRef<Path>,
    target: SchemaVersion,
  ) -> Result<Self> {
    let path = path.as_ref();
    info!(path = %path.display(), %target, "opening database");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, target).await
  }

  /// Create a throwaway database in memory at the current version.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, SchemaVersion::CURRENT).await
  }

  async fn init(
    conn: tokio_rusqlite::Connection,
    target: SchemaVersion,
  ) -> Result<Self> {
    let outcome = conn
      .call(move |conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let outcome = initialize(conn, target);
        // The journal mode persists in the file; a refused file keeps its own.
        if outcome.is_ok() {
          conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        Ok(outcome)
      })
      .await??;

    match &outcome {
      OpenOutcome::Created { version } => {
        info!(%version, "created database");
      }
      OpenOutcome::Upgraded { from, to, report } => {
        info!(%from, %to, steps = report.applied.len(), "upgraded database");
        for loss in &report.data_loss {
          warn!(%loss, "local data was discarded by the upgrade");
        }
      }
      OpenOutcome::Unchanged { version } => {
        info!(%version, "database schema up to date");
      }
    }

    Ok(Self { conn, outcome })
  }

  /// What opening did to the schema. Hosts use this to tell the user about
  /// discarded edits.
  pub fn outcome(&self) -> &OpenOutcome { &self.outcome }

  pub async fn schema_version(&self) -> Result<SchemaVersion> {
    let version = self
      .conn
      .call(|conn| Ok(Session::new(conn).user_version()?))
      .await?;
    Ok(version)
  }

  pub async fn tables(&self) -> Result<Vec<String>> {
    let names = self
      .conn
      .call(|conn| Ok(Session::new(conn).table_names()?))
      .await?;
    Ok(names)
  }

  // ── Statement primitives ──────────────────────────────────────────────────

  /// Execute one or more statements that return no rows.
  pub async fn exec(&self, sql: impl Into<String>) -> Result<()> {
    let sql = sql.into();
    self
      .conn
      .call(move |conn| Ok(Session::new(conn).execute(&sql)?))
      .await?;
    Ok(())
  }

  pub async fn insert(
    &self,
    table: impl Into<String>,
    values: Vec<(String, Value)>,
  ) -> Result<i64> {
    let table = table.into();
    let rowid = self
      .conn
      .call(move |conn| {
        Ok(Session::new(conn).insert(&table, &borrow_pairs(&values))?)
      })
      .await?;
    Ok(rowid)
  }

  pub async fn update(
    &self,
    table: impl Into<String>,
    values: Vec<(String, Value)>,
    filter: Option<Predicate>,
  ) -> Result<usize> {
    let table = table.into();
    let changed = self
      .conn
      .call(move |conn| {
        Ok(Session::new(conn).update(
          &table,
          &borrow_pairs(&values),
          filter.as_ref(),
        )?)
      })
      .await?;
    Ok(changed)
  }

  pub async fn delete(
    &self,
    table: impl Into<String>,
    filter: Option<Predicate>,
  ) -> Result<usize> {
    let table = table.into();
    let removed = self
      .conn
      .call(move |conn| Ok(Session::new(conn).delete(&table, filter.as_ref())?))
      .await?;
    Ok(removed)
  }

  /// Select `columns` (all when empty) from the rows of `table` matching
  /// `filter`.
  pub async fn query(
    &self,
    table: impl Into<String>,
    columns: Vec<String>,
    filter: Option<Predicate>,
  ) -> Result<Vec<Vec<Value>>> {
    let table = table.into();
    let rows = self
      .conn
      .call(move |conn| {
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        Ok(Session::new(conn).query(&table, &columns, filter.as_ref())?)
      })
      .await?;
    Ok(rows)
  }
}
