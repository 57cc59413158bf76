//! The migration engine: creates a fresh schema from the catalog, or replays
//! the registry between two versions.
//!
//! The engine never writes the schema version itself. The host stores the
//! new version only after [`upgrade`] returns `Ok`.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  Error,
  Result,
  SchemaVersion,
  database::Database,
  registry::{Action, DataLoss, MigrationStep},
  sql::{self, quote_ident},
  table::TableDefinition,
  value::{Predicate, Value},
};

/// What an upgrade did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
  /// `from` version of every step that ran, ascending.
  pub applied:   Vec<SchemaVersion>,
  /// Data discarded on purpose along the way; the host should let the
  /// user know. Only steps that actually removed rows are listed.
  pub data_loss: Vec<DataLoss>,
}

impl UpgradeReport {
  pub fn is_empty(&self) -> bool { self.applied.is_empty() }
}

/// Create every table and index of `catalog`, in order, atomically.
pub fn create_fresh<D: Database>(
  db: &mut D,
  catalog: &[&TableDefinition],
) -> Result<()> {
  db.transaction(|db| {
    for table in catalog {
      for sql in table.statements() {
        exec(db, &sql)?;
      }
    }
    Ok(())
  })?;
  info!(tables = catalog.len(), "created fresh schema");
  Ok(())
}

/// Replay every step of `steps` whose boundary lies in `[stored, target)`.
///
/// Each step runs in its own transaction. Fails without touching the
/// database when `stored > target`.
pub fn upgrade<D: Database>(
  db: &mut D,
  steps: &[MigrationStep],
  stored: SchemaVersion,
  target: SchemaVersion,
) -> Result<UpgradeReport> {
  if stored > target {
    return Err(Error::Downgrade { stored, target });
  }
  let mut report = UpgradeReport::default();
  if stored == target {
    return Ok(report);
  }

  let mut pending: Vec<&MigrationStep> =
    steps.iter().filter(|s| s.applies(stored, target)).collect();
  pending.sort_by_key(|s| s.from);

  info!(%stored, %target, steps = pending.len(), "upgrading schema");
  for step in pending {
    let discarded = run_step(db, step)?;
    report.applied.push(step.from);
    if let Some(loss) = step.data_loss
      && discarded > 0
    {
      warn!(
        from = %step.from,
        to = %step.to,
        %loss,
        rows = discarded,
        "migration discarded local data"
      );
      report.data_loss.push(loss);
    }
  }
  Ok(report)
}

/// Run a single step atomically. Returns the number of rows it discarded:
/// rows deleted, plus the rows of dropped tables when the step is declared
/// destructive.
pub fn run_step<D: Database>(db: &mut D, step: &MigrationStep) -> Result<usize> {
  info!(from = %step.from, to = %step.to, summary = step.summary, "applying migration");
  let destructive = step.data_loss.is_some();
  db.transaction(|db| {
    let mut discarded = 0;
    for action in step.actions {
      debug!(%action, "migration action");
      discarded += apply(db, action, destructive)?;
    }
    Ok(discarded)
  })
}

fn exec<D: Database>(db: &mut D, sql: &str) -> Result<()> {
  db.execute(sql).map_err(|e| Error::statement(sql, e))
}

/// Apply one action; returns the number of rows it discarded.
fn apply<D: Database>(
  db: &mut D,
  action: &Action,
  destructive: bool,
) -> Result<usize> {
  match *action {
    Action::CreateTable { table } => exec(db, &table.create_sql()).map(|()| 0),
    Action::DropTable { table } => {
      let rows = if destructive && table_exists(db, table)? {
        db.count(table, None)
          .map_err(|e| Error::statement(sql::count(table, None).sql, e))?
      } else {
        0
      };
      exec(db, &format!("DROP TABLE IF EXISTS {}", quote_ident(table)))?;
      Ok(rows)
    }
    Action::RenameTable { from, to } => {
      if table_exists(db, from)? {
        exec(
          db,
          &format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(from),
            quote_ident(to)
          ),
        )?;
      } else {
        debug!(table = from, "rename source missing, skipping");
      }
      Ok(0)
    }
    Action::CreateIndex { index } => exec(db, &index.create_sql()).map(|()| 0),
    Action::DropIndex { index } => {
      exec(db, &format!("DROP INDEX IF EXISTS {}", quote_ident(index)))
        .map(|()| 0)
    }
    Action::AddColumn { table, column } => {
      let present = db
        .column_exists(table, column.name)
        .map_err(|e| Error::statement(format!("PRAGMA table_info({table})"), e))?;
      if present {
        debug!(table, column = column.name, "column already present, skipping");
      } else {
        exec(
          db,
          &format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_ident(table),
            column.definition()
          ),
        )?;
      }
      Ok(0)
    }
    Action::CopyRows(copy) => {
      if table_exists(db, copy.source)? {
        exec(db, &copy.to_sql())?;
      } else {
        debug!(table = copy.source, "copy source missing, skipping");
      }
      Ok(0)
    }
    Action::RenameValue {
      table,
      column,
      from,
      to,
    } => {
      let filter = Predicate::eq(column, from);
      let changed = db
        .update(table, &[(column, Value::from(to))], Some(&filter))
        .map_err(|e| Error::statement(format!("UPDATE {table}"), e))?;
      debug!(table, column, changed, "renamed value");
      Ok(0)
    }
    Action::Delete { table, matching } => {
      let filter = matching.map(|(column, value)| Predicate::eq(column, value));
      let removed = db
        .delete(table, filter.as_ref())
        .map_err(|e| Error::statement(format!("DELETE FROM {table}"), e))?;
      debug!(table, removed, "deleted rows");
      Ok(removed)
    }
  }
}

fn table_exists<D: Database>(db: &mut D, table: &str) -> Result<bool> {
  db.table_exists(table)
    .map_err(|e| Error::statement(format!("lookup of table {table}"), e))
}
