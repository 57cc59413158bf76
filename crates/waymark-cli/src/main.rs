//! waymark-db: inspect and migrate a Waymark local database.
//!
//! Reads `config.toml` (or the path specified with `--config`) and
//! `WAYMARK_*` environment variables for the database location; `--db`
//! overrides both.
//!
//! ```text
//! waymark-db status
//! waymark-db --db ~/waymark.db migrate --to 9
//! waymark-db migrate --db ~/waymark.db
//! waymark-db --json steps
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use waymark_core::{
  SchemaVersion,
  catalog,
  registry::{self, MigrationStep},
};
use waymark_store_sqlite::{OpenOutcome, SqliteStore, read_version};

#[derive(Parser)]
#[command(author, version, about = "Waymark local database maintenance")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", global = true)]
  config: PathBuf,

  /// Database file; overrides `db_path` from the configuration.
  #[arg(long, global = true)]
  db: Option<PathBuf>,

  /// Print JSON instead of text.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Show the stored schema version and the steps opening would apply.
  Status,
  /// Open the database, creating or upgrading its schema.
  Migrate {
    /// Stop at this version instead of the current one.
    #[arg(long)]
    to: Option<u32>,
  },
  /// Print the DDL of the current schema.
  Schema,
  /// List every registered migration step.
  Steps,
}

#[derive(Debug, Deserialize)]
struct DbConfig {
  db_path: PathBuf,
}

#[derive(Serialize)]
struct Status<'a> {
  path:    &'a Path,
  stored:  Option<SchemaVersion>,
  current: SchemaVersion,
  pending: Vec<&'static MigrationStep>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  match &cli.command {
    Command::Status => status(&db_path(&cli)?, cli.json),
    Command::Migrate { to } => {
      let target = to.map_or(SchemaVersion::CURRENT, SchemaVersion::new);
      migrate(&db_path(&cli)?, target, cli.json).await
    }
    Command::Schema => schema(cli.json),
    Command::Steps => steps(cli.json),
  }
}

// ─── Commands ────────────────────────────────────────────────────────────────

fn status(path: &Path, json: bool) -> anyhow::Result<()> {
  let stored = read_version(path)
    .with_context(|| format!("failed to read schema version of {path:?}"))?;
  let status = Status {
    path,
    stored,
    current: SchemaVersion::CURRENT,
    pending: pending(stored.unwrap_or(SchemaVersion::EMPTY)),
  };
  if json {
    return print_json(&status);
  }

  println!("database: {}", path.display());
  match stored {
    None => println!("no database yet; opening creates version {}", status.current),
    Some(v) if v.is_empty() => {
      println!("empty database; opening creates version {}", status.current)
    }
    Some(v) if v > status.current => println!(
      "version {v} is newer than this build (version {}); opening will fail",
      status.current
    ),
    Some(v) => println!("version {v} (current {})", status.current),
  }
  for step in &status.pending {
    print_step(step);
  }
  Ok(())
}

async fn migrate(
  path: &Path,
  target: SchemaVersion,
  json: bool,
) -> anyhow::Result<()> {
  let store = SqliteStore::open_at_version(path, target)
    .await
    .with_context(|| format!("failed to open database at {path:?}"))?;
  let outcome = store.outcome();
  if json {
    return print_json(outcome);
  }

  match outcome {
    OpenOutcome::Created { version } => {
      println!("created {} at version {version}", path.display())
    }
    OpenOutcome::Unchanged { version } => {
      println!("{} is already at version {version}", path.display())
    }
    OpenOutcome::Upgraded { from, to, report } => {
      println!(
        "upgraded {} from version {from} to {to} ({} steps)",
        path.display(),
        report.applied.len()
      );
      for loss in &report.data_loss {
        println!("  discarded: {loss}");
      }
    }
  }
  Ok(())
}

fn schema(json: bool) -> anyhow::Result<()> {
  if json {
    return print_json(&catalog::full_schema());
  }
  for sql in catalog::statements() {
    println!("{sql};");
  }
  Ok(())
}

fn steps(json: bool) -> anyhow::Result<()> {
  if json {
    return print_json(&registry::steps());
  }
  for step in registry::steps() {
    print_step(step);
  }
  Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Steps an open at the current version would run for a database stored at
/// `stored`. Empty for a fresh database, which is created from the catalog.
fn pending(stored: SchemaVersion) -> Vec<&'static MigrationStep> {
  if stored.is_empty() {
    return Vec::new();
  }
  registry::steps()
    .iter()
    .filter(|s| s.applies(stored, SchemaVersion::CURRENT))
    .collect()
}

fn print_step(step: &MigrationStep) {
  println!("{:>3} -> {:<3} {}", step.from, step.to, step.summary);
  if let Some(loss) = step.data_loss {
    println!("           discards {loss}");
  }
  for action in step.actions {
    println!("           - {action}");
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn db_path(cli: &Cli) -> anyhow::Result<PathBuf> {
  if let Some(path) = &cli.db {
    return Ok(expand_tilde(path));
  }

  let settings = config::Config::builder()
    .set_default("db_path", "waymark.db")?
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("WAYMARK"))
    .build()
    .context("failed to read config file")?;

  let db_cfg: DbConfig = settings
    .try_deserialize()
    .context("failed to deserialise DbConfig")?;

  Ok(expand_tilde(&db_cfg.db_path))
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
