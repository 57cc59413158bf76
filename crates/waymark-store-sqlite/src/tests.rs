//! Tests for the open sequence and the migration registry against real
//! SQLite databases.


use rusqlite::Connection;
use waymark_core::{
  SchemaVersion,
  catalog,
  database::Database,
  engine::{self, UpgradeReport},
  registry::{self, Action, DataLoss, MigrationStep},
  table::{PrimaryKey, TableDefinition, text},
  value::{Predicate, Value},
};

use crate::{Error, OpenOutcome, Session, SqliteStore, read_version};

fn v(version: u32) -> SchemaVersion { SchemaVersion::new(version) }

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// A seeded version 1 database in memory.
fn seeded_v1() -> Connection {
  let conn = Connection::open_in_memory().unwrap();
  legacy::create_v1(&conn).unwrap();
  legacy::seed_v1(&conn).unwrap();
  conn
}

fn upgrade(conn: &Connection, from: u32, to: u32) -> UpgradeReport {
  engine::upgrade(&mut Session::new(conn), registry::steps(), v(from), v(to))
    .unwrap()
}

fn step(from: u32) -> &'static MigrationStep {
  registry::steps()
    .iter()
    .find(|s| s.from == v(from))
    .unwrap()
}

fn count(conn: &Connection, sql: &str) -> i64 {
  conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn exists(conn: &Connection, table: &str) -> bool {
  Session::new(conn).table_exists(table).unwrap()
}

type ColumnShape = (String, String, bool, Option<String>, i64);
type IndexShape = (String, bool, Vec<String>);

/// Everything observable about one table: columns, indexes and rows.
#[derive(Debug, PartialEq)]
struct TableShape {
  name:    String,
  columns: Vec<ColumnShape>,
  indexes: Vec<IndexShape>,
  rows:    Vec<Vec<Value>>,
}

fn snapshot(conn: &Connection) -> Vec<TableShape> {
  let mut session = Session::new(conn);
  let names = session.table_names().unwrap();
  names
    .into_iter()
    .map(|name| {
      let columns = conn
        .prepare(
          "SELECT name, type, \"notnull\", dflt_value, pk
           FROM pragma_table_info(?1) ORDER BY cid",
        )
        .unwrap()
        .query_map([&name], |r| {
          Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
        })
        .unwrap()
        .collect::<rusqlite::Result<Vec<ColumnShape>>>()
        .unwrap();

      let indexes = conn
        .prepare(
          "SELECT name, \"unique\" FROM pragma_index_list(?1) ORDER BY name",
        )
        .unwrap()
        .query_map([&name], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<rusqlite::Result<Vec<(String, bool)>>>()
        .unwrap()
        .into_iter()
        .map(|(index, unique)| {
          let columns = conn
            .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")
            .unwrap()
            .query_map([&index], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap();
          (index, unique, columns)
        })
        .collect();

      let mut rows = session.query(&name, &[], None).unwrap();
      rows.sort_by_key(|row| format!("{row:?}"));

      TableShape {
        name,
        columns,
        indexes,
        rows,
      }
    })
    .collect()
}

const BROKEN: TableDefinition = TableDefinition {
  name:        "broken",
  columns:     &[text("payload").with_default("(")],
  primary_key: PrimaryKey::None,
  indexes:     &[],
};

/// `step` with a statement appended that always fails.
fn failing(step: &MigrationStep) -> MigrationStep {
  let actions = step
    .actions
    .iter()
    .copied()
    .chain([Action::CreateTable { table: &BROKEN }])
    .collect::<Vec<_>>()
    .leak();
  MigrationStep { actions, ..*step }
}

// ─── Convergence ─────────────────────────────────────────────────────────────

#[test]
fn fresh_schema_matches_fully_upgraded_schema() {
  let fresh = Connection::open_in_memory().unwrap();
  engine::create_fresh(&mut Session::new(&fresh), catalog::full_schema())
    .unwrap();

  let upgraded = Connection::open_in_memory().unwrap();
  legacy::create_v1(&upgraded).unwrap();
  upgrade(&upgraded, 1, SchemaVersion::CURRENT.get());

  assert_eq!(snapshot(&fresh), snapshot(&upgraded));
}

#[test]
fn fresh_schema_has_every_catalog_table() {
  let conn = Connection::open_in_memory().unwrap();
  engine::create_fresh(&mut Session::new(&conn), catalog::full_schema())
    .unwrap();

  let mut expected: Vec<_> = catalog::full_schema()
    .iter()
    .map(|t| t.name.to_owned())
    .collect();
  expected.sort();
  assert_eq!(Session::new(&conn).table_names().unwrap(), expected);
}

#[test]
fn upgrades_compose_at_every_split_point() {
  let current = SchemaVersion::CURRENT.get();
  let straight = seeded_v1();
  upgrade(&straight, 1, current);
  let expected = snapshot(&straight);

  for split in 1..=current {
    let conn = seeded_v1();
    upgrade(&conn, 1, split);
    upgrade(&conn, split, current);
    assert_eq!(snapshot(&conn), expected, "split at version {split}");
  }
}

#[test]
fn every_step_can_run_twice() {
  let current = SchemaVersion::CURRENT.get();
  let straight = seeded_v1();
  upgrade(&straight, 1, current);
  let expected = snapshot(&straight);

  for s in registry::steps() {
    let conn = seeded_v1();
    let mut db = Session::new(&conn);
    upgrade(&conn, 1, s.from.get());
    engine::run_step(&mut db, s).unwrap();
    engine::run_step(&mut db, s).unwrap();
    upgrade(&conn, s.to.get(), current);
    assert_eq!(snapshot(&conn), expected, "step {} run twice", s.from);
  }
}

#[test]
fn interrupted_step_rolls_back_and_retries_cleanly() {
  let current = SchemaVersion::CURRENT.get();
  let straight = seeded_v1();
  upgrade(&straight, 1, current);
  let expected = snapshot(&straight);

  for s in registry::steps() {
    let conn = seeded_v1();
    let mut db = Session::new(&conn);
    upgrade(&conn, 1, s.from.get());
    let before = snapshot(&conn);

    assert!(engine::run_step(&mut db, &failing(s)).is_err());
    assert_eq!(snapshot(&conn), before, "step {} left changes", s.from);

    engine::run_step(&mut db, s).unwrap();
    upgrade(&conn, s.to.get(), current);
    assert_eq!(snapshot(&conn), expected, "step {} after retry", s.from);
  }
}

#[test]
fn failing_step_keeps_tables_it_renamed() {
  let conn = seeded_v1();
  upgrade(&conn, 1, 2);

  let err = engine::run_step(&mut Session::new(&conn), &failing(step(2)))
    .unwrap_err();
  assert!(matches!(err, waymark_core::Error::Statement { .. }));
  assert!(exists(&conn, "quest_visibility"));
  assert!(!exists(&conn, "quest_visibility_old"));
  assert!(!exists(&conn, "quest_order"));
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM quest_visibility"), 2);
}

// ─── Individual steps ────────────────────────────────────────────────────────

#[test]
fn visibility_moves_to_the_default_preset() {
  let conn = seeded_v1();
  upgrade(&conn, 1, 3);

  assert!(!exists(&conn, "quest_visibility_old"));
  assert!(exists(&conn, "quest_presets"));
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM quest_visibility"), 2);
  assert_eq!(
    count(
      &conn,
      "SELECT COUNT(*) FROM quest_visibility WHERE quest_preset_id = 0"
    ),
    2
  );
  assert_eq!(
    count(
      &conn,
      "SELECT visibility FROM quest_visibility
       WHERE quest_type = 'AddPicnicTableCover'"
    ),
    1
  );
}

#[test]
fn unused_achievements_table_is_dropped() {
  let conn = seeded_v1();
  upgrade(&conn, 1, 4);
  assert!(!exists(&conn, "new_achievements"));
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM achievements"), 1);
}

#[test]
fn element_geometry_is_split_by_element_type() {
  let conn = seeded_v1();
  upgrade(&conn, 1, 5);

  assert!(!exists(&conn, "elements_geometry"));
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM way_geometry"), 3);
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM relation_geometry"), 2);

  let mut db = Session::new(&conn);
  let row = db
    .query(
      "way_geometry",
      &["geometry_polylines", "geometry_polygons", "center_latitude"],
      Some(&Predicate::eq("id", 2_i64)),
    )
    .unwrap();
  assert_eq!(row, vec![vec![
    Value::Blob(vec![1]),
    Value::Null,
    Value::Real(52.5),
  ]]);

  let row = db
    .query(
      "relation_geometry",
      &["geometry_polylines", "geometry_polygons"],
      Some(&Predicate::eq("id", 6_i64)),
    )
    .unwrap();
  assert_eq!(row, vec![vec![Value::Blob(vec![5]), Value::Blob(vec![6])]]);

  let indexes = count(
    &conn,
    "SELECT COUNT(*) FROM sqlite_master
     WHERE type = 'index' AND name = 'osm_nodes_spatial_index'",
  );
  assert_eq!(indexes, 1);
}

#[test]
fn note_edits_get_an_empty_track() {
  let conn = seeded_v1();
  upgrade(&conn, 1, 6);

  let track: String = conn
    .query_row("SELECT track FROM osm_note_edits", [], |r| r.get(0))
    .unwrap();
  assert_eq!(track, "[]");
}

#[test]
fn statistics_of_the_current_week_are_added() {
  let conn = seeded_v1();
  upgrade(&conn, 1, 7);
  assert!(exists(&conn, "quest_statistics_current_week"));
  assert!(exists(&conn, "country_statistics_current_week"));
  assert!(exists(&conn, "active_days"));
}

#[test]
fn edits_of_the_retired_quest_are_discarded() {
  let conn = seeded_v1();
  upgrade(&conn, 1, 7);
  let report = upgrade(&conn, 7, 8);

  assert_eq!(report.data_loss, vec![DataLoss::UnsyncedEdits]);
  assert_eq!(
    count(
      &conn,
      "SELECT COUNT(*) FROM osm_element_edits WHERE quest_type = 'AddShoulder'"
    ),
    0
  );
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM osm_element_edits"), 2);
}

#[test]
fn renamed_quest_type_fans_out_to_every_table() {
  let conn = seeded_v1();
  upgrade(&conn, 1, 8);
  conn
    .execute_batch(
      "INSERT INTO quest_order VALUES (0, 'AddPicnicTableCover', 'AddRoadName');
       INSERT INTO quest_order VALUES (0, 'AddRoadName', 'AddPicnicTableCover');",
    )
    .unwrap();

  let renamed: Vec<(&str, &str)> = step(8)
    .actions
    .iter()
    .filter_map(|a| match a {
      Action::RenameValue { table, column, .. } => Some((*table, *column)),
      _ => None,
    })
    .collect();
  let matching = |table: &str, column: &str, value: &str| {
    count(
      &conn,
      &format!("SELECT COUNT(*) FROM {table} WHERE {column} = '{value}'"),
    )
  };
  let totals = |conn: &Connection| {
    renamed
      .iter()
      .map(|(table, _)| count(conn, &format!("SELECT COUNT(*) FROM {table}")))
      .collect::<Vec<_>>()
  };

  let before: Vec<i64> = renamed
    .iter()
    .map(|(t, c)| matching(t, c, "AddPicnicTableCover"))
    .collect();
  assert!(before.iter().all(|&n| n == 1));
  let totals_before = totals(&conn);

  upgrade(&conn, 8, 9);

  for ((table, column), old) in renamed.iter().zip(before) {
    assert_eq!(matching(table, column, "AddPicnicTableCover"), 0);
    assert_eq!(matching(table, column, "AddAmenityCover"), old, "{table}");
  }
  assert_eq!(totals(&conn), totals_before);
}

#[test]
fn downloaded_tiles_are_reset() {
  let conn = seeded_v1();
  upgrade(&conn, 1, 10);

  assert_eq!(count(&conn, "SELECT COUNT(*) FROM downloaded_tiles"), 0);
  let mut db = Session::new(&conn);
  assert!(!db.column_exists("downloaded_tiles", "type").unwrap());
  assert!(db.column_exists("downloaded_tiles", "date").unwrap());
}

#[test]
fn element_edits_are_recreated() {
  let conn = seeded_v1();
  upgrade(&conn, 1, 10);
  let report = upgrade(&conn, 10, 11);

  assert_eq!(report.data_loss, vec![DataLoss::UnsyncedEdits]);
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM osm_element_edits"), 0);
  let mut db = Session::new(&conn);
  assert!(
    db.column_exists("osm_element_edits", "is_near_user_location")
      .unwrap()
  );
  assert!(!db.column_exists("osm_element_edits", "element_id").unwrap());
  assert!(db.table_exists("edit_elements").unwrap());
  assert_eq!(
    count(
      &conn,
      "SELECT COUNT(*) FROM sqlite_master WHERE name = 'osm_element_edits_index'"
    ),
    0
  );
}

#[test]
fn cached_map_data_is_wiped() {
  let conn = seeded_v1();
  upgrade(&conn, 1, 11);
  conn
    .execute_batch("INSERT INTO downloaded_tiles VALUES (8800, 5370, 1900);")
    .unwrap();

  let report = upgrade(&conn, 11, 12);

  assert_eq!(report.data_loss, vec![DataLoss::CachedMapData]);
  for table in [
    "osm_nodes",
    "osm_ways",
    "osm_way_nodes",
    "osm_relations",
    "osm_relation_members",
    "way_geometry",
    "relation_geometry",
    "downloaded_tiles",
  ] {
    assert_eq!(
      count(&conn, &format!("SELECT COUNT(*) FROM {table}")),
      0,
      "{table}"
    );
  }
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM osm_notes"), 1);
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM osm_quests"), 2);
}

#[test]
fn full_upgrade_reports_every_step_and_loss() {
  let conn = seeded_v1();
  let report = upgrade(&conn, 1, SchemaVersion::CURRENT.get());

  assert_eq!(
    report.applied,
    (1..SchemaVersion::CURRENT.get()).map(v).collect::<Vec<_>>()
  );
  assert_eq!(report.data_loss, vec![
    DataLoss::UnsyncedEdits,
    DataLoss::UnsyncedEdits,
    DataLoss::CachedMapData,
  ]);
  assert!(exists(&conn, "logs"));
}

#[test]
fn upgrade_without_local_data_reports_no_loss() {
  let conn = Connection::open_in_memory().unwrap();
  legacy::create_v1(&conn).unwrap();

  let report = upgrade(&conn, 1, SchemaVersion::CURRENT.get());

  assert_eq!(report.applied.len(), registry::steps().len());
  assert!(report.data_loss.is_empty());
}

// ─── Open sequence ───────────────────────────────────────────────────────────

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// Write a version 1 database to `path`.
fn write_v1(path: &std::path::Path) {
  let conn = Connection::open(path).unwrap();
  legacy::create_v1(&conn).unwrap();
  legacy::seed_v1(&conn).unwrap();
}

fn journal_mode(path: &std::path::Path) -> String {
  Connection::open(path)
    .unwrap()
    .pragma_query_value(None, "journal_mode", |row| row.get(0))
    .unwrap()
}

#[tokio::test]
async fn in_memory_store_is_created_at_current_version() {
  let s = store().await;
  assert_eq!(s.outcome(), &OpenOutcome::Created {
    version: SchemaVersion::CURRENT,
  });
  assert_eq!(s.schema_version().await.unwrap(), SchemaVersion::CURRENT);
  assert_eq!(s.tables().await.unwrap().len(), catalog::full_schema().len());
}

#[tokio::test]
async fn reopening_leaves_schema_unchanged() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("waymark.db");

  let first = SqliteStore::open(&path).await.unwrap();
  assert!(matches!(first.outcome(), OpenOutcome::Created { .. }));
  first
    .insert("links", vec![("link".into(), Value::from("wiki"))])
    .await
    .unwrap();
  drop(first);

  let second = SqliteStore::open(&path).await.unwrap();
  assert_eq!(second.outcome(), &OpenOutcome::Unchanged {
    version: SchemaVersion::CURRENT,
  });
  let rows = second.query("links", vec![], None).await.unwrap();
  assert_eq!(rows, vec![vec![Value::from("wiki")]]);
  assert_eq!(read_version(&path).unwrap(), Some(SchemaVersion::CURRENT));
}

#[tokio::test]
async fn read_version_of_missing_file_is_none() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("missing.db");
  assert_eq!(read_version(&path).unwrap(), None);
  assert!(!path.exists());
}

#[tokio::test]
async fn opening_a_version_one_file_upgrades_it() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("waymark.db");
  write_v1(&path);
  assert_eq!(read_version(&path).unwrap(), Some(v(1)));

  let s = SqliteStore::open(&path).await.unwrap();
  let OpenOutcome::Upgraded { from, to, report } = s.outcome() else {
    panic!("expected an upgrade, got {:?}", s.outcome());
  };
  assert_eq!((*from, *to), (v(1), SchemaVersion::CURRENT));
  assert_eq!(report.applied.len(), registry::steps().len());
  assert!(report.data_loss.contains(&DataLoss::CachedMapData));
  assert_eq!(s.schema_version().await.unwrap(), SchemaVersion::CURRENT);
  assert_eq!(s.tables().await.unwrap().len(), catalog::full_schema().len());
}

#[tokio::test]
async fn upgrade_can_stop_at_an_intermediate_version() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("waymark.db");
  write_v1(&path);

  let s = SqliteStore::open_at_version(&path, v(5)).await.unwrap();
  assert_eq!(s.outcome().version(), v(5));
  assert!(s.tables().await.unwrap().contains(&"way_geometry".to_owned()));
  drop(s);

  let s = SqliteStore::open(&path).await.unwrap();
  let OpenOutcome::Upgraded { from, report, .. } = s.outcome() else {
    panic!("expected an upgrade, got {:?}", s.outcome());
  };
  assert_eq!(*from, v(5));
  assert_eq!(report.applied.first(), Some(&v(5)));
}

#[tokio::test]
async fn newer_database_is_refused_and_untouched() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("waymark.db");
  {
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE future (x INTEGER)").unwrap();
    conn.pragma_update(None, "user_version", 20).unwrap();
  }

  let err = SqliteStore::open(&path).await.err().unwrap();
  assert!(matches!(
    err,
    Error::Schema(waymark_core::Error::Downgrade { stored, target })
      if stored == v(20) && target == SchemaVersion::CURRENT
  ));
  assert_eq!(read_version(&path).unwrap(), Some(v(20)));
  assert_eq!(journal_mode(&path), "delete");
}

#[tokio::test]
async fn failed_upgrade_leaves_file_at_its_version() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("waymark.db");
  write_v1(&path);
  {
    // 5 -> 6 adds a column to this table and fails without it.
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("DROP TABLE osm_note_edits").unwrap();
  }

  let err = SqliteStore::open(&path).await.err().unwrap();
  assert!(matches!(
    err,
    Error::Schema(waymark_core::Error::Statement { .. })
  ));

  assert_eq!(read_version(&path).unwrap(), Some(v(1)));
  let conn = Connection::open(&path).unwrap();
  assert!(!exists(&conn, "created_elements"));
  assert!(!exists(&conn, "way_geometry"));
  assert!(exists(&conn, "elements_geometry"));
  assert!(exists(&conn, "new_achievements"));
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM elements_geometry"), 6);
  drop(conn);
  assert_eq!(journal_mode(&path), "delete");
}

#[tokio::test]
async fn successful_open_switches_to_wal() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("waymark.db");
  drop(SqliteStore::open(&path).await.unwrap());
  assert_eq!(journal_mode(&path), "wal");
}

#[tokio::test]
async fn unsupported_targets_are_refused() {
  let dir = tempfile::tempdir().unwrap();

  let path = dir.path().join("fresh.db");
  let err = SqliteStore::open_at_version(&path, v(5)).await.err().unwrap();
  assert!(matches!(err, Error::UnsupportedTarget { .. }));
  assert_eq!(read_version(&path).unwrap(), Some(SchemaVersion::EMPTY));

  let beyond = SchemaVersion::CURRENT.next();
  let err = SqliteStore::open_at_version(&path, beyond).await.err().unwrap();
  assert!(matches!(err, Error::UnsupportedTarget { target, .. } if target == beyond));
}

// ─── Statement primitives ────────────────────────────────────────────────────

#[tokio::test]
async fn insert_query_update_delete() {
  let s = store().await;

  let id = s
    .insert("logs", vec![
      ("level".into(), Value::from("W")),
      ("tag".into(), Value::from("Upload")),
      ("message".into(), Value::from("changeset conflict")),
      ("error".into(), Value::Null),
      ("timestamp".into(), Value::from(1_700_000_000_i64)),
    ])
    .await
    .unwrap();
  assert_eq!(id, 1);

  let by_id = Predicate::eq("id", id);
  let rows = s
    .query(
      "logs",
      vec!["tag".into(), "error".into()],
      Some(by_id.clone()),
    )
    .await
    .unwrap();
  assert_eq!(rows, vec![vec![Value::from("Upload"), Value::Null]]);

  let changed = s
    .update(
      "logs",
      vec![("error".into(), Value::from("409"))],
      Some(by_id.clone().and(Predicate::is_null("error"))),
    )
    .await
    .unwrap();
  assert_eq!(changed, 1);

  let rows = s
    .query("logs", vec!["error".into()], Some(by_id.clone()))
    .await
    .unwrap();
  assert_eq!(rows[0][0].as_text(), Some("409"));

  assert_eq!(s.delete("logs", Some(by_id)).await.unwrap(), 1);
  assert!(s.query("logs", vec![], None).await.unwrap().is_empty());
}

#[tokio::test]
async fn exec_runs_raw_statements() {
  let s = store().await;
  s.exec(
    "INSERT INTO active_days VALUES ('2024-05-01');
     INSERT INTO active_days VALUES ('2024-05-02');",
  )
  .await
  .unwrap();
  assert_eq!(s.delete("active_days", None).await.unwrap(), 2);
}

#[tokio::test]
async fn statement_errors_surface() {
  let s = store().await;
  let err = s.query("no_such_table", vec![], None).await.err().unwrap();
  assert!(matches!(err, Error::Database(_)));
}
