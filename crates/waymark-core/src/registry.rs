//! The migration step registry: one [`MigrationStep`] per version boundary,
//! in ascending order.
//!
//! Steps hardcode the historical table shapes they touch. New tables they
//! create come from the catalog, because at the time the step was written
//! that *was* the current shape.

use std::fmt;

use serde::Serialize;
use strum::Display;

use crate::{
  SchemaVersion,
  catalog,
  table::{Column, IndexDefinition, TableDefinition, text},
};

// ─── Actions ─────────────────────────────────────────────────────────────────

/// Where a column of a [`CopyRows`] destination takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ColumnSource {
  /// A column of the source table.
  Column(&'static str),
  /// A raw SQL literal, e.g. `0`.
  Literal(&'static str),
}

/// `INSERT INTO dest (...) SELECT ... FROM source [WHERE column = 'value']`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CopyRows {
  pub source:  &'static str,
  pub dest:    &'static str,
  /// `(destination column, source)` pairs.
  pub columns: &'static [(&'static str, ColumnSource)],
  /// Only rows whose discriminator column equals the given value.
  pub filter:  Option<(&'static str, &'static str)>,
}

impl CopyRows {
  pub fn to_sql(&self) -> String {
    let dest_columns = self
      .columns
      .iter()
      .map(|(dest, _)| *dest)
      .collect::<Vec<_>>()
      .join(", ");
    let projection = self
      .columns
      .iter()
      .map(|(_, source)| match source {
        ColumnSource::Column(c) | ColumnSource::Literal(c) => *c,
      })
      .collect::<Vec<_>>()
      .join(", ");
    let filter = self
      .filter
      .map(|(column, value)| {
        format!(" WHERE {column} = {}", crate::sql::quote_literal(value))
      })
      .unwrap_or_default();
    format!(
      "INSERT INTO {} ({dest_columns}) SELECT {projection} FROM {}{filter}",
      self.dest, self.source
    )
  }
}

/// One schema or data operation. Every action is safe to run twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
  /// Create a table (without its indexes).
  CreateTable { table: &'static TableDefinition },
  DropTable { table: &'static str },
  /// Skipped when `from` no longer exists.
  RenameTable {
    from: &'static str,
    to:   &'static str,
  },
  CreateIndex { index: &'static IndexDefinition },
  DropIndex { index: &'static str },
  /// Skipped when the column already exists.
  AddColumn {
    table:  &'static str,
    column: Column,
  },
  /// Skipped when the source table no longer exists.
  CopyRows(CopyRows),
  RenameValue {
    table:  &'static str,
    column: &'static str,
    from:   &'static str,
    to:     &'static str,
  },
  /// Delete all rows, or only rows where `column = value`.
  Delete {
    table:    &'static str,
    matching: Option<(&'static str, &'static str)>,
  },
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Action::CreateTable { table } => write!(f, "create table {}", table.name),
      Action::DropTable { table } => write!(f, "drop table {table}"),
      Action::RenameTable { from, to } => {
        write!(f, "rename table {from} to {to}")
      }
      Action::CreateIndex { index } => write!(f, "create index {}", index.name),
      Action::DropIndex { index } => write!(f, "drop index {index}"),
      Action::AddColumn { table, column } => {
        write!(f, "add column {table}.{}", column.name)
      }
      Action::CopyRows(copy) => match copy.filter {
        Some((column, value)) => write!(
          f,
          "copy rows from {} to {} where {column} = {value}",
          copy.source, copy.dest
        ),
        None => write!(f, "copy rows from {} to {}", copy.source, copy.dest),
      },
      Action::RenameValue {
        table,
        column,
        from,
        to,
      } => write!(f, "rename {table}.{column} value {from} to {to}"),
      Action::Delete {
        table,
        matching: Some((column, value)),
      } => write!(f, "delete from {table} where {column} = {value}"),
      Action::Delete {
        table,
        matching: None,
      } => write!(f, "delete all rows from {table}"),
    }
  }
}

// ─── Steps ───────────────────────────────────────────────────────────────────

/// Rows a step discards on purpose because no lossless transform exists.
/// Surfaced to the user by the host; not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataLoss {
  /// Local edits that were not uploaded yet.
  UnsyncedEdits,
  /// Downloaded map data; re-fetched on the next download.
  CachedMapData,
}

/// The upgrade across one version boundary, `from` → `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationStep {
  pub from:      SchemaVersion,
  pub to:        SchemaVersion,
  pub summary:   &'static str,
  pub actions:   &'static [Action],
  pub data_loss: Option<DataLoss>,
}

impl MigrationStep {
  /// Whether this step lies inside an upgrade from `stored` to `target`.
  pub fn applies(&self, stored: SchemaVersion, target: SchemaVersion) -> bool {
    stored <= self.from && self.from < target
  }
}

// Historical shapes and identifiers referenced by the steps below.
const QUEST_VISIBILITY_ASIDE: &str = "quest_visibility_old";
const ELEMENTS_GEOMETRY: &str = "elements_geometry";
const ELEMENT_EDITS_INDEX_V10: &str = "osm_element_edits_index";

const GEOMETRY_COPY_COLUMNS: &[(&str, ColumnSource)] = &[
  ("id", ColumnSource::Column("element_id")),
  ("geometry_polylines", ColumnSource::Column("geometry_polylines")),
  ("geometry_polygons", ColumnSource::Column("geometry_polygons")),
  ("center_latitude", ColumnSource::Column("center_latitude")),
  ("center_longitude", ColumnSource::Column("center_longitude")),
];

const NOTE_EDITS_TRACK: Column = text("track").with_default("'[]'");

/// A removed quest whose pending edits can no longer be applied.
pub const RETIRED_QUEST_TYPE: &str = "AddShoulder";

const RENAMED_QUEST_FROM: &str = "AddPicnicTableCover";
const RENAMED_QUEST_TO: &str = "AddAmenityCover";

const fn rename_quest(table: &'static str, column: &'static str) -> Action {
  Action::RenameValue {
    table,
    column,
    from: RENAMED_QUEST_FROM,
    to: RENAMED_QUEST_TO,
  }
}

const fn clear(table: &'static str) -> Action {
  Action::Delete {
    table,
    matching: None,
  }
}

const fn v(version: u32) -> SchemaVersion { SchemaVersion::new(version) }

static STEPS: &[MigrationStep] = &[
  MigrationStep {
    from:      v(1),
    to:        v(2),
    summary:   "track locally created elements",
    actions:   &[Action::CreateTable {
      table: &catalog::CREATED_ELEMENTS,
    }],
    data_loss: None,
  },
  MigrationStep {
    from:      v(2),
    to:        v(3),
    summary:   "scope quest visibility and order to presets",
    actions:   &[
      Action::CreateTable {
        table: &catalog::QUEST_ORDER,
      },
      Action::CreateIndex {
        index: &catalog::QUEST_ORDER_INDEX,
      },
      Action::CreateTable {
        table: &catalog::QUEST_PRESETS,
      },
      Action::RenameTable {
        from: "quest_visibility",
        to:   QUEST_VISIBILITY_ASIDE,
      },
      Action::CreateTable {
        table: &catalog::VISIBLE_QUEST_TYPES,
      },
      Action::CopyRows(CopyRows {
        source:  QUEST_VISIBILITY_ASIDE,
        dest:    "quest_visibility",
        columns: &[
          ("quest_preset_id", ColumnSource::Literal("0")),
          ("quest_type", ColumnSource::Column("quest_type")),
          ("visibility", ColumnSource::Column("visibility")),
        ],
        filter:  None,
      }),
      Action::DropTable {
        table: QUEST_VISIBILITY_ASIDE,
      },
    ],
    data_loss: None,
  },
  MigrationStep {
    from:      v(3),
    to:        v(4),
    summary:   "drop unused new_achievements table",
    actions:   &[Action::DropTable {
      table: "new_achievements",
    }],
    data_loss: None,
  },
  MigrationStep {
    from:      v(4),
    to:        v(5),
    summary:   "split element geometry into way and relation geometry",
    actions:   &[
      Action::CreateIndex {
        index: &catalog::NODES_SPATIAL_INDEX,
      },
      Action::CreateTable {
        table: &catalog::WAY_GEOMETRY,
      },
      Action::CreateTable {
        table: &catalog::RELATION_GEOMETRY,
      },
      Action::CopyRows(CopyRows {
        source:  ELEMENTS_GEOMETRY,
        dest:    "way_geometry",
        columns: GEOMETRY_COPY_COLUMNS,
        filter:  Some(("element_type", "WAY")),
      }),
      Action::CopyRows(CopyRows {
        source:  ELEMENTS_GEOMETRY,
        dest:    "relation_geometry",
        columns: GEOMETRY_COPY_COLUMNS,
        filter:  Some(("element_type", "RELATION")),
      }),
      Action::DropTable {
        table: ELEMENTS_GEOMETRY,
      },
    ],
    data_loss: None,
  },
  MigrationStep {
    from:      v(5),
    to:        v(6),
    summary:   "record a GPS track with note edits",
    actions:   &[Action::AddColumn {
      table:  "osm_note_edits",
      column: NOTE_EDITS_TRACK,
    }],
    data_loss: None,
  },
  MigrationStep {
    from:      v(6),
    to:        v(7),
    summary:   "add current-week statistics and active days",
    actions:   &[
      Action::CreateTable {
        table: &catalog::EDIT_TYPE_STATISTICS_CURRENT_WEEK,
      },
      Action::CreateTable {
        table: &catalog::COUNTRY_STATISTICS_CURRENT_WEEK,
      },
      Action::CreateTable {
        table: &catalog::ACTIVE_DAYS,
      },
    ],
    data_loss: None,
  },
  MigrationStep {
    from:      v(7),
    to:        v(8),
    summary:   "discard edits of the removed AddShoulder quest",
    actions:   &[Action::Delete {
      table:    "osm_element_edits",
      matching: Some(("quest_type", RETIRED_QUEST_TYPE)),
    }],
    data_loss: Some(DataLoss::UnsyncedEdits),
  },
  MigrationStep {
    from:      v(8),
    to:        v(9),
    summary:   "rename AddPicnicTableCover to AddAmenityCover",
    actions:   &[
      rename_quest("osm_element_edits", "quest_type"),
      rename_quest("osm_quests", "quest_type"),
      rename_quest("osm_quests_hidden", "quest_type"),
      rename_quest("quest_visibility", "quest_type"),
      rename_quest("open_changesets", "quest_type"),
      rename_quest("quest_order", "before_quest_type"),
      rename_quest("quest_order", "after_quest_type"),
    ],
    data_loss: None,
  },
  MigrationStep {
    from:      v(9),
    to:        v(10),
    summary:   "reset downloaded tiles bookkeeping",
    actions:   &[
      Action::DropTable {
        table: "downloaded_tiles",
      },
      Action::CreateTable {
        table: &catalog::DOWNLOADED_TILES,
      },
    ],
    data_loss: None,
  },
  MigrationStep {
    from:      v(10),
    to:        v(11),
    summary:   "recreate element edits for the new action encoding",
    actions:   &[
      Action::DropIndex {
        index: ELEMENT_EDITS_INDEX_V10,
      },
      Action::DropTable {
        table: "osm_element_edits",
      },
      Action::CreateTable {
        table: &catalog::ELEMENT_EDITS,
      },
      Action::CreateTable {
        table: &catalog::EDIT_ELEMENTS,
      },
      Action::CreateIndex {
        index: &catalog::EDIT_ELEMENTS_INDEX,
      },
      Action::CreateIndex {
        index: &catalog::ELEMENT_ID_PROVIDER_ELEMENT_INDEX,
      },
    ],
    data_loss: Some(DataLoss::UnsyncedEdits),
  },
  MigrationStep {
    from:      v(11),
    to:        v(12),
    summary:   "discard map data stored in the old geometry encoding",
    actions:   &[
      clear("osm_relation_members"),
      clear("osm_relations"),
      clear("osm_way_nodes"),
      clear("osm_ways"),
      clear("osm_nodes"),
      clear("relation_geometry"),
      clear("way_geometry"),
      clear("downloaded_tiles"),
    ],
    data_loss: Some(DataLoss::CachedMapData),
  },
  MigrationStep {
    from:      v(12),
    to:        v(13),
    summary:   "add the logs table",
    actions:   &[
      Action::CreateTable {
        table: &catalog::LOGS,
      },
      Action::CreateIndex {
        index: &catalog::LOGS_TIMESTAMP_INDEX,
      },
    ],
    data_loss: None,
  },
];

/// Every migration step, ordered by `from` ascending.
pub fn steps() -> &'static [MigrationStep] { STEPS }
