//! The schema catalog: the shape of every table and index the current build
//! needs.
//!
//! Only used to create a fresh database. Upgrades never derive old shapes
//! from here; see [`crate::registry`].

use crate::table::{
  IndexDefinition, PrimaryKey, TableDefinition, blob, integer, real, text,
};

// ─── OSM notes ───────────────────────────────────────────────────────────────

pub const NOTES_SPATIAL_INDEX: IndexDefinition =
  IndexDefinition::new("osm_notes_spatial_index", "osm_notes", &[
    "latitude",
    "longitude",
  ]);

pub const NOTES: TableDefinition = TableDefinition {
  name:        "osm_notes",
  columns:     &[
    integer("id"),
    real("latitude"),
    real("longitude"),
    integer("created"),
    integer("last_sync"),
    text("status"),
    integer("closed").nullable(),
    text("comments"),
  ],
  primary_key: PrimaryKey::Columns(&["id"]),
  indexes:     &[NOTES_SPATIAL_INDEX],
};

pub const NOTE_EDITS: TableDefinition = TableDefinition {
  name:        "osm_note_edits",
  columns:     &[
    integer("id"),
    integer("note_id"),
    real("latitude"),
    real("longitude"),
    integer("created"),
    integer("synced"),
    text("text").nullable(),
    text("images_paths"),
    integer("images_need_activation"),
    text("edit_action"),
    // GPS trace recorded while the note was written, as a JSON array.
    text("track").with_default("'[]'"),
  ],
  primary_key: PrimaryKey::AutoIncrement("id"),
  indexes:     &[
    IndexDefinition::new("osm_note_edits_spatial_index", "osm_note_edits", &[
      "latitude",
      "longitude",
    ]),
    IndexDefinition::new("osm_note_edits_note_index", "osm_note_edits", &[
      "note_id",
    ]),
  ],
};

// ─── OSM map data ────────────────────────────────────────────────────────────

/// Geometry blobs are opaque here; their encoding is owned by the geometry
/// codec and is tied to the schema version.
pub const WAY_GEOMETRY: TableDefinition = TableDefinition {
  name:        "way_geometry",
  columns:     &[
    integer("id"),
    blob("geometry_polylines").nullable(),
    blob("geometry_polygons").nullable(),
    real("center_latitude"),
    real("center_longitude"),
  ],
  primary_key: PrimaryKey::Columns(&["id"]),
  indexes:     &[],
};

pub const RELATION_GEOMETRY: TableDefinition = TableDefinition {
  name: "relation_geometry",
  ..WAY_GEOMETRY
};

pub const NODES_SPATIAL_INDEX: IndexDefinition =
  IndexDefinition::new("osm_nodes_spatial_index", "osm_nodes", &[
    "latitude",
    "longitude",
  ]);

pub const NODES: TableDefinition = TableDefinition {
  name:        "osm_nodes",
  columns:     &[
    integer("id"),
    integer("version"),
    real("latitude"),
    real("longitude"),
    text("tags").nullable(),
    integer("timestamp"),
    integer("last_sync"),
  ],
  primary_key: PrimaryKey::Columns(&["id"]),
  indexes:     &[NODES_SPATIAL_INDEX],
};

pub const WAYS: TableDefinition = TableDefinition {
  name:        "osm_ways",
  columns:     &[
    integer("id"),
    integer("version"),
    text("tags").nullable(),
    integer("timestamp"),
    integer("last_sync"),
  ],
  primary_key: PrimaryKey::Columns(&["id"]),
  indexes:     &[],
};

pub const WAY_NODES: TableDefinition = TableDefinition {
  name:        "osm_way_nodes",
  columns:     &[integer("id"), integer("node_id"), integer("idx")],
  primary_key: PrimaryKey::None,
  indexes:     &[
    IndexDefinition::new("osm_way_nodes_index", "osm_way_nodes", &["id"]),
    IndexDefinition::new("osm_ways_by_node_id_index", "osm_way_nodes", &[
      "node_id",
    ]),
  ],
};

pub const RELATIONS: TableDefinition = TableDefinition {
  name: "osm_relations",
  ..WAYS
};

pub const RELATION_MEMBERS: TableDefinition = TableDefinition {
  name:        "osm_relation_members",
  columns:     &[
    integer("id"),
    integer("idx"),
    integer("ref"),
    text("type"),
    text("role"),
  ],
  primary_key: PrimaryKey::None,
  indexes:     &[
    IndexDefinition::new(
      "osm_relation_members_index",
      "osm_relation_members",
      &["id"],
    ),
    IndexDefinition::new(
      "osm_relation_members_by_element_index",
      "osm_relation_members",
      &["ref", "type"],
    ),
  ],
};

// ─── Edits on OSM map data ───────────────────────────────────────────────────

pub const ELEMENT_EDITS: TableDefinition = TableDefinition {
  name:        "osm_element_edits",
  columns:     &[
    integer("id"),
    text("quest_type"),
    text("source"),
    real("latitude"),
    real("longitude"),
    integer("created"),
    integer("synced"),
    // Serialized edit action; the encoding is tied to the schema version.
    text("edit_action"),
    integer("is_near_user_location"),
  ],
  primary_key: PrimaryKey::AutoIncrement("id"),
  indexes:     &[],
};

pub const ELEMENT_ID_PROVIDER_ELEMENT_INDEX: IndexDefinition =
  IndexDefinition::new(
    "element_id_provider_element_index",
    "element_id_provider",
    &["element_type", "element_id"],
  );

pub const ELEMENT_ID_PROVIDER: TableDefinition = TableDefinition {
  name:        "element_id_provider",
  columns:     &[
    integer("id"),
    integer("edit_id"),
    text("element_type"),
    integer("element_id"),
  ],
  primary_key: PrimaryKey::AutoIncrement("id"),
  indexes:     &[
    IndexDefinition::new("element_id_provider_index", "element_id_provider", &[
      "edit_id",
    ]),
    ELEMENT_ID_PROVIDER_ELEMENT_INDEX,
  ],
};

pub const EDIT_ELEMENTS_INDEX: IndexDefinition =
  IndexDefinition::new("edit_elements_index", "edit_elements", &[
    "element_type",
    "element_id",
  ]);

pub const EDIT_ELEMENTS: TableDefinition = TableDefinition {
  name:        "edit_elements",
  columns:     &[
    integer("edit_id"),
    text("element_type"),
    integer("element_id"),
  ],
  primary_key: PrimaryKey::None,
  indexes:     &[EDIT_ELEMENTS_INDEX],
};

/// Elements created locally that have not been uploaded yet.
pub const CREATED_ELEMENTS: TableDefinition = TableDefinition {
  name:        "created_elements",
  columns:     &[text("element_type"), integer("element_id")],
  primary_key: PrimaryKey::Columns(&["element_type", "element_id"]),
  indexes:     &[],
};

// ─── Quests ──────────────────────────────────────────────────────────────────

/// Preset id every installation starts with.
pub const DEFAULT_QUEST_PRESET_ID: i64 = 0;

pub const VISIBLE_QUEST_TYPES: TableDefinition = TableDefinition {
  name:        "quest_visibility",
  columns:     &[
    integer("quest_preset_id"),
    text("quest_type"),
    integer("visibility"),
  ],
  primary_key: PrimaryKey::Columns(&["quest_preset_id", "quest_type"]),
  indexes:     &[],
};

pub const QUEST_ORDER_INDEX: IndexDefinition =
  IndexDefinition::new("quest_order_index", "quest_order", &[
    "quest_preset_id",
  ]);

pub const QUEST_ORDER: TableDefinition = TableDefinition {
  name:        "quest_order",
  columns:     &[
    integer("quest_preset_id"),
    text("before_quest_type"),
    text("after_quest_type"),
  ],
  primary_key: PrimaryKey::None,
  indexes:     &[QUEST_ORDER_INDEX],
};

pub const QUEST_PRESETS: TableDefinition = TableDefinition {
  name:        "quest_presets",
  columns:     &[integer("quest_preset_id"), text("quest_preset_name")],
  primary_key: PrimaryKey::AutoIncrement("quest_preset_id"),
  indexes:     &[],
};

pub const OSM_QUESTS: TableDefinition = TableDefinition {
  name:        "osm_quests",
  columns:     &[
    text("quest_type"),
    text("element_type"),
    integer("element_id"),
    real("latitude"),
    real("longitude"),
  ],
  primary_key: PrimaryKey::Columns(&[
    "quest_type",
    "element_type",
    "element_id",
  ]),
  indexes:     &[IndexDefinition::new(
    "osm_quests_spatial_index",
    "osm_quests",
    &["latitude", "longitude"],
  )],
};

pub const OSM_QUESTS_HIDDEN: TableDefinition = TableDefinition {
  name:        "osm_quests_hidden",
  columns:     &[
    text("quest_type"),
    text("element_type"),
    integer("element_id"),
    integer("timestamp"),
  ],
  primary_key: PrimaryKey::Columns(&[
    "quest_type",
    "element_type",
    "element_id",
  ]),
  indexes:     &[],
};

pub const NOTE_QUESTS_HIDDEN: TableDefinition = TableDefinition {
  name:        "osm_notequests_hidden",
  columns:     &[integer("note_id"), integer("timestamp")],
  primary_key: PrimaryKey::Columns(&["note_id"]),
  indexes:     &[],
};

// ─── Upload / download ───────────────────────────────────────────────────────

pub const OPEN_CHANGESETS: TableDefinition = TableDefinition {
  name:        "open_changesets",
  columns:     &[
    text("quest_type"),
    text("source"),
    integer("changeset_id"),
    real("last_position_latitude"),
    real("last_position_longitude"),
  ],
  primary_key: PrimaryKey::Columns(&["quest_type", "source"]),
  indexes:     &[],
};

pub const DOWNLOADED_TILES: TableDefinition = TableDefinition {
  name:        "downloaded_tiles",
  columns:     &[integer("x"), integer("y"), integer("date")],
  primary_key: PrimaryKey::Columns(&["x", "y"]),
  indexes:     &[],
};

// ─── User statistics ─────────────────────────────────────────────────────────

pub const EDIT_TYPE_STATISTICS: TableDefinition = TableDefinition {
  name:        "quest_statistics",
  columns:     &[text("element_edit_type"), integer("succeeded")],
  primary_key: PrimaryKey::Columns(&["element_edit_type"]),
  indexes:     &[],
};

pub const EDIT_TYPE_STATISTICS_CURRENT_WEEK: TableDefinition =
  TableDefinition {
    name: "quest_statistics_current_week",
    ..EDIT_TYPE_STATISTICS
  };

pub const COUNTRY_STATISTICS: TableDefinition = TableDefinition {
  name:        "country_statistics",
  columns:     &[
    text("country_code"),
    integer("succeeded"),
    integer("rank").nullable(),
  ],
  primary_key: PrimaryKey::Columns(&["country_code"]),
  indexes:     &[],
};

pub const COUNTRY_STATISTICS_CURRENT_WEEK: TableDefinition = TableDefinition {
  name: "country_statistics_current_week",
  ..COUNTRY_STATISTICS
};

pub const ACHIEVEMENTS: TableDefinition = TableDefinition {
  name:        "achievements",
  columns:     &[text("achievement"), integer("level")],
  primary_key: PrimaryKey::Columns(&["achievement"]),
  indexes:     &[],
};

pub const LINKS: TableDefinition = TableDefinition {
  name:        "links",
  columns:     &[text("link")],
  primary_key: PrimaryKey::Columns(&["link"]),
  indexes:     &[],
};

pub const ACTIVE_DAYS: TableDefinition = TableDefinition {
  name:        "active_days",
  columns:     &[text("date")],
  primary_key: PrimaryKey::Columns(&["date"]),
  indexes:     &[],
};

// ─── Quest specific ──────────────────────────────────────────────────────────

pub const WAY_TRAFFIC_FLOW: TableDefinition = TableDefinition {
  name:        "way_traffic_flow",
  columns:     &[integer("way_id"), integer("is_forward")],
  primary_key: PrimaryKey::Columns(&["way_id"]),
  indexes:     &[],
};

// ─── Logs ────────────────────────────────────────────────────────────────────

pub const LOGS_TIMESTAMP_INDEX: IndexDefinition =
  IndexDefinition::new("logs_timestamp_index", "logs", &["timestamp"]);

pub const LOGS: TableDefinition = TableDefinition {
  name:        "logs",
  columns:     &[
    integer("id"),
    text("level"),
    text("tag"),
    text("message"),
    text("error").nullable(),
    integer("timestamp"),
  ],
  primary_key: PrimaryKey::AutoIncrement("id"),
  indexes:     &[LOGS_TIMESTAMP_INDEX],
};

// ─── Full schema ─────────────────────────────────────────────────────────────

const TABLES: &[&TableDefinition] = &[
  &NOTES,
  &NOTE_EDITS,
  &WAY_GEOMETRY,
  &RELATION_GEOMETRY,
  &NODES,
  &WAYS,
  &WAY_NODES,
  &RELATIONS,
  &RELATION_MEMBERS,
  &ELEMENT_EDITS,
  &ELEMENT_ID_PROVIDER,
  &EDIT_ELEMENTS,
  &CREATED_ELEMENTS,
  &VISIBLE_QUEST_TYPES,
  &QUEST_ORDER,
  &QUEST_PRESETS,
  &OSM_QUESTS,
  &OSM_QUESTS_HIDDEN,
  &NOTE_QUESTS_HIDDEN,
  &OPEN_CHANGESETS,
  &DOWNLOADED_TILES,
  &EDIT_TYPE_STATISTICS,
  &EDIT_TYPE_STATISTICS_CURRENT_WEEK,
  &COUNTRY_STATISTICS,
  &COUNTRY_STATISTICS_CURRENT_WEEK,
  &ACHIEVEMENTS,
  &LINKS,
  &ACTIVE_DAYS,
  &WAY_TRAFFIC_FLOW,
  &LOGS,
];

/// Every table of the current schema, in creation order.
pub fn full_schema() -> &'static [&'static TableDefinition] { TABLES }

/// The complete creation script: each table followed by its indexes.
pub fn statements() -> impl Iterator<Item = String> {
  TABLES.iter().flat_map(|t| t.statements())
}

pub fn table(name: &str) -> Option<&'static TableDefinition> {
  TABLES.iter().copied().find(|t| t.name == name)
}
