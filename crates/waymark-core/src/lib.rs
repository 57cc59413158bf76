//! Schema catalog, migration registry and migration engine for the Waymark
//! local store.
//!
//! No SQLite binding lives here. The engine is written against the
//! [`Database`](database::Database) trait; `waymark-store-sqlite` provides
//! the real implementation.

pub mod catalog;
pub mod database;
pub mod engine;
pub mod error;
pub mod registry;
pub mod sql;
pub mod table;
pub mod value;
pub mod version;

pub use error::{Error, Result};
pub use version::SchemaVersion;
