//! The schema version stamped on every database file.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer tag identifying the structural shape of the local store.
///
/// `0` is reserved for "no schema yet"; the first released shape is `1`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct SchemaVersion(u32);

impl SchemaVersion {
  /// Version of a database that has never been initialised.
  pub const EMPTY: Self = Self(0);

  /// The schema version this build creates and upgrades to.
  pub const CURRENT: Self = Self(13);

  pub const fn new(version: u32) -> Self { Self(version) }

  pub const fn get(self) -> u32 { self.0 }

  pub const fn is_empty(self) -> bool { self.0 == 0 }

  /// The version directly after this one.
  pub const fn next(self) -> Self { Self(self.0 + 1) }
}

impl From<u32> for SchemaVersion {
  fn from(v: u32) -> Self { Self(v) }
}

impl fmt::Display for SchemaVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}
