//! SQLite backend for the Waymark local store.
//!
//! Opening a [`SqliteStore`] creates or upgrades the schema before the handle
//! is returned. Wraps [`tokio_rusqlite`] so all database access runs on a
//! dedicated thread without blocking the async runtime.

mod encode;
mod session;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use session::Session;
pub use store::{OpenOutcome, SqliteStore, initialize, read_version};

#[cfg(test)]
mod tests;
