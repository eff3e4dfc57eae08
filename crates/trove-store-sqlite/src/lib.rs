//! SQLite backend for the Trove record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Records are kept as JSON documents in a
//! single table; child lookups go through `json_extract` on the foreign-key
//! field named by the entity graph.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
