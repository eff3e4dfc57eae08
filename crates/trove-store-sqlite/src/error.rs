//! Error type for `trove-store-sqlite`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A field name that cannot be used as a JSON path segment.
  #[error("invalid field name: {0:?}")]
  InvalidField(String),

  #[error("timed out opening store after {0:?}")]
  ConnectTimeout(Duration),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
