//! Error types for `trove-live`.

use thiserror::Error;

use crate::registry::ConnectionId;

#[derive(Debug, Error)]
pub enum Error {
  /// The change subscription dropped or could not be opened.
  #[error("change feed error: {0}")]
  ChangeFeed(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The store failed while building a notification.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// A connection's outbound queue was closed at delivery time.
  #[error("delivery to {conn} failed: connection closed")]
  Delivery { conn: ConnectionId },

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
