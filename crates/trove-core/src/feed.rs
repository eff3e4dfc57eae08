//! Change feed — a live stream of document mutations emitted by the store.
//!
//! Delivery is at-most-once. A [`ChangeStream`] that falls behind or loses its
//! source reports a [`FeedError`]; the consumer is expected to open a fresh
//! stream and accept that events in between are gone.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{graph::EntityKind, store::DocumentStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
  Insert,
  Replace,
  Delete,
}

/// One mutation of one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
  pub kind:     EntityKind,
  pub op:       ChangeOp,
  pub id:       Uuid,
  /// The document after the change; `None` for deletions.
  pub document: Option<serde_json::Value>,
  pub at:       DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
  /// The store side of the feed went away.
  #[error("change feed closed")]
  Closed,

  /// The consumer fell behind and `0` events were discarded.
  #[error("change feed lagged; {0} events lost")]
  Lagged(u64),
}

/// A subscription to changes on one [`EntityKind`].
pub struct ChangeStream {
  kind: EntityKind,
  rx:   broadcast::Receiver<ChangeEvent>,
}

impl ChangeStream {
  pub fn new(kind: EntityKind, rx: broadcast::Receiver<ChangeEvent>) -> Self {
    Self { kind, rx }
  }

  pub fn kind(&self) -> EntityKind { self.kind }

  /// Wait for the next change on this stream's kind.
  pub async fn next(&mut self) -> Result<ChangeEvent, FeedError> {
    loop {
      match self.rx.recv().await {
        Ok(event) if event.kind == self.kind => return Ok(event),
        Ok(_) => continue,
        Err(broadcast::error::RecvError::Closed) => return Err(FeedError::Closed),
        Err(broadcast::error::RecvError::Lagged(n)) => {
          return Err(FeedError::Lagged(n));
        }
      }
    }
  }
}

/// A store that can stream its own mutations.
pub trait ChangeFeed: DocumentStore {
  /// Open a new stream of changes to `kind` documents.
  fn watch(
    &self,
    kind: EntityKind,
  ) -> impl Future<Output = Result<ChangeStream, Self::Error>> + Send + '_;
}
