//! The process-wide change feed subscriber.
//!
//! Opened once at startup with [`ChangeFeedSubscriber::start`] and torn down
//! with [`SubscriberHandle::shutdown`]. While running it turns every comment
//! insert into a [`ServerMessage::Event`] and hands it to the router. If the
//! feed drops it waits `reconnect_delay` and opens a fresh one; events in the
//! gap are not replayed.

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trove_core::{
  EntityKind,
  feed::{ChangeEvent, ChangeFeed, ChangeOp, ChangeStream},
  record::{Account, Comment},
  store::RecordStore,
};

use crate::{
  Error, Result,
  protocol::ServerMessage,
  router::{FanoutRouter, Notification},
};

#[derive(Debug, Clone)]
pub struct SubscriberConfig {
  /// Pause between a dropped feed and the next attempt to open one.
  pub reconnect_delay: Duration,
}

impl Default for SubscriberConfig {
  fn default() -> Self { Self { reconnect_delay: Duration::from_secs(1) } }
}

pub struct ChangeFeedSubscriber<S> {
  store:  Arc<S>,
  router: FanoutRouter,
  config: SubscriberConfig,
}

/// Owner of a running subscriber.
pub struct SubscriberHandle {
  cancel: CancellationToken,
  task:   JoinHandle<()>,
}

impl SubscriberHandle {
  /// Stop the subscriber and wait for its task to exit.
  pub async fn shutdown(self) {
    self.cancel.cancel();
    if let Err(e) = self.task.await {
      warn!(error = %e, "change feed subscriber task failed");
    }
    info!("change feed subscriber stopped");
  }

  pub fn is_finished(&self) -> bool { self.task.is_finished() }
}

impl<S> ChangeFeedSubscriber<S>
where
  S: ChangeFeed + RecordStore + 'static,
{
  pub fn new(store: Arc<S>, router: FanoutRouter, config: SubscriberConfig) -> Self {
    Self { store, router, config }
  }

  /// Open the comment subscription and start consuming it in the background.
  ///
  /// Fails if the first subscription cannot be opened; later drops are
  /// retried indefinitely.
  pub async fn start(self) -> Result<SubscriberHandle> {
    let stream = self.open().await?;
    info!("change feed subscription open");

    let cancel = CancellationToken::new();
    let task = tokio::spawn(self.run(stream, cancel.clone()));
    Ok(SubscriberHandle { cancel, task })
  }

  async fn open(&self) -> Result<ChangeStream> {
    self
      .store
      .watch(EntityKind::Comment)
      .await
      .map_err(|e| Error::ChangeFeed(Box::new(e)))
  }

  async fn run(self, first: ChangeStream, cancel: CancellationToken) {
    let mut next = Some(first);

    loop {
      let stream = match next.take() {
        Some(stream) => stream,
        None => match self.open().await {
          Ok(stream) => {
            info!("change feed subscription reopened");
            stream
          }
          Err(e) => {
            warn!(error = %e, "could not reopen change feed");
            if self.pause(&cancel).await {
              break;
            }
            continue;
          }
        },
      };

      match self.consume(stream, &cancel).await {
        Ok(()) => break,
        Err(e) => warn!(
          error = %e,
          delay_ms = self.config.reconnect_delay.as_millis() as u64,
          "change feed interrupted; reconnecting"
        ),
      }

      if self.pause(&cancel).await {
        break;
      }
    }
  }

  /// Sleep out the reconnect delay. Returns `true` if cancelled meanwhile.
  async fn pause(&self, cancel: &CancellationToken) -> bool {
    tokio::select! {
      _ = cancel.cancelled() => true,
      _ = sleep(self.config.reconnect_delay) => false,
    }
  }

  /// Drain `stream` until it fails (`Err`) or `cancel` fires (`Ok`).
  async fn consume(&self, mut stream: ChangeStream, cancel: &CancellationToken) -> Result<()> {
    loop {
      let event = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        event = stream.next() => event.map_err(|e| Error::ChangeFeed(Box::new(e)))?,
      };

      match self.notification(&event).await {
        Ok(Some(notification)) => {
          self.router.dispatch(&notification).await;
        }
        Ok(None) => {}
        Err(e) => warn!(id = %event.id, error = %e, "could not build comment notification"),
      }
    }
  }

  /// Build the notification for a comment change, or `None` when there is
  /// nothing to announce.
  pub async fn notification(&self, event: &ChangeEvent) -> Result<Option<Notification>> {
    if event.kind != EntityKind::Comment || event.op != ChangeOp::Insert {
      return Ok(None);
    }
    let Some(document) = &event.document else {
      return Ok(None);
    };
    let comment: Comment = serde_json::from_value(document.clone())?;

    let author = self
      .store
      .get::<Account>(comment.author)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;
    let Some(author) = author else {
      debug!(comment = %comment.id, author = %comment.author, "comment author missing; event dropped");
      return Ok(None);
    };

    let message = ServerMessage::comment(&comment, &author);
    Ok(Some(Notification::new(&message)?))
  }
}
