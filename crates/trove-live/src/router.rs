//! Fan-out of comment notifications to subscribed connections.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  protocol::ServerMessage,
  registry::ConnectionRegistry,
};

/// A serialised server message addressed to one item's subscribers.
#[derive(Debug, Clone)]
pub struct Notification {
  pub item:    Uuid,
  pub payload: Arc<str>,
}

impl Notification {
  pub fn new(message: &ServerMessage) -> Result<Self> {
    Ok(Self {
      item:    message.item(),
      payload: Arc::from(serde_json::to_string(message)?),
    })
  }
}

/// What happened to one notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
  pub delivered: usize,
  /// Queue full; the event was skipped for that connection only.
  pub dropped:   usize,
  /// Queue closed; the connection was deregistered.
  pub closed:    usize,
}

#[derive(Clone)]
pub struct FanoutRouter {
  registry: Arc<ConnectionRegistry>,
}

impl FanoutRouter {
  pub fn new(registry: Arc<ConnectionRegistry>) -> Self { Self { registry } }

  pub fn registry(&self) -> &Arc<ConnectionRegistry> { &self.registry }

  /// Queue `notification` on every connection subscribed to its item.
  ///
  /// Never waits on a connection: a full queue loses this event, a closed one
  /// is deregistered. Neither affects delivery to the others.
  pub async fn dispatch(&self, notification: &Notification) -> DispatchReport {
    let mut report = DispatchReport::default();

    for (conn, tx) in self.registry.subscribers(notification.item).await {
      match tx.try_send(notification.payload.clone()) {
        Ok(()) => report.delivered += 1,
        Err(TrySendError::Full(_)) => {
          warn!(%conn, item = %notification.item, "outbound queue full; event dropped");
          report.dropped += 1;
        }
        Err(TrySendError::Closed(_)) => {
          let err = Error::Delivery { conn };
          warn!(error = %err, "deregistering connection");
          self.registry.deregister(conn).await;
          report.closed += 1;
        }
      }
    }

    debug!(
      item = %notification.item,
      delivered = report.delivered,
      dropped = report.dropped,
      closed = report.closed,
      "notification dispatched"
    );
    report
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn note(item: Uuid, text: &str) -> Notification {
    Notification { item, payload: Arc::from(text) }
  }

  #[tokio::test]
  async fn delivers_only_to_matching_item() {
    let reg = Arc::new(ConnectionRegistry::new(4));
    let (a, mut ra) = reg.register().await;
    let (b, mut rb) = reg.register().await;
    let (_c, mut rc) = reg.register().await;
    let x = Uuid::new_v4();
    let y = Uuid::new_v4();
    reg.subscribe(a, x).await;
    reg.subscribe(b, y).await;

    let router = FanoutRouter::new(reg);
    let report = router.dispatch(&note(x, "for x")).await;

    assert_eq!(report, DispatchReport { delivered: 1, dropped: 0, closed: 0 });
    assert_eq!(ra.recv().await.as_deref(), Some("for x"));
    assert!(rb.try_recv().is_err());
    assert!(rc.try_recv().is_err());
  }

  #[tokio::test]
  async fn full_queue_does_not_block_others() {
    let reg = Arc::new(ConnectionRegistry::new(1));
    let (slow, mut slow_rx) = reg.register().await;
    let (fast, mut fast_rx) = reg.register().await;
    let x = Uuid::new_v4();
    reg.subscribe(slow, x).await;
    reg.subscribe(fast, x).await;
    let router = FanoutRouter::new(reg.clone());

    router.dispatch(&note(x, "1")).await;
    // `fast` drains, `slow` does not.
    assert_eq!(fast_rx.recv().await.as_deref(), Some("1"));

    let report = router.dispatch(&note(x, "2")).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.dropped, 1);
    assert_eq!(fast_rx.recv().await.as_deref(), Some("2"));

    // The slow connection keeps its first event and stays registered.
    assert_eq!(slow_rx.recv().await.as_deref(), Some("1"));
    assert_eq!(reg.subscription(slow).await, Some(x));
  }

  #[tokio::test]
  async fn closed_queue_deregisters_connection() {
    let reg = Arc::new(ConnectionRegistry::new(4));
    let (gone, gone_rx) = reg.register().await;
    let (alive, mut alive_rx) = reg.register().await;
    let x = Uuid::new_v4();
    reg.subscribe(gone, x).await;
    reg.subscribe(alive, x).await;
    drop(gone_rx);

    let router = FanoutRouter::new(reg.clone());
    let report = router.dispatch(&note(x, "hi")).await;

    assert_eq!(report.closed, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(alive_rx.recv().await.as_deref(), Some("hi"));
    assert_eq!(reg.len().await, 1);
    assert!(reg.subscription(gone).await.is_none());
  }

  #[tokio::test]
  async fn no_subscribers_is_a_quiet_noop() {
    let router = FanoutRouter::new(Arc::new(ConnectionRegistry::new(4)));
    let report = router.dispatch(&note(Uuid::new_v4(), "x")).await;
    assert_eq!(report, DispatchReport::default());
  }
}
