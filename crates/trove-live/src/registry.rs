//! Bookkeeping for open live connections and what each one is watching.

use std::{
  collections::{HashMap, HashSet},
  fmt,
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
};

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

/// Process-unique handle for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "conn-{}", self.0) }
}

/// Sending half of a connection's outbound queue.
pub type Outbound = mpsc::Sender<Arc<str>>;

struct Connection {
  tx:   Outbound,
  item: Option<Uuid>,
}

#[derive(Default)]
struct Inner {
  connections: HashMap<ConnectionId, Connection>,
  by_item:     HashMap<Uuid, HashSet<ConnectionId>>,
}

impl Inner {
  fn unlink(&mut self, id: ConnectionId, item: Uuid) {
    if let Some(set) = self.by_item.get_mut(&item) {
      set.remove(&id);
      if set.is_empty() {
        self.by_item.remove(&item);
      }
    }
  }
}

/// Open connections, each with at most one subscribed item.
pub struct ConnectionRegistry {
  inner:    RwLock<Inner>,
  next_id:  AtomicU64,
  capacity: usize,
}

impl ConnectionRegistry {
  /// `capacity` bounds each connection's outbound queue.
  pub fn new(capacity: usize) -> Self {
    Self {
      inner:    RwLock::new(Inner::default()),
      next_id:  AtomicU64::new(1),
      capacity: capacity.max(1),
    }
  }

  /// Register a new connection with no subscription. The receiver is the
  /// connection's outbound queue; dropping it closes the queue.
  pub async fn register(&self) -> (ConnectionId, mpsc::Receiver<Arc<str>>) {
    let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let (tx, rx) = mpsc::channel(self.capacity);
    self
      .inner
      .write()
      .await
      .connections
      .insert(id, Connection { tx, item: None });
    debug!(conn = %id, "connection registered");
    (id, rx)
  }

  /// Point `id` at `item`, dropping any previous subscription. Returns
  /// `false` if the connection is not registered.
  pub async fn subscribe(&self, id: ConnectionId, item: Uuid) -> bool {
    let mut inner = self.inner.write().await;
    let Some(conn) = inner.connections.get_mut(&id) else {
      return false;
    };
    let previous = conn.item.replace(item);
    if let Some(old) = previous {
      inner.unlink(id, old);
    }
    inner.by_item.entry(item).or_default().insert(id);
    debug!(conn = %id, %item, ?previous, "connection subscribed");
    true
  }

  /// Forget `id` entirely. Returns `false` if it was already gone.
  pub async fn deregister(&self, id: ConnectionId) -> bool {
    let mut inner = self.inner.write().await;
    let Some(conn) = inner.connections.remove(&id) else {
      return false;
    };
    if let Some(item) = conn.item {
      inner.unlink(id, item);
    }
    debug!(conn = %id, "connection deregistered");
    true
  }

  /// Outbound queues of every connection subscribed to `item`.
  pub async fn subscribers(&self, item: Uuid) -> Vec<(ConnectionId, Outbound)> {
    let inner = self.inner.read().await;
    let Some(ids) = inner.by_item.get(&item) else {
      return Vec::new();
    };
    ids
      .iter()
      .filter_map(|id| inner.connections.get(id).map(|c| (*id, c.tx.clone())))
      .collect()
  }

  /// The item `id` is subscribed to, if any.
  pub async fn subscription(&self, id: ConnectionId) -> Option<Uuid> {
    self.inner.read().await.connections.get(&id).and_then(|c| c.item)
  }

  pub async fn len(&self) -> usize { self.inner.read().await.connections.len() }

  pub async fn is_empty(&self) -> bool { self.len().await == 0 }
}
