//! Live comment delivery for Trove.
//!
//! One [`ChangeFeedSubscriber`] per process watches comment inserts, builds a
//! notification for each, and hands it to the [`FanoutRouter`], which pushes
//! it to every WebSocket connection currently subscribed to that comment's
//! item. Delivery is best-effort and at-most-once.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let registry = Arc::new(ConnectionRegistry::new(64));
//! let handle = ChangeFeedSubscriber::new(store, FanoutRouter::new(registry.clone()), config)
//!   .start()
//!   .await?;
//! app.merge(trove_live::live_router(registry))
//! ```

pub mod error;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod subscriber;
mod ws;

use std::sync::Arc;

use axum::{Router, routing::get};

pub use error::{Error, Result};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use router::{DispatchReport, FanoutRouter, Notification};
pub use subscriber::{ChangeFeedSubscriber, SubscriberConfig, SubscriberHandle};

/// `GET /live`: the WebSocket endpoint clients subscribe through.
pub fn live_router(registry: Arc<ConnectionRegistry>) -> Router<()> {
  Router::new()
    .route("/live", get(ws::upgrade))
    .with_state(registry)
}
