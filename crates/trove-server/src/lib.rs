//! Wiring for the Trove server: configuration and the composed router.
//!
//! The binary in `main.rs` owns the process-wide pieces (store handle,
//! change feed subscriber); everything here is plain construction so it can
//! be tested without binding a socket.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use trove_core::store::RecordStore;
use trove_live::{ConnectionRegistry, SubscriberConfig};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TROVE_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  pub store_path:              PathBuf,
  /// Give up opening the store after this long.
  pub connect_timeout_secs:    u64,
  /// Pause before re-opening a dropped change feed.
  pub feed_reconnect_delay_ms: u64,
  /// Outbound queue depth per live connection.
  pub connection_queue:        usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                    "127.0.0.1".to_string(),
      port:                    8080,
      store_path:              PathBuf::from("trove.db"),
      connect_timeout_secs:    5,
      feed_reconnect_delay_ms: 1000,
      connection_queue:        64,
    }
  }
}

impl ServerConfig {
  /// Read `path` (optional) and overlay `TROVE_*` environment variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("TROVE").try_parsing(true))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn connect_timeout(&self) -> Duration { Duration::from_secs(self.connect_timeout_secs) }

  pub fn subscriber(&self) -> SubscriberConfig {
    SubscriberConfig {
      reconnect_delay: Duration::from_millis(self.feed_reconnect_delay_ms),
    }
  }

  /// `store_path` with a leading `~` expanded to the user's home directory.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// REST API plus the `/live` WebSocket, with request tracing.
pub fn app<S>(store: Arc<S>, registry: Arc<ConnectionRegistry>) -> Router
where
  S: RecordStore + 'static,
{
  Router::new()
    .merge(trove_api::api_router(store))
    .merge(trove_live::live_router(registry))
    .layer(TraceLayer::new_for_http())
}
