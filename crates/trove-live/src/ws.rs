//! The `/live` WebSocket handler.

use std::sync::Arc;

use axum::{
  extract::{
    State,
    ws::{Message, WebSocket, WebSocketUpgrade},
  },
  response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info};

use crate::{protocol::ClientMessage, registry::ConnectionRegistry};

/// `GET /live`
pub async fn upgrade(
  ws: WebSocketUpgrade,
  State(registry): State<Arc<ConnectionRegistry>>,
) -> Response {
  ws.on_upgrade(move |socket| serve(socket, registry))
}

async fn serve(socket: WebSocket, registry: Arc<ConnectionRegistry>) {
  let (id, mut outbound) = registry.register().await;
  let (mut sink, mut incoming) = socket.split();
  info!(conn = %id, "live connection opened");

  // Writes are drained here so the router never waits on the socket.
  let writer = tokio::spawn(async move {
    while let Some(payload) = outbound.recv().await {
      if sink.send(Message::Text(payload.as_ref().into())).await.is_err() {
        break;
      }
    }
  });

  while let Some(frame) = incoming.next().await {
    match frame {
      Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
        Ok(ClientMessage::Subscribe { item }) => {
          registry.subscribe(id, item).await;
        }
        Err(e) => debug!(conn = %id, error = %e, "ignoring unparseable frame"),
      },
      Ok(Message::Close(_)) => break,
      Ok(_) => {}
      Err(e) => {
        debug!(conn = %id, error = %e, "live connection read failed");
        break;
      }
    }
  }

  registry.deregister(id).await;
  writer.abort();
  info!(conn = %id, "live connection closed");
}
