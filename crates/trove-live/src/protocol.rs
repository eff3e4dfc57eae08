//! Wire messages on the `/live` channel.
//!
//! ### Client → Server
//! ```json
//! {"type": "subscribe", "item": "<item-id>"}
//! ```
//!
//! ### Server → Client
//! ```json
//! {"type": "event", "id": "...", "date": "...", "item": "...", "message": "...",
//!  "user": {"id": "...", "name": "..."}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trove_core::record::{Account, Comment};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
  /// Replace this connection's subscription with `item`.
  Subscribe { item: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUser {
  pub id:   Uuid,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
  /// A comment was posted on the subscribed item.
  Event {
    id:      Uuid,
    date:    DateTime<Utc>,
    item:    Uuid,
    message: String,
    user:    EventUser,
  },
}

impl ServerMessage {
  pub fn comment(comment: &Comment, author: &Account) -> Self {
    ServerMessage::Event {
      id:      comment.id,
      date:    comment.created_at,
      item:    comment.item,
      message: comment.message.clone(),
      user:    EventUser { id: author.id, name: author.name.clone() },
    }
  }

  pub fn item(&self) -> Uuid {
    match self {
      ServerMessage::Event { item, .. } => *item,
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn subscribe_parses_from_tagged_json() {
    let item = Uuid::new_v4();
    let raw = json!({ "type": "subscribe", "item": item }).to_string();
    let msg: ClientMessage = serde_json::from_str(&raw).unwrap();
    assert_eq!(msg, ClientMessage::Subscribe { item });
  }

  #[test]
  fn unknown_client_type_is_rejected() {
    let raw = r#"{"type":"unsubscribe","item":"x"}"#;
    assert!(serde_json::from_str::<ClientMessage>(raw).is_err());
  }

  #[test]
  fn event_serializes_flat_with_nested_user() {
    let id = Uuid::nil();
    let msg = ServerMessage::Event {
      id,
      date: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc),
      item: id,
      message: "hello".into(),
      user: EventUser { id, name: "ann".into() },
    };
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["type"], "event");
    assert_eq!(value["message"], "hello");
    assert_eq!(value["user"]["name"], "ann");
    assert_eq!(value["date"], "2024-05-01T12:00:00Z");
  }
}
