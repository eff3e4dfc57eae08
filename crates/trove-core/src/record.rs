//! Record shapes — the documents persisted by a [`RecordStore`](crate::store::RecordStore).
//!
//! Every record carries its own `id` and `created_at`. Foreign-key fields are
//! named exactly as the [`EntityGraph`](crate::graph::EntityGraph) edges name
//! them, because stores look children up by those field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::graph::EntityKind;

/// A document type with a fixed [`EntityKind`].
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
  const KIND: EntityKind;

  fn id(&self) -> Uuid;
  fn created_at(&self) -> DateTime<Utc>;
}

macro_rules! impl_record {
  ($ty:ty, $kind:expr) => {
    impl Record for $ty {
      const KIND: EntityKind = $kind;

      fn id(&self) -> Uuid { self.id }

      fn created_at(&self) -> DateTime<Utc> { self.created_at }
    }
  };
}

// ─── Account ─────────────────────────────────────────────────────────────────

/// Sign-in state. Stored and updated here; enforcing it is left to whatever
/// authenticates requests in front of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
  #[default]
  Active,
  Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
  #[default]
  User,
  Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
  pub id:            Uuid,
  pub created_at:    DateTime<Utc>,
  pub name:          String,
  /// Always stored lowercase.
  pub email:         String,
  /// PHC string produced by argon2.
  pub password_hash: String,
  pub status:        AccountStatus,
  pub access:        AccessLevel,
}

impl_record!(Account, EntityKind::Account);

// ─── Collection ──────────────────────────────────────────────────────────────

/// The value type of a custom item field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
  Number,
  Title,
  Text,
  Date,
  Check,
}

/// One entry of a collection's item schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
  pub title: String,
  #[serde(rename = "type")]
  pub kind:  FieldType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
  pub id:          Uuid,
  pub created_at:  DateTime<Utc>,
  pub title:       String,
  pub description: String,
  pub image:       Option<String>,
  /// Owning [`Account`].
  pub owner:       Uuid,
  /// Weak references to [`Topic`]s.
  #[serde(default)]
  pub topics:      Vec<Uuid>,
  #[serde(default)]
  pub fields:      Vec<FieldSpec>,
}

impl_record!(Collection, EntityKind::Collection);

// ─── Item ────────────────────────────────────────────────────────────────────

/// A filled-in custom field on an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
  pub title: String,
  #[serde(rename = "type")]
  pub kind:  FieldType,
  pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
  pub id:         Uuid,
  pub created_at: DateTime<Utc>,
  pub title:      String,
  /// Owning [`Collection`].
  pub collection: Uuid,
  /// Weak references to [`Tag`]s.
  #[serde(default)]
  pub tags:       Vec<Uuid>,
  #[serde(default)]
  pub fields:     Vec<FieldValue>,
}

impl_record!(Item, EntityKind::Item);

// ─── Engagement ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub id:         Uuid,
  pub created_at: DateTime<Utc>,
  pub message:    String,
  /// Owning [`Item`].
  pub item:       Uuid,
  /// Weak reference to the authoring [`Account`].
  pub author:     Uuid,
}

impl_record!(Comment, EntityKind::Comment);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Like {
  pub id:         Uuid,
  pub created_at: DateTime<Utc>,
  pub item:       Uuid,
  pub author:     Uuid,
}

impl_record!(Like, EntityKind::Like);

// ─── Taxonomy ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
  pub id:         Uuid,
  pub created_at: DateTime<Utc>,
  pub title:      String,
}

impl_record!(Topic, EntityKind::Topic);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
  pub id:         Uuid,
  pub created_at: DateTime<Utc>,
  pub title:      String,
}

impl_record!(Tag, EntityKind::Tag);

#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::EntityGraph;

  fn sample_documents() -> Vec<(EntityKind, serde_json::Value)> {
    let now = Utc::now();
    let id = Uuid::new_v4();
    vec![
      (
        EntityKind::Collection,
        serde_json::to_value(Collection {
          id,
          created_at: now,
          title: "Coins".into(),
          description: "".into(),
          image: None,
          owner: id,
          topics: vec![id],
          fields: vec![],
        })
        .unwrap(),
      ),
      (
        EntityKind::Item,
        serde_json::to_value(Item {
          id,
          created_at: now,
          title: "Denarius".into(),
          collection: id,
          tags: vec![id],
          fields: vec![],
        })
        .unwrap(),
      ),
      (
        EntityKind::Comment,
        serde_json::to_value(Comment {
          id,
          created_at: now,
          message: "nice".into(),
          item: id,
          author: id,
        })
        .unwrap(),
      ),
      (
        EntityKind::Like,
        serde_json::to_value(Like { id, created_at: now, item: id, author: id })
          .unwrap(),
      ),
    ]
  }

  /// Stores resolve children by field name, so every edge must name a field
  /// that the child record actually serializes.
  #[test]
  fn every_edge_field_exists_on_its_child() {
    let docs = sample_documents();
    for edge in EntityGraph::standard().edges() {
      let (_, doc) = docs
        .iter()
        .find(|(k, _)| *k == edge.child)
        .expect("sample for child kind");
      assert!(
        doc.get(edge.field).is_some(),
        "{} lacks field {:?}",
        edge.child,
        edge.field
      );
    }
  }

  #[test]
  fn field_spec_uses_type_key() {
    let spec = FieldSpec { title: "Year".into(), kind: FieldType::Number };
    let json = serde_json::to_value(&spec).unwrap();
    assert_eq!(json, serde_json::json!({ "title": "Year", "type": "number" }));
  }
}
