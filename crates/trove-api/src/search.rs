//! Handler for `GET /search`.
//!
//! Looks in item titles and field values, collection titles and descriptions,
//! and comment messages. A comment hit points at the item it was left on and
//! is titled with its author's name.

use std::collections::{BTreeSet, HashMap};

use axum::{
  Json,
  extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use trove_core::{
  record::{Account, Collection, Comment, Item},
  store::{self, RecordStore, TextPath},
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Hits returned per record kind.
const PER_KIND: usize = 10;

#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  /// Case-insensitive substring.
  pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HitKind {
  Item,
  Collection,
  Comment,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
  pub id:    Uuid,
  pub title: String,
  #[serde(rename = "type")]
  pub kind:  HitKind,
}

fn matching(paths: impl IntoIterator<Item = TextPath>, text: &str) -> store::Query {
  store::Query::new()
    .text(paths, text)
    .newest_first()
    .limit(PER_KIND)
}

/// `GET /search?text=...`: items, then collections, then comments, each
/// newest first.
pub async fn handler<S: RecordStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, ApiError> {
  let text = params.text.as_deref().map(str::trim).unwrap_or_default();
  if text.is_empty() {
    return Err(ApiError::BadRequest("text is required".into()));
  }

  let items: Vec<Item> = state
    .store
    .find(&matching(
      [TextPath::field("title"), TextPath::member("fields", "value")],
      text,
    ))
    .await
    .map_err(ApiError::store)?;
  let collections: Vec<Collection> = state
    .store
    .find(&matching(
      [TextPath::field("title"), TextPath::field("description")],
      text,
    ))
    .await
    .map_err(ApiError::store)?;
  let comments: Vec<Comment> = state
    .store
    .find(&matching([TextPath::field("message")], text))
    .await
    .map_err(ApiError::store)?;

  let author_ids: BTreeSet<Uuid> = comments.iter().map(|c| c.author).collect();
  let authors: Vec<Account> = state
    .store
    .get_many(&author_ids)
    .await
    .map_err(ApiError::store)?;
  let names: HashMap<Uuid, String> = authors.into_iter().map(|a| (a.id, a.name)).collect();

  let mut hits = Vec::with_capacity(items.len() + collections.len() + comments.len());
  hits.extend(items.into_iter().map(|i| SearchHit {
    id:    i.id,
    title: i.title,
    kind:  HitKind::Item,
  }));
  hits.extend(collections.into_iter().map(|c| SearchHit {
    id:    c.id,
    title: c.title,
    kind:  HitKind::Collection,
  }));
  hits.extend(comments.into_iter().map(|c| SearchHit {
    id:    c.item,
    title: names.get(&c.author).cloned().unwrap_or_default(),
    kind:  HitKind::Comment,
  }));
  Ok(Json(hits))
}
