//! Handlers for comments and likes.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/comments` | Item and author must exist (400) |
//! | `GET`    | `/items/{id}/comments` | Oldest first, with author names |
//! | `POST`   | `/likes` | Body: `{"item","user"}`; repeat likes return the existing one |
//! | `DELETE` | `/likes` | Body: `{"item","user"}` |
//! | `GET`    | `/items/{id}/likes` | `{"users":[..]}` |
//!
//! Live delivery of new comments is not done here; the `trove-live`
//! subscriber picks inserts up from the store's change feed.

use std::collections::{BTreeSet, HashMap};

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use trove_core::{
  EntityKind,
  cascade::CascadeReport,
  record::{Account, Comment, Item, Like},
  store::{Query, RecordStore},
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

async fn require<S: RecordStore>(store: &S, item: Uuid, author: Uuid) -> Result<(), ApiError> {
  if store.get::<Item>(item).await.map_err(ApiError::store)?.is_none() {
    return Err(ApiError::BadRequest("item not found".into()));
  }
  if store.get::<Account>(author).await.map_err(ApiError::store)?.is_none() {
    return Err(ApiError::BadRequest("user not found".into()));
  }
  Ok(())
}

// ─── Comments ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CommentBody {
  pub item:    Uuid,
  pub author:  Uuid,
  pub message: String,
}

/// `POST /comments`
pub async fn comment<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<CommentBody>,
) -> Result<impl IntoResponse, ApiError> {
  let message = body.message.trim();
  if message.is_empty() {
    return Err(ApiError::BadRequest("message is required".into()));
  }
  require(state.store.as_ref(), body.item, body.author).await?;

  let comment = Comment {
    id:         Uuid::new_v4(),
    created_at: Utc::now(),
    message:    message.to_owned(),
    item:       body.item,
    author:     body.author,
  };
  state.store.insert(&comment).await.map_err(ApiError::store)?;
  info!(id = %comment.id, item = %comment.item, "comment created");

  Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentAuthor {
  pub id:   Uuid,
  /// `None` once the author's account is gone.
  pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentView {
  pub id:         Uuid,
  pub created_at: DateTime<Utc>,
  pub message:    String,
  pub item:       Uuid,
  pub user:       CommentAuthor,
}

/// `GET /items/{id}/comments`
pub async fn comments<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(item): Path<Uuid>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
  let comments: Vec<Comment> = state
    .store
    .find(&Query::new().eq("item", item))
    .await
    .map_err(ApiError::store)?;

  let author_ids: BTreeSet<Uuid> = comments.iter().map(|c| c.author).collect();
  let authors: Vec<Account> = state
    .store
    .get_many(&author_ids)
    .await
    .map_err(ApiError::store)?;
  let names: HashMap<Uuid, String> = authors.into_iter().map(|a| (a.id, a.name)).collect();

  let views = comments
    .into_iter()
    .map(|c| CommentView {
      id:         c.id,
      created_at: c.created_at,
      message:    c.message,
      item:       c.item,
      user:       CommentAuthor { id: c.author, name: names.get(&c.author).cloned() },
    })
    .collect();
  Ok(Json(views))
}

// ─── Likes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LikeBody {
  pub item: Uuid,
  pub user: Uuid,
}

fn like_query(body: &LikeBody) -> Query {
  Query::new().eq("item", body.item).eq("author", body.user)
}

/// `POST /likes`
pub async fn like<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<LikeBody>,
) -> Result<impl IntoResponse, ApiError> {
  require(state.store.as_ref(), body.item, body.user).await?;

  let existing: Vec<Like> = state
    .store
    .find(&like_query(&body).limit(1))
    .await
    .map_err(ApiError::store)?;
  if let Some(like) = existing.into_iter().next() {
    return Ok((StatusCode::OK, Json(like)));
  }

  let like = Like {
    id:         Uuid::new_v4(),
    created_at: Utc::now(),
    item:       body.item,
    author:     body.user,
  };
  state.store.insert(&like).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(like)))
}

/// `DELETE /likes`
pub async fn unlike<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<LikeBody>,
) -> Result<Json<CascadeReport>, ApiError> {
  let likes: Vec<Like> = state
    .store
    .find(&like_query(&body))
    .await
    .map_err(ApiError::store)?;
  let report = state
    .deletion
    .delete(EntityKind::Like, likes.into_iter().map(|l| l.id))
    .await?;
  Ok(Json(report))
}

/// `GET /items/{id}/likes`
pub async fn likes<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(item): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let likes: Vec<Like> = state
    .store
    .find(&Query::new().eq("item", item))
    .await
    .map_err(ApiError::store)?;
  let users: Vec<Uuid> = likes.into_iter().map(|l| l.author).collect();
  Ok(Json(json!({ "users": users })))
}
