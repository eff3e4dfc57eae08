//! Handlers for `/collections` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/collections` | Owner must exist (400); topic titles are resolved or created |
//! | `DELETE` | `/collections` | Body: `{"ids":[..]}`; cascades to items, comments, likes |
//! | `GET`    | `/collections/{id}` | 404 if not found |
//! | `PUT`    | `/collections/{id}` | Replaces title, description, image, topics, fields |
//! | `GET`    | `/accounts/{id}/collections` | Newest first |
//! | `GET`    | `/topics` | All topics |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use trove_core::{
  EntityKind,
  cascade::CascadeReport,
  record::{Account, Collection, FieldSpec, Topic},
  store::{Query, RecordStore},
};
use uuid::Uuid;

use crate::{AppState, IdsBody, error::ApiError, taxonomy};

#[derive(Debug, Deserialize)]
pub struct CollectionBody {
  pub title:       String,
  #[serde(default)]
  pub description: String,
  pub image:       Option<String>,
  /// Topic titles.
  #[serde(default)]
  pub topics:      Vec<String>,
  #[serde(default)]
  pub fields:      Vec<FieldSpec>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub owner: Uuid,
  #[serde(flatten)]
  pub body:  CollectionBody,
}

fn require_title(title: &str) -> Result<String, ApiError> {
  let title = title.trim();
  if title.is_empty() {
    return Err(ApiError::BadRequest("title is required".into()));
  }
  Ok(title.to_owned())
}

/// `POST /collections`
pub async fn create<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(CreateBody { owner, body }): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let title = require_title(&body.title)?;
  let exists = state
    .store
    .get::<Account>(owner)
    .await
    .map_err(ApiError::store)?
    .is_some();
  if !exists {
    return Err(ApiError::BadRequest("owner not found".into()));
  }

  let topics = taxonomy::resolve::<S, Topic>(state.store.as_ref(), &body.topics).await?;
  let collection = Collection {
    id: Uuid::new_v4(),
    created_at: Utc::now(),
    title,
    description: body.description,
    image: body.image,
    owner,
    topics,
    fields: body.fields,
  };
  state.store.insert(&collection).await.map_err(ApiError::store)?;
  info!(id = %collection.id, %owner, "collection created");

  Ok((StatusCode::CREATED, Json(collection)))
}

async fn load<S: RecordStore>(store: &S, id: Uuid) -> Result<Collection, ApiError> {
  store
    .get::<Collection>(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("collection {id} not found")))
}

/// `GET /collections/{id}`
pub async fn get_one<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Collection>, ApiError> {
  Ok(Json(load(state.store.as_ref(), id).await?))
}

/// `PUT /collections/{id}`
pub async fn update<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<CollectionBody>,
) -> Result<Json<Collection>, ApiError> {
  let mut collection = load(state.store.as_ref(), id).await?;
  collection.title = require_title(&body.title)?;
  collection.description = body.description;
  collection.image = body.image;
  collection.topics = taxonomy::resolve::<S, Topic>(state.store.as_ref(), &body.topics).await?;
  collection.fields = body.fields;

  if !state.store.replace(&collection).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("collection {id} not found")));
  }
  Ok(Json(collection))
}

/// `GET /accounts/{id}/collections`
pub async fn by_owner<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(owner): Path<Uuid>,
) -> Result<Json<Vec<Collection>>, ApiError> {
  let query = Query::new().eq("owner", owner).newest_first();
  let collections: Vec<Collection> = state.store.find(&query).await.map_err(ApiError::store)?;
  Ok(Json(collections))
}

/// `DELETE /collections`
pub async fn delete_many<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<IdsBody>,
) -> Result<Json<CascadeReport>, ApiError> {
  let report = state.deletion.delete(EntityKind::Collection, body.ids).await?;
  Ok(Json(report))
}

/// `GET /topics`
pub async fn topics<S: RecordStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Topic>>, ApiError> {
  let topics: Vec<Topic> = state.store.find(&Query::new()).await.map_err(ApiError::store)?;
  Ok(Json(topics))
}
