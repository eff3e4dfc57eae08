//! Handlers for `/items` and `/tags` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/items` | Collection must exist (400); tag titles are resolved or created |
//! | `DELETE` | `/items` | Body: `{"ids":[..]}`; cascades to comments and likes |
//! | `GET`    | `/items/latest` | Ten newest items |
//! | `GET`    | `/items/{id}` | 404 if not found |
//! | `PUT`    | `/items/{id}` | Replaces title, tags, fields |
//! | `GET`    | `/collections/{id}/items` | `?page&limit`, default limit 5 |
//! | `GET`    | `/tags` | All tags |
//! | `GET`    | `/tags/{title}/items` | Empty if the tag does not exist |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use trove_core::{
  EntityKind,
  cascade::CascadeReport,
  record::{Collection, FieldValue, Item, Tag},
  store::{self, RecordStore},
};
use uuid::Uuid;

use crate::{AppState, IdsBody, PageParams, error::ApiError, taxonomy};

const LATEST: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ItemBody {
  pub title:  String,
  /// Tag titles.
  #[serde(default)]
  pub tags:   Vec<String>,
  #[serde(default)]
  pub fields: Vec<FieldValue>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub collection: Uuid,
  #[serde(flatten)]
  pub body:       ItemBody,
}

#[derive(Debug, Serialize)]
pub struct ItemPage {
  pub items: Vec<Item>,
  pub count: u64,
}

fn require_title(title: &str) -> Result<String, ApiError> {
  let title = title.trim();
  if title.is_empty() {
    return Err(ApiError::BadRequest("title is required".into()));
  }
  Ok(title.to_owned())
}

/// `POST /items`
pub async fn create<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(CreateBody { collection, body }): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let title = require_title(&body.title)?;
  let exists = state
    .store
    .get::<Collection>(collection)
    .await
    .map_err(ApiError::store)?
    .is_some();
  if !exists {
    return Err(ApiError::BadRequest("collection not found".into()));
  }

  let tags = taxonomy::resolve::<S, Tag>(state.store.as_ref(), &body.tags).await?;
  let item = Item {
    id: Uuid::new_v4(),
    created_at: Utc::now(),
    title,
    collection,
    tags,
    fields: body.fields,
  };
  state.store.insert(&item).await.map_err(ApiError::store)?;
  info!(id = %item.id, %collection, "item created");

  Ok((StatusCode::CREATED, Json(item)))
}

async fn load<S: RecordStore>(store: &S, id: Uuid) -> Result<Item, ApiError> {
  store
    .get::<Item>(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("item {id} not found")))
}

/// `GET /items/{id}`
pub async fn get_one<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Item>, ApiError> {
  Ok(Json(load(state.store.as_ref(), id).await?))
}

/// `PUT /items/{id}`
pub async fn update<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ItemBody>,
) -> Result<Json<Item>, ApiError> {
  let mut item = load(state.store.as_ref(), id).await?;
  item.title = require_title(&body.title)?;
  item.tags = taxonomy::resolve::<S, Tag>(state.store.as_ref(), &body.tags).await?;
  item.fields = body.fields;

  if !state.store.replace(&item).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("item {id} not found")));
  }
  Ok(Json(item))
}

/// `GET /collections/{id}/items[?page=&limit=]`
pub async fn by_collection<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(collection): Path<Uuid>,
  Query(params): Query<PageParams>,
) -> Result<Json<ItemPage>, ApiError> {
  let (page, limit) = params.resolve(5)?;
  let query = store::Query::new()
    .eq("collection", collection)
    .page(page, limit);

  let items: Vec<Item> = state.store.find(&query).await.map_err(ApiError::store)?;
  let count = state
    .store
    .count(EntityKind::Item, &query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ItemPage { items, count }))
}

/// `GET /items/latest`
pub async fn latest<S: RecordStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Item>>, ApiError> {
  let query = store::Query::new().newest_first().limit(LATEST);
  let items: Vec<Item> = state.store.find(&query).await.map_err(ApiError::store)?;
  Ok(Json(items))
}

/// `GET /tags/{title}/items`
pub async fn by_tag<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(title): Path<String>,
) -> Result<Json<Vec<Item>>, ApiError> {
  let tags: Vec<Tag> = state
    .store
    .find(&store::Query::new().eq("title", title.trim()).limit(1))
    .await
    .map_err(ApiError::store)?;
  let Some(tag) = tags.first() else {
    return Ok(Json(Vec::new()));
  };

  let query = store::Query::new().contains("tags", tag.id);
  let items: Vec<Item> = state.store.find(&query).await.map_err(ApiError::store)?;
  Ok(Json(items))
}

/// `DELETE /items`
pub async fn delete_many<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<IdsBody>,
) -> Result<Json<CascadeReport>, ApiError> {
  let report = state.deletion.delete(EntityKind::Item, body.ids).await?;
  Ok(Json(report))
}

/// `GET /tags`
pub async fn tags<S: RecordStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Tag>>, ApiError> {
  let tags: Vec<Tag> = state
    .store
    .find(&store::Query::new())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(tags))
}
