//! JSON REST API for Trove.
//!
//! Exposes an axum [`Router`] backed by any [`trove_core::store::RecordStore`].
//! Every delete endpoint goes through the [`DeletionService`], so removing an
//! account, collection or item always takes what it owns with it.
//! Authentication and TLS are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(trove_api::api_router(store.clone()))
//! ```

pub mod accounts;
pub mod collections;
pub mod engagement;
pub mod error;
pub mod items;
pub mod password;
pub mod search;
mod taxonomy;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use serde::{Deserialize, Serialize};
use trove_core::{cascade::DeletionService, store::RecordStore};
use uuid::Uuid;

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub deletion: DeletionService<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), deletion: self.deletion.clone() }
  }
}

impl<S: RecordStore> AppState<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { deletion: DeletionService::new(store.clone()), store }
  }
}

/// Body of the bulk delete endpoints.
#[derive(Debug, Deserialize, Serialize)]
pub struct IdsBody {
  pub ids: Vec<Uuid>,
}

/// `?page=&limit=` with per-endpoint defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PageParams {
  pub page:  Option<usize>,
  pub limit: Option<usize>,
}

/// Largest page size a client may ask for.
pub const MAX_PAGE_LIMIT: usize = 100;

impl PageParams {
  /// `(page, limit)` with `limit` clamped to [`MAX_PAGE_LIMIT`]. Pages whose
  /// offset does not fit a signed 64-bit integer are rejected.
  pub fn resolve(&self, default_limit: usize) -> Result<(usize, usize), ApiError> {
    let limit = self
      .limit
      .filter(|l| *l > 0)
      .unwrap_or(default_limit)
      .min(MAX_PAGE_LIMIT);
    let page = self.page.unwrap_or(1).max(1);
    (page - 1)
      .checked_mul(limit)
      .filter(|offset| i64::try_from(*offset).is_ok())
      .ok_or_else(|| ApiError::BadRequest(format!("page {page} is out of range")))?;
    Ok((page, limit))
  }
}

/// Build a fully-materialised API router for `store`.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: RecordStore + 'static,
{
  Router::new()
    // Accounts
    .route(
      "/accounts",
      get(accounts::list::<S>)
        .post(accounts::create::<S>)
        .patch(accounts::update_many::<S>)
        .delete(accounts::delete_many::<S>),
    )
    .route("/accounts/{id}", get(accounts::get_one::<S>))
    .route("/accounts/{id}/name", get(accounts::name::<S>))
    .route("/accounts/{id}/collections", get(collections::by_owner::<S>))
    // Collections
    .route(
      "/collections",
      post(collections::create::<S>).delete(collections::delete_many::<S>),
    )
    .route(
      "/collections/{id}",
      get(collections::get_one::<S>).put(collections::update::<S>),
    )
    .route("/collections/{id}/items", get(items::by_collection::<S>))
    .route("/topics", get(collections::topics::<S>))
    // Items
    .route("/items", post(items::create::<S>).delete(items::delete_many::<S>))
    .route("/items/latest", get(items::latest::<S>))
    .route("/items/{id}", get(items::get_one::<S>).put(items::update::<S>))
    .route("/items/{id}/comments", get(engagement::comments::<S>))
    .route("/items/{id}/likes", get(engagement::likes::<S>))
    .route("/tags", get(items::tags::<S>))
    .route("/tags/{title}/items", get(items::by_tag::<S>))
    // Engagement
    .route("/comments", post(engagement::comment::<S>))
    .route(
      "/likes",
      post(engagement::like::<S>).delete(engagement::unlike::<S>),
    )
    // Search
    .route("/search", get(search::handler::<S>))
    .with_state(AppState::new(store))
}
