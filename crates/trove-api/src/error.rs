//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use trove_core::cascade::DeleteError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("password hashing failed: {0}")]
  PasswordHash(String),

  /// A delete stopped part-way. `detail` carries the failed level and the
  /// committed ones so the caller can reconcile.
  #[error("{message}")]
  Cascade {
    message: String,
    detail:  serde_json::Value,
  },
}

impl ApiError {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    ApiError::Store(Box::new(e))
  }
}

impl<E: std::error::Error + Send + Sync + 'static> From<DeleteError<E>> for ApiError {
  fn from(err: DeleteError<E>) -> Self {
    let message = err.to_string();
    match err {
      DeleteError::Store { source, .. } => ApiError::Store(Box::new(source)),
      DeleteError::Cascade(cascade) => ApiError::Cascade {
        message,
        detail: json!({
          "root": cascade.root,
          "failed": cascade.failed,
          "committed": cascade.committed,
          "pending": cascade.pending,
        }),
      },
      DeleteError::Cycle { kind, via, committed } => ApiError::Cascade {
        message,
        detail: json!({ "cycle": { "kind": kind, "via": via }, "committed": committed }),
      },
      DeleteError::Cancelled { root, committed, pending } => ApiError::Cascade {
        message,
        detail: json!({ "root": root, "committed": committed, "pending": pending }),
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, json!({ "error": m })),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() })),
      ApiError::PasswordHash(m) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": format!("password hashing failed: {m}") }),
      ),
      ApiError::Cascade { message, detail } => (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": message, "cascade": detail }),
      ),
    };
    (status, Json(body)).into_response()
  }
}
