//! Handlers for `/accounts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/accounts` | `?page&limit`, default limit 10 |
//! | `POST`   | `/accounts` | Body: `{"name","email","password"}`; 409 on duplicates |
//! | `PATCH`  | `/accounts` | Body: `{"ids":[..],"update":{"status"?,"access"?}}` |
//! | `DELETE` | `/accounts` | Body: `{"ids":[..]}`; cascades |
//! | `GET`    | `/accounts/{id}` | 404 if not found |
//! | `GET`    | `/accounts/{id}/name` | `{"name": ..}` |

use std::collections::BTreeSet;

use axum::{
  Json,
  extract::{Path, Query, State},
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
  record::{AccessLevel, Account, AccountStatus},
  store::{self, RecordStore},
};
use uuid::Uuid;

use crate::{AppState, IdsBody, PageParams, error::ApiError, password::hash_password};

/// An account as returned to clients, without its password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
  pub id:         Uuid,
  pub created_at: DateTime<Utc>,
  pub name:       String,
  pub email:      String,
  pub status:     AccountStatus,
  pub access:     AccessLevel,
}

impl From<Account> for AccountView {
  fn from(a: Account) -> Self {
    Self {
      id:         a.id,
      created_at: a.created_at,
      name:       a.name,
      email:      a.email,
      status:     a.status,
      access:     a.access,
    }
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AccountPage {
  pub accounts: Vec<AccountView>,
  pub count:    u64,
}

/// `GET /accounts[?page=&limit=]`
pub async fn list<S: RecordStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<PageParams>,
) -> Result<Json<AccountPage>, ApiError> {
  let (page, limit) = params.resolve(10)?;
  let query = store::Query::new().page(page, limit);

  let accounts: Vec<Account> = state.store.find(&query).await.map_err(ApiError::store)?;
  let count = state
    .store
    .count(EntityKind::Account, &query)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(AccountPage {
    accounts: accounts.into_iter().map(AccountView::from).collect(),
    count,
  }))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:     String,
  pub email:    String,
  pub password: String,
}

/// `POST /accounts`
pub async fn create<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let name = body.name.trim().to_owned();
  let email = body.email.trim().to_lowercase();
  if name.is_empty() || email.is_empty() || body.password.is_empty() {
    return Err(ApiError::BadRequest("name, email and password are required".into()));
  }

  for (field, value) in [("name", &name), ("email", &email)] {
    let taken = state
      .store
      .count(EntityKind::Account, &store::Query::new().eq(field, value))
      .await
      .map_err(ApiError::store)?;
    if taken > 0 {
      return Err(ApiError::Conflict(format!("{field} already in use")));
    }
  }

  let password_hash = hash_password(&body.password)
    .map_err(|e| ApiError::PasswordHash(e.to_string()))?;

  let account = Account {
    id: Uuid::new_v4(),
    created_at: Utc::now(),
    name,
    email,
    password_hash,
    status: AccountStatus::Active,
    access: AccessLevel::User,
  };
  state.store.insert(&account).await.map_err(ApiError::store)?;
  info!(id = %account.id, "account created");

  Ok((StatusCode::CREATED, Json(AccountView::from(account))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

async fn load<S: RecordStore>(store: &S, id: Uuid) -> Result<Account, ApiError> {
  store
    .get::<Account>(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("account {id} not found")))
}

/// `GET /accounts/{id}`
pub async fn get_one<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<AccountView>, ApiError> {
  Ok(Json(load(state.store.as_ref(), id).await?.into()))
}

/// `GET /accounts/{id}/name`
pub async fn name<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let account = load(state.store.as_ref(), id).await?;
  Ok(Json(json!({ "name": account.name })))
}

// ─── Bulk update ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct AccountUpdate {
  pub status: Option<AccountStatus>,
  pub access: Option<AccessLevel>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub ids:    Vec<Uuid>,
  pub update: AccountUpdate,
}

/// `PATCH /accounts`: block/unblock and promote/demote in bulk.
pub async fn update_many<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Value>, ApiError> {
  let ids: BTreeSet<Uuid> = body.ids.into_iter().collect();
  let accounts: Vec<Account> = state.store.get_many(&ids).await.map_err(ApiError::store)?;

  let mut updated = 0u64;
  for mut account in accounts {
    if let Some(status) = body.update.status {
      account.status = status;
    }
    if let Some(access) = body.update.access {
      account.access = access;
    }
    if state.store.replace(&account).await.map_err(ApiError::store)? {
      updated += 1;
    }
  }

  Ok(Json(json!({ "updated": updated })))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /accounts`: removes the accounts and everything they own.
pub async fn delete_many<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<IdsBody>,
) -> Result<Json<CascadeReport>, ApiError> {
  let report = state.deletion.delete(EntityKind::Account, body.ids).await?;
  Ok(Json(report))
}
