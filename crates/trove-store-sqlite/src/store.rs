//! [`SqliteStore`] — the SQLite implementation of the Trove storage traits.

use std::{collections::BTreeSet, path::Path, time::Duration};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use trove_core::{
  EntityKind,
  feed::{ChangeEvent, ChangeFeed, ChangeOp, ChangeStream},
  record::Record,
  store::{Condition, DocumentStore, Query, RecordStore, TextPath},
};

use crate::{
  encode::{
    decode_body, decode_uuid, encode_body, encode_dt, encode_id_set, encode_uuid, json_path,
  },
  schema::SCHEMA,
  Error, Result,
};

/// How many unread change events a slow feed consumer may fall behind by
/// before it starts losing them.
const FEED_CAPACITY: usize = 1024;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Trove record store backed by a single SQLite file.
///
/// Clones share the inner connection and the change feed sender.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// [`open`](Self::open), giving up after `timeout`.
  pub async fn connect(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
    tokio::time::timeout(timeout, Self::open(path))
      .await
      .map_err(|_| Error::ConnectTimeout(timeout))?
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    let (changes, _) = broadcast::channel(FEED_CAPACITY);
    Ok(Self { conn, changes })
  }

  fn publish(&self, kind: EntityKind, op: ChangeOp, id: Uuid, document: Option<serde_json::Value>) {
    let event = ChangeEvent { kind, op, id, document, at: Utc::now() };
    // No receivers is not an error; the feed is fire-and-forget.
    if self.changes.send(event).is_err() {
      debug!(%kind, %id, "change published with no watchers");
    }
  }
}

// ─── Query building ──────────────────────────────────────────────────────────

/// `WHERE` clause and its positional parameters. `?1` is always the kind.
fn where_clause(kind: EntityKind, query: &Query) -> Result<(String, Vec<String>)> {
  let mut clauses = vec!["kind = ?1".to_owned()];
  let mut params = vec![kind.as_str().to_owned()];

  for condition in &query.conditions {
    let n = params.len() + 1;
    match condition {
      Condition::Eq { field, value } => {
        clauses.push(format!("json_extract(body, {}) = ?{n}", json_path(field)?));
        params.push(value.clone());
      }
      Condition::Contains { field, value } => {
        clauses.push(format!(
          "EXISTS (SELECT 1 FROM json_each(body, {}) AS e WHERE e.value = ?{n})",
          json_path(field)?
        ));
        params.push(value.clone());
      }
      Condition::Text { paths, text } => {
        let mut any = Vec::with_capacity(paths.len());
        for path in paths {
          any.push(match path {
            TextPath::Field(field) => {
              format!("json_extract(body, {}) LIKE ?{n} ESCAPE '\\'", json_path(field)?)
            }
            TextPath::Member { field, member } => format!(
              "EXISTS (SELECT 1 FROM json_each(body, {}) AS t \
               WHERE json_extract(t.value, {}) LIKE ?{n} ESCAPE '\\')",
              json_path(field)?,
              json_path(member)?
            ),
          });
        }
        // No paths means nothing can match.
        if any.is_empty() {
          clauses.push("0".to_owned());
        } else {
          clauses.push(format!("({})", any.join(" OR ")));
        }
        params.push(format!("%{}%", escape_like(text)));
      }
    }
  }

  Ok((clauses.join(" AND "), params))
}

fn escape_like(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

/// SQLite reads `LIMIT`/`OFFSET` as signed 64-bit integers.
fn sql_count(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

fn order_and_page(query: &Query) -> String {
  let dir = if query.newest_first { "DESC" } else { "ASC" };
  let mut sql = format!(" ORDER BY created_at {dir}, rowid {dir}");
  match (query.limit, query.offset) {
    (Some(limit), offset) => {
      sql.push_str(&format!(
        " LIMIT {} OFFSET {}",
        sql_count(limit),
        sql_count(offset.unwrap_or(0))
      ));
    }
    (None, Some(offset)) => {
      sql.push_str(&format!(" LIMIT -1 OFFSET {}", sql_count(offset)));
    }
    (None, None) => {}
  }
  sql
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  async fn find_ids(
    &self,
    kind: EntityKind,
    field: &str,
    values: &BTreeSet<Uuid>,
  ) -> Result<BTreeSet<Uuid>> {
    if values.is_empty() {
      return Ok(BTreeSet::new());
    }

    let sql = format!(
      "SELECT id FROM documents
       WHERE kind = ?1
         AND json_extract(body, {}) IN (SELECT value FROM json_each(?2))",
      json_path(field)?
    );
    let kind_str = kind.as_str();
    let values_json = encode_id_set(values)?;

    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![kind_str, values_json], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn delete_many(&self, kind: EntityKind, ids: &BTreeSet<Uuid>) -> Result<u64> {
    if ids.is_empty() {
      return Ok(0);
    }

    let kind_str = kind.as_str();
    let ids_json = encode_id_set(ids)?;

    let deleted: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "DELETE FROM documents
           WHERE kind = ?1 AND id IN (SELECT value FROM json_each(?2))
           RETURNING id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![kind_str, ids_json], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    for raw in &deleted {
      self.publish(kind, ChangeOp::Delete, decode_uuid(raw)?, None);
    }

    Ok(deleted.len() as u64)
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  async fn insert<R: Record>(&self, record: &R) -> Result<()> {
    let id = record.id();
    let (document, body) = encode_body(record)?;
    let id_str = encode_uuid(id);
    let kind_str = R::KIND.as_str();
    let at_str = encode_dt(record.created_at());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (id, kind, body, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, kind_str, body, at_str],
        )?;
        Ok(())
      })
      .await?;

    self.publish(R::KIND, ChangeOp::Insert, id, Some(document));
    Ok(())
  }

  async fn get<R: Record>(&self, id: Uuid) -> Result<Option<R>> {
    let id_str = encode_uuid(id);
    let kind_str = R::KIND.as_str();

    let body: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT body FROM documents WHERE id = ?1 AND kind = ?2",
              rusqlite::params![id_str, kind_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    body.as_deref().map(decode_body).transpose()
  }

  async fn get_many<R: Record>(&self, ids: &BTreeSet<Uuid>) -> Result<Vec<R>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }

    let kind_str = R::KIND.as_str();
    let ids_json = encode_id_set(ids)?;

    let bodies: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT body FROM documents
           WHERE kind = ?1 AND id IN (SELECT value FROM json_each(?2))
           ORDER BY created_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![kind_str, ids_json], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    bodies.iter().map(|b| decode_body(b)).collect()
  }

  async fn replace<R: Record>(&self, record: &R) -> Result<bool> {
    let id = record.id();
    let (document, body) = encode_body(record)?;
    let id_str = encode_uuid(id);
    let kind_str = R::KIND.as_str();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE documents SET body = ?1 WHERE id = ?2 AND kind = ?3",
          rusqlite::params![body, id_str, kind_str],
        )?)
      })
      .await?;

    if changed > 0 {
      self.publish(R::KIND, ChangeOp::Replace, id, Some(document));
    }
    Ok(changed > 0)
  }

  async fn find<R: Record>(&self, query: &Query) -> Result<Vec<R>> {
    let (where_sql, params) = where_clause(R::KIND, query)?;
    let sql = format!(
      "SELECT body FROM documents WHERE {where_sql}{}",
      order_and_page(query)
    );

    let bodies: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    bodies.iter().map(|b| decode_body(b)).collect()
  }

  async fn count(&self, kind: EntityKind, query: &Query) -> Result<u64> {
    let (where_sql, params) = where_clause(kind, query)?;
    let sql = format!("SELECT COUNT(*) FROM documents WHERE {where_sql}");

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &sql,
          rusqlite::params_from_iter(params.iter()),
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(n.max(0) as u64)
  }
}

// ─── ChangeFeed impl ─────────────────────────────────────────────────────────

impl ChangeFeed for SqliteStore {
  async fn watch(&self, kind: EntityKind) -> Result<ChangeStream> {
    debug!(%kind, watchers = self.changes.receiver_count() + 1, "opening change stream");
    Ok(ChangeStream::new(kind, self.changes.subscribe()))
  }
}
