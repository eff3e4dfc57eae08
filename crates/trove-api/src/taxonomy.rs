//! Title → ID resolution for topics and tags, creating missing ones.

use chrono::Utc;
use tracing::debug;
use trove_core::{
  record::{Record, Tag, Topic},
  store::{Query, RecordStore},
};
use uuid::Uuid;

use crate::error::ApiError;

pub(crate) trait Titled: Record {
  fn titled(title: String) -> Self;
}

impl Titled for Topic {
  fn titled(title: String) -> Self {
    Topic { id: Uuid::new_v4(), created_at: Utc::now(), title }
  }
}

impl Titled for Tag {
  fn titled(title: String) -> Self {
    Tag { id: Uuid::new_v4(), created_at: Utc::now(), title }
  }
}

/// IDs for `titles` in order, trimmed and de-duplicated; blanks are skipped.
pub(crate) async fn resolve<S, R>(store: &S, titles: &[String]) -> Result<Vec<Uuid>, ApiError>
where
  S: RecordStore,
  R: Titled,
{
  let mut ids = Vec::with_capacity(titles.len());
  let mut seen = Vec::with_capacity(titles.len());

  for title in titles.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
    if seen.contains(&title) {
      continue;
    }
    seen.push(title);

    let query = Query::new().eq("title", title).limit(1);
    let existing: Vec<R> = store.find(&query).await.map_err(ApiError::store)?;
    let id = match existing.first() {
      Some(record) => record.id(),
      None => {
        let record = R::titled(title.to_owned());
        store.insert(&record).await.map_err(ApiError::store)?;
        debug!(kind = %R::KIND, title, "created");
        record.id()
      }
    };
    ids.push(id);
  }

  Ok(ids)
}
