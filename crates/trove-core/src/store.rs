//! Storage traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g. `trove-store-sqlite`).
//! Higher layers (`trove-api`, `trove-live`) depend on these abstractions, not
//! on any concrete backend.
//!
//! [`DocumentStore`] is the kind-level surface the cascade needs; it works in
//! terms of [`EntityKind`] and raw IDs. [`RecordStore`] layers typed CRUD over
//! it.

use std::{collections::BTreeSet, future::Future};

use uuid::Uuid;

use crate::{graph::EntityKind, record::Record};

// ─── Query type ──────────────────────────────────────────────────────────────

/// A single filter over a document's top-level fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
  /// The scalar field equals `value`.
  Eq { field: String, value: String },
  /// The array field contains `value`.
  Contains { field: String, value: String },
  /// Case-insensitive substring match against any of `paths`.
  Text { paths: Vec<TextPath>, text: String },
}

/// A string location a [`Condition::Text`] looks in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPath {
  /// A top-level scalar field.
  Field(String),
  /// `member` of every object in the array field `field`.
  Member { field: String, member: String },
}

impl TextPath {
  pub fn field(field: impl Into<String>) -> Self { TextPath::Field(field.into()) }

  pub fn member(field: impl Into<String>, member: impl Into<String>) -> Self {
    TextPath::Member { field: field.into(), member: member.into() }
  }
}

/// Parameters for [`RecordStore::find`] and [`RecordStore::count`].
///
/// All conditions must hold. Results are ordered by creation time.
#[derive(Debug, Clone, Default)]
pub struct Query {
  pub conditions:   Vec<Condition>,
  pub newest_first: bool,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

impl Query {
  pub fn new() -> Self { Self::default() }

  pub fn eq(mut self, field: impl Into<String>, value: impl ToString) -> Self {
    self.conditions.push(Condition::Eq {
      field: field.into(),
      value: value.to_string(),
    });
    self
  }

  pub fn contains(mut self, field: impl Into<String>, value: impl ToString) -> Self {
    self.conditions.push(Condition::Contains {
      field: field.into(),
      value: value.to_string(),
    });
    self
  }

  pub fn text(
    mut self,
    paths: impl IntoIterator<Item = TextPath>,
    text: impl Into<String>,
  ) -> Self {
    self.conditions.push(Condition::Text {
      paths: paths.into_iter().collect(),
      text:  text.into(),
    });
    self
  }

  pub fn newest_first(mut self) -> Self {
    self.newest_first = true;
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// One-based page of `limit` results. The offset saturates.
  pub fn page(mut self, page: usize, limit: usize) -> Self {
    self.limit = Some(limit);
    self.offset = Some(page.saturating_sub(1).saturating_mul(limit));
    self
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Kind-level operations over the document store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// IDs of every `kind` document whose `field` holds one of `values`.
  fn find_ids<'a>(
    &'a self,
    kind: EntityKind,
    field: &'a str,
    values: &'a BTreeSet<Uuid>,
  ) -> impl Future<Output = Result<BTreeSet<Uuid>, Self::Error>> + Send + 'a;

  /// Delete every `kind` document whose ID is in `ids` and return how many
  /// rows went away. IDs that do not exist are ignored.
  fn delete_many<'a>(
    &'a self,
    kind: EntityKind,
    ids: &'a BTreeSet<Uuid>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;
}

/// Typed CRUD over [`Record`]s.
pub trait RecordStore: DocumentStore {
  /// Persist a new record. Fails if the ID is already taken.
  fn insert<'a, R: Record>(
    &'a self,
    record: &'a R,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Retrieve a record by ID. Returns `None` if not found.
  fn get<R: Record>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<R>, Self::Error>> + Send + '_;

  /// Retrieve every record whose ID is in `ids`; missing IDs are skipped.
  fn get_many<'a, R: Record>(
    &'a self,
    ids: &'a BTreeSet<Uuid>,
  ) -> impl Future<Output = Result<Vec<R>, Self::Error>> + Send + 'a;

  /// Overwrite an existing record in place. Returns `false` if no record with
  /// that ID exists.
  fn replace<'a, R: Record>(
    &'a self,
    record: &'a R,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn find<'a, R: Record>(
    &'a self,
    query: &'a Query,
  ) -> impl Future<Output = Result<Vec<R>, Self::Error>> + Send + 'a;

  /// Number of `kind` documents matching `query`, ignoring its paging.
  fn count<'a>(
    &'a self,
    kind: EntityKind,
    query: &'a Query,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_is_one_based() {
    let q = Query::new().page(3, 5);
    assert_eq!(q.limit, Some(5));
    assert_eq!(q.offset, Some(10));

    let first = Query::new().page(0, 5);
    assert_eq!(first.offset, Some(0));
  }

  #[test]
  fn huge_page_saturates() {
    let q = Query::new().page(usize::MAX, usize::MAX);
    assert_eq!(q.offset, Some(usize::MAX));
  }

  #[test]
  fn builder_accumulates_conditions() {
    let q = Query::new()
      .eq("owner", 7)
      .contains("tags", "x")
      .text([TextPath::field("title")], "gold");
    assert_eq!(q.conditions.len(), 3);
    assert_eq!(
      q.conditions[0],
      Condition::Eq { field: "owner".into(), value: "7".into() }
    );
  }
}
