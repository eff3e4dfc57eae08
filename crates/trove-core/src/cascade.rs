//! Cascading deletion driven by the [`EntityGraph`].
//!
//! A delete of one kind removes the requested documents, then walks each
//! owning edge of that kind in declaration order: it looks up the children
//! whose foreign key is in the captured parent ID set and deletes those the
//! same way, down to the leaves.
//!
//! There is no cross-kind transaction. Every level that finished stays
//! finished; when a later level fails the caller gets a [`CascadeError`] that
//! lists the committed levels and the one that broke, with the captured IDs
//! needed to finish the job by hand.
//!
//! Concurrent deletes are not coordinated. Two calls with overlapping parent
//! or child sets may each miss or repeat work the other is doing; both still
//! only ever delete documents reachable from their own roots.

use std::{collections::BTreeSet, fmt, sync::Arc};

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  graph::{Edge, EntityGraph, EntityKind},
  store::DocumentStore,
};

// ─── Reports ─────────────────────────────────────────────────────────────────

/// One committed level of a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelReport {
  pub kind:     EntityKind,
  /// 0 for the requested kind, 1 for its children, and so on.
  pub depth:    usize,
  /// Foreign-key field this level was reached through; `None` at the root.
  pub via:      Option<&'static str>,
  /// IDs captured for deletion at this level.
  pub ids:      BTreeSet<Uuid>,
  /// Rows the store actually removed.
  pub affected: u64,
}

/// Everything a successful delete removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
  pub root:   EntityKind,
  pub levels: Vec<LevelReport>,
}

impl CascadeReport {
  /// Rows removed of `kind`, summed over every level of that kind.
  pub fn affected(&self, kind: EntityKind) -> u64 {
    self
      .levels
      .iter()
      .filter(|l| l.kind == kind)
      .map(|l| l.affected)
      .sum()
  }

  pub fn total_affected(&self) -> u64 { self.levels.iter().map(|l| l.affected).sum() }

  pub fn is_noop(&self) -> bool { self.total_affected() == 0 }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Which store call a failed level was making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  /// Looking up children of the previous level.
  Query,
  /// Deleting this level's captured IDs.
  Delete,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Stage::Query => f.write_str("query"),
      Stage::Delete => f.write_str("delete"),
    }
  }
}

/// The level a cascade stopped at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedLevel {
  pub kind:       EntityKind,
  pub depth:      usize,
  pub via:        Option<&'static str>,
  pub stage:      Stage,
  /// The already-deleted parent IDs whose children were being resolved.
  pub parent_ids: BTreeSet<Uuid>,
  /// The child IDs captured before the failure; empty for [`Stage::Query`].
  pub ids:        BTreeSet<Uuid>,
}

/// A level whose IDs were captured but which never ran.
///
/// Descendants of these IDs were not looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingLevel {
  pub kind:  EntityKind,
  pub depth: usize,
  pub via:   Option<&'static str>,
  pub ids:   BTreeSet<Uuid>,
}

/// A cascade level failed after the root level committed.
///
/// The committed levels are **not** rolled back: the root is gone, and the
/// descendants listed in `failed` and `pending` (and anything below them)
/// still need cleaning up.
#[derive(Debug, Error)]
#[error(
  "cascade from {root} failed at {} ({} stage) after {} committed level(s): {source}",
  .failed.kind, .failed.stage, .committed.len()
)]
pub struct CascadeError<E: std::error::Error + 'static> {
  pub root:      EntityKind,
  pub failed:    FailedLevel,
  pub committed: Vec<LevelReport>,
  /// Sibling and deeper levels captured before the failure, in run order.
  pub pending:   Vec<PendingLevel>,
  #[source]
  pub source:    E,
}

#[derive(Debug, Error)]
pub enum DeleteError<E: std::error::Error + 'static> {
  /// The root level itself failed; nothing was deleted.
  #[error("failed to delete {kind} records: {source}")]
  Store {
    kind:   EntityKind,
    #[source]
    source: E,
  },

  #[error(transparent)]
  Cascade(Box<CascadeError<E>>),

  /// The cascade reached a kind already on its own lineage.
  #[error("cascade re-entered {kind} via {via}")]
  Cycle {
    kind:      EntityKind,
    via:       &'static str,
    committed: Vec<LevelReport>,
  },

  /// The cancellation token fired between levels.
  #[error("cascade from {root} cancelled after {} committed level(s)", .committed.len())]
  Cancelled {
    root:      EntityKind,
    committed: Vec<LevelReport>,
    pending:   Vec<PendingLevel>,
  },
}

impl<E: std::error::Error + 'static> DeleteError<E> {
  /// Levels that were deleted before the error, in the order they ran.
  pub fn committed(&self) -> &[LevelReport] {
    match self {
      DeleteError::Store { .. } => &[],
      DeleteError::Cascade(e) => &e.committed,
      DeleteError::Cycle { committed, .. } => committed,
      DeleteError::Cancelled { committed, .. } => committed,
    }
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// A pending level: the IDs to delete and how we got here.
struct Level {
  kind:       EntityKind,
  depth:      usize,
  via:        Option<&'static str>,
  ids:        BTreeSet<Uuid>,
  parent_ids: BTreeSet<Uuid>,
  /// Kinds from the root down to this level's parent.
  lineage:    Vec<EntityKind>,
}

impl Level {
  fn child(&self, edge: &Edge, ids: BTreeSet<Uuid>) -> Self {
    let mut lineage = self.lineage.clone();
    lineage.push(self.kind);
    Self {
      kind: edge.child,
      depth: self.depth + 1,
      via: Some(edge.field),
      ids,
      parent_ids: self.ids.clone(),
      lineage,
    }
  }

  fn failed(&self, stage: Stage) -> FailedLevel {
    FailedLevel {
      kind:       self.kind,
      depth:      self.depth,
      via:        self.via,
      stage,
      parent_ids: self.parent_ids.clone(),
      ids:        self.ids.clone(),
    }
  }

  fn pending(&self) -> PendingLevel {
    PendingLevel {
      kind:  self.kind,
      depth: self.depth,
      via:   self.via,
      ids:   self.ids.clone(),
    }
  }

  fn into_report(self, affected: u64) -> LevelReport {
    LevelReport {
      kind: self.kind,
      depth: self.depth,
      via: self.via,
      ids: self.ids,
      affected,
    }
  }
}

/// The only way records are deleted.
///
/// The store and graph are reference-counted, so clones share them.
pub struct DeletionService<S> {
  store: Arc<S>,
  graph: Arc<EntityGraph>,
}

impl<S> Clone for DeletionService<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), graph: self.graph.clone() }
  }
}

impl<S: DocumentStore> DeletionService<S> {
  pub fn new(store: Arc<S>) -> Self { Self::with_graph(store, EntityGraph::standard()) }

  pub fn with_graph(store: Arc<S>, graph: EntityGraph) -> Self {
    Self { store, graph: Arc::new(graph) }
  }

  pub fn graph(&self) -> &EntityGraph { &self.graph }

  /// Delete `ids` of `kind` and everything they own.
  ///
  /// An empty ID set is a successful no-op. IDs that do not exist count as
  /// zero affected rows.
  pub async fn delete(
    &self,
    kind: EntityKind,
    ids: impl IntoIterator<Item = Uuid>,
  ) -> Result<CascadeReport, DeleteError<S::Error>> {
    self
      .delete_with_cancel(kind, ids, &CancellationToken::new())
      .await
  }

  /// Like [`delete`](Self::delete), but stops before the next level once
  /// `cancel` fires. A level already in flight runs to completion.
  pub async fn delete_with_cancel(
    &self,
    kind: EntityKind,
    ids: impl IntoIterator<Item = Uuid>,
    cancel: &CancellationToken,
  ) -> Result<CascadeReport, DeleteError<S::Error>> {
    let ids: BTreeSet<Uuid> = ids.into_iter().collect();
    let mut report = CascadeReport { root: kind, levels: Vec::new() };

    if ids.is_empty() {
      return Ok(report);
    }

    // Depth-first over owning edges. Children are pushed in reverse so they
    // pop in declaration order.
    let mut pending = vec![Level {
      kind,
      depth: 0,
      via: None,
      ids,
      parent_ids: BTreeSet::new(),
      lineage: Vec::new(),
    }];

    while let Some(level) = pending.pop() {
      if cancel.is_cancelled() {
        warn!(root = %kind, committed = report.levels.len(), "cascade cancelled");
        pending.push(level);
        return Err(DeleteError::Cancelled {
          root:      kind,
          committed: report.levels,
          pending:   outstanding(&[], &pending),
        });
      }

      let affected = if level.ids.is_empty() {
        0
      } else {
        match self.store.delete_many(level.kind, &level.ids).await {
          Ok(n) => n,
          Err(source) if level.depth == 0 => {
            return Err(DeleteError::Store { kind: level.kind, source });
          }
          Err(source) => {
            let rest = outstanding(&[], &pending);
            return Err(fail(report, level.failed(Stage::Delete), rest, source));
          }
        }
      };

      info!(
        kind = %level.kind,
        depth = level.depth,
        captured = level.ids.len(),
        affected,
        "cascade level committed"
      );

      // Nothing captured means nothing can reference it; stop descending.
      let mut children = Vec::new();
      if !level.ids.is_empty() {
        for edge in self.graph.owning_children(level.kind) {
          if edge.child == level.kind || level.lineage.contains(&edge.child) {
            report.levels.push(level.into_report(affected));
            return Err(DeleteError::Cycle {
              kind:      edge.child,
              via:       edge.field,
              committed: report.levels,
            });
          }

          let found = self.store.find_ids(edge.child, edge.field, &level.ids).await;
          match found {
            Ok(found) => {
              debug!(
                parent = %level.kind,
                child = %edge.child,
                via = edge.field,
                found = found.len(),
                "resolved children"
              );
              children.push(level.child(edge, found));
            }
            Err(source) => {
              let failed = level.child(edge, BTreeSet::new()).failed(Stage::Query);
              let rest = outstanding(&children, &pending);
              report.levels.push(level.into_report(affected));
              return Err(fail(report, failed, rest, source));
            }
          }
        }
      }

      report.levels.push(level.into_report(affected));
      pending.extend(children.into_iter().rev());
    }

    Ok(report)
  }
}

/// Levels still waiting to run: `children` of the current level first, then
/// the stack in pop order.
fn outstanding(children: &[Level], stack: &[Level]) -> Vec<PendingLevel> {
  children
    .iter()
    .chain(stack.iter().rev())
    .map(Level::pending)
    .collect()
}

fn fail<E: std::error::Error + 'static>(
  report: CascadeReport,
  failed: FailedLevel,
  pending: Vec<PendingLevel>,
  source: E,
) -> DeleteError<E> {
  warn!(
    root = %report.root,
    failed = %failed.kind,
    stage = %failed.stage,
    committed = report.levels.len(),
    error = %source,
    "cascade level failed; committed levels are not rolled back"
  );
  DeleteError::Cascade(Box::new(CascadeError {
    root: report.root,
    failed,
    committed: report.levels,
    pending,
    source,
  }))
}
