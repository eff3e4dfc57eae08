//! The entity graph — which record kinds own which.
//!
//! Every reference between record kinds is declared here as an [`Edge`]. An
//! edge is either [`Relation::Owning`] (deleting the parent deletes the child)
//! or [`Relation::Weak`] (a plain back-reference that never cascades). The
//! [`DeletionService`](crate::cascade::DeletionService) walks this table and
//! nothing else; no cascade rule lives anywhere outside it.

use std::{collections::HashMap, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator as _};

use crate::{Error, Result};

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// A record type persisted in the document store.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
  Account,
  Collection,
  Item,
  Comment,
  Like,
  Topic,
  Tag,
}

impl EntityKind {
  /// The discriminant stored alongside each document.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Account => "account",
      Self::Collection => "collection",
      Self::Item => "item",
      Self::Comment => "comment",
      Self::Like => "like",
      Self::Topic => "topic",
      Self::Tag => "tag",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownKind(s.to_owned()))
  }
}

// ─── Edges ───────────────────────────────────────────────────────────────────

/// Whether a reference carries ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
  /// The child cannot outlive the parent.
  Owning,
  /// Reference only; deleting either side leaves the other untouched.
  Weak,
}

/// One reference from `child` records to `parent` records, stored in the
/// child's `field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
  pub parent:   EntityKind,
  pub child:    EntityKind,
  /// Name of the foreign-key field in the child document.
  pub field:    &'static str,
  pub relation: Relation,
}

impl Edge {
  pub const fn owning(parent: EntityKind, child: EntityKind, field: &'static str) -> Self {
    Self { parent, child, field, relation: Relation::Owning }
  }

  pub const fn weak(parent: EntityKind, child: EntityKind, field: &'static str) -> Self {
    Self { parent, child, field, relation: Relation::Weak }
  }

  pub fn is_owning(&self) -> bool { self.relation == Relation::Owning }
}

/// The edges of the Trove data model. Order matters: owning edges of the same
/// parent are cascaded in the order they appear here.
pub const STANDARD_EDGES: &[Edge] = &[
  Edge::owning(EntityKind::Account, EntityKind::Collection, "owner"),
  Edge::owning(EntityKind::Collection, EntityKind::Item, "collection"),
  Edge::owning(EntityKind::Item, EntityKind::Comment, "item"),
  Edge::owning(EntityKind::Item, EntityKind::Like, "item"),
  Edge::weak(EntityKind::Account, EntityKind::Comment, "author"),
  Edge::weak(EntityKind::Account, EntityKind::Like, "author"),
  Edge::weak(EntityKind::Topic, EntityKind::Collection, "topics"),
  Edge::weak(EntityKind::Tag, EntityKind::Item, "tags"),
];

// ─── Graph ───────────────────────────────────────────────────────────────────

/// A validated set of [`Edge`]s.
///
/// Construction rejects ownership cycles and children with more than one
/// owning parent, so a cascade over a graph can always terminate.
#[derive(Debug, Clone)]
pub struct EntityGraph {
  edges: Vec<Edge>,
}

impl EntityGraph {
  pub fn new(edges: Vec<Edge>) -> Result<Self> {
    let mut owners: HashMap<EntityKind, EntityKind> = HashMap::new();
    for edge in edges.iter().filter(|e| e.is_owning()) {
      if owners.insert(edge.child, edge.parent).is_some() {
        return Err(Error::MultipleOwners { child: edge.child });
      }
    }

    // With at most one owner per kind, following owner links from any kind
    // must reach a root within |kinds| steps.
    for start in EntityKind::iter() {
      let mut current = start;
      let mut steps = 0;
      while let Some(&parent) = owners.get(&current) {
        steps += 1;
        if parent == start || steps > owners.len() {
          return Err(Error::GraphCycle(start));
        }
        current = parent;
      }
    }

    Ok(Self { edges })
  }

  /// The graph built from [`STANDARD_EDGES`].
  pub fn standard() -> Self {
    Self { edges: STANDARD_EDGES.to_vec() }
  }

  pub fn edges(&self) -> &[Edge] { &self.edges }

  /// Owning edges whose parent is `parent`, in declaration order.
  pub fn owning_children(&self, parent: EntityKind) -> impl Iterator<Item = &Edge> {
    self
      .edges
      .iter()
      .filter(move |e| e.parent == parent && e.is_owning())
  }

  /// Weak edges pointing at `parent`.
  pub fn weak_referrers(&self, parent: EntityKind) -> impl Iterator<Item = &Edge> {
    self
      .edges
      .iter()
      .filter(move |e| e.parent == parent && !e.is_owning())
  }

  /// The owning edge of `child`, if it has a parent.
  pub fn owner_of(&self, child: EntityKind) -> Option<&Edge> {
    self.edges.iter().find(|e| e.child == child && e.is_owning())
  }
}

impl Default for EntityGraph {
  fn default() -> Self { Self::standard() }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  #[test]
  fn standard_graph_validates() {
    let graph = EntityGraph::new(STANDARD_EDGES.to_vec()).unwrap();
    assert_eq!(graph.edges().len(), STANDARD_EDGES.len());
  }

  #[test]
  fn cascade_order_is_account_collection_item_leaves() {
    let graph = EntityGraph::standard();

    let children = |k| {
      graph
        .owning_children(k)
        .map(|e| e.child)
        .collect::<Vec<_>>()
    };

    assert_eq!(children(EntityKind::Account), vec![EntityKind::Collection]);
    assert_eq!(children(EntityKind::Collection), vec![EntityKind::Item]);
    assert_eq!(
      children(EntityKind::Item),
      vec![EntityKind::Comment, EntityKind::Like]
    );
    assert!(children(EntityKind::Comment).is_empty());
    assert!(children(EntityKind::Like).is_empty());
  }

  #[test]
  fn weak_edges_never_cascade() {
    let graph = EntityGraph::standard();
    assert_eq!(graph.owning_children(EntityKind::Topic).count(), 0);
    assert_eq!(graph.owning_children(EntityKind::Tag).count(), 0);

    let weak: Vec<_> = graph
      .weak_referrers(EntityKind::Account)
      .map(|e| (e.child, e.field))
      .collect();
    assert_eq!(
      weak,
      vec![(EntityKind::Comment, "author"), (EntityKind::Like, "author")]
    );
  }

  #[test]
  fn owner_lookup() {
    let graph = EntityGraph::standard();
    assert_eq!(graph.owner_of(EntityKind::Like).unwrap().parent, EntityKind::Item);
    assert!(graph.owner_of(EntityKind::Account).is_none());
    assert!(graph.owner_of(EntityKind::Tag).is_none());
  }

  #[test]
  fn rejects_ownership_cycle() {
    let err = EntityGraph::new(vec![
      Edge::owning(EntityKind::Account, EntityKind::Collection, "owner"),
      Edge::owning(EntityKind::Collection, EntityKind::Account, "home"),
    ])
    .unwrap_err();
    assert!(matches!(err, Error::GraphCycle(_)));
  }

  #[test]
  fn rejects_second_owner() {
    let err = EntityGraph::new(vec![
      Edge::owning(EntityKind::Item, EntityKind::Comment, "item"),
      Edge::owning(EntityKind::Account, EntityKind::Comment, "author"),
    ])
    .unwrap_err();
    assert!(matches!(err, Error::MultipleOwners { child: EntityKind::Comment }));
  }

  #[test]
  fn kind_round_trips_through_str() {
    for kind in EntityKind::iter() {
      assert_eq!(EntityKind::parse(kind.as_str()).unwrap(), kind);
      assert_eq!(kind.to_string(), kind.as_str());
    }
    assert!(EntityKind::parse("user").is_err());
  }
}
