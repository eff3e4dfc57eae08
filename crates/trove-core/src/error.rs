//! Error types for `trove-core`.

use thiserror::Error;

use crate::graph::EntityKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown entity kind: {0:?}")]
  UnknownKind(String),

  #[error("entity graph has an ownership cycle through {0}")]
  GraphCycle(EntityKind),

  #[error("{child} has more than one owning parent")]
  MultipleOwners { child: EntityKind },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
