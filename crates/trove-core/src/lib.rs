//! Core types and trait definitions for the Trove record store.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the record shapes, the entity graph that declares which records own which,
//! the storage traits, and the cascading [`DeletionService`](cascade::DeletionService).

pub mod cascade;
pub mod error;
pub mod feed;
pub mod graph;
pub mod record;
pub mod store;

pub use error::{Error, Result};
pub use graph::EntityKind;
