//! Core objgraph: an in-memory object graph with identity-map semantics
//!
//! This crate provides the building blocks:
//! - `Entity`: identity-bearing record with a non-owning link to its store
//! - `ObjectStore`: per-kind registry of live instances, unique by id
//! - `ConnectedEntities`: one-to-many relation with lazy id resolution
//! - `Cache`: ordered id list of one kind, materialized on first iteration
//! - `Storage`: async push/pull of a whole store's snapshot
//!
//! # Example
//!
//! ```rust
//! use objgraph_core::{Document, Entity, ObjectStore, Payload};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Task {
//!     #[serde(default)]
//!     title: String,
//! }
//!
//! impl Payload for Task {
//!     const NAME: &'static str = "task";
//! }
//!
//! let store = ObjectStore::new();
//! store.register_as::<Document<Task>>("tasks");
//!
//! let task = store.create::<Document<Task>>().unwrap();
//! task.write().title = "write docs".to_string();
//!
//! assert!(task.is_stored());
//! assert_eq!(store.to_plain_object()["tasks"].len(), 1);
//! ```

mod cache;
mod connected;
mod document;
mod entity;
mod error;
mod object_store;
mod storage;

#[cfg(test)]
mod test_kinds;

pub use cache::Cache;
pub use connected::{ConnectedEntities, Iter, Member};
pub use document::{Document, Payload};
pub use entity::{AsEntity, Entity, EntityBase, EntityId, EntityKind, HasRoot, PlainObject, RootLink};
pub use error::{Error, Result};
pub use object_store::{ObjectStore, Snapshot};
pub use storage::{MemoryStorage, Storage};
