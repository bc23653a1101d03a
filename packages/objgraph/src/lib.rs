//! objgraph: an in-memory object graph with identity-map semantics.
//!
//! Applications register entity kinds with an [`ObjectStore`], create and
//! fetch instances by id, connect them through [`ConnectedEntities`] and
//! [`Cache`], and persist the whole graph through a [`Storage`] backend.
//!
//! This crate re-exports the core types and the key-value backends.
//!
//! # Example
//!
//! ```rust
//! use objgraph::{Document, Entity, ObjectStore, Payload, SessionStorage, KvStorageConfig};
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
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = ObjectStore::with_storage(SessionStorage::new(KvStorageConfig::with_key("doc")));
//! store.register_as::<Document<Task>>("tasks");
//!
//! let task = store.create::<Document<Task>>().unwrap();
//! store.flush().await.unwrap();
//!
//! store.delete(&task).unwrap();
//! store.reload().await.unwrap();
//! assert!(store.fetch::<Document<Task>>(task.id()).is_some());
//! # }
//! ```

pub use objgraph_core::{
    AsEntity, Cache, ConnectedEntities, Document, Entity, EntityBase, EntityId, EntityKind,
    Error, HasRoot, Iter, MemoryStorage, Member, ObjectStore, Payload, PlainObject, Result,
    RootLink, Snapshot, Storage,
};
pub use objgraph_kv_storage::{
    DiskEngine, EngineError, KvEngine, KvStorage, KvStorageConfig, LocalStorage, SessionEngine,
    SessionStorage,
};
