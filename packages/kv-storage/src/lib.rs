//! Key-value storage backends for objgraph
//!
//! A [`KvStorage`] encodes an object store's whole snapshot as JSON and keeps
//! it under one key of a [`KvEngine`]:
//! - [`LocalStorage`]: one file per key in a directory, survives the process
//! - [`SessionStorage`]: a process-wide table, gone when the process exits
//!
//! # Example
//!
//! ```rust,no_run
//! use objgraph_core::ObjectStore;
//! use objgraph_kv_storage::{KvStorageConfig, LocalStorage};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = LocalStorage::open("/var/lib/app", KvStorageConfig::default())?;
//! let store = ObjectStore::with_storage(storage);
//! store.flush().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
mod kv_storage;

pub use config::KvStorageConfig;
pub use engine::{DiskEngine, KvEngine, SessionEngine};
pub use error::EngineError;
pub use kv_storage::{KvStorage, LocalStorage, SessionStorage};
