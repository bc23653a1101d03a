//! The storage capability and the in-memory backend.
//!
//! A storage moves a whole object store's [`Snapshot`] to and from a
//! backend. Both operations are single-shot futures: no retry, no timeout.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::object_store::{ObjectStore, Snapshot};

/// Backend for [`ObjectStore::flush`] and [`ObjectStore::reload`].
///
/// Both methods fail with `NotImplemented` unless overridden.
///
/// # Object Safety
///
/// This trait is object-safe: the object store keeps `Arc<dyn Storage>`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist `store.to_plain_object()`.
    async fn push(&self, store: &ObjectStore) -> Result<()> {
        let _ = store;
        Err(Error::NotImplemented("push"))
    }

    /// Return the persisted snapshot, or an empty one if nothing was pushed.
    async fn pull(&self, store: &ObjectStore) -> Result<Snapshot> {
        let _ = store;
        Err(Error::NotImplemented("pull"))
    }
}

/// A storage keeping the last pushed snapshot in memory.
///
/// Pushes never fail. The snapshot lives as long as the storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<Option<Snapshot>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage that already holds a snapshot.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            data: Mutex::new(Some(snapshot)),
        }
    }

    /// The last pushed snapshot, if any.
    pub async fn snapshot(&self) -> Option<Snapshot> {
        self.data.lock().await.clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn push(&self, store: &ObjectStore) -> Result<()> {
        let snapshot = store.to_plain_object();
        debug!(groups = snapshot.len(), "captured snapshot in memory");
        *self.data.lock().await = Some(snapshot);
        Ok(())
    }

    async fn pull(&self, _store: &ObjectStore) -> Result<Snapshot> {
        Ok(self.data.lock().await.clone().unwrap_or_default())
    }
}
