use async_trait::async_trait;
use tracing::{debug, info};

use objgraph_core::{ObjectStore, Result, Snapshot, Storage};

use crate::config::KvStorageConfig;
use crate::engine::{DiskEngine, KvEngine, SessionEngine};
use crate::error::EngineError;

/// A [`Storage`] writing the whole snapshot as one JSON value under one key.
#[derive(Debug)]
pub struct KvStorage<E: KvEngine> {
    engine: E,
    config: KvStorageConfig,
}

/// Snapshots persisted as files in a directory.
pub type LocalStorage = KvStorage<DiskEngine>;

/// Snapshots kept for the lifetime of the process.
pub type SessionStorage = KvStorage<SessionEngine>;

impl<E: KvEngine> KvStorage<E> {
    pub fn with_engine(engine: E, config: KvStorageConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &KvStorageConfig {
        &self.config
    }

    /// Drop the persisted snapshot.
    pub fn clear(&self) -> Result<()> {
        self.engine.remove_item(&self.config.key)?;
        debug!(key = %self.config.key, "cleared persisted snapshot");
        Ok(())
    }

    fn encode(&self, snapshot: &Snapshot) -> Result<String> {
        let encoded = if self.config.pretty {
            serde_json::to_string_pretty(snapshot)?
        } else {
            serde_json::to_string(snapshot)?
        };
        Ok(encoded)
    }
}

impl KvStorage<DiskEngine> {
    /// Open a storage over an existing, writable directory.
    pub fn open(
        dir: impl Into<std::path::PathBuf>,
        config: KvStorageConfig,
    ) -> std::result::Result<Self, EngineError> {
        Ok(Self::with_engine(DiskEngine::open(dir)?, config))
    }
}

impl KvStorage<SessionEngine> {
    pub fn new(config: KvStorageConfig) -> Self {
        Self::with_engine(SessionEngine::new(), config)
    }
}

#[async_trait]
impl<E: KvEngine> Storage for KvStorage<E> {
    async fn push(&self, store: &ObjectStore) -> Result<()> {
        let snapshot = store.to_plain_object();
        let encoded = self.encode(&snapshot)?;
        self.engine.set_item(&self.config.key, &encoded)?;
        info!(key = %self.config.key, groups = snapshot.len(), bytes = encoded.len(), "pushed snapshot");
        Ok(())
    }

    async fn pull(&self, _store: &ObjectStore) -> Result<Snapshot> {
        let Some(encoded) = self.engine.get_item(&self.config.key)? else {
            debug!(key = %self.config.key, "nothing persisted");
            return Ok(Snapshot::new());
        };
        let snapshot: Snapshot = serde_json::from_str(&encoded)?;
        info!(key = %self.config.key, groups = snapshot.len(), "pulled snapshot");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objgraph_core::{Document, Entity, Error, Payload};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Note {
        #[serde(default)]
        title: String,
    }

    impl Payload for Note {
        const NAME: &'static str = "note";
    }

    type NoteEntity = Document<Note>;

    fn session_config() -> KvStorageConfig {
        KvStorageConfig::with_key(format!("test-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn default_config() {
        let config = KvStorageConfig::default();
        assert_eq!(config.key, "objgraph");
        assert!(!config.pretty);
    }

    #[tokio::test]
    async fn pull_without_data_is_empty() {
        let storage = SessionStorage::new(session_config());
        let store = ObjectStore::new();
        assert!(storage.pull(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_writes_json_under_key() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::open(dir.path(), KvStorageConfig::default()).unwrap();
        let store = ObjectStore::new();
        store.register_as::<NoteEntity>("notes");
        let note = store.create::<NoteEntity>().unwrap();
        note.write().title = "hi".to_string();

        storage.push(&store).await.unwrap();

        let raw = storage.engine().get_item("objgraph").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"notes": [{"id": note.id(), "title": "hi"}]})
        );
        assert!(!raw.contains('\n'));
    }

    #[tokio::test]
    async fn pretty_output_is_indented() {
        let storage = SessionStorage::new(KvStorageConfig {
            pretty: true,
            ..session_config()
        });
        let store = ObjectStore::new();
        store.register_as::<NoteEntity>("notes");
        store.create::<NoteEntity>().unwrap();

        storage.push(&store).await.unwrap();

        let raw = storage.engine().get_item(&storage.config().key).unwrap().unwrap();
        assert!(raw.contains('\n'));
    }

    #[tokio::test]
    async fn local_storage_roundtrip_through_store() {
        let dir = tempdir().unwrap();
        let first = ObjectStore::with_storage(
            LocalStorage::open(dir.path(), KvStorageConfig::default()).unwrap(),
        );
        first.register_as::<NoteEntity>("notes");
        let note = first.create::<NoteEntity>().unwrap();
        note.write().title = "persisted".to_string();
        first.flush().await.unwrap();

        let second = ObjectStore::with_storage(
            LocalStorage::open(dir.path(), KvStorageConfig::default()).unwrap(),
        );
        second.register_as::<NoteEntity>("notes");
        second.reload().await.unwrap();

        let copy = second.fetch::<NoteEntity>(note.id()).unwrap();
        assert_eq!(copy.read().title, "persisted");
        assert!(!Arc::ptr_eq(&copy, &note));
    }

    #[tokio::test]
    async fn corrupt_data_fails_reload_without_changes() {
        let storage = SessionStorage::new(session_config());
        storage
            .engine()
            .set_item(&storage.config().key, "not json")
            .unwrap();
        let store = ObjectStore::with_storage(storage);
        store.register_as::<NoteEntity>("notes");

        assert!(matches!(
            store.reload().await,
            Err(Error::Serialization(_))
        ));
        assert_eq!(store.len::<NoteEntity>(), 0);
    }

    #[tokio::test]
    async fn clear_drops_snapshot() {
        let storage = SessionStorage::new(session_config());
        let store = ObjectStore::new();
        store.register_as::<NoteEntity>("notes");
        store.create::<NoteEntity>().unwrap();
        storage.push(&store).await.unwrap();

        storage.clear().unwrap();

        assert!(storage.pull(&store).await.unwrap().is_empty());
    }

    #[test]
    fn open_propagates_invalid_directory() {
        let dir = tempdir().unwrap();
        let result = LocalStorage::open(dir.path().join("absent"), KvStorageConfig::default());
        assert!(matches!(result, Err(EngineError::UnusableRoot { .. })));
    }
}
