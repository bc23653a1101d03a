//! Synchronous string key-value engines.
//!
//! An engine maps string keys to string values, the way browser web storage
//! does. [`DiskEngine`] keeps one file per key; [`SessionEngine`] keeps a
//! table shared by the whole process.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lazy_static::lazy_static;
use tracing::debug;

use crate::error::{EngineError, Result};

/// A string key-value table.
pub trait KvEngine: Send + Sync {
    /// Read a value. `None` when the key was never set or was removed.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;
}

lazy_static! {
    static ref SESSION_TABLE: Mutex<HashMap<String, String>> = Mutex::new(HashMap::new());
}

/// Engine over a process-lifetime table.
///
/// Every `SessionEngine` in the process sees the same table; it is gone when
/// the process exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionEngine;

impl SessionEngine {
    pub fn new() -> Self {
        Self
    }
}

impl KvEngine for SessionEngine {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let table = SESSION_TABLE.lock().map_err(|_| EngineError::Poisoned)?;
        Ok(table.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut table = SESSION_TABLE.lock().map_err(|_| EngineError::Poisoned)?;
        table.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut table = SESSION_TABLE.lock().map_err(|_| EngineError::Poisoned)?;
        table.remove(key);
        Ok(())
    }
}

/// Engine persisting each key as a `<key>.json` file in a directory.
#[derive(Debug, Clone)]
pub struct DiskEngine {
    root: PathBuf,
}

impl DiskEngine {
    /// Open an engine over an existing, writable directory.
    ///
    /// The path is resolved to its canonical form before it is checked.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let requested = root.into();
        let unusable = |reason: String| EngineError::UnusableRoot {
            path: requested.clone(),
            reason,
        };

        let root = requested
            .canonicalize()
            .map_err(|e| unusable(e.to_string()))?;
        let metadata = root.metadata().map_err(|e| unusable(e.to_string()))?;
        let problem = if !metadata.is_dir() {
            Some("not a directory")
        } else if metadata.permissions().readonly() {
            Some("directory is read-only")
        } else {
            None
        };
        if let Some(problem) = problem {
            return Err(unusable(problem.to_string()));
        }

        debug!(root = %root.display(), "opened disk engine");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_to_file_path(&self, key: &str) -> Result<PathBuf> {
        let reason = if key.is_empty() {
            Some("key is empty")
        } else if key.contains(['/', '\\']) {
            Some("contains a path separator")
        } else if key.starts_with('.') {
            Some("starts with a dot")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(EngineError::InvalidKey {
                key: key.to_string(),
                reason,
            }),
            None => Ok(self.root.join(format!("{}.json", key))),
        }
    }
}

impl KvEngine for DiskEngine {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let file_path = self.key_to_file_path(key)?;
        debug!("Reading {}...", file_path.display());
        match fs::read_to_string(&file_path) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let file_path = self.key_to_file_path(key)?;
        let staging = file_path.with_extension("json.tmp");
        debug!("Writing {}...", file_path.display());

        fs::write(&staging, value)?;
        fs::rename(&staging, &file_path)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let file_path = self.key_to_file_path(key)?;
        match fs::remove_file(&file_path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
