//! Error types for the key-value engines.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`KvEngine`](crate::KvEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The directory backing a disk engine cannot be used.
    #[error("cannot use {} as engine root: {reason}", .path.display())]
    UnusableRoot { path: PathBuf, reason: String },

    /// The key cannot be mapped onto the engine.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// A process-wide table was poisoned by a panicking writer.
    #[error("engine state poisoned")]
    Poisoned,

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<EngineError> for objgraph_core::Error {
    fn from(error: EngineError) -> Self {
        objgraph_core::Error::backend(error)
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
