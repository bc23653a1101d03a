//! Error types for the object graph.

use thiserror::Error;

/// Errors raised by the object store, relations, caches and storages.
///
/// Lookup misses are never errors: every `fetch` variant returns `None`
/// instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The entity kind was never registered with the object store.
    #[error("entity kind not registered: {kind}")]
    UnregisteredClass { kind: &'static str },

    /// An entity of one kind was handed to a collection bound to another.
    #[error("entity kind mismatch: expected {expected}, got {actual}")]
    ClassMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A new instance was requested with an id already resident in its
    /// kind's collection.
    #[error("{kind} already has a member with id {id}")]
    DuplicateId { kind: &'static str, id: String },

    /// A storage operation the backend does not provide.
    #[error("operation not implemented: {0}")]
    NotImplemented(&'static str),

    /// A relation needs its parent's object store, but the parent is detached.
    #[error("no object store reachable for {kind}")]
    NoRoot { kind: &'static str },

    /// A plain record could not be turned into an entity.
    #[error("invalid record for {kind}: {message}")]
    InvalidRecord { kind: &'static str, message: String },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The storage backend failed.
    #[error("backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap any backend failure.
    pub fn backend<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Backend(error.into())
    }

    pub(crate) fn invalid_record(kind: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidRecord {
            kind,
            message: message.into(),
        }
    }
}

/// Result type alias for object graph operations.
pub type Result<T> = std::result::Result<T, Error>;
