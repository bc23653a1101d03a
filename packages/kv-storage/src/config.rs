/// Configuration for a [`KvStorage`](crate::KvStorage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvStorageConfig {
    /// Key the snapshot is written under.
    pub key: String,

    /// Write indented JSON.
    pub pretty: bool,
}

impl KvStorageConfig {
    /// Default settings with another key.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }
}

impl Default for KvStorageConfig {
    fn default() -> Self {
        Self {
            key: "objgraph".to_string(),
            pretty: false,
        }
    }
}
