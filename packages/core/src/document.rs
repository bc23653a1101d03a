//! A ready-made entity kind parameterized over a serde payload.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::entity::{Entity, EntityBase, EntityId, EntityKind, PlainObject};
use crate::error::{Error, Result};

/// The payload shape of a [`Document`] kind.
///
/// Payloads serialize to a JSON object whose fields sit next to `id` in the
/// plain form. Mark fields `#[serde(default)]` so that kinds can be built
/// without seed data.
pub trait Payload: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind name, and default group label.
    const NAME: &'static str;
}

/// An entity carrying a mutable payload of type `P`.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default, Serialize, Deserialize)]
/// struct Task {
///     #[serde(default)]
///     title: String,
/// }
///
/// impl Payload for Task {
///     const NAME: &'static str = "task";
/// }
///
/// let task = Document::new(Task { title: "write docs".into() });
/// task.write().title.push('!');
/// ```
pub struct Document<P: Payload> {
    base: EntityBase,
    payload: RwLock<P>,
}

impl<P: Payload> Document<P> {
    /// A detached document with a generated id.
    pub fn new(payload: P) -> Self {
        Self {
            base: EntityBase::new(),
            payload: RwLock::new(payload),
        }
    }

    /// A detached document with the given id.
    pub fn with_id(id: impl Into<EntityId>, payload: P) -> Self {
        Self {
            base: EntityBase::with_id(id),
            payload: RwLock::new(payload),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, P> {
        self.payload.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, P> {
        self.payload.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the payload in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut *self.write())
    }
}

impl<P: Payload + Default> Default for Document<P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P: Payload + fmt::Debug> fmt::Debug for Document<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("kind", &P::NAME)
            .field("id", self.base.id())
            .field("payload", &*self.read())
            .finish()
    }
}

impl<P: Payload> Entity for Document<P> {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn to_plain_object(&self) -> PlainObject {
        let mut plain = match serde_json::to_value(&*self.read()) {
            Ok(JsonValue::Object(fields)) => fields,
            Ok(JsonValue::Null) => PlainObject::new(),
            Ok(other) => {
                warn!(kind = P::NAME, id = %self.id(), value = %other, "payload is not an object");
                PlainObject::new()
            }
            Err(e) => {
                warn!(kind = P::NAME, id = %self.id(), error = %e, "payload failed to serialize");
                PlainObject::new()
            }
        };
        plain.insert("id".to_string(), JsonValue::String(self.id().to_string()));
        plain
    }
}

impl<P: Payload> EntityKind for Document<P> {
    const NAME: &'static str = P::NAME;

    fn from_plain(mut data: PlainObject) -> Result<Self> {
        let base = EntityBase::from_plain(P::NAME, &mut data)?;
        let payload = serde_json::from_value(JsonValue::Object(data))
            .map_err(|e| Error::invalid_record(P::NAME, e.to_string()))?;
        Ok(Self {
            base,
            payload: RwLock::new(payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::AsEntity;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Note {
        #[serde(default)]
        title: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    impl Payload for Note {
        const NAME: &'static str = "note";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Strict {
        count: u32,
    }

    impl Payload for Strict {
        const NAME: &'static str = "strict";
    }

    fn plain(value: JsonValue) -> PlainObject {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn plain_object_flattens_payload_next_to_id() {
        let note = Document::with_id(
            "n1",
            Note {
                title: "hello".to_string(),
                tags: vec!["a".to_string()],
            },
        );

        assert_eq!(
            JsonValue::Object(note.to_plain_object()),
            json!({"id": "n1", "title": "hello", "tags": ["a"]})
        );
    }

    #[test]
    fn from_plain_reads_payload_and_id() {
        let note =
            Document::<Note>::from_plain(plain(json!({"id": "n2", "title": "t"}))).unwrap();
        assert_eq!(note.id().as_str(), "n2");
        assert_eq!(note.read().title, "t");
        assert!(note.read().tags.is_empty());
    }

    #[test]
    fn from_plain_without_data_uses_defaults() {
        let note = Document::<Note>::from_plain(PlainObject::new()).unwrap();
        assert_eq!(*note.read(), Note::default());
    }

    #[test]
    fn from_plain_rejects_bad_payload() {
        let result = Document::<Strict>::from_plain(plain(json!({"count": "many"})));
        assert!(matches!(
            result,
            Err(Error::InvalidRecord { kind: "strict", .. })
        ));
    }

    #[test]
    fn update_mutates_payload() {
        let note = Document::new(Note::default());
        note.update(|n| n.title = "changed".to_string());
        assert_eq!(note.to_plain_object()["title"], "changed");
    }

    #[test]
    fn kind_name_is_payload_name() {
        let note = Document::new(Note::default());
        assert_eq!(note.kind_name(), "note");
        assert_eq!(<Document<Note> as EntityKind>::NAME, "note");
    }
}
