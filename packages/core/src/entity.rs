//! Entity identity: ids, root back-references and the entity traits.
//!
//! Every entity embeds an [`EntityBase`] carrying its immutable id and a
//! [`RootLink`], the non-owning back-reference to the object store that
//! admitted it. Only the object store writes the link; entity code reads it.

use std::any::Any;
use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::object_store::{ObjectStore, StoreShared};

/// The plain key-value form of one entity.
pub type PlainObject = serde_json::Map<String, JsonValue>;

/// Unique identifier of an entity within its kind's collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an id from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&EntityId> for EntityId {
    fn from(id: &EntityId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Shared, non-owning handle to the object store an entity belongs to.
///
/// Cloning a link shares the cell: a relation holding a clone of its parent's
/// link sees the parent become stored without being told.
#[derive(Clone, Default)]
pub struct RootLink(Arc<RwLock<Weak<StoreShared>>>);

impl RootLink {
    /// A link permanently pointing at one store.
    pub(crate) fn fixed(store: &ObjectStore) -> Self {
        Self(Arc::new(RwLock::new(store.downgrade())))
    }

    /// Resolve the link. `None` when detached or when the store was dropped.
    pub fn get(&self) -> Option<ObjectStore> {
        let weak = self.0.read().unwrap_or_else(PoisonError::into_inner);
        weak.upgrade().map(ObjectStore::from_shared)
    }

    /// Check if the link resolves to a live store.
    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }

    pub(crate) fn set(&self, store: &ObjectStore) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = store.downgrade();
    }

    pub(crate) fn clear(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Weak::new();
    }

    pub(crate) fn points_to(&self, store: &ObjectStore) -> bool {
        let weak = self.0.read().unwrap_or_else(PoisonError::into_inner);
        weak.ptr_eq(&store.downgrade())
    }
}

impl fmt::Debug for RootLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootLink")
            .field("attached", &self.is_set())
            .finish()
    }
}

/// Identity state embedded in every entity.
#[derive(Debug, Default)]
pub struct EntityBase {
    id: EntityId,
    root: RootLink,
}

impl EntityBase {
    /// A detached base with a freshly generated id.
    pub fn new() -> Self {
        Self::default()
    }

    /// A detached base with the given id.
    pub fn with_id(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            root: RootLink::default(),
        }
    }

    /// Take the `id` field out of a plain record.
    ///
    /// A missing, null or empty id is replaced by a generated one. Any other
    /// non-string id is rejected.
    pub fn from_plain(kind: &'static str, data: &mut PlainObject) -> Result<Self> {
        match data.remove("id") {
            None | Some(JsonValue::Null) => Ok(Self::new()),
            Some(JsonValue::String(id)) if id.is_empty() => Ok(Self::new()),
            Some(JsonValue::String(id)) => Ok(Self::with_id(id)),
            Some(other) => Err(Error::invalid_record(
                kind,
                format!("id must be a string, got {}", other),
            )),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn root(&self) -> Option<ObjectStore> {
        self.root.get()
    }

    /// The minimal plain form: `{ "id": ... }`.
    pub fn plain_object(&self) -> PlainObject {
        let mut plain = PlainObject::new();
        plain.insert("id".to_string(), JsonValue::String(self.id.0.clone()));
        plain
    }

    pub(crate) fn link(&self) -> &RootLink {
        &self.root
    }
}

/// Casting and naming helpers implemented for every [`EntityKind`].
///
/// This is what lets `Arc<dyn Entity>` be downcast to a concrete kind, a
/// concrete `Arc<E>` be widened to `Arc<dyn Entity>` behind a generic bound,
/// and an entity of unknown kind report [`EntityKind::NAME`].
pub trait AsEntity {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn into_entity(self: Arc<Self>) -> Arc<dyn Entity>;

    /// The kind's name, used in error messages.
    fn kind_name(&self) -> &'static str;
}

impl<T: EntityKind> AsEntity for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn into_entity(self: Arc<Self>) -> Arc<dyn Entity> {
        self
    }

    fn kind_name(&self) -> &'static str {
        T::NAME
    }
}

/// An identity-bearing record.
///
/// Concrete entities also implement [`EntityKind`], which supplies the
/// [`AsEntity`] helpers.
///
/// # Object Safety
///
/// This trait is object-safe: the object store keeps `Arc<dyn Entity>`.
pub trait Entity: AsEntity + Send + Sync + 'static {
    /// The embedded identity state.
    fn base(&self) -> &EntityBase;

    fn id(&self) -> &EntityId {
        self.base().id()
    }

    /// The object store this entity belongs to, if any.
    fn root(&self) -> Option<ObjectStore> {
        self.base().root()
    }

    /// True while this instance is a member of its root store.
    ///
    /// A built but unstored entity already has a root and still reports
    /// `false`, as does an instance whose id is held by another member.
    fn is_stored(&self) -> bool {
        let Some(store) = self.root() else {
            return false;
        };
        let any = self.as_any();
        store.holds(any.type_id(), self.id().as_str(), any as *const dyn Any as *const ())
    }

    /// Serialize to plain key-value form.
    ///
    /// Must be free of side effects and must always include `id`. Kinds with
    /// their own fields extend [`EntityBase::plain_object`].
    fn to_plain_object(&self) -> PlainObject {
        self.base().plain_object()
    }
}

impl dyn Entity {
    /// Check if this entity is of kind `E`.
    pub fn is<E: Entity>(&self) -> bool {
        self.as_any().is::<E>()
    }

    /// Downcast a shared entity to kind `E`.
    pub fn downcast<E: Entity>(self: Arc<Self>) -> Option<Arc<E>> {
        self.into_any().downcast::<E>().ok()
    }
}

/// A concrete entity kind that can be registered with an object store.
pub trait EntityKind: Entity + Sized {
    /// Default group label, and the kind's name in errors.
    const NAME: &'static str;

    /// Construct a detached instance from a plain record.
    ///
    /// Use [`EntityBase::from_plain`] to pick up (or generate) the id.
    fn from_plain(data: PlainObject) -> Result<Self>;
}

/// Anything that can tell which object store it resolves lookups against.
pub trait HasRoot {
    fn root_link(&self) -> RootLink;
}

impl HasRoot for EntityBase {
    fn root_link(&self) -> RootLink {
        self.root.clone()
    }
}

impl<E: Entity + ?Sized> HasRoot for E {
    fn root_link(&self) -> RootLink {
        self.base().root_link()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_kinds::{A, B};
    use serde_json::json;

    fn plain(value: JsonValue) -> PlainObject {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn id_is_taken_from_data() {
        let a = A::from_plain(plain(json!({"id": "test"}))).unwrap();
        assert_eq!(a.id().as_str(), "test");
    }

    #[test]
    fn id_is_generated_when_absent() {
        let a = A::from_plain(PlainObject::new()).unwrap();
        assert_eq!(a.id().as_str().len(), 36); // UUID format
    }

    #[test]
    fn empty_id_is_replaced() {
        let a = A::from_plain(plain(json!({"id": ""}))).unwrap();
        assert!(!a.id().as_str().is_empty());
    }

    #[test]
    fn non_string_id_is_rejected() {
        let result = A::from_plain(plain(json!({"id": 7})));
        assert!(matches!(result, Err(Error::InvalidRecord { kind: "A", .. })));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(EntityId::generate(), EntityId::generate());
    }

    #[test]
    fn detached_entity_has_no_root() {
        let a = A::detached();
        assert!(a.root().is_none());
        assert!(!a.is_stored());
    }

    #[test]
    fn plain_object_contains_id() {
        let a = A::with_id("abc");
        assert_eq!(JsonValue::Object(a.to_plain_object()), json!({"id": "abc"}));
    }

    #[test]
    fn dyn_downcast() {
        let entity: Arc<dyn Entity> = A::with_id("p");
        assert!(entity.is::<A>());
        assert!(!entity.is::<B>());
        let concrete = entity.downcast::<A>().unwrap();
        assert_eq!(concrete.id().as_str(), "p");
    }

    #[test]
    fn kind_name_is_the_kind_constant() {
        assert_eq!(A::detached().kind_name(), A::NAME);
        let entity: Arc<dyn Entity> = B::detached();
        assert_eq!(entity.kind_name(), "B");
    }

    #[test]
    fn entity_id_serializes_transparently() {
        let id = EntityId::new("x1");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("x1"));
    }

    #[test]
    fn root_link_clones_share_state() {
        let store = ObjectStore::new();
        let base = EntityBase::new();
        let shared = base.root_link();
        assert!(!shared.is_set());

        base.link().set(&store);
        assert!(shared.is_set());
        assert!(shared.points_to(&store));

        base.link().clear();
        assert!(!shared.is_set());
    }
}
