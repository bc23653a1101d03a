//! The object store: a registry-backed identity map.
//!
//! Entity kinds are registered under a group label. Each registered kind owns
//! an insertion-ordered collection of live instances, unique by id. The whole
//! registered universe can be flattened to a [`Snapshot`] and pushed to, or
//! pulled back from, a [`Storage`] backend.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::{debug, info, warn};

use crate::entity::{Entity, EntityId, EntityKind, HasRoot, PlainObject, RootLink};
use crate::error::{Error, Result};
use crate::storage::{MemoryStorage, Storage};

/// Serialized form of a whole store: group label → plain records.
pub type Snapshot = BTreeMap<String, Vec<PlainObject>>;

type Constructor = fn(PlainObject) -> Result<Arc<dyn Entity>>;

fn construct<E: EntityKind>(data: PlainObject) -> Result<Arc<dyn Entity>> {
    let entity: Arc<dyn Entity> = Arc::new(E::from_plain(data)?);
    Ok(entity)
}

/// Runtime descriptor of one registered kind and its live members.
struct KindEntry {
    type_id: TypeId,
    name: &'static str,
    group: String,
    construct: Constructor,
    members: Vec<Arc<dyn Entity>>,
    /// Position of each member in `members`, by id.
    index: HashMap<EntityId, usize>,
}

impl KindEntry {
    fn get(&self, id: &str) -> Option<&Arc<dyn Entity>> {
        self.index.get(id).map(|&i| &self.members[i])
    }

    fn push(&mut self, member: Arc<dyn Entity>) {
        self.index.insert(member.id().clone(), self.members.len());
        self.members.push(member);
    }

    fn remove(&mut self, id: &str) -> Option<Arc<dyn Entity>> {
        let position = self.index.remove(id)?;
        let member = self.members.remove(position);
        for later in &self.members[position..] {
            if let Some(i) = self.index.get_mut(later.id().as_str()) {
                *i -= 1;
            }
        }
        Some(member)
    }
}

/// Registered kinds, in registration order.
#[derive(Default)]
struct Registry {
    kinds: Vec<KindEntry>,
}

impl Registry {
    fn get(&self, type_id: TypeId) -> Option<&KindEntry> {
        self.kinds.iter().find(|k| k.type_id == type_id)
    }

    fn get_mut(&mut self, type_id: TypeId) -> Option<&mut KindEntry> {
        self.kinds.iter_mut().find(|k| k.type_id == type_id)
    }
}

pub(crate) struct StoreShared {
    registry: RwLock<Registry>,
    storage: Arc<dyn Storage>,
}

/// A registry of entity kinds and their live instances.
///
/// `ObjectStore` is a cheap handle: clones share the same registry.
/// Entities admitted to the store hold a weak back-reference to it, so
/// dropping every handle drops the store and detaches its entities.
///
/// # Example
///
/// ```rust,ignore
/// use objgraph_core::{Document, ObjectStore, Payload};
///
/// let store = ObjectStore::new();
/// store.register_as::<Document<Task>>("tasks");
///
/// let task = store.create::<Document<Task>>()?;
/// assert!(task.is_stored());
/// assert!(store.fetch::<Document<Task>>(task.id()).is_some());
/// ```
#[derive(Clone)]
pub struct ObjectStore {
    shared: Arc<StoreShared>,
}

impl ObjectStore {
    /// Create a store backed by a fresh [`MemoryStorage`].
    pub fn new() -> Self {
        Self::with_storage(MemoryStorage::new())
    }

    /// Create a store persisting through the given backend.
    pub fn with_storage<S: Storage + 'static>(storage: S) -> Self {
        Self::with_shared_storage(Arc::new(storage))
    }

    /// Create a store persisting through a backend shared with other owners.
    pub fn with_shared_storage(storage: Arc<dyn Storage>) -> Self {
        Self {
            shared: Arc::new(StoreShared {
                registry: RwLock::new(Registry::default()),
                storage,
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<StoreShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreShared> {
        Arc::downgrade(&self.shared)
    }

    /// Check if two handles refer to the same store.
    pub fn same_store(&self, other: &ObjectStore) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// The backend used by [`flush`](Self::flush) and [`reload`](Self::reload).
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.shared.storage
    }

    fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.shared
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, Registry> {
        self.shared
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a kind under its own name.
    pub fn register<E: EntityKind>(&self) -> &Self {
        self.register_as::<E>(E::NAME)
    }

    /// Register a kind under a group label.
    ///
    /// Registering an already registered kind only updates its label; its
    /// members are kept.
    pub fn register_as<E: EntityKind>(&self, group: impl Into<String>) -> &Self {
        let group = group.into();
        let type_id = TypeId::of::<E>();
        let mut registry = self.registry_mut();

        if registry
            .kinds
            .iter()
            .any(|k| k.type_id != type_id && k.group == group)
        {
            warn!(kind = E::NAME, group = %group, "group label shared by several kinds");
        }

        match registry.get_mut(type_id) {
            Some(entry) => {
                debug!(kind = E::NAME, from = %entry.group, to = %group, "re-registered entity kind");
                entry.group = group;
            }
            None => {
                debug!(kind = E::NAME, group = %group, "registered entity kind");
                registry.kinds.push(KindEntry {
                    type_id,
                    name: E::NAME,
                    group,
                    construct: construct::<E>,
                    members: Vec::new(),
                    index: HashMap::new(),
                });
            }
        }

        self
    }

    pub fn is_registered<E: EntityKind>(&self) -> bool {
        self.registry().get(TypeId::of::<E>()).is_some()
    }

    /// The group label a kind was registered under.
    pub fn group_of<E: EntityKind>(&self) -> Option<String> {
        self.registry()
            .get(TypeId::of::<E>())
            .map(|k| k.group.clone())
    }

    /// Check if a member of kind `E` carries the id.
    pub fn contains<E: EntityKind>(&self, id: impl AsRef<str>) -> bool {
        self.registry()
            .get(TypeId::of::<E>())
            .is_some_and(|k| k.get(id.as_ref()).is_some())
    }

    /// Check if the member under `id` is the instance at `instance`.
    pub(crate) fn holds(&self, type_id: TypeId, id: &str, instance: *const ()) -> bool {
        self.registry()
            .get(type_id)
            .and_then(|k| k.get(id))
            .is_some_and(|member| std::ptr::eq(Arc::as_ptr(member) as *const (), instance))
    }

    /// Number of live members of a kind. Zero for unregistered kinds.
    pub fn len<E: EntityKind>(&self) -> usize {
        self.registry()
            .get(TypeId::of::<E>())
            .map_or(0, |k| k.members.len())
    }

    /// Construct a new, unstored instance whose root is this store.
    pub fn build<E: EntityKind>(&self) -> Result<Arc<E>> {
        self.build_with(PlainObject::new())
    }

    /// Construct a new, unstored instance from seed data.
    ///
    /// # Errors
    ///
    /// * `UnregisteredClass` - `E` was never registered.
    /// * `InvalidRecord` - the seed data cannot build an `E`.
    /// * `DuplicateId` - the seed id already belongs to a member of `E`.
    pub fn build_with<E: EntityKind>(&self, data: PlainObject) -> Result<Arc<E>> {
        if !self.is_registered::<E>() {
            return Err(Error::UnregisteredClass { kind: E::NAME });
        }

        let entity = Arc::new(E::from_plain(data)?);
        if self.contains::<E>(entity.id()) {
            return Err(Error::DuplicateId {
                kind: E::NAME,
                id: entity.id().to_string(),
            });
        }

        entity.base().link().set(self);
        Ok(entity)
    }

    /// Construct a new instance and store it.
    pub fn create<E: EntityKind>(&self) -> Result<Arc<E>> {
        self.create_with(PlainObject::new())
    }

    /// Construct a new instance from seed data and store it.
    ///
    /// Fails like [`build_with`](Self::build_with); on success the returned
    /// instance is the member under its id.
    pub fn create_with<E: EntityKind>(&self, data: PlainObject) -> Result<Arc<E>> {
        let entity = self.build_with::<E>(data)?;
        self.store(&entity)?;
        Ok(entity)
    }

    /// Admit an entity into its kind's collection.
    ///
    /// Storing a member again, or another instance carrying a member's id, is
    /// a no-op. The store becomes the entity's root only when it has none: an
    /// entity rooted elsewhere keeps its root.
    pub fn store<E: Entity + ?Sized>(&self, entity: &Arc<E>) -> Result<&Self> {
        let entity = Arc::clone(entity).into_entity();
        let type_id = entity.as_any().type_id();

        {
            let mut registry = self.registry_mut();
            let kind = registry.get_mut(type_id).ok_or(Error::UnregisteredClass {
                kind: entity.kind_name(),
            })?;

            if let Some(resident) = kind.get(entity.id().as_str()) {
                if !Arc::ptr_eq(resident, &entity) {
                    debug!(kind = kind.name, id = %entity.id(), "id already resident, keeping resident instance");
                }
                return Ok(self);
            }

            kind.push(Arc::clone(&entity));
            debug!(kind = kind.name, id = %entity.id(), "stored entity");
        }

        if !entity.base().link().is_set() {
            entity.base().link().set(self);
        }

        Ok(self)
    }

    /// Remove an entity from its kind's collection.
    ///
    /// Deleting a non-member is a no-op. A removed member rooted in this
    /// store is detached.
    pub fn delete<E: Entity + ?Sized>(&self, entity: &Arc<E>) -> Result<&Self> {
        let type_id = (**entity).as_any().type_id();

        let removed = {
            let mut registry = self.registry_mut();
            let kind = registry.get_mut(type_id).ok_or(Error::UnregisteredClass {
                kind: entity.kind_name(),
            })?;

            let removed = kind.remove(entity.id().as_str());
            if removed.is_some() {
                debug!(kind = kind.name, id = %entity.id(), "deleted entity");
            }
            removed
        };

        if let Some(member) = removed {
            for link in [member.base().link(), entity.base().link()] {
                if link.points_to(self) {
                    link.clear();
                }
            }
        }

        Ok(self)
    }

    /// Find a member of kind `E` by id.
    pub fn fetch<E: EntityKind>(&self, id: impl AsRef<str>) -> Option<Arc<E>> {
        let member = {
            let registry = self.registry();
            let kind = registry.get(TypeId::of::<E>())?;
            Arc::clone(kind.get(id.as_ref())?)
        };
        member.downcast::<E>()
    }

    /// Find a member of any kind by id.
    ///
    /// Kinds are searched in registration order; the first match wins.
    pub fn fetch_any(&self, id: impl AsRef<str>) -> Option<Arc<dyn Entity>> {
        let id = id.as_ref();
        self.registry()
            .kinds
            .iter()
            .find_map(|k| k.get(id).cloned())
    }

    /// Snapshot of every member of kind `E`, in insertion order.
    pub fn fetch_all<E: EntityKind>(&self) -> Vec<Arc<E>> {
        let members = match self.registry().get(TypeId::of::<E>()) {
            Some(kind) => kind.members.clone(),
            None => return Vec::new(),
        };
        members.into_iter().filter_map(|m| m.downcast::<E>()).collect()
    }

    /// Flatten every registered kind to plain records keyed by group label.
    pub fn to_plain_object(&self) -> Snapshot {
        let groups: Vec<(String, Vec<Arc<dyn Entity>>)> = self
            .registry()
            .kinds
            .iter()
            .map(|k| (k.group.clone(), k.members.clone()))
            .collect();

        let mut snapshot = Snapshot::new();
        for (group, members) in groups {
            snapshot
                .entry(group)
                .or_default()
                .extend(members.iter().map(|m| m.to_plain_object()));
        }
        snapshot
    }

    /// Push the current snapshot to the backend.
    pub async fn flush(&self) -> Result<()> {
        let storage = Arc::clone(&self.shared.storage);
        storage.push(self).await?;
        info!(groups = self.registry().kinds.len(), "flushed object store");
        Ok(())
    }

    /// Pull a snapshot from the backend and store every record of a
    /// registered group.
    ///
    /// Reload merges: members absent from the pulled data are kept, and
    /// records whose id is already resident are skipped. Every record is
    /// decoded before any is stored, so a failed reload changes nothing.
    pub async fn reload(&self) -> Result<()> {
        let storage = Arc::clone(&self.shared.storage);
        let snapshot = storage.pull(self).await?;

        let kinds: Vec<(String, Constructor)> = self
            .registry()
            .kinds
            .iter()
            .map(|k| (k.group.clone(), k.construct))
            .collect();

        let mut built = Vec::new();
        for (group, construct) in kinds {
            let Some(records) = snapshot.get(&group) else {
                continue;
            };
            for record in records {
                built.push(construct(record.clone())?);
            }
        }

        let count = built.len();
        for entity in &built {
            self.store(entity)?;
        }

        info!(records = count, "reloaded object store");
        Ok(())
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HasRoot for ObjectStore {
    fn root_link(&self) -> RootLink {
        RootLink::fixed(self)
    }
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry();
        let mut map = f.debug_map();
        for kind in &registry.kinds {
            map.entry(&kind.group, &kind.members.len());
        }
        map.finish()
    }
}
