//! One-to-many relations between a parent and children of one kind.
//!
//! A relation keeps an insertion-ordered list of child ids. Entries may be
//! bare ids (placeholders) that are resolved against the parent's object
//! store the first time they are fetched or iterated.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::entity::{Entity, EntityId, EntityKind, HasRoot, RootLink};
use crate::error::{Error, Result};
use crate::object_store::ObjectStore;

/// One input of [`ConnectedEntities::assign`]: a bare id or a live child.
#[derive(Debug, Clone)]
pub enum Member<C> {
    Id(EntityId),
    Entity(Arc<C>),
}

impl<C> From<Arc<C>> for Member<C> {
    fn from(entity: Arc<C>) -> Self {
        Member::Entity(entity)
    }
}

impl<C> From<EntityId> for Member<C> {
    fn from(id: EntityId) -> Self {
        Member::Id(id)
    }
}

impl<C> From<&EntityId> for Member<C> {
    fn from(id: &EntityId) -> Self {
        Member::Id(id.clone())
    }
}

impl<C> From<&str> for Member<C> {
    fn from(id: &str) -> Self {
        Member::Id(EntityId::from(id))
    }
}

impl<C> From<String> for Member<C> {
    fn from(id: String) -> Self {
        Member::Id(EntityId::from(id))
    }
}

type Entry<C> = (EntityId, Option<Arc<C>>);

/// Children of kind `C` connected to a parent.
///
/// The relation resolves through the parent's root, read at call time: a
/// relation built on a detached parent starts resolving once the parent is
/// stored.
///
/// # Example
///
/// ```rust,ignore
/// let project = store.create::<Document<Project>>()?;
/// let mut tasks = ConnectedEntities::<Document<Task>>::new(&*project);
///
/// let task = tasks.create()?;
/// assert!(tasks.has(&task));
/// for task in &mut tasks {
///     println!("{}", task.id());
/// }
/// ```
pub struct ConnectedEntities<C: EntityKind> {
    parent: RootLink,
    entries: Vec<Entry<C>>,
    index: HashMap<EntityId, usize>,
}

impl<C: EntityKind> ConnectedEntities<C> {
    /// An empty relation hanging off `parent`.
    pub fn new<P: HasRoot + ?Sized>(parent: &P) -> Self {
        Self {
            parent: parent.root_link(),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// The object store of the parent.
    pub fn root(&self) -> Option<ObjectStore> {
        self.parent.get()
    }

    fn require_root(&self) -> Result<ObjectStore> {
        self.root().ok_or(Error::NoRoot { kind: C::NAME })
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    fn push(&mut self, id: EntityId, entity: Option<Arc<C>>) {
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, entity));
    }

    fn remove(&mut self, position: usize) {
        let (id, _) = self.entries.remove(position);
        self.index.remove(&id);
        for (later, _) in &self.entries[position..] {
            if let Some(i) = self.index.get_mut(later) {
                *i -= 1;
            }
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id.clone(), i))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every id in the relation, resolved or not, in order.
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> + '_ {
        self.entries.iter().map(|(id, _)| id)
    }

    /// Get a child by id, resolving a placeholder through the root.
    ///
    /// A successful resolution is remembered; a failed one is retried on
    /// the next call.
    pub fn fetch(&mut self, id: impl AsRef<str>) -> Option<Arc<C>> {
        let index = self.position(id.as_ref())?;
        if let Some(entity) = &self.entries[index].1 {
            return Some(Arc::clone(entity));
        }

        let entity = self.root()?.fetch::<C>(id.as_ref())?;
        self.entries[index].1 = Some(Arc::clone(&entity));
        Some(entity)
    }

    /// Check if the relation holds an entity. Entities of another kind are
    /// never held.
    pub fn has<E: Entity + ?Sized>(&self, entity: &Arc<E>) -> bool {
        (**entity).as_any().is::<C>() && self.position(entity.id().as_str()).is_some()
    }

    /// Add a child. A child already present is left as is.
    pub fn attach(&mut self, entity: Arc<C>) -> &mut Self {
        if self.position(entity.id().as_str()).is_none() {
            self.push(entity.id().clone(), Some(entity));
        }
        self
    }

    /// [`attach`](Self::attach) for an entity of unknown kind.
    ///
    /// # Errors
    ///
    /// * `ClassMismatch` - the entity is not a `C`.
    pub fn attach_dyn(&mut self, entity: Arc<dyn Entity>) -> Result<&mut Self> {
        let actual = entity.kind_name();
        let entity = entity.downcast::<C>().ok_or(Error::ClassMismatch {
            expected: C::NAME,
            actual,
        })?;
        Ok(self.attach(entity))
    }

    /// Remove a child from the relation. The object store is not touched.
    pub fn detach<E: Entity + ?Sized>(&mut self, entity: &Arc<E>) -> &mut Self {
        if !(**entity).as_any().is::<C>() {
            return self;
        }
        if let Some(position) = self.position(entity.id().as_str()) {
            self.remove(position);
        }
        self
    }

    /// Create a child in the root store and attach it.
    pub fn create(&mut self) -> Result<Arc<C>> {
        let entity = self.require_root()?.create::<C>()?;
        self.attach(Arc::clone(&entity));
        Ok(entity)
    }

    /// Build a child rooted in the parent's store, neither stored nor
    /// attached.
    pub fn build(&self) -> Result<Arc<C>> {
        self.require_root()?.build::<C>()
    }

    /// Detach resolved children that are no longer stored.
    ///
    /// Placeholders are kept: they may still resolve later.
    pub fn clean(&mut self) -> &mut Self {
        let before = self.entries.len();
        self.entries
            .retain(|(_, entity)| entity.as_ref().map_or(true, |e| e.is_stored()));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.reindex();
            debug!(kind = C::NAME, removed, "cleaned relation");
        }
        self
    }

    /// Detach a child and delete it from the root store.
    ///
    /// Entities that are not members are left alone, even when stored.
    ///
    /// # Errors
    ///
    /// * `ClassMismatch` - the entity is not a `C`.
    /// * `NoRoot` - the parent is detached.
    pub fn delete<E: Entity + ?Sized>(&mut self, entity: &Arc<E>) -> Result<&mut Self> {
        if !(**entity).as_any().is::<C>() {
            return Err(Error::ClassMismatch {
                expected: C::NAME,
                actual: entity.kind_name(),
            });
        }
        if !self.has(entity) {
            return Ok(self);
        }

        self.require_root()?.delete(entity)?;
        Ok(self.detach(entity))
    }

    /// Replace the contents with ids and children, in order.
    ///
    /// Bare ids become placeholders resolved on first access.
    pub fn assign<I, M>(&mut self, members: I) -> &mut Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Member<C>>,
    {
        self.entries.clear();
        self.index.clear();
        for member in members {
            match member.into() {
                Member::Id(id) => match self.position(id.as_str()) {
                    Some(index) => self.entries[index].1 = None,
                    None => self.push(id, None),
                },
                Member::Entity(entity) => {
                    self.attach(entity);
                }
            }
        }
        self
    }

    /// Iterate over resolvable children, resolving placeholders on the way.
    pub fn iter(&mut self) -> Iter<'_, C> {
        Iter {
            root: self.root(),
            entries: self.entries.iter_mut(),
        }
    }
}

impl<C: EntityKind> HasRoot for ConnectedEntities<C> {
    fn root_link(&self) -> RootLink {
        self.parent.clone()
    }
}

impl<C: EntityKind> fmt::Debug for ConnectedEntities<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedEntities")
            .field("kind", &C::NAME)
            .field("ids", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}

/// Iterator over the children of a [`ConnectedEntities`].
///
/// Ids that fail to resolve are skipped and stay placeholders.
pub struct Iter<'a, C: EntityKind> {
    root: Option<ObjectStore>,
    entries: std::slice::IterMut<'a, Entry<C>>,
}

impl<'a, C: EntityKind> Iterator for Iter<'a, C> {
    type Item = Arc<C>;

    fn next(&mut self) -> Option<Self::Item> {
        for (id, slot) in self.entries.by_ref() {
            if let Some(entity) = slot {
                return Some(Arc::clone(entity));
            }
            if let Some(entity) = self.root.as_ref().and_then(|r| r.fetch::<C>(id.as_str())) {
                *slot = Some(Arc::clone(&entity));
                return Some(entity);
            }
        }
        None
    }
}

impl<'a, C: EntityKind> IntoIterator for &'a mut ConnectedEntities<C> {
    type Item = Arc<C>;
    type IntoIter = Iter<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
