//! An ordered id list of one kind, materialized on demand.
//!
//! The id list is the canonical content: it is what an owning entity embeds
//! in its plain form. Instances are fetched from the root store the first
//! time the cache is iterated.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::entity::{Entity, EntityId, EntityKind, HasRoot, RootLink};
use crate::error::{Error, Result};
use crate::object_store::ObjectStore;

/// A lazily loaded list of entities of kind `C`.
///
/// # Example
///
/// ```rust,ignore
/// let mut cache = Cache::<Document<Task>>::with_ids(&store, ids);
/// for task in &mut cache {
///     println!("{}", task.id());
/// }
/// ```
pub struct Cache<C: EntityKind> {
    parent: RootLink,
    ids: Vec<EntityId>,
    entities: Option<Vec<Arc<C>>>,
}

impl<C: EntityKind> Cache<C> {
    /// An empty cache resolving through `parent`: a store, an entity or a
    /// relation.
    pub fn new<P: HasRoot + ?Sized>(parent: &P) -> Self {
        Self::with_ids(parent, Vec::<EntityId>::new())
    }

    /// A cache over a copy of the given ids.
    pub fn with_ids<P: HasRoot + ?Sized>(
        parent: &P,
        ids: impl IntoIterator<Item = impl Into<EntityId>>,
    ) -> Self {
        Self {
            parent: parent.root_link(),
            ids: ids.into_iter().map(Into::into).collect(),
            entities: None,
        }
    }

    /// Number of ids, resolvable or not.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn root(&self) -> Option<ObjectStore> {
        self.parent.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.entities.is_some()
    }

    /// The id list, in order.
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    /// Check if the id list holds an entity. Entities of another kind are
    /// never included.
    pub fn includes<E: Entity + ?Sized>(&self, entity: &Arc<E>) -> bool {
        (**entity).as_any().is::<C>() && self.ids.iter().any(|id| id == entity.id())
    }

    /// Append an entity. Ids may repeat.
    pub fn attach(&mut self, entity: Arc<C>) -> &mut Self {
        self.ids.push(entity.id().clone());
        if let Some(entities) = &mut self.entities {
            entities.push(entity);
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

    /// Remove the first occurrence of an entity's id, and its instance if
    /// materialized.
    ///
    /// # Errors
    ///
    /// * `ClassMismatch` - the entity is not a `C`.
    pub fn detach<E: Entity + ?Sized>(&mut self, entity: &Arc<E>) -> Result<&mut Self> {
        if !(**entity).as_any().is::<C>() {
            return Err(Error::ClassMismatch {
                expected: C::NAME,
                actual: entity.kind_name(),
            });
        }

        let Some(index) = self.ids.iter().position(|id| id == entity.id()) else {
            return Ok(self);
        };
        self.ids.remove(index);

        if let Some(entities) = &mut self.entities {
            if let Some(index) = entities.iter().position(|e| e.id() == entity.id()) {
                entities.remove(index);
            }
        }
        Ok(self)
    }

    /// Resolve every id through the root, dropping the ones that fail.
    ///
    /// Does nothing when already loaded or when no root is reachable.
    pub fn load(&mut self) -> &mut Self {
        if self.entities.is_some() {
            return self;
        }
        let Some(root) = self.root() else {
            return self;
        };

        let entities: Vec<Arc<C>> = self
            .ids
            .iter()
            .filter_map(|id| root.fetch::<C>(id))
            .collect();
        debug!(
            kind = C::NAME,
            ids = self.ids.len(),
            resolved = entities.len(),
            "loaded cache"
        );
        self.entities = Some(entities);
        self
    }

    /// Drop every id and instance. The loaded state is kept.
    pub fn clear(&mut self) -> &mut Self {
        self.ids.clear();
        if let Some(entities) = &mut self.entities {
            entities.clear();
        }
        self
    }

    /// Replace the contents with the given entities.
    pub fn fill(&mut self, entities: impl IntoIterator<Item = Arc<C>>) -> &mut Self {
        self.clear();
        for entity in entities {
            self.attach(entity);
        }
        self
    }

    /// Load if needed, then iterate over the materialized instances.
    pub fn iter(&mut self) -> std::slice::Iter<'_, Arc<C>> {
        self.load();
        self.entities.as_deref().unwrap_or(&[]).iter()
    }

    /// Ids of the instances that resolve, in order.
    pub fn to_array(&mut self) -> Vec<EntityId> {
        self.iter().map(|e| e.id().clone()).collect()
    }
}

impl<C: EntityKind> fmt::Debug for Cache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("kind", &C::NAME)
            .field("ids", &self.ids)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl<'a, C: EntityKind> IntoIterator for &'a mut Cache<C> {
    type Item = &'a Arc<C>;
    type IntoIter = std::slice::Iter<'a, Arc<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
