//! Entity registry - the fixed set of regions and facilities on the map
//!
//! Filled once at startup from geometry input. Keys are unique within a kind;
//! a region and a facility may share a name because they live in different
//! join spaces.

use crate::domain::entity::Entity;
use crate::domain::types::{DisplayHandle, EntityKind, JoinKey};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{kind} {key:?} is already registered")]
    Duplicate { kind: EntityKind, key: JoinKey },
    #[error("entity name is empty after normalization")]
    EmptyKey,
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    /// Entities in registration order
    entities: Vec<Entity>,
    /// (kind, key) -> index into `entities`
    index: FxHashMap<(EntityKind, JoinKey), usize>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity under the normalized form of `name`
    pub fn register(
        &mut self,
        name: &str,
        kind: EntityKind,
        handle: DisplayHandle,
    ) -> Result<&Entity, RegistryError> {
        let entity = Entity::new(name, kind, handle);
        if entity.key.is_empty() {
            return Err(RegistryError::EmptyKey);
        }

        let slot = (kind, entity.key.clone());
        if self.index.contains_key(&slot) {
            return Err(RegistryError::Duplicate { kind, key: entity.key });
        }

        debug!(key = %entity.key, kind = %kind, handle = %handle, "entity_registered");
        let idx = self.entities.len();
        self.index.insert(slot, idx);
        self.entities.push(entity);
        Ok(&self.entities[idx])
    }

    pub fn find(&self, kind: EntityKind, key: &JoinKey) -> Option<&Entity> {
        self.index.get(&(kind, key.clone())).map(|&idx| &self.entities[idx])
    }

    /// All entities of one kind, in registration order
    pub fn all(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.all(kind).count()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
