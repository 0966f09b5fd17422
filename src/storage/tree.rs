use std::collections::BTreeMap;

use super::{Iter, IterMut, Storage};
use crate::Entity;

/// A storage based on [`BTreeMap`].
///
/// Suitable for components that only a small fraction of entities have.
pub struct Tree<C> {
    data: BTreeMap<Entity, C>,
}

impl<C> Default for Tree<C> {
    fn default() -> Self { Self { data: BTreeMap::new() } }
}

impl<C: Send + Sync + 'static> Storage<C> for Tree<C> {
    fn get(&self, entity: Entity) -> Option<&C> { self.data.get(&entity) }

    fn get_mut(&mut self, entity: Entity) -> Option<&mut C> { self.data.get_mut(&entity) }

    fn set(&mut self, entity: Entity, new: Option<C>) -> Option<C> {
        match new {
            Some(new) => self.data.insert(entity, new),
            None => self.data.remove(&entity),
        }
    }

    fn cardinality(&self) -> usize { self.data.len() }

    fn clear(&mut self) { self.data.clear(); }

    fn iter(&self) -> Iter<'_, C> { Box::new(self.data.iter().map(|(&entity, value)| (entity, value))) }

    fn iter_mut(&mut self) -> IterMut<'_, C> {
        Box::new(self.data.iter_mut().map(|(&entity, value)| (entity, value)))
    }
}
