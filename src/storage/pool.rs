use std::any::{self, Any};

use super::{Iter, IterMut, Storage};
use crate::comp::Component;
use crate::Entity;

/// Owns zero or one `T` per entity.
pub struct ComponentPool<T: Component> {
    storage: Box<dyn Storage<T>>,
}

impl<T: Component> ComponentPool<T> {
    /// Creates a pool backed by dense [`Vec`](super::Vec) storage.
    pub fn dense() -> Self { Self::with_storage(super::Vec::<T>::default()) }

    /// Creates a pool backed by sparse [`Tree`](super::Tree) storage.
    pub fn sparse() -> Self { Self::with_storage(super::Tree::<T>::default()) }

    /// Creates a pool over the given storage.
    pub fn with_storage(storage: impl Storage<T>) -> Self { Self { storage: Box::new(storage) } }

    /// Gets the component of an entity.
    pub fn get(&self, entity: Entity) -> Option<&T> { self.storage.get(entity) }

    /// Gets the component of an entity mutably.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> { self.storage.get_mut(entity) }

    /// Sets the component of an entity, returning the replaced value.
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        self.storage.set(entity, Some(value))
    }

    /// Removes the component of an entity.
    pub fn remove(&mut self, entity: Entity) -> Option<T> { self.storage.set(entity, None) }

    /// Number of entities with this component.
    pub fn len(&self) -> usize { self.storage.cardinality() }

    /// Whether no entity has this component.
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Iterates over all components in entity order.
    pub fn iter(&self) -> Iter<'_, T> { self.storage.iter() }

    /// Iterates over all components mutably in entity order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> { self.storage.iter_mut() }
}

/// Type-erased operations on a [`ComponentPool`].
pub trait AnyPool: Send + Sync + 'static {
    /// Drops the component of an entity if present.
    ///
    /// Returns whether a component was removed.
    fn remove_entity(&mut self, entity: Entity) -> bool;

    /// Drops all components.
    fn clear(&mut self);

    /// Checks whether an entity has the component.
    fn contains(&self, entity: Entity) -> bool;

    /// Number of stored components.
    fn len(&self) -> usize;

    /// Name of the component type.
    fn type_name(&self) -> &'static str;

    /// Casts to [`Any`] for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Casts to [`Any`] for typed mutable access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyPool for ComponentPool<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool { self.remove(entity).is_some() }

    fn clear(&mut self) { self.storage.clear(); }

    fn contains(&self, entity: Entity) -> bool { self.get(entity).is_some() }

    fn len(&self) -> usize { self.storage.cardinality() }

    fn type_name(&self) -> &'static str { any::type_name::<T>() }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

impl dyn AnyPool {
    /// Downcasts to the typed pool.
    ///
    /// # Panics
    /// Panics if the pool does not store `T`.
    pub fn typed<T: Component>(&self) -> &ComponentPool<T> {
        match self.as_any().downcast_ref() {
            Some(pool) => pool,
            None => panic!(
                "Pool of `{}` was accessed as a pool of `{}`",
                self.type_name(),
                any::type_name::<T>()
            ),
        }
    }

    /// Downcasts to the typed pool mutably.
    ///
    /// # Panics
    /// Panics if the pool does not store `T`.
    pub fn typed_mut<T: Component>(&mut self) -> &mut ComponentPool<T> {
        let type_name = self.type_name();
        match self.as_any_mut().downcast_mut() {
            Some(pool) => pool,
            None => panic!(
                "Pool of `{}` was accessed as a pool of `{}`",
                type_name,
                any::type_name::<T>()
            ),
        }
    }
}
