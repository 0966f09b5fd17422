//! Index-based component handles.

use std::any;
use std::fmt;
use std::marker::PhantomData;

use crate::comp::{Component, ComponentId};
use crate::registry::ComponentRef;
use crate::{Entity, Registry};

/// A handle to the `T` component of an entity.
///
/// The handle only stores indices and resolves the component on every access,
/// so it stays valid across pool growth and never keeps a dangling reference.
/// It becomes invalid when the component is removed or the entity is destroyed.
pub struct StableHandle<T: Component> {
    entity: Entity,
    id:     ComponentId,
    _ph:    PhantomData<fn() -> T>,
}

impl<T: Component> StableHandle<T> {
    pub(crate) fn new(entity: Entity, id: ComponentId) -> Self {
        Self { entity, id, _ph: PhantomData }
    }

    /// The entity owning the component.
    pub fn entity(&self) -> Entity { self.entity }

    /// The component type ID in the registry that issued this handle.
    pub fn component_id(&self) -> ComponentId { self.id }

    /// Resolves the component, returning `None` if the handle is no longer valid.
    pub fn resolve<'r>(&self, registry: &'r Registry) -> Option<ComponentRef<'r, T>> {
        registry.get_component::<T>(self.entity)
    }

    /// Resolves the component.
    ///
    /// # Panics
    /// Panics if the handle is no longer valid.
    pub fn get<'r>(&self, registry: &'r Registry) -> ComponentRef<'r, T> {
        match self.resolve(registry) {
            Some(value) => value,
            None => {
                cfg_if::cfg_if! {
                    if #[cfg(debug_assertions)] {
                        panic!(
                            "{self:?} is invalid: entity exists = {}, component mask = {:?}",
                            registry.entity_exists(self.entity),
                            registry.component_mask(self.entity),
                        )
                    } else {
                        panic!("{self:?} is invalid")
                    }
                }
            }
        }
    }

    /// Whether the component still exists.
    pub fn is_valid(&self, registry: &Registry) -> bool {
        registry.component_mask(self.entity).contains(self.id)
    }
}

impl<T: Component> Clone for StableHandle<T> {
    fn clone(&self) -> Self { *self }
}

impl<T: Component> Copy for StableHandle<T> {}

impl<T: Component> PartialEq for StableHandle<T> {
    fn eq(&self, other: &Self) -> bool { self.entity == other.entity && self.id == other.id }
}

impl<T: Component> Eq for StableHandle<T> {}

impl<T: Component> fmt::Debug for StableHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StableHandle<{}>({:?})", any::type_name::<T>(), self.entity)
    }
}
