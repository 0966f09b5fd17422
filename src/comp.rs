//! Components are plain data records attached to at most one entity per type.
//!
//! Any `Send + Sync + 'static` type is a component;
//! there is no registration step or base trait to implement.
//! A registry assigns each component type a dense [`ComponentId`] on first use,
//! which is also the bit index of the type in a [`Mask`].

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use xias::Xias;

use crate::util::DbgTypeId;

mod mask;
pub use mask::{Mask, Signature};

mod list;
pub use list::{ComponentList, TypeVisitor};

#[cfg(test)]
mod tests;

/// The maximum number of distinct component types a registry can hold.
pub const MAX_COMPONENTS: usize = 128;

/// A type that can be stored as a component.
///
/// This is implemented for all eligible types automatically.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// The dense index of a component type within a registry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub(crate) u8);

impl ComponentId {
    /// Creates a component ID from an index.
    ///
    /// # Panics
    /// Panics if `index >= MAX_COMPONENTS`.
    pub fn new(index: usize) -> Self {
        assert!(
            index < MAX_COMPONENTS,
            "component index {index} exceeds the limit of {MAX_COMPONENTS} types"
        );
        Self(index.small_int())
    }

    /// Returns the index of this ID.
    pub fn index(self) -> usize { self.0.small_int() }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "ComponentId({})", self.0) }
}

/// The table of component types known to a registry.
#[derive(Debug, Default)]
pub struct Types {
    ids:   HashMap<TypeId, ComponentId>,
    types: Vec<DbgTypeId>,
}

impl Types {
    /// Looks up the ID of a type, if it has been assigned.
    pub fn get(&self, ty: TypeId) -> Option<ComponentId> { self.ids.get(&ty).copied() }

    /// Returns the ID of a type, assigning the next free ID if it is new.
    ///
    /// # Panics
    /// Panics if more than [`MAX_COMPONENTS`] types are registered.
    pub fn get_or_insert(&mut self, ty: DbgTypeId) -> ComponentId {
        if let Some(&id) = self.ids.get(&ty.id) {
            return id;
        }

        let id = ComponentId::new(self.types.len());
        self.ids.insert(ty.id, id);
        self.types.push(ty);
        log::trace!("Assigned {id:?} to component type {ty}");
        id
    }

    /// Returns the type registered for an ID.
    pub fn type_of(&self, id: ComponentId) -> Option<DbgTypeId> {
        self.types.get(id.index()).copied()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize { self.types.len() }

    /// Whether no types are registered.
    pub fn is_empty(&self) -> bool { self.types.is_empty() }
}
