//! A storage is the data structure where components of the same type for all entities are stored.

use crate::Entity;

mod vec;
pub use vec::VecStorage as Vec;

mod tree;
pub use tree::Tree;

mod pool;
pub use pool::{AnyPool, ComponentPool};


/// The iterator returned by [`Storage::iter`].
pub type Iter<'t, C> = Box<dyn Iterator<Item = (Entity, &'t C)> + 't>;

/// The iterator returned by [`Storage::iter_mut`].
pub type IterMut<'t, C> = Box<dyn Iterator<Item = (Entity, &'t mut C)> + 't>;

/// A storage for storing component data.
///
/// Implementors must ensure that [`get`](Self::get) and [`get_mut`](Self::get_mut)
/// are consistent and that distinct entities never alias the same value.
pub trait Storage<C>: Send + Sync + 'static {
    /// Gets a shared reference to the component for a specific entity if it is present.
    fn get(&self, entity: Entity) -> Option<&C>;

    /// Gets a mutable reference to the component for a specific entity if it is present.
    fn get_mut(&mut self, entity: Entity) -> Option<&mut C>;

    /// Sets or removes the component for a specific entity,
    /// returning the original value if it was present.
    fn set(&mut self, entity: Entity, value: Option<C>) -> Option<C>;

    /// Returns the number of components that exist in this storage.
    fn cardinality(&self) -> usize;

    /// Drops every component in the storage.
    fn clear(&mut self);

    /// Returns an immutable iterator over the storage, ordered by entity index.
    fn iter(&self) -> Iter<'_, C>;

    /// Returns a mutable iterator over the storage, ordered by entity index.
    fn iter_mut(&mut self) -> IterMut<'_, C>;
}
