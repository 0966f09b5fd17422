//! Manages entity ID allocation and deallocation.

use bitvec::prelude::BitVec;
use xias::Xias;

use super::Entity;


/// Returned when the allocator has no free IDs left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("entity capacity {capacity} exhausted")]
pub struct CapacityError {
    /// The fixed capacity of the allocator.
    pub capacity: usize,
}

/// A fixed-capacity entity allocator.
///
/// Free IDs are kept in a FILO stack,
/// so recently released IDs are reused first.
/// A fresh allocator issues IDs in ascending order.
#[derive(Debug)]
pub struct Ealloc {
    /// The maximum number of simultaneously live entities.
    capacity:  usize,
    /// `allocated[i]` is set if and only if entity `i` is live.
    allocated: BitVec,
    /// The stack of free IDs. The top of the stack is the next ID to allocate.
    free:      Vec<u32>,
}

impl Ealloc {
    /// Creates an allocator where all `capacity` IDs are free.
    ///
    /// # Panics
    /// Panics if `capacity` does not fit in the raw entity representation.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity < Entity::INVALID.index(),
            "entity capacity {capacity} collides with the invalid entity sentinel"
        );

        Self {
            capacity,
            allocated: BitVec::repeat(false, capacity),
            free: (0..capacity).rev().map(|index| index.small_int()).collect(),
        }
    }

    /// Allocates a new ID.
    pub fn allocate(&mut self) -> Result<Entity, CapacityError> {
        let id = self.free.pop().ok_or(CapacityError { capacity: self.capacity })?;
        let entity = Entity(id);
        debug_assert!(!self.is_allocated(entity), "free list contains a live entity {entity:?}");
        self.allocated.set(entity.index(), true);
        Ok(entity)
    }

    /// Returns an ID to the free list.
    ///
    /// Returns `false` if the ID was not allocated.
    pub fn release(&mut self, entity: Entity) -> bool {
        if !self.is_allocated(entity) {
            return false;
        }

        self.allocated.set(entity.index(), false);
        self.free.push(entity.0);
        true
    }

    /// Releases all IDs.
    ///
    /// The allocator behaves as if it was freshly created afterwards.
    pub fn release_all(&mut self) {
        self.allocated.fill(false);
        self.free.clear();
        self.free.extend((0..self.capacity).rev().map(|index| index.small_int::<u32>()));
    }

    /// Checks whether an ID is currently allocated.
    pub fn is_allocated(&self, entity: Entity) -> bool {
        match self.allocated.get(entity.index()) {
            Some(bit) => *bit,
            None => false,
        }
    }

    /// Returns the number of live IDs.
    pub fn len(&self) -> usize { self.capacity - self.free.len() }

    /// Returns whether there are no live IDs.
    pub fn is_empty(&self) -> bool { self.free.len() == self.capacity }

    /// Returns the fixed capacity of this allocator.
    pub fn capacity(&self) -> usize { self.capacity }

    /// Iterates over all live IDs in ascending order.
    pub fn iter_allocated(&self) -> impl Iterator<Item = Entity> + '_ {
        self.allocated.iter_ones().map(Entity::from_index)
    }
}
