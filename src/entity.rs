//! An entity is an opaque identity that owns components.
//!
//! Entities carry no payload.
//! The registry issues them from a fixed-capacity [`Ealloc`]
//! and recycles the index only after every component, view membership
//! and parent edge of the entity has been cleaned up.

use std::fmt;

use xias::Xias;

pub mod ealloc;
pub use ealloc::Ealloc;

#[cfg(test)]
mod tests;

/// A handle to an entity.
///
/// The handle is a raw index into the registry's entity table.
/// Liveness is tracked separately by the allocator bitset,
/// so a copied handle may outlive the entity it refers to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(pub(crate) u32);

impl Entity {
    /// A sentinel value that never refers to a live entity.
    pub const INVALID: Self = Self(u32::MAX);

    /// Constructs an entity handle from a raw index.
    ///
    /// This does not allocate anything; it is mostly useful in tests and when decoding.
    pub fn from_index(index: usize) -> Self { Self(index.small_int()) }

    /// Returns the raw index of this entity.
    pub fn index(self) -> usize { self.0.small_int() }

    /// Returns the raw index as stored.
    pub fn raw(self) -> u32 { self.0 }

    /// Whether this is [`Entity::INVALID`].
    pub fn is_invalid(self) -> bool { self == Self::INVALID }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "Entity(invalid)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

static_assertions::assert_eq_size!(Entity, u32);
static_assertions::assert_impl_all!(Entity: Send, Sync, Copy);
