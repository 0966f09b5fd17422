use std::fmt;

use bitvec::prelude::{BitArray, Lsb0};

use super::{ComponentId, MAX_COMPONENTS};

type Bits = BitArray<[u64; 2], Lsb0>;

static_assertions::const_assert!(MAX_COMPONENTS <= 128);

/// A set of component types.
///
/// Used both for the components an entity currently has
/// and for the components a query requires or excludes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Mask {
    bits: Bits,
}

impl Mask {
    /// An empty mask.
    pub fn new() -> Self { Self::default() }

    /// Adds a component type to the mask.
    pub fn set(&mut self, id: ComponentId) { self.bits.set(id.index(), true); }

    /// Removes a component type from the mask.
    pub fn unset(&mut self, id: ComponentId) { self.bits.set(id.index(), false); }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, id: ComponentId) -> Self {
        self.set(id);
        self
    }

    /// Checks whether the component type is in the mask.
    pub fn contains(&self, id: ComponentId) -> bool { self.bits[id.index()] }

    /// Checks whether every type in `other` is also in `self`.
    pub fn is_superset_of(&self, other: &Self) -> bool {
        self.bits.as_raw_slice().iter().zip(other.bits.as_raw_slice()).all(|(&a, &b)| a & b == b)
    }

    /// Checks whether `self` and `other` share any type.
    pub fn intersects(&self, other: &Self) -> bool {
        self.bits.as_raw_slice().iter().zip(other.bits.as_raw_slice()).any(|(&a, &b)| a & b != 0)
    }

    /// Returns the union of two masks.
    pub fn union(&self, other: &Self) -> Self {
        let mut bits = self.bits;
        for (a, &b) in bits.as_raw_mut_slice().iter_mut().zip(other.bits.as_raw_slice()) {
            *a |= b;
        }
        Self { bits }
    }

    /// Returns the types in both masks.
    pub fn intersection(&self, other: &Self) -> Self {
        let mut bits = self.bits;
        for (a, &b) in bits.as_raw_mut_slice().iter_mut().zip(other.bits.as_raw_slice()) {
            *a &= b;
        }
        Self { bits }
    }

    /// Whether the mask has no types.
    pub fn is_empty(&self) -> bool { self.bits.not_any() }

    /// Number of types in the mask.
    pub fn len(&self) -> usize { self.bits.count_ones() }

    /// Iterates over the component IDs in ascending order.
    pub fn iter_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.bits.iter_ones().map(ComponentId::new)
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.bits.iter_ones()).finish()
    }
}

/// The component requirements of a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Entities must have all of these components.
    pub require:  Mask,
    /// Components resolved for the entity if present.
    pub optional: Mask,
    /// Entities must have none of these components.
    pub exclude:  Mask,
}

impl Signature {
    /// Checks whether an entity with the given mask belongs to this signature.
    pub fn matches(&self, mask: &Mask) -> bool {
        mask.is_superset_of(&self.require) && !mask.intersects(&self.exclude)
    }

    /// Checks whether a change from `old` to `new` may affect membership.
    pub fn is_affected_by(&self, old: &Mask, new: &Mask) -> bool {
        self.matches(old) != self.matches(new)
    }

    /// The components whose pools must be locked while iterating the view.
    pub fn accessed(&self) -> Mask { self.require.union(&self.optional) }
}
