use std::mem::MaybeUninit;

use bitvec::prelude::BitVec;

use super::{Iter, IterMut, Storage};
use crate::Entity;

/// The basic storage indexed by entity IDs directly.
///
/// Slots grow on demand, so references are not stable across insertions.
pub struct VecStorage<C> {
    cardinality: usize,
    bits:        BitVec,
    data:        Vec<MaybeUninit<C>>,
}

impl<C> VecStorage<C> {
    fn bit(&self, index: usize) -> bool {
        match self.bits.get(index) {
            Some(bit) => *bit,
            None => false,
        }
    }

    fn set_bit(&mut self, index: usize, bit: bool) {
        if self.bits.len() <= index {
            self.bits.resize(index + 1, false);
        }

        let delta_old = match *self.bits.get(index).expect("resized len >= index+1") {
            false => 0,
            true => 1,
        };
        let delta_new = match bit {
            false => 0,
            true => 1,
        };
        self.bits.set(index, bit);

        // split into two separate statements to avoid integer underflow
        self.cardinality -= delta_old;
        self.cardinality += delta_new;
    }
}

impl<C> Default for VecStorage<C> {
    fn default() -> Self { Self { cardinality: 0, bits: BitVec::new(), data: Vec::new() } }
}

impl<C: Send + Sync + 'static> Storage<C> for VecStorage<C> {
    fn get(&self, entity: Entity) -> Option<&C> {
        let index = entity.index();

        if self.bit(index) {
            let value = self.data.get(index).expect("bits mismatch");
            // Safety: the bit is only set after the slot is initialized.
            Some(unsafe { value.assume_init_ref() })
        } else {
            None
        }
    }

    fn get_mut(&mut self, entity: Entity) -> Option<&mut C> {
        let index = entity.index();

        if self.bit(index) {
            let value = self.data.get_mut(index).expect("bits mismatch");
            // Safety: the bit is only set after the slot is initialized.
            Some(unsafe { value.assume_init_mut() })
        } else {
            None
        }
    }

    fn set(&mut self, entity: Entity, new: Option<C>) -> Option<C> {
        let index = entity.index();

        let old = if self.bit(index) {
            let value = self.data.get(index).expect("bits mismatch");
            // Safety: the bit is set, and it is cleared or overwritten below
            // so the value is never read twice.
            Some(unsafe { value.assume_init_read() })
        } else {
            None
        };

        // the original value was already moved out, now we can overwrite the data or unmark it

        match new {
            Some(new) => {
                if self.data.len() <= index {
                    self.data.resize_with(index + 1, MaybeUninit::uninit);
                }
                let slot = self.data.get_mut(index).expect("just resized");
                *slot = MaybeUninit::new(new);
                self.set_bit(index, true);
            }
            None => {
                if self.bit(index) {
                    self.set_bit(index, false);
                }
            }
        }

        old
    }

    fn cardinality(&self) -> usize { self.cardinality }

    fn clear(&mut self) {
        for index in self.bits.iter_ones() {
            let value = self.data.get_mut(index).expect("bits mismatch");
            // Safety: the bit is set, and all bits are cleared right after.
            unsafe { value.assume_init_drop() };
        }

        self.bits.clear();
        self.data.clear();
        self.cardinality = 0;
    }

    fn iter(&self) -> Iter<'_, C> {
        let data = &self.data;

        Box::new(self.bits.iter_ones().map(move |index| {
            let value = data.get(index).expect("bits mismatch");
            // Safety: the bit is set.
            (Entity::from_index(index), unsafe { value.assume_init_ref() })
        }))
    }

    fn iter_mut(&mut self) -> IterMut<'_, C> {
        let bits = &self.bits;

        Box::new(self.data.iter_mut().enumerate().filter(move |&(index, _)| bits[index]).map(
            |(index, value)| {
                // Safety: the bit is set.
                (Entity::from_index(index), unsafe { value.assume_init_mut() })
            },
        ))
    }
}

impl<C> Drop for VecStorage<C> {
    fn drop(&mut self) {
        for index in self.bits.iter_ones() {
            if let Some(value) = self.data.get_mut(index) {
                // Safety: the bit is set, and the storage is never used again.
                unsafe { value.assume_init_drop() };
            }
        }
    }
}
