//! Cached, incrementally maintained queries over the registry.
//!
//! A view tracks the entities whose component mask matches a [`Signature`].
//! Mask changes never touch the view directly;
//! they append to the view's queues, which are drained on the next read.
//! This keeps mutation cheap and lets iteration hold a consistent snapshot.

use std::any::TypeId;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;

use bitvec::prelude::BitVec;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::comp::{Component, ComponentList, Mask, Signature};
use crate::registry::MaskTable;
use crate::storage::AnyPool;
use crate::tracer::{self, Tracer};
use crate::{Entity, Registry};

#[cfg(test)]
mod tests;

/// Entities must have all components in `L`.
pub struct Require<L>(PhantomData<L>);

/// Components in `L` are resolved if the entity has them.
pub struct Optional<L>(PhantomData<L>);

/// Entities must have none of the components in `L`.
pub struct Exclude<L>(PhantomData<L>);

/// The required part of a view query.
pub trait RequireFilter: 'static {
    /// The required components.
    type List: ComponentList;
}

impl<L: ComponentList> RequireFilter for Require<L> {
    type List = L;
}

/// The optional part of a view query.
pub trait OptionalFilter: 'static {
    /// The optional components.
    type List: ComponentList;
}

impl<L: ComponentList> OptionalFilter for Optional<L> {
    type List = L;
}

/// The excluded part of a view query.
pub trait ExcludeFilter: 'static {
    /// The excluded components.
    type List: ComponentList;
}

impl<L: ComponentList> ExcludeFilter for Exclude<L> {
    type List = L;
}

/// A member of a view.
///
/// Only indices are stored.
/// Component references are resolved from the locked pools during iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSet {
    /// The member entity.
    pub entity:   Entity,
    /// The optional components the entity had at the last refresh.
    pub optional: Mask,
}

#[derive(Default)]
struct State {
    results:   Vec<ComponentSet>,
    /// `contained[i]` is set if and only if entity `i` is in `results`.
    contained: BitVec,
}

impl State {
    fn contains(&self, entity: Entity) -> bool {
        match self.contained.get(entity.index()) {
            Some(bit) => *bit,
            None => false,
        }
    }

    fn mark(&mut self, entity: Entity, present: bool) {
        if self.contained.len() <= entity.index() {
            self.contained.resize(entity.index() + 1, false);
        }
        self.contained.set(entity.index(), present);
    }
}

#[derive(Default)]
struct Queue {
    to_add:    Vec<Entity>,
    to_remove: Vec<Entity>,
}

/// The entities matching a signature.
pub struct View {
    signature:     Signature,
    capacity_hint: usize,
    /// The view lock.
    state:         RwLock<State>,
    /// The queue lock. Never held while waiting for the view lock.
    queue:         Mutex<Queue>,
}

impl View {
    pub(crate) fn new(signature: Signature, capacity_hint: usize) -> Self {
        Self {
            signature,
            capacity_hint,
            state: RwLock::new(State {
                results:   Vec::with_capacity(capacity_hint),
                contained: BitVec::new(),
            }),
            queue: Mutex::new(Queue::default()),
        }
    }

    /// The signature of this view.
    pub fn signature(&self) -> &Signature { &self.signature }

    /// Queues an entity to be added on the next refresh.
    ///
    /// The entity is only added if its mask still matches at that time.
    pub fn try_add_entity(&self, entity: Entity) { self.queue.lock().to_add.push(entity); }

    /// Queues an entity to be removed on the next refresh.
    ///
    /// The entity is only removed if its mask no longer matches at that time.
    pub fn remove_entity(&self, entity: Entity) { self.queue.lock().to_remove.push(entity); }

    /// Whether there are queued changes.
    pub fn has_pending(&self) -> bool {
        let queue = self.queue.lock();
        !queue.to_add.is_empty() || !queue.to_remove.is_empty()
    }

    /// Seeds the view with every live entity that matches.
    ///
    /// Must be called before the view is visible to other threads.
    pub(crate) fn populate_with_lock(&self, masks: &MaskTable) {
        let mut state = self.state.write();
        debug_assert!(state.results.is_empty(), "view populated twice");
        self.fill(&mut state, masks);
    }

    /// Discards the queues and recomputes membership from scratch.
    pub(crate) fn clear_and_refresh(&self, masks: &RwLock<MaskTable>) {
        let mut state = self.state.write();
        *self.queue.lock() = Queue::default();

        state.results.clear();
        state.results.shrink_to(self.capacity_hint);
        state.contained.clear();

        let masks = masks.read();
        self.fill(&mut state, &masks);
    }

    fn fill(&self, state: &mut State, masks: &MaskTable) {
        for entity in masks.iter_live() {
            let mask = masks.get(entity);
            if self.signature.matches(&mask) {
                state.results.push(ComponentSet {
                    entity,
                    optional: mask.intersection(&self.signature.optional),
                });
                state.mark(entity, true);
            }
        }
    }

    /// Applies queued changes.
    ///
    /// Returns the number of added and removed entities.
    pub(crate) fn ensure_updated(
        &self,
        masks: &RwLock<MaskTable>,
        tracer: &impl Tracer,
    ) -> (usize, usize) {
        let queue = mem::take(&mut *self.queue.lock());
        if queue.to_add.is_empty() && queue.to_remove.is_empty() {
            return (0, 0);
        }

        let mut state = self.state.write();
        let masks = masks.read();

        let mut removing: BitVec = BitVec::new();
        let mut removed = 0;
        for entity in queue.to_remove {
            if state.contains(entity) && !masks.matches(&self.signature, entity) {
                if removing.len() <= entity.index() {
                    removing.resize(entity.index() + 1, false);
                }
                if !removing[entity.index()] {
                    removing.set(entity.index(), true);
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            state.results.retain(|set| !removing.get(set.entity.index()).map_or(false, |bit| *bit));
            for index in removing.iter_ones() {
                state.contained.set(index, false);
            }
        }

        let mut added = 0;
        for entity in queue.to_add {
            if !masks.matches(&self.signature, entity) {
                continue;
            }

            let optional = masks.get(entity).intersection(&self.signature.optional);
            if state.contains(entity) {
                if let Some(set) = state.results.iter_mut().find(|set| set.entity == entity) {
                    set.optional = optional;
                }
                continue;
            }

            state.results.push(ComponentSet { entity, optional });
            state.mark(entity, true);
            added += 1;
        }

        tracer.drain_view(added, removed);
        (added, removed)
    }

    /// Number of members as of the last refresh.
    pub fn len(&self) -> usize { self.state.read().results.len() }

    /// Whether the view had no members at the last refresh.
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Whether the entity was a member at the last refresh.
    pub fn contains(&self, entity: Entity) -> bool { self.state.read().contains(entity) }

    /// The members as of the last refresh, in insertion order.
    pub fn entities(&self) -> Vec<Entity> {
        self.state.read().results.iter().map(|set| set.entity).collect()
    }
}

/// A read-locked pool used during iteration.
struct LockedPool<'r> {
    ty:    TypeId,
    guard: RwLockReadGuard<'r, Box<dyn AnyPool>>,
}

/// The entity being visited in [`ViewRef::for_each`].
pub struct ViewItem<'v, 'r> {
    set:   ComponentSet,
    pools: &'v [LockedPool<'r>],
}

impl<'v, 'r> ViewItem<'v, 'r> {
    /// The current entity.
    pub fn entity(&self) -> Entity { self.set.entity }

    /// The optional components the entity had at the last refresh.
    pub fn optional_mask(&self) -> Mask { self.set.optional }

    fn pool<T: Component>(&self) -> Option<&'v dyn AnyPool> {
        self.pools
            .iter()
            .find(|pool| pool.ty == TypeId::of::<T>())
            .map(|pool| &**pool.guard)
    }

    /// Gets a component of the entity.
    ///
    /// # Panics
    /// Panics if `T` is not required or optional in the view,
    /// or if the entity does not have it.
    pub fn get<T: Component>(&self) -> &'v T {
        match self.try_get::<T>() {
            Some(value) => value,
            None => panic!(
                "{:?} has no component {} in this view",
                self.set.entity,
                std::any::type_name::<T>()
            ),
        }
    }

    /// Gets a component of the entity if it has it.
    ///
    /// Always returns `None` if `T` is not part of the view.
    pub fn try_get<T: Component>(&self) -> Option<&'v T> {
        self.pool::<T>()?.typed::<T>().get(self.set.entity)
    }

    /// Whether the entity has the component.
    pub fn has<T: Component>(&self) -> bool { self.try_get::<T>().is_some() }
}

/// A view borrowed from a registry.
pub struct ViewRef<'r> {
    registry: &'r Registry,
    view:     Arc<View>,
}

impl<'r> ViewRef<'r> {
    pub(crate) fn new(registry: &'r Registry, view: Arc<View>) -> Self { Self { registry, view } }

    /// The shared view.
    pub fn view(&self) -> &Arc<View> { &self.view }

    /// Applies queued membership changes.
    pub fn ensure_updated(&self) -> (usize, usize) { self.ensure_updated_with(&tracer::Noop) }

    /// Applies queued membership changes, reporting to a tracer.
    pub fn ensure_updated_with(&self, tracer: &impl Tracer) -> (usize, usize) {
        self.view.ensure_updated(self.registry.masks(), tracer)
    }

    /// Discards the queues and recomputes membership from scratch.
    pub fn clear_and_refresh(&self) { self.view.clear_and_refresh(self.registry.masks()) }

    /// Calls `f` on every member.
    ///
    /// The view and the pools of its signature are read-locked during the whole iteration,
    /// so the visited set is fixed even if other threads queue changes meanwhile.
    /// Mutating the components of this view from `f` deadlocks.
    pub fn for_each(&self, mut f: impl FnMut(ViewItem<'_, 'r>)) {
        self.ensure_updated();

        let state = self.view.state.read();

        let pools: Vec<LockedPool<'r>> = self
            .view
            .signature
            .accessed()
            .iter_ids()
            .map(|id| {
                let entry = self.registry.pool_entry(id).expect("signature types have pools");
                LockedPool { ty: entry.ty.id, guard: entry.pool.read_recursive() }
            })
            .collect();

        for &set in &state.results {
            f(ViewItem { set, pools: &pools });
        }
    }

    /// Queues an entity to be added on the next refresh.
    pub fn try_add_entity(&self, entity: Entity) { self.view.try_add_entity(entity) }

    /// Queues an entity to be removed on the next refresh.
    pub fn remove_entity(&self, entity: Entity) { self.view.remove_entity(entity) }

    /// Number of members, after applying queued changes.
    pub fn len(&self) -> usize {
        self.ensure_updated();
        self.view.len()
    }

    /// Whether there are no members, after applying queued changes.
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Whether the entity is a member, after applying queued changes.
    pub fn contains(&self, entity: Entity) -> bool {
        self.ensure_updated();
        self.view.contains(entity)
    }

    /// The members in insertion order, after applying queued changes.
    pub fn entities(&self) -> Vec<Entity> {
        self.ensure_updated();
        self.view.entities()
    }
}

static_assertions::assert_impl_all!(View: Send, Sync);
