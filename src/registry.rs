//! The registry owns all entities, components, parent edges and views.
//!
//! # Locking
//! Every method takes `&self`; the registry is shared across threads by reference.
//! Locks are always acquired in this order:
//!
//! 1. the entity lock (allocator),
//! 2. the view cache and each view's lock,
//! 3. pool locks, in ascending component ID,
//! 4. the mask table.
//!
//! Views and pools never take the entity lock.
//! A view's queue lock is a leaf lock and may be taken at any point.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use bitvec::prelude::BitVec;
use indexmap::IndexMap;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, Mutex, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

use crate::comp::{self, Component, ComponentId, ComponentList, Mask, Signature, TypeVisitor};
use crate::config::RegistryConfig;
use crate::entity::ealloc::CapacityError;
use crate::events::{Dispatcher, EntityCreated, EntityDestroyed};
use crate::handle::StableHandle;
use crate::hierarchy::{CycleError, ParentGraph};
use crate::storage::{AnyPool, ComponentPool};
use crate::util::DbgTypeId;
use crate::view::{ExcludeFilter, OptionalFilter, RequireFilter, View, ViewRef};
use crate::{Ealloc, Entity};


/// A shared reference to a component, holding the pool's read lock.
pub type ComponentRef<'r, T> = MappedRwLockReadGuard<'r, T>;

/// An exclusive reference to a component, holding the pool's write lock.
pub type ComponentMut<'r, T> = MappedRwLockWriteGuard<'r, T>;

/// The component masks of all entities.
pub(crate) struct MaskTable {
    masks: Vec<Mask>,
    live:  BitVec,
}

impl MaskTable {
    fn new(capacity: usize) -> Self {
        Self { masks: vec![Mask::new(); capacity], live: BitVec::repeat(false, capacity) }
    }

    pub(crate) fn is_live(&self, entity: Entity) -> bool {
        match self.live.get(entity.index()) {
            Some(bit) => *bit,
            None => false,
        }
    }

    /// The mask of an entity. Empty for dead entities.
    pub(crate) fn get(&self, entity: Entity) -> Mask {
        self.masks.get(entity.index()).copied().unwrap_or_default()
    }

    pub(crate) fn matches(&self, signature: &Signature, entity: Entity) -> bool {
        self.is_live(entity) && signature.matches(&self.get(entity))
    }

    pub(crate) fn iter_live(&self) -> impl Iterator<Item = Entity> + '_ {
        self.live.iter_ones().map(Entity::from_index)
    }

    fn revive(&mut self, entity: Entity) {
        self.masks[entity.index()] = Mask::new();
        self.live.set(entity.index(), true);
    }

    fn kill(&mut self, entity: Entity) {
        self.masks[entity.index()] = Mask::new();
        self.live.set(entity.index(), false);
    }

    /// Updates a bit, returning the old and new masks.
    fn update(&mut self, entity: Entity, id: ComponentId, present: bool) -> (Mask, Mask) {
        let mask = &mut self.masks[entity.index()];
        let old = *mask;
        if present {
            mask.set(id);
        } else {
            mask.unset(id);
        }
        (old, *mask)
    }

    fn reset(&mut self) {
        self.masks.fill(Mask::new());
        self.live.fill(false);
    }
}

/// A lazily created component pool.
pub(crate) struct PoolEntry {
    pub(crate) ty:   DbgTypeId,
    /// The pool lock.
    pub(crate) pool: RwLock<Box<dyn AnyPool>>,
}

/// The container of an ECS world.
pub struct Registry {
    config:      RegistryConfig,
    entity_lock: Mutex<Ealloc>,
    masks:       RwLock<MaskTable>,
    types:       RwLock<comp::Types>,
    /// Indexed by component ID.
    pools:       Box<[OnceLock<PoolEntry>]>,
    sparse:      Mutex<HashSet<TypeId>>,
    parents:     Mutex<ParentGraph>,
    views:       RwLock<IndexMap<Signature, Arc<View>>>,
    dispatcher:  Arc<Dispatcher>,
}

impl Default for Registry {
    fn default() -> Self { Self::new(RegistryConfig::default()) }
}

impl Registry {
    /// Creates an empty registry with its own event dispatcher.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_dispatcher(config, Arc::new(Dispatcher::new()))
    }

    /// Creates an empty registry that publishes events to `dispatcher`.
    pub fn with_dispatcher(config: RegistryConfig, dispatcher: Arc<Dispatcher>) -> Self {
        log::debug!("Creating registry for {} entities", config.max_entities);

        Self {
            config,
            entity_lock: Mutex::new(Ealloc::new(config.max_entities)),
            masks: RwLock::new(MaskTable::new(config.max_entities)),
            types: RwLock::new(comp::Types::default()),
            pools: (0..comp::MAX_COMPONENTS).map(|_| OnceLock::new()).collect(),
            sparse: Mutex::new(HashSet::new()),
            parents: Mutex::new(ParentGraph::default()),
            views: RwLock::new(IndexMap::new()),
            dispatcher,
        }
    }

    /// The configuration this registry was created with.
    pub fn config(&self) -> &RegistryConfig { &self.config }

    /// The maximum number of live entities.
    pub fn capacity(&self) -> usize { self.config.max_entities }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize { self.entity_lock.lock().len() }

    /// The event dispatcher of this registry.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> { &self.dispatcher }

    pub(crate) fn masks(&self) -> &RwLock<MaskTable> { &self.masks }

    pub(crate) fn pool_entry(&self, id: ComponentId) -> Option<&PoolEntry> {
        self.pools[id.index()].get()
    }

    fn known_id<T: Component>(&self) -> Option<ComponentId> {
        self.types.read().get(TypeId::of::<T>())
    }

    /// Returns the ID of a component type, creating its pool on first use.
    ///
    /// # Panics
    /// Panics if more than [`MAX_COMPONENTS`](comp::MAX_COMPONENTS) types are used.
    pub fn component_id<T: Component>(&self) -> ComponentId {
        let id = match self.known_id::<T>() {
            Some(id) => id,
            None => self.types.write().get_or_insert(DbgTypeId::of::<T>()),
        };

        self.pools[id.index()].get_or_init(|| {
            let sparse = self.sparse.lock().contains(&TypeId::of::<T>());
            let pool: Box<dyn AnyPool> = if sparse {
                Box::new(ComponentPool::<T>::sparse())
            } else {
                Box::new(ComponentPool::<T>::dense())
            };
            PoolEntry { ty: DbgTypeId::of::<T>(), pool: RwLock::new(pool) }
        });

        id
    }

    /// Stores `T` in tree storage instead of dense storage.
    ///
    /// Returns `false` if the pool of `T` already exists,
    /// in which case its storage is unchanged.
    pub fn register_sparse<T: Component>(&self) -> bool {
        if let Some(id) = self.known_id::<T>() {
            if self.pool_entry(id).is_some() {
                log::warn!("Pool of {} already exists, cannot make it sparse", DbgTypeId::of::<T>());
                return false;
            }
        }

        self.sparse.lock().insert(TypeId::of::<T>());
        true
    }

    /// Creates an entity.
    ///
    /// # Panics
    /// Panics if the registry is full.
    pub fn create_entity(&self) -> Entity {
        match self.try_create_entity() {
            Ok(entity) => entity,
            Err(err) => {
                log::error!("Cannot create entity: {err}");
                panic!("Cannot create entity: {err}");
            }
        }
    }

    /// Creates an entity, or returns an error if the registry is full.
    pub fn try_create_entity(&self) -> Result<Entity, CapacityError> {
        let entity = {
            let mut ealloc = self.entity_lock.lock();
            let entity = ealloc.allocate()?;
            self.masks.write().revive(entity);
            entity
        };

        for view in self.views.read().values() {
            if view.signature().matches(&Mask::new()) {
                view.try_add_entity(entity);
            }
        }

        log::trace!("Created {entity:?}");
        self.dispatcher.dispatch(&EntityCreated { entity });
        Ok(entity)
    }

    /// Whether the entity is live.
    pub fn entity_exists(&self, entity: Entity) -> bool { self.masks.read().is_live(entity) }

    fn assert_exists(&self, entity: Entity) {
        assert!(self.entity_exists(entity), "{entity:?} does not exist");
    }

    /// Destroys an entity with all its components and parent edges.
    ///
    /// [`EntityDestroyed`] is dispatched before anything is removed.
    /// Returns `false` if the entity does not exist.
    pub fn destroy_entity(&self, entity: Entity) -> bool {
        if !self.entity_exists(entity) {
            return false;
        }

        self.dispatcher.dispatch(&EntityDestroyed { entity });

        let mut ealloc = self.entity_lock.lock();
        if !ealloc.is_allocated(entity) {
            // destroyed by a listener
            return false;
        }

        // Views drained from now on see the entity as dead,
        // while the component values stay readable until removed below.
        let mask = {
            let mut masks = self.masks.write();
            let mask = masks.get(entity);
            masks.kill(entity);
            mask
        };

        for view in self.views.read().values() {
            if view.signature().matches(&mask) {
                view.remove_entity(entity);
            }
        }

        for id in mask.iter_ids() {
            if let Some(entry) = self.pool_entry(id) {
                entry.pool.write().remove_entity(entity);
            }
        }

        self.parents.lock().remove_entity(entity);
        ealloc.release(entity);

        log::trace!("Destroyed {entity:?}");
        true
    }

    /// Destroys all entities.
    ///
    /// [`EntityDestroyed`] is dispatched for each live entity first.
    pub fn destroy_all_entities(&self) {
        let mut notified: BitVec = BitVec::repeat(false, self.capacity());

        // Listeners may create entities, which must be notified too.
        let mut ealloc = loop {
            let ealloc = self.entity_lock.lock();
            let pending: Vec<Entity> =
                ealloc.iter_allocated().filter(|entity| !notified[entity.index()]).collect();
            if pending.is_empty() {
                break ealloc;
            }
            drop(ealloc);

            for entity in pending {
                notified.set(entity.index(), true);
                self.dispatcher.dispatch(&EntityDestroyed { entity });
            }
        };
        let count = ealloc.len();

        for entry in self.pools.iter().filter_map(OnceLock::get) {
            entry.pool.write().clear();
        }
        self.parents.lock().reset();
        self.masks.write().reset();
        ealloc.release_all();

        let views: Vec<Arc<View>> = self.views.read().values().cloned().collect();
        for view in views {
            view.clear_and_refresh(&self.masks);
        }

        log::debug!("Destroyed all {count} entities");
    }

    /// Sets the component of an entity, returning the replaced value.
    ///
    /// # Panics
    /// Panics if the entity does not exist.
    pub fn emplace_component<T: Component>(&self, entity: Entity, value: T) -> Option<T> {
        self.assert_exists(entity);
        let id = self.component_id::<T>();
        let entry = self.pool_entry(id).expect("component_id creates the pool");

        let (old, masks) = {
            let mut pool = entry.pool.write();
            let mut masks = self.masks.write();
            assert!(masks.is_live(entity), "{entity:?} does not exist");
            let old = pool.typed_mut::<T>().insert(entity, value);
            (old, masks.update(entity, id, true))
        };

        self.notify_views(entity, &masks.0, &masks.1);
        old
    }

    /// Removes the component of an entity.
    pub fn remove_component<T: Component>(&self, entity: Entity) -> Option<T> {
        let id = self.known_id::<T>()?;
        let entry = self.pool_entry(id)?;

        let (old, masks) = {
            let mut pool = entry.pool.write();
            let old = pool.typed_mut::<T>().remove(entity)?;
            let masks = self.masks.write().update(entity, id, false);
            (old, masks)
        };

        self.notify_views(entity, &masks.0, &masks.1);
        Some(old)
    }

    /// Queues membership changes on every view affected by a mask change.
    fn notify_views(&self, entity: Entity, old: &Mask, new: &Mask) {
        for view in self.views.read().values() {
            let signature = view.signature();
            let was = signature.matches(old);
            let now = signature.matches(new);

            if now {
                let optional_changed = old.intersection(&signature.optional)
                    != new.intersection(&signature.optional);
                if !was || optional_changed {
                    view.try_add_entity(entity);
                }
            } else if was {
                view.remove_entity(entity);
            }
        }
    }

    /// Gets a component of an entity.
    ///
    /// The returned guard holds the pool's read lock.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<ComponentRef<'_, T>> {
        let entry = self.pool_entry(self.known_id::<T>()?)?;
        RwLockReadGuard::try_map(entry.pool.read_recursive(), |pool| {
            pool.typed::<T>().get(entity)
        })
        .ok()
    }

    /// Gets a component of an entity mutably.
    ///
    /// The returned guard holds the pool's write lock.
    pub fn get_component_mut<T: Component>(&self, entity: Entity) -> Option<ComponentMut<'_, T>> {
        let entry = self.pool_entry(self.known_id::<T>()?)?;
        RwLockWriteGuard::try_map(entry.pool.write(), |pool| pool.typed_mut::<T>().get_mut(entity))
            .ok()
    }

    /// Whether the entity has the component.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        match self.known_id::<T>() {
            Some(id) => self.masks.read().get(entity).contains(id),
            None => false,
        }
    }

    /// The set of components an entity has. Empty for dead entities.
    pub fn component_mask(&self, entity: Entity) -> Mask { self.masks.read().get(entity) }

    /// Creates a handle to the component of an entity.
    ///
    /// Returns `None` if the entity does not have the component.
    pub fn stable_handle<T: Component>(&self, entity: Entity) -> Option<StableHandle<T>> {
        let id = self.known_id::<T>()?;
        self.component_mask(entity).contains(id).then(|| StableHandle::new(entity, id))
    }

    /// Sets the parent of an entity.
    ///
    /// # Panics
    /// Panics if either entity does not exist.
    pub fn set_parent(&self, child: Entity, parent: Entity) -> Result<(), CycleError> {
        self.assert_exists(child);
        self.assert_exists(parent);
        self.parents.lock().set_parent(child, parent)
    }

    /// Removes the parent of an entity.
    pub fn un_parent(&self, child: Entity) { self.parents.lock().un_parent(child) }

    /// The parent of an entity, or [`Entity::INVALID`].
    pub fn parent(&self, child: Entity) -> Entity { self.parents.lock().parent(child) }

    /// The children of an entity.
    pub fn children(&self, parent: Entity) -> Vec<Entity> {
        self.parents.lock().children(parent).to_vec()
    }

    /// Returns the view for a query, creating and populating it on first request.
    ///
    /// ```
    /// # use kiln::view::{Exclude, Optional, Require};
    /// # struct Position(f32);
    /// # struct Velocity(f32);
    /// let registry = kiln::Registry::default();
    /// let entity = registry.create_entity();
    /// registry.emplace_component(entity, Position(1.0));
    ///
    /// let view = registry.view::<Require<(Position,)>, Optional<(Velocity,)>, Exclude<()>>();
    /// assert_eq!(view.entities(), vec![entity]);
    /// ```
    pub fn view<R: RequireFilter, O: OptionalFilter, X: ExcludeFilter>(&self) -> ViewRef<'_> {
        let signature = Signature {
            require:  self.mask_of::<R::List>(),
            optional: self.mask_of::<O::List>(),
            exclude:  self.mask_of::<X::List>(),
        };

        if let Some(view) = self.views.read().get(&signature) {
            return ViewRef::new(self, Arc::clone(view));
        }

        let mut views = self.views.write();
        let view = views.entry(signature).or_insert_with(|| {
            log::debug!("Creating view for {signature:?}");
            let view = View::new(signature, self.config.view_capacity_hint);
            self.populate_view_with_lock(&view);
            Arc::new(view)
        });
        ViewRef::new(self, Arc::clone(view))
    }

    fn populate_view_with_lock(&self, view: &View) { view.populate_with_lock(&self.masks.read()); }

    /// Number of cached views.
    pub fn view_count(&self) -> usize { self.views.read().len() }

    fn mask_of<L: ComponentList>(&self) -> Mask {
        struct Register<'r> {
            registry: &'r Registry,
            mask:     Mask,
        }

        impl TypeVisitor for Register<'_> {
            fn visit<T: Component>(&mut self) { self.mask.set(self.registry.component_id::<T>()); }
        }

        let mut register = Register { registry: self, mask: Mask::new() };
        L::visit(&mut register);
        register.mask
    }
}

static_assertions::assert_impl_all!(Registry: Send, Sync);
