//! Typed publish/subscribe dispatch.
//!
//! Listeners are invoked synchronously on the dispatching thread.
//! The listener list is copied before invocation,
//! so a listener may dispatch further events or (un)subscribe without deadlocking.
//! Changes to the subscriptions made during a dispatch take effect from the next dispatch.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::Entity;


/// Receives events of type `E`.
pub trait Observer<E>: Send + Sync + 'static {
    /// Handles an event.
    fn on_event(&self, event: &E);
}

impl<E, F: Fn(&E) + Send + Sync + 'static> Observer<E> for F {
    fn on_event(&self, event: &E) { self(event) }
}

/// Identifies a subscription for [`Dispatcher::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    id:       u64,
    event_ty: TypeId,
}

type Listeners<E> = Vec<(u64, Arc<dyn Observer<E>>)>;

/// A registry of event listeners keyed by event type.
#[derive(Default)]
pub struct Dispatcher {
    /// Each value downcasts to `Listeners<E>` for the key `TypeId::of::<E>()`.
    listeners: RwLock<HashMap<TypeId, Box<dyn AnyListeners>>>,
    next_id:   AtomicU64,
}

impl Dispatcher {
    /// Creates a dispatcher without listeners.
    pub fn new() -> Self { Self::default() }

    /// Adds a listener for events of type `E`.
    pub fn subscribe<E: 'static>(&self, observer: impl Observer<E>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let observer: Arc<dyn Observer<E>> = Arc::new(observer);

        let mut listeners = self.listeners.write();
        let list = listeners
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Listeners::<E>::new()))
            .as_any_mut()
            .downcast_mut::<Listeners<E>>()
            .expect("listener list is keyed by its event type");
        list.push((id, observer));

        Subscription { id, event_ty: TypeId::of::<E>() }
    }

    /// Removes a listener.
    ///
    /// Returns `false` if the subscription was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(&subscription.event_ty) else {
            log::warn!("Unsubscribing {subscription:?} which has no listener list");
            return false;
        };

        let removed = list.remove(subscription.id);
        if !removed {
            log::warn!("Unsubscribing {subscription:?} which is not subscribed");
        }
        removed
    }

    /// Invokes every listener of `E` with the event.
    pub fn dispatch<E: 'static>(&self, event: &E) {
        let snapshot: Vec<Arc<dyn Observer<E>>> = {
            let listeners = self.listeners.read();
            match listeners.get(&TypeId::of::<E>()) {
                Some(list) => list
                    .as_any()
                    .downcast_ref::<Listeners<E>>()
                    .expect("listener list is keyed by its event type")
                    .iter()
                    .map(|(_, observer)| Arc::clone(observer))
                    .collect(),
                None => return,
            }
        };

        for observer in snapshot {
            observer.on_event(event);
        }
    }

    /// Number of listeners of `E`.
    pub fn listener_count<E: 'static>(&self) -> usize {
        let listeners = self.listeners.read();
        listeners.get(&TypeId::of::<E>()).map_or(0, |list| list.len())
    }
}

/// A listener list with its event type erased.
trait AnyListeners: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn remove(&mut self, id: u64) -> bool;

    fn len(&self) -> usize;
}

impl<E: 'static> AnyListeners for Listeners<E> {
    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }

    fn remove(&mut self, id: u64) -> bool {
        let len = self.len();
        self.retain(|&(other, _)| other != id);
        self.len() != len
    }

    fn len(&self) -> usize { Vec::len(self) }
}

/// Dispatched after an entity is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityCreated {
    /// The new entity.
    pub entity: Entity,
}

/// Dispatched before an entity is destroyed.
///
/// The components of the entity are still readable while this is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDestroyed {
    /// The entity being destroyed.
    pub entity: Entity,
}
