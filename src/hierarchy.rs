//! Parent/child relationships between entities.

use std::collections::BTreeMap;

use crate::Entity;


/// Returned when a parent edge would make an entity its own ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("setting the parent of {child} to {parent} would create a cycle")]
pub struct CycleError {
    /// The entity whose parent was being set.
    pub child:  Entity,
    /// The rejected parent.
    pub parent: Entity,
}

/// A forest of entities.
///
/// Each entity has at most one parent.
/// The graph never contains a cycle.
#[derive(Debug, Default)]
pub struct ParentGraph {
    /// `parent_map[child]` is the parent of `child`, or [`Entity::INVALID`].
    parent_map: Vec<Entity>,
    /// Children of each entity that has any, in insertion order.
    child_map:  BTreeMap<u32, Vec<Entity>>,
    /// Number of parent edges.
    edges:      usize,
}

impl ParentGraph {
    /// Sets the parent of `child`.
    ///
    /// Replaces any existing parent.
    /// The graph is unchanged if the new edge would create a cycle.
    pub fn set_parent(&mut self, child: Entity, parent: Entity) -> Result<(), CycleError> {
        if self.parent(child) == parent {
            return Ok(());
        }

        if child == parent || self.ancestors(parent).any(|ancestor| ancestor == child) {
            return Err(CycleError { child, parent });
        }

        self.un_parent(child);

        if self.parent_map.len() <= child.index() {
            self.parent_map.resize(child.index() + 1, Entity::INVALID);
        }
        self.parent_map[child.index()] = parent;
        self.child_map.entry(parent.raw()).or_default().push(child);
        self.edges += 1;

        Ok(())
    }

    /// Removes the parent of `child` if it has one.
    pub fn un_parent(&mut self, child: Entity) {
        let Some(slot) = self.parent_map.get_mut(child.index()) else { return };
        let parent = std::mem::replace(slot, Entity::INVALID);
        if parent.is_invalid() {
            return;
        }

        if let Some(children) = self.child_map.get_mut(&parent.raw()) {
            children.retain(|&other| other != child);
            if children.is_empty() {
                self.child_map.remove(&parent.raw());
            }
        }
        self.edges -= 1;
    }

    /// Returns the parent of `child`, or [`Entity::INVALID`] if it has none.
    pub fn parent(&self, child: Entity) -> Entity {
        self.parent_map.get(child.index()).copied().unwrap_or(Entity::INVALID)
    }

    /// Returns the children of `parent` in the order they were attached.
    pub fn children(&self, parent: Entity) -> &[Entity] {
        match self.child_map.get(&parent.raw()) {
            Some(children) => children,
            None => &[],
        }
    }

    /// Iterates over the ancestors of `entity`, nearest first.
    ///
    /// The walk visits at most as many entities as there are edges.
    pub fn ancestors(&self, entity: Entity) -> impl Iterator<Item = Entity> + '_ {
        let mut current = entity;
        (0..self.edges).map_while(move |_| {
            current = self.parent(current);
            (!current.is_invalid()).then_some(current)
        })
    }

    /// Detaches an entity from its parent and from all of its children.
    ///
    /// The children become roots.
    pub fn remove_entity(&mut self, entity: Entity) {
        self.un_parent(entity);

        if let Some(children) = self.child_map.remove(&entity.raw()) {
            for child in children {
                self.parent_map[child.index()] = Entity::INVALID;
                self.edges -= 1;
            }
        }
    }

    /// Number of parent edges.
    pub fn edge_count(&self) -> usize { self.edges }

    /// Removes all edges.
    pub fn reset(&mut self) {
        self.parent_map.clear();
        self.child_map.clear();
        self.edges = 0;
    }
}
