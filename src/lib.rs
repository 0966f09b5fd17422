//! The entity-component registry and render graph batching core of a game engine.
//!
//! # Registry
//! A [`Registry`] owns a fixed number of [`Entity`] slots.
//! Any `Send + Sync + 'static` type can be attached to an entity as a component;
//! each component type gets its own lazily created pool.
//! The registry keeps a bitmask of the components of each entity,
//! which [views](view) use to decide membership.
//!
//! Views are cached per query signature and maintained incrementally:
//! component changes queue membership updates,
//! which are validated against the current masks on the next read.
//!
//! ```
//! use kiln::view::{Exclude, Optional, Require};
//!
//! struct Position(f32, f32);
//! struct Velocity(f32, f32);
//!
//! let registry = kiln::Registry::default();
//! let entity = registry.create_entity();
//! registry.emplace_component(entity, Position(0.0, 0.0));
//! registry.emplace_component(entity, Velocity(1.0, 0.0));
//!
//! let view = registry.view::<Require<(Position,)>, Optional<(Velocity,)>, Exclude<()>>();
//! view.for_each(|item| {
//!     let position = item.get::<Position>();
//!     if let Some(velocity) = item.try_get::<Velocity>() {
//!         println!("{:?} moves to {}", item.entity(), position.0 + velocity.0);
//!     }
//! });
//! ```
//!
//! # Rendering
//! The [`render`] module batches drawable scene objects by pipeline and descriptor layout,
//! and schedules render passes in a [`RenderGraph`](render::RenderGraph)
//! of tasks connected through named assets.
//! Commands are recorded into a [`CommandBuffer`](render::CommandBuffer)
//! instead of a concrete graphics API.
//!
//! # Services
//! [`ThreadPool`], the [`binary`] codec, [`config`] and [`events`]
//! are explicit objects passed to whoever needs them; there are no global singletons.

#![cfg_attr(debug_assertions, allow(dead_code, unused_variables))]
#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(doc, warn(missing_docs))]

pub mod binary;

pub mod comp;

pub mod config;

pub mod entity;
pub use entity::{Ealloc, Entity};

pub mod events;

pub mod handle;
pub use handle::StableHandle;

pub mod hierarchy;

pub mod registry;
pub use registry::Registry;

pub mod render;

pub mod storage;
pub use storage::Storage;

pub mod thread_pool;
pub use thread_pool::ThreadPool;

#[cfg(any(test, feature = "internal-bench"))]
pub mod test_util;

pub mod tracer;

pub mod util;

pub mod view;
