//! # Mugen Core
//!
//! Archetype-based Entity Component System storage:
//! - Entities with identical component sets share contiguous chunks
//! - Generational handles catch use-after-delete
//! - Queries snapshot matching archetypes and iterate columns linearly
//!
//! ## Architecture Rules
//!
//! 1. **Components are plain old data** - stored and moved as raw bytes
//! 2. **Rows stay packed** - deletion swaps the last row into the hole
//! 3. **Structural changes migrate** - adding or removing a component moves
//!    the row to another archetype
//!
//! ## Example
//!
//! ```rust,ignore
//! use mugen_core::{Position, Velocity, World};
//!
//! let mut world = World::new();
//! let entity = world.spawn::<(Position, Velocity)>();
//! world.get_component_mut::<Velocity>(entity).x = 1.0;
//!
//! let moving = world.find(|q| q.require::<Position>().require::<Velocity>());
//! moving.for_each_mut::<Position, _>(&mut world, |_, p| p.x += 1.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::WorldConfig;
pub use ecs::{
    Archetype, ArchetypeId, Component, ComponentSet, ComponentType, ComponentView, Entity,
    EntityQuery, Position, QueryBuilder, QueryResult, RowRef, Velocity, World,
};
pub use error::{EcsError, EcsResult};
pub use memory::{Arena, ArenaId};
