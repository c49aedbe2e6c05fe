//! # Entity Component System
//!
//! Archetype storage for plain-old-data components.
//!
//! ## Design Philosophy
//!
//! - Entities with the same component set share an archetype
//! - Archetypes store rows in fixed-capacity, column-major chunks
//! - Entity handles are indices with generation counters
//! - Queries resolve to archetypes, then walk chunk columns linearly

pub mod archetype;
mod component;
mod entity;
mod query;
pub mod storage;
mod world;

pub use archetype::{Archetype, ArchetypeDirectory, ArchetypeId};
pub use component::{
    is_sorted_unique, sort_component_types, Component, ComponentSet, ComponentType, Position,
    Velocity, CHUNK_WORD_ALIGN,
};
pub use entity::Entity;
pub use query::{ComponentView, EntityQuery, QueryBuilder, QueryCursor, QueryIter, QueryResult};
pub use storage::{Chunk, ChunkId, ChunkStore, RowRef, ENTITY_CELL_SIZE};
pub use world::World;
