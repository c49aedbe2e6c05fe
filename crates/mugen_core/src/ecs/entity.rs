//! # Entity Management
//!
//! Entities are lightweight handles consisting of:
//! - An index into the entity table
//! - A generation counter for safe reuse
//!
//! The table maps each index to the archetype and chunk row currently holding
//! the entity's data. Indices are recycled through [`EntityIndexPool`].

use std::collections::VecDeque;

use super::archetype::ArchetypeId;
use super::storage::RowRef;

/// Handle to an entity.
///
/// The handle is split into two parts:
/// - Lower 32 bits: Index into the entity table
/// - Upper 32 bits: Generation counter for detecting stale handles
///
/// Generation 0 is never handed out, so [`Entity::INVALID`] never refers to a
/// live entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// The invalid handle sentinel.
    pub const INVALID: Self = Self(0);

    /// Creates a handle from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the handle.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this handle could ever refer to a live entity.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.generation() != 0
    }

    /// Packed representation, as stored in a chunk's entity column.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from its packed representation.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}v{})", self.index(), self.generation())
    }
}

/// One entry of the entity table.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct EntitySlot {
    /// Archetype holding the entity, `None` while the slot is free.
    pub archetype: Option<ArchetypeId>,
    /// Current row. Rewritten whenever the row moves.
    pub location: RowRef,
    /// Generation of the handle that owns (or will next own) this slot.
    pub generation: u32,
}

/// Recycles entity table indices.
///
/// Freed indices are reused first-in first-out, so a freshly freed slot is the
/// last one to be handed out again.
#[derive(Debug, Default)]
pub(crate) struct EntityIndexPool {
    free: VecDeque<u32>,
    next_unused: u32,
}

impl EntityIndexPool {
    /// Takes a recycled index, or the next never-used one.
    pub fn next(&mut self) -> u32 {
        if let Some(index) = self.free.pop_front() {
            return index;
        }
        let index = self.next_unused;
        self.next_unused += 1;
        index
    }

    /// Returns an index for reuse.
    pub fn recycle(&mut self, index: u32) {
        self.free.push_back(index);
    }
}

/// Maps entity indices to their storage location.
pub(crate) struct EntityTable {
    slots: Vec<EntitySlot>,
    pool: EntityIndexPool,
    alive: usize,
}

impl EntityTable {
    /// Creates a table with `capacity` pre-allocated slots (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![EntitySlot::default(); capacity.max(1)],
            pool: EntityIndexPool::default(),
            alive: 0,
        }
    }

    /// Number of allocated slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entities.
    pub fn alive(&self) -> usize {
        self.alive
    }

    /// Reserves a slot for a new entity in `archetype` and returns its handle.
    ///
    /// The caller must store the row location with [`set_location`] right
    /// after placing the row.
    ///
    /// [`set_location`]: Self::set_location
    pub fn reserve(&mut self, archetype: ArchetypeId) -> Entity {
        let index = self.pool.next();
        let idx = index as usize;

        if idx >= self.slots.len() {
            let old_capacity = self.slots.len();
            let new_capacity = (old_capacity * 2).max(idx + 1);
            self.slots.resize(new_capacity, EntitySlot::default());
            tracing::debug!(old_capacity, new_capacity, "entity table grown");
        }

        let slot = &mut self.slots[idx];
        if slot.generation == 0 {
            slot.generation = 1;
        }
        slot.archetype = Some(archetype);
        self.alive += 1;

        Entity::new(index, slot.generation)
    }

    /// Vacates the slot of `entity`, invalidating every outstanding handle to
    /// it, and returns where its row was.
    ///
    /// The index is not recycled until [`recycle`](Self::recycle) is called.
    pub fn vacate(&mut self, entity: Entity) -> (ArchetypeId, RowRef) {
        debug_assert!(self.contains(entity), "deleting dead entity {entity:?}");
        let slot = &mut self.slots[entity.index() as usize];

        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        let archetype = slot.archetype.take();
        self.alive -= 1;

        match archetype {
            Some(archetype) => (archetype, slot.location),
            None => panic!("entity {entity:?} has no archetype"),
        }
    }

    /// Returns an index to the recycle pool.
    pub fn recycle(&mut self, entity: Entity) {
        self.pool.recycle(entity.index());
    }

    /// Checks if `entity` refers to a live entity.
    pub fn contains(&self, entity: Entity) -> bool {
        entity.is_valid()
            && self
                .slots
                .get(entity.index() as usize)
                .is_some_and(|slot| slot.generation == entity.generation() && slot.archetype.is_some())
    }

    /// Slot of a live entity.
    pub fn slot(&self, entity: Entity) -> &EntitySlot {
        debug_assert!(self.contains(entity), "stale entity {entity:?}");
        &self.slots[entity.index() as usize]
    }

    /// Records a new location for the entity at `index`.
    pub fn set_location(&mut self, index: u32, archetype: ArchetypeId, location: RowRef) {
        let slot = &mut self.slots[index as usize];
        slot.archetype = Some(archetype);
        slot.location = location;
    }

    /// Raw slot access for the chunk allocator's swap-remove fixups.
    pub fn slots_mut(&mut self) -> &mut [EntitySlot] {
        &mut self.slots
    }
}
