//! # Archetype Directory
//!
//! An archetype is the storage class shared by every entity with exactly the
//! same set of component types. Each archetype owns a list of chunks and a
//! chain of chunks that still have room.
//!
//! ```text
//! [Position, Velocity]  -> chunk 0 (full) -> chunk 3 (412/1024)
//! [Position]            -> chunk 1 (17/1024)
//! [Velocity, Health]    -> chunk 2 (0/1024)
//! ```
//!
//! Archetypes are created on first request and live until the directory is
//! released. Lookup is keyed by the sorted component identity list.

use std::collections::HashMap;

use super::component::{is_sorted_unique, ComponentType};
use super::entity::{Entity, EntitySlot};
use super::storage::{Chunk, ChunkId, ChunkStore, RowRef, ENTITY_CELL_SIZE};
use crate::memory::{narrow_index, Arena, ArenaId};

/// Index of an archetype inside its [`ArchetypeDirectory`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// Raw index, for logging.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl ArenaId for ArchetypeId {
    #[inline]
    fn from_index(index: usize) -> Self {
        Self(narrow_index(index))
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Record of one archetype.
pub struct Archetype {
    id: ArchetypeId,
    component_types: Box<[ComponentType]>,
    /// Bytes one row takes across every column, entity cell included.
    row_width: usize,
    pub(crate) entity_count: usize,
    pub(crate) chunks: Vec<ChunkId>,
    /// Head of the free-space chain, linked through the chunks.
    pub(crate) chunk_with_space: Option<ChunkId>,
}

impl Archetype {
    /// Creates an archetype record with no chunks.
    ///
    /// `component_types` must be sorted ascending and free of duplicates.
    pub(crate) fn new(id: ArchetypeId, component_types: &[ComponentType]) -> Self {
        let row_width = ENTITY_CELL_SIZE + component_types.iter().map(|ty| ty.size()).sum::<usize>();
        Self {
            id,
            component_types: component_types.into(),
            row_width,
            entity_count: 0,
            chunks: Vec::new(),
            chunk_with_space: None,
        }
    }

    /// The archetype's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// The component types, sorted ascending by identity.
    #[inline]
    #[must_use]
    pub fn component_types(&self) -> &[ComponentType] {
        &self.component_types
    }

    /// Number of live entities across all chunks.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entity_count
    }

    /// Checks if the archetype holds no entities.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entity_count == 0
    }

    /// Chunks in allocation order.
    #[inline]
    #[must_use]
    pub fn chunks(&self) -> &[ChunkId] {
        &self.chunks
    }

    /// Bytes per row, entity cell included.
    #[inline]
    #[must_use]
    pub fn row_width(&self) -> usize {
        self.row_width
    }

    /// Checks if the archetype has `ty`.
    #[inline]
    #[must_use]
    pub fn contains(&self, ty: ComponentType) -> bool {
        self.component_types.binary_search(&ty).is_ok()
    }

    /// Column offset of `ty`, in units of chunk capacity.
    ///
    /// The offset is the entity cell width plus the sizes of all preceding
    /// types, so the column starts at byte `offset * capacity`.
    ///
    /// # Performance
    ///
    /// O(component count). Cache the result when touching many rows.
    #[must_use]
    pub fn column_offset(&self, ty: ComponentType) -> Option<usize> {
        let mut offset = ENTITY_CELL_SIZE;
        for &current in self.component_types.iter() {
            if current == ty {
                return Some(offset);
            }
            offset += current.size();
        }
        None
    }
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("types", &self.component_types.iter().map(|ty| ty.id()).collect::<Vec<_>>())
            .field("entities", &self.entity_count)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

/// Creates, finds and enumerates archetypes, and owns all chunk storage.
pub struct ArchetypeDirectory {
    archetypes: Arena<ArchetypeId, Archetype>,
    chunks: ChunkStore,
    lookup: HashMap<Box<[u32]>, ArchetypeId>,
}

impl ArchetypeDirectory {
    /// Creates an empty directory whose chunks hold `chunk_capacity` rows.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_capacity` is zero or not a multiple of 8.
    #[must_use]
    pub fn new(chunk_capacity: usize) -> Self {
        Self {
            archetypes: Arena::new(),
            chunks: ChunkStore::new(chunk_capacity),
            lookup: HashMap::new(),
        }
    }

    /// Returns the archetype for a sorted type list, creating it (and its
    /// first chunk) if it does not exist yet.
    ///
    /// An empty list is a valid archetype whose rows only hold the entity.
    ///
    /// # Arguments
    ///
    /// * `component_types` - Sorted ascending, no duplicates
    pub fn get_or_create(&mut self, component_types: &[ComponentType]) -> ArchetypeId {
        debug_assert!(
            is_sorted_unique(component_types),
            "archetype types must be sorted and unique"
        );

        let key: Box<[u32]> = component_types.iter().map(|ty| ty.id()).collect();
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }

        let id = self.archetypes.next_id();
        let mut archetype = Archetype::new(id, component_types);
        self.chunks.create_chunk(&mut archetype);

        tracing::debug!(
            archetype = id.raw(),
            components = ?key,
            row_width = archetype.row_width(),
            "archetype created"
        );

        self.archetypes.alloc(archetype);
        self.lookup.insert(key, id);
        id
    }

    /// Finds an existing archetype without creating it.
    #[must_use]
    pub fn find(&self, component_types: &[ComponentType]) -> Option<ArchetypeId> {
        let key: Vec<u32> = component_types.iter().map(|ty| ty.id()).collect();
        self.lookup.get(key.as_slice()).copied()
    }

    /// Gets an archetype record.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ArchetypeId) -> &Archetype {
        self.archetypes.get(id)
    }

    /// Gets a chunk.
    #[inline]
    #[must_use]
    pub fn chunk(&self, id: ChunkId) -> &Chunk {
        self.chunks.get(id)
    }

    /// Gets a chunk mutably.
    #[inline]
    pub fn chunk_mut(&mut self, id: ChunkId) -> &mut Chunk {
        self.chunks.get_mut(id)
    }

    /// The chunk storage.
    #[inline]
    #[must_use]
    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    /// Number of archetypes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Checks if no archetype exists.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Rows per chunk.
    #[inline]
    #[must_use]
    pub fn chunk_capacity(&self) -> usize {
        self.chunks.chunk_capacity()
    }

    /// Iterates over all archetypes, most recently created first.
    pub fn iter(&self) -> impl Iterator<Item = &Archetype> + '_ {
        self.archetypes.iter().rev().map(|(_, archetype)| archetype)
    }

    /// Returns the head of the archetype's free-space chain, creating a new
    /// chunk when every existing chunk is full.
    pub fn chunk_with_space(&mut self, id: ArchetypeId) -> ChunkId {
        let archetype = self.archetypes.get_mut(id);
        match archetype.chunk_with_space {
            Some(chunk) => chunk,
            None => self.chunks.create_chunk(archetype),
        }
    }

    /// Places `entity` in the first free row of the archetype.
    pub fn allocate_row(&mut self, id: ArchetypeId, entity: Entity) -> RowRef {
        let chunk = self.chunk_with_space(id);
        self.chunks.allocate_row(self.archetypes.get_mut(id), chunk, entity)
    }

    /// Swap-removes a row, fixing up the slot of whichever entity moved.
    pub(crate) fn remove_row(&mut self, id: ArchetypeId, row: RowRef, slots: &mut [EntitySlot]) {
        self.chunks.remove_row(self.archetypes.get_mut(id), row, slots);
    }

    /// Moves a row from `source` to `target`, keeping shared columns, and
    /// removes the source row. Returns the row in `target`.
    ///
    /// # Panics
    ///
    /// Panics if `source == target`.
    pub(crate) fn migrate_row(
        &mut self,
        source: ArchetypeId,
        row: RowRef,
        target: ArchetypeId,
        slots: &mut [EntitySlot],
    ) -> RowRef {
        let target_chunk = self.chunk_with_space(target);
        let (source_archetype, target_archetype) = self.archetypes.get_pair_mut(source, target);

        let new_row = self
            .chunks
            .migrate_row(source_archetype, row, target_archetype, target_chunk);
        self.chunks.remove_row(source_archetype, row, slots);

        tracing::trace!(
            from = source.raw(),
            to = target.raw(),
            "row migrated"
        );
        new_row
    }

    /// Bytes of one component cell, if the row's archetype has `ty`.
    #[must_use]
    pub fn component_cell(&self, id: ArchetypeId, ty: ComponentType, row: RowRef) -> Option<&[u8]> {
        self.chunks.component_cell(self.archetypes.get(id), ty, row)
    }

    /// Mutable bytes of one component cell, if the row's archetype has `ty`.
    pub fn component_cell_mut(
        &mut self,
        id: ArchetypeId,
        ty: ComponentType,
        row: RowRef,
    ) -> Option<&mut [u8]> {
        self.chunks.component_cell_mut(self.archetypes.get(id), ty, row)
    }

    /// Frees every archetype and chunk. All ids become invalid.
    pub fn release(&mut self) {
        self.chunks.release();
        self.archetypes.release();
        self.lookup.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ComponentType = ComponentType::new(1, 4);
    const B: ComponentType = ComponentType::new(2, 4);
    const C: ComponentType = ComponentType::new(3, 16);

    #[test]
    fn test_create_and_lookup() {
        let mut directory = ArchetypeDirectory::new(1024);
        let ab = directory.get_or_create(&[A, B]);
        let a = directory.get_or_create(&[A]);

        assert_ne!(ab, a);
        assert_eq!(directory.get_or_create(&[A, B]), ab);
        assert_eq!(directory.find(&[A]), Some(a));
        assert_eq!(directory.find(&[B]), None);
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_new_archetype_has_one_empty_chunk() {
        let mut directory = ArchetypeDirectory::new(1024);
        let id = directory.get_or_create(&[A, C]);
        let archetype = directory.get(id);

        assert_eq!(archetype.chunks().len(), 1);
        assert!(archetype.is_empty());
        assert_eq!(archetype.chunk_with_space, Some(archetype.chunks()[0]));
        assert_eq!(archetype.row_width(), 8 + 4 + 16);
        assert_eq!(directory.chunk(archetype.chunks()[0]).archetype(), id);
    }

    #[test]
    fn test_empty_type_list() {
        let mut directory = ArchetypeDirectory::new(8);
        let id = directory.get_or_create(&[]);
        assert!(directory.get(id).component_types().is_empty());
        assert_eq!(directory.get(id).row_width(), ENTITY_CELL_SIZE);
        assert_eq!(directory.get_or_create(&[]), id);
    }

    #[test]
    fn test_iteration_is_newest_first() {
        let mut directory = ArchetypeDirectory::new(8);
        let first = directory.get_or_create(&[A]);
        let second = directory.get_or_create(&[B]);
        let third = directory.get_or_create(&[A, B]);

        let order: Vec<_> = directory.iter().map(Archetype::id).collect();
        assert_eq!(order, vec![third, second, first]);
    }

    #[test]
    fn test_column_offsets() {
        let archetype = Archetype::new(ArchetypeId::from_index(0), &[A, B, C]);
        assert_eq!(archetype.column_offset(A), Some(8));
        assert_eq!(archetype.column_offset(B), Some(12));
        assert_eq!(archetype.column_offset(C), Some(16));
        assert_eq!(archetype.column_offset(ComponentType::new(9, 4)), None);
        assert!(archetype.contains(B));
        assert!(!archetype.contains(ComponentType::new(9, 4)));
    }

    #[test]
    fn test_spill_into_new_chunk() {
        let mut directory = ArchetypeDirectory::new(8);
        let id = directory.get_or_create(&[A]);

        for i in 0..9 {
            directory.allocate_row(id, Entity::new(i, 1));
        }

        let archetype = directory.get(id);
        assert_eq!(archetype.len(), 9);
        assert_eq!(archetype.chunks().len(), 2);
        assert_eq!(archetype.chunk_with_space, Some(archetype.chunks()[1]));
        assert_eq!(directory.chunks().len(), 2);
    }

    #[test]
    fn test_migrate_row_between_archetypes() {
        let mut directory = ArchetypeDirectory::new(8);
        let source = directory.get_or_create(&[A]);
        let target = directory.get_or_create(&[A, B]);
        let mut slots = vec![EntitySlot::default(); 2];

        let entity = Entity::new(0, 1);
        let row = directory.allocate_row(source, entity);
        directory.component_cell_mut(source, A, row).unwrap().copy_from_slice(&5u32.to_le_bytes());

        let moved = directory.migrate_row(source, row, target, &mut slots);

        assert!(directory.get(source).is_empty());
        assert_eq!(directory.get(target).len(), 1);
        assert_eq!(directory.component_cell(target, A, moved).unwrap(), &5u32.to_le_bytes());
        assert_eq!(directory.component_cell(target, B, moved).unwrap(), &[0u8; 4]);
        assert_eq!(directory.chunk(moved.chunk()).entity(moved.row()), entity);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "32-bit id space")]
    fn test_archetype_id_does_not_alias_past_u32() {
        let _ = ArchetypeId::from_index(u32::MAX as usize + 1);
    }

    #[test]
    fn test_release() {
        let mut directory = ArchetypeDirectory::new(8);
        directory.get_or_create(&[A]);
        directory.release();
        assert!(directory.is_empty());
        assert!(directory.chunks().is_empty());
        assert_eq!(directory.find(&[A]), None);
    }
}
