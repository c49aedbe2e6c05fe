//! # Chunk Storage
//!
//! Fixed-capacity, structure-of-arrays slabs owned by an archetype.
//!
//! ```text
//! | Entity[cap] | Component0[cap] | Component1[cap] | ... |
//! ```
//!
//! Columns follow the archetype's sorted type order. A column's byte offset is
//! `unit_offset * capacity`, where `unit_offset` is the entity cell width plus
//! the sizes of every preceding component. A cell then sits at
//! `unit_offset * capacity + size * row`.
//!
//! Rows are always packed: live rows are `[0, len)`. Removal moves the last
//! row into the hole.

use std::ops::Range;

use super::archetype::{Archetype, ArchetypeId};
use super::component::{Component, ComponentType};
use super::entity::{Entity, EntitySlot};
use crate::memory::{narrow_index, Arena, ArenaId};

/// Byte width of one cell in the entity column.
pub const ENTITY_CELL_SIZE: usize = std::mem::size_of::<u64>();

/// Index of a chunk inside its [`ChunkStore`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(u32);

impl ArenaId for ChunkId {
    #[inline]
    fn from_index(index: usize) -> Self {
        Self(narrow_index(index))
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Transient locator of one row.
///
/// Any swap-remove or migration touching the chunk may move the row, so do
/// not keep a `RowRef` across structural changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RowRef {
    chunk: ChunkId,
    row: usize,
}

impl RowRef {
    /// Creates a row reference.
    #[inline]
    #[must_use]
    pub const fn new(chunk: ChunkId, row: usize) -> Self {
        Self { chunk, row }
    }

    /// The chunk holding the row.
    #[inline]
    #[must_use]
    pub const fn chunk(self) -> ChunkId {
        self.chunk
    }

    /// Row index inside the chunk.
    #[inline]
    #[must_use]
    pub const fn row(self) -> usize {
        self.row
    }
}

/// One storage slab.
pub struct Chunk {
    archetype: ArchetypeId,
    capacity: usize,
    len: usize,
    /// Next chunk of the same archetype that still has room.
    next_with_space: Option<ChunkId>,
    /// Backing words; viewed as bytes for component columns.
    data: Box<[u64]>,
}

impl Chunk {
    fn new(archetype: ArchetypeId, capacity: usize, row_width: usize) -> Self {
        let words = capacity * row_width / ENTITY_CELL_SIZE;
        Self {
            archetype,
            capacity,
            len: 0,
            next_with_space: None,
            data: vec![0u64; words].into_boxed_slice(),
        }
    }

    /// The owning archetype.
    #[inline]
    #[must_use]
    pub fn archetype(&self) -> ArchetypeId {
        self.archetype
    }

    /// Number of occupied rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks if no row is occupied.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of rows.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Checks if every row is occupied.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Entity stored at `row`.
    #[inline]
    #[must_use]
    pub fn entity(&self, row: usize) -> Entity {
        debug_assert!(row < self.len, "row {row} out of range (len {})", self.len);
        Entity::from_bits(self.data[row])
    }

    /// Iterates over the entities of the occupied rows.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.data[..self.len].iter().map(|&bits| Entity::from_bits(bits))
    }

    /// Byte range of one cell.
    #[inline]
    #[must_use]
    pub fn cell_range(&self, unit_offset: usize, size: usize, row: usize) -> Range<usize> {
        let start = unit_offset * self.capacity + size * row;
        start..start + size
    }

    /// Bytes of one cell.
    #[inline]
    #[must_use]
    pub fn cell(&self, unit_offset: usize, size: usize, row: usize) -> &[u8] {
        let range = self.cell_range(unit_offset, size, row);
        &self.bytes()[range]
    }

    /// Mutable bytes of one cell.
    #[inline]
    pub fn cell_mut(&mut self, unit_offset: usize, size: usize, row: usize) -> &mut [u8] {
        let range = self.cell_range(unit_offset, size, row);
        &mut self.bytes_mut()[range]
    }

    /// Typed view of the occupied part of a column.
    #[must_use]
    pub fn column<T: Component>(&self, unit_offset: usize) -> &[T] {
        let start = unit_offset * self.capacity;
        let end = start + std::mem::size_of::<T>() * self.len;
        bytemuck::cast_slice(&self.bytes()[start..end])
    }

    /// Typed mutable view of the occupied part of a column.
    pub fn column_mut<T: Component>(&mut self, unit_offset: usize) -> &mut [T] {
        self.entities_and_column_mut(unit_offset).1
    }

    /// The entity column alongside one mutable component column.
    pub fn entities_and_column_mut<T: Component>(
        &mut self,
        unit_offset: usize,
    ) -> (&[u64], &mut [T]) {
        assert!(unit_offset >= ENTITY_CELL_SIZE, "offset {unit_offset} points into the entity column");
        let (entities, columns) = self.data.split_at_mut(self.capacity);
        let start = (unit_offset - ENTITY_CELL_SIZE) * self.capacity;
        let end = start + std::mem::size_of::<T>() * self.len;
        let column = bytemuck::cast_slice_mut(&mut bytemuck::cast_slice_mut::<u64, u8>(columns)[start..end]);
        (&entities[..self.len], column)
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.data)
    }
}

/// Owns every chunk and implements row placement, removal and migration.
pub struct ChunkStore {
    chunks: Arena<ChunkId, Chunk>,
    capacity: usize,
}

impl ChunkStore {
    /// Creates a store whose chunks hold `capacity` rows each.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or not a multiple of 8.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity > 0 && capacity % 8 == 0,
            "chunk capacity must be a non-zero multiple of 8, got {capacity}"
        );
        Self {
            chunks: Arena::new(),
            capacity,
        }
    }

    /// Rows per chunk.
    #[inline]
    #[must_use]
    pub fn chunk_capacity(&self) -> usize {
        self.capacity
    }

    /// Number of chunks allocated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Checks if no chunk has been allocated.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Gets a chunk.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ChunkId) -> &Chunk {
        self.chunks.get(id)
    }

    /// Gets a chunk mutably.
    #[inline]
    pub fn get_mut(&mut self, id: ChunkId) -> &mut Chunk {
        self.chunks.get_mut(id)
    }

    /// Allocates a zeroed chunk for `archetype`, appends it to the archetype's
    /// chunk list and makes it the head of its free-space chain.
    pub fn create_chunk(&mut self, archetype: &mut Archetype) -> ChunkId {
        let mut chunk = Chunk::new(archetype.id(), self.capacity, archetype.row_width());
        chunk.next_with_space = archetype.chunk_with_space;

        let id = self.chunks.alloc(chunk);
        archetype.chunks.push(id);
        archetype.chunk_with_space = Some(id);

        tracing::trace!(
            archetype = archetype.id().raw(),
            chunk = id.0,
            bytes = self.capacity * archetype.row_width(),
            "chunk created"
        );
        id
    }

    /// Writes `entity` into the next free row of `chunk`.
    ///
    /// When this fills the chunk it leaves the archetype's free-space chain.
    pub fn allocate_row(&mut self, archetype: &mut Archetype, chunk_id: ChunkId, entity: Entity) -> RowRef {
        let chunk = self.chunks.get_mut(chunk_id);
        debug_assert_eq!(chunk.archetype, archetype.id(), "chunk belongs to another archetype");
        assert!(!chunk.is_full(), "allocating into a full chunk");

        let row = chunk.len;
        chunk.data[row] = entity.to_bits();
        chunk.len += 1;
        archetype.entity_count += 1;

        if chunk.is_full() {
            debug_assert_eq!(archetype.chunk_with_space, Some(chunk_id));
            archetype.chunk_with_space = chunk.next_with_space.take();
        }

        RowRef::new(chunk_id, row)
    }

    /// Removes a row by moving the chunk's last row into it.
    ///
    /// The moved entity's slot in `slots` is pointed at its new row. The
    /// vacated last row is zeroed so the next allocation starts clean. A chunk
    /// that was full rejoins the free-space chain.
    pub(crate) fn remove_row(&mut self, archetype: &mut Archetype, row: RowRef, slots: &mut [EntitySlot]) {
        let chunk = self.chunks.get_mut(row.chunk);
        debug_assert!(row.row < chunk.len, "removing unoccupied row {}", row.row);

        let was_full = chunk.is_full();
        let last = chunk.len - 1;
        let capacity = chunk.capacity;

        if row.row < last {
            chunk.data[row.row] = chunk.data[last];
            chunk.data[last] = 0;

            let bytes = chunk.bytes_mut();
            let mut unit_offset = ENTITY_CELL_SIZE;
            for ty in archetype.component_types() {
                let size = ty.size();
                let column = unit_offset * capacity;
                let from = column + size * last;
                bytes.copy_within(from..from + size, column + size * row.row);
                bytes[from..from + size].fill(0);
                unit_offset += size;
            }

            let moved = Entity::from_bits(chunk.data[row.row]);
            slots[moved.index() as usize].location = row;
        } else {
            chunk.data[row.row] = 0;

            let bytes = chunk.bytes_mut();
            let mut unit_offset = ENTITY_CELL_SIZE;
            for ty in archetype.component_types() {
                let size = ty.size();
                let start = unit_offset * capacity + size * row.row;
                bytes[start..start + size].fill(0);
                unit_offset += size;
            }
        }

        chunk.len -= 1;
        archetype.entity_count -= 1;

        if was_full {
            chunk.next_with_space = archetype.chunk_with_space;
            archetype.chunk_with_space = Some(row.chunk);
        }
    }

    /// Bytes of the cell holding `ty` for `row`, if the archetype has `ty`.
    ///
    /// Recomputes the column offset, which is O(component count). Callers
    /// touching many rows of one archetype should cache
    /// [`Archetype::column_offset`] and use [`Chunk::cell`].
    #[must_use]
    pub fn component_cell(&self, archetype: &Archetype, ty: ComponentType, row: RowRef) -> Option<&[u8]> {
        let unit_offset = archetype.column_offset(ty)?;
        Some(self.chunks.get(row.chunk).cell(unit_offset, ty.size(), row.row))
    }

    /// Mutable variant of [`component_cell`](Self::component_cell).
    pub fn component_cell_mut(
        &mut self,
        archetype: &Archetype,
        ty: ComponentType,
        row: RowRef,
    ) -> Option<&mut [u8]> {
        let unit_offset = archetype.column_offset(ty)?;
        Some(self.chunks.get_mut(row.chunk).cell_mut(unit_offset, ty.size(), row.row))
    }

    /// Copies a row into a new row of `target_chunk`.
    ///
    /// Both type lists are sorted, so shared columns are found with a single
    /// forward merge. Columns only the target has stay zeroed; columns only
    /// the source has are dropped. The source row is left in place for the
    /// caller to remove.
    pub fn migrate_row(
        &mut self,
        source: &Archetype,
        row: RowRef,
        target: &mut Archetype,
        target_chunk: ChunkId,
    ) -> RowRef {
        let entity = self.chunks.get(row.chunk).entity(row.row);
        let new_row = self.allocate_row(target, target_chunk, entity);

        let (source_chunk, target_chunk) = self.chunks.get_pair_mut(row.chunk, target_chunk);
        let source_capacity = source_chunk.capacity;
        let target_capacity = target_chunk.capacity;
        let source_bytes = source_chunk.bytes();
        let target_bytes = target_chunk.bytes_mut();

        let mut target_types = target.component_types().iter().peekable();
        let mut source_offset = ENTITY_CELL_SIZE;
        let mut target_offset = ENTITY_CELL_SIZE;

        for &ty in source.component_types() {
            while let Some(&&next) = target_types.peek() {
                if next.id() >= ty.id() {
                    break;
                }
                target_offset += next.size();
                target_types.next();
            }

            if target_types.peek().is_some_and(|&&next| next == ty) {
                let size = ty.size();
                let from = source_offset * source_capacity + size * row.row;
                let to = target_offset * target_capacity + size * new_row.row;
                target_bytes[to..to + size].copy_from_slice(&source_bytes[from..from + size]);
                target_offset += size;
                target_types.next();
            }

            source_offset += ty.size();
        }

        new_row
    }

    /// Frees every chunk.
    pub fn release(&mut self) {
        self.chunks.release();
    }
}
