//! # Queries
//!
//! A query is four component lists:
//!
//! - `required`: every one must be present
//! - `any`: at least one must be present (ignored when empty)
//! - `optional`: never affects matching
//! - `excluded`: none may be present
//!
//! Running a query against a [`World`] produces a [`QueryResult`]: a snapshot
//! of the archetypes that matched at that moment, newest first. Archetypes
//! created afterwards are not picked up, but entities added to a matched
//! archetype are.
//!
//! ```rust,ignore
//! let moving = world.find(|q| q.require::<Position>().require::<Velocity>());
//! let mut positions = moving.view::<Position>();
//! for row in moving.iter(&world) {
//!     let p = positions.get(&world, row);
//! }
//! ```

use std::marker::PhantomData;

use super::archetype::{Archetype, ArchetypeDirectory, ArchetypeId};
use super::component::{Component, ComponentType};
use super::entity::Entity;
use super::storage::RowRef;
use super::world::World;

/// A component filter over archetypes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityQuery {
    required: Vec<ComponentType>,
    any: Vec<ComponentType>,
    optional: Vec<ComponentType>,
    excluded: Vec<ComponentType>,
}

impl EntityQuery {
    /// Starts building a query.
    #[must_use]
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// Types that must all be present.
    #[must_use]
    pub fn required(&self) -> &[ComponentType] {
        &self.required
    }

    /// Types of which at least one must be present.
    #[must_use]
    pub fn any(&self) -> &[ComponentType] {
        &self.any
    }

    /// Types that may or may not be present.
    #[must_use]
    pub fn optional(&self) -> &[ComponentType] {
        &self.optional
    }

    /// Types that must not be present.
    #[must_use]
    pub fn excluded(&self) -> &[ComponentType] {
        &self.excluded
    }

    /// Checks a sorted type list against the query.
    #[must_use]
    pub fn check(&self, component_types: &[ComponentType]) -> bool {
        let has = |ty: &ComponentType| component_types.binary_search(ty).is_ok();

        self.required.iter().all(has)
            && (self.any.is_empty() || self.any.iter().any(has))
            && !self.excluded.iter().any(has)
    }

    /// Snapshots the archetypes of `directory` that match, newest first.
    #[must_use]
    pub fn collect(&self, directory: &ArchetypeDirectory) -> QueryResult {
        let archetypes = directory
            .iter()
            .filter(|archetype| self.check(archetype.component_types()))
            .map(|archetype| archetype.id())
            .collect();
        QueryResult { archetypes }
    }
}

/// Builder for [`EntityQuery`].
///
/// Each list grows in call order; duplicates are harmless.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct QueryBuilder {
    query: EntityQuery,
}

impl QueryBuilder {
    /// Requires `T`.
    pub fn require<T: Component>(self) -> Self {
        self.require_type(ComponentType::of::<T>())
    }

    /// Requires at least one of the types passed through `any`.
    pub fn any<T: Component>(self) -> Self {
        self.any_type(ComponentType::of::<T>())
    }

    /// Marks `T` as optional.
    pub fn optional<T: Component>(self) -> Self {
        self.optional_type(ComponentType::of::<T>())
    }

    /// Rejects archetypes holding `T`.
    pub fn exclude<T: Component>(self) -> Self {
        self.exclude_type(ComponentType::of::<T>())
    }

    /// Requires a raw component type.
    pub fn require_type(mut self, ty: ComponentType) -> Self {
        self.query.required.push(ty);
        self
    }

    /// Adds a raw component type to the any-of list.
    pub fn any_type(mut self, ty: ComponentType) -> Self {
        self.query.any.push(ty);
        self
    }

    /// Marks a raw component type as optional.
    pub fn optional_type(mut self, ty: ComponentType) -> Self {
        self.query.optional.push(ty);
        self
    }

    /// Rejects archetypes holding a raw component type.
    pub fn exclude_type(mut self, ty: ComponentType) -> Self {
        self.query.excluded.push(ty);
        self
    }

    /// Finishes the query.
    #[must_use]
    pub fn build(self) -> EntityQuery {
        self.query
    }
}

/// Archetypes that matched a query when it ran.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryResult {
    archetypes: Vec<ArchetypeId>,
}

impl QueryResult {
    /// Matched archetypes, newest first.
    #[must_use]
    pub fn matched_archetypes(&self) -> &[ArchetypeId] {
        &self.archetypes
    }

    /// Iterates over every row of every matched archetype.
    #[must_use]
    pub fn iter<'a>(&'a self, world: &'a World) -> QueryIter<'a> {
        QueryIter {
            cursor: self.cursor(),
            world,
        }
    }

    /// A cursor that borrows the world only while advancing.
    ///
    /// Lets callers mutate components between steps:
    ///
    /// ```rust,ignore
    /// let mut cursor = result.cursor();
    /// while let Some(row) = cursor.advance(&world) {
    ///     *positions.get_mut(&mut world, row) = Position::default();
    /// }
    /// ```
    #[must_use]
    pub fn cursor(&self) -> QueryCursor<'_> {
        QueryCursor {
            archetypes: &self.archetypes,
            archetype: 0,
            chunk: 0,
            row: 0,
        }
    }

    /// A cached accessor for component `T` across the matched rows.
    #[must_use]
    pub fn view<T: Component>(&self) -> ComponentView<T> {
        ComponentView::new()
    }

    /// Iterates over the entity of every matched row.
    pub fn entities<'a>(&'a self, world: &'a World) -> impl Iterator<Item = Entity> + 'a {
        let directory = world.directory();
        self.iter(world)
            .map(move |row| directory.chunk(row.chunk()).entity(row.row()))
    }

    /// Number of entities currently in the matched archetypes.
    #[must_use]
    pub fn count(&self, world: &World) -> usize {
        self.archetypes
            .iter()
            .map(|&id| world.directory().get(id).len())
            .sum()
    }

    /// Calls `f` with every matched entity and its `T`, column by column.
    ///
    /// # Panics
    ///
    /// Panics if a matched archetype lacks `T`. Only use this with required
    /// types.
    pub fn for_each<T, F>(&self, world: &World, mut f: F)
    where
        T: Component,
        F: FnMut(Entity, &T),
    {
        let ty = ComponentType::of::<T>();
        let directory = world.directory();

        for &id in &self.archetypes {
            let archetype = directory.get(id);
            if archetype.is_empty() {
                continue;
            }
            let offset = required_offset(archetype, ty);
            for &chunk_id in archetype.chunks() {
                let chunk = directory.chunk(chunk_id);
                for (entity, value) in chunk.entities().zip(chunk.column::<T>(offset)) {
                    f(entity, value);
                }
            }
        }
    }

    /// Calls `f` with every matched entity and its `T` mutably, column by
    /// column.
    ///
    /// # Panics
    ///
    /// Panics if a matched archetype lacks `T`. Only use this with required
    /// types.
    pub fn for_each_mut<T, F>(&self, world: &mut World, mut f: F)
    where
        T: Component,
        F: FnMut(Entity, &mut T),
    {
        let ty = ComponentType::of::<T>();
        let directory = world.directory_mut();

        for &id in &self.archetypes {
            let archetype = directory.get(id);
            if archetype.is_empty() {
                continue;
            }
            let offset = required_offset(archetype, ty);
            for index in 0..archetype.chunks().len() {
                let chunk_id = directory.get(id).chunks()[index];
                let (entities, column) = directory.chunk_mut(chunk_id).entities_and_column_mut::<T>(offset);
                for (&bits, value) in entities.iter().zip(column) {
                    f(Entity::from_bits(bits), value);
                }
            }
        }
    }
}

fn required_offset(archetype: &Archetype, ty: ComponentType) -> usize {
    match archetype.column_offset(ty) {
        Some(offset) => offset,
        None => panic!(
            "archetype {:?} has no {}",
            archetype.id(),
            ty.name().unwrap_or("component")
        ),
    }
}

/// Position inside a [`QueryResult`], advanced against a world on demand.
///
/// Walks archetypes in snapshot order, then chunks in allocation order, then
/// rows `0..len`. Empty archetypes and chunks are skipped. Row counts are
/// read at every step, so the cursor sees rows added to a matched archetype
/// while it runs.
#[derive(Clone, Debug)]
pub struct QueryCursor<'q> {
    archetypes: &'q [ArchetypeId],
    archetype: usize,
    chunk: usize,
    row: usize,
}

impl QueryCursor<'_> {
    /// Moves to the next row and returns it, or `None` once exhausted.
    pub fn advance(&mut self, world: &World) -> Option<RowRef> {
        let directory = world.directory();
        loop {
            let archetype = directory.get(*self.archetypes.get(self.archetype)?);

            let Some(&chunk_id) = archetype.chunks().get(self.chunk) else {
                self.archetype += 1;
                self.chunk = 0;
                self.row = 0;
                continue;
            };

            if self.row < directory.chunk(chunk_id).len() {
                let row = RowRef::new(chunk_id, self.row);
                self.row += 1;
                return Some(row);
            }

            self.chunk += 1;
            self.row = 0;
        }
    }
}

/// Iterator over the rows of a [`QueryResult`].
pub struct QueryIter<'a> {
    cursor: QueryCursor<'a>,
    world: &'a World,
}

impl Iterator for QueryIter<'_> {
    type Item = RowRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.advance(self.world)
    }
}

/// Typed access to one component across query rows.
///
/// Remembers the column offset of the last archetype it saw, so walking the
/// rows of one archetype only resolves the offset once.
#[derive(Debug)]
pub struct ComponentView<T: Component> {
    ty: ComponentType,
    cached: Option<(ArchetypeId, Option<usize>)>,
    _component: PhantomData<fn() -> T>,
}

impl<T: Component> ComponentView<T> {
    /// Creates a view for `T`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ty: ComponentType::of::<T>(),
            cached: None,
            _component: PhantomData,
        }
    }

    fn offset(&mut self, directory: &ArchetypeDirectory, row: RowRef) -> Option<usize> {
        let archetype = directory.chunk(row.chunk()).archetype();
        match self.cached {
            Some((cached, offset)) if cached == archetype => offset,
            _ => {
                let offset = directory.get(archetype).column_offset(self.ty);
                self.cached = Some((archetype, offset));
                offset
            }
        }
    }

    /// Reads `T` at `row`, or `None` if the row's archetype lacks `T`.
    pub fn try_get<'w>(&mut self, world: &'w World, row: RowRef) -> Option<&'w T> {
        let directory = world.directory();
        let offset = self.offset(directory, row)?;
        let cell = directory.chunk(row.chunk()).cell(offset, self.ty.size(), row.row());
        Some(bytemuck::from_bytes(cell))
    }

    /// Mutable variant of [`try_get`](Self::try_get).
    pub fn try_get_mut<'w>(&mut self, world: &'w mut World, row: RowRef) -> Option<&'w mut T> {
        let directory = world.directory_mut();
        let offset = self.offset(directory, row)?;
        let cell = directory.chunk_mut(row.chunk()).cell_mut(offset, self.ty.size(), row.row());
        Some(bytemuck::from_bytes_mut(cell))
    }

    /// Reads `T` at `row`.
    ///
    /// # Panics
    ///
    /// Panics if the row's archetype lacks `T`.
    pub fn get<'w>(&mut self, world: &'w World, row: RowRef) -> &'w T {
        match self.try_get(world, row) {
            Some(value) => value,
            None => panic!("{} is not stored in this row", self.type_label()),
        }
    }

    /// Writes access to `T` at `row`.
    ///
    /// # Panics
    ///
    /// Panics if the row's archetype lacks `T`.
    pub fn get_mut<'w>(&mut self, world: &'w mut World, row: RowRef) -> &'w mut T {
        let label = self.type_label();
        match self.try_get_mut(world, row) {
            Some(value) => value,
            None => panic!("{label} is not stored in this row"),
        }
    }

    fn type_label(&self) -> &'static str {
        self.ty.name().unwrap_or("component")
    }
}

impl<T: Component> Default for ComponentView<T> {
    fn default() -> Self {
        Self::new()
    }
}
