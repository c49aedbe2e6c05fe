//! # ECS World
//!
//! The central container for all entities and components.
//!
//! The world ties the entity table to the archetype directory. Every handle
//! maps to exactly one row of one archetype, and structural changes (adding
//! or removing a component) migrate the row to another archetype.

use super::archetype::{Archetype, ArchetypeDirectory, ArchetypeId};
use super::component::{sort_component_types, Component, ComponentSet, ComponentType};
use super::entity::{Entity, EntityTable};
use super::query::{EntityQuery, QueryBuilder, QueryResult};
use super::storage::RowRef;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};

/// The ECS World - container for all entity and component state.
///
/// # Contract
///
/// Handles passed to the world must be live. Stale handles are caught by debug
/// assertions; the `try_*` accessors check them in every build. Asking for a
/// component the entity does not have panics in the plain accessors.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
///
/// let entity = world.spawn::<(Position, Velocity)>();
/// *world.get_component_mut::<Velocity>(entity) = Velocity::new(1.0, 0.0, 0.0);
///
/// let moving = world.find(|q| q.require::<Position>().require::<Velocity>());
/// assert_eq!(moving.count(&world), 1);
/// ```
pub struct World {
    directory: ArchetypeDirectory,
    entities: EntityTable,
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(&WorldConfig::default())
    }

    /// Creates a world with `initial_entity_capacity` pre-allocated entity
    /// slots. The table still grows past it on demand.
    #[must_use]
    pub fn with_capacity(initial_entity_capacity: usize) -> Self {
        Self::build(&WorldConfig::with_entity_capacity(initial_entity_capacity))
    }

    /// Creates a world from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the configuration is rejected by
    /// [`WorldConfig::validate`].
    pub fn from_config(config: &WorldConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &WorldConfig) -> Self {
        tracing::debug!(
            entity_capacity = config.initial_entity_capacity,
            chunk_capacity = config.chunk_capacity,
            "world created"
        );
        Self {
            directory: ArchetypeDirectory::new(config.chunk_capacity),
            entities: EntityTable::new(config.initial_entity_capacity),
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.alive()
    }

    /// Checks if no entity is alive.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.alive() == 0
    }

    /// Number of entity table slots currently allocated.
    #[inline]
    #[must_use]
    pub fn entity_capacity(&self) -> usize {
        self.entities.capacity()
    }

    /// Number of archetypes created so far.
    #[inline]
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.directory.len()
    }

    /// Number of chunks allocated across all archetypes.
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.directory.chunks().len()
    }

    /// Rows per chunk.
    #[inline]
    #[must_use]
    pub fn chunk_capacity(&self) -> usize {
        self.directory.chunk_capacity()
    }

    /// Number of live entities in one archetype.
    #[must_use]
    pub fn archetype_len(&self, archetype: ArchetypeId) -> usize {
        self.directory.get(archetype).len()
    }

    /// Record of one archetype.
    #[must_use]
    pub fn archetype_info(&self, archetype: ArchetypeId) -> &Archetype {
        self.directory.get(archetype)
    }

    /// Every archetype, most recently created first.
    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> + '_ {
        self.directory.iter()
    }

    /// The archetype directory, for read-only inspection.
    #[inline]
    #[must_use]
    pub fn directory(&self) -> &ArchetypeDirectory {
        &self.directory
    }

    #[inline]
    pub(crate) fn directory_mut(&mut self) -> &mut ArchetypeDirectory {
        &mut self.directory
    }

    // =========================================================================
    // Archetypes
    // =========================================================================

    /// Returns the archetype for a type list in any order, creating it on
    /// first use. Duplicates are ignored.
    pub fn archetype(&mut self, component_types: &[ComponentType]) -> ArchetypeId {
        let mut sorted = component_types.to_vec();
        sort_component_types(&mut sorted);
        self.directory.get_or_create(&sorted)
    }

    /// Returns the archetype for a static component set.
    pub fn archetype_of<S: ComponentSet>(&mut self) -> ArchetypeId {
        self.directory.get_or_create(&S::component_types())
    }

    // =========================================================================
    // Entity Lifecycle
    // =========================================================================

    /// Creates an entity in `archetype` with every component zeroed.
    pub fn create_entity_in(&mut self, archetype: ArchetypeId) -> Entity {
        let entity = self.entities.reserve(archetype);
        let row = self.directory.allocate_row(archetype, entity);
        self.entities.set_location(entity.index(), archetype, row);
        entity
    }

    /// Creates an entity with the given component types, in any order.
    pub fn create_entity(&mut self, component_types: &[ComponentType]) -> Entity {
        let archetype = self.archetype(component_types);
        self.create_entity_in(archetype)
    }

    /// Creates an entity holding every component of `S`, zeroed.
    pub fn spawn<S: ComponentSet>(&mut self) -> Entity {
        let archetype = self.archetype_of::<S>();
        self.create_entity_in(archetype)
    }

    /// Deletes a live entity. Its handle, and every copy of it, goes stale.
    ///
    /// The last row of the entity's chunk moves into the freed row.
    pub fn delete_entity(&mut self, entity: Entity) {
        let (archetype, row) = self.entities.vacate(entity);
        self.directory.remove_row(archetype, row, self.entities.slots_mut());
        self.entities.recycle(entity);
    }

    /// Checks if `entity` refers to a live entity.
    ///
    /// Never panics, whatever the handle.
    #[inline]
    #[must_use]
    pub fn entity_exists(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    /// Component types of a live entity, sorted.
    #[must_use]
    pub fn component_types(&self, entity: Entity) -> &[ComponentType] {
        self.directory.get(self.locate(entity).0).component_types()
    }

    /// Archetype currently holding a live entity.
    #[must_use]
    pub fn archetype_of_entity(&self, entity: Entity) -> ArchetypeId {
        self.locate(entity).0
    }

    fn locate(&self, entity: Entity) -> (ArchetypeId, RowRef) {
        let slot = self.entities.slot(entity);
        match slot.archetype {
            Some(archetype) => (archetype, slot.location),
            None => panic!("entity {entity:?} is not alive"),
        }
    }

    // =========================================================================
    // Component Access
    // =========================================================================

    /// Checks if a live entity has `T`.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        let (archetype, _) = self.locate(entity);
        self.directory.get(archetype).contains(ComponentType::of::<T>())
    }

    /// Reads `T` of a live entity.
    ///
    /// # Panics
    ///
    /// Panics if the entity has no `T`.
    #[must_use]
    pub fn get_component<T: Component>(&self, entity: Entity) -> &T {
        let ty = ComponentType::of::<T>();
        let (archetype, row) = self.locate(entity);
        match self.directory.component_cell(archetype, ty, row) {
            Some(cell) => bytemuck::from_bytes(cell),
            None => panic!("{}", EcsError::missing_component(entity, ty)),
        }
    }

    /// Mutable access to `T` of a live entity.
    ///
    /// # Panics
    ///
    /// Panics if the entity has no `T`.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        let ty = ComponentType::of::<T>();
        let (archetype, row) = self.locate(entity);
        match self.directory.component_cell_mut(archetype, ty, row) {
            Some(cell) => bytemuck::from_bytes_mut(cell),
            None => panic!("{}", EcsError::missing_component(entity, ty)),
        }
    }

    /// Checked variant of [`get_component`](Self::get_component).
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] for a dead handle and
    /// [`EcsError::MissingComponent`] if the entity has no `T`.
    pub fn try_get_component<T: Component>(&self, entity: Entity) -> EcsResult<&T> {
        if !self.entities.contains(entity) {
            return Err(EcsError::StaleEntity(entity));
        }
        let ty = ComponentType::of::<T>();
        let (archetype, row) = self.locate(entity);
        self.directory
            .component_cell(archetype, ty, row)
            .map(bytemuck::from_bytes)
            .ok_or_else(|| EcsError::missing_component(entity, ty))
    }

    /// Checked variant of [`get_component_mut`](Self::get_component_mut).
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] for a dead handle and
    /// [`EcsError::MissingComponent`] if the entity has no `T`.
    pub fn try_get_component_mut<T: Component>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        if !self.entities.contains(entity) {
            return Err(EcsError::StaleEntity(entity));
        }
        let ty = ComponentType::of::<T>();
        let (archetype, row) = self.locate(entity);
        self.directory
            .component_cell_mut(archetype, ty, row)
            .map(bytemuck::from_bytes_mut)
            .ok_or_else(|| EcsError::missing_component(entity, ty))
    }

    // =========================================================================
    // Structural Changes
    // =========================================================================

    /// Sets `T` on a live entity, adding the component if it is missing.
    ///
    /// Adding moves the entity to the archetype with `T` added. Values of the
    /// components it already had are kept.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        let ty = ComponentType::of::<T>();
        let (source, row) = self.locate(entity);

        if let Some(types) = with_type(self.directory.get(source).component_types(), ty) {
            let target = self.directory.get_or_create(&types);
            self.move_entity(entity, source, row, target);
        }

        *self.get_component_mut::<T>(entity) = value;
    }

    /// Removes `T` from a live entity and returns its last value, or `None` if
    /// the entity had no `T`.
    ///
    /// Removal moves the entity to the archetype with `T` taken out.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let ty = ComponentType::of::<T>();
        let (source, row) = self.locate(entity);

        let types = without_type(self.directory.get(source).component_types(), ty)?;
        let value = *self.get_component::<T>(entity);
        let target = self.directory.get_or_create(&types);
        self.move_entity(entity, source, row, target);
        Some(value)
    }

    fn move_entity(&mut self, entity: Entity, source: ArchetypeId, row: RowRef, target: ArchetypeId) {
        let new_row = self
            .directory
            .migrate_row(source, row, target, self.entities.slots_mut());
        self.entities.set_location(entity.index(), target, new_row);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Runs a query built in place.
    ///
    /// ```rust,ignore
    /// let idle = world.find(|q| q.require::<Position>().exclude::<Velocity>());
    /// ```
    pub fn find<F>(&self, configure: F) -> QueryResult
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.query(&configure(EntityQuery::builder()).build())
    }

    /// Runs a prepared query, snapshotting the archetypes that match now.
    #[must_use]
    pub fn query(&self, query: &EntityQuery) -> QueryResult {
        query.collect(&self.directory)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        tracing::debug!(
            entities = self.entities.alive(),
            archetypes = self.directory.len(),
            chunks = self.directory.chunks().len(),
            "world released"
        );
        self.directory.release();
    }
}

/// Sorted type list with `ty` inserted, or `None` if it is already there.
fn with_type(current: &[ComponentType], ty: ComponentType) -> Option<Vec<ComponentType>> {
    let position = current.binary_search(&ty).err()?;
    let mut types = Vec::with_capacity(current.len() + 1);
    types.extend_from_slice(&current[..position]);
    types.push(ty);
    types.extend_from_slice(&current[position..]);
    Some(types)
}

/// Sorted type list with `ty` taken out, or `None` if it is not there.
fn without_type(current: &[ComponentType], ty: ComponentType) -> Option<Vec<ComponentType>> {
    let position = current.binary_search(&ty).ok()?;
    let mut types = current.to_vec();
    types.remove(position);
    Some(types)
}
