//! # World Verification Tests
//!
//! End-to-end checks of the storage engine through the public API:
//!
//! 1. **Entity lifecycle**: handles, generations and table growth
//! 2. **Archetypes**: find-or-create and chunk spill
//! 3. **Row packing**: swap-remove and slot fixups
//! 4. **Structural changes**: adding and removing components
//! 5. **Queries**: filtering, snapshots and typed views
//!
//! Run with: cargo test -p mugen_core --test world_verification

use bytemuck::{Pod, Zeroable};
use mugen_core::{Component, ComponentType, Entity, EntityQuery, Position, Velocity, World, WorldConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Health(u32);

impl Component for Health {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Frozen(u8);

impl Component for Frozen {}

fn small_chunks() -> World {
    let config = WorldConfig {
        initial_entity_capacity: 2,
        chunk_capacity: 8,
    };
    World::from_config(&config).unwrap()
}

// ============================================================================
// ENTITY LIFECYCLE
// ============================================================================

#[test]
fn verify_entity_exists_between_create_and_delete() {
    let mut world = World::new();

    let entity = world.spawn::<(Position,)>();
    assert!(world.entity_exists(entity));

    world.delete_entity(entity);
    assert!(!world.entity_exists(entity));

    // The next create reuses the index with a newer generation.
    let reused = world.spawn::<(Position,)>();
    assert_eq!(reused.index(), entity.index());
    assert!(reused.generation() > entity.generation());
    assert!(world.entity_exists(reused));
    assert!(!world.entity_exists(entity));
}

#[test]
fn verify_invalid_handle_never_exists() {
    let mut world = World::new();
    world.spawn::<(Position,)>();
    assert!(!world.entity_exists(Entity::INVALID));
    assert!(!world.entity_exists(Entity::new(0, 0)));
}

#[test]
fn verify_growth_past_initial_capacity() {
    let mut world = World::with_capacity(1);

    let entities: Vec<_> = (0..10u32)
        .map(|i| {
            let e = world.spawn::<(Health,)>();
            *world.get_component_mut::<Health>(e) = Health(i);
            e
        })
        .collect();

    assert!(world.entity_capacity() >= 10);
    assert_eq!(world.len(), 10);
    for (i, &e) in entities.iter().enumerate() {
        assert!(world.entity_exists(e));
        assert_eq!(*world.get_component::<Health>(e), Health(i as u32));
    }
}

// ============================================================================
// ARCHETYPES
// ============================================================================

#[test]
fn verify_archetype_find_or_create() {
    let mut world = World::new();
    let p = ComponentType::of::<Position>();
    let v = ComponentType::of::<Velocity>();
    let h = ComponentType::of::<Health>();

    let pv = world.archetype(&[p, v]);
    assert_eq!(world.archetype(&[p, v]), pv);
    assert_eq!(world.archetype(&[v, p]), pv);
    assert_eq!(world.archetype_of::<(Velocity, Position)>(), pv);

    assert_ne!(world.archetype(&[p]), pv);
    assert_ne!(world.archetype(&[p, h]), pv);
    assert_ne!(world.archetype(&[p, v, h]), pv);
    assert_eq!(world.archetype_count(), 4);
}

#[test]
fn verify_chunk_spill_and_reuse() {
    let mut world = small_chunks();
    let archetype = world.archetype_of::<(Health,)>();

    let entities: Vec<_> = (0..9).map(|_| world.create_entity_in(archetype)).collect();
    assert_eq!(world.archetype_len(archetype), 9);
    assert_eq!(world.archetype_info(archetype).chunks().len(), 2);
    assert_eq!(world.chunk_count(), 2);

    // Freeing a row of the full first chunk makes it reusable.
    world.delete_entity(entities[0]);
    let replacement = world.create_entity_in(archetype);
    let first_chunk = world.archetype_info(archetype).chunks()[0];
    let holds_replacement = world
        .directory()
        .chunk(first_chunk)
        .entities()
        .any(|e| e == replacement);

    assert!(holds_replacement);
    assert_eq!(world.chunk_count(), 2);
}

// ============================================================================
// ROW PACKING
// ============================================================================

#[test]
fn verify_swap_remove_keeps_moved_entity_reachable() {
    let mut world = World::new();

    let entities: Vec<_> = (0..4u32)
        .map(|i| {
            let e = world.spawn::<(Position, Health)>();
            *world.get_component_mut::<Health>(e) = Health(i);
            world.get_component_mut::<Position>(e).x = i as f32;
            e
        })
        .collect();

    world.delete_entity(entities[1]);

    let archetype = world.archetype_of_entity(entities[3]);
    let chunk = world.archetype_info(archetype).chunks()[0];
    assert_eq!(world.directory().chunk(chunk).entity(1), entities[3]);

    for &i in &[0usize, 2, 3] {
        assert_eq!(*world.get_component::<Health>(entities[i]), Health(i as u32));
        assert_eq!(world.get_component::<Position>(entities[i]).x, i as f32);
    }
    assert_eq!(world.archetype_len(archetype), 3);
}

#[test]
fn verify_new_row_after_delete_is_zeroed() {
    let mut world = World::new();
    let a = world.spawn::<(Health,)>();
    let b = world.spawn::<(Health,)>();
    *world.get_component_mut::<Health>(a) = Health(1);
    *world.get_component_mut::<Health>(b) = Health(2);

    world.delete_entity(a);
    let c = world.spawn::<(Health,)>();

    assert_eq!(*world.get_component::<Health>(b), Health(2));
    assert_eq!(*world.get_component::<Health>(c), Health(0));
}

// ============================================================================
// STRUCTURAL CHANGES
// ============================================================================

#[test]
fn verify_add_component_moves_one_row() {
    let mut world = World::new();
    let bystander = world.spawn::<(Position,)>();
    let entity = world.spawn::<(Position,)>();
    *world.get_component_mut::<Position>(entity) = Position::new(1.0, 2.0, 3.0);
    *world.get_component_mut::<Position>(bystander) = Position::new(7.0, 7.0, 7.0);

    let source = world.archetype_of_entity(entity);
    world.add_component(entity, Velocity::new(0.5, 0.0, 0.0));
    let target = world.archetype_of_entity(entity);

    assert_ne!(source, target);
    assert_eq!(world.archetype_len(source), 1);
    assert_eq!(world.archetype_len(target), 1);
    assert_eq!(*world.get_component::<Position>(entity), Position::new(1.0, 2.0, 3.0));
    assert_eq!(*world.get_component::<Velocity>(entity), Velocity::new(0.5, 0.0, 0.0));
    assert_eq!(*world.get_component::<Position>(bystander), Position::new(7.0, 7.0, 7.0));
}

#[test]
fn verify_remove_is_inverse_of_add() {
    let mut world = World::new();
    let entity = world.spawn::<(Position, Velocity)>();
    *world.get_component_mut::<Position>(entity) = Position::new(4.0, 5.0, 6.0);
    *world.get_component_mut::<Velocity>(entity) = Velocity::new(1.0, 1.0, 1.0);
    let original = world.archetype_of_entity(entity);

    world.add_component(entity, Health(77));
    assert_eq!(world.remove_component::<Health>(entity), Some(Health(77)));

    assert_eq!(world.archetype_of_entity(entity), original);
    assert_eq!(*world.get_component::<Position>(entity), Position::new(4.0, 5.0, 6.0));
    assert_eq!(*world.get_component::<Velocity>(entity), Velocity::new(1.0, 1.0, 1.0));
}

#[test]
fn verify_structural_changes_across_chunks() {
    let mut world = small_chunks();
    let entities: Vec<_> = (0..20u32)
        .map(|i| {
            let e = world.spawn::<(Health,)>();
            *world.get_component_mut::<Health>(e) = Health(i);
            e
        })
        .collect();

    for &e in entities.iter().step_by(2) {
        world.add_component(e, Frozen(1));
    }

    for (i, &e) in entities.iter().enumerate() {
        assert_eq!(*world.get_component::<Health>(e), Health(i as u32));
        assert_eq!(world.has_component::<Frozen>(e), i % 2 == 0);
    }
}

// ============================================================================
// QUERIES
// ============================================================================

#[test]
fn verify_query_end_to_end() {
    let mut world = World::new();
    let a = world.spawn::<(Position, Velocity)>();
    let b = world.spawn::<(Position, Velocity)>();
    let c = world.spawn::<(Position,)>();

    let positioned = world.find(|q| q.require::<Position>());
    let moving = world.find(|q| q.require::<Position>().require::<Velocity>());

    assert_eq!(positioned.iter(&world).count(), 3);
    assert_eq!(moving.iter(&world).count(), 2);
    assert_eq!(positioned.count(&world), 3);

    let mut visited: Vec<_> = moving.entities(&world).collect();
    visited.sort_by_key(|e| e.index());
    assert_eq!(visited, vec![a, b]);

    let mut positions = positioned.view::<Position>();
    let mut cursor = positioned.cursor();
    while let Some(row) = cursor.advance(&world) {
        positions.get_mut(&mut world, row).x = 42.0;
    }

    for e in [a, b, c] {
        assert_eq!(world.get_component::<Position>(e).x, 42.0);
    }
}

#[test]
fn verify_query_filters() {
    let mut world = World::new();
    world.spawn::<(Position,)>();
    world.spawn::<(Position, Frozen)>();
    world.spawn::<(Velocity,)>();
    world.spawn::<(Health,)>();

    let active = world.find(|q| q.require::<Position>().exclude::<Frozen>());
    assert_eq!(active.count(&world), 1);

    let movable = world.find(|q| q.any::<Position>().any::<Velocity>());
    assert_eq!(movable.count(&world), 3);

    let query = EntityQuery::builder().optional::<Frozen>().build();
    assert_eq!(world.query(&query).count(&world), 4);
}

#[test]
fn verify_query_is_a_snapshot() {
    let mut world = World::new();
    world.spawn::<(Position,)>();

    let result = world.find(|q| q.require::<Position>());
    assert_eq!(result.matched_archetypes().len(), 1);

    // A new matching archetype is not picked up...
    world.spawn::<(Position, Velocity)>();
    assert_eq!(result.matched_archetypes().len(), 1);
    assert_eq!(result.iter(&world).count(), 1);

    // ...but new rows in an already matched archetype are.
    world.spawn::<(Position,)>();
    assert_eq!(result.iter(&world).count(), 2);
}

#[test]
fn verify_query_skips_empty_archetypes_and_chunks() {
    let mut world = small_chunks();
    let empty = world.spawn::<(Position, Health)>();
    world.delete_entity(empty);

    let filled: Vec<_> = (0..17).map(|_| world.spawn::<(Position,)>()).collect();
    for &e in &filled[8..16] {
        world.delete_entity(e);
    }

    let result = world.find(|q| q.require::<Position>());
    assert_eq!(result.matched_archetypes().len(), 2);
    assert_eq!(result.iter(&world).count(), 9);
}

#[test]
fn verify_for_each_mut_and_optional_view() {
    let mut world = World::new();
    let still = world.spawn::<(Position,)>();
    let moving = world.spawn::<(Position, Velocity)>();
    *world.get_component_mut::<Velocity>(moving) = Velocity::new(2.0, 0.0, 0.0);

    let result = world.find(|q| q.require::<Position>().optional::<Velocity>());

    let mut velocities = result.view::<Velocity>();
    let mut with_velocity = 0;
    for row in result.iter(&world) {
        if velocities.try_get(&world, row).is_some() {
            with_velocity += 1;
        }
    }
    assert_eq!(with_velocity, 1);

    result.for_each_mut::<Position, _>(&mut world, |_, p| p.y = 3.0);
    assert_eq!(world.get_component::<Position>(still).y, 3.0);
    assert_eq!(world.get_component::<Position>(moving).y, 3.0);

    let mut seen = 0;
    result.for_each::<Position, _>(&world, |_, p| {
        assert_eq!(p.y, 3.0);
        seen += 1;
    });
    assert_eq!(seen, 2);
}
