//! # Component System
//!
//! Components are pure data containers with no behavior. They are stored as
//! raw bytes inside chunk columns, so they must be plain old data.
//!
//! Every component type gets a [`ComponentType`]: a numeric identity assigned
//! on first use plus the byte width of one instance. Type lists handed to the
//! storage layer are always sorted ascending by identity.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::OnceLock;

use bytemuck::{Pod, Zeroable};
use parking_lot::RwLock;

/// Alignment every chunk column is guaranteed to start on.
pub const CHUNK_WORD_ALIGN: usize = std::mem::align_of::<u64>();

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Pod`: Plain old data, stored and moved as bytes
/// - `Zeroable`: A freshly allocated column cell is all zeroes
/// - Non zero-sized, with alignment of at most 8 bytes
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct Scale {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Scale {}
/// ```
pub trait Component: Pod + Zeroable + Send + Sync + 'static {}

/// Identity and byte width of a component type.
///
/// Equality, ordering and hashing only look at the identity. Only compare
/// types obtained from the same registry.
#[derive(Clone, Copy, Debug)]
pub struct ComponentType {
    id: u32,
    size: usize,
}

impl ComponentType {
    /// Builds a component type from a raw identity and size.
    ///
    /// Useful for driving the archetype directory directly. Types created this
    /// way are not known to the registry.
    #[inline]
    #[must_use]
    pub const fn new(id: u32, size: usize) -> Self {
        Self { id, size }
    }

    /// Returns the registered component type for `T`, registering it first if
    /// needed.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized or needs an alignment above
    /// [`CHUNK_WORD_ALIGN`].
    #[must_use]
    pub fn of<T: Component>() -> Self {
        let type_id = TypeId::of::<T>();
        if let Some(found) = registry().read().by_type.get(&type_id) {
            return *found;
        }

        let size = std::mem::size_of::<T>();
        assert!(size > 0, "zero-sized component {} is not supported", type_name::<T>());
        assert!(
            std::mem::align_of::<T>() <= CHUNK_WORD_ALIGN,
            "component {} needs alignment {} but chunk columns are only {}-byte aligned",
            type_name::<T>(),
            std::mem::align_of::<T>(),
            CHUNK_WORD_ALIGN
        );

        let mut registry = registry().write();
        // Another caller may have registered it between the two locks.
        if let Some(found) = registry.by_type.get(&type_id) {
            return *found;
        }
        let id = next_component_id(registry.names.len());
        let component_type = Self::new(id, size);
        registry.by_type.insert(type_id, component_type);
        registry.names.insert(id, type_name::<T>());
        component_type
    }

    /// The stable identity.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.id
    }

    /// Byte width of one instance.
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        self.size
    }

    /// Rust type name, if this type came from [`ComponentType::of`].
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        registry().read().names.get(&self.id).copied()
    }
}

impl PartialEq for ComponentType {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl PartialOrd for ComponentType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for ComponentType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Default)]
struct Registry {
    by_type: HashMap<TypeId, ComponentType>,
    names: HashMap<u32, &'static str>,
}

/// Identity for the next registration, given how many types are registered.
fn next_component_id(registered: usize) -> u32 {
    match registered.checked_add(1).map(u32::try_from) {
        Some(Ok(id)) => id,
        _ => panic!("component identity space exhausted after {registered} types"),
    }
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Registry::default()))
}

/// Sorts a type list ascending by identity and drops duplicates.
pub fn sort_component_types(types: &mut Vec<ComponentType>) {
    types.sort_unstable();
    types.dedup();
}

/// Checks that a type list is strictly ascending by identity.
#[must_use]
pub fn is_sorted_unique(types: &[ComponentType]) -> bool {
    types.windows(2).all(|pair| pair[0].id < pair[1].id)
}

/// A static set of component types, implemented for tuples of components.
///
/// ```rust,ignore
/// let types = <(Position, Velocity)>::component_types();
/// ```
pub trait ComponentSet {
    /// The set's types, sorted and deduplicated.
    fn component_types() -> Vec<ComponentType>;
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn component_types() -> Vec<ComponentType> {
                let mut types = vec![$(ComponentType::of::<$name>()),+];
                sort_component_types(&mut types);
                types
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

/// Position component for entities.
///
/// Represents a 3D position in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Position {
    /// X coordinate in world space.
    pub x: f32,
    /// Y coordinate in world space.
    pub y: f32,
    /// Z coordinate in world space.
    pub z: f32,
    /// Padding for alignment (keeps the component 16 bytes wide for SIMD).
    pub _padding: f32,
}

impl Component for Position {}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            _padding: 0.0,
        }
    }

    /// Returns the squared distance to another position.
    #[inline]
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// Velocity component for entities.
///
/// Represents movement speed in world units per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Velocity {
    /// X velocity component.
    pub x: f32,
    /// Y velocity component.
    pub y: f32,
    /// Z velocity component.
    pub z: f32,
    /// Padding for alignment.
    pub _padding: f32,
}

impl Component for Velocity {}

impl Velocity {
    /// Creates a new velocity.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            _padding: 0.0,
        }
    }
}
