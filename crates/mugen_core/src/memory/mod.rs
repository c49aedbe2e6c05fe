//! # Memory Management
//!
//! Arena storage for archetype records and chunk slabs.
//!
//! ## Design Philosophy
//!
//! Records are addressed by integer ids rather than pointers:
//! - Allocation is a push
//! - Nothing is freed individually
//! - Everything is released at once when the owner is torn down

mod arena;

pub use arena::{narrow_index, Arena, ArenaId};
