//! # Core Error Types
//!
//! The storage engine favours caller contracts over runtime checks, so most
//! operations never return an error. The variants below cover the few checked
//! paths: configuration loading and the `try_*` component accessors.

use thiserror::Error;

use crate::ecs::{ComponentType, Entity};

/// Errors reported by the checked parts of the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The handle's generation no longer matches its slot, or the slot is empty.
    #[error("entity {0:?} does not exist")]
    StaleEntity(Entity),

    /// The entity's archetype has no column for the requested component.
    #[error("entity {entity:?} has no component {component}")]
    MissingComponent {
        /// The entity that was accessed.
        entity: Entity,
        /// Type name of the missing component.
        component: &'static str,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {message}")]
    ConfigIo {
        /// Path that was opened.
        path: String,
        /// Underlying I/O error message.
        message: String,
    },
}

impl EcsError {
    pub(crate) fn missing_component(entity: Entity, component: ComponentType) -> Self {
        Self::MissingComponent {
            entity,
            component: component.name().unwrap_or("<unregistered>"),
        }
    }
}

/// Result type for checked engine operations.
pub type EcsResult<T> = Result<T, EcsError>;
