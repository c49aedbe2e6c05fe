//! # World Configuration
//!
//! Sizing knobs for a [`World`](crate::World), loaded once at startup from
//! TOML.
//!
//! ```toml
//! initial_entity_capacity = 4096
//! chunk_capacity = 1024
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Rows per chunk unless configured otherwise.
pub const DEFAULT_CHUNK_CAPACITY: usize = 1024;

/// Entity table slots reserved up front unless configured otherwise.
pub const DEFAULT_ENTITY_CAPACITY: usize = 1024;

/// Sizing parameters for a world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Number of entity table slots allocated at creation. The table doubles
    /// when this is exceeded. Zero is clamped to one.
    pub initial_entity_capacity: usize,
    /// Rows per chunk. Must be a non-zero multiple of 8 so that every column
    /// of a chunk starts on a word boundary.
    pub chunk_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_entity_capacity: DEFAULT_ENTITY_CAPACITY,
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
        }
    }
}

impl WorldConfig {
    /// Default configuration with a custom initial entity capacity.
    #[must_use]
    pub fn with_entity_capacity(initial_entity_capacity: usize) -> Self {
        Self {
            initial_entity_capacity,
            ..Self::default()
        }
    }

    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the text is not valid TOML for
    /// this structure or a value fails [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ConfigIo`] if the file cannot be read, otherwise
    /// the same errors as [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EcsError::ConfigIo {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `chunk_capacity` is zero or not
    /// a multiple of 8.
    pub fn validate(&self) -> EcsResult<()> {
        if self.chunk_capacity == 0 || self.chunk_capacity % 8 != 0 {
            return Err(EcsError::InvalidConfig(format!(
                "chunk_capacity must be a non-zero multiple of 8, got {}",
                self.chunk_capacity
            )));
        }
        Ok(())
    }
}
