//! Loading a world configuration from disk.

use mugen_core::{EcsError, World, WorldConfig};

fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("mugen_core_{}_{name}.toml", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn load_valid_file() {
    let path = write_temp("valid", "initial_entity_capacity = 64\nchunk_capacity = 16\n");
    let config = WorldConfig::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(config.initial_entity_capacity, 64);
    assert_eq!(config.chunk_capacity, 16);

    let world = World::from_config(&config).unwrap();
    assert_eq!(world.chunk_capacity(), 16);
    assert_eq!(world.entity_capacity(), 64);
}

#[test]
fn load_rejects_misaligned_chunk_capacity() {
    let path = write_temp("misaligned", "chunk_capacity = 100\n");
    let result = WorldConfig::load(&path);
    let _ = std::fs::remove_file(&path);

    assert!(matches!(result, Err(EcsError::InvalidConfig(_))));
}

#[test]
fn load_missing_file() {
    let result = WorldConfig::load("/definitely/not/here/mugen.toml");
    assert!(matches!(result, Err(EcsError::ConfigIo { .. })));
}
