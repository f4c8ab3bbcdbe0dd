//! Unit tests for configuration and graceful degradation
//!
//! Covers:
//! - compiled defaults per platform
//! - priority order for root folder resolution (CLI → ENV → TOML → default)
//! - TOML parsing, defaults for omitted sections, and threshold validation
//!
//! Note: Uses serial_test to prevent ENV variable race conditions.
//! Tests that manipulate SEED_ROOT_FOLDER or SEED_ROOT are marked with #[serial].

use seed_common::config::{
    CompiledDefaults, MatchingConfig, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.log_file.is_none());
    assert!(defaults.root_folder.to_string_lossy().contains("seed"));
}

#[test]
#[serial]
fn test_resolver_cli_arg_wins_over_env() {
    env::set_var("SEED_ROOT_FOLDER", "/tmp/seed-test-env-folder");

    let resolver = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/seed-test-cli-folder")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/seed-test-cli-folder"));

    env::remove_var("SEED_ROOT_FOLDER");
}

#[test]
#[serial]
fn test_resolver_env_var_seed_root_folder() {
    env::remove_var("SEED_ROOT");
    env::set_var("SEED_ROOT_FOLDER", "/tmp/seed-test-env-folder");

    let resolver = RootFolderResolver::new("test-module");
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/seed-test-env-folder"));

    env::remove_var("SEED_ROOT_FOLDER");
}

#[test]
#[serial]
fn test_resolver_env_var_seed_root_fallback() {
    env::remove_var("SEED_ROOT_FOLDER");
    env::set_var("SEED_ROOT", "/tmp/seed-test-root");

    let resolver = RootFolderResolver::new("test-module");
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/seed-test-root"));

    env::remove_var("SEED_ROOT");
}

#[test]
#[serial]
fn test_resolver_toml_used_when_no_cli_or_env() {
    env::remove_var("SEED_ROOT_FOLDER");
    env::remove_var("SEED_ROOT");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/seed-from-toml")),
        ..Default::default()
    };
    let resolver = RootFolderResolver::new("test-module").with_toml_config(config);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/seed-from-toml"));
}

#[test]
#[serial]
fn test_resolver_with_empty_toml_uses_default() {
    env::remove_var("SEED_ROOT_FOLDER");
    env::remove_var("SEED_ROOT");

    let resolver = RootFolderResolver::new("test-module").with_toml_config(TomlConfig::default());
    assert_eq!(
        resolver.resolve(),
        CompiledDefaults::for_current_platform().root_folder
    );
}

#[test]
fn test_initializer_creates_directory_and_database_path() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("nested").join("seed");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join("seed.db"));
}

#[test]
fn test_toml_parsing_with_partial_sections() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/seed"

[logging]
level = "debug"

[matching]
address_similarity_threshold = 0.85
"#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/seed")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.matching.address_similarity_threshold, 0.85);
    // omitted keys fall back to defaults
    assert_eq!(config.matching.auto_match_threshold, 0.95);
    assert_eq!(config.matching.concat_delimiter, " ");
    assert!(config.database_path.is_none());
}

#[test]
fn test_toml_rejects_out_of_range_threshold() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[matching]\nauto_match_threshold = 1.5\n").unwrap();

    assert!(TomlConfig::load(&path).is_err());
}

#[test]
fn test_toml_save_then_load() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("sub").join("config.toml");

    let mut config = TomlConfig::default();
    config.database_path = Some(PathBuf::from("/tmp/other.db"));
    config.matching = MatchingConfig {
        event_capacity: 7,
        ..Default::default()
    };
    config.save(&path).unwrap();

    let loaded = TomlConfig::load(&path).unwrap();
    assert_eq!(loaded.database_path, Some(PathBuf::from("/tmp/other.db")));
    assert_eq!(loaded.matching.event_capacity, 7);
}
