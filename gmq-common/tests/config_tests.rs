//! Unit tests for configuration loading and graceful degradation
//!
//! Tests:
//! - Missing TOML files do not cause termination
//! - Priority order for data folder resolution
//! - Full TOML schema round trip
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate GMQ_DATA_FOLDER are marked with #[serial].

use gmq_common::config::{resolve_data_folder, CompiledDefaults, TomlConfig, DATA_FOLDER_ENV};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.data_folder.as_os_str().is_empty());
    assert!(defaults.data_folder.ends_with("gmq") || defaults.data_folder.ends_with("gmq_data"));
    assert_eq!(defaults.log_level, "info");
    assert_eq!(defaults.listen_port, 5780);
}

#[test]
fn test_missing_explicit_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.toml");

    let config = TomlConfig::load(Some(&missing)).expect("missing file must not fail");
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_load_full_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        data_folder = "/srv/gmq"
        log_level = "debug"
        listen_port = 6000
        privileged_secret = "hunter2"

        [backend]
        url = "http://lava:2333"
        password = "pw"
        session_id = "abc"
        timeout_ms = 1500

        [session]
        grace_period_ms = 2000
        default_volume = 60
        reject_duplicate_urls = true
        event_capacity = 64

        [store]
        file_name = "lists.json"
        write_attempts = 5
        retry_backoff_ms = 10
        "#,
    )
    .unwrap();

    let config = TomlConfig::load(Some(&path)).unwrap();
    assert_eq!(config.data_folder, Some(PathBuf::from("/srv/gmq")));
    assert_eq!(config.log_level.as_deref(), Some("debug"));
    assert_eq!(config.listen_port, Some(6000));
    assert_eq!(config.privileged_secret.as_deref(), Some("hunter2"));
    assert_eq!(config.backend.url, "http://lava:2333");
    assert_eq!(config.backend.timeout_ms, 1500);
    assert_eq!(config.session.default_volume, 60);
    assert!(config.session.reject_duplicate_urls);
    assert_eq!(config.store.write_attempts, 5);
}

#[test]
fn test_unparseable_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[session\ngrace_period_ms = ").unwrap();

    assert!(TomlConfig::load(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(DATA_FOLDER_ENV, "/tmp/gmq-env");
    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/gmq-toml")),
        ..Default::default()
    };

    let folder = resolve_data_folder(Some(Path::new("/tmp/gmq-cli")), DATA_FOLDER_ENV, &toml);
    assert_eq!(folder, PathBuf::from("/tmp/gmq-cli"));

    env::remove_var(DATA_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(DATA_FOLDER_ENV, "/tmp/gmq-env");
    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/gmq-toml")),
        ..Default::default()
    };

    let folder = resolve_data_folder(None, DATA_FOLDER_ENV, &toml);
    assert_eq!(folder, PathBuf::from("/tmp/gmq-env"));

    env::remove_var(DATA_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_beats_default() {
    env::remove_var(DATA_FOLDER_ENV);
    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/gmq-toml")),
        ..Default::default()
    };

    let folder = resolve_data_folder(None, DATA_FOLDER_ENV, &toml);
    assert_eq!(folder, PathBuf::from("/tmp/gmq-toml"));
}

#[test]
#[serial]
fn test_default_when_nothing_configured() {
    env::remove_var(DATA_FOLDER_ENV);

    let folder = resolve_data_folder(None, DATA_FOLDER_ENV, &TomlConfig::default());
    assert_eq!(folder, CompiledDefaults::for_current_platform().data_folder);
}
