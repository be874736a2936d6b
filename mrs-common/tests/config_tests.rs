//! Unit tests for configuration loading and layered resolution
//!
//! Tests cover:
//! - TOML parsing with partial files and defaults
//! - Missing config file graceful fallback
//! - Config path resolution (CLI > ENV > default)
//! - Database → ENV → TOML secret resolution

use mrs_common::config::{
    load_or_default, load_toml_config, resolve_config_path, resolve_layered, TomlConfig,
    ValueSource, CONFIG_ENV_VAR,
};
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_default_config_values() {
    let config = TomlConfig::default();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.ai.requests_per_minute, 60);
    assert_eq!(config.workers.count, 4);
    assert_eq!(config.workers.poll_interval_ms, 2000);
    assert!(config.analysis.webhook_url.is_none());
}

#[test]
fn test_partial_toml_uses_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
port = 9000

[workers]
count = 2

[analysis]
webhook_url = "https://automation.example.com/webhook/analyze"
"#
    )
    .unwrap();

    let config = load_toml_config(file.path()).unwrap();
    assert_eq!(config.port, Some(9000));
    assert_eq!(config.workers.count, 2);
    assert_eq!(config.workers.poll_interval_ms, 2000);
    assert_eq!(config.logging.level, "info");
    assert_eq!(
        config.analysis.webhook_url.as_deref(),
        Some("https://automation.example.com/webhook/analyze")
    );
}

#[test]
fn test_invalid_toml_is_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number").unwrap();
    assert!(load_toml_config(file.path()).is_err());
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert!(config.port.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
#[serial]
fn test_config_path_cli_wins() {
    std::env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");
    let cli = PathBuf::from("/tmp/from-cli.toml");
    assert_eq!(resolve_config_path(Some(&cli)), cli);
    std::env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_config_path_env_fallback() {
    std::env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");
    assert_eq!(resolve_config_path(None), PathBuf::from("/tmp/from-env.toml"));
    std::env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_config_path_default() {
    std::env::remove_var(CONFIG_ENV_VAR);
    let path = resolve_config_path(None);
    assert!(path.ends_with("mrs/config.toml"));
}

#[test]
#[serial]
fn test_layered_database_has_priority() {
    std::env::set_var("MRS_TEST_LAYERED_KEY", "env-key");
    let resolved = resolve_layered(
        "test key",
        Some("db-key".to_string()),
        "MRS_TEST_LAYERED_KEY",
        Some("toml-key"),
    );
    assert_eq!(resolved, Some(("db-key".to_string(), ValueSource::Database)));
    std::env::remove_var("MRS_TEST_LAYERED_KEY");
}

#[test]
#[serial]
fn test_layered_skips_blank_values() {
    std::env::set_var("MRS_TEST_LAYERED_KEY", "   ");
    let resolved = resolve_layered(
        "test key",
        Some(String::new()),
        "MRS_TEST_LAYERED_KEY",
        Some("toml-key"),
    );
    assert_eq!(resolved, Some(("toml-key".to_string(), ValueSource::Toml)));
    std::env::remove_var("MRS_TEST_LAYERED_KEY");
}

#[test]
#[serial]
fn test_layered_none_when_unset() {
    std::env::remove_var("MRS_TEST_LAYERED_KEY");
    assert_eq!(
        resolve_layered("test key", None, "MRS_TEST_LAYERED_KEY", None),
        None
    );
}
