//! Tests for lendscore-cli configuration loading.
//!
//! Exercises config parsing (YAML, TOML), file loading by extension,
//! defaults, overrides, validation and example generation.

use lendscore_cli::config::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

// =============================================================================
// Defaults
// =============================================================================

#[test]
fn config_default_server() {
    let cfg = Config::default();
    assert_eq!(cfg.server.port, 8000);
    assert_eq!(cfg.server.bind, "0.0.0.0");
}

#[test]
fn config_default_model() {
    let cfg = Config::default();
    assert_eq!(cfg.model.path, PathBuf::from("model.json"));
    assert!(cfg.model.metadata_path.is_none());
    assert_eq!(cfg.model.max_batch_size, 100);
}

#[test]
fn config_default_logging() {
    let cfg = Config::default();
    assert_eq!(cfg.logging.level, "info");
    assert_eq!(cfg.logging.format, "text");
}

#[test]
fn config_resolve_without_file_is_default() {
    assert_eq!(Config::resolve(None).unwrap(), Config::default());
}

// =============================================================================
// File loading
// =============================================================================

#[test]
fn load_yaml_by_extension() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "lendscore.yaml", "model:\n  max_batch_size: 25\n");
    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg.model.max_batch_size, 25);
}

#[test]
fn load_toml_by_extension() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "lendscore.toml", "[server]\nport = 9001\n");
    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg.server.port, 9001);
}

#[test]
fn load_unknown_extension_falls_back_to_toml() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "lendscore.conf", "[logging]\nformat = \"json\"\n");
    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg.logging.format, "json");
}

#[test]
fn load_missing_file_is_io_error() {
    let err = Config::load("/nonexistent/lendscore.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::IoError(_, _)));
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn load_invalid_yaml_is_parse_error() {
    let err = Config::from_yaml("server: [unclosed").unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn load_wrong_type_is_parse_error() {
    let err = Config::from_toml("[server]\nport = \"eight thousand\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

// =============================================================================
// Overrides and validation
// =============================================================================

#[test]
fn overrides_replace_file_values() {
    let mut cfg = Config::from_yaml(
        "server:\n  port: 9000\nmodel:\n  path: /srv/model.json\n  max_batch_size: 10\n",
    )
    .unwrap();
    cfg.apply(Overrides {
        model_path: Some(PathBuf::from("/tmp/other.json")),
        max_batch_size: Some(50),
        ..Default::default()
    });
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.model.path, PathBuf::from("/tmp/other.json"));
    assert_eq!(cfg.model.max_batch_size, 50);
}

#[test]
fn empty_overrides_change_nothing() {
    let mut cfg = Config::example();
    cfg.apply(Overrides::default());
    assert_eq!(cfg, Config::example());
}

#[test]
fn validate_accepts_ipv6_bind() {
    let mut cfg = Config::default();
    cfg.server.bind = "::1".to_string();
    assert!(cfg.validate().is_ok());
    assert!(cfg.bind_addr().unwrap().is_ipv6());
}

#[test]
fn validate_rejects_unknown_log_format() {
    let mut cfg = Config::default();
    cfg.logging.format = "xml".to_string();
    assert!(cfg.validate().is_err());
}

// =============================================================================
// Example generation
// =============================================================================

#[test]
fn example_yaml_round_trips() {
    let cfg = Config::from_yaml(&Config::example_yaml()).unwrap();
    assert_eq!(cfg, Config::example());
}

#[test]
fn example_toml_round_trips() {
    let cfg = Config::from_toml(&Config::example_toml()).unwrap();
    assert_eq!(cfg, Config::example());
}

#[test]
fn example_loader_uses_metadata() {
    let loader = Config::example().model.loader();
    assert_eq!(loader.model_path(), Path::new("/app/model.json"));
    assert_eq!(
        loader.metadata_path(),
        Some(Path::new("/app/preprocessing.json"))
    );
}
