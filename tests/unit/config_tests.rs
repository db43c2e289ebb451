//! Unit tests for configuration parsing, defaults, and validation.

use loomd::config::WorkerConfig;
use loomd::WorkerError;

fn minimal_toml() -> &'static str {
    r#"data_dir = "/tmp/loomd-test""#
}

#[test]
fn minimal_config_gets_defaults() {
    let config = WorkerConfig::from_toml_str(minimal_toml()).expect("parse");
    assert_eq!(config.ipc_name, "loomd-worker");
    assert_eq!(config.default_model, "tinyllama-1.1b-chat-q4");
    assert_eq!(config.tick_seconds, 300);
    assert_eq!(config.staleness_minutes, 30);
    assert_eq!(config.timeouts.load_seconds, 300);
    assert_eq!(config.timeouts.generate_seconds, 30);
    assert_eq!(config.retention.max_age_days, 30);
    assert_eq!(config.retention.max_count, 100);
    assert_eq!(config.generation.max_tokens, 256);
    assert_eq!(config.generation.quick_max_tokens, 128);
    assert_eq!(config.models.len(), 3);
}

#[test]
fn db_path_is_under_data_dir() {
    let config = WorkerConfig::from_toml_str(minimal_toml()).expect("parse");
    assert_eq!(config.db_path(), std::path::Path::new("/tmp/loomd-test/loomd.db"));
}

#[test]
fn resolve_model_falls_back_to_default() {
    let config = WorkerConfig::from_toml_str(minimal_toml()).expect("parse");
    let resolved = config.resolve_model(None).expect("resolve");
    assert_eq!(resolved, config.default_model);
}

#[test]
fn resolve_model_accepts_catalog_entry() {
    let config = WorkerConfig::from_toml_str(minimal_toml()).expect("parse");
    let resolved = config.resolve_model(Some("gemma-2b-it-q4")).expect("resolve");
    assert_eq!(resolved, "gemma-2b-it-q4");
}

#[test]
fn resolve_model_rejects_unknown_id() {
    let config = WorkerConfig::from_toml_str(minimal_toml()).expect("parse");
    let err = config.resolve_model(Some("gpt-7")).expect_err("must fail");
    assert!(matches!(err, WorkerError::InvalidInput(_)));
}

#[test]
fn default_model_must_be_in_catalog() {
    let raw = r#"
data_dir = "/tmp/loomd-test"
default_model = "not-a-real-model"
"#;
    let err = WorkerConfig::from_toml_str(raw).expect_err("must fail");
    assert!(matches!(err, WorkerError::Config(_)));
}

#[test]
fn zero_retention_count_is_rejected() {
    let raw = r#"
data_dir = "/tmp/loomd-test"

[retention]
max_count = 0
"#;
    let err = WorkerConfig::from_toml_str(raw).expect_err("must fail");
    assert!(matches!(err, WorkerError::Config(_)));
}

#[test]
fn zero_timeout_is_rejected() {
    let raw = r#"
data_dir = "/tmp/loomd-test"

[timeouts]
generate_seconds = 0
"#;
    let err = WorkerConfig::from_toml_str(raw).expect_err("must fail");
    assert!(matches!(err, WorkerError::Config(_)));
}

#[test]
fn custom_catalog_overrides_default() {
    let raw = r#"
data_dir = "/tmp/loomd-test"
default_model = "custom-model"

[[models]]
id = "custom-model"
name = "Custom Model"
"#;
    let config = WorkerConfig::from_toml_str(raw).expect("parse");
    assert_eq!(config.models.len(), 1);
    assert_eq!(config.resolve_model(None).expect("resolve"), "custom-model");
}

#[test]
fn invalid_toml_is_a_config_error() {
    let err = WorkerConfig::from_toml_str("data_dir = [").expect_err("must fail");
    assert!(matches!(err, WorkerError::Config(_)));
}
