//! Integration tests for `logtrig config` command.
//!
//! Tests config validation and display functionality with real TOML files.

use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn logtrig() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_logtrig"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("logtrig.toml");

    let valid_config = r#"
[general]
log_level = "info"
log_format = "json"

[trigger]
recipe_dir = "/etc/logtrig/triggers"
default_timestamp_format = "HH:mm:ss"
include_rejected = false

[source]
source_dir = "/etc/logtrig/sources"
"#;

    fs::write(&config_path, valid_config).expect("should write config");

    // When: Loading the config
    let result = logtrig_core::config::LogtrigConfig::load(&config_path).await;

    // Then: Should succeed
    let config = result.expect("valid config should load successfully");
    assert_eq!(config.trigger.default_timestamp_format, "HH:mm:ss");
    assert!(!config.trigger.include_rejected);
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    // Given: A malformed TOML file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");

    fs::write(&config_path, "[general\nlog_level = \"info\"\n").expect("should write bad config");

    // When: Loading the config
    let result = logtrig_core::config::LogtrigConfig::load(&config_path).await;

    // Then: Should fail
    assert!(result.is_err(), "malformed TOML should fail to load");
}

#[tokio::test]
async fn test_config_validate_empty_file() {
    // Given: An empty config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("empty.toml");
    fs::write(&config_path, "").expect("should write empty file");

    // When: Loading the config
    let result = logtrig_core::config::LogtrigConfig::load(&config_path).await;

    // Then: Should succeed with defaults
    let config = result.expect("empty config should use defaults");
    assert_eq!(config.general.log_format, "pretty");
    assert!(config.trigger.include_rejected);
}

#[tokio::test]
async fn test_config_rejects_tokenless_timestamp_format() {
    // Given: A default timestamp format without any date/time token
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("logtrig.toml");
    fs::write(
        &config_path,
        "[trigger]\ndefault_timestamp_format = \"no tokens here\"\n",
    )
    .expect("should write config");

    // When: Loading the config
    let result = logtrig_core::config::LogtrigConfig::load(&config_path).await;

    // Then: Should fail on that field
    let err = result.expect_err("tokenless format should be rejected");
    assert!(err.to_string().contains("trigger.default_timestamp_format"));
}

#[test]
fn test_cli_config_validate_missing_file_exits_with_config_code() {
    // Given: A config path that does not exist
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("absent.toml");

    // When: Running `config validate`
    let output = logtrig()
        .arg("-c")
        .arg(&config_path)
        .args(["config", "validate", "--output", "json"])
        .output()
        .expect("should run logtrig");

    // Then: Reports invalid and exits with code 2
    assert_eq!(output.status.code(), Some(2));
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["valid"], false);
    assert!(
        report["errors"][0]
            .as_str()
            .is_some_and(|e| e.contains("not found"))
    );
}

#[test]
fn test_cli_config_show_section() {
    // Given: A config file with a custom recipe directory
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("logtrig.toml");
    fs::write(&config_path, "[trigger]\nrecipe_dir = \"/srv/recipes\"\n")
        .expect("should write config");

    // When: Running `config show --section trigger`
    let output = logtrig()
        .arg("-c")
        .arg(&config_path)
        .args(["config", "show", "--section", "trigger", "--output", "json"])
        .output()
        .expect("should run logtrig");

    // Then: Only the trigger section is rendered
    assert!(output.status.success(), "{output:?}");
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["section"], "trigger");
    let toml_text = report["config_toml"].as_str().expect("config_toml string");
    assert!(toml_text.contains("/srv/recipes"));
    assert!(!toml_text.contains("log_level"));
}
