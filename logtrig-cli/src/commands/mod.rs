//! Command handlers -- one module per subcommand

pub mod config;
pub mod source;
pub mod trigger;

use std::path::Path;

use logtrig_core::config::LogtrigConfig;
use logtrig_core::error::LogtrigError;

/// Load the effective configuration for commands that can run without a config file.
///
/// A missing file falls back to defaults; env overrides and validation still apply.
/// A file that exists but fails to parse or validate is an error.
pub async fn load_effective_config(path: &Path) -> Result<LogtrigConfig, LogtrigError> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return LogtrigConfig::load(path).await;
    }

    tracing::debug!(path = %path.display(), "config file not found, using defaults");
    let mut config = LogtrigConfig::default();
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config = load_effective_config(&temp_dir.path().join("absent.toml"))
            .await
            .expect("defaults should load");
        assert!(config.trigger.include_rejected);
    }

    #[tokio::test]
    async fn present_but_invalid_file_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("logtrig.toml");
        std::fs::write(&path, "[general]\nlog_level = \"loud\"\n").expect("write");

        let err = load_effective_config(&path).await.unwrap_err();
        assert!(err.to_string().contains("general.log_level"));
    }
}
