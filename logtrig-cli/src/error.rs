//! CLI-specific error types and exit code mapping

use logtrig_core::error::LogtrigError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Recipe or log-source definition could not be loaded.
    #[error("definition error: {0}")]
    Definition(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from logtrig-core.
    #[error("{0}")]
    Core(#[from] LogtrigError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 0 | Success |
    /// | 1 | General, command or definition error |
    /// | 2 | Configuration error |
    /// | 10 | IO error |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(LogtrigError::Config(_)) => 2,
            Self::Io(_) | Self::Core(LogtrigError::Io(_)) => 10,
            Self::Command(_) | Self::Definition(_) | Self::JsonSerialize(_) | Self::Core(_) => 1,
        }
    }
}

impl From<logtrig_trigger::TriggerError> for CliError {
    fn from(e: logtrig_trigger::TriggerError) -> Self {
        Self::Definition(e.to_string())
    }
}

impl From<logtrig_source::SourceError> for CliError {
    fn from(e: logtrig_source::SourceError) -> Self {
        Self::Definition(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtrig_core::error::ConfigError;

    #[test]
    fn exit_code_config_error() {
        let err = CliError::Config("bad".to_owned());
        assert_eq!(err.exit_code(), 2);

        let core = CliError::Core(LogtrigError::Config(ConfigError::FileNotFound {
            path: "logtrig.toml".to_owned(),
        }));
        assert_eq!(core.exit_code(), 2, "core config error should also map to 2");
    }

    #[test]
    fn exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert_eq!(CliError::Io(io_err).exit_code(), 10);

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert_eq!(CliError::Core(LogtrigError::Io(io_err)).exit_code(), 10);
    }

    #[test]
    fn exit_code_general_errors() {
        assert_eq!(CliError::Command("x".to_owned()).exit_code(), 1);
        assert_eq!(CliError::Definition("x".to_owned()).exit_code(), 1);

        let json_err = serde_json::from_str::<serde_json::Value>("{invalid json")
            .expect_err("should fail parsing");
        assert_eq!(CliError::JsonSerialize(json_err).exit_code(), 1);
    }

    #[test]
    fn trigger_error_becomes_definition_error() {
        let err = logtrig_trigger::TriggerError::Validation {
            recipe_id: "disk".to_owned(),
            reason: "recipe must have at least one step".to_owned(),
        };
        let cli_err: CliError = err.into();
        assert!(matches!(cli_err, CliError::Definition(_)));
        assert!(cli_err.to_string().contains("at least one step"));
    }

    #[test]
    fn source_error_becomes_definition_error() {
        let err = logtrig_source::SourceError::Load {
            path: "auth.yml".to_owned(),
            reason: "YAML parse error".to_owned(),
        };
        let cli_err: CliError = err.into();
        assert_eq!(cli_err.exit_code(), 1);
        assert!(cli_err.to_string().starts_with("definition error"));
    }

    #[test]
    fn display_includes_context() {
        let err = CliError::Config("invalid TOML syntax".to_owned());
        let display = err.to_string();
        assert!(display.contains("configuration error"));
        assert!(display.contains("invalid TOML syntax"));
        assert_eq!(CliError::Command("failed".to_owned()).to_string(), "failed");
    }
}
