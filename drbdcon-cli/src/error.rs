//! CLI error types and exit codes.

use drbdcon_core::{ConfigError, CoreError, ResolveError};

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, validation, or other local errors
    pub const GENERAL_ERROR: i32 = 1;
    /// Remote failure - at least one host did not succeed
    pub const REMOTE_FAILURE: i32 = 2;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host not found
    #[error("Unknown host(s): {0}")]
    UnknownHost(String),

    /// Command resolution error
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// One or more hosts failed
    #[error("Remote failure: {0}")]
    Remote(String),

    /// Output could not be produced
    #[error("Output error: {0}")]
    Output(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownHosts(names) => Self::UnknownHost(names.join(", ")),
            CoreError::Resolve(e) => Self::Resolve(e),
            other => Self::Config(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Output(err.to_string())
    }
}

impl CliError {
    /// Returns the exit code for this error.
    ///
    /// - 1: General error (configuration, resolution, unknown host, IO)
    /// - 2: Remote failure (a host failed, timed out or was cancelled)
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Remote(_) => exit_codes::REMOTE_FAILURE,
            Self::Config(_)
            | Self::UnknownHost(_)
            | Self::Resolve(_)
            | Self::Output(_)
            | Self::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Remote("x".into()).exit_code(), 2);
        assert_eq!(CliError::Config("x".into()).exit_code(), 1);
        let err: CliError = CoreError::UnknownHosts(vec!["a".into(), "b".into()]).into();
        assert_eq!(err.to_string(), "Unknown host(s): a, b");
        assert_eq!(err.exit_code(), 1);
    }
}
