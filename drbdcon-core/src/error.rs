//! Crate-wide error types

use std::path::PathBuf;

use thiserror::Error;

use crate::command::{CommandFileError, ResolveError};
use crate::tracing::TracingError;

/// Errors raised while loading or saving the console configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read configuration file {}: {source}", path.display())]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be written
    #[error("Failed to write configuration file {}: {source}", path.display())]
    Write {
        /// File that was written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has wrong types
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be serialized
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No configuration directory could be determined
    #[error("Could not determine the configuration directory")]
    NoConfigDir,

    /// The configuration parsed but is not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// A `[commands.*]` entry is malformed
    #[error(transparent)]
    Commands(#[from] CommandFileError),
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Any error surfaced by the core library
#[derive(Debug, Error)]
pub enum CoreError {
    /// Command resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A command file could not be loaded
    #[error(transparent)]
    CommandFile(#[from] CommandFileError),

    /// Configuration could not be loaded or saved
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be initialized
    #[error(transparent)]
    Tracing(#[from] TracingError),

    /// Host names that are not in the registry
    #[error("Unknown host(s): {}", .0.join(", "))]
    UnknownHosts(Vec<String>),
}

/// Result type for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;
