//! Command resolution
//!
//! Turns a symbolic operation name, a set of `@TOKEN@` substitutions and a
//! host's [`DistributionKey`](crate::models::DistributionKey) into the literal
//! shell command sent to that host.

pub mod names;
mod resolver;
mod spec;
mod table;

pub use resolver::{CommandResolver, shell_quote};
pub use spec::CommandSpec;
pub use table::{CommandTable, StaticCommandTable};

use thiserror::Error;

/// Errors raised while resolving a command.
///
/// These are local to a single command for a single host and are never
/// retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No table entry for the name under any scope of the distribution key
    #[error("No command '{name}' for distribution '{distribution}'")]
    UnresolvedCommand {
        /// Symbolic command name
        name: String,
        /// Most specific scope that was tried
        distribution: String,
    },

    /// A placeholder in the template had no supplied value
    #[error("Command '{name}' needs a value for @{placeholder}@")]
    MissingSubstitution {
        /// Symbolic command name
        name: String,
        /// Placeholder without a value
        placeholder: String,
    },
}

/// Result type for command resolution
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Errors raised while loading a command file
#[derive(Debug, Error)]
pub enum CommandFileError {
    /// The file could not be read
    #[error("Failed to read command file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML
    #[error("Failed to parse command file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A distribution key in the file is malformed
    #[error("Invalid distribution key '{key}' for command '{name}'")]
    InvalidScope {
        /// Command the key belongs to
        name: String,
        /// The malformed key
        key: String,
    },
}
