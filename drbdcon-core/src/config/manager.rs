//! Locating, loading and saving `drbdcon.toml`.

use std::path::{Path, PathBuf};

use super::ConsoleConfig;
use crate::command::StaticCommandTable;
use crate::error::{ConfigError, ConfigResult};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "DRBDCON_CONFIG_DIR";

/// Name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "drbdcon.toml";

/// Optional command file merged over `[commands.*]`
pub const COMMANDS_FILE_NAME: &str = "commands.toml";

const APP_DIR_NAME: &str = "drbdcon";

/// Loads and saves the console configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a manager for `$DRBDCON_CONFIG_DIR`, or the platform
    /// configuration directory when the variable is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] if neither is available.
    pub fn new() -> ConfigResult<Self> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(Self::with_config_dir(PathBuf::from(dir)));
        }
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_config_dir(base.join(APP_DIR_NAME)))
    }

    /// Creates a manager for an explicit directory
    #[must_use]
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Configuration directory
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of `drbdcon.toml`
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Path of the optional `commands.toml`
    #[must_use]
    pub fn commands_path(&self) -> PathBuf {
        self.config_dir.join(COMMANDS_FILE_NAME)
    }

    /// Loads the configuration; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load(&self) -> ConfigResult<ConsoleConfig> {
        let path = self.config_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(ConsoleConfig::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: ConsoleConfig = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), hosts = config.hosts.len(), "Loaded configuration");
        Ok(config)
    }

    /// Writes the configuration, creating the directory if needed.
    ///
    /// Passwords are never written.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, config: &ConsoleConfig) -> ConfigResult<()> {
        std::fs::create_dir_all(&self.config_dir).map_err(|source| ConfigError::Write {
            path: self.config_dir.clone(),
            source,
        })?;
        let content = toml::to_string_pretty(config)?;
        let path = self.config_path();
        std::fs::write(&path, content).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Builds the command table for `config`: defaults, then
    /// `[commands.*]`, then `commands.toml` if present.
    ///
    /// # Errors
    ///
    /// Returns an error if a command entry or the command file is invalid.
    pub fn command_table(&self, config: &ConsoleConfig) -> ConfigResult<StaticCommandTable> {
        let mut table = config.command_table()?;
        let path = self.commands_path();
        if path.exists() {
            table.merge_file(&path)?;
        }
        Ok(table)
    }
}
