//! Shared utility functions used across command modules.

use std::path::Path;
use std::sync::Arc;

use drbdcon_core::config::ConfigManager;
use drbdcon_core::{
    Console, ConsoleConfig, DistributionKey, SshTransport, TracingLevel, init_tracing,
};
use secrecy::SecretString;

use crate::error::CliError;

/// Global options every command may need
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalOptions<'a> {
    /// Custom configuration directory
    pub config_path: Option<&'a Path>,
    /// Number of `-v` flags
    pub verbose: u8,
    /// `--quiet`
    pub quiet: bool,
    /// `--ask-pass`
    pub ask_pass: bool,
}

/// Creates a `ConfigManager` using the optional custom config directory
/// from CLI args.
pub fn create_config_manager(config_path: Option<&Path>) -> Result<ConfigManager, CliError> {
    match config_path {
        Some(path) => Ok(ConfigManager::with_config_dir(path.to_path_buf())),
        None => ConfigManager::new()
            .map_err(|e| CliError::Config(format!("Failed to initialize config: {e}"))),
    }
}

/// Loads the configuration and initializes logging from its `[logging]`
/// section raised by the `-v` count.
pub fn load_config(options: GlobalOptions<'_>) -> Result<(ConfigManager, ConsoleConfig), CliError> {
    let manager = create_config_manager(options.config_path)?;
    let config = manager.load()?;

    let mut tracing_config = config.logging.tracing_config();
    tracing_config.level = if options.quiet && options.verbose == 0 {
        TracingLevel::Error
    } else {
        tracing_config.level.raised_by(options.verbose)
    };
    if let Err(e) = init_tracing(&tracing_config) {
        eprintln!("Warning: logging disabled: {e}");
    }

    Ok((manager, config))
}

/// Builds a console over SSH for the loaded configuration.
///
/// With `--ask-pass`, the prompted password is given to every host that
/// has none configured.
pub fn create_console(options: GlobalOptions<'_>) -> Result<Console, CliError> {
    let (manager, mut config) = load_config(options)?;
    if options.ask_pass {
        let password = rpassword::prompt_password("SSH password: ")?;
        for host in config.hosts.iter_mut().filter(|h| h.password.is_none()) {
            host.password = Some(SecretString::from(password.clone()));
        }
    }
    let table = manager.command_table(&config)?;
    let transport = SshTransport::new(config.ssh.clone());
    Ok(Console::new(config, Arc::new(table), Arc::new(transport))?)
}

/// Creates the async runtime used by remote commands
pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Config(format!("Failed to create async runtime: {e}")))
}

/// Parse a key=value pair for placeholder substitution
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{s}`"))?;
    let key = s[..pos].trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=value: empty key in `{s}`"));
    }
    Ok((key.to_string(), s[pos + 1..].to_string()))
}

/// Parses `family[:version[:arch]]`
pub fn parse_distribution(s: &str) -> Result<DistributionKey, CliError> {
    let mut parts = s.split(':').map(str::trim);
    let family = parts
        .next()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| CliError::Config(format!("Invalid distribution key: '{s}'")))?;
    let version = parts.next().filter(|v| !v.is_empty());
    let arch = parts.next().filter(|a| !a.is_empty());
    if parts.next().is_some() {
        return Err(CliError::Config(format!("Invalid distribution key: '{s}'")));
    }
    Ok(DistributionKey::new(family, version, arch))
}
