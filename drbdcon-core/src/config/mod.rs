//! Console configuration
//!
//! `drbdcon.toml` is read by [`ConfigManager`] into a [`ConsoleConfig`] that
//! is then handed explicitly to whatever needs it.

mod manager;
mod settings;

pub use manager::{COMMANDS_FILE_NAME, CONFIG_DIR_ENV, CONFIG_FILE_NAME, ConfigManager};
pub use settings::{
    ConsoleConfig, DEFAULT_MAX_PARALLEL, DEFAULT_TIMEOUT_SECS, ExecutorSettings, HostConfig,
    LoggingSettings, SshSettings,
};
