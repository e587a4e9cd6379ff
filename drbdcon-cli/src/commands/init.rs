//! Write a default configuration file.

use drbdcon_core::ConsoleConfig;

use crate::error::CliError;
use crate::util::{GlobalOptions, create_config_manager};

/// Init command handler
pub fn cmd_init(options: GlobalOptions<'_>, force: bool) -> Result<(), CliError> {
    let manager = create_config_manager(options.config_path)?;
    let path = manager.config_path();
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    manager.save(&ConsoleConfig::default())?;
    println!("Wrote {}", path.display());
    Ok(())
}
