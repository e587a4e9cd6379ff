//! Resolve command names without running them.

use std::sync::Arc;

use drbdcon_core::console::HOST_PLACEHOLDER;
use drbdcon_core::{CommandResolver, DistributionKey};

use crate::error::CliError;
use crate::util::{GlobalOptions, load_config, parse_distribution};

/// Resolve command handler
pub fn cmd_resolve(
    options: GlobalOptions<'_>,
    name: &str,
    host: Option<&str>,
    distribution: Option<&str>,
    substitutions: &[(String, String)],
) -> Result<(), CliError> {
    let (manager, config) = load_config(options)?;
    let table = manager.command_table(&config)?;
    let resolver =
        CommandResolver::new(Arc::new(table)).with_privilege_escalation(config.ssh.sudo);

    let command = match host {
        Some(host_name) => {
            let registry = config.host_registry()?;
            let host = registry
                .get(host_name)
                .ok_or_else(|| CliError::UnknownHost(host_name.to_string()))?;
            let mut all = vec![(HOST_PLACEHOLDER.to_string(), host.name().to_string())];
            all.extend_from_slice(substitutions);
            resolver.resolve_for_host(name, &all, &host)?
        }
        None => {
            let key = match distribution {
                Some(key) => parse_distribution(key)?,
                None => DistributionKey::generic(),
            };
            resolver.resolve(name, substitutions, &key)?
        }
    };

    println!("{command}");
    Ok(())
}

/// Commands command handler
pub fn cmd_commands(options: GlobalOptions<'_>) -> Result<(), CliError> {
    let (manager, config) = load_config(options)?;
    let table = manager.command_table(&config)?;
    let resolver = CommandResolver::new(Arc::new(table));
    let mut names = resolver.names();
    names.sort();
    for name in names {
        println!("{name}");
    }
    Ok(())
}
