//! List configured hosts.

use drbdcon_core::ConsoleConfig;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::util::{GlobalOptions, load_config};

/// Hosts command handler
pub fn cmd_hosts(options: GlobalOptions<'_>, format: OutputFormat) -> Result<(), CliError> {
    let (_, config) = load_config(options)?;
    match format {
        OutputFormat::Table => print_table(&config),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config.hosts)?),
    }
    Ok(())
}

fn print_table(config: &ConsoleConfig) {
    if config.hosts.is_empty() {
        println!("No hosts configured.");
        return;
    }
    let registry = match config.host_registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    let name_width = registry
        .hosts()
        .iter()
        .map(|h| h.name().len())
        .max()
        .unwrap_or(4)
        .max(4);
    println!("{:<name_width$}  {:<28}  {:<10}  DISTRIBUTION", "NAME", "ADDRESS", "USER");
    for host in registry.hosts() {
        let address = format!("{}:{}", host.address(), host.port());
        println!(
            "{:<name_width$}  {:<28}  {:<10}  {}",
            host.name(),
            address,
            host.credentials().user,
            host.distribution_key()
        );
    }
}
