//! Command handler modules for the CLI.

mod completions;
mod exec;
mod hosts;
mod init;
mod inspect;
mod parse;
mod resolve;

use crate::cli::Commands;
use crate::error::CliError;
use crate::util::GlobalOptions;

/// Dispatch a CLI command to the appropriate handler.
pub fn dispatch(options: GlobalOptions<'_>, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Hosts { format } => hosts::cmd_hosts(options, format),
        Commands::Commands => resolve::cmd_commands(options),
        Commands::Resolve {
            name,
            host,
            distribution,
            set,
        } => resolve::cmd_resolve(
            options,
            &name,
            host.as_deref(),
            distribution.as_deref(),
            &set,
        ),
        Commands::Exec {
            operation,
            hosts,
            set,
            timeout,
            format,
        } => exec::cmd_exec(
            options,
            exec::ExecParams {
                operation: &operation,
                hosts: &hosts,
                substitutions: &set,
                timeout,
                format,
            },
        ),
        Commands::Inspect {
            hosts,
            inspections,
            format,
        } => inspect::cmd_inspect(options, &hosts, &inspections, format),
        Commands::Parse { kind, file, format } => parse::cmd_parse(kind, &file, format),
        Commands::Init { force } => init::cmd_init(options, force),
        Commands::Completions { shell } => completions::cmd_completions(shell),
    }
}
