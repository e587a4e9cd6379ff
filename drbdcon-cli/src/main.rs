//! `drbdcon` - command-line console for DRBD, Pacemaker and libvirt hosts
//!
//! Resolves and runs named commands on configured hosts, refreshes
//! inspections into the cluster model and parses saved payloads offline.

mod cli;
mod commands;
mod error;
mod util;

use clap::Parser;
use cli::Cli;
use util::GlobalOptions;

fn main() {
    let cli = Cli::parse();
    let options = GlobalOptions {
        config_path: cli.config.as_deref(),
        verbose: cli.verbose,
        quiet: cli.quiet,
        ask_pass: cli.ask_pass,
    };

    let result = commands::dispatch(options, cli.command);

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
