//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use drbdcon_core::{Inspection, PayloadKind};

use crate::util::parse_key_val;

/// Console for DRBD, Pacemaker and libvirt hosts over SSH
#[derive(Parser)]
#[command(name = "drbdcon")]
#[command(author, version, about = "drbdcon cluster console")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration directory
    #[arg(short, long, global = true, env = "DRBDCON_CONFIG_DIR")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Prompt for an SSH password used for hosts without one
    #[arg(long, global = true)]
    pub ask_pass: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List configured hosts
    #[command(about = "List the hosts in the configuration")]
    Hosts {
        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// List known command names
    #[command(about = "List the command names of the command table")]
    Commands,

    /// Print the command a name resolves to
    #[command(about = "Resolve a command name without running it")]
    Resolve {
        /// Command name
        name: String,

        /// Resolve for this configured host
        #[arg(short = 'H', long, conflicts_with = "distribution")]
        host: Option<String>,

        /// Distribution key, e.g. `debian:12:x86_64`
        #[arg(short, long, value_name = "KEY")]
        distribution: Option<String>,

        /// Placeholder value (KEY=value), repeatable
        #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
    },

    /// Run a named command on hosts
    #[command(about = "Run a named command on hosts; all hosts when none are given")]
    Exec {
        /// Command name
        operation: String,

        /// Target hosts
        hosts: Vec<String>,

        /// Placeholder value (KEY=value), repeatable
        #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        set: Vec<(String, String)>,

        /// Per-host timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Refresh inspections and print the resulting model
    #[command(about = "Inspect hosts and print the cluster model")]
    Inspect {
        /// Target hosts
        hosts: Vec<String>,

        /// Inspection to run, repeatable; all when omitted
        #[arg(short, long = "inspection", value_name = "NAME")]
        inspections: Vec<Inspection>,

        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Parse a saved inspection payload
    #[command(about = "Parse inspection output from a file or stdin")]
    Parse {
        /// Payload kind (host-info, block-devices, drbd-status, vnc-status,
        /// domain-xml, drbd-config-xml)
        kind: PayloadKind,

        /// Input file, `-` for stdin
        #[arg(default_value = "-")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Write a default configuration file
    #[command(about = "Create drbdcon.toml in the configuration directory")]
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    #[command(about = "Generate shell completion scripts")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Table,
    /// JSON
    Json,
}
