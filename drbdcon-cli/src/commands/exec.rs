//! Run a named command on hosts.

use std::time::Duration;

use drbdcon_core::{DispatchOptions, DispatchSummary, ExecutionResult};
use futures::StreamExt;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::util::{GlobalOptions, create_console, runtime};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Parameters for the exec command
pub struct ExecParams<'a> {
    pub operation: &'a str,
    pub hosts: &'a [String],
    pub substitutions: &'a [(String, String)],
    pub timeout: Option<u64>,
    pub format: OutputFormat,
}

/// Exec command handler
///
/// Results are printed as hosts finish. Ctrl-C cancels the hosts that are
/// still running.
pub fn cmd_exec(options: GlobalOptions<'_>, params: ExecParams<'_>) -> Result<(), CliError> {
    let console = create_console(options)?;
    let hosts = console.select_hosts(params.hosts)?;
    if hosts.is_empty() {
        println!("No hosts configured.");
        return Ok(());
    }

    let mut dispatch_options = DispatchOptions::visible();
    if let Some(secs) = params.timeout {
        dispatch_options = dispatch_options.with_timeout(Duration::from_secs(secs));
    }

    tracing::debug!(operation = params.operation, hosts = hosts.len(), "Running command");
    let runtime = runtime()?;
    let results = runtime.block_on(async {
        let dispatch = console.run_with(
            params.operation,
            params.substitutions,
            &hosts,
            dispatch_options,
        );
        let token = dispatch.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });

        let mut results = Vec::with_capacity(hosts.len());
        let mut stream = Box::pin(dispatch.into_stream());
        while let Some((_, result)) = stream.next().await {
            if params.format == OutputFormat::Table {
                print_result(&result);
            }
            results.push(result);
        }
        results
    });

    let summary = DispatchSummary::from_results(&results);
    match params.format {
        OutputFormat::Table => {
            println!();
            println!("{BOLD}{}:{RESET} {summary}", params.operation);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }

    if summary.all_succeeded() {
        Ok(())
    } else {
        Err(CliError::Remote(summary.to_string()))
    }
}

fn print_result(result: &ExecutionResult) {
    if result.is_success() {
        println!(
            "{GREEN}{BOLD}✓{RESET} {} {CYAN}({}ms){RESET}",
            result.host, result.duration_ms
        );
    } else {
        println!("{RED}{BOLD}✗{RESET} {} {YELLOW}- {}{RESET}", result.host, result.summary());
    }
    for line in result.stdout.lines() {
        println!("    {line}");
    }
    if !result.is_success() {
        for line in result.stderr.lines() {
            println!("    {YELLOW}{line}{RESET}");
        }
    }
}
