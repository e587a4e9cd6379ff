//! Refresh inspections and print the cluster model.

use drbdcon_core::{Inspection, ModelSnapshot, ParsedRecord, RecordKind, RefreshReport};
use serde_json::json;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::util::{GlobalOptions, create_console, runtime};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Inspect command handler
///
/// Inspections run one after the other so that host facts, and with them
/// distribution-specific command variants, are known before the rest.
pub fn cmd_inspect(
    options: GlobalOptions<'_>,
    hosts: &[String],
    inspections: &[Inspection],
    format: OutputFormat,
) -> Result<(), CliError> {
    let console = create_console(options)?;
    let targets = console.select_hosts(hosts)?;
    if targets.is_empty() {
        println!("No hosts configured.");
        return Ok(());
    }

    let mut selected: Vec<Inspection> = if inspections.is_empty() {
        Inspection::ALL.to_vec()
    } else {
        inspections.to_vec()
    };
    selected.sort_by_key(|i| Inspection::ALL.iter().position(|a| a == i));
    selected.dedup();

    tracing::debug!(hosts = targets.len(), inspections = selected.len(), "Inspecting");
    let runtime = runtime()?;
    let reports: Vec<RefreshReport> = runtime.block_on(async {
        let mut reports = Vec::with_capacity(selected.len());
        for inspection in selected {
            reports.push(console.refresh(inspection, &targets).await);
        }
        reports
    });

    let snapshot = console.snapshot();
    match format {
        OutputFormat::Table => {
            for report in &reports {
                print_report(report);
            }
            println!();
            print_snapshot(&snapshot);
        }
        OutputFormat::Json => {
            let out = json!({ "reports": reports, "model": snapshot.as_ref() });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    let failed: usize = reports.iter().map(|r| r.failures().count()).sum();
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::Remote(format!("{failed} host inspection(s) failed")))
    }
}

fn print_report(report: &RefreshReport) {
    println!("{BOLD}{}:{RESET} {}", report.inspection, report.summary());
    for failure in report.failures() {
        println!("  {RED}✗{RESET} {} - {}", failure.host, failure.result.summary());
    }
    for (host, diagnostic) in report.diagnostics() {
        println!("  {YELLOW}!{RESET} {host}: {diagnostic}");
    }
}

fn print_snapshot(snapshot: &ModelSnapshot) {
    if snapshot.is_empty() {
        println!("Model is empty.");
        return;
    }
    for host in snapshot.host_names() {
        println!("{BOLD}{host}{RESET}");
        if let Some(facts) = snapshot.host(host).and_then(|r| r.facts()) {
            println!(
                "  {} {}  kernel {}  drbd {}",
                facts.distribution.as_deref().unwrap_or("?"),
                facts.distribution_version.as_deref().unwrap_or(""),
                facts.kernel_version.as_deref().unwrap_or("?"),
                facts.drbd_version.as_deref().unwrap_or("-"),
            );
        }
        for record in snapshot.records(host, RecordKind::DrbdVolumeStatus) {
            if let ParsedRecord::DrbdVolumeStatus(s) = record {
                println!(
                    "  drbd {}/{}  {} {}  peer {}",
                    s.resource,
                    s.volume,
                    s.role.as_deref().unwrap_or("?"),
                    s.disk_state.as_deref().unwrap_or("?"),
                    s.peer_disk_state.as_deref().unwrap_or("?"),
                );
            }
        }
        for domain in snapshot.vm_domains(host) {
            let state = if domain.running { "running" } else { "shut off" };
            println!(
                "  vm {}  {state}  vnc {}",
                domain.name,
                snapshot.vnc_port(host, &domain.name)
            );
        }
        let blocks = snapshot
            .host(host)
            .map_or(0, |r| r.count(RecordKind::BlockDevice));
        if blocks > 0 {
            println!("  {blocks} block device(s)");
        }
    }
}
