//! Parse a saved inspection payload.

use std::io::Read;
use std::path::Path;

use drbdcon_core::{ParseOutcome, PayloadKind, StructuredOutputParser};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Parse command handler
pub fn cmd_parse(kind: PayloadKind, file: &Path, format: OutputFormat) -> Result<(), CliError> {
    let raw = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file)?
    };

    let outcome = StructuredOutputParser::new().parse(&raw, kind);
    match format {
        OutputFormat::Table => print_table(&outcome),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }
    Ok(())
}

fn print_table(outcome: &ParseOutcome) {
    for record in &outcome.records {
        println!("{:<16} {}", record.kind(), record.record_key());
    }
    for diagnostic in &outcome.diagnostics {
        eprintln!("warning: {diagnostic}");
    }
    println!(
        "{} record(s), {} diagnostic(s)",
        outcome.records.len(),
        outcome.diagnostics.len()
    );
}
