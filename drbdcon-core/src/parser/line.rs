//! Line-oriented `key: value` payloads.
//!
//! Blank lines separate records. Keys are matched case-insensitively with
//! `_` and `-` treated alike; the value is everything after the first `:`.

use std::collections::HashMap;

use super::records::{
    BlockDevice, DrbdVolumeStatus, ParsedRecord, VncEndpoint, VncPort,
};
use super::{Diagnostic, ParseOutcome, PayloadKind};
use crate::models::HostFacts;

/// One blank-line separated block of `key: value` pairs
#[derive(Debug, Default)]
struct Block {
    /// 1-based line number of the first line of the block
    line: usize,
    fields: HashMap<String, String>,
}

impl Block {
    /// Returns a trimmed non-empty value
    fn get(&self, key: &str) -> Option<String> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('_', "-")
}

/// Splits a payload into blocks, reporting lines that are not `key: value`.
fn split_blocks(raw: &str, kind: PayloadKind, diagnostics: &mut Vec<Diagnostic>) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;

    for (idx, line) in raw.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            blocks.extend(current.take());
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            diagnostics.push(Diagnostic::at_line(kind, line_no, "line is not `key: value`"));
            continue;
        };
        let key = normalize_key(key);
        if key.is_empty() {
            diagnostics.push(Diagnostic::at_line(kind, line_no, "empty key"));
            continue;
        }
        current
            .get_or_insert_with(|| Block {
                line: line_no,
                fields: HashMap::new(),
            })
            .fields
            .insert(key, value.to_string());
    }
    blocks.extend(current);
    blocks
}

/// Parses a line-oriented payload of the given kind.
pub(super) fn parse(raw: &str, kind: PayloadKind) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let blocks = split_blocks(raw, kind, &mut outcome.diagnostics);

    for block in blocks {
        let record = match kind {
            PayloadKind::HostInfo => host_facts(&block),
            PayloadKind::BlockDevices => block_device(&block),
            PayloadKind::DrbdStatus => drbd_status(&block),
            PayloadKind::VncStatus => vnc_endpoint(&block),
            PayloadKind::DomainXml | PayloadKind::DrbdConfigXml => {
                Err("payload is not line-oriented")
            }
        };
        match record {
            Ok(Some(record)) => outcome.records.push(record),
            Ok(None) => {}
            Err(message) => outcome
                .diagnostics
                .push(Diagnostic::at_line(kind, block.line, message)),
        }
    }
    outcome
}

type BlockResult = Result<Option<ParsedRecord>, &'static str>;

fn host_facts(block: &Block) -> BlockResult {
    let facts = HostFacts {
        hostname: block.get("hostname"),
        kernel_version: block.get("kernel-version"),
        drbd_version: block.get("drbd-version"),
        arch: block.get("arch"),
        distribution: block.get("distribution"),
        distribution_version: block.get("distribution-version"),
    };
    if facts == HostFacts::default() {
        return Ok(None);
    }
    Ok(Some(ParsedRecord::HostFacts(facts)))
}

fn block_device(block: &Block) -> BlockResult {
    let name = block
        .get("device")
        .or_else(|| block.get("name"))
        .ok_or("block device without `device`")?;
    Ok(Some(ParsedRecord::BlockDevice(BlockDevice {
        name,
        size_bytes: block.get_parsed("size"),
        device_type: block.get("type"),
        fstype: block.get("fstype"),
        mountpoint: block.get("mountpoint"),
    })))
}

fn drbd_status(block: &Block) -> BlockResult {
    let resource = block.get("resource").ok_or("DRBD status without `resource`")?;
    let volume = match block.get("volume") {
        Some(v) => v.parse().map_err(|_| "DRBD volume is not a number")?,
        None => 0,
    };
    Ok(Some(ParsedRecord::DrbdVolumeStatus(DrbdVolumeStatus {
        resource,
        volume,
        minor: block.get_parsed("minor"),
        role: block.get("role"),
        disk_state: block.get("disk"),
        peer_disk_state: block.get("peer-disk"),
        replication: block.get("replication"),
        sync_percent: block.get_parsed("sync-percent"),
    })))
}

fn vnc_endpoint(block: &Block) -> BlockResult {
    let domain = block.get("domain").ok_or("VNC status without `domain`")?;
    let port = block
        .get("display")
        .map_or(VncPort::Unknown, |d| VncPort::from_display(&d));
    Ok(Some(ParsedRecord::VncEndpoint(VncEndpoint { domain, port })))
}
