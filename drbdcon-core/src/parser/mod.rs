//! Parsing of inspection output into typed records
//!
//! The payload kind is always declared by the caller; the parser never
//! guesses. Line-oriented kinds go through the `key: value` block parser,
//! tree-structured kinds through the XML reader. Malformed input degrades
//! to fewer records plus [`Diagnostic`]s, never to an error or panic.

mod line;
mod records;
mod xml;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use records::{
    BlockDevice, DrbdVolumeConfig, DrbdVolumeStatus, HOST_FACTS_KEY, ParsedRecord, RecordKind,
    VNC_BASE_PORT, VmDisk, VmDomain, VmFilesystem, VmNetworkInterface, VncEndpoint, VncPort,
    parse_flag,
};

/// Declared format of an inspection payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    /// `key: value` host facts
    HostInfo,
    /// `key: value` blocks, one per block device
    BlockDevices,
    /// `key: value` blocks, one per DRBD volume
    DrbdStatus,
    /// `key: value` blocks of `domain` and `display`
    VncStatus,
    /// libvirt domain XML, one `<domain>` or many under any root
    DomainXml,
    /// `drbdadm dump-xml` output
    DrbdConfigXml,
}

impl PayloadKind {
    /// Every payload kind
    pub const ALL: [Self; 6] = [
        Self::HostInfo,
        Self::BlockDevices,
        Self::DrbdStatus,
        Self::VncStatus,
        Self::DomainXml,
        Self::DrbdConfigXml,
    ];

    /// Record kinds a payload of this kind can produce
    ///
    /// A refresh replaces exactly these kinds for the host, so an empty
    /// payload clears them.
    #[must_use]
    pub const fn record_kinds(self) -> &'static [RecordKind] {
        match self {
            Self::HostInfo => &[RecordKind::HostFacts],
            Self::BlockDevices => &[RecordKind::BlockDevice],
            Self::DrbdStatus => &[RecordKind::DrbdVolumeStatus],
            Self::VncStatus => &[RecordKind::VncEndpoint],
            Self::DomainXml => &[
                RecordKind::VmDomain,
                RecordKind::VmDisk,
                RecordKind::VmFilesystem,
                RecordKind::VmNetworkInterface,
            ],
            Self::DrbdConfigXml => &[RecordKind::DrbdVolumeConfig],
        }
    }

    /// Returns true for XML payloads
    #[must_use]
    pub const fn is_tree(self) -> bool {
        matches!(self, Self::DomainXml | Self::DrbdConfigXml)
    }

    /// Stable kebab-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HostInfo => "host-info",
            Self::BlockDevices => "block-devices",
            Self::DrbdStatus => "drbd-status",
            Self::VncStatus => "vnc-status",
            Self::DomainXml => "domain-xml",
            Self::DrbdConfigXml => "drbd-config-xml",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| format!("unknown payload kind: {s}"))
    }
}

/// A problem found while parsing; the affected part produced no record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Payload kind being parsed
    pub kind: PayloadKind,
    /// 1-based line number for line-oriented payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Human-readable description
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic for the whole payload
    #[must_use]
    pub fn new(kind: PayloadKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            line: None,
            message: message.into(),
        }
    }

    /// Creates a diagnostic for one line
    #[must_use]
    pub fn at_line(kind: PayloadKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            line: Some(line),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "malformed {} payload, line {line}: {}", self.kind, self.message),
            None => write!(f, "malformed {} payload: {}", self.kind, self.message),
        }
    }
}

/// Records and diagnostics of one parse
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseOutcome {
    /// Records in payload order
    pub records: Vec<ParsedRecord>,
    /// Problems found along the way
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutcome {
    /// Outcome of a payload rejected as a whole
    #[must_use]
    pub fn rejected(diagnostic: Diagnostic) -> Self {
        Self {
            records: Vec::new(),
            diagnostics: vec![diagnostic],
        }
    }

    /// Returns true if nothing went wrong
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Parses a payload of the declared kind.
#[must_use]
pub fn parse(raw: &str, kind: PayloadKind) -> ParseOutcome {
    let outcome = if kind.is_tree() {
        xml::parse(raw, kind)
    } else {
        line::parse(raw, kind)
    };
    for diagnostic in &outcome.diagnostics {
        tracing::debug!(kind = %kind, line = ?diagnostic.line, message = %diagnostic.message, "Payload diagnostic");
    }
    tracing::trace!(kind = %kind, records = outcome.records.len(), "Parsed payload");
    outcome
}

/// Stateless parser object for callers that hold a parser handle
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredOutputParser;

impl StructuredOutputParser {
    /// Creates a parser
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses a payload of the declared kind.
    #[must_use]
    pub fn parse(&self, raw: &str, kind: PayloadKind) -> ParseOutcome {
        parse(raw, kind)
    }
}
