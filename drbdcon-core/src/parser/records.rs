//! Typed records produced by inspection payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::HostFacts;

/// Base TCP port of VNC display `:0`
pub const VNC_BASE_PORT: u16 = 5900;

/// Key of the single host-facts record of a host
pub const HOST_FACTS_KEY: &str = "facts";

/// TCP port of a VNC server
///
/// A port that could not be determined stays `Unknown`; it is never
/// reported as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VncPort {
    /// Port is known
    Known(u16),
    /// Port could not be determined (no display, autoport, garbage)
    #[default]
    Unknown,
}

impl VncPort {
    /// Converts a `virsh vncdisplay` value such as `:4` or `127.0.0.1:4`.
    #[must_use]
    pub fn from_display(display: &str) -> Self {
        let display = display.trim();
        let Some((_, number)) = display.rsplit_once(':') else {
            return Self::Unknown;
        };
        number
            .trim()
            .parse::<u16>()
            .ok()
            .and_then(|n| VNC_BASE_PORT.checked_add(n))
            .map_or(Self::Unknown, Self::Known)
    }

    /// Converts a libvirt `<graphics port="...">` attribute.
    ///
    /// Only strictly positive values are real ports; `-1` means autoport.
    #[must_use]
    pub fn from_graphics_port(port: &str) -> Self {
        match port.trim().parse::<i64>() {
            Ok(p) if p > 0 => u16::try_from(p).map_or(Self::Unknown, Self::Known),
            _ => Self::Unknown,
        }
    }

    /// Returns the port number if known
    #[must_use]
    pub const fn port(self) -> Option<u16> {
        match self {
            Self::Known(p) => Some(p),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for VncPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(p) => write!(f, "{p}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Interprets a boolean-like field: `yes` and `running` (any case) are true.
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("yes") || value.eq_ignore_ascii_case("running")
}

/// A block device reported by `lsblk`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDevice {
    /// Device path, e.g. `/dev/sdb1`
    pub name: String,
    /// Size in bytes
    pub size_bytes: Option<u64>,
    /// Device type (`disk`, `part`, `lvm`, ...)
    pub device_type: Option<String>,
    /// Filesystem type
    pub fstype: Option<String>,
    /// Mount point
    pub mountpoint: Option<String>,
}

/// One volume of a DRBD resource on one node, from the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrbdVolumeConfig {
    /// Resource name
    pub resource: String,
    /// DRBD node name (`on <node>`), normally the node's hostname
    pub node: String,
    /// Volume number
    pub volume: u32,
    /// DRBD minor number
    pub minor: Option<u32>,
    /// DRBD device path, e.g. `/dev/drbd0`
    pub device: Option<String>,
    /// Backing block device
    pub disk: Option<String>,
    /// Metadata location (`internal` or a device)
    pub meta_disk: Option<String>,
    /// Replication address of the node
    pub address: Option<String>,
    /// Replication port of the node
    pub port: Option<u16>,
}

/// Live state of one DRBD volume on the reporting host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrbdVolumeStatus {
    /// Resource name
    pub resource: String,
    /// Volume number
    pub volume: u32,
    /// DRBD minor number
    pub minor: Option<u32>,
    /// Resource role (`Primary`/`Secondary`)
    pub role: Option<String>,
    /// Local disk state
    pub disk_state: Option<String>,
    /// Peer disk state
    pub peer_disk_state: Option<String>,
    /// Replication state (`Established`, `SyncSource`, ...)
    pub replication: Option<String>,
    /// Resynchronisation progress in percent
    pub sync_percent: Option<f64>,
}

/// A libvirt domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmDomain {
    /// Domain name
    pub name: String,
    /// Domain UUID
    pub uuid: Option<String>,
    /// Whether the domain is running
    pub running: bool,
    /// Whether the domain starts with the host
    pub autostart: bool,
    /// Configured memory in KiB
    pub memory_kib: Option<u64>,
    /// Number of virtual CPUs
    pub vcpus: Option<u32>,
    /// VNC port from the domain definition
    pub vnc_port: Option<VncPort>,
}

/// A host directory shared into a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmFilesystem {
    /// Owning domain
    pub domain: String,
    /// Host directory
    pub source: Option<String>,
    /// Mount tag inside the guest
    pub target: String,
    /// Driver type
    pub driver: Option<String>,
}

/// A disk attached to a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmDisk {
    /// Owning domain
    pub domain: String,
    /// Guest device name, e.g. `vda`
    pub target: String,
    /// Device kind (`disk`, `cdrom`, ...)
    pub device: Option<String>,
    /// Source file, block device or volume
    pub source: Option<String>,
    /// Guest bus
    pub bus: Option<String>,
    /// Image format
    pub driver_type: Option<String>,
}

/// A network interface of a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmNetworkInterface {
    /// Owning domain
    pub domain: String,
    /// Position among the domain's interfaces
    pub index: usize,
    /// MAC address
    pub mac: Option<String>,
    /// Interface type (`bridge`, `network`, ...)
    pub interface_type: Option<String>,
    /// Bridge, network or device the interface is attached to
    pub source: Option<String>,
    /// NIC model
    pub model: Option<String>,
}

/// Live VNC endpoint of a running domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VncEndpoint {
    /// Domain name
    pub domain: String,
    /// Listening port
    pub port: VncPort,
}

/// Variant tag of [`ParsedRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// [`HostFacts`]
    HostFacts,
    /// [`BlockDevice`]
    BlockDevice,
    /// [`DrbdVolumeConfig`]
    DrbdVolumeConfig,
    /// [`DrbdVolumeStatus`]
    DrbdVolumeStatus,
    /// [`VmDomain`]
    VmDomain,
    /// [`VmFilesystem`]
    VmFilesystem,
    /// [`VmDisk`]
    VmDisk,
    /// [`VmNetworkInterface`]
    VmNetworkInterface,
    /// [`VncEndpoint`]
    VncEndpoint,
}

impl RecordKind {
    /// Every kind, in display order
    pub const ALL: [Self; 9] = [
        Self::HostFacts,
        Self::BlockDevice,
        Self::DrbdVolumeConfig,
        Self::DrbdVolumeStatus,
        Self::VmDomain,
        Self::VmFilesystem,
        Self::VmDisk,
        Self::VmNetworkInterface,
        Self::VncEndpoint,
    ];

    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HostFacts => "host_facts",
            Self::BlockDevice => "block_device",
            Self::DrbdVolumeConfig => "drbd_volume_config",
            Self::DrbdVolumeStatus => "drbd_volume_status",
            Self::VmDomain => "vm_domain",
            Self::VmFilesystem => "vm_filesystem",
            Self::VmDisk => "vm_disk",
            Self::VmNetworkInterface => "vm_network_interface",
            Self::VncEndpoint => "vnc_endpoint",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed entity parsed from inspection output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedRecord {
    /// Host facts
    HostFacts(HostFacts),
    /// Block device
    BlockDevice(BlockDevice),
    /// DRBD volume configuration
    DrbdVolumeConfig(DrbdVolumeConfig),
    /// DRBD volume status
    DrbdVolumeStatus(DrbdVolumeStatus),
    /// libvirt domain
    VmDomain(VmDomain),
    /// Shared filesystem of a domain
    VmFilesystem(VmFilesystem),
    /// Disk of a domain
    VmDisk(VmDisk),
    /// Network interface of a domain
    VmNetworkInterface(VmNetworkInterface),
    /// Live VNC endpoint
    VncEndpoint(VncEndpoint),
}

impl ParsedRecord {
    /// Variant tag
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::HostFacts(_) => RecordKind::HostFacts,
            Self::BlockDevice(_) => RecordKind::BlockDevice,
            Self::DrbdVolumeConfig(_) => RecordKind::DrbdVolumeConfig,
            Self::DrbdVolumeStatus(_) => RecordKind::DrbdVolumeStatus,
            Self::VmDomain(_) => RecordKind::VmDomain,
            Self::VmFilesystem(_) => RecordKind::VmFilesystem,
            Self::VmDisk(_) => RecordKind::VmDisk,
            Self::VmNetworkInterface(_) => RecordKind::VmNetworkInterface,
            Self::VncEndpoint(_) => RecordKind::VncEndpoint,
        }
    }

    /// Natural identifier, unique per host and kind and stable across
    /// re-parses of the same entity.
    #[must_use]
    pub fn record_key(&self) -> String {
        match self {
            Self::HostFacts(_) => HOST_FACTS_KEY.to_string(),
            Self::BlockDevice(d) => d.name.clone(),
            Self::DrbdVolumeConfig(c) => format!("{}/{}/{}", c.resource, c.node, c.volume),
            Self::DrbdVolumeStatus(s) => format!("{}/{}", s.resource, s.volume),
            Self::VmDomain(d) => d.name.clone(),
            Self::VmFilesystem(fs) => format!("{}/{}", fs.domain, fs.target),
            Self::VmDisk(d) => format!("{}/{}", d.domain, d.target),
            Self::VmNetworkInterface(i) => match i.mac {
                Some(ref mac) => format!("{}/{}", i.domain, mac.to_lowercase()),
                None => format!("{}/#{}", i.domain, i.index),
            },
            Self::VncEndpoint(v) => v.domain.clone(),
        }
    }
}
