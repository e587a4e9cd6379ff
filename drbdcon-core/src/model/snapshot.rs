//! Immutable point-in-time view of the domain model.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::parser::{
    DrbdVolumeConfig, HOST_FACTS_KEY, ParsedRecord, RecordKind, VmDomain, VncPort,
};
use crate::models::HostFacts;

/// Records of one host, grouped by kind and keyed by `record_key()`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostRecords {
    kinds: BTreeMap<RecordKind, BTreeMap<String, ParsedRecord>>,
}

impl HostRecords {
    /// Replaces every record of `kind`
    pub(super) fn replace_kind(&mut self, kind: RecordKind, records: BTreeMap<String, ParsedRecord>) {
        if records.is_empty() {
            self.kinds.remove(&kind);
        } else {
            self.kinds.insert(kind, records);
        }
    }

    /// Adds or replaces one record
    pub(super) fn upsert(&mut self, record: ParsedRecord) {
        self.kinds
            .entry(record.kind())
            .or_default()
            .insert(record.record_key(), record);
    }

    /// Records of one kind, ordered by key
    pub fn records(&self, kind: RecordKind) -> impl Iterator<Item = &ParsedRecord> {
        self.kinds.get(&kind).into_iter().flat_map(BTreeMap::values)
    }

    /// Looks up one record by kind and key
    #[must_use]
    pub fn get(&self, kind: RecordKind, key: &str) -> Option<&ParsedRecord> {
        self.kinds.get(&kind).and_then(|m| m.get(key))
    }

    /// Number of records of `kind`
    #[must_use]
    pub fn count(&self, kind: RecordKind) -> usize {
        self.kinds.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Total number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.values().map(BTreeMap::len).sum()
    }

    /// Returns true if the host has no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Facts from the last host-info inspection
    #[must_use]
    pub fn facts(&self) -> Option<&HostFacts> {
        match self.get(RecordKind::HostFacts, HOST_FACTS_KEY) {
            Some(ParsedRecord::HostFacts(facts)) => Some(facts),
            _ => None,
        }
    }

    fn drbd_configs(&self) -> impl Iterator<Item = &DrbdVolumeConfig> {
        self.records(RecordKind::DrbdVolumeConfig)
            .filter_map(|r| match r {
                ParsedRecord::DrbdVolumeConfig(c) => Some(c),
                _ => None,
            })
    }

    /// Returns true if `node` (a DRBD node name) names this host
    fn is_node(&self, host: &str, node: &str) -> bool {
        node == host
            || self
                .facts()
                .and_then(|f| f.hostname.as_deref())
                .is_some_and(|h| h == node || h.split('.').next() == Some(node))
    }
}

/// Backing device of a DRBD volume on the peer side of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerBlockDevice {
    /// DRBD node name of the peer
    pub node: String,
    /// Host in the model that the node name refers to, if known
    pub host: Option<String>,
    /// Volume number
    pub volume: u32,
    /// Backing block device on the peer
    pub disk: Option<String>,
    /// DRBD device path on the peer
    pub device: Option<String>,
}

/// Immutable view of the whole model
///
/// Snapshots share unchanged host entries with their successors, so taking
/// and keeping one is cheap.
#[derive(Debug, Clone, Default)]
pub struct ModelSnapshot {
    pub(super) generation: u64,
    pub(super) hosts: BTreeMap<String, Arc<HostRecords>>,
}

impl ModelSnapshot {
    /// Commit counter this snapshot was taken at
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Names of the hosts that have records, sorted
    pub fn host_names(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    /// Records of one host
    #[must_use]
    pub fn host(&self, host: &str) -> Option<&HostRecords> {
        self.hosts.get(host).map(AsRef::as_ref)
    }

    /// Records of one kind on one host
    pub fn records(&self, host: &str, kind: RecordKind) -> impl Iterator<Item = &ParsedRecord> {
        self.host(host).into_iter().flat_map(move |h| h.records(kind))
    }

    /// Total number of records across hosts
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.values().map(|h| h.len()).sum()
    }

    /// Returns true if no host has records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Domains defined on one host
    #[must_use]
    pub fn vm_domains(&self, host: &str) -> Vec<&VmDomain> {
        self.records(host, RecordKind::VmDomain)
            .filter_map(|r| match r {
                ParsedRecord::VmDomain(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    /// Hosts whose libvirt configuration defines the domain `name`
    #[must_use]
    pub fn hosts_defining_domain(&self, name: &str) -> Vec<&str> {
        self.hosts
            .iter()
            .filter(|(_, records)| records.get(RecordKind::VmDomain, name).is_some())
            .map(|(host, _)| host.as_str())
            .collect()
    }

    /// Hosts that have configuration or status for DRBD `resource`
    #[must_use]
    pub fn drbd_resource_hosts(&self, resource: &str) -> Vec<&str> {
        self.hosts
            .iter()
            .filter(|(_, records)| {
                records.drbd_configs().any(|c| c.resource == resource)
                    || records
                        .records(RecordKind::DrbdVolumeStatus)
                        .any(|r| matches!(r, ParsedRecord::DrbdVolumeStatus(s) if s.resource == resource))
            })
            .map(|(host, _)| host.as_str())
            .collect()
    }

    /// Backing devices of `resource` on the nodes other than `from_host`
    ///
    /// The configuration reported by `from_host` is consulted first; volumes
    /// it does not describe are taken from the other hosts' configuration.
    #[must_use]
    pub fn drbd_peer_block_device(&self, resource: &str, from_host: &str) -> Vec<PeerBlockDevice> {
        let empty = HostRecords::default();
        let own = self.host(from_host).unwrap_or(&empty);

        let sources = std::iter::once(own).chain(
            self.hosts
                .iter()
                .filter(|(name, _)| name.as_str() != from_host)
                .map(|(_, records)| records.as_ref()),
        );

        let mut peers: BTreeMap<(String, u32), PeerBlockDevice> = BTreeMap::new();
        for records in sources {
            for config in records.drbd_configs() {
                if config.resource != resource || own.is_node(from_host, &config.node) {
                    continue;
                }
                peers
                    .entry((config.node.clone(), config.volume))
                    .or_insert_with(|| PeerBlockDevice {
                        node: config.node.clone(),
                        host: self.host_for_node(&config.node),
                        volume: config.volume,
                        disk: config.disk.clone(),
                        device: config.device.clone(),
                    });
            }
        }
        peers.into_values().collect()
    }

    /// Finds the model host a DRBD node name refers to
    fn host_for_node(&self, node: &str) -> Option<String> {
        self.hosts
            .iter()
            .find(|(name, records)| records.is_node(name, node))
            .map(|(name, _)| name.clone())
    }

    /// VNC port of a domain; the live endpoint wins over the definition
    #[must_use]
    pub fn vnc_port(&self, host: &str, domain: &str) -> VncPort {
        let Some(records) = self.host(host) else {
            return VncPort::Unknown;
        };
        if let Some(ParsedRecord::VncEndpoint(endpoint)) =
            records.get(RecordKind::VncEndpoint, domain)
        {
            return endpoint.port;
        }
        match records.get(RecordKind::VmDomain, domain) {
            Some(ParsedRecord::VmDomain(d)) => d.vnc_port.unwrap_or_default(),
            _ => VncPort::Unknown,
        }
    }

    /// Record kinds present on any host
    #[must_use]
    pub fn kinds_present(&self) -> BTreeSet<RecordKind> {
        self.hosts
            .values()
            .flat_map(|h| h.kinds.keys().copied())
            .collect()
    }
}

impl Serialize for ModelSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("generation", &self.generation)?;
        let hosts: BTreeMap<&str, &HostRecords> = self
            .hosts
            .iter()
            .map(|(name, records)| (name.as_str(), records.as_ref()))
            .collect();
        map.serialize_entry("hosts", &hosts)?;
        map.end()
    }
}
