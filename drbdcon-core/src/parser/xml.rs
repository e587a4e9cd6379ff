//! Tree-structured payloads: libvirt domain XML and `drbdadm dump-xml`.
//!
//! The document is streamed through a [`quick_xml::Reader`] and fed to a
//! handler that picks out a fixed set of elements and attributes. A
//! document that is not well formed, or that ends with unclosed elements,
//! yields no records at all.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};

use super::records::{
    DrbdVolumeConfig, ParsedRecord, VmDisk, VmDomain, VmFilesystem, VmNetworkInterface,
    VncPort, parse_flag,
};
use super::{Diagnostic, ParseOutcome, PayloadKind};

type Attrs = HashMap<String, String>;

/// Receives elements in document order
trait TreeHandler {
    /// An element opened; `path` holds its ancestors.
    fn open(&mut self, name: &str, attrs: &Attrs, path: &[String]);
    /// An element closed with its trimmed text content.
    fn close(&mut self, name: &str, text: &str, path: &[String]);
    /// Returns the collected records and non-fatal warnings.
    fn finish(self) -> (Vec<ParsedRecord>, Vec<String>);
}

/// Parses a tree-structured payload of the given kind.
pub(super) fn parse(raw: &str, kind: PayloadKind) -> ParseOutcome {
    match kind {
        PayloadKind::DomainXml => walk(raw, kind, DomainHandler::default()),
        PayloadKind::DrbdConfigXml => walk(raw, kind, DrbdConfigHandler::default()),
        PayloadKind::HostInfo
        | PayloadKind::BlockDevices
        | PayloadKind::DrbdStatus
        | PayloadKind::VncStatus => {
            ParseOutcome::rejected(Diagnostic::new(kind, "payload is not XML"))
        }
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn attributes(e: &BytesStart<'_>) -> Attrs {
    e.attributes()
        .flatten()
        .map(|attr| {
            let value = attr.unescape_value().map_or_else(
                |_| String::from_utf8_lossy(&attr.value).to_string(),
                |v| v.into_owned(),
            );
            (String::from_utf8_lossy(attr.key.as_ref()).to_string(), value)
        })
        .collect()
}

/// Resolves `&name;` or `&#N;` to its text; unknown entities stay literal.
fn resolve_reference(reference: &BytesRef<'_>) -> String {
    let name = String::from_utf8_lossy(reference).to_string();
    if let Ok(Some(ch)) = reference.resolve_char_ref() {
        return ch.to_string();
    }
    resolve_predefined_entity(&name).map_or_else(|| format!("&{name};"), str::to_string)
}

fn attr(attrs: &Attrs, key: &str) -> Option<String> {
    attrs
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn first_attr(attrs: &Attrs, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| attr(attrs, k))
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

fn walk<H: TreeHandler>(raw: &str, kind: PayloadKind, mut handler: H) -> ParseOutcome {
    let raw = raw.trim_start_matches('\u{feff}');
    // Text is trimmed per element on close; trimming each event would eat
    // the spaces around entity references.
    let mut reader = Reader::from_str(raw);

    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut saw_element = false;
    let mut stray_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = element_name(&e);
                handler.open(&name, &attributes(&e), &path);
                path.push(name);
                text.clear();
                saw_element = true;
            }
            Ok(Event::Empty(e)) => {
                let name = element_name(&e);
                handler.open(&name, &attributes(&e), &path);
                handler.close(&name, "", &path);
                saw_element = true;
            }
            Ok(Event::Text(e)) => {
                if !path.is_empty() {
                    text.push_str(&String::from_utf8_lossy(&e));
                } else if !e.iter().all(u8::is_ascii_whitespace) {
                    stray_text = true;
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if path.is_empty() {
                    stray_text = true;
                } else {
                    text.push_str(&resolve_reference(&e));
                }
            }
            Ok(Event::CData(e)) => text.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::End(_)) => {
                if let Some(name) = path.pop() {
                    handler.close(&name, text.trim(), &path);
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return ParseOutcome::rejected(Diagnostic::new(
                    kind,
                    format!("malformed XML at byte {}: {e}", reader.buffer_position()),
                ));
            }
            _ => {} // Decl, PI, Comment, DocType
        }
    }

    if let Some(open) = path.last() {
        return ParseOutcome::rejected(Diagnostic::new(
            kind,
            format!("truncated XML: <{open}> is never closed"),
        ));
    }
    if stray_text && !saw_element {
        return ParseOutcome::rejected(Diagnostic::new(kind, "no XML element found"));
    }

    let (records, warnings) = handler.finish();
    ParseOutcome {
        records,
        diagnostics: warnings
            .into_iter()
            .map(|w| Diagnostic::new(kind, w))
            .collect(),
    }
}

/// Converts a libvirt memory value to KiB.
fn memory_to_kib(value: &str, unit: Option<&str>) -> Option<u64> {
    let value: u64 = value.trim().parse().ok()?;
    match unit.unwrap_or("KiB").to_ascii_lowercase().as_str() {
        "b" | "bytes" => Some(value / 1024),
        "k" | "kib" => Some(value),
        "kb" => value.checked_mul(1000).map(|v| v / 1024),
        "m" | "mib" => value.checked_mul(1024),
        "mb" => value.checked_mul(1_000_000).map(|v| v / 1024),
        "g" | "gib" => value.checked_mul(1024 * 1024),
        "gb" => value.checked_mul(1_000_000_000).map(|v| v / 1024),
        "t" | "tib" => value.checked_mul(1024 * 1024 * 1024),
        _ => None,
    }
}

/// Attributes of a `<vm state=".." autostart="..">` wrapper element
#[derive(Debug, Default)]
struct VmWrapper {
    running: Option<bool>,
    autostart: bool,
}

#[derive(Debug)]
enum Device {
    Disk(VmDisk),
    Filesystem(VmFilesystem),
    Interface(VmNetworkInterface),
}

#[derive(Debug, Default)]
struct DomainBuilder {
    name: String,
    uuid: Option<String>,
    has_id: bool,
    memory_unit: Option<String>,
    memory_kib: Option<u64>,
    vcpus: Option<u32>,
    vnc_port: Option<VncPort>,
    disks: Vec<VmDisk>,
    filesystems: Vec<VmFilesystem>,
    interfaces: Vec<VmNetworkInterface>,
}

#[derive(Debug, Default)]
struct DomainHandler {
    wrapper: Option<VmWrapper>,
    domain: Option<DomainBuilder>,
    device: Option<Device>,
    records: Vec<ParsedRecord>,
    warnings: Vec<String>,
}

impl DomainHandler {
    fn finish_domain(&mut self, builder: DomainBuilder) {
        if builder.name.is_empty() {
            self.warnings.push("domain without <name> skipped".to_string());
            return;
        }
        let wrapper = self.wrapper.as_ref();
        let name = builder.name;
        self.records.push(ParsedRecord::VmDomain(VmDomain {
            name: name.clone(),
            uuid: builder.uuid,
            running: wrapper
                .and_then(|w| w.running)
                .unwrap_or(builder.has_id),
            autostart: wrapper.is_some_and(|w| w.autostart),
            memory_kib: builder.memory_kib,
            vcpus: builder.vcpus,
            vnc_port: builder.vnc_port,
        }));

        for mut disk in builder.disks {
            if disk.target.is_empty() {
                self.warnings
                    .push(format!("disk of {name} without target skipped"));
                continue;
            }
            disk.domain.clone_from(&name);
            self.records.push(ParsedRecord::VmDisk(disk));
        }
        for mut fs in builder.filesystems {
            if fs.target.is_empty() {
                self.warnings
                    .push(format!("filesystem of {name} without target skipped"));
                continue;
            }
            fs.domain.clone_from(&name);
            self.records.push(ParsedRecord::VmFilesystem(fs));
        }
        for (index, mut nic) in builder.interfaces.into_iter().enumerate() {
            nic.domain.clone_from(&name);
            nic.index = index;
            self.records.push(ParsedRecord::VmNetworkInterface(nic));
        }
    }

    fn open_device(&mut self, name: &str, attrs: &Attrs) {
        self.device = match name {
            "disk" => Some(Device::Disk(VmDisk {
                domain: String::new(),
                target: String::new(),
                device: attr(attrs, "device"),
                source: None,
                bus: None,
                driver_type: None,
            })),
            "filesystem" => Some(Device::Filesystem(VmFilesystem {
                domain: String::new(),
                source: None,
                target: String::new(),
                driver: None,
            })),
            "interface" => Some(Device::Interface(VmNetworkInterface {
                domain: String::new(),
                index: 0,
                mac: None,
                interface_type: attr(attrs, "type"),
                source: None,
                model: None,
            })),
            _ => None,
        };
    }

    fn device_child(&mut self, name: &str, attrs: &Attrs) {
        match (self.device.as_mut(), name) {
            (Some(Device::Disk(disk)), "source") => {
                disk.source = first_attr(attrs, &["file", "dev", "volume", "name"]);
            }
            (Some(Device::Disk(disk)), "target") => {
                disk.target = attr(attrs, "dev").unwrap_or_default();
                disk.bus = attr(attrs, "bus");
            }
            (Some(Device::Disk(disk)), "driver") => disk.driver_type = attr(attrs, "type"),
            (Some(Device::Filesystem(fs)), "source") => {
                fs.source = first_attr(attrs, &["dir", "name", "file"]);
            }
            (Some(Device::Filesystem(fs)), "target") => {
                fs.target = attr(attrs, "dir").unwrap_or_default();
            }
            (Some(Device::Filesystem(fs)), "driver") => fs.driver = attr(attrs, "type"),
            (Some(Device::Interface(nic)), "mac") => nic.mac = attr(attrs, "address"),
            (Some(Device::Interface(nic)), "source") => {
                nic.source = first_attr(attrs, &["bridge", "network", "dev"]);
            }
            (Some(Device::Interface(nic)), "model") => nic.model = attr(attrs, "type"),
            _ => {}
        }
    }
}

impl TreeHandler for DomainHandler {
    fn open(&mut self, name: &str, attrs: &Attrs, path: &[String]) {
        let parent = path.last().map(String::as_str);
        match (name, parent) {
            ("vm", _) => {
                self.wrapper = Some(VmWrapper {
                    running: attr(attrs, "state").map(|s| parse_flag(&s)),
                    autostart: attr(attrs, "autostart").is_some_and(|s| parse_flag(&s)),
                });
            }
            ("domain", _) => {
                self.domain = Some(DomainBuilder {
                    has_id: attr(attrs, "id").is_some_and(|id| id != "-1"),
                    ..DomainBuilder::default()
                });
            }
            ("memory", Some("domain")) => {
                if let Some(domain) = self.domain.as_mut() {
                    domain.memory_unit = attr(attrs, "unit");
                }
            }
            ("graphics", Some("devices")) => {
                if let Some(domain) = self.domain.as_mut()
                    && domain.vnc_port.is_none()
                    && attr(attrs, "type").is_some_and(|t| t.eq_ignore_ascii_case("vnc"))
                {
                    domain.vnc_port = Some(
                        attr(attrs, "port")
                            .map_or(VncPort::Unknown, |p| VncPort::from_graphics_port(&p)),
                    );
                }
            }
            (_, Some("devices")) if self.domain.is_some() => self.open_device(name, attrs),
            (_, Some("disk" | "filesystem" | "interface")) => self.device_child(name, attrs),
            _ => {}
        }
    }

    fn close(&mut self, name: &str, text: &str, path: &[String]) {
        let parent = path.last().map(String::as_str);
        match (name, parent) {
            ("vm", _) => self.wrapper = None,
            ("domain", _) => {
                if let Some(builder) = self.domain.take() {
                    self.finish_domain(builder);
                }
            }
            ("disk" | "filesystem" | "interface", Some("devices")) => {
                if let (Some(domain), Some(device)) = (self.domain.as_mut(), self.device.take()) {
                    match device {
                        Device::Disk(d) => domain.disks.push(d),
                        Device::Filesystem(fs) => domain.filesystems.push(fs),
                        Device::Interface(nic) => domain.interfaces.push(nic),
                    }
                }
            }
            (_, Some("domain")) => {
                let Some(domain) = self.domain.as_mut() else {
                    return;
                };
                match name {
                    "name" => domain.name = text.to_string(),
                    "uuid" => domain.uuid = non_empty(text),
                    "memory" => {
                        domain.memory_kib = memory_to_kib(text, domain.memory_unit.as_deref());
                    }
                    "vcpu" => domain.vcpus = text.parse().ok(),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> (Vec<ParsedRecord>, Vec<String>) {
        (self.records, self.warnings)
    }
}

#[derive(Debug)]
struct DrbdNode {
    name: String,
    address: Option<String>,
    port: Option<u16>,
    volumes: Vec<DrbdVolumeConfig>,
    /// Volume 0 of configurations that put the device directly under `<host>`
    implicit: Option<DrbdVolumeConfig>,
}

#[derive(Debug, Default)]
struct DrbdConfigHandler {
    resource: Option<String>,
    node: Option<DrbdNode>,
    volume: Option<DrbdVolumeConfig>,
    records: Vec<ParsedRecord>,
    warnings: Vec<String>,
}

fn empty_volume(resource: &str, node: &str, volume: u32) -> DrbdVolumeConfig {
    DrbdVolumeConfig {
        resource: resource.to_string(),
        node: node.to_string(),
        volume,
        minor: None,
        device: None,
        disk: None,
        meta_disk: None,
        address: None,
        port: None,
    }
}

impl DrbdConfigHandler {
    /// Volume that `<device>`, `<disk>` and `<meta-disk>` currently apply to
    fn target(&mut self) -> Option<&mut DrbdVolumeConfig> {
        if self.volume.is_some() {
            return self.volume.as_mut();
        }
        let resource = self.resource.as_deref()?;
        let node = self.node.as_mut()?;
        Some(
            node.implicit
                .get_or_insert_with(|| empty_volume(resource, &node.name, 0)),
        )
    }

    fn finish_node(&mut self, node: DrbdNode) {
        let volumes = node.volumes.into_iter().chain(node.implicit);
        for mut volume in volumes {
            volume.address.clone_from(&node.address);
            volume.port = node.port;
            self.records.push(ParsedRecord::DrbdVolumeConfig(volume));
        }
    }
}

impl TreeHandler for DrbdConfigHandler {
    fn open(&mut self, name: &str, attrs: &Attrs, path: &[String]) {
        let parent = path.last().map(String::as_str);
        match (name, parent) {
            ("resource", _) => {
                self.resource = attr(attrs, "name");
                if self.resource.is_none() {
                    self.warnings.push("resource without name skipped".to_string());
                }
            }
            ("host", Some("resource")) if self.resource.is_some() => {
                self.node = attr(attrs, "name").map(|name| DrbdNode {
                    name,
                    address: None,
                    port: None,
                    volumes: Vec::new(),
                    implicit: None,
                });
            }
            ("volume", Some("host")) => {
                if let (Some(resource), Some(node)) = (self.resource.as_deref(), self.node.as_ref()) {
                    let vnr = attr(attrs, "vnr").and_then(|v| v.parse().ok()).unwrap_or(0);
                    self.volume = Some(empty_volume(resource, &node.name, vnr));
                }
            }
            ("device", Some("volume" | "host")) => {
                let minor = attr(attrs, "minor").and_then(|m| m.parse().ok());
                if let Some(target) = self.target() {
                    target.minor = minor;
                }
            }
            ("address", Some("host")) => {
                if let Some(node) = self.node.as_mut() {
                    node.port = attr(attrs, "port").and_then(|p| p.parse().ok());
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str, text: &str, path: &[String]) {
        let parent = path.last().map(String::as_str);
        match (name, parent) {
            ("device" | "disk" | "meta-disk", Some("volume" | "host")) => {
                let value = non_empty(text);
                if let Some(target) = self.target() {
                    match name {
                        "device" => target.device = value,
                        "disk" => target.disk = value,
                        _ => target.meta_disk = value,
                    }
                }
            }
            ("address", Some("host")) => {
                if let Some(node) = self.node.as_mut() {
                    node.address = non_empty(text);
                }
            }
            ("volume", Some("host")) => {
                if let (Some(volume), Some(node)) = (self.volume.take(), self.node.as_mut()) {
                    node.volumes.push(volume);
                }
            }
            ("host", Some("resource")) => {
                if let Some(node) = self.node.take() {
                    self.finish_node(node);
                }
            }
            ("resource", _) => self.resource = None,
            _ => {}
        }
    }

    fn finish(self) -> (Vec<ParsedRecord>, Vec<String>) {
        (self.records, self.warnings)
    }
}
