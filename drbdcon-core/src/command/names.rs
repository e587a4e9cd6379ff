//! Names of the built-in inspection commands.

/// Host facts: hostname, kernel, architecture, distribution, DRBD version
pub const HOST_INFO: &str = "HostInfo";

/// Block devices with size, type, filesystem and mountpoint
pub const BLOCK_DEVICES: &str = "BlockDevices";

/// DRBD resource configuration as XML
pub const DRBD_CONFIG: &str = "DrbdConfig";

/// Live DRBD device state
pub const DRBD_STATUS: &str = "DrbdStatus";

/// All libvirt domain definitions with their state
pub const VM_DOMAINS: &str = "VmDomains";

/// VNC displays of running libvirt domains
pub const VNC_DISPLAYS: &str = "VncDisplays";
