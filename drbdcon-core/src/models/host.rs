//! Remote hosts and the registry that owns them.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::{Credentials, DistributionKey};

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Facts reported by a host-info inspection.
///
/// Every field is optional because older hosts may not report all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFacts {
    /// Host name as reported by the host itself
    pub hostname: Option<String>,
    /// Running kernel release
    pub kernel_version: Option<String>,
    /// Installed DRBD userland/module version
    pub drbd_version: Option<String>,
    /// CPU architecture
    pub arch: Option<String>,
    /// Distribution family
    pub distribution: Option<String>,
    /// Distribution version
    pub distribution_version: Option<String>,
}

impl HostFacts {
    /// Returns the distribution key described by these facts, if the family
    /// is known.
    #[must_use]
    pub fn distribution_key(&self) -> Option<DistributionKey> {
        self.distribution.as_deref().map(|family| {
            DistributionKey::new(
                family,
                self.distribution_version.as_deref(),
                self.arch.as_deref(),
            )
        })
    }
}

/// A server the console administers.
///
/// Identity is immutable; facts are replaced by each successful host-info
/// inspection.
#[derive(Debug)]
pub struct Host {
    name: String,
    address: String,
    port: u16,
    credentials: Credentials,
    configured_key: DistributionKey,
    facts: RwLock<Option<HostFacts>>,
}

impl Host {
    /// Creates a host reachable at `address` on the default SSH port.
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port: DEFAULT_SSH_PORT,
            credentials: Credentials::default(),
            configured_key: DistributionKey::generic(),
            facts: RwLock::new(None),
        }
    }

    /// Sets the SSH port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the distribution key used until inspection reports one.
    #[must_use]
    pub fn with_distribution(mut self, key: DistributionKey) -> Self {
        self.configured_key = key;
        self
    }

    /// Host name used as the identity in results and the model
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address used to reach the host
    pub fn address(&self) -> &str {
        &self.address
    }

    /// SSH port
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Credentials reference
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the distribution key used to resolve commands for this host.
    ///
    /// Inspected facts take precedence over the configured key. Components
    /// the inspection did not report fall back to the configured values.
    #[must_use]
    pub fn distribution_key(&self) -> DistributionKey {
        let facts = self.facts.read().unwrap_or_else(PoisonError::into_inner);
        match facts.as_ref().and_then(HostFacts::distribution_key) {
            Some(mut key) => {
                if key.version.is_none() {
                    key.version.clone_from(&self.configured_key.version);
                }
                if key.arch.is_none() {
                    key.arch.clone_from(&self.configured_key.arch);
                }
                key
            }
            None => self.configured_key.clone(),
        }
    }

    /// Returns a copy of the last inspected facts.
    #[must_use]
    pub fn facts(&self) -> Option<HostFacts> {
        self.facts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the inspected facts.
    pub fn apply_facts(&self, facts: HostFacts) {
        *self.facts.write().unwrap_or_else(PoisonError::into_inner) = Some(facts);
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.credentials.user, self.address, self.port)
    }
}

/// Owns the set of hosts known to the console.
#[derive(Debug, Default)]
pub struct HostRegistry {
    hosts: Vec<Arc<Host>>,
}

impl HostRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host. Returns `false` if a host with the same name is
    /// already registered.
    pub fn add(&mut self, host: Host) -> bool {
        if self.get(host.name()).is_some() {
            return false;
        }
        self.hosts.push(Arc::new(host));
        true
    }

    /// Removes a host by name.
    pub fn remove(&mut self, name: &str) -> Option<Arc<Host>> {
        let idx = self.hosts.iter().position(|h| h.name() == name)?;
        Some(self.hosts.remove(idx))
    }

    /// Looks up a host by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Host>> {
        self.hosts.iter().find(|h| h.name() == name).cloned()
    }

    /// Returns the named hosts, or every host when `names` is empty.
    ///
    /// Unknown names are returned in the error vector. A name given more
    /// than once is selected once.
    pub fn select(&self, names: &[String]) -> Result<Vec<Arc<Host>>, Vec<String>> {
        if names.is_empty() {
            return Ok(self.hosts.clone());
        }
        let mut found = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            if found.iter().any(|h: &Arc<Host>| h.name() == name) || missing.contains(name) {
                continue;
            }
            match self.get(name) {
                Some(host) => found.push(host),
                None => missing.push(name.clone()),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(missing)
        }
    }

    /// All registered hosts in registration order
    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    /// Number of registered hosts
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Returns true if no hosts are registered
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
