//! Configuration file sections.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use crate::command::StaticCommandTable;
use crate::error::{ConfigError, ConfigResult};
use crate::executor::RetryConfig;
use crate::models::{Credentials, DEFAULT_SSH_PORT, DistributionKey, Host, HostRegistry};
use crate::tracing::{TracingConfig, TracingLevel, TracingOutput};

/// Top-level console configuration (`drbdcon.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// SSH client options
    pub ssh: SshSettings,
    /// Parallelism, timeouts and retries
    pub executor: ExecutorSettings,
    /// Log level and destination
    pub logging: LoggingSettings,
    /// Administered hosts
    pub hosts: Vec<HostConfig>,
    /// Extra command templates: name -> distribution scope -> template
    pub commands: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConsoleConfig {
    /// Checks values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.executor.max_parallel == 0 {
            return Err(ConfigError::Invalid(
                "executor.max_parallel must be at least 1".to_string(),
            ));
        }
        if self.executor.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "executor.timeout_secs must be at least 1".to_string(),
            ));
        }
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                return Err(ConfigError::Invalid("host with empty name".to_string()));
            }
            if host.port == 0 {
                return Err(ConfigError::Invalid(format!(
                    "host '{}' has port 0",
                    host.name
                )));
            }
        }
        Ok(())
    }

    /// Builds the host registry from `[[hosts]]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if two hosts share a name.
    pub fn host_registry(&self) -> ConfigResult<HostRegistry> {
        let mut registry = HostRegistry::new();
        for host in &self.hosts {
            if !registry.add(host.to_host(&self.ssh)) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate host name '{}'",
                    host.name
                )));
            }
        }
        Ok(registry)
    }

    /// Builds the command table: built-in defaults overlaid with
    /// `[commands.*]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Commands`] for a malformed distribution key.
    pub fn command_table(&self) -> ConfigResult<StaticCommandTable> {
        let mut table = StaticCommandTable::with_defaults();
        let entries: HashMap<String, HashMap<String, String>> = self
            .commands
            .iter()
            .map(|(name, variants)| {
                (
                    name.clone(),
                    variants
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                )
            })
            .collect();
        table.merge_entries(entries)?;
        Ok(table)
    }
}

/// `[ssh]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// SSH client binary
    pub program: String,
    /// `ConnectTimeout` in seconds
    pub connect_timeout_secs: u64,
    /// `StrictHostKeyChecking` value (`yes`, `no`, `accept-new`)
    pub strict_host_key_checking: String,
    /// Extra `-o` options passed verbatim
    pub extra_options: Vec<String>,
    /// Login name for hosts that do not set `user`
    pub default_user: Option<String>,
    /// Wrap commands in `sudo -n` for non-root logins
    pub sudo: bool,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            connect_timeout_secs: 10,
            strict_host_key_checking: "accept-new".to_string(),
            extra_options: Vec::new(),
            default_user: None,
            sudo: false,
        }
    }
}

/// Default number of hosts contacted at once
pub const DEFAULT_MAX_PARALLEL: usize = 16;

/// Default per-host command timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// `[executor]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Hosts contacted at once within one dispatch
    pub max_parallel: usize,
    /// Per-host command timeout in seconds
    pub timeout_secs: u64,
    /// `[executor.retry]`
    pub retry: RetryConfig,
}

impl ExecutorSettings {
    /// Per-host command timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryConfig::default(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub level: String,
    /// Log file; stderr when unset
    pub file: Option<PathBuf>,
    /// Full `EnvFilter` directive, overrides `level`
    pub filter: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            filter: None,
        }
    }
}

impl LoggingSettings {
    /// Converts to a tracing configuration; an unknown level falls back to
    /// `warn`.
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        let level = self.level.parse().unwrap_or(TracingLevel::Warn);
        let mut config = TracingConfig::new().with_level(level);
        if let Some(ref path) = self.file {
            config = config.with_output(TracingOutput::File { path: path.clone() });
        }
        if let Some(ref filter) = self.filter {
            config = config.with_filter(filter.clone());
        }
        config
    }
}

/// One `[[hosts]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Unique display name
    pub name: String,
    /// Address to connect to; defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// SSH private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
    /// Password for `sshpass`; never written back
    #[serde(default, skip_serializing, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    /// Distribution family used before the first host-info inspection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    /// Distribution version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// CPU architecture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

const fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl HostConfig {
    /// Creates an entry with only a name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            port: DEFAULT_SSH_PORT,
            user: None,
            identity_file: None,
            password: None,
            distribution: None,
            version: None,
            arch: None,
        }
    }

    /// Builds the runtime host
    #[must_use]
    pub fn to_host(&self, ssh: &SshSettings) -> Host {
        let user = self
            .user
            .as_deref()
            .or(ssh.default_user.as_deref())
            .map_or_else(Credentials::default, Credentials::new);
        let mut credentials = user;
        if let Some(ref path) = self.identity_file {
            credentials = credentials.with_identity_file(path);
        }
        if let Some(ref password) = self.password {
            credentials = credentials.with_password(password.clone());
        }

        let mut host = Host::new(
            self.name.clone(),
            self.address.clone().unwrap_or_else(|| self.name.clone()),
        )
        .with_port(self.port)
        .with_credentials(credentials);
        if let Some(ref family) = self.distribution {
            host = host.with_distribution(DistributionKey::new(
                family,
                self.version.as_deref(),
                self.arch.as_deref(),
            ));
        }
        host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandTable;
    use crate::models::LookupScope;

    const SAMPLE: &str = r#"
[ssh]
default_user = "admin"
sudo = true

[executor]
max_parallel = 4

[executor.retry]
enabled = true
max_retries = 1

[[hosts]]
name = "alpha"
address = "10.0.0.1"
distribution = "Debian"
version = "12"

[[hosts]]
name = "beta"
user = "root"
port = 2222

[commands.DrbdStatus]
"debian:12" = "drbdadm status"
"#;

    #[test]
    fn test_parse_sample() {
        let config: ConsoleConfig = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.executor.max_parallel, 4);
        assert_eq!(config.executor.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.executor.retry.enabled);
        assert!(config.ssh.sudo);
        assert_eq!(config.ssh.program, "ssh");

        let registry = config.host_registry().unwrap();
        let alpha = registry.get("alpha").unwrap();
        assert_eq!(alpha.address(), "10.0.0.1");
        assert_eq!(alpha.credentials().user, "admin");
        assert_eq!(alpha.distribution_key().to_string(), "debian:12");
        let beta = registry.get("beta").unwrap();
        assert_eq!(beta.address(), "beta");
        assert_eq!(beta.port(), 2222);
        assert!(beta.credentials().is_root());
    }

    #[test]
    fn test_command_table_overlays_defaults() {
        let config: ConsoleConfig = toml::from_str(SAMPLE).unwrap();
        let table = config.command_table().unwrap();
        let scope = LookupScope::Version {
            family: "debian".into(),
            version: "12".into(),
        };
        assert_eq!(table.lookup("DrbdStatus", &scope), Some("drbdadm status"));
        assert!(table.lookup("DrbdStatus", &LookupScope::Generic).is_some());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = ConsoleConfig::default();
        config.executor.max_parallel = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ConsoleConfig::default();
        config.hosts = vec![HostConfig::new("a"), HostConfig::new("a")];
        assert!(config.host_registry().is_err());

        let mut config = ConsoleConfig::default();
        config
            .commands
            .insert("X".into(), BTreeMap::from([("a:b:c:d".into(), "x".into())]));
        assert!(matches!(config.command_table(), Err(ConfigError::Commands(_))));
    }

    #[test]
    fn test_password_is_not_serialized() {
        let mut host = HostConfig::new("a");
        host.password = Some(SecretString::from("hunter2"));
        let config = ConsoleConfig {
            hosts: vec![host],
            ..ConsoleConfig::default()
        };
        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("hunter2"));
    }
}
