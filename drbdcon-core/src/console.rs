//! Caller surface: named operations, inspections and the model.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::command::{CommandResolver, CommandTable, names};
use crate::config::ConsoleConfig;
use crate::error::{CoreError, CoreResult};
use crate::executor::{AsyncExecutor, Dispatch, DispatchOptions, DispatchSummary};
use crate::model::{DomainModel, ModelSnapshot};
use crate::models::{Host, HostRegistry};
use crate::parser::{self, Diagnostic, ParsedRecord, PayloadKind};
use crate::remote::{ExecutionResult, SessionPool, Transport};
use crate::tracing::span_names;

/// Placeholder filled with the target host's name on every command
pub const HOST_PLACEHOLDER: &str = "HOST";

/// Built-in inspections that feed the domain model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Inspection {
    /// Host facts (kernel, DRBD version, distribution)
    HostInfo,
    /// Block devices
    BlockDevices,
    /// DRBD configuration (`drbdadm dump-xml`)
    DrbdConfig,
    /// DRBD live status
    DrbdStatus,
    /// libvirt domain definitions
    VmDomains,
    /// Live VNC displays of running domains
    VncDisplays,
}

impl Inspection {
    /// Every inspection, host facts first
    pub const ALL: [Self; 6] = [
        Self::HostInfo,
        Self::BlockDevices,
        Self::DrbdConfig,
        Self::DrbdStatus,
        Self::VmDomains,
        Self::VncDisplays,
    ];

    /// Command table name of the inspection
    #[must_use]
    pub const fn command_name(self) -> &'static str {
        match self {
            Self::HostInfo => names::HOST_INFO,
            Self::BlockDevices => names::BLOCK_DEVICES,
            Self::DrbdConfig => names::DRBD_CONFIG,
            Self::DrbdStatus => names::DRBD_STATUS,
            Self::VmDomains => names::VM_DOMAINS,
            Self::VncDisplays => names::VNC_DISPLAYS,
        }
    }

    /// Declared format of the command's output
    #[must_use]
    pub const fn payload_kind(self) -> PayloadKind {
        match self {
            Self::HostInfo => PayloadKind::HostInfo,
            Self::BlockDevices => PayloadKind::BlockDevices,
            Self::DrbdConfig => PayloadKind::DrbdConfigXml,
            Self::DrbdStatus => PayloadKind::DrbdStatus,
            Self::VmDomains => PayloadKind::DomainXml,
            Self::VncDisplays => PayloadKind::VncStatus,
        }
    }

    /// Stable kebab-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HostInfo => "host-info",
            Self::BlockDevices => "block-devices",
            Self::DrbdConfig => "drbd-config",
            Self::DrbdStatus => "drbd-status",
            Self::VmDomains => "vm-domains",
            Self::VncDisplays => "vnc-displays",
        }
    }
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Inspection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == wanted || i.command_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown inspection: {s}"))
    }
}

/// What a refresh did for one host
#[derive(Debug, Clone, Serialize)]
pub struct HostRefresh {
    /// Host name
    pub host: String,
    /// Result of the inspection command
    pub result: ExecutionResult,
    /// Records merged into the model (0 when the command failed)
    pub records: usize,
    /// Whether the model was updated for this host
    pub merged: bool,
    /// Parse problems
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of one refresh across hosts
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    /// Inspection that ran
    pub inspection: Inspection,
    /// Dispatch that carried it
    pub dispatch_id: Uuid,
    /// Per-host details, in completion order
    pub hosts: Vec<HostRefresh>,
    /// Model generation after the last merge of this refresh
    pub generation: u64,
}

impl RefreshReport {
    /// Outcome counts
    #[must_use]
    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary::from_results(self.hosts.iter().map(|h| &h.result))
    }

    /// Hosts whose command did not succeed
    pub fn failures(&self) -> impl Iterator<Item = &HostRefresh> {
        self.hosts.iter().filter(|h| !h.result.is_success())
    }

    /// Every diagnostic of every host
    pub fn diagnostics(&self) -> impl Iterator<Item = (&str, &Diagnostic)> {
        self.hosts
            .iter()
            .flat_map(|h| h.diagnostics.iter().map(move |d| (h.host.as_str(), d)))
    }
}

/// Resolves, executes, parses and reconciles on behalf of a caller
pub struct Console {
    config: ConsoleConfig,
    registry: HostRegistry,
    resolver: CommandResolver,
    executor: AsyncExecutor,
    model: DomainModel,
}

impl Console {
    /// Creates a console for the hosts in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or names a host
    /// twice.
    pub fn new(
        config: ConsoleConfig,
        table: Arc<dyn CommandTable>,
        transport: Arc<dyn Transport>,
    ) -> CoreResult<Self> {
        config.validate()?;
        let registry = config.host_registry()?;
        let resolver = CommandResolver::new(table).with_privilege_escalation(config.ssh.sudo);
        let pool = Arc::new(SessionPool::new(transport));
        let executor = AsyncExecutor::new(pool, &config.executor);
        tracing::debug!(hosts = registry.len(), "Console ready");
        Ok(Self {
            config,
            registry,
            resolver,
            executor,
            model: DomainModel::new(),
        })
    }

    /// Configuration the console was built from
    #[must_use]
    pub const fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Known hosts
    #[must_use]
    pub const fn hosts(&self) -> &HostRegistry {
        &self.registry
    }

    /// Command resolver
    #[must_use]
    pub const fn resolver(&self) -> &CommandResolver {
        &self.resolver
    }

    /// Domain model
    #[must_use]
    pub const fn model(&self) -> &DomainModel {
        &self.model
    }

    /// Looks up hosts by name; an empty list selects all hosts.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownHosts`] listing every unknown name.
    pub fn select_hosts(&self, names: &[String]) -> CoreResult<Vec<Arc<Host>>> {
        self.registry.select(names).map_err(CoreError::UnknownHosts)
    }

    /// Runs a named operation on `hosts`.
    ///
    /// `@HOST@` is set to each host's name unless `substitutions` sets it.
    /// Must be called from within a tokio runtime.
    pub fn run(
        &self,
        operation: &str,
        substitutions: &[(String, String)],
        hosts: &[Arc<Host>],
    ) -> Dispatch {
        self.run_with(operation, substitutions, hosts, DispatchOptions::visible())
    }

    /// Runs a named operation with explicit dispatch options.
    pub fn run_with(
        &self,
        operation: &str,
        substitutions: &[(String, String)],
        hosts: &[Arc<Host>],
        options: DispatchOptions,
    ) -> Dispatch {
        let _span = tracing::info_span!(span_names::CONSOLE_RUN, operation).entered();
        self.executor.dispatch_with(
            hosts,
            |host| {
                let substitutions = with_host(host, substitutions);
                self.resolver
                    .resolve_for_host(operation, &substitutions, host)
            },
            options,
        )
    }

    /// Runs an inspection on `hosts` and merges the parsed output.
    ///
    /// Each successful host replaces its records of the inspection's kinds.
    /// Failed hosts and payloads rejected as a whole leave the model as it
    /// was. Host-info facts are also applied to the [`Host`].
    pub async fn refresh(&self, inspection: Inspection, hosts: &[Arc<Host>]) -> RefreshReport {
        let span = tracing::info_span!(span_names::CONSOLE_REFRESH, inspection = %inspection);
        async {
            let mut dispatch = self.run_with(
                inspection.command_name(),
                &[],
                hosts,
                DispatchOptions::default(),
            );
            let dispatch_id = dispatch.id();
            let mut report = RefreshReport {
                inspection,
                dispatch_id,
                hosts: Vec::with_capacity(hosts.len()),
                generation: self.model.snapshot().generation(),
            };

            while let Some((host, result)) = dispatch.next().await {
                let entry = self.absorb(inspection, host, result, &mut report.generation);
                report.hosts.push(entry);
            }

            let summary = report.summary();
            tracing::info!(%dispatch_id, %summary, generation = report.generation, "Refresh finished");
            report
        }
        .instrument(span)
        .await
    }

    fn absorb(
        &self,
        inspection: Inspection,
        host: String,
        result: ExecutionResult,
        generation: &mut u64,
    ) -> HostRefresh {
        if !result.is_success() {
            return HostRefresh {
                host,
                result,
                records: 0,
                merged: false,
                diagnostics: Vec::new(),
            };
        }

        let kind = inspection.payload_kind();
        let outcome = parser::parse(&result.stdout, kind);
        let rejected = outcome.records.is_empty() && !outcome.diagnostics.is_empty();
        if rejected {
            tracing::warn!(host = %host, kind = %kind, "Payload rejected, keeping previous records");
            return HostRefresh {
                host,
                result,
                records: 0,
                merged: false,
                diagnostics: outcome.diagnostics,
            };
        }

        if inspection == Inspection::HostInfo
            && let Some(target) = self.registry.get(&host)
        {
            for record in &outcome.records {
                if let ParsedRecord::HostFacts(facts) = record {
                    target.apply_facts(facts.clone());
                }
            }
        }

        let records = outcome.records.len();
        *generation = self.model.merge(&host, kind.record_kinds(), outcome.records);
        HostRefresh {
            host,
            result,
            records,
            merged: true,
            diagnostics: outcome.diagnostics,
        }
    }

    /// Current model snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        self.model.snapshot()
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("hosts", &self.registry.len())
            .field("resolver", &self.resolver)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

fn with_host(host: &Host, substitutions: &[(String, String)]) -> Vec<(String, String)> {
    std::iter::once((HOST_PLACEHOLDER.to_string(), host.name().to_string()))
        .chain(substitutions.iter().cloned())
        .collect()
}
