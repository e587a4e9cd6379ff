//! `drbdcon` Core Library
//!
//! Administration core for clusters of DRBD-replicated hypervisor hosts:
//! resolves named operations into distribution-specific shell commands,
//! runs them on many hosts concurrently over SSH, parses what comes back
//! and keeps a consistent in-memory model of the cluster.
//!
//! # Crate Structure
//!
//! - [`models`] - Hosts, credentials and distribution fingerprints
//! - [`command`] - Command table and resolver
//! - [`remote`] - Transports, per-host sessions, execution results
//! - [`executor`] - Parallel dispatch with bounded concurrency and cancellation
//! - [`parser`] - `key: value` and XML output parsers
//! - [`model`] - Reconciled domain model with snapshots
//! - [`console`] - Caller surface tying the above together
//! - [`config`] - `drbdcon.toml` loading and saving
//! - [`tracing`] - Logging initialization

#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod console;
pub mod error;
pub mod executor;
pub mod model;
pub mod models;
pub mod parser;
pub mod remote;
pub mod tracing;

pub use command::{
    CommandFileError, CommandResolver, CommandSpec, CommandTable, ResolveError, ResolveResult,
    StaticCommandTable,
};
pub use config::{ConfigManager, ConsoleConfig, ExecutorSettings, HostConfig, SshSettings};
pub use console::{Console, HostRefresh, Inspection, RefreshReport};
pub use error::{ConfigError, ConfigResult, CoreError, CoreResult};
pub use executor::{AsyncExecutor, Dispatch, DispatchOptions, DispatchSummary, RetryConfig};
pub use model::{DomainModel, ModelSnapshot};
pub use models::{Credentials, DistributionKey, Host, HostFacts, HostRegistry, LookupScope};
pub use parser::{
    Diagnostic, ParseOutcome, ParsedRecord, PayloadKind, RecordKind, StructuredOutputParser,
};
pub use remote::{
    CancellationToken, ErrorCode, ExecutionResult, Outcome, RemoteSession, SessionPool,
    SshTransport, Transport, TransportError,
};
pub use tracing::{
    TracingConfig, TracingError, TracingLevel, TracingOutput, TracingResult, field_names,
    init_tracing, is_tracing_initialized, span_names,
};
