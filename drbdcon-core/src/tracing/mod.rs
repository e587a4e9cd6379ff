//! Structured logging setup
//!
//! Remote execution logs carry the `host`, `command`, `outcome`,
//! `duration_ms` and `dispatch_id` fields; [`span_names`] and
//! [`field_names`] hold the names shared across modules.

use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Errors raised while installing the log subscriber
#[derive(Debug, Error)]
pub enum TracingError {
    /// The subscriber or filter could not be built
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// A subscriber is already installed
    #[error("Logging has already been initialized")]
    AlreadyInitialized,

    /// The log file could not be opened
    #[error("Failed to open log file {}: {source}", path.display())]
    FileCreationFailed {
        /// Log file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for logging setup
pub type TracingResult<T> = Result<T, TracingError>;

/// Verbosity of the drbdcon crates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TracingLevel {
    /// Errors only
    Error,
    /// Errors and warnings, such as failed hosts
    #[default]
    Warn,
    /// Dispatch progress and visible remote output
    Info,
    /// Every remote command and merge
    Debug,
    /// Hidden remote output as well
    Trace,
}

impl TracingLevel {
    const ORDERED: [Self; 5] = [
        Self::Error,
        Self::Warn,
        Self::Info,
        Self::Debug,
        Self::Trace,
    ];

    /// Matching `tracing` level
    #[must_use]
    pub const fn to_tracing_level(self) -> Level {
        match self {
            Self::Error => Level::ERROR,
            Self::Warn => Level::WARN,
            Self::Info => Level::INFO,
            Self::Debug => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Level after `verbosity` steps up from `self`, saturating at trace
    #[must_use]
    pub fn raised_by(self, verbosity: u8) -> Self {
        let index = Self::ORDERED
            .iter()
            .position(|l| *l == self)
            .unwrap_or(1)
            .saturating_add(usize::from(verbosity));
        Self::ORDERED[index.min(Self::ORDERED.len() - 1)]
    }

    /// Lowercase name as used in filter directives
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl FromStr for TracingLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted == "warning" {
            return Ok(Self::Warn);
        }
        Self::ORDERED
            .into_iter()
            .find(|l| l.as_str() == wanted)
            .ok_or_else(|| format!("unknown log level: {s}"))
    }
}

impl fmt::Display for TracingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TracingOutput {
    /// Standard output
    Stdout,
    /// Standard error, keeping stdout for command results
    #[default]
    Stderr,
    /// A file, appended to
    File {
        /// Log file path
        path: PathBuf,
    },
}

/// Settings for [`init_tracing`]
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Level applied to the drbdcon crates
    pub level: TracingLevel,
    /// Destination
    pub output: TracingOutput,
    /// Include thread ids in each line
    pub thread_ids: bool,
    /// Full `EnvFilter` directive; replaces the level-derived one
    pub filter: Option<String>,
}

impl TracingConfig {
    /// Default settings: warnings to stderr
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level
    #[must_use]
    pub const fn with_level(mut self, level: TracingLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the destination
    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Enables or disables thread ids
    #[must_use]
    pub const fn with_thread_ids(mut self, include: bool) -> Self {
        self.thread_ids = include;
        self
    }

    /// Sets an explicit filter directive
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Directive used when no explicit filter is set: dependencies stay at
    /// `warn`, the drbdcon crates follow [`Self::level`].
    #[must_use]
    pub fn default_directive(&self) -> String {
        format!("warn,drbdcon_core={0},drbdcon={0}", self.level)
    }

    fn env_filter(&self) -> TracingResult<EnvFilter> {
        let directive = self
            .filter
            .clone()
            .unwrap_or_else(|| self.default_directive());
        EnvFilter::try_new(directive).map_err(|e| TracingError::InitializationFailed(e.to_string()))
    }

    fn make_writer(&self) -> TracingResult<(BoxMakeWriter, bool)> {
        Ok(match &self.output {
            TracingOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
            TracingOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
            TracingOutput::File { path } => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| TracingError::FileCreationFailed {
                        path: path.clone(),
                        source,
                    })?;
                (BoxMakeWriter::new(file), false)
            }
        })
    }
}

/// Installs the global log subscriber.
///
/// Only the first call in a process installs anything.
///
/// # Errors
///
/// Returns [`TracingError::AlreadyInitialized`] on later calls, and an
/// error if the filter is invalid or the log file cannot be opened.
pub fn init_tracing(config: &TracingConfig) -> TracingResult<()> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Err(TracingError::AlreadyInitialized);
    }

    let installed = config.env_filter().and_then(|filter| {
        let (writer, ansi) = config.make_writer()?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(config.thread_ids)
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init()
            .map_err(|e| TracingError::InitializationFailed(e.to_string()))
    });
    if installed.is_err() {
        INITIALIZED.store(false, Ordering::SeqCst);
    }
    installed?;

    tracing::debug!(level = %config.level, output = ?config.output, "Logging initialized");
    Ok(())
}

/// Returns true once [`init_tracing`] has installed a subscriber
#[must_use]
pub fn is_tracing_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

/// Span names
pub mod span_names {
    /// One host within a dispatch
    pub const EXECUTOR_HOST: &str = "executor.host";
    /// Refresh of one inspection across hosts
    pub const CONSOLE_REFRESH: &str = "console.refresh";
    /// Named operation across hosts
    pub const CONSOLE_RUN: &str = "console.run";
}

/// Field names shared by remote execution events
pub mod field_names {
    /// Host name
    pub const HOST: &str = "host";
    /// Resolved command line; may contain substituted secrets, so it is only
    /// logged at debug and trace
    pub const COMMAND: &str = "command";
    /// Outcome tag
    pub const OUTCOME: &str = "outcome";
    /// Elapsed milliseconds
    pub const DURATION_MS: &str = "duration_ms";
    /// Dispatch id
    pub const DISPATCH_ID: &str = "dispatch_id";
}
