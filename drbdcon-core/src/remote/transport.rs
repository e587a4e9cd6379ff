//! Transport abstraction for running a shell command on a host.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Host;

/// Raw output of a command that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOutput {
    /// Exit status, `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl TransportOutput {
    /// Creates an output with exit status 0
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Returns true if the process exited with status 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Reasons a transport could not run a command at all
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Failed to start the local client process
    #[error("Failed to spawn {program}: {message}")]
    Spawn {
        /// Program that could not be started
        program: String,
        /// Underlying error message
        message: String,
    },

    /// The remote side rejected the credentials
    #[error("Authentication failed for {host}: {message}")]
    Authentication {
        /// Host name
        host: String,
        /// Diagnostic from the client
        message: String,
    },

    /// Connection could not be established or was lost
    #[error("Connection to {host} failed: {message}")]
    Connection {
        /// Host name
        host: String,
        /// Diagnostic from the client
        message: String,
    },
}

/// Runs shell commands on remote hosts
///
/// Implementations must release every local resource they acquire for a
/// command when the returned future is dropped, so that timeout and
/// cancellation never leak processes or connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Runs `command` on `host` and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error when the command could not be run at all. A command
    /// that ran and exited non-zero is reported through
    /// [`TransportOutput::exit_code`].
    async fn run(&self, host: &Host, command: &str) -> Result<TransportOutput, TransportError>;

    /// Short identifier used in logs
    fn name(&self) -> &'static str;
}
