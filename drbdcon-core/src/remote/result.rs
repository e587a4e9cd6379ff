//! Classified outcome of one remote command.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome tag of a remote execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The command ran and exited with status 0
    Success,
    /// The command could not run or exited non-zero; see [`ErrorCode`]
    Failure,
    /// The command did not finish before its deadline
    Timeout,
    /// The caller cancelled the command
    Cancelled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Distinguishes the kinds of [`Outcome::Failure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The remote side rejected the credentials
    Authentication,
    /// The connection could not be established or broke
    Transport,
    /// The remote command exited with a non-zero status
    NonZeroExit,
    /// No command template for this host's distribution
    Unresolved,
    /// The command template needed a substitution that was not supplied
    MissingSubstitution,
}

impl ErrorCode {
    /// Returns true if a caller retry policy may retry this failure.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transport | Self::NonZeroExit)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authentication => "authentication",
            Self::Transport => "transport",
            Self::NonZeroExit => "non_zero_exit",
            Self::Unresolved => "unresolved",
            Self::MissingSubstitution => "missing_substitution",
        })
    }
}

/// Result of one completed remote invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Name of the host the command ran on
    pub host: String,
    /// Outcome tag
    pub outcome: Outcome,
    /// Failure classification, set only for [`Outcome::Failure`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Remote exit status, if the process exited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error, or the local error description
    pub stderr: String,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// When the invocation started
    pub started_at: DateTime<Utc>,
    /// Number of attempts made (1 unless retried)
    pub attempts: u32,
}

impl ExecutionResult {
    fn with_outcome(host: &str, outcome: Outcome, started_at: DateTime<Utc>, elapsed: Duration) -> Self {
        Self {
            host: host.to_string(),
            outcome,
            error_code: None,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: elapsed.as_millis() as u64,
            started_at,
            attempts: 1,
        }
    }

    /// Creates a successful result
    #[must_use]
    pub fn success(
        host: &str,
        stdout: String,
        stderr: String,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            ..Self::with_outcome(host, Outcome::Success, started_at, elapsed)
        }
    }

    /// Creates a failed result
    #[must_use]
    pub fn failure(
        host: &str,
        code: ErrorCode,
        message: impl Into<String>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            error_code: Some(code),
            stderr: message.into(),
            ..Self::with_outcome(host, Outcome::Failure, started_at, elapsed)
        }
    }

    /// Creates a result for a command that exited with a non-zero status
    #[must_use]
    pub fn non_zero_exit(
        host: &str,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            error_code: Some(ErrorCode::NonZeroExit),
            exit_code,
            stdout,
            stderr,
            ..Self::with_outcome(host, Outcome::Failure, started_at, elapsed)
        }
    }

    /// Creates a timed-out result
    #[must_use]
    pub fn timeout(host: &str, started_at: DateTime<Utc>, elapsed: Duration) -> Self {
        Self {
            stderr: format!("Timed out after {}ms", elapsed.as_millis()),
            ..Self::with_outcome(host, Outcome::Timeout, started_at, elapsed)
        }
    }

    /// Creates a cancelled result
    #[must_use]
    pub fn cancelled(host: &str, started_at: DateTime<Utc>, elapsed: Duration) -> Self {
        Self::with_outcome(host, Outcome::Cancelled, started_at, elapsed)
    }

    /// Returns true if the command succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Returns true if a caller retry policy may retry this result.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.outcome {
            Outcome::Timeout => true,
            Outcome::Failure => self.error_code.is_some_and(ErrorCode::is_retryable),
            Outcome::Success | Outcome::Cancelled => false,
        }
    }

    /// Wall-clock duration of the invocation
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// One-line description for logs and CLI output
    #[must_use]
    pub fn summary(&self) -> String {
        match (self.outcome, self.error_code) {
            (Outcome::Failure, Some(ErrorCode::NonZeroExit)) => format!(
                "failure (exit {})",
                self.exit_code
                    .map_or_else(|| "?".to_string(), |c| c.to_string())
            ),
            (Outcome::Failure, Some(code)) => format!("failure ({code})"),
            (outcome, _) => outcome.to_string(),
        }
    }
}
