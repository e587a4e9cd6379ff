//! One managed remote session per host.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::cancel::CancellationToken;
use super::result::{ErrorCode, ExecutionResult};
use super::transport::{Transport, TransportError, TransportOutput};
use crate::models::Host;

/// How an invocation ended before classification
enum Ended {
    Finished(Result<TransportOutput, TransportError>),
    TimedOut,
    Cancelled,
}

/// Executes commands on one host, one at a time
///
/// Concurrent calls to [`RemoteSession::execute`] on the same session are
/// serialized; separate sessions are independent. Waiting for the session
/// counts against the caller's timeout.
pub struct RemoteSession {
    host: Arc<Host>,
    transport: Arc<dyn Transport>,
    lock: Mutex<()>,
}

impl RemoteSession {
    /// Creates a session for `host`
    #[must_use]
    pub fn new(host: Arc<Host>, transport: Arc<dyn Transport>) -> Self {
        Self {
            host,
            transport,
            lock: Mutex::new(()),
        }
    }

    /// Host this session talks to
    #[must_use]
    pub fn host(&self) -> &Arc<Host> {
        &self.host
    }

    /// Returns true while a command is running on this session
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Runs `command` and classifies its outcome.
    ///
    /// The timeout is measured from the moment of the call. Cancellation and
    /// timeout drop the in-flight transport call, which releases its process.
    /// Every path returns an [`ExecutionResult`].
    pub async fn execute(
        &self,
        command: &str,
        timeout: Duration,
        output_visible: bool,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = start + timeout;
        let host = self.host.name();

        let run = async {
            let _guard = self.lock.lock().await;
            tracing::debug!(host, command, transport = self.transport.name(), "Running remote command");
            self.transport.run(&self.host, command).await
        };

        let ended = tokio::select! {
            biased;
            () = cancel.cancelled() => Ended::Cancelled,
            res = tokio::time::timeout_at(deadline, run) => match res {
                Ok(finished) => Ended::Finished(finished),
                Err(_) => Ended::TimedOut,
            },
        };
        let elapsed = start.elapsed();

        let result = match ended {
            Ended::Cancelled => ExecutionResult::cancelled(host, started_at, elapsed),
            Ended::TimedOut => ExecutionResult::timeout(host, started_at, elapsed),
            Ended::Finished(Ok(output)) if output.success() => {
                ExecutionResult::success(host, output.stdout, output.stderr, started_at, elapsed)
            }
            Ended::Finished(Ok(output)) => ExecutionResult::non_zero_exit(
                host,
                output.exit_code,
                output.stdout,
                output.stderr,
                started_at,
                elapsed,
            ),
            Ended::Finished(Err(error)) => {
                let code = match error {
                    TransportError::Authentication { .. } => ErrorCode::Authentication,
                    TransportError::Connection { .. } | TransportError::Spawn { .. } => {
                        ErrorCode::Transport
                    }
                };
                ExecutionResult::failure(host, code, error.to_string(), started_at, elapsed)
            }
        };

        log_result(command, &result, output_visible);
        result
    }
}

fn log_result(command: &str, result: &ExecutionResult, output_visible: bool) {
    let outcome = result.summary();
    if result.is_success() {
        tracing::debug!(
            host = %result.host,
            command,
            outcome = %outcome,
            duration_ms = result.duration_ms,
            "Remote command finished"
        );
    } else {
        tracing::warn!(
            host = %result.host,
            command,
            outcome = %outcome,
            duration_ms = result.duration_ms,
            stderr = %result.stderr.trim(),
            "Remote command did not succeed"
        );
    }
    if output_visible {
        tracing::info!(host = %result.host, stdout = %result.stdout, "Remote output");
    } else {
        tracing::trace!(host = %result.host, stdout = %result.stdout, "Remote output");
    }
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("host", &self.host.name())
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}
