//! Parallel execution of one command across many hosts
//!
//! [`AsyncExecutor::dispatch_all`] builds the command for every host, then
//! runs one task per host through that host's pooled [`RemoteSession`].
//! At most `max_parallel` hosts run at once; the others wait in a queue that
//! also observes cancellation. Hosts are independent: a failure, timeout or
//! resolution error on one host never affects another.
//!
//! [`RemoteSession`]: crate::remote::RemoteSession

mod dispatch;
pub mod retry;

pub use dispatch::{Dispatch, DispatchSummary};
pub use retry::RetryConfig;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::command::ResolveError;
use crate::config::ExecutorSettings;
use crate::models::Host;
use crate::remote::{
    CancellationToken, ErrorCode, ExecutionResult, RemoteSession, SessionPool,
};
use crate::tracing::span_names;

/// Per-dispatch knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOptions {
    /// Overrides the executor's default timeout
    pub timeout: Option<Duration>,
    /// Log remote stdout at info level instead of trace
    pub output_visible: bool,
}

impl DispatchOptions {
    /// Options for commands whose output the operator wants to see
    #[must_use]
    pub const fn visible() -> Self {
        Self {
            timeout: None,
            output_visible: true,
        }
    }

    /// Sets the per-host timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Runs remote commands on many hosts in parallel
#[derive(Debug, Clone)]
pub struct AsyncExecutor {
    pool: Arc<SessionPool>,
    max_parallel: usize,
    timeout: Duration,
    retry: RetryConfig,
}

impl AsyncExecutor {
    /// Creates an executor drawing sessions from `pool`
    #[must_use]
    pub fn new(pool: Arc<SessionPool>, settings: &ExecutorSettings) -> Self {
        Self {
            pool,
            max_parallel: settings.max_parallel.max(1),
            timeout: settings.timeout(),
            retry: settings.retry.clone(),
        }
    }

    /// Replaces the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the default per-host timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default per-host timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Session pool backing this executor
    #[must_use]
    pub const fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// Dispatches a command built per host with default options.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch_all<F>(&self, hosts: &[Arc<Host>], build: F) -> Dispatch
    where
        F: Fn(&Host) -> Result<String, ResolveError>,
    {
        self.dispatch_with(hosts, build, DispatchOptions::default())
    }

    /// Dispatches a command built per host.
    ///
    /// `build` runs synchronously for every host before anything is sent;
    /// a host whose command cannot be built reports a `Failure` result
    /// immediately and is not contacted. A host named more than once runs
    /// and reports once.
    pub fn dispatch_with<F>(
        &self,
        hosts: &[Arc<Host>],
        build: F,
        options: DispatchOptions,
    ) -> Dispatch
    where
        F: Fn(&Host) -> Result<String, ResolveError>,
    {
        let id = Uuid::new_v4();
        let hosts = unique_by_name(hosts);
        let cancel = CancellationToken::new();
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let (sender, receiver) = mpsc::unbounded_channel();
        let timeout = options.timeout.unwrap_or(self.timeout);

        tracing::info!(
            dispatch_id = %id,
            hosts = hosts.len(),
            max_parallel = self.max_parallel,
            timeout_ms = timeout.as_millis() as u64,
            "Dispatching command"
        );

        for host in &hosts {
            let name = host.name().to_string();
            let command = match build(host) {
                Ok(command) => command,
                Err(error) => {
                    tracing::warn!(dispatch_id = %id, host = %name, %error, "Command not resolved");
                    let result = resolve_failure(&name, &error);
                    let _ = sender.send((name, result));
                    continue;
                }
            };

            let job = HostJob {
                session: self.pool.session(host),
                command,
                timeout,
                output_visible: options.output_visible,
                retry: self.retry.clone(),
                cancel: cancel.child_token(),
            };
            let semaphore = Arc::clone(&semaphore);
            let sender = sender.clone();
            let span = tracing::debug_span!(span_names::EXECUTOR_HOST, dispatch_id = %id, host = %name);
            tokio::spawn(
                async move {
                    let result = job.run_queued(&semaphore).await;
                    // Receiver may be gone if the dispatch was dropped
                    let _ = sender.send((name, result));
                }
                .instrument(span),
            );
        }

        Dispatch::new(
            id,
            receiver,
            hosts.iter().map(|h| h.name().to_string()),
            cancel,
        )
    }
}

/// Keeps the first occurrence of each host name, preserving order.
fn unique_by_name(hosts: &[Arc<Host>]) -> Vec<Arc<Host>> {
    let mut seen = HashSet::with_capacity(hosts.len());
    let unique: Vec<Arc<Host>> = hosts
        .iter()
        .filter(|h| seen.insert(h.name()))
        .cloned()
        .collect();
    if unique.len() < hosts.len() {
        tracing::debug!(
            requested = hosts.len(),
            unique = unique.len(),
            "Ignoring repeated hosts"
        );
    }
    unique
}

fn resolve_failure(host: &str, error: &ResolveError) -> ExecutionResult {
    let code = match error {
        ResolveError::UnresolvedCommand { .. } => ErrorCode::Unresolved,
        ResolveError::MissingSubstitution { .. } => ErrorCode::MissingSubstitution,
    };
    ExecutionResult::failure(host, code, error.to_string(), Utc::now(), Duration::ZERO)
}

/// Work for one host of a dispatch
struct HostJob {
    session: Arc<RemoteSession>,
    command: String,
    timeout: Duration,
    output_visible: bool,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl HostJob {
    /// Waits for a parallelism slot, then runs with retries.
    async fn run_queued(self, semaphore: &Semaphore) -> ExecutionResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            permit = semaphore.acquire() => permit.ok(),
        };
        let Some(_permit) = permit else {
            return ExecutionResult::cancelled(
                self.session.host().name(),
                started_at,
                start.elapsed(),
            );
        };
        self.run_with_retry().await
    }

    async fn run_with_retry(&self) -> ExecutionResult {
        let host = self.session.host().name();
        let started_at = Utc::now();
        let start = Instant::now();
        let mut retry = 0;
        loop {
            let mut result = self
                .session
                .execute(&self.command, self.timeout, self.output_visible, &self.cancel)
                .await;
            result.attempts = retry + 1;

            let delay = if result.is_retryable() {
                self.retry.delay_for_retry(retry)
            } else {
                None
            };
            let Some(delay) = delay else {
                return result;
            };

            tracing::debug!(
                host,
                outcome = %result.summary(),
                attempt = retry + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying remote command"
            );
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    let mut cancelled = ExecutionResult::cancelled(host, started_at, start.elapsed());
                    cancelled.attempts = retry + 1;
                    return cancelled;
                }
                () = tokio::time::sleep(delay) => {}
            }
            retry += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{Outcome, Reply, ScriptedTransport, TransportError};

    fn hosts(names: &[&str]) -> Vec<Arc<Host>> {
        names
            .iter()
            .map(|n| Arc::new(Host::new(*n, format!("{n}.example"))))
            .collect()
    }

    fn executor(transport: &ScriptedTransport, max_parallel: usize) -> AsyncExecutor {
        let settings = ExecutorSettings {
            max_parallel,
            timeout_secs: 5,
            retry: RetryConfig::no_retry(),
        };
        AsyncExecutor::new(
            Arc::new(SessionPool::new(Arc::new(transport.clone()))),
            &settings,
        )
    }

    #[tokio::test]
    async fn test_one_failing_host_does_not_affect_others() {
        let transport = ScriptedTransport::new()
            .fallback(Reply::stdout("ok"))
            .on_host("b", Reply::exit(1, "broken"));
        let exec = executor(&transport, 8);
        let results = exec
            .dispatch_all(&hosts(&["a", "b", "c"]), |_| Ok("true".into()))
            .join()
            .await;

        assert_eq!(results.len(), 3);
        let summary = DispatchSummary::from_results(&results);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        let b = results.iter().find(|r| r.host == "b").unwrap();
        assert_eq!(b.error_code, Some(ErrorCode::NonZeroExit));
    }

    #[tokio::test]
    async fn test_resolution_error_fails_only_that_host() {
        let transport = ScriptedTransport::new().fallback(Reply::stdout("ok"));
        let exec = executor(&transport, 8);
        let results = exec
            .dispatch_all(&hosts(&["a", "b"]), |h| {
                if h.name() == "a" {
                    Err(ResolveError::UnresolvedCommand {
                        name: "X".into(),
                        distribution: "generic".into(),
                    })
                } else {
                    Ok("true".into())
                }
            })
            .join()
            .await;

        let a = results.iter().find(|r| r.host == "a").unwrap();
        assert_eq!(a.error_code, Some(ErrorCode::Unresolved));
        assert!(results.iter().any(|r| r.host == "b" && r.is_success()));
        assert!(transport.commands_for("a").is_empty());
    }

    #[tokio::test]
    async fn test_cancel_keeps_completed_results() {
        let transport = ScriptedTransport::new()
            .fallback(Reply::stdout("slow").after(Duration::from_secs(30)))
            .on_host("fast", Reply::stdout("done"));
        let exec = executor(&transport, 3);
        let mut dispatch =
            exec.dispatch_all(&hosts(&["fast", "slow1", "slow2"]), |_| Ok("cmd".into()));

        let (first, result) = dispatch.next().await.unwrap();
        assert_eq!(first, "fast");
        assert!(result.is_success());

        dispatch.cancel();
        let rest = dispatch.join().await;
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|r| r.outcome == Outcome::Cancelled));
        tokio::task::yield_now().await;
        assert_eq!(transport.live_handles(), 0);
    }

    #[tokio::test]
    async fn test_retry_is_sequential_per_host() {
        let transport = ScriptedTransport::new().fallback(Reply::error(
            TransportError::Connection {
                host: "a".into(),
                message: "refused".into(),
            },
        ));
        let exec = executor(&transport, 4).with_retry(
            RetryConfig::new()
                .with_max_retries(2)
                .with_initial_delay_ms(5),
        );
        let results = exec
            .dispatch_all(&hosts(&["a"]), |_| Ok("probe".into()))
            .join()
            .await;

        assert_eq!(results[0].error_code, Some(ErrorCode::Transport));
        assert_eq!(results[0].attempts, 3);
        assert_eq!(transport.commands_for("a").len(), 3);
    }

    #[tokio::test]
    async fn test_empty_host_set_finishes_immediately() {
        let exec = executor(&ScriptedTransport::new(), 2);
        let mut dispatch = exec.dispatch_all(&[], |_| Ok(String::new()));
        assert!(dispatch.next().await.is_none());
    }
}
