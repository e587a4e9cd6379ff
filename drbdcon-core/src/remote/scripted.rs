//! In-memory transport with canned replies.
//!
//! Used for offline runs and tests: every call is matched against the
//! configured rules and answered after an optional delay. The transport
//! counts live handles so callers can check that timeouts and
//! cancellation release everything they acquired.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::transport::{Transport, TransportError, TransportOutput};
use crate::models::Host;

/// Canned response for a matched call
#[derive(Debug, Clone, Default)]
pub struct Reply {
    /// Output returned on success
    pub output: TransportOutput,
    /// Delay before replying
    pub delay: Duration,
    /// Error returned instead of output
    pub error: Option<TransportError>,
}

impl Reply {
    /// Replies with the given stdout and exit status 0
    #[must_use]
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            output: TransportOutput::ok(stdout),
            ..Self::default()
        }
    }

    /// Replies with a non-zero exit status
    #[must_use]
    pub fn exit(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            output: TransportOutput {
                exit_code: Some(code),
                stdout: String::new(),
                stderr: stderr.into(),
            },
            ..Self::default()
        }
    }

    /// Replies with a transport error
    #[must_use]
    pub fn error(error: TransportError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Delays the reply
    #[must_use]
    pub const fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
struct Rule {
    host: Option<String>,
    command_contains: Option<String>,
    reply: Reply,
}

impl Rule {
    fn matches(&self, host: &str, command: &str) -> bool {
        self.host.as_deref().is_none_or(|h| h == host)
            && self
                .command_contains
                .as_deref()
                .is_none_or(|c| command.contains(c))
    }
}

/// A call observed by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Host name
    pub host: String,
    /// Full command line
    pub command: String,
}

/// Transport answering from a list of rules
///
/// Rules are checked most recently added first; the first match wins.
/// Calls with no matching rule exit with status 127.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    live: Arc<AtomicUsize>,
}

/// Decrements the live-handle count when the in-flight call ends or is dropped
struct LiveHandle(Arc<AtomicUsize>);

impl LiveHandle {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedTransport {
    /// Creates a transport with no rules
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every command on `host` with `reply`
    #[must_use]
    pub fn on_host(self, host: &str, reply: Reply) -> Self {
        self.push(Some(host), None, reply);
        self
    }

    /// Answers commands containing `fragment` on any host
    #[must_use]
    pub fn on_command(self, fragment: &str, reply: Reply) -> Self {
        self.push(None, Some(fragment), reply);
        self
    }

    /// Answers commands containing `fragment` on `host`
    #[must_use]
    pub fn on(self, host: &str, fragment: &str, reply: Reply) -> Self {
        self.push(Some(host), Some(fragment), reply);
        self
    }

    /// Answers every call with `reply` unless a more recent rule matches
    #[must_use]
    pub fn fallback(self, reply: Reply) -> Self {
        self.push(None, None, reply);
        self
    }

    /// Adds a rule after construction
    pub fn push(&self, host: Option<&str>, command_contains: Option<&str>, reply: Reply) {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Rule {
                host: host.map(str::to_string),
                command_contains: command_contains.map(str::to_string),
                reply,
            });
    }

    /// Number of calls currently in flight
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// All calls seen so far, in issue order
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Commands issued to one host, in issue order
    #[must_use]
    pub fn commands_for(&self, host: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.host == host)
            .map(|c| c.command)
            .collect()
    }

    fn reply_for(&self, host: &str, command: &str) -> Option<Reply> {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|r| r.matches(host, command))
            .map(|r| r.reply.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn run(&self, host: &Host, command: &str) -> Result<TransportOutput, TransportError> {
        let _handle = LiveHandle::acquire(&self.live);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                host: host.name().to_string(),
                command: command.to_string(),
            });

        let Some(reply) = self.reply_for(host.name(), command) else {
            return Ok(TransportOutput {
                exit_code: Some(127),
                stdout: String::new(),
                stderr: format!("no scripted reply for `{command}`"),
            });
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        match reply.error {
            Some(error) => Err(error),
            None => Ok(reply.output),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_most_recent_matching_rule_wins() {
        let transport = ScriptedTransport::new()
            .fallback(Reply::stdout("any"))
            .on_host("a", Reply::stdout("host a"))
            .on("a", "uname", Reply::stdout("a uname"));
        let a = Host::new("a", "a");
        let b = Host::new("b", "b");

        assert_eq!(transport.run(&a, "uname -r").await.unwrap().stdout, "a uname");
        assert_eq!(transport.run(&a, "ls").await.unwrap().stdout, "host a");
        assert_eq!(transport.run(&b, "ls").await.unwrap().stdout, "any");
        assert_eq!(transport.commands_for("a"), vec!["uname -r", "ls"]);
    }

    #[tokio::test]
    async fn test_unmatched_call_exits_127() {
        let transport = ScriptedTransport::new();
        let out = transport.run(&Host::new("a", "a"), "ls").await.unwrap();
        assert_eq!(out.exit_code, Some(127));
    }

    #[tokio::test]
    async fn test_dropped_call_releases_handle() {
        let transport =
            ScriptedTransport::new().fallback(Reply::stdout("").after(Duration::from_secs(60)));
        let host = Host::new("a", "a");
        let run = transport.run(&host, "sleep");
        let result = tokio::time::timeout(Duration::from_millis(20), run).await;
        assert!(result.is_err());
        assert_eq!(transport.live_handles(), 0);
    }
}
