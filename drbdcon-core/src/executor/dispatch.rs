//! Handle to one aggregate execution across a host set.

use std::collections::HashSet;
use std::fmt;

use chrono::Utc;
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::remote::{CancellationToken, ExecutionResult, Outcome};

/// In-flight dispatch of one command to many hosts
///
/// Results arrive in completion order through [`Dispatch::next`]; each host
/// reports exactly once. Dropping the handle cancels every host that has not
/// finished yet.
pub struct Dispatch {
    id: Uuid,
    receiver: mpsc::UnboundedReceiver<(String, ExecutionResult)>,
    pending: HashSet<String>,
    cancel: CancellationToken,
}

impl Dispatch {
    pub(super) fn new(
        id: Uuid,
        receiver: mpsc::UnboundedReceiver<(String, ExecutionResult)>,
        hosts: impl IntoIterator<Item = String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            receiver,
            pending: hosts.into_iter().collect(),
            cancel,
        }
    }

    /// Identifier shared by all log records of this dispatch
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Number of hosts that have not reported yet
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Waits for the next host to finish
    ///
    /// Returns `None` once every host has reported.
    pub async fn next(&mut self) -> Option<(String, ExecutionResult)> {
        if self.pending.is_empty() {
            return None;
        }
        if let Some((host, result)) = self.receiver.recv().await {
            self.pending.remove(&host);
            return Some((host, result));
        }
        // A worker went away without reporting; its host still gets a result.
        let host = self.pending.iter().next().cloned()?;
        self.pending.remove(&host);
        tracing::warn!(dispatch_id = %self.id, host = %host, "Host task ended without a result");
        let result = ExecutionResult::cancelled(&host, Utc::now(), std::time::Duration::ZERO);
        Some((host, result))
    }

    /// Waits for all hosts and returns their results in completion order
    pub async fn join(mut self) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(self.pending.len());
        while let Some((_, result)) = self.next().await {
            results.push(result);
        }
        results
    }

    /// Turns the dispatch into a stream of `(host, result)` pairs in
    /// completion order
    ///
    /// Dropping the stream before it ends cancels the remaining hosts.
    pub fn into_stream(self) -> impl Stream<Item = (String, ExecutionResult)> + Send {
        futures::stream::unfold(self, |mut dispatch| async move {
            let item = dispatch.next().await?;
            Some((item, dispatch))
        })
    }

    /// Cancels every host that is still queued or running
    ///
    /// Those hosts report [`Outcome::Cancelled`]; results that were already
    /// produced are unaffected.
    pub fn cancel(&self) {
        if !self.pending.is_empty() {
            tracing::info!(dispatch_id = %self.id, remaining = self.pending.len(), "Cancelling dispatch");
        }
        self.cancel.cancel();
    }

    /// Token observed by every host of this dispatch
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for Dispatch {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            self.cancel.cancel();
        }
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("id", &self.id)
            .field("remaining", &self.pending.len())
            .finish_non_exhaustive()
    }
}

/// Outcome counts of a finished dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// Number of hosts
    pub total: usize,
    /// Hosts that succeeded
    pub succeeded: usize,
    /// Hosts that failed
    pub failed: usize,
    /// Hosts that timed out
    pub timed_out: usize,
    /// Hosts that were cancelled
    pub cancelled: usize,
}

impl DispatchSummary {
    /// Counts the outcomes in `results`
    #[must_use]
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ExecutionResult>) -> Self {
        results
            .into_iter()
            .fold(Self::default(), |mut summary, result| {
                summary.total += 1;
                match result.outcome {
                    Outcome::Success => summary.succeeded += 1,
                    Outcome::Failure => summary.failed += 1,
                    Outcome::Timeout => summary.timed_out += 1,
                    Outcome::Cancelled => summary.cancelled += 1,
                }
                summary
            })
    }

    /// Returns true if every host succeeded
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }
}

impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} succeeded, {} failed, {} timed out, {} cancelled",
            self.succeeded, self.total, self.failed, self.timed_out, self.cancelled
        )
    }
}
