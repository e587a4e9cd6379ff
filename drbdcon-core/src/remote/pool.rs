//! Per-host session cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::session::RemoteSession;
use super::transport::Transport;
use crate::models::Host;

/// Hands out one shared [`RemoteSession`] per host
///
/// Sessions are created on first use. Commands sent through the shared
/// session of a host run one after another; callers that need parallel
/// commands on one host use [`SessionPool::checkout_fresh`].
pub struct SessionPool {
    transport: Arc<dyn Transport>,
    sessions: Mutex<HashMap<String, Arc<RemoteSession>>>,
}

impl SessionPool {
    /// Creates an empty pool over `transport`
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the shared session for `host`, creating it if needed
    #[must_use]
    pub fn session(&self, host: &Arc<Host>) -> Arc<RemoteSession> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(host.name().to_string()).or_insert_with(|| {
            tracing::debug!(host = host.name(), "Opening remote session");
            Arc::new(RemoteSession::new(
                Arc::clone(host),
                Arc::clone(&self.transport),
            ))
        }))
    }

    /// Returns a new session for `host` that is not shared with anyone
    #[must_use]
    pub fn checkout_fresh(&self, host: &Arc<Host>) -> RemoteSession {
        RemoteSession::new(Arc::clone(host), Arc::clone(&self.transport))
    }

    /// Drops the cached session for a host
    pub fn evict(&self, host: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(host)
            .is_some()
    }

    /// Number of cached sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no session has been opened yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("transport", &self.transport.name())
            .field("sessions", &self.len())
            .finish()
    }
}
