//! Remote command execution
//!
//! A [`RemoteSession`] runs one command at a time on one host through a
//! [`Transport`], enforcing a wall-clock timeout and honouring a
//! [`CancellationToken`]. Every exit path produces an [`ExecutionResult`];
//! execution problems are never returned as `Err`.

mod cancel;
mod pool;
mod result;
pub mod scripted;
mod session;
mod ssh;
mod transport;

pub use cancel::CancellationToken;
pub use pool::SessionPool;
pub use result::{ErrorCode, ExecutionResult, Outcome};
pub use scripted::{Reply, ScriptedTransport};
pub use session::RemoteSession;
pub use ssh::SshTransport;
pub use transport::{Transport, TransportError, TransportOutput};
