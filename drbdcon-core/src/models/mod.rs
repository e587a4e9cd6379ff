//! Core data structures for hosts and their identity
//!
//! Hosts are owned by a [`HostRegistry`]; everything else in the crate
//! refers to them through `Arc<Host>` handles.

mod credentials;
mod distribution;
mod host;

pub use credentials::{Credentials, DEFAULT_USER};
pub use distribution::{DistributionKey, LookupScope};
pub use host::{DEFAULT_SSH_PORT, Host, HostFacts, HostRegistry};
