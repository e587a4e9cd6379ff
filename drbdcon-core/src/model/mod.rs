//! In-memory domain model fed by parsed inspection results
//!
//! Writers are serialized by a mutex and publish a new [`ModelSnapshot`]
//! per commit by swapping an `Arc`; readers only ever see fully committed
//! merges. Each commit bumps a generation counter that subscribers observe
//! through a `tokio::sync::watch` channel.

mod snapshot;

pub use snapshot::{HostRecords, ModelSnapshot, PeerBlockDevice};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::watch;

use crate::parser::{ParsedRecord, RecordKind};

/// Mutable model of every host's records
#[derive(Debug)]
pub struct DomainModel {
    current: RwLock<Arc<ModelSnapshot>>,
    writer: Mutex<()>,
    generation: watch::Sender<u64>,
}

impl Default for DomainModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainModel {
    /// Creates an empty model at generation 0
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(ModelSnapshot::default())),
            writer: Mutex::new(()),
            generation: watch::channel(0).0,
        }
    }

    /// Returns the current snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Receives the generation number after every commit
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Replaces the host's records of every kind in `kinds` and of every
    /// kind present in `records`.
    ///
    /// A kind listed in `kinds` with no records is cleared. Returns the new
    /// generation.
    pub fn merge(&self, host: &str, kinds: &[RecordKind], records: Vec<ParsedRecord>) -> u64 {
        let mut grouped: BTreeMap<RecordKind, BTreeMap<String, ParsedRecord>> =
            kinds.iter().map(|k| (*k, BTreeMap::new())).collect();
        for record in records {
            grouped
                .entry(record.kind())
                .or_default()
                .insert(record.record_key(), record);
        }
        let touched: Vec<RecordKind> = grouped.keys().copied().collect();

        let generation = self.commit(|snapshot| {
            let entry = snapshot.hosts.entry(host.to_string()).or_default();
            let records = Arc::make_mut(entry);
            for (kind, by_key) in grouped {
                records.replace_kind(kind, by_key);
            }
            if records.is_empty() {
                snapshot.hosts.remove(host);
            }
        });
        tracing::debug!(host, kinds = ?touched, generation, "Merged records");
        generation
    }

    /// Adds or replaces records by key, leaving other records untouched.
    ///
    /// Returns the new generation.
    pub fn merge_incremental(&self, host: &str, records: Vec<ParsedRecord>) -> u64 {
        let count = records.len();
        let generation = self.commit(|snapshot| {
            let entry = snapshot.hosts.entry(host.to_string()).or_default();
            let host_records = Arc::make_mut(entry);
            for record in records {
                host_records.upsert(record);
            }
            if host_records.is_empty() {
                snapshot.hosts.remove(host);
            }
        });
        tracing::debug!(host, records = count, generation, "Upserted records");
        generation
    }

    /// Drops every record of a host. Returns false if the host had none.
    pub fn remove_host(&self, host: &str) -> bool {
        let mut removed = false;
        self.commit(|snapshot| removed = snapshot.hosts.remove(host).is_some());
        removed
    }

    /// Hosts that currently have records
    #[must_use]
    pub fn hosts(&self) -> BTreeSet<String> {
        self.snapshot().host_names().map(str::to_string).collect()
    }

    /// Applies `change` to a copy of the current snapshot and publishes it.
    fn commit(&self, change: impl FnOnce(&mut ModelSnapshot)) -> u64 {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = ModelSnapshot::clone(&self.snapshot());
        change(&mut next);
        next.generation += 1;
        let generation = next.generation;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        self.generation.send_replace(generation);
        generation
    }
}
