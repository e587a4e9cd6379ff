//! Property tests for domain model merges

use std::collections::BTreeSet;

use drbdcon_core::parser::BlockDevice;
use drbdcon_core::{DomainModel, ParsedRecord, RecordKind};
use proptest::prelude::*;

fn device(name: &str) -> ParsedRecord {
    ParsedRecord::BlockDevice(BlockDevice {
        name: name.to_string(),
        size_bytes: None,
        device_type: Some("disk".to_string()),
        fstype: None,
        mountpoint: None,
    })
}

fn names() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("/dev/sd[a-f][0-9]?", 0..8)
}

fn stored(model: &DomainModel, host: &str) -> BTreeSet<String> {
    model
        .snapshot()
        .records(host, RecordKind::BlockDevice)
        .map(ParsedRecord::record_key)
        .collect()
}

proptest! {
    /// Property: merging {A} then {B} for a kind leaves exactly {B}
    #[test]
    fn merge_replaces_the_kind(first in names(), second in names()) {
        let model = DomainModel::new();
        model.merge("h1", &[RecordKind::BlockDevice], first.iter().map(|n| device(n)).collect());
        model.merge("h1", &[RecordKind::BlockDevice], second.iter().map(|n| device(n)).collect());
        prop_assert_eq!(stored(&model, "h1"), second);
    }

    /// Property: a merge for one host never changes another host
    #[test]
    fn merge_is_per_host(other in names(), updates in prop::collection::vec(names(), 1..4)) {
        let model = DomainModel::new();
        model.merge("other", &[RecordKind::BlockDevice], other.iter().map(|n| device(n)).collect());
        for update in &updates {
            model.merge("h1", &[RecordKind::BlockDevice], update.iter().map(|n| device(n)).collect());
        }
        prop_assert_eq!(stored(&model, "other"), other);
    }

    /// Property: every merge bumps the generation by one
    #[test]
    fn generation_counts_merges(updates in prop::collection::vec(names(), 0..6)) {
        let model = DomainModel::new();
        let start = model.snapshot().generation();
        for update in &updates {
            model.merge("h1", &[RecordKind::BlockDevice], update.iter().map(|n| device(n)).collect());
        }
        prop_assert_eq!(model.snapshot().generation(), start + updates.len() as u64);
    }
}
