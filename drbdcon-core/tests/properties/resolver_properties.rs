//! Property tests for command resolution

use std::sync::Arc;

use drbdcon_core::{CommandResolver, DistributionKey, LookupScope, ResolveError, StaticCommandTable};
use proptest::prelude::*;

fn resolver() -> CommandResolver {
    let mut table = StaticCommandTable::new();
    table.insert("Show", LookupScope::Generic, "show @RES@ --vol @VOL@");
    table.insert("Show", LookupScope::Family("debian".into()), "debian-show @RES@");
    table.insert(
        "Show",
        LookupScope::Version {
            family: "debian".into(),
            version: "12".into(),
        },
        "bookworm-show @RES@ @VOL@",
    );
    CommandResolver::new(Arc::new(table))
}

fn key_strategy() -> impl Strategy<Value = DistributionKey> {
    (
        prop_oneof![Just("debian"), Just("rocky"), Just("ubuntu")],
        prop::option::of(prop_oneof![Just("12"), Just("9"), Just("24.04")]),
        prop::option::of(prop_oneof![Just("x86_64"), Just("aarch64")]),
    )
        .prop_map(|(family, version, arch)| DistributionKey::new(family, version, arch))
}

proptest! {
    /// Property: the same inputs always resolve to the same command
    #[test]
    fn resolve_is_deterministic(
        key in key_strategy(),
        res in "[a-z][a-z0-9_]{0,12}",
        vol in 0u32..16,
    ) {
        let resolver = resolver();
        let subs = vec![
            ("RES".to_string(), res.clone()),
            ("VOL".to_string(), vol.to_string()),
        ];
        let first = resolver.resolve("Show", &subs, &key);
        let second = resolver.resolve("Show", &subs, &key);
        prop_assert_eq!(&first, &second);
        let command = first.unwrap();
        prop_assert!(command.contains(&res));
        prop_assert!(!command.contains('@'));
    }

    /// Property: the most specific scope with an entry is used
    #[test]
    fn most_specific_scope_wins(key in key_strategy()) {
        let resolver = resolver();
        let subs = vec![
            ("RES".to_string(), "r0".to_string()),
            ("VOL".to_string(), "0".to_string()),
        ];
        let command = resolver.resolve("Show", &subs, &key).unwrap();
        let expected = match (key.family.as_deref(), key.version.as_deref()) {
            (Some("debian"), Some("12")) => "bookworm-show r0 0",
            (Some("debian"), _) => "debian-show r0",
            _ => "show r0 --vol 0",
        };
        prop_assert_eq!(command, expected);
    }

    /// Property: substituted values are never rescanned for placeholders
    #[test]
    fn values_are_inserted_verbatim(value in "[@A-Z]{0,10}") {
        let resolver = resolver();
        let subs = vec![
            ("RES".to_string(), value.clone()),
            ("VOL".to_string(), "@RES@".to_string()),
        ];
        let command = resolver
            .resolve("Show", &subs, &DistributionKey::generic())
            .unwrap();
        prop_assert_eq!(command, format!("show {value} --vol @RES@"));
    }

    /// Property: a missing value names the placeholder
    #[test]
    fn missing_value_is_reported(res in "[a-z]{1,8}") {
        let resolver = resolver();
        let subs = vec![("RES".to_string(), res)];
        let err = resolver
            .resolve("Show", &subs, &DistributionKey::generic())
            .unwrap_err();
        let is_missing_vol = matches!(
            err,
            ResolveError::MissingSubstitution { ref placeholder, .. } if placeholder == "VOL"
        );
        prop_assert!(is_missing_vol);
    }
}
