//! Property tests for the payload parsers

use drbdcon_core::parser::{self, VNC_BASE_PORT, VncPort};
use drbdcon_core::{ParsedRecord, PayloadKind};
use proptest::prelude::*;

proptest! {
    /// Property: `:N` displays map to 5900 + N
    #[test]
    fn vnc_display_maps_to_port(n in 0u16..1000) {
        prop_assert_eq!(
            VncPort::from_display(&format!(":{n}")),
            VncPort::Known(VNC_BASE_PORT + n)
        );
        prop_assert_eq!(
            VncPort::from_display(&format!("127.0.0.1:{n}")),
            VncPort::Known(VNC_BASE_PORT + n)
        );
    }

    /// Property: displays without a number are unknown
    #[test]
    fn non_numeric_display_is_unknown(s in "[a-z ]{0,12}") {
        prop_assert_eq!(VncPort::from_display(&s), VncPort::Unknown);
    }

    /// Property: arbitrary input never panics and every payload kind
    /// returns records or diagnostics, never an error
    #[test]
    fn parse_never_panics(raw in ".{0,400}", index in 0usize..6) {
        let kind = PayloadKind::ALL[index];
        let outcome = parser::parse(&raw, kind);
        for record in &outcome.records {
            prop_assert!(kind.record_kinds().contains(&record.kind()));
        }
    }

    /// Property: a truncated domain document yields no records and one
    /// diagnostic
    #[test]
    fn truncated_xml_is_rejected(cut in 1usize..60) {
        let doc = "<vms><vm state=\"running\"><domain><name>web</name></domain></vm></vms>";
        let truncated = &doc[..doc.len() - cut.min(doc.len() - 6)];
        let outcome = parser::parse(truncated, PayloadKind::DomainXml);
        prop_assert!(outcome.records.is_empty(), "{truncated}: {:?}", outcome.records);
        prop_assert_eq!(outcome.diagnostics.len(), 1);
    }

    /// Property: host-info blocks always produce exactly one facts record
    #[test]
    fn host_info_yields_one_record(kernel in "[0-9]\\.[0-9]{1,2}\\.[0-9]{1,3}") {
        let raw = format!("hostname: h\nkernel-version: {kernel}\n");
        let outcome = parser::parse(&raw, PayloadKind::HostInfo);
        prop_assert_eq!(outcome.records.len(), 1);
        let is_facts = matches!(
            &outcome.records[0],
            ParsedRecord::HostFacts(f) if f.kernel_version.as_deref() == Some(kernel.as_str())
        );
        prop_assert!(is_facts);
    }
}
