// crates/otto-bgp-core/tests/proptest_vrp.rs
// ============================================================================
// Module: VRP Entry Property Tests
// Description: Property tests for the VRP entry construction invariant and
// its JSON round-trip law (section 8).
// Purpose: Cover the constructor's `prefix_len <= max_length <= 32`
// invariant and serde round-tripping across a wide input range.
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use ipnet::Ipv4Net;
use otto_bgp_core::Asn;
use otto_bgp_core::VrpEntry;
use proptest::prelude::*;

fn ipv4_net_strategy() -> impl Strategy<Value = Ipv4Net> {
    (any::<u32>(), 0u8..=32).prop_map(|(addr, prefix_len)| {
        Ipv4Net::new(addr.into(), prefix_len)
            .unwrap_or_else(|_| Ipv4Net::new(addr.into(), 32).expect("32 is always valid"))
            .trunc()
    })
}

proptest! {
    #[test]
    fn new_accepts_iff_prefix_len_le_max_length_le_32(
        prefix in ipv4_net_strategy(),
        max_length in 0u8..=40,
        asn in any::<u32>(),
    ) {
        let result = VrpEntry::new(Asn::new(asn), prefix, max_length, "ripe");
        let expected_ok = max_length >= prefix.prefix_len() && max_length <= 32;
        prop_assert_eq!(result.is_ok(), expected_ok);
    }

    #[test]
    fn json_round_trip_preserves_every_field(
        prefix in ipv4_net_strategy(),
        asn in any::<u32>(),
        trust_anchor in "[a-z]{0,8}",
    ) {
        let max_length = prefix.prefix_len();
        let entry = VrpEntry::new(Asn::new(asn), prefix, max_length, trust_anchor.clone()).unwrap();

        let json = serde_json::to_string(&entry).unwrap();
        let reloaded: VrpEntry = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(reloaded.asn(), entry.asn());
        prop_assert_eq!(reloaded.prefix(), entry.prefix());
        prop_assert_eq!(reloaded.max_length(), entry.max_length());
        prop_assert_eq!(reloaded.trust_anchor(), entry.trust_anchor());
        prop_assert_eq!(reloaded.trust_anchor(), trust_anchor.as_str());
    }
}
