// crates/otto-bgp-rpki/tests/proptest_validator.rs
// ============================================================================
// Module: RPKI Validator Property Tests
// Description: Property test for validate_prefixes_parallel's order
// preservation law (section 8).
// Purpose: Cover the chunked worker-pool path against the sequential path
// across randomized prefix lists and worker counts, independent of the
// handful of fixed cases already covered by unit tests.
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use ipnet::Ipv4Net;
use otto_bgp_config::RpkiConfig;
use otto_bgp_core::Asn;
use otto_bgp_core::Timestamp;
use otto_bgp_core::VrpDataset;
use otto_bgp_core::VrpEntry;
use otto_bgp_core::VrpSourceFormat;
use otto_bgp_rpki::Allowlist;
use otto_bgp_rpki::RpkiValidator;
use otto_bgp_rpki::VrpStore;
use proptest::prelude::*;

fn validator_seeded_with(asn: u32) -> RpkiValidator {
    let store = VrpStore::new("/tmp/unused.json");
    let entry = VrpEntry::new(Asn::new(asn), "1.1.0.0/16".parse().unwrap(), 32, "ripe").unwrap();
    store.install(VrpDataset::new(
        vec![entry],
        Timestamp::now(),
        VrpSourceFormat::Cached,
        None,
    ));
    RpkiValidator::new(store, Allowlist::empty(), &RpkiConfig::default())
}

fn prefix_strategy() -> impl Strategy<Value = Ipv4Net> {
    (0u8..=255, 24u8..=32).prop_map(|(last_octet, prefix_len)| {
        format!("1.1.0.{last_octet}/{prefix_len}")
            .parse()
            .unwrap_or_else(|_| "1.1.0.0/32".parse().unwrap())
    })
}

proptest! {
    #[test]
    fn parallel_validation_preserves_input_order(
        prefixes in prop::collection::vec(prefix_strategy(), 0..60),
        worker_count in 1usize..8,
        asn in any::<u32>(),
    ) {
        let validator = validator_seeded_with(asn);

        let sequential: Vec<_> = prefixes
            .iter()
            .map(|p| validator.validate_prefix_origin(*p, Asn::new(asn)).state())
            .collect();
        let parallel: Vec<_> = validator
            .validate_prefixes_parallel(&prefixes, Asn::new(asn), Some(worker_count), false)
            .into_iter()
            .map(|r| r.state())
            .collect();

        prop_assert_eq!(parallel.len(), prefixes.len());
        prop_assert_eq!(sequential, parallel);
    }
}
