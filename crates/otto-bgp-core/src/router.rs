// crates/otto-bgp-core/src/router.rs
// ============================================================================
// Module: Router Profile
// Description: Identity and discovered facts for one target device.
// Purpose: Carry discovery output (peer ASNs, BGP groups, RPKI results)
// through generation and into the apply pipeline.
// Dependencies: serde, crate::{identifiers, validation}
// ============================================================================

//! ## Overview
//! A [`RouterProfile`] is created at discovery time and mutated only during
//! discovery (§3); the apply pipeline treats it as read-only.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::Asn;
use crate::identifiers::Hostname;
use crate::validation::ValidationState;

/// The operational role a router plays, used by the Phased rollout
/// strategy's grouping key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Role(pub String);

/// A deployment region, used by the Phased rollout strategy's grouping key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Region(pub String);

/// Identity and discovered facts for one target device.
///
/// # Invariants
/// - Mutated only during discovery; read-only afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterProfile {
    hostname: Hostname,
    address: String,
    role: Role,
    region: Region,
    discovered_as_numbers: Vec<Asn>,
    bgp_groups: BTreeMap<String, Vec<Asn>>,
    rpki_results: BTreeMap<Asn, ValidationState>,
}

impl RouterProfile {
    /// Construct a profile from discovery output.
    #[must_use]
    pub fn new(hostname: Hostname, address: impl Into<String>, role: Role, region: Region) -> Self {
        Self {
            hostname,
            address: address.into(),
            role,
            region,
            discovered_as_numbers: Vec::new(),
            bgp_groups: BTreeMap::new(),
            rpki_results: BTreeMap::new(),
        }
    }

    /// The router's hostname.
    #[must_use]
    pub fn hostname(&self) -> &Hostname {
        &self.hostname
    }

    /// The router's management address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The router's operational role.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// The router's deployment region.
    #[must_use]
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// AS numbers discovered as BGP peers of this router.
    #[must_use]
    pub fn discovered_as_numbers(&self) -> &[Asn] {
        &self.discovered_as_numbers
    }

    /// BGP groups, keyed by group name, to their peer AS numbers.
    #[must_use]
    pub fn bgp_groups(&self) -> &BTreeMap<String, Vec<Asn>> {
        &self.bgp_groups
    }

    /// RPKI validation state recorded for a discovered peer ASN, if any.
    #[must_use]
    pub fn rpki_result(&self, asn: Asn) -> Option<ValidationState> {
        self.rpki_results.get(&asn).copied()
    }

    /// Record a discovered peer AS number. Discovery-time mutation only.
    pub fn record_peer_asn(&mut self, asn: Asn) {
        if !self.discovered_as_numbers.contains(&asn) {
            self.discovered_as_numbers.push(asn);
        }
    }

    /// Record a BGP group's membership. Discovery-time mutation only.
    pub fn record_bgp_group(&mut self, group_name: impl Into<String>, members: Vec<Asn>) {
        self.bgp_groups.insert(group_name.into(), members);
    }

    /// Record an RPKI validation state for a peer ASN. Discovery-time
    /// mutation only.
    pub fn record_rpki_result(&mut self, asn: Asn, state: ValidationState) {
        self.rpki_results.insert(asn, state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn record_peer_asn_is_idempotent() {
        let mut profile = RouterProfile::new(
            Hostname::new("r1"),
            "10.0.0.1",
            Role("edge".into()),
            Region("us-east".into()),
        );
        profile.record_peer_asn(Asn::new(13335));
        profile.record_peer_asn(Asn::new(13335));
        assert_eq!(profile.discovered_as_numbers().len(), 1);
    }

    #[test]
    fn bgp_group_lookup_returns_recorded_members() {
        let mut profile = RouterProfile::new(
            Hostname::new("r1"),
            "10.0.0.1",
            Role("edge".into()),
            Region("us-east".into()),
        );
        profile.record_bgp_group("transit", vec![Asn::new(7922)]);
        assert_eq!(
            profile.bgp_groups().get("transit"),
            Some(&vec![Asn::new(7922)])
        );
    }
}
