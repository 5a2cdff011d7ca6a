// crates/otto-bgp-core/src/vrp.rs
// ============================================================================
// Module: VRP Entry / Dataset
// Description: Validated ROA Payload entities (section 3).
// Purpose: Canonical representation shared by the VRP store, the validator,
// and the on-disk cache format.
// Dependencies: serde, ipnet, crate::identifiers
// ============================================================================

//! ## Overview
//! A [`VrpEntry`] is immutable once constructed; a [`VrpDataset`] is the
//! collection-plus-metadata unit the VRP store hot-swaps as a whole (§5).

use ipnet::Ipv4Net;
use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::Asn;
use crate::time::Timestamp;

/// An error constructing a [`VrpEntry`] from untrusted input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VrpEntryError {
    /// `max_length` was less than the prefix's own length, or greater than
    /// 32.
    #[error("max_length {max_length} out of range for prefix length {prefix_len} (must satisfy prefix_len <= max_length <= 32)")]
    MaxLengthOutOfRange {
        /// The prefix's network length.
        prefix_len: u8,
        /// The rejected max-length value.
        max_length: u8,
    },
}

/// One Validated ROA Payload: `(prefix, maxLength, origin ASN, trust
/// anchor)`.
///
/// # Invariants
/// - `0 <= asn <= u32::MAX`.
/// - `prefix.len() <= max_length <= 32`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrpEntry {
    asn: Asn,
    prefix: Ipv4Net,
    max_length: u8,
    trust_anchor: String,
}

impl VrpEntry {
    /// Construct a VRP entry, validating the `prefix_len <= max_length <=
    /// 32` invariant. `trust_anchor` is the RIR/TA name the upstream ROA was
    /// published under (e.g. `"arin"`, `"ripe"`); pass an empty string when
    /// the upstream document doesn't carry one (§6 cache schema's `ta`
    /// field is optional on the wire, defaulting to `""`).
    ///
    /// # Errors
    /// Returns [`VrpEntryError::MaxLengthOutOfRange`] if the invariant does
    /// not hold.
    pub fn new(asn: Asn, prefix: Ipv4Net, max_length: u8, trust_anchor: impl Into<String>) -> Result<Self, VrpEntryError> {
        let prefix_len = prefix.prefix_len();
        if max_length < prefix_len || max_length > 32 {
            return Err(VrpEntryError::MaxLengthOutOfRange {
                prefix_len,
                max_length,
            });
        }
        Ok(Self {
            asn,
            prefix,
            max_length,
            trust_anchor: trust_anchor.into(),
        })
    }

    /// The origin AS this VRP authorizes.
    #[must_use]
    pub fn asn(&self) -> Asn {
        self.asn
    }

    /// The authorized prefix.
    #[must_use]
    pub fn prefix(&self) -> Ipv4Net {
        self.prefix
    }

    /// The maximum authorized prefix length.
    #[must_use]
    pub fn max_length(&self) -> u8 {
        self.max_length
    }

    /// The trust anchor this VRP was published under, or `""` when the
    /// upstream document didn't carry one.
    #[must_use]
    pub fn trust_anchor(&self) -> &str {
        &self.trust_anchor
    }

    /// True if `self` covers `other` (including equality): `self`'s network
    /// contains `other`'s network and `self`'s prefix is no more specific.
    #[must_use]
    pub fn covers(&self, other: Ipv4Net) -> bool {
        self.prefix.prefix_len() <= other.prefix_len() && self.prefix.contains(&other.network())
    }
}

/// Where a loaded VRP dataset's JSON originated, used to pick a parser and
/// recorded for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VrpSourceFormat {
    /// Native `rpki-client` JSON (`{"roas": [...]}`).
    RpkiClient,
    /// Native Routinator JSON (`{"validated-roa-payloads": [...]}`).
    Routinator,
    /// Otto BGP's own canonical cache shape.
    Cached,
}

/// A collection of VRP entries plus load metadata.
///
/// # Invariants
/// - The dataset is *stale* when `now - generated_time > max_age` or
///   `now > expires_time` (see [`VrpDataset::is_stale`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrpDataset {
    entries: Vec<VrpEntry>,
    generated_time: Timestamp,
    source_format: VrpSourceFormat,
    expires_time: Option<Timestamp>,
}

impl VrpDataset {
    /// Construct a dataset from already-validated entries.
    #[must_use]
    pub fn new(
        entries: Vec<VrpEntry>,
        generated_time: Timestamp,
        source_format: VrpSourceFormat,
        expires_time: Option<Timestamp>,
    ) -> Self {
        Self {
            entries,
            generated_time,
            source_format,
            expires_time,
        }
    }

    /// All entries in the dataset. Order is unspecified; treat as a set.
    #[must_use]
    pub fn entries(&self) -> &[VrpEntry] {
        &self.entries
    }

    /// When this dataset was generated by its upstream source.
    #[must_use]
    pub fn generated_time(&self) -> Timestamp {
        self.generated_time
    }

    /// Which upstream format this dataset was normalized from.
    #[must_use]
    pub fn source_format(&self) -> VrpSourceFormat {
        self.source_format
    }

    /// The upstream's stated expiry, if any.
    #[must_use]
    pub fn expires_time(&self) -> Option<Timestamp> {
        self.expires_time
    }

    /// True if the dataset is stale relative to `now`: either
    /// `now - generated_time > max_age_seconds`, or `now > expires_time`
    /// when an expiry is present (§3).
    #[must_use]
    pub fn is_stale(&self, now: Timestamp, max_age_seconds: i64) -> bool {
        let age_exceeded = self.generated_time.seconds_until(now) > max_age_seconds;
        let expired = self
            .expires_time
            .is_some_and(|expires| now.seconds_until(expires) < 0);
        age_exceeded || expired
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    #[test]
    fn rejects_max_length_shorter_than_prefix() {
        let err = VrpEntry::new(Asn::new(1), net("10.0.0.0/24"), 16, "arin").unwrap_err();
        assert_eq!(
            err,
            VrpEntryError::MaxLengthOutOfRange {
                prefix_len: 24,
                max_length: 16
            }
        );
    }

    #[test]
    fn rejects_max_length_over_32() {
        assert!(VrpEntry::new(Asn::new(1), net("10.0.0.0/24"), 33, "arin").is_err());
    }

    #[test]
    fn accepts_max_length_equal_to_prefix_len() {
        let entry = VrpEntry::new(Asn::new(1), net("10.0.0.0/24"), 24, "arin").unwrap();
        assert_eq!(entry.max_length(), 24);
    }

    #[test]
    fn covers_includes_equality() {
        let entry = VrpEntry::new(Asn::new(1), net("10.0.0.0/16"), 24, "arin").unwrap();
        assert!(entry.covers(net("10.0.0.0/16")));
        assert!(entry.covers(net("10.0.1.0/24")));
        assert!(!entry.covers(net("10.1.0.0/24")));
        assert!(!entry.covers(net("10.0.0.0/15")));
    }

    #[test]
    fn trust_anchor_defaults_to_empty_string() {
        let entry = VrpEntry::new(Asn::new(1), net("10.0.0.0/24"), 24, "").unwrap();
        assert_eq!(entry.trust_anchor(), "");
    }

    #[test]
    fn dataset_is_stale_past_max_age() {
        let generated = Timestamp::now();
        let dataset = VrpDataset::new(Vec::new(), generated, VrpSourceFormat::Cached, None);
        assert!(!dataset.is_stale(generated, 3600));
    }
}
