// crates/otto-bgp-core/src/identifiers.rs
// ============================================================================
// Module: Identifiers
// Description: Newtype identifiers used across the rollout hierarchy and
// policy model.
// Purpose: Prevent accidental mixing of string/int identifiers that have
// different scopes (run vs. stage vs. target vs. AS number).
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every identifier that crosses a crate boundary is a distinct newtype so
//! the compiler catches, e.g., a `StageId` used where a `RunId` is expected.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(RunId, "Identifier for one multi-router rollout run.");
string_id!(StageId, "Identifier for one stage within a run.");
string_id!(TargetId, "Identifier for one router scheduled within a stage.");
string_id!(EventId, "Identifier for one durable rollout event.");
string_id!(Hostname, "Router hostname, the coordinator's unit of addressing.");
string_id!(CommitId, "Identifier for one NETCONF commit attempt.");
string_id!(CheckpointId, "Identifier for one rollback checkpoint.");

/// A 32-bit Autonomous System Number. Valid range is the full `u32` domain
/// (`0..=4_294_967_295`); `0`, `23456` (AS_TRANS), and the private/reserved
/// ranges are syntactically valid but surfaced with a reserved-range warning
/// by callers that care (see `otto-bgp-core::validation`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asn(u32);

impl Asn {
    /// Wrap a raw AS number. All `u32` values are syntactically valid.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// The wrapped numeric value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// True for 16-bit-era reserved/special values and 4-byte documentation
    /// ranges: `0`, `23456` (AS_TRANS), `64496..=64511` (documentation),
    /// `64512..=65535` (private use / reserved), and
    /// `4_200_000_000..=4_294_967_295` (private use, 4-byte range).
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        matches!(self.0, 0 | 23456)
            || (64496..=65535).contains(&self.0)
            || (4_200_000_000..=4_294_967_295).contains(&self.0)
    }
}

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::Asn;
    use super::RunId;

    #[test]
    fn asn_boundary_values_are_reserved() {
        for value in [0_u32, 23456, 64512, 65535, u32::MAX] {
            assert!(Asn::new(value).is_reserved(), "{value} should be reserved");
        }
        assert!(!Asn::new(13335).is_reserved());
    }

    #[test]
    fn asn_display_has_as_prefix() {
        assert_eq!(Asn::new(64512).to_string(), "AS64512");
    }

    #[test]
    fn run_id_display_round_trips() {
        let id = RunId::new("run-1");
        assert_eq!(id.as_str(), "run-1");
        assert_eq!(id.to_string(), "run-1");
    }
}
