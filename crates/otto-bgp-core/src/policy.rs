// crates/otto-bgp-core/src/policy.rs
// ============================================================================
// Module: Policy
// Description: A generated prefix-list policy for one origin identifier.
// Purpose: Canonical, immutable representation of bgpq4 output as it flows
// from generation through validation to NETCONF application.
// Dependencies: serde, crate::identifiers
// ============================================================================

//! ## Overview
//! A [`Policy`] is immutable after creation (§3): the generator owns it,
//! every downstream component (guardrails, the NETCONF applier) only reads
//! it.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::Asn;
use crate::time::Timestamp;

static POLICY_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("static pattern is valid"));

/// The origin identifier a policy was generated for: either a bare AS
/// number or an IRR object name (e.g. an as-set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceId {
    /// A single Autonomous System Number.
    Asn(Asn),
    /// An IRR object reference (e.g. `AS-EXAMPLE`).
    Irr(String),
}

impl ResourceId {
    /// A printable label for logs and checkpoints.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Asn(asn) => asn.to_string(),
            Self::Irr(name) => name.clone(),
        }
    }
}

/// Which generator produced the policy content, recorded for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorMode {
    /// Produced by invoking `bgpq4` directly against an IRR.
    Bgpq4Direct,
    /// Produced by invoking `bgpq4` through the IRR SSH-tunnel proxy.
    Bgpq4Tunneled,
    /// Loaded from a pre-generated cache (e.g. a test fixture).
    Cached,
}

/// An error constructing a [`Policy`] from untrusted fields.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    /// `policy_name` did not match `[A-Za-z0-9_-]{1,64}`.
    #[error("invalid policy name {0:?}: must match [A-Za-z0-9_-]{{1,64}}")]
    InvalidName(String),
}

/// A prefix-list for one origin identifier. Immutable after construction.
///
/// # Invariants
/// - `policy_name` matches `[A-Za-z0-9_-]{1,64}`.
/// - `content` is Juniper prefix-list syntax (validated by callers that
///   parse it, not by this type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    resource_id: ResourceId,
    policy_name: String,
    content: Vec<u8>,
    generated_at: Timestamp,
    generator_mode: GeneratorMode,
}

impl Policy {
    /// Construct a policy, validating `policy_name` against the required
    /// pattern.
    ///
    /// # Errors
    /// Returns [`PolicyError::InvalidName`] if `policy_name` does not match
    /// `[A-Za-z0-9_-]{1,64}`.
    pub fn new(
        resource_id: ResourceId,
        policy_name: impl Into<String>,
        content: impl Into<Vec<u8>>,
        generated_at: Timestamp,
        generator_mode: GeneratorMode,
    ) -> Result<Self, PolicyError> {
        let policy_name = policy_name.into();
        if !POLICY_NAME_PATTERN.is_match(&policy_name) {
            return Err(PolicyError::InvalidName(policy_name));
        }
        Ok(Self {
            resource_id,
            policy_name,
            content: content.into(),
            generated_at,
            generator_mode,
        })
    }

    /// The origin this policy was generated for.
    #[must_use]
    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    /// The printable policy-list name.
    #[must_use]
    pub fn policy_name(&self) -> &str {
        &self.policy_name
    }

    /// Raw Juniper prefix-list syntax bytes.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Content decoded as UTF-8, lossily if it somehow isn't valid.
    #[must_use]
    pub fn content_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// When this policy was generated.
    #[must_use]
    pub fn generated_at(&self) -> Timestamp {
        self.generated_at
    }

    /// Which generator produced this policy.
    #[must_use]
    pub fn generator_mode(&self) -> GeneratorMode {
        self.generator_mode
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> Policy {
        Policy::new(
            ResourceId::Asn(Asn::new(13335)),
            "AS13335",
            b"policy-options {\n}\n".to_vec(),
            Timestamp::now(),
            GeneratorMode::Bgpq4Direct,
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_names() {
        assert!(sample().policy_name() == "AS13335");
    }

    #[test]
    fn rejects_names_outside_the_pattern() {
        let err = Policy::new(
            ResourceId::Asn(Asn::new(1)),
            "bad name!",
            Vec::new(),
            Timestamp::now(),
            GeneratorMode::Cached,
        )
        .unwrap_err();
        assert_eq!(err, PolicyError::InvalidName("bad name!".into()));
    }

    #[test]
    fn rejects_names_over_64_chars() {
        let long = "a".repeat(65);
        assert!(
            Policy::new(
                ResourceId::Asn(Asn::new(1)),
                long,
                Vec::new(),
                Timestamp::now(),
                GeneratorMode::Cached,
            )
            .is_err()
        );
    }

    #[test]
    fn resource_id_label_formats_asn_with_prefix() {
        assert_eq!(ResourceId::Asn(Asn::new(7)).label(), "AS7");
        assert_eq!(ResourceId::Irr("AS-EXAMPLE".into()).label(), "AS-EXAMPLE");
    }
}
