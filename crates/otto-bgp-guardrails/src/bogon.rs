// crates/otto-bgp-guardrails/src/bogon.rs
// ============================================================================
// Module: G2 Bogon-prefix guardrail
// Description: Compares every prefix against a fixed table of reserved,
// private, documentation, multicast, CGN, benchmark, and link-local ranges
// (section 4.3; RFC 1918, 5737, 3927, 6890, 3171, 1112, 2544, 6598).
// Dependencies: otto-bgp-core, otto-bgp-config, otto-bgp-rpki, ipnet
// ============================================================================

use std::collections::BTreeMap;
use std::sync::LazyLock;

use ipnet::Ipv4Net;
use otto_bgp_config::GuardrailsConfig;
use otto_bgp_config::Strictness;
use otto_bgp_core::GuardrailResult;
use otto_bgp_core::RiskLevel;
use otto_bgp_core::Timestamp;
use otto_bgp_rpki::extract_prefixes_from_policy;

use crate::guardrail::Guardrail;
use crate::guardrail::GuardrailContext;

/// The RFC category a bogon range belongs to, used by the strictness rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BogonCategory {
    /// RFC 1918 private use.
    Private,
    /// Loopback.
    Loopback,
    /// RFC 3927 link-local.
    LinkLocal,
    /// RFC 1112 / 3171 multicast.
    Multicast,
    /// Reserved / future use.
    Reserved,
    /// RFC 5737 documentation.
    Documentation,
    /// RFC 6598 carrier-grade NAT shared space.
    Cgn,
    /// RFC 2544 benchmarking.
    Benchmark,
    /// "This network" (RFC 6890 `0.0.0.0/8`).
    ThisNetwork,
}

impl BogonCategory {
    fn label(self) -> &'static str {
        match self {
            Self::Private => "private (RFC 1918)",
            Self::Loopback => "loopback",
            Self::LinkLocal => "link-local (RFC 3927)",
            Self::Multicast => "multicast (RFC 1112/3171)",
            Self::Reserved => "reserved",
            Self::Documentation => "documentation (RFC 5737)",
            Self::Cgn => "carrier-grade NAT (RFC 6598)",
            Self::Benchmark => "benchmarking (RFC 2544)",
            Self::ThisNetwork => "\"this network\" (RFC 6890)",
        }
    }
}

/// The fixed bogon range table (§4.3, expanded per RFC 5737/3927/6890/3171/
/// 1112/2544/6598).
static BOGON_RANGES: LazyLock<Vec<(Ipv4Net, BogonCategory)>> = LazyLock::new(|| {
    vec![
        (net("0.0.0.0/8"), BogonCategory::ThisNetwork),
        (net("10.0.0.0/8"), BogonCategory::Private),
        (net("100.64.0.0/10"), BogonCategory::Cgn),
        (net("127.0.0.0/8"), BogonCategory::Loopback),
        (net("169.254.0.0/16"), BogonCategory::LinkLocal),
        (net("172.16.0.0/12"), BogonCategory::Private),
        (net("192.0.2.0/24"), BogonCategory::Documentation),
        (net("192.168.0.0/16"), BogonCategory::Private),
        (net("198.18.0.0/15"), BogonCategory::Benchmark),
        (net("198.51.100.0/24"), BogonCategory::Documentation),
        (net("203.0.113.0/24"), BogonCategory::Documentation),
        (net("224.0.0.0/4"), BogonCategory::Multicast),
        (net("240.0.0.0/4"), BogonCategory::Reserved),
    ]
});

fn net(s: &str) -> Ipv4Net {
    s.parse().expect("static bogon range is valid")
}

fn classify(prefix: Ipv4Net) -> Option<BogonCategory> {
    BOGON_RANGES
        .iter()
        .find(|(range, _)| range.contains(&prefix))
        .map(|(_, category)| *category)
}

fn blocks_at(category: BogonCategory, strictness: Strictness) -> bool {
    match strictness {
        Strictness::Strict | Strictness::High => true,
        Strictness::Medium => category != BogonCategory::Private,
        Strictness::Low => false,
    }
}

/// G2: bogon-prefix guardrail.
pub struct BogonGuardrail {
    enabled: bool,
    strictness: Strictness,
}

impl BogonGuardrail {
    /// Build the guardrail from its slice of the shared guardrails config.
    #[must_use]
    pub fn from_config(config: &GuardrailsConfig) -> Self {
        Self {
            enabled: config.bogon.enabled && !config.bogon.emergency_override,
            strictness: config.bogon.strictness_level,
        }
    }
}

impl Guardrail for BogonGuardrail {
    fn name(&self) -> &str {
        "bogon_prefix"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn check(&self, context: &GuardrailContext<'_>) -> GuardrailResult {
        let mut blocking: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        for policy in context.policies() {
            for prefix in extract_prefixes_from_policy(&policy.content_str()) {
                let Some(category) = classify(prefix) else {
                    continue;
                };
                let entry = format!("{prefix} ({}) in {}", category.label(), policy.policy_name());
                if blocks_at(category, self.strictness) {
                    blocking.push(entry);
                } else {
                    warnings.push(entry);
                }
            }
        }

        let mut details = BTreeMap::new();
        details.insert("blocking_count".to_owned(), blocking.len().to_string());
        details.insert("warning_count".to_owned(), warnings.len().to_string());

        if !blocking.is_empty() {
            return GuardrailResult::new(
                self.name(),
                false,
                RiskLevel::Critical,
                format!("bogon prefixes detected: {}", blocking.join("; ")),
                details,
                Some("remove or explicitly allowlist the offending bogon prefixes".to_owned()),
                Timestamp::now(),
            );
        }

        if !warnings.is_empty() {
            return GuardrailResult::new(
                self.name(),
                true,
                RiskLevel::Medium,
                format!("bogon prefixes present but tolerated at {:?} strictness: {}", self.strictness, warnings.join("; ")),
                details,
                None,
                Timestamp::now(),
            );
        }

        GuardrailResult::new(
            self.name(),
            true,
            RiskLevel::Low,
            "no bogon prefixes detected",
            details,
            None,
            Timestamp::now(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use otto_bgp_core::Asn;
    use otto_bgp_core::GeneratorMode;
    use otto_bgp_core::Policy;
    use otto_bgp_core::ResourceId;

    fn policy_with(content: &str) -> Policy {
        Policy::new(
            ResourceId::Asn(Asn::new(1)),
            "AS1",
            content.as_bytes().to_vec(),
            Timestamp::now(),
            GeneratorMode::Cached,
        )
        .unwrap()
    }

    #[test]
    fn strict_blocks_private_ranges() {
        let mut config = GuardrailsConfig::default();
        config.bogon.strictness_level = Strictness::Strict;
        let guardrail = BogonGuardrail::from_config(&config);
        let policy = policy_with("10.0.0.0/8;\n");
        let ctx = GuardrailContext::new(std::slice::from_ref(&policy));
        assert!(!guardrail.check(&ctx).passed());
    }

    #[test]
    fn medium_tolerates_private_but_blocks_multicast() {
        let mut config = GuardrailsConfig::default();
        config.bogon.strictness_level = Strictness::Medium;
        let guardrail = BogonGuardrail::from_config(&config);

        let private_only = policy_with("10.0.0.0/8;\n");
        let ctx = GuardrailContext::new(std::slice::from_ref(&private_only));
        assert!(guardrail.check(&ctx).passed());

        let multicast = policy_with("224.0.0.0/4;\n");
        let ctx = GuardrailContext::new(std::slice::from_ref(&multicast));
        assert!(!guardrail.check(&ctx).passed());
    }

    #[test]
    fn low_strictness_never_blocks() {
        let mut config = GuardrailsConfig::default();
        config.bogon.strictness_level = Strictness::Low;
        let guardrail = BogonGuardrail::from_config(&config);
        let policy = policy_with("224.0.0.0/4;\n240.0.0.0/4;\n");
        let ctx = GuardrailContext::new(std::slice::from_ref(&policy));
        assert!(guardrail.check(&ctx).passed());
    }

    #[test]
    fn routable_prefixes_are_not_flagged() {
        let guardrail = BogonGuardrail::from_config(&GuardrailsConfig::default());
        let policy = policy_with("1.1.1.0/24;\n8.8.8.0/24;\n");
        let ctx = GuardrailContext::new(std::slice::from_ref(&policy));
        let result = guardrail.check(&ctx);
        assert!(result.passed());
        assert_eq!(result.risk_level(), RiskLevel::Low);
    }
}
