// crates/otto-bgp-guardrails/src/prefix_count.rs
// ============================================================================
// Module: G1 Prefix-count guardrail
// Description: Counts prefixes per-policy and across all policies against
// configurable thresholds (section 4.3).
// Dependencies: otto-bgp-core, otto-bgp-config, otto-bgp-rpki
// ============================================================================

use std::collections::BTreeMap;

use otto_bgp_config::GuardrailsConfig;
use otto_bgp_core::GuardrailResult;
use otto_bgp_core::RiskLevel;
use otto_bgp_core::Timestamp;
use otto_bgp_rpki::extract_prefixes_from_policy;

use crate::guardrail::Guardrail;
use crate::guardrail::GuardrailContext;

/// G1: per-policy and aggregate prefix-count thresholds.
pub struct PrefixCountGuardrail {
    enabled: bool,
    max_prefixes_per_as: u64,
    max_total_prefixes: u64,
    warning_threshold: f64,
    critical_threshold: f64,
}

impl PrefixCountGuardrail {
    /// Build the guardrail from its slice of the shared guardrails config.
    #[must_use]
    pub fn from_config(config: &GuardrailsConfig) -> Self {
        Self {
            enabled: config.prefix_count.enabled && !config.prefix_count.emergency_override,
            max_prefixes_per_as: config.max_prefixes_per_as,
            max_total_prefixes: config.max_total_prefixes,
            warning_threshold: config.warning_threshold(),
            critical_threshold: config.critical_threshold(),
        }
    }
}

impl Guardrail for PrefixCountGuardrail {
    fn name(&self) -> &str {
        "prefix_count"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn check(&self, context: &GuardrailContext<'_>) -> GuardrailResult {
        let mut total: u64 = 0;
        let mut per_as_exceeded: Vec<String> = Vec::new();
        let mut details: BTreeMap<String, String> = BTreeMap::new();

        for policy in context.policies() {
            let count = extract_prefixes_from_policy(&policy.content_str()).len() as u64;
            total += count;
            details.insert(policy.policy_name().to_owned(), count.to_string());
            if count > self.max_prefixes_per_as {
                per_as_exceeded.push(format!("{} ({count} prefixes)", policy.policy_name()));
            }
        }
        details.insert("total_prefixes".to_owned(), total.to_string());

        let (risk_level, message) = if !per_as_exceeded.is_empty() {
            (
                RiskLevel::Critical,
                format!(
                    "per-AS prefix count exceeded for: {}",
                    per_as_exceeded.join(", ")
                ),
            )
        } else if total > self.max_total_prefixes {
            (
                RiskLevel::Critical,
                format!("total prefix count {total} exceeds maximum {}", self.max_total_prefixes),
            )
        } else if total as f64 > self.critical_threshold {
            (
                RiskLevel::High,
                format!("total prefix count {total} exceeds critical threshold {:.0}", self.critical_threshold),
            )
        } else if total as f64 > self.warning_threshold {
            (
                RiskLevel::Medium,
                format!("total prefix count {total} exceeds warning threshold {:.0}", self.warning_threshold),
            )
        } else {
            (RiskLevel::Low, format!("total prefix count {total} within thresholds"))
        };

        let passed = risk_level < RiskLevel::High;
        let recommended_action = (!passed)
            .then(|| "review generated policies for unexpectedly large prefix sets".to_owned());

        GuardrailResult::new(
            self.name(),
            passed,
            risk_level,
            message,
            details,
            recommended_action,
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

    fn policy_with_n_prefixes(name: &str, n: usize) -> Policy {
        let mut content = String::new();
        for i in 0..n {
            content.push_str(&format!("10.{}.{}.0/24;\n", i / 256, i % 256));
        }
        Policy::new(
            ResourceId::Asn(Asn::new(1)),
            name,
            content.into_bytes(),
            Timestamp::now(),
            GeneratorMode::Cached,
        )
        .unwrap()
    }

    #[test]
    fn passes_when_well_under_thresholds() {
        let guardrail = PrefixCountGuardrail::from_config(&GuardrailsConfig::default());
        let policy = policy_with_n_prefixes("AS1", 5);
        let ctx = GuardrailContext::new(std::slice::from_ref(&policy));
        let result = guardrail.check(&ctx);
        assert!(result.passed());
        assert_eq!(result.risk_level(), RiskLevel::Low);
    }

    #[test]
    fn per_as_exceedance_is_critical() {
        let mut config = GuardrailsConfig::default();
        config.max_prefixes_per_as = 3;
        let guardrail = PrefixCountGuardrail::from_config(&config);
        let policy = policy_with_n_prefixes("AS1", 5);
        let ctx = GuardrailContext::new(std::slice::from_ref(&policy));
        let result = guardrail.check(&ctx);
        assert!(!result.passed());
        assert_eq!(result.risk_level(), RiskLevel::Critical);
    }

    #[test]
    fn emergency_override_disables_the_guardrail() {
        let mut config = GuardrailsConfig::default();
        config.prefix_count.emergency_override = true;
        let guardrail = PrefixCountGuardrail::from_config(&config);
        assert!(!guardrail.is_enabled());
    }
}
