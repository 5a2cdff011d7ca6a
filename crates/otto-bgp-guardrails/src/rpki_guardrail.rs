// crates/otto-bgp-guardrails/src/rpki_guardrail.rs
// ============================================================================
// Module: G1.5 RPKI validation guardrail
// Description: Delegates to the RPKI validator, aggregates per-policy and
// overall validation-state counts (section 4.3).
// Dependencies: otto-bgp-core, otto-bgp-config, otto-bgp-rpki
// ============================================================================

use std::collections::BTreeMap;

use otto_bgp_config::GuardrailsConfig;
use otto_bgp_core::GuardrailResult;
use otto_bgp_core::RiskLevel;
use otto_bgp_core::Timestamp;
use otto_bgp_core::ValidationState;
use otto_bgp_rpki::RpkiValidator;

use crate::guardrail::Guardrail;
use crate::guardrail::GuardrailContext;

/// G1.5: RPKI origin-validation guardrail (active when RPKI is enabled).
pub struct RpkiGuardrail<'v> {
    enabled: bool,
    max_invalid_percent: f64,
    max_notfound_percent: f64,
    require_vrp_data: bool,
    validator: &'v RpkiValidator,
}

impl<'v> RpkiGuardrail<'v> {
    /// Build the guardrail over a live validator and the shared guardrails
    /// config.
    #[must_use]
    pub fn new(validator: &'v RpkiValidator, config: &GuardrailsConfig) -> Self {
        Self {
            enabled: config.rpki.enabled && !config.rpki.emergency_override,
            max_invalid_percent: config.max_invalid_percent,
            max_notfound_percent: config.max_notfound_percent,
            require_vrp_data: config.require_vrp_data,
            validator,
        }
    }
}

impl Guardrail for RpkiGuardrail<'_> {
    fn name(&self) -> &str {
        "rpki_validation"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn check(&self, context: &GuardrailContext<'_>) -> GuardrailResult {
        if self.require_vrp_data && !self.validator.store().has_data() {
            let mut details = BTreeMap::new();
            details.insert("vrp_dataset".to_owned(), "absent".to_owned());
            return GuardrailResult::new(
                self.name(),
                false,
                RiskLevel::Critical,
                "VRP dataset is required but not loaded",
                details,
                Some("load a VRP dataset before applying RPKI-dependent policies".to_owned()),
                Timestamp::now(),
            );
        }

        let mut valid = 0u64;
        let mut invalid = 0u64;
        let mut notfound = 0u64;
        let mut notfound_allowlisted = 0u64;
        let mut errors = 0u64;

        for policy in context.policies() {
            for result in self.validator.validate_policy_prefixes(policy) {
                match result.state() {
                    ValidationState::Valid => valid += 1,
                    ValidationState::Invalid => invalid += 1,
                    ValidationState::NotFound => {
                        notfound += 1;
                        if result.allowlisted() {
                            notfound_allowlisted += 1;
                        }
                    }
                    ValidationState::Error => errors += 1,
                }
            }
        }

        let total = valid + invalid + notfound + errors;
        let invalid_percent = percent(invalid, total);
        let non_allowlisted_notfound = notfound - notfound_allowlisted;
        let notfound_percent = percent(non_allowlisted_notfound, total);

        let mut details = BTreeMap::new();
        details.insert("valid".to_owned(), valid.to_string());
        details.insert("invalid".to_owned(), invalid.to_string());
        details.insert("notfound".to_owned(), notfound.to_string());
        details.insert("notfound_allowlisted".to_owned(), notfound_allowlisted.to_string());
        details.insert("error".to_owned(), errors.to_string());

        let (risk_level, passed, message) = if errors > 0 {
            (
                RiskLevel::Critical,
                false,
                format!("{errors} prefix(es) hit a validation ERROR"),
            )
        } else if invalid_percent > self.max_invalid_percent {
            (
                RiskLevel::Critical,
                false,
                format!("invalid rate {invalid_percent:.1}% exceeds maximum {:.1}%", self.max_invalid_percent),
            )
        } else if notfound_percent > self.max_notfound_percent {
            (
                RiskLevel::High,
                false,
                format!(
                    "non-allowlisted notfound rate {notfound_percent:.1}% exceeds maximum {:.1}%",
                    self.max_notfound_percent
                ),
            )
        } else {
            (RiskLevel::Low, true, format!("{valid}/{total} prefixes RPKI-valid"))
        };

        GuardrailResult::new(self.name(), passed, risk_level, message, details, None, Timestamp::now())
    }
}

fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use otto_bgp_config::RpkiConfig;
    use otto_bgp_config::RpkiFailPolicy;
    use otto_bgp_core::Asn;
    use otto_bgp_core::GeneratorMode;
    use otto_bgp_core::Policy;
    use otto_bgp_core::ResourceId;
    use otto_bgp_core::VrpDataset;
    use otto_bgp_core::VrpEntry;
    use otto_bgp_core::VrpSourceFormat;
    use otto_bgp_rpki::Allowlist;
    use otto_bgp_rpki::VrpStore;

    fn validator_with_entry() -> RpkiValidator {
        let store = VrpStore::new("/tmp/unused.json");
        store.install(VrpDataset::new(
            vec![VrpEntry::new(Asn::new(1), "10.0.0.0/8".parse().unwrap(), 24, "arin").unwrap()],
            Timestamp::now(),
            VrpSourceFormat::Cached,
            None,
        ));
        RpkiValidator::new(store, Allowlist::empty(), &RpkiConfig::default())
    }

    #[test]
    fn passes_when_all_prefixes_valid() {
        let validator = validator_with_entry();
        let config = GuardrailsConfig::default();
        let guardrail = RpkiGuardrail::new(&validator, &config);

        let policy = Policy::new(
            ResourceId::Asn(Asn::new(1)),
            "AS1",
            b"10.0.1.0/24;\n".to_vec(),
            Timestamp::now(),
            GeneratorMode::Cached,
        )
        .unwrap();
        let ctx = GuardrailContext::new(std::slice::from_ref(&policy));
        let result = guardrail.check(&ctx);
        assert!(result.passed());
    }

    #[test]
    fn require_vrp_data_fails_closed_without_a_dataset() {
        let store = VrpStore::new("/tmp/unused.json");
        let validator = RpkiValidator::new(store, Allowlist::empty(), &RpkiConfig {
            fail_policy: RpkiFailPolicy::FailClosed,
            ..RpkiConfig::default()
        });
        let mut config = GuardrailsConfig::default();
        config.require_vrp_data = true;
        let guardrail = RpkiGuardrail::new(&validator, &config);
        let ctx = GuardrailContext::new(&[]);
        let result = guardrail.check(&ctx);
        assert!(!result.passed());
        assert_eq!(result.risk_level(), RiskLevel::Critical);
    }
}
