// crates/otto-bgp-guardrails/src/registry.rs
// ============================================================================
// Module: Guardrail registry
// Description: Owns the mandatory G1-G4 guardrail set and runs every enabled
// one over a context, producing the raw per-guardrail results the Unified
// Safety Manager aggregates into a Safety Check Result (section 4.3/4.4).
// Dependencies: otto-bgp-core, tracing
// ============================================================================

use otto_bgp_core::GuardrailResult;

use crate::guardrail::Guardrail;
use crate::guardrail::GuardrailContext;

/// Holds the mandatory guardrail set and runs it as a unit. The registry
/// itself does not compute `overall_risk` or `safe_to_proceed`: per §4.3,
/// that aggregation belongs to the Unified Safety Manager, which consumes
/// [`GuardrailRegistry::run_all`]'s output.
pub struct GuardrailRegistry {
    guardrails: Vec<Box<dyn Guardrail + Send + Sync>>,
}

impl GuardrailRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { guardrails: Vec::new() }
    }

    /// Register a guardrail. Order is preserved in `run_all`'s output.
    #[must_use]
    pub fn with(mut self, guardrail: Box<dyn Guardrail + Send + Sync>) -> Self {
        self.guardrails.push(guardrail);
        self
    }

    /// The names of every registered guardrail, enabled or not.
    #[must_use]
    pub fn guardrail_names(&self) -> Vec<&str> {
        self.guardrails.iter().map(|g| g.name()).collect()
    }

    /// Run every enabled guardrail over `context`. A disabled guardrail is
    /// skipped and audit-logged at CRITICAL (§4.3: `emergency_override`
    /// disables a guardrail but the fact MUST be logged at that level).
    #[must_use]
    pub fn run_all(&self, context: &GuardrailContext<'_>) -> Vec<GuardrailResult> {
        let mut results = Vec::with_capacity(self.guardrails.len());
        for guardrail in &self.guardrails {
            if !guardrail.is_enabled() {
                tracing::error!(guardrail = guardrail.name(), "guardrail disabled via emergency override");
                continue;
            }
            results.push(guardrail.check(context));
        }
        results
    }
}

impl Default for GuardrailRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use otto_bgp_config::GuardrailsConfig;

    use crate::prefix_count::PrefixCountGuardrail;

    #[test]
    fn run_all_collects_results_from_every_enabled_guardrail() {
        let config = GuardrailsConfig::default();
        let registry = GuardrailRegistry::new().with(Box::new(PrefixCountGuardrail::from_config(&config)));
        let ctx = GuardrailContext::new(&[]);
        let results = registry.run_all(&ctx);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name(), "prefix_count");
    }

    #[test]
    fn disabled_guardrail_is_skipped() {
        let mut config = GuardrailsConfig::default();
        config.prefix_count.emergency_override = true;
        let registry = GuardrailRegistry::new().with(Box::new(PrefixCountGuardrail::from_config(&config)));
        let ctx = GuardrailContext::new(&[]);
        assert!(registry.run_all(&ctx).is_empty());
    }
}
