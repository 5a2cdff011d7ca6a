// crates/otto-bgp-guardrails/src/guardrail.rs
// ============================================================================
// Module: Guardrail trait and context
// Description: The pluggable-safety-check seam every G1-G4 component
// implements (section 4.3).
// Dependencies: otto-bgp-core
// ============================================================================

use otto_bgp_core::GuardrailResult;
use otto_bgp_core::Policy;

/// Everything a guardrail's [`Guardrail::check`] may need to evaluate a
/// candidate apply. Built fresh per safety run by the unified safety
/// manager; guardrails never mutate it.
pub struct GuardrailContext<'a> {
    policies: &'a [Policy],
}

impl<'a> GuardrailContext<'a> {
    /// Construct a context over the policies awaiting application.
    #[must_use]
    pub fn new(policies: &'a [Policy]) -> Self {
        Self { policies }
    }

    /// The policies under evaluation.
    #[must_use]
    pub fn policies(&self) -> &'a [Policy] {
        self.policies
    }
}

/// A pluggable, always-active safety check (§4.3).
pub trait Guardrail {
    /// The guardrail's registered name, e.g. `"prefix_count"`.
    fn name(&self) -> &str;

    /// Whether this guardrail runs at all. `false` when `emergency_override`
    /// is set; callers MUST log that at CRITICAL (§4.3).
    fn is_enabled(&self) -> bool;

    /// Evaluate `context` and produce this guardrail's verdict.
    fn check(&self, context: &GuardrailContext<'_>) -> GuardrailResult;
}
