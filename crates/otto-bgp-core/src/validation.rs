// crates/otto-bgp-core/src/validation.rs
// ============================================================================
// Module: Validation / Guardrail / Safety results
// Description: Ephemeral result types produced by RPKI validation and the
// guardrail pipeline, and their aggregate (section 3).
// Purpose: One shared vocabulary for "did this check pass" across the RPKI
// validator, every guardrail, and the unified safety manager.
// Dependencies: serde, ipnet, crate::{identifiers, time}
// ============================================================================

//! ## Overview
//! [`ValidationResult`] is RFC 6811's tri-state (`VALID`/`INVALID`/
//! `NOTFOUND`) plus an `ERROR` state for fail-closed operation (§4.2).
//! [`GuardrailResult`] is one guardrail's verdict; [`SafetyCheckResult`]
//! aggregates every enabled guardrail's verdict for one apply attempt
//! (§4.3/§4.4).

use std::collections::BTreeMap;

use ipnet::Ipv4Net;
use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::Asn;
use crate::identifiers::CheckpointId;
use crate::time::Timestamp;

/// RFC 6811 tri-state origin-validation outcome, plus `ERROR` for
/// fail-closed operation (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    /// A covering VRP authorizes this exact `(prefix, asn)` pair.
    Valid,
    /// Covering VRPs exist but none authorize this `(prefix, asn)` pair.
    Invalid,
    /// No covering VRP exists.
    NotFound,
    /// Validation could not be performed (no/stale dataset under
    /// fail-closed, or a worker failure).
    Error,
}

/// One `(prefix, asn)` origin-validation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    prefix: Ipv4Net,
    asn: Asn,
    state: ValidationState,
    reason: String,
    covering_vrp: Option<(Asn, Ipv4Net, u8)>,
    allowlisted: bool,
}

impl ValidationResult {
    /// Construct a validation result.
    #[must_use]
    pub fn new(
        prefix: Ipv4Net,
        asn: Asn,
        state: ValidationState,
        reason: impl Into<String>,
        covering_vrp: Option<(Asn, Ipv4Net, u8)>,
        allowlisted: bool,
    ) -> Self {
        Self {
            prefix,
            asn,
            state,
            reason: reason.into(),
            covering_vrp,
            allowlisted,
        }
    }

    /// The prefix that was validated.
    #[must_use]
    pub fn prefix(&self) -> Ipv4Net {
        self.prefix
    }

    /// The origin AS checked against the prefix.
    #[must_use]
    pub fn asn(&self) -> Asn {
        self.asn
    }

    /// The RFC 6811 tri-state (+ `ERROR`) outcome.
    #[must_use]
    pub fn state(&self) -> ValidationState {
        self.state
    }

    /// A human-readable explanation of the outcome.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The VRP that justified a `VALID` or `INVALID` outcome, if any:
    /// `(asn, prefix, max_length)`.
    #[must_use]
    pub fn covering_vrp(&self) -> Option<(Asn, Ipv4Net, u8)> {
        self.covering_vrp
    }

    /// True if this `NOTFOUND` pair is present in the allowlist overlay.
    #[must_use]
    pub fn allowlisted(&self) -> bool {
        self.allowlisted
    }
}

/// Severity tier a guardrail or the aggregate safety result assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// No material risk.
    Low,
    /// Noteworthy but not blocking.
    Medium,
    /// Blocking absent an emergency override.
    High,
    /// Always blocking.
    Critical,
}

/// The outcome of one guardrail invocation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailResult {
    name: String,
    passed: bool,
    risk_level: RiskLevel,
    message: String,
    details: BTreeMap<String, String>,
    recommended_action: Option<String>,
    timestamp: Timestamp,
}

impl GuardrailResult {
    /// Construct a guardrail result.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        passed: bool,
        risk_level: RiskLevel,
        message: impl Into<String>,
        details: BTreeMap<String, String>,
        recommended_action: Option<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            name: name.into(),
            passed,
            risk_level,
            message: message.into(),
            details,
            recommended_action,
            timestamp,
        }
    }

    /// The guardrail's registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the guardrail allowed the operation to proceed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    /// The severity the guardrail assigned to its finding.
    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    /// A human-readable summary of the finding.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured detail fields (counts, thresholds, offending prefixes).
    #[must_use]
    pub fn details(&self) -> &BTreeMap<String, String> {
        &self.details
    }

    /// A suggested operator action, if the guardrail has one.
    #[must_use]
    pub fn recommended_action(&self) -> Option<&str> {
        self.recommended_action.as_deref()
    }

    /// When the guardrail ran.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// The aggregated outcome over all active guardrails for one applicable
/// set of policies (§3, §4.3 aggregation rule).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCheckResult {
    safe_to_proceed: bool,
    overall_risk_level: RiskLevel,
    warnings: Vec<String>,
    errors: Vec<String>,
    bgp_impact: BTreeMap<String, String>,
    guardrail_results: Vec<GuardrailResult>,
    rollback_checkpoint_id: Option<CheckpointId>,
    emergency_contact_notified: bool,
}

impl SafetyCheckResult {
    /// Construct an aggregated safety check result.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "mirrors the spec's flat result shape")]
    pub fn new(
        safe_to_proceed: bool,
        overall_risk_level: RiskLevel,
        warnings: Vec<String>,
        errors: Vec<String>,
        bgp_impact: BTreeMap<String, String>,
        guardrail_results: Vec<GuardrailResult>,
        rollback_checkpoint_id: Option<CheckpointId>,
        emergency_contact_notified: bool,
    ) -> Self {
        Self {
            safe_to_proceed,
            overall_risk_level,
            warnings,
            errors,
            bgp_impact,
            guardrail_results,
            rollback_checkpoint_id,
            emergency_contact_notified,
        }
    }

    /// Whether the apply pipeline may proceed.
    #[must_use]
    pub fn safe_to_proceed(&self) -> bool {
        self.safe_to_proceed
    }

    /// The highest risk level among all guardrail results, plus the
    /// warning-count escalation rule (§4.3).
    #[must_use]
    pub fn overall_risk_level(&self) -> RiskLevel {
        self.overall_risk_level
    }

    /// Non-blocking warning messages collected across guardrails.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Blocking error messages collected across guardrails.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Per-BGP-session impact assessment strings.
    #[must_use]
    pub fn bgp_impact(&self) -> &BTreeMap<String, String> {
        &self.bgp_impact
    }

    /// Every guardrail's individual result.
    #[must_use]
    pub fn guardrail_results(&self) -> &[GuardrailResult] {
        &self.guardrail_results
    }

    /// The rollback checkpoint recorded just before commit, if one exists
    /// yet.
    #[must_use]
    pub fn rollback_checkpoint_id(&self) -> Option<&CheckpointId> {
        self.rollback_checkpoint_id.as_ref()
    }

    /// Whether an emergency contact notification was sent for this result.
    #[must_use]
    pub fn emergency_contact_notified(&self) -> bool {
        self.emergency_contact_notified
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_ordering_matches_severity() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn validation_result_exposes_covering_vrp() {
        let prefix: Ipv4Net = "1.1.1.0/24".parse().unwrap();
        let result = ValidationResult::new(
            prefix,
            Asn::new(13335),
            ValidationState::Valid,
            "covered",
            Some((Asn::new(13335), prefix, 24)),
            false,
        );
        assert_eq!(result.state(), ValidationState::Valid);
        assert_eq!(result.covering_vrp().unwrap().0, Asn::new(13335));
    }
}
