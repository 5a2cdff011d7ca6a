// crates/otto-bgp-core/src/netconf.rs
// ============================================================================
// Module: NETCONF result entities
// Description: Commit and health-check records produced by one apply
// attempt (section 3), plus the finalization-mode selector (section 4.5).
// Purpose: Shared shapes between otto-bgp-netconf (which produces them) and
// otto-bgp-rollout (which references them from Rollout Events).
// Dependencies: serde, crate::{identifiers, time}
// ============================================================================

//! ## Overview
//! [`CommitInfo`] and [`HealthResult`] are created once per NETCONF apply
//! attempt (§3). [`FinalizationMode`] selects which §4.5 finalization
//! strategy (`AutoFinalize` vs. `ManualConfirm`) the applier uses; the
//! strategies themselves live in `otto-bgp-netconf` since they need I/O.

use serde::Deserialize;
use serde::Serialize;

use crate::exitcode::ExitCode;
use crate::identifiers::CommitId;
use crate::identifiers::Hostname;
use crate::time::Timestamp;
use crate::validation::SafetyCheckResult;

/// Record of one NETCONF commit attempt (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    commit_id: CommitId,
    timestamp: Timestamp,
    success: bool,
    error_message: Option<String>,
}

impl CommitInfo {
    /// Construct a commit record.
    #[must_use]
    pub fn new(
        commit_id: CommitId,
        timestamp: Timestamp,
        success: bool,
        error_message: Option<String>,
    ) -> Self {
        Self {
            commit_id,
            timestamp,
            success,
            error_message,
        }
    }

    /// The commit identifier Junos assigned.
    #[must_use]
    pub fn commit_id(&self) -> &CommitId {
        &self.commit_id
    }

    /// When the commit was attempted.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Whether the commit succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    /// The router-reported error, if the commit failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// Outcome of post-commit health probing (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResult {
    success: bool,
    details: Vec<String>,
    error: Option<String>,
}

impl HealthResult {
    /// Construct a health-probe result.
    #[must_use]
    pub fn new(success: bool, details: Vec<String>, error: Option<String>) -> Self {
        Self {
            success,
            details,
            error,
        }
    }

    /// Whether every probe reported healthy.
    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    /// Per-probe detail strings (e.g. established-peer counts).
    #[must_use]
    pub fn details(&self) -> &[String] {
        &self.details
    }

    /// The probe error, if any probe threw.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Which finalization strategy the applier uses after a confirmed commit
/// (§4.5, §9 redesign note: a constructor-time choice, not a runtime
/// branch threaded through the whole pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizationMode {
    /// Autonomous mode: issue the confirming commit automatically on a
    /// healthy post-commit probe; let the hold timer revert on failure.
    AutoFinalize,
    /// System mode: never issue the confirming commit; surface the
    /// `commit_id`/hold window to an operator.
    ManualConfirm,
}

/// The outcome of one `execute_pipeline` invocation for a single router
/// (§4.4/§4.5). The Rollout Coordinator maps this to a Target's terminal
/// state; the CLI's `apply` command maps it to a process exit code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResult {
    hostname: Hostname,
    success: bool,
    no_op: bool,
    diff: Option<String>,
    commit_info: Option<CommitInfo>,
    health: Option<HealthResult>,
    finalized: bool,
    safety: Option<SafetyCheckResult>,
    error: Option<String>,
}

impl ApplicationResult {
    /// Construct an application result.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "mirrors the spec's flat result shape")]
    pub fn new(
        hostname: Hostname,
        success: bool,
        no_op: bool,
        diff: Option<String>,
        commit_info: Option<CommitInfo>,
        health: Option<HealthResult>,
        finalized: bool,
        safety: Option<SafetyCheckResult>,
        error: Option<String>,
    ) -> Self {
        Self {
            hostname,
            success,
            no_op,
            diff,
            commit_info,
            health,
            finalized,
            safety,
            error,
        }
    }

    /// A successful no-op result: the candidate diff was empty (§4.5 step
    /// 3).
    #[must_use]
    pub fn no_op(hostname: Hostname, safety: Option<SafetyCheckResult>) -> Self {
        Self {
            hostname,
            success: true,
            no_op: true,
            diff: None,
            commit_info: None,
            health: None,
            finalized: false,
            safety,
            error: None,
        }
    }

    /// A failed result carrying only the error that stopped the pipeline.
    #[must_use]
    pub fn failure(hostname: Hostname, error: impl Into<String>, safety: Option<SafetyCheckResult>) -> Self {
        Self {
            hostname,
            success: false,
            no_op: false,
            diff: None,
            commit_info: None,
            health: None,
            finalized: false,
            safety,
            error: Some(error.into()),
        }
    }

    /// The router this result applies to.
    #[must_use]
    pub fn hostname(&self) -> &Hostname {
        &self.hostname
    }

    /// Whether the pipeline completed without error. A healthy no-op and a
    /// manual-confirm hold both count as success.
    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    /// Whether the candidate diff was empty, so no commit was attempted.
    #[must_use]
    pub fn is_no_op(&self) -> bool {
        self.no_op
    }

    /// The computed candidate diff, when one was produced.
    #[must_use]
    pub fn diff(&self) -> Option<&str> {
        self.diff.as_deref()
    }

    /// The commit record, when a commit was attempted.
    #[must_use]
    pub fn commit_info(&self) -> Option<&CommitInfo> {
        self.commit_info.as_ref()
    }

    /// The post-commit health probe result, when one was run.
    #[must_use]
    pub fn health(&self) -> Option<&HealthResult> {
        self.health.as_ref()
    }

    /// Whether auto-finalize issued the confirming second commit.
    #[must_use]
    pub fn finalized(&self) -> bool {
        self.finalized
    }

    /// The safety check result that gated this apply attempt, when the
    /// pipeline got far enough to run guardrails.
    #[must_use]
    pub fn safety(&self) -> Option<&SafetyCheckResult> {
        self.safety.as_ref()
    }

    /// The error that stopped the pipeline, when unsuccessful.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Map this result to the stable exit-code ABI (§6/§7/§8 S3-S6). A
    /// successful result always maps to [`ExitCode::Success`]; a failed one
    /// is classified by the most specific information available: which
    /// guardrail blocked it, whether the post-commit health probe failed,
    /// or (lacking either) the error text.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.success {
            return ExitCode::Success;
        }

        if let Some(safety) = self.safety.as_ref() {
            if !safety.safe_to_proceed() {
                if let Some(code) = guardrail_exit_code(safety) {
                    return code;
                }
            }
        }

        if let Some(health) = self.health.as_ref() {
            if !health.success() {
                return ExitCode::HealthCheckFailed;
            }
        }

        match self.error.as_deref() {
            Some(err) if err.to_ascii_lowercase().contains("connect") => ExitCode::NetconfConnectFailed,
            Some(err) if err.to_ascii_lowercase().contains("rollback") => ExitCode::RollbackFailed,
            Some(err) if err.to_ascii_lowercase().contains("lock held") => ExitCode::ConcurrentOperationConflict,
            _ => ExitCode::GeneralError,
        }
    }
}

/// The exit code implied by the first failing (or critical-risk) guardrail
/// in a Safety Check Result, per the §8 scenario mapping: G3 (S6) maps to
/// the concurrent-operation conflict code, G1.5 (S5) to validation-failed,
/// the remaining guardrails to the general guardrail-violation code.
fn guardrail_exit_code(safety: &SafetyCheckResult) -> Option<ExitCode> {
    let blocking = safety
        .guardrail_results()
        .iter()
        .find(|result| !result.passed() || result.risk_level() == crate::validation::RiskLevel::Critical)?;

    Some(match blocking.name() {
        "concurrent_operation" => ExitCode::ConcurrentOperationConflict,
        "rpki_validation" => ExitCode::ValidationFailed,
        "bogon_prefix" | "prefix_count" => ExitCode::GuardrailViolation,
        _ => ExitCode::SafetyCheckFailed,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn commit_info_carries_error_message_on_failure() {
        let info = CommitInfo::new(
            CommitId::new("c-1"),
            Timestamp::now(),
            false,
            Some("commit failed: syntax error".into()),
        );
        assert!(!info.success());
        assert_eq!(info.error_message(), Some("commit failed: syntax error"));
    }

    #[test]
    fn health_result_without_error_on_success() {
        let health = HealthResult::new(true, vec!["bgp: 4 established".into()], None);
        assert!(health.success());
        assert!(health.error().is_none());
    }

    #[test]
    fn no_op_result_is_successful_with_no_commit() {
        let result = ApplicationResult::no_op(Hostname::new("r1"), None);
        assert!(result.success());
        assert!(result.is_no_op());
        assert!(result.commit_info().is_none());
    }

    #[test]
    fn failure_result_carries_the_error_message() {
        let result = ApplicationResult::failure(Hostname::new("r1"), "commit-check failed", None);
        assert!(!result.success());
        assert_eq!(result.error(), Some("commit-check failed"));
    }
}
