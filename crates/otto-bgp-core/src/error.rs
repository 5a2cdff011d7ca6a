// crates/otto-bgp-core/src/error.rs
// ============================================================================
// Module: OttoError
// Description: Cross-cutting error taxonomy mapped onto the exit-code ABI.
// Purpose: Give every crate one error type to bubble up when it needs to
// reach the CLI boundary and become a process exit code (section 7).
// Dependencies: thiserror, crate::exitcode
// ============================================================================

//! ## Overview
//! Component crates mostly define their own narrow `thiserror` enums
//! (`RpkiError`, `NetconfError`, ...). `OttoError` is the wrapper those
//! convert into once an operation needs to report a stable exit code; it is
//! the only type `otto-bgp-cli` needs to understand.

use thiserror::Error;

use crate::exitcode::ExitCode;

/// Cross-cutting error taxonomy, one variant per §7 error kind.
#[derive(Debug, Error)]
pub enum OttoError {
    /// Malformed input: AS numbers, policy names, CIDRs, or missing config.
    #[error("input validation failed: {0}")]
    InputValidation(String),
    /// A command-injection-shaped argument was rejected before exec.
    #[error("rejected unsafe subprocess argument: {0}")]
    CommandInjection(String),
    /// A guardrail reported a safety failure.
    #[error("safety check failed: {0}")]
    SafetyCheckFailed(String),
    /// A non-RPKI guardrail reported a violation at or above its threshold.
    #[error("guardrail violation: {0}")]
    GuardrailViolation(String),
    /// RPKI / prefix validation failed (G1.5).
    #[error("policy validation failed: {0}")]
    ValidationFailed(String),
    /// BGP session impact assessed as critical.
    #[error("BGP impact assessed critical: {0}")]
    BgpImpactCritical(String),
    /// NETCONF connect, lock, commit-check, or commit failure.
    #[error("NETCONF operation failed: {0}")]
    NetconfFailed(String),
    /// Post-commit health probing failed or an established-peer count drop
    /// was observed.
    #[error("post-commit health check failed: {0}")]
    HealthCheckFailed(String),
    /// Candidate-configuration rollback itself failed.
    #[error("rollback failed: {0}")]
    RollbackFailed(String),
    /// Autonomous mode refused to finalize.
    #[error("autonomous mode blocked: {0}")]
    AutonomousModeBlocked(String),
    /// G3's lock file is already held by a live process.
    #[error("concurrent operation conflict: {0}")]
    ConcurrentOperation(String),
    /// `bgpq4` subprocess invocation failed.
    #[error("bgpq4 execution failed: {0}")]
    Bgpq4Failed(String),
    /// Lock file, VRP cache, or other filesystem/resource error.
    #[error("resource error: {0}")]
    Resource(String),
    /// Unclassified error.
    #[error("{0}")]
    General(String),
}

impl OttoError {
    /// Map this error to the stable exit-code ABI (§7).
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InputValidation(_) => ExitCode::ValidationFailed,
            Self::CommandInjection(_) => ExitCode::CommandInjectionDetected,
            Self::SafetyCheckFailed(_) => ExitCode::SafetyCheckFailed,
            Self::GuardrailViolation(_) => ExitCode::GuardrailViolation,
            Self::ValidationFailed(_) => ExitCode::ValidationFailed,
            Self::BgpImpactCritical(_) => ExitCode::BgpImpactCritical,
            Self::NetconfFailed(_) => ExitCode::NetconfConnectFailed,
            Self::HealthCheckFailed(_) => ExitCode::HealthCheckFailed,
            Self::RollbackFailed(_) => ExitCode::RollbackFailed,
            Self::AutonomousModeBlocked(_) => ExitCode::AutonomousModeBlocked,
            Self::ConcurrentOperation(_) => ExitCode::ConcurrentOperationConflict,
            Self::Bgpq4Failed(_) => ExitCode::Bgpq4ExecutionFailed,
            Self::Resource(_) => ExitCode::GeneralError,
            Self::General(_) => ExitCode::GeneralError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OttoError;
    use crate::exitcode::ExitCode;

    #[test]
    fn maps_each_variant_to_the_documented_exit_code() {
        assert_eq!(
            OttoError::ConcurrentOperation("locked".into()).exit_code(),
            ExitCode::ConcurrentOperationConflict
        );
        assert_eq!(
            OttoError::HealthCheckFailed("probe timeout".into()).exit_code(),
            ExitCode::HealthCheckFailed
        );
        assert_eq!(
            OttoError::ValidationFailed("rpki invalid".into()).exit_code(),
            ExitCode::ValidationFailed
        );
    }
}
