// crates/otto-bgp-core/src/exitcode.rs
// ============================================================================
// Module: Exit Code ABI
// Description: The stable process exit-code enumeration shared by the CLI
// and any monitoring that scrapes Otto BGP's process exit status.
// Purpose: Encode the spec's exit-code table as a single enumeration instead
// of scattered magic numbers (see REDESIGN FLAGS).
// Dependencies: none
// ============================================================================

//! ## Overview
//! `ExitCode` is the one place the numeric ABI lives. Every fallible code
//! path produces an [`crate::error::OttoError`], and [`ExitCode::from`]
//! (via `OttoError::exit_code`) is the only conversion back to a process
//! exit status.
//!
//! # Invariants
//! - Variant-to-number mapping is append-only; never renumber a variant.

/// Stable process exit codes for monitoring and the CLI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Completed successfully.
    Success = 0,
    /// Unclassified failure.
    GeneralError = 1,
    /// Invalid command-line usage.
    InvalidUsage = 2,
    /// A guardrail's safety check failed.
    SafetyCheckFailed = 3,
    /// NETCONF connection could not be established.
    NetconfConnectFailed = 4,
    /// Policy content failed validation.
    PolicyValidationFailed = 5,
    /// BGP session impact was assessed as critical.
    BgpImpactCritical = 6,
    /// A rollback attempt failed.
    RollbackFailed = 7,
    /// Autonomous mode refused to proceed.
    AutonomousModeBlocked = 8,
    /// A concurrent-operation lock (G3) is already held.
    ConcurrentOperationConflict = 20,
    /// A potential command-injection payload was rejected.
    CommandInjectionDetected = 13,
    /// An AS number failed validation.
    AsNumberValidationFailed = 14,
    /// A non-RPKI guardrail reported a violation.
    GuardrailViolation = 16,
    /// The `bgpq4` subprocess failed.
    Bgpq4ExecutionFailed = 17,
    /// RPKI or policy validation failed (G1.5).
    ValidationFailed = 21,
    /// Post-commit health probing failed.
    HealthCheckFailed = 22,
    /// Process terminated by SIGINT.
    Sigint = 130,
    /// Process terminated by SIGTERM.
    Sigterm = 143,
}

impl ExitCode {
    /// The numeric exit status, ready for `std::process::exit`.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Exit code for a terminating signal number, per `128 + signum` (§4.3
    /// G4, §7).
    #[must_use]
    pub fn for_signal(signum: u8) -> Self {
        match signum {
            2 => Self::Sigint,
            15 => Self::Sigterm,
            other => {
                // Not a named variant; callers that need the raw `128+n`
                // value for unlisted signals should use `raw_for_signal`.
                let _ = other;
                Self::GeneralError
            }
        }
    }

    /// Raw `128 + signum` value for any signal, including ones without a
    /// named variant above.
    #[must_use]
    pub fn raw_for_signal(signum: u8) -> u8 {
        128_u16.saturating_add(u16::from(signum)).min(255) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::ExitCode;

    #[test]
    fn numeric_values_match_the_spec_table() {
        assert_eq!(ExitCode::Success.as_u8(), 0);
        assert_eq!(ExitCode::ConcurrentOperationConflict.as_u8(), 20);
        assert_eq!(ExitCode::ValidationFailed.as_u8(), 21);
        assert_eq!(ExitCode::HealthCheckFailed.as_u8(), 22);
        assert_eq!(ExitCode::Sigint.as_u8(), 130);
        assert_eq!(ExitCode::Sigterm.as_u8(), 143);
    }

    #[test]
    fn raw_for_signal_matches_128_plus_signum() {
        assert_eq!(ExitCode::raw_for_signal(2), 130);
        assert_eq!(ExitCode::raw_for_signal(15), 143);
        assert_eq!(ExitCode::raw_for_signal(1), 129);
    }
}
