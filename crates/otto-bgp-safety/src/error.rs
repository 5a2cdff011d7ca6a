// crates/otto-bgp-safety/src/error.rs
// ============================================================================
// Module: Unified Safety Manager errors
// Description: Failures the manager itself can raise, distinct from a
// guardrail failing a check (section 4.4).
// Dependencies: thiserror, otto-bgp-core
// ============================================================================

use thiserror::Error;

use otto_bgp_core::OttoError;

/// Failures raised by the Unified Safety Manager itself.
#[derive(Debug, Error)]
pub enum SafetyError {
    /// The G3 exclusive lock could not be acquired.
    #[error("concurrent operation lock held by pid {0}")]
    LockHeld(i32),
    /// Acquiring or releasing the lock hit an I/O error.
    #[error("lock file I/O error: {0}")]
    LockIo(#[source] std::io::Error),
    /// The guardrail run marked this policy set unsafe to apply.
    #[error("guardrail check failed: {0}")]
    GuardrailFailed(String),
    /// The NETCONF pipeline itself reported a failure.
    #[error("netconf apply failed: {0}")]
    NetconfFailed(String),
    /// Notification delivery failed.
    #[error("notification delivery failed: {0}")]
    NotificationFailed(String),
}

impl SafetyError {
    #[must_use]
    pub fn into_otto_error(self) -> OttoError {
        match self {
            Self::LockHeld(pid) => OttoError::ConcurrentOperation(format!("lock held by pid {pid}")),
            Self::LockIo(e) => OttoError::ConcurrentOperation(e.to_string()),
            Self::GuardrailFailed(msg) => OttoError::GuardrailViolation(msg),
            Self::NetconfFailed(msg) => OttoError::NetconfFailed(msg),
            Self::NotificationFailed(msg) => OttoError::General(msg),
        }
    }
}
