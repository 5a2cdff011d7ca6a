// crates/otto-bgp-netconf/src/error.rs
// ============================================================================
// Module: NETCONF Applier errors
// Description: The error taxonomy surfaced by the seven-step apply pipeline
// (section 4.5), one variant per documented failure mode.
// Dependencies: thiserror, otto-bgp-core
// ============================================================================

use thiserror::Error;

use otto_bgp_core::OttoError;

/// Failures surfaced by the NETCONF apply pipeline (§4.5).
#[derive(Debug, Error)]
pub enum NetconfError {
    /// TCP connect or SSH handshake failed before a session existed.
    #[error("NETCONF connect to {hostname} failed: {source}")]
    ConnectFailed {
        /// The target router's hostname.
        hostname: String,
        /// The underlying transport error.
        #[source]
        source: std::io::Error,
    },
    /// The presented host key did not match the known-hosts entry.
    #[error("host key mismatch for {hostname}")]
    HostKeyMismatch {
        /// The target router's hostname.
        hostname: String,
    },
    /// The exclusive configuration lock could not be acquired.
    #[error("failed to acquire exclusive configuration lock: {0}")]
    LockFailed(String),
    /// `commit-check` rejected the candidate configuration.
    #[error("commit-check failed: {0}")]
    CommitCheckFailed(String),
    /// The confirmed commit RPC itself failed or errored.
    #[error("NETCONF commit failed: {0}")]
    CommitFailed(String),
    /// Post-commit health probing failed or threw.
    #[error("post-commit health check failed: {0}")]
    HealthCheckFailed(String),
    /// Rolling back the candidate configuration failed.
    #[error("candidate rollback failed: {0}")]
    RollbackFailed(String),
    /// A guardrail gated this apply attempt and failed it.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    /// An RPC reply could not be parsed.
    #[error("malformed NETCONF reply: {0}")]
    MalformedReply(String),
}

impl NetconfError {
    /// Map to the cross-cutting error taxonomy for exit-code resolution
    /// (§7).
    #[must_use]
    pub fn into_otto_error(self) -> OttoError {
        match self {
            Self::ConnectFailed { hostname, source } => {
                OttoError::NetconfFailed(format!("connect to {hostname} failed: {source}"))
            }
            Self::HostKeyMismatch { hostname } => {
                OttoError::NetconfFailed(format!("host key mismatch for {hostname}"))
            }
            Self::LockFailed(msg) => OttoError::ConcurrentOperation(msg),
            Self::CommitCheckFailed(msg) => OttoError::NetconfFailed(format!("commit-check failed: {msg}")),
            Self::CommitFailed(msg) => OttoError::NetconfFailed(msg),
            Self::HealthCheckFailed(msg) => OttoError::HealthCheckFailed(msg),
            Self::RollbackFailed(msg) => OttoError::RollbackFailed(msg),
            Self::ValidationFailed(msg) => OttoError::ValidationFailed(msg),
            Self::MalformedReply(msg) => OttoError::NetconfFailed(msg),
        }
    }
}
