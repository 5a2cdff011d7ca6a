// crates/otto-bgp-pipeline/src/error.rs
// ============================================================================
// Module: Pipeline Orchestrator errors
// Description: Failures raised wiring collaborators into direct or
// coordinator execution, distinct from a single router's ApplicationResult.
// Dependencies: thiserror, otto-bgp-core, otto-bgp-rollout
// ============================================================================

use thiserror::Error;

use otto_bgp_core::Hostname;
use otto_bgp_core::OttoError;

/// Failures raised by the Pipeline Orchestrator itself.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No router profiles were supplied to run against.
    #[error("no router profiles given to the pipeline")]
    NoDevices,
    /// `run_coordinated` was called on an orchestrator built with `new`
    /// (direct-mode only, no `RolloutCoordinator` attached).
    #[error("this orchestrator has no rollout coordinator attached")]
    NoCoordinator,
    /// A collaborator returned an error collecting or discovering a router.
    #[error("collaborator failed for {hostname}: {source}")]
    Collaborator {
        hostname: Hostname,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The rollout coordinator rejected the plan or run.
    #[error("rollout coordinator error: {0}")]
    Rollout(#[from] otto_bgp_rollout::RolloutError),
}

impl PipelineError {
    #[must_use]
    pub fn into_otto_error(self) -> OttoError {
        OttoError::General(self.to_string())
    }
}
