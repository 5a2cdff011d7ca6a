// crates/otto-bgp-rollout/src/error.rs
// ============================================================================
// Module: Rollout Coordinator errors
// Description: Failures raised by plan/start/dispatch/status operations,
// distinct from a single target's pipeline failure (which is recorded on
// the Target itself, not raised as an error).
// Dependencies: thiserror, otto-bgp-core
// ============================================================================

use thiserror::Error;

use otto_bgp_core::OttoError;
use otto_bgp_core::RunId;

/// Failures raised by the Rollout Coordinator itself.
#[derive(Debug, Error)]
pub enum RolloutError {
    /// `devices` was empty; there is nothing to plan.
    #[error("no devices given to plan_run")]
    NoDevices,
    /// A Canary strategy's named canary hostname wasn't among `devices`.
    #[error("canary hostname {0:?} is not among the devices given to plan_run")]
    UnknownCanary(String),
    /// The referenced run does not exist in this process's run registry.
    #[error("unknown run {0}")]
    UnknownRun(RunId),
    /// The referenced stage does not exist within its run.
    #[error("unknown stage {0}")]
    UnknownStage(String),
    /// `start_run`/`dispatch_stage` called on a run not in `planned`/`running`.
    #[error("run {0} is not in a dispatchable state")]
    NotDispatchable(RunId),
    /// The durable event store rejected a write or read.
    #[error("event store error: {0}")]
    Store(#[from] otto_bgp_store_sqlite::StoreError),
}

impl RolloutError {
    #[must_use]
    pub fn into_otto_error(self) -> OttoError {
        OttoError::General(self.to_string())
    }
}
