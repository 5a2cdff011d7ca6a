// crates/otto-bgp-rollout/src/lib.rs
// ============================================================================
// Crate: otto-bgp-rollout
// Description: Multi-Router Rollout Coordinator (section 4.6, C7): staging
// strategies, stage-barrier dispatch over the Unified Safety Manager, and a
// durable event log via otto-bgp-store-sqlite.
// ============================================================================

//! ## Overview
//! [`RolloutCoordinator`] plans a [`Strategy`]'s stages into a Run, then
//! `start_run` drives them with a strict between-stage barrier, invoking
//! `otto-bgp-safety`'s `execute_pipeline` once per target and recording
//! every transition as a durable event.

mod coordinator;
mod error;
mod ids;
mod strategy;

pub use coordinator::RolloutCoordinator;
pub use coordinator::RunStatus;
pub use error::RolloutError;
pub use strategy::BlastStrategy;
pub use strategy::CanaryStrategy;
pub use strategy::PhaseKey;
pub use strategy::PhasedStrategy;
pub use strategy::PlannedStage;
pub use strategy::Strategy;
