// crates/otto-bgp-pipeline/src/lib.rs
// ============================================================================
// Crate: otto-bgp-pipeline
// Description: Pipeline Orchestrator (section 4.7, C8): wires fleet
// discovery, BGP-text collection, and policy generation collaborators into
// either direct per-router execution or a staged rollout-coordinator run.
// ============================================================================

//! ## Overview
//! [`PipelineOrchestrator`] is the only type most callers need. The
//! collaborator traits in [`collaborators`] describe the inventory,
//! collection, generation, and reporting boundaries this crate consumes but
//! does not implement (§1 Non-goals).

mod collaborators;
mod error;
mod orchestrator;

pub use collaborators::BgpTextCollector;
pub use collaborators::FleetInventory;
pub use collaborators::PolicyBundle;
pub use collaborators::PolicyGenerator;
pub use collaborators::ReportSink;
pub use error::PipelineError;
pub use orchestrator::PipelineOrchestrator;
pub use orchestrator::PipelineRunReport;
pub use orchestrator::StrategyChoice;
