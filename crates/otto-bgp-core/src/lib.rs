// crates/otto-bgp-core/src/lib.rs
// ============================================================================
// Module: Otto BGP Core
// Description: Shared data model, identifiers, error taxonomy, and exit-code
// ABI consumed by every other Otto BGP crate.
// Purpose: Give the rest of the workspace one canonical set of entity types
// so component crates never redefine the shapes in section 3 of the spec.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! `otto-bgp-core` holds the entities described by the Otto BGP data model:
//! policies, router profiles, VRP entries, validation results, guardrail and
//! safety-check results, commit/health results, and the rollout run/stage/
//! target/event hierarchy. It performs no I/O and spawns no threads; every
//! other crate in the workspace depends on it.

pub mod error;
pub mod exitcode;
pub mod identifiers;
pub mod netconf;
pub mod policy;
pub mod rollout;
pub mod router;
pub mod time;
pub mod validation;
pub mod vrp;

pub use error::OttoError;
pub use exitcode::ExitCode;
pub use identifiers::Asn;
pub use identifiers::CheckpointId;
pub use identifiers::CommitId;
pub use identifiers::EventId;
pub use identifiers::Hostname;
pub use identifiers::RunId;
pub use identifiers::StageId;
pub use identifiers::TargetId;
pub use netconf::ApplicationResult;
pub use netconf::CommitInfo;
pub use netconf::FinalizationMode;
pub use netconf::HealthResult;
pub use policy::Policy;
pub use policy::ResourceId;
pub use rollout::RolloutEvent;
pub use rollout::RolloutEventType;
pub use rollout::RolloutRun;
pub use rollout::RunState;
pub use rollout::Stage;
pub use rollout::StageState;
pub use rollout::Target;
pub use rollout::TargetState;
pub use router::Region;
pub use router::Role;
pub use router::RouterProfile;
pub use time::Timestamp;
pub use validation::GuardrailResult;
pub use validation::RiskLevel;
pub use validation::SafetyCheckResult;
pub use validation::ValidationResult;
pub use validation::ValidationState;
pub use vrp::VrpDataset;
pub use vrp::VrpEntry;
pub use vrp::VrpSourceFormat;
