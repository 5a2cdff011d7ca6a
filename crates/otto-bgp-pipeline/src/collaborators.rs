// crates/otto-bgp-pipeline/src/collaborators.rs
// ============================================================================
// Module: External collaborator interfaces
// Description: Trait-level contracts for the components §1 places out of
// scope (fleet inventory, BGP-text collection, policy generation, report
// emission). The orchestrator only calls through these traits; it never
// implements them.
// Dependencies: otto-bgp-core
// ============================================================================

//! ## Overview
//! Four traits stand in for collaborators this workspace does not
//! implement: discovering the fleet, collecting each router's running BGP
//! configuration, generating prefix-list policies from discovered ASNs, and
//! emitting a report of what happened. A caller supplies concrete
//! implementations as trait objects; the orchestrator only depends on the
//! interface.

use std::error::Error as StdError;

use otto_bgp_core::Hostname;
use otto_bgp_core::Policy;
use otto_bgp_core::RouterProfile;

use crate::orchestrator::PipelineRunReport;

/// Discovers which routers make up the fleet (out of scope: inventory
/// source format and loading, §1).
pub trait FleetInventory: Send + Sync {
    /// The router profiles to run the pipeline against.
    ///
    /// # Errors
    /// Returns an implementation-defined error if inventory cannot be read.
    fn devices(&self) -> Result<Vec<RouterProfile>, Box<dyn StdError + Send + Sync>>;
}

/// Collects and parses one router's running BGP configuration over SSH
/// (out of scope: the collection transport and text parsing, §1).
pub trait BgpTextCollector: Send + Sync {
    /// Populate `profile`'s discovered AS numbers and BGP groups in place.
    ///
    /// # Errors
    /// Returns an implementation-defined error if collection fails.
    fn collect(&self, profile: &mut RouterProfile) -> Result<(), Box<dyn StdError + Send + Sync>>;
}

/// Generates prefix-list policies for a router's discovered AS numbers (out
/// of scope: invoking `bgpq4` and the IRR SSH-tunnel proxy, §1).
pub trait PolicyGenerator: Send + Sync {
    /// Generate one policy per AS number or IRR object a router discovered.
    ///
    /// # Errors
    /// Returns an implementation-defined error if generation fails.
    fn generate(&self, profile: &RouterProfile) -> Result<Vec<Policy>, Box<dyn StdError + Send + Sync>>;
}

/// Emits a report of a pipeline run (out of scope: report formatting and
/// delivery, §1).
pub trait ReportSink: Send + Sync {
    /// Record the outcome of a pipeline run. Best-effort: the orchestrator
    /// logs but does not fail the run if this errors.
    ///
    /// # Errors
    /// Returns an implementation-defined error if emission fails.
    fn emit(&self, report: &PipelineRunReport) -> Result<(), Box<dyn StdError + Send + Sync>>;
}

/// Where a generated policy bundle is scoped, used only to label per-target
/// diagnostics (direct mode produces one directory per router, §4.7).
#[derive(Debug, Clone)]
pub struct PolicyBundle {
    pub hostname: Hostname,
    pub policies: Vec<Policy>,
}
