// crates/otto-bgp-pipeline/src/orchestrator.rs
// ============================================================================
// Module: Pipeline Orchestrator
// Description: Wires collaborators into either direct per-router execution
// or a rollout-coordinator plan (section 4.7, C8).
// Dependencies: otto-bgp-core, otto-bgp-config, otto-bgp-safety,
// otto-bgp-rollout
// ============================================================================

//! ## Overview
//! [`PipelineOrchestrator`] owns a [`UnifiedSafetyManager`] and an optional
//! [`RolloutCoordinator`]. [`PipelineOrchestrator::run_direct`] applies
//! policies to each router one at a time with no rollout plan.
//! [`PipelineOrchestrator::run_coordinated`] builds a staged plan and hands
//! it to the coordinator, returning the `run_id` for out-of-band status.

use std::collections::BTreeMap;
use std::sync::Arc;

use otto_bgp_config::RolloutConfig;
use otto_bgp_core::ApplicationResult;
use otto_bgp_core::FinalizationMode;
use otto_bgp_core::Hostname;
use otto_bgp_core::Policy;
use otto_bgp_core::RouterProfile;
use otto_bgp_core::RunId;
use otto_bgp_rollout::BlastStrategy;
use otto_bgp_rollout::CanaryStrategy;
use otto_bgp_rollout::PhaseKey;
use otto_bgp_rollout::PhasedStrategy;
use otto_bgp_rollout::RolloutCoordinator;
use otto_bgp_rollout::Strategy;
use otto_bgp_safety::UnifiedSafetyManager;

use crate::error::PipelineError;

/// Which staging strategy `run_coordinated` should plan with. Concurrency
/// for each variant comes from [`RolloutConfig`], not from this choice.
#[derive(Debug, Clone)]
pub enum StrategyChoice {
    /// One stage containing every device (§4.6).
    Blast,
    /// One stage per region or role, in sorted key order (§4.6).
    Phased(PhaseKey),
    /// Stage 0 is the named canary, stage 1 is everything else (§4.6).
    Canary(Hostname),
}

/// Summary of a completed pipeline run, handed to a [`ReportSink`](crate::collaborators::ReportSink).
#[derive(Debug, Clone)]
pub struct PipelineRunReport {
    /// Direct-mode results, one per router; empty in coordinator mode. Kept
    /// as the full [`ApplicationResult`] (not flattened to a bool) so a
    /// caller can map each one to the stable exit-code ABI (§6/§8).
    pub direct_results: Vec<ApplicationResult>,
    /// Coordinator-mode run identifier, if this run used `run_coordinated`.
    pub run_id: Option<RunId>,
}

/// Glue between external collaborators and the core (§4.7, C8).
pub struct PipelineOrchestrator {
    safety: Arc<UnifiedSafetyManager>,
    coordinator: Option<Arc<RolloutCoordinator>>,
}

impl PipelineOrchestrator {
    /// Construct an orchestrator for direct-mode-only use.
    #[must_use]
    pub fn new(safety: Arc<UnifiedSafetyManager>) -> Self {
        Self {
            safety,
            coordinator: None,
        }
    }

    /// Construct an orchestrator that can also run coordinator mode.
    #[must_use]
    pub fn with_coordinator(safety: Arc<UnifiedSafetyManager>, coordinator: Arc<RolloutCoordinator>) -> Self {
        Self {
            safety,
            coordinator: Some(coordinator),
        }
    }

    /// Direct mode (§4.7): for each router, call `execute_pipeline` directly
    /// with no rollout plan. Routers are applied one at a time; direct mode
    /// has no stage concept to bound concurrency against.
    ///
    /// # Errors
    /// Returns [`PipelineError::NoDevices`] if `policies_by_hostname` names
    /// no routers.
    pub fn run_direct(
        &self,
        policies_by_hostname: &BTreeMap<Hostname, Vec<Policy>>,
        addresses: &BTreeMap<Hostname, String>,
        mode: FinalizationMode,
    ) -> Result<PipelineRunReport, PipelineError> {
        if policies_by_hostname.is_empty() {
            return Err(PipelineError::NoDevices);
        }

        let mut direct_results = Vec::with_capacity(policies_by_hostname.len());
        for (hostname, policies) in policies_by_hostname {
            let Some(address) = addresses.get(hostname) else {
                tracing::error!(%hostname, "no address on file, skipping direct-mode apply");
                direct_results.push(ApplicationResult::failure(hostname.clone(), "no address on file", None));
                continue;
            };
            let safety = self.safety.validate_policies_before_apply(policies);
            let result: ApplicationResult = self.safety.execute_pipeline(policies, hostname, address, mode, safety, None);
            direct_results.push(result);
        }

        Ok(PipelineRunReport {
            direct_results,
            run_id: None,
        })
    }

    /// Coordinator mode (§4.7): plan a staged run from `devices` and
    /// `policies_by_hostname`, start it, and return its `run_id` for
    /// out-of-band status via [`RolloutCoordinator::status`].
    ///
    /// # Errors
    /// Returns [`PipelineError::NoDevices`] if `devices` is empty, or
    /// [`PipelineError::Rollout`] if planning or starting the run fails.
    pub fn run_coordinated(
        &self,
        devices: &[RouterProfile],
        policies_by_hostname: &BTreeMap<Hostname, Vec<Policy>>,
        strategy_choice: &StrategyChoice,
        rollout_config: &RolloutConfig,
        initiated_by: impl Into<String>,
        finalization_mode: FinalizationMode,
    ) -> Result<PipelineRunReport, PipelineError> {
        if devices.is_empty() {
            return Err(PipelineError::NoDevices);
        }
        let coordinator = self.coordinator.as_ref().ok_or(PipelineError::NoCoordinator)?;

        let strategy: Box<dyn Strategy> = match strategy_choice {
            StrategyChoice::Blast => Box::new(BlastStrategy {
                concurrency: rollout_config.blast_concurrency,
            }),
            StrategyChoice::Phased(key) => Box::new(PhasedStrategy {
                key: *key,
                concurrency: rollout_config.phased_concurrency,
            }),
            StrategyChoice::Canary(canary_hostname) => Box::new(CanaryStrategy {
                canary_hostname: canary_hostname.clone(),
                concurrency: rollout_config.canary_concurrency,
            }),
        };

        let run_id = coordinator.plan_run(devices, policies_by_hostname, strategy.as_ref(), initiated_by, finalization_mode)?;
        coordinator.start_run(&run_id)?;

        Ok(PipelineRunReport {
            direct_results: Vec::new(),
            run_id: Some(run_id),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use otto_bgp_config::GuardrailsConfig;
    use otto_bgp_config::NetconfConfig;
    use otto_bgp_config::NotificationConfig;
    use otto_bgp_config::RpkiConfig;
    use otto_bgp_core::Region;
    use otto_bgp_core::Role;
    use otto_bgp_rollout::RolloutCoordinator;
    use otto_bgp_rpki::Allowlist;
    use otto_bgp_rpki::RpkiValidator;
    use otto_bgp_rpki::VrpStore;
    use otto_bgp_safety::SshCredentials;
    use otto_bgp_store_sqlite::EventStore;

    use super::*;

    fn safety() -> Arc<UnifiedSafetyManager> {
        let rpki_validator = RpkiValidator::new(VrpStore::new("/tmp/unused.json"), Allowlist::empty(), &RpkiConfig::default());
        Arc::new(UnifiedSafetyManager::new(
            GuardrailsConfig::default(),
            NetconfConfig::default(),
            NotificationConfig::default(),
            rpki_validator,
            SshCredentials {
                username: "otto".to_owned(),
                private_key_path: "/dev/null".into(),
            },
        ))
    }

    #[test]
    fn run_direct_rejects_an_empty_policy_map() {
        let orchestrator = PipelineOrchestrator::new(safety());
        let err = orchestrator
            .run_direct(&BTreeMap::new(), &BTreeMap::new(), FinalizationMode::ManualConfirm)
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoDevices));
    }

    #[test]
    fn run_coordinated_rejects_an_empty_device_list() {
        let event_store = Arc::new(EventStore::open_in_memory().unwrap());
        let safety = safety();
        let coordinator = Arc::new(RolloutCoordinator::new(event_store, Arc::clone(&safety)));
        let orchestrator = PipelineOrchestrator::with_coordinator(safety, coordinator);
        let err = orchestrator
            .run_coordinated(
                &[],
                &BTreeMap::new(),
                &StrategyChoice::Blast,
                &RolloutConfig::default(),
                "operator",
                FinalizationMode::ManualConfirm,
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoDevices));
    }

    #[test]
    fn run_coordinated_returns_a_run_id_for_a_planned_blast() {
        let event_store = Arc::new(EventStore::open_in_memory().unwrap());
        let safety = safety();
        let coordinator = Arc::new(RolloutCoordinator::new(event_store, Arc::clone(&safety)));
        let orchestrator = PipelineOrchestrator::with_coordinator(safety, coordinator);
        let devices = vec![RouterProfile::new(Hostname::new("r1"), "10.0.0.1", Role("edge".into()), Region("us".into()))];
        let report = orchestrator
            .run_coordinated(
                &devices,
                &BTreeMap::new(),
                &StrategyChoice::Blast,
                &RolloutConfig::default(),
                "operator",
                FinalizationMode::ManualConfirm,
            )
            .unwrap();
        assert!(report.run_id.is_some());
    }
}
