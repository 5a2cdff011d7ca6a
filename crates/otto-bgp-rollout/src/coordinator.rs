// crates/otto-bgp-rollout/src/coordinator.rs
// ============================================================================
// Module: Rollout Coordinator
// Description: Plans runs from a strategy, dispatches stages with a strict
// between-stage barrier, and records every transition as a durable Rollout
// Event (section 4.6, C7).
// Dependencies: otto-bgp-core, otto-bgp-safety, otto-bgp-store-sqlite
// ============================================================================

//! ## Overview
//! [`RolloutCoordinator`] owns the in-memory run registry (Run/Stage/Target
//! entities) and a durable [`EventStore`]. Run/Stage/Target state lives only
//! in the owning process — a crash loses in-flight state, but every
//! transition up to the crash is already durable as an Event, so a restart
//! can read the last event per run and report what happened (§4.6). The
//! coordinator implements `EventRecorder` itself so `execute_pipeline` can
//! record `pipeline_*` events directly into the same durable log.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use otto_bgp_core::ApplicationResult;
use otto_bgp_core::CommitId;
use otto_bgp_core::FinalizationMode;
use otto_bgp_core::Hostname;
use otto_bgp_core::Policy;
use otto_bgp_core::RolloutEvent;
use otto_bgp_core::RolloutEventType;
use otto_bgp_core::RolloutRun;
use otto_bgp_core::RouterProfile;
use otto_bgp_core::RunId;
use otto_bgp_core::RunState;
use otto_bgp_core::Stage;
use otto_bgp_core::StageId;
use otto_bgp_core::StageState;
use otto_bgp_core::Target;
use otto_bgp_core::TargetId;
use otto_bgp_core::TargetState;
use otto_bgp_core::Timestamp;
use otto_bgp_safety::EventRecorder;
use otto_bgp_safety::RolloutContext;
use otto_bgp_safety::UnifiedSafetyManager;
use otto_bgp_store_sqlite::EventStore;

use crate::error::RolloutError;
use crate::ids;
use crate::strategy::Strategy;

/// The devices and policy bundles a planned run needs but doesn't persist
/// on the `Target` entities themselves (§4.6: `policy_bundle_ref` is a
/// reference, not the bundle). Kept in memory only, alongside the run.
struct RunContext {
    addresses: BTreeMap<Hostname, String>,
    policies: BTreeMap<Hostname, Vec<Policy>>,
    finalization_mode: FinalizationMode,
}

/// Status snapshot returned by [`RolloutCoordinator::status`].
#[derive(Debug, Clone)]
pub struct RunStatus {
    pub run: RolloutRun,
}

/// Plans and drives staged multi-router rollouts (§4.6).
pub struct RolloutCoordinator {
    event_store: Arc<EventStore>,
    safety: Arc<UnifiedSafetyManager>,
    runs: Mutex<BTreeMap<RunId, RolloutRun>>,
    contexts: Mutex<BTreeMap<RunId, RunContext>>,
    cancellation: Mutex<BTreeMap<RunId, Arc<AtomicBool>>>,
}

impl RolloutCoordinator {
    #[must_use]
    pub fn new(event_store: Arc<EventStore>, safety: Arc<UnifiedSafetyManager>) -> Self {
        Self {
            event_store,
            safety,
            runs: Mutex::new(BTreeMap::new()),
            contexts: Mutex::new(BTreeMap::new()),
            cancellation: Mutex::new(BTreeMap::new()),
        }
    }

    /// Compute stages and targets from `strategy`, persist the run in
    /// `planned` state, and return its identifier (§4.6).
    ///
    /// # Errors
    /// Returns [`RolloutError`] if the strategy rejects `devices` (e.g.
    /// empty list, or Canary's named hostname absent).
    pub fn plan_run(
        &self,
        devices: &[RouterProfile],
        policies_by_hostname: &BTreeMap<Hostname, Vec<Policy>>,
        strategy: &dyn Strategy,
        initiated_by: impl Into<String>,
        finalization_mode: FinalizationMode,
    ) -> Result<RunId, RolloutError> {
        let planned_stages = strategy.plan(devices)?;
        let run_id = ids::new_run_id();

        let stages: Vec<Stage> = planned_stages
            .into_iter()
            .enumerate()
            .map(|(ordinal, planned)| {
                let stage_id = ids::new_stage_id(&run_id, ordinal as u32);
                let targets: Vec<Target> = planned
                    .hostnames
                    .into_iter()
                    .enumerate()
                    .map(|(index, hostname)| {
                        let target_id = ids::new_target_id(&stage_id, index as u32);
                        Target::new(target_id, stage_id.clone(), hostname.clone(), hostname.as_str())
                    })
                    .collect();
                Stage::new(stage_id, run_id.clone(), ordinal as u32, planned.concurrency, targets)
            })
            .collect();

        let run = RolloutRun::new(run_id.clone(), initiated_by, strategy.name(), Timestamp::now(), stages);

        let addresses = devices
            .iter()
            .map(|d| (d.hostname().clone(), d.address().to_owned()))
            .collect();

        self.runs.lock().unwrap_or_else(|p| p.into_inner()).insert(run_id.clone(), run);
        self.contexts.lock().unwrap_or_else(|p| p.into_inner()).insert(
            run_id.clone(),
            RunContext {
                addresses,
                policies: policies_by_hostname.clone(),
                finalization_mode,
            },
        );
        self.cancellation
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(run_id.clone(), Arc::new(AtomicBool::new(false)));

        self.append_event(&run_id, RolloutEventType::RunPlanned, serde_json::json!({"strategy": strategy.name()}));
        Ok(run_id)
    }

    /// Transition the run to `running` and dispatch its stages in order,
    /// blocking until the run reaches a terminal state (§4.6).
    ///
    /// # Errors
    /// Returns [`RolloutError::UnknownRun`] or
    /// [`RolloutError::NotDispatchable`].
    pub fn start_run(&self, run_id: &RunId) -> Result<(), RolloutError> {
        {
            let mut runs = self.runs.lock().unwrap_or_else(|p| p.into_inner());
            let run = runs.get_mut(run_id).ok_or_else(|| RolloutError::UnknownRun(run_id.clone()))?;
            if run.state() != RunState::Planned {
                return Err(RolloutError::NotDispatchable(run_id.clone()));
            }
            run.set_state(RunState::Running);
        }
        self.append_event(run_id, RolloutEventType::RunStarted, serde_json::json!({}));

        let stage_ids: Vec<StageId> = self
            .runs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(run_id)
            .map(|run| run.stages().iter().map(|s| s.stage_id().clone()).collect())
            .ok_or_else(|| RolloutError::UnknownRun(run_id.clone()))?;

        let is_canary = self
            .runs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(run_id)
            .is_some_and(|run| run.strategy_name() == "canary");

        let mut aborted = false;
        for (ordinal, stage_id) in stage_ids.iter().enumerate() {
            if self.is_cancelled(run_id) {
                self.cancel_remaining_stages(run_id, ordinal as u32);
                aborted = true;
                break;
            }
            self.dispatch_stage(run_id, stage_id)?;

            if is_canary && ordinal == 0 && self.stage_has_failure(run_id, stage_id) {
                self.cancel_remaining_stages(run_id, 1);
                aborted = true;
                break;
            }
        }

        self.finalize_run(run_id, aborted)
    }

    /// Dispatch up to `stage.concurrency` targets concurrently and block
    /// until every target in the stage reaches a terminal state (§4.6).
    ///
    /// # Errors
    /// Returns [`RolloutError::UnknownStage`] if `stage_id` isn't part of
    /// `run_id`.
    pub fn dispatch_stage(&self, run_id: &RunId, stage_id: &StageId) -> Result<(), RolloutError> {
        self.set_stage_state(run_id, stage_id, StageState::Running)?;
        self.append_event(run_id, RolloutEventType::StageStart, serde_json::json!({"stage_id": stage_id.as_str()}));

        let (concurrency, pending): (u32, Vec<(TargetId, Hostname)>) = {
            let mut runs = self.runs.lock().unwrap_or_else(|p| p.into_inner());
            let run = runs.get_mut(run_id).ok_or_else(|| RolloutError::UnknownRun(run_id.clone()))?;
            let stage = run
                .stages_mut()
                .iter_mut()
                .find(|s| s.stage_id() == stage_id)
                .ok_or_else(|| RolloutError::UnknownStage(stage_id.as_str().to_owned()))?;
            let concurrency = stage.concurrency();
            let mut pending = Vec::new();
            for target in stage.targets_mut() {
                if target.state() == TargetState::Pending {
                    pending.push((target.target_id().clone(), target.hostname().clone()));
                }
            }
            (concurrency, pending)
        };

        let cancelled = self.is_cancelled(run_id);
        if cancelled {
            self.retire_targets(run_id, stage_id, &pending, TargetState::Cancelled);
        } else {
            for batch in pending.chunks(concurrency.max(1) as usize) {
                self.dispatch_batch(run_id, stage_id, batch);
            }
        }

        self.set_stage_state(run_id, stage_id, StageState::Succeeded)?;
        self.append_event(run_id, RolloutEventType::StageComplete, serde_json::json!({"stage_id": stage_id.as_str()}));
        Ok(())
    }

    fn dispatch_batch(&self, run_id: &RunId, stage_id: &StageId, batch: &[(TargetId, Hostname)]) {
        for (target_id, _hostname) in batch {
            self.start_target(run_id, target_id);
        }
        let results: Mutex<Vec<(TargetId, ApplicationResult)>> = Mutex::new(Vec::new());
        std::thread::scope(|scope| {
            for (target_id, hostname) in batch {
                let results = &results;
                scope.spawn(move || {
                    let result = self.run_one_target(run_id, stage_id, target_id, hostname);
                    results.lock().unwrap_or_else(|p| p.into_inner()).push((target_id.clone(), result));
                });
            }
        });

        for (target_id, result) in results.into_inner().unwrap_or_else(|p| p.into_inner()) {
            let state = if result.success() { TargetState::Succeeded } else { TargetState::Failed };
            self.finish_target(run_id, &target_id, state, result.commit_info().map(|c| c.commit_id().clone()), result.error().map(str::to_owned));
        }
    }

    fn run_one_target(&self, run_id: &RunId, stage_id: &StageId, target_id: &TargetId, hostname: &Hostname) -> ApplicationResult {
        self.append_event(run_id, RolloutEventType::TargetStart, serde_json::json!({"target_id": target_id.as_str()}));

        let (address, policies, mode) = {
            let contexts = self.contexts.lock().unwrap_or_else(|p| p.into_inner());
            let Some(ctx) = contexts.get(run_id) else {
                return ApplicationResult::failure(hostname.clone(), "unknown run context", None);
            };
            let Some(address) = ctx.addresses.get(hostname).cloned() else {
                return ApplicationResult::failure(hostname.clone(), "no address on file for this hostname", None);
            };
            let policies = ctx.policies.get(hostname).cloned().unwrap_or_default();
            (address, policies, ctx.finalization_mode)
        };

        let safety = self.safety.validate_policies_before_apply(&policies);
        let rollout_context = RolloutContext {
            run_id: run_id.clone(),
            stage_id: stage_id.clone(),
            target_id: target_id.clone(),
            recorder: self,
        };
        self.safety.execute_pipeline(&policies, hostname, &address, mode, safety, Some(rollout_context))
    }

    fn finish_target(&self, run_id: &RunId, target_id: &TargetId, state: TargetState, commit_id: Option<CommitId>, error: Option<String>) {
        let mut runs = self.runs.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(run) = runs.get_mut(run_id) {
            for stage in run.stages_mut() {
                for target in stage.targets_mut() {
                    if target.target_id() == target_id {
                        let _ = target.finish(state, commit_id.clone(), error.clone());
                    }
                }
            }
        }
    }

    fn start_target(&self, run_id: &RunId, target_id: &TargetId) {
        let mut runs = self.runs.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(run) = runs.get_mut(run_id) {
            for stage in run.stages_mut() {
                for target in stage.targets_mut() {
                    if target.target_id() == target_id {
                        let _ = target.start();
                    }
                }
            }
        }
    }

    fn retire_targets(&self, run_id: &RunId, _stage_id: &StageId, pending: &[(TargetId, Hostname)], state: TargetState) {
        let mut runs = self.runs.lock().unwrap_or_else(|p| p.into_inner());
        let Some(run) = runs.get_mut(run_id) else { return };
        for (target_id, _) in pending {
            for stage in run.stages_mut() {
                for target in stage.targets_mut() {
                    if target.target_id() == target_id {
                        let _ = target.retire_without_dispatch(state);
                    }
                }
            }
        }
    }

    fn set_stage_state(&self, run_id: &RunId, stage_id: &StageId, state: StageState) -> Result<(), RolloutError> {
        let mut runs = self.runs.lock().unwrap_or_else(|p| p.into_inner());
        let run = runs.get_mut(run_id).ok_or_else(|| RolloutError::UnknownRun(run_id.clone()))?;
        let stage = run
            .stages_mut()
            .iter_mut()
            .find(|s| s.stage_id() == stage_id)
            .ok_or_else(|| RolloutError::UnknownStage(stage_id.as_str().to_owned()))?;
        stage.set_state(state);
        Ok(())
    }

    fn stage_has_failure(&self, run_id: &RunId, stage_id: &StageId) -> bool {
        self.runs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(run_id)
            .and_then(|run| run.stages().iter().find(|s| s.stage_id() == stage_id))
            .is_some_and(|stage| stage.targets().iter().any(|t| t.state() == TargetState::Failed))
    }

    fn cancel_remaining_stages(&self, run_id: &RunId, from_ordinal: u32) {
        let pending: Vec<(StageId, Vec<(TargetId, Hostname)>)> = {
            let mut runs = self.runs.lock().unwrap_or_else(|p| p.into_inner());
            let Some(run) = runs.get_mut(run_id) else { return };
            run.stages_mut()
                .iter_mut()
                .filter(|s| s.ordinal() >= from_ordinal)
                .map(|stage| {
                    let targets = stage
                        .targets()
                        .iter()
                        .filter(|t| t.state() == TargetState::Pending)
                        .map(|t| (t.target_id().clone(), t.hostname().clone()))
                        .collect();
                    stage.set_state(StageState::Cancelled);
                    (stage.stage_id().clone(), targets)
                })
                .collect()
        };
        for (stage_id, targets) in pending {
            self.retire_targets(run_id, &stage_id, &targets, TargetState::Cancelled);
        }
    }

    fn finalize_run(&self, run_id: &RunId, aborted_by_strategy: bool) -> Result<(), RolloutError> {
        let cancelled = self.is_cancelled(run_id);
        let mut runs = self.runs.lock().unwrap_or_else(|p| p.into_inner());
        let run = runs.get_mut(run_id).ok_or_else(|| RolloutError::UnknownRun(run_id.clone()))?;

        let final_state = if cancelled {
            RunState::Cancelled
        } else if aborted_by_strategy || !run.all_targets_succeeded_or_skipped() {
            RunState::Failed
        } else {
            RunState::Succeeded
        };
        run.set_state(final_state);
        drop(runs);

        let event_type = match final_state {
            RunState::Succeeded => RolloutEventType::RunSucceeded,
            RunState::Failed => RolloutEventType::RunFailed,
            RunState::Cancelled => RolloutEventType::RunCancelled,
            RunState::Planned | RunState::Running => RolloutEventType::Other("run_unknown".to_owned()),
        };
        self.append_event(run_id, event_type, serde_json::json!({}));
        Ok(())
    }

    fn is_cancelled(&self, run_id: &RunId) -> bool {
        self.cancellation
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(run_id)
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Mark `run_id` cancelled. In-flight targets finish their current
    /// attempt; not-yet-started targets are cancelled without dispatch
    /// (§4.6, §5): the coordinator never issues router-side cancellation.
    ///
    /// # Errors
    /// Returns [`RolloutError::UnknownRun`] if `run_id` isn't known.
    pub fn cancel_run(&self, run_id: &RunId) -> Result<(), RolloutError> {
        let flag = self
            .cancellation
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(run_id)
            .cloned()
            .ok_or_else(|| RolloutError::UnknownRun(run_id.clone()))?;
        flag.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Snapshot of the run tree with per-target state (§4.6).
    ///
    /// # Errors
    /// Returns [`RolloutError::UnknownRun`] if `run_id` isn't known.
    pub fn status(&self, run_id: &RunId) -> Result<RunStatus, RolloutError> {
        self.runs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(run_id)
            .cloned()
            .map(|run| RunStatus { run })
            .ok_or_else(|| RolloutError::UnknownRun(run_id.clone()))
    }

    /// Append a durable Rollout Event (§4.6).
    fn append_event(&self, run_id: &RunId, event_type: RolloutEventType, payload: serde_json::Value) {
        let event = RolloutEvent::new(ids::new_event_id(), run_id.clone(), event_type, payload, Timestamp::now());
        if let Err(err) = self.event_store.append(&event) {
            tracing::error!(%err, run_id = run_id.as_str(), "failed to append rollout event");
        }
    }
}

impl EventRecorder for RolloutCoordinator {
    fn record(&self, run_id: &RunId, stage_id: &StageId, target_id: &TargetId, event_type: &str, payload: &str) {
        let event_type = parse_event_type(event_type);
        let payload = serde_json::json!({
            "stage_id": stage_id.as_str(),
            "target_id": target_id.as_str(),
            "detail": payload,
        });
        self.append_event(run_id, event_type, payload);
    }
}

fn parse_event_type(raw: &str) -> RolloutEventType {
    match raw {
        "pipeline_start" => RolloutEventType::PipelineStart,
        "pipeline_success" => RolloutEventType::PipelineSuccess,
        "pipeline_failed" => RolloutEventType::PipelineFailed,
        "commit_ok" => RolloutEventType::CommitOk,
        "commit_failed" => RolloutEventType::CommitFailed,
        "rollback" | "target_rollback" => RolloutEventType::TargetRollback,
        other => RolloutEventType::Other(other.to_owned()),
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
    use otto_bgp_rpki::Allowlist;
    use otto_bgp_rpki::RpkiValidator;
    use otto_bgp_rpki::VrpStore;
    use otto_bgp_safety::SshCredentials;

    use super::*;
    use crate::strategy::BlastStrategy;
    use crate::strategy::CanaryStrategy;

    fn device(name: &str) -> RouterProfile {
        RouterProfile::new(Hostname::new(name), "10.0.0.1", Role("edge".into()), Region("us".into()))
    }

    fn coordinator() -> RolloutCoordinator {
        let event_store = Arc::new(EventStore::open_in_memory().unwrap());
        let rpki_validator = RpkiValidator::new(VrpStore::new("/tmp/unused.json"), Allowlist::empty(), &RpkiConfig::default());
        let safety = Arc::new(UnifiedSafetyManager::new(
            GuardrailsConfig::default(),
            NetconfConfig::default(),
            NotificationConfig::default(),
            rpki_validator,
            SshCredentials {
                username: "otto".to_owned(),
                private_key_path: "/dev/null".into(),
            },
        ));
        RolloutCoordinator::new(event_store, safety)
    }

    #[test]
    fn plan_run_builds_one_stage_for_blast() {
        let coordinator = coordinator();
        let devices = vec![device("r1"), device("r2"), device("r3")];
        let run_id = coordinator
            .plan_run(&devices, &BTreeMap::new(), &BlastStrategy { concurrency: 5 }, "operator", FinalizationMode::AutoFinalize)
            .unwrap();
        let status = coordinator.status(&run_id).unwrap();
        assert_eq!(status.run.stages().len(), 1);
        assert_eq!(status.run.stages()[0].targets().len(), 3);
        assert_eq!(status.run.state(), RunState::Planned);
    }

    #[test]
    fn plan_run_builds_two_stages_for_canary() {
        let coordinator = coordinator();
        let devices = vec![device("c"), device("r1"), device("r2")];
        let run_id = coordinator
            .plan_run(
                &devices,
                &BTreeMap::new(),
                &CanaryStrategy {
                    canary_hostname: Hostname::new("c"),
                    concurrency: 5,
                },
                "operator",
                FinalizationMode::AutoFinalize,
            )
            .unwrap();
        let status = coordinator.status(&run_id).unwrap();
        assert_eq!(status.run.stages().len(), 2);
        assert_eq!(status.run.stages()[0].targets().len(), 1);
        assert_eq!(status.run.stages()[1].targets().len(), 2);
    }

    #[test]
    fn cancel_run_before_start_marks_all_targets_cancelled() {
        let coordinator = coordinator();
        let devices = vec![device("r1"), device("r2")];
        let run_id = coordinator
            .plan_run(&devices, &BTreeMap::new(), &BlastStrategy { concurrency: 5 }, "operator", FinalizationMode::AutoFinalize)
            .unwrap();
        coordinator.cancel_run(&run_id).unwrap();
        coordinator.start_run(&run_id).unwrap();
        let status = coordinator.status(&run_id).unwrap();
        assert_eq!(status.run.state(), RunState::Cancelled);
        assert!(status
            .run
            .stages()
            .iter()
            .all(|s| s.targets().iter().all(|t| t.state() == TargetState::Cancelled)));
    }

    #[test]
    fn status_on_unknown_run_is_an_error() {
        let coordinator = coordinator();
        assert!(matches!(coordinator.status(&RunId::new("missing")), Err(RolloutError::UnknownRun(_))));
    }
}
