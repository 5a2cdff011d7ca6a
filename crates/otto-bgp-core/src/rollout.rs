// crates/otto-bgp-core/src/rollout.rs
// ============================================================================
// Module: Rollout Run / Stage / Target / Event
// Description: The coordinator's hierarchical unit of work and its durable
// audit trail (section 3, section 4.6).
// Purpose: Shared entity shapes between otto-bgp-rollout (which drives state
// transitions) and otto-bgp-store-sqlite (which persists them).
// Dependencies: serde, serde_json, crate::{identifiers, netconf, time}
// ============================================================================

//! ## Overview
//! A Run owns Stages, which own Targets (§3). Targets transition
//! monotonically through `pending -> running -> {succeeded, failed,
//! skipped, cancelled}`; backwards transitions are forbidden and enforced
//! here by [`TargetState::can_transition_to`] rather than left to callers
//! to get right independently.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::CommitId;
use crate::identifiers::EventId;
use crate::identifiers::Hostname;
use crate::identifiers::RunId;
use crate::identifiers::StageId;
use crate::identifiers::TargetId;
use crate::time::Timestamp;

/// A Run's lifecycle state (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Planned but not yet started.
    Planned,
    /// Dispatching stages.
    Running,
    /// Every target reached `succeeded` or `skipped`.
    Succeeded,
    /// At least one target failed in a way the strategy treats as fatal.
    Failed,
    /// Cancelled before or during execution.
    Cancelled,
}

/// A Stage's lifecycle state, mirroring [`RunState`] at stage scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Not yet dispatched.
    Planned,
    /// Targets are being dispatched.
    Running,
    /// Every target in the stage reached a terminal state, none fatally.
    Succeeded,
    /// At least one target failed and the strategy treats this as fatal.
    Failed,
    /// Cancelled before or during dispatch.
    Cancelled,
}

/// A Target's state lattice (§3, §8 item 3/7).
///
/// # Invariants
/// - Transitions are monotonic: `pending -> running -> terminal`.
/// - Backwards transitions are rejected by [`TargetState::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    /// Scheduled but not yet dispatched.
    Pending,
    /// The apply pipeline is in flight for this target.
    Running,
    /// The apply pipeline completed successfully.
    Succeeded,
    /// The apply pipeline failed.
    Failed,
    /// Skipped without being dispatched (e.g. a prior canary failure).
    Skipped,
    /// Cancelled before completion.
    Cancelled,
}

impl TargetState {
    /// True once a target has reached a state from which it will never
    /// transition again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    /// Whether transitioning from `self` to `next` is allowed by the state
    /// lattice `pending -> running -> {succeeded, failed, skipped,
    /// cancelled}`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Running | Self::Skipped | Self::Cancelled) => true,
            (
                Self::Running,
                Self::Succeeded | Self::Failed | Self::Cancelled,
            ) => true,
            _ => false,
        }
    }
}

/// One router scheduled within a Stage (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    target_id: TargetId,
    stage_id: StageId,
    hostname: Hostname,
    policy_bundle_ref: String,
    state: TargetState,
    attempt_count: u32,
    last_error: Option<String>,
    commit_id: Option<CommitId>,
}

/// An attempted backwards or otherwise illegal [`Target`] state
/// transition.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("illegal target transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// The state the target was in.
    pub from: TargetState,
    /// The rejected destination state.
    pub to: TargetState,
}

impl Target {
    /// Construct a pending target.
    #[must_use]
    pub fn new(
        target_id: TargetId,
        stage_id: StageId,
        hostname: Hostname,
        policy_bundle_ref: impl Into<String>,
    ) -> Self {
        Self {
            target_id,
            stage_id,
            hostname,
            policy_bundle_ref: policy_bundle_ref.into(),
            state: TargetState::Pending,
            attempt_count: 0,
            last_error: None,
            commit_id: None,
        }
    }

    /// The target's identifier.
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.target_id
    }

    /// The owning stage's identifier.
    #[must_use]
    pub fn stage_id(&self) -> &StageId {
        &self.stage_id
    }

    /// The router this target applies to.
    #[must_use]
    pub fn hostname(&self) -> &Hostname {
        &self.hostname
    }

    /// A reference to the policy bundle this target applies.
    #[must_use]
    pub fn policy_bundle_ref(&self) -> &str {
        &self.policy_bundle_ref
    }

    /// The target's current state.
    #[must_use]
    pub fn state(&self) -> TargetState {
        self.state
    }

    /// How many apply attempts have been made for this target.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// The most recent error, if the last attempt failed.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The commit this target's apply attempt produced, if any. At most one
    /// target may reference a given commit within a run (§3).
    #[must_use]
    pub fn commit_id(&self) -> Option<&CommitId> {
        self.commit_id.as_ref()
    }

    /// Begin an attempt: `pending -> running`, incrementing `attempt_count`
    /// monotonically (§8 item 7).
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] if the target is not `Pending`.
    pub fn start(&mut self) -> Result<(), IllegalTransition> {
        self.transition(TargetState::Running)?;
        self.attempt_count += 1;
        Ok(())
    }

    /// Finish an attempt with a terminal state and optional commit/error
    /// context.
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] if the requested `state` is not
    /// terminal-reachable from the current state.
    pub fn finish(
        &mut self,
        state: TargetState,
        commit_id: Option<CommitId>,
        error: Option<String>,
    ) -> Result<(), IllegalTransition> {
        self.transition(state)?;
        self.commit_id = commit_id;
        self.last_error = error;
        Ok(())
    }

    /// Skip or cancel a target that was never dispatched.
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] if `state` is not reachable from
    /// `Pending`.
    pub fn retire_without_dispatch(
        &mut self,
        state: TargetState,
    ) -> Result<(), IllegalTransition> {
        self.transition(state)
    }

    fn transition(&mut self, next: TargetState) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

/// An ordered or concurrent batch of Targets within a Run (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    stage_id: StageId,
    run_id: RunId,
    ordinal: u32,
    concurrency: u32,
    state: StageState,
    targets: Vec<Target>,
}

impl Stage {
    /// Construct a planned stage. `concurrency` is clamped to at least 1
    /// (§3: `concurrency (u32 >= 1)`).
    #[must_use]
    pub fn new(stage_id: StageId, run_id: RunId, ordinal: u32, concurrency: u32, targets: Vec<Target>) -> Self {
        Self {
            stage_id,
            run_id,
            ordinal,
            concurrency: concurrency.max(1),
            state: StageState::Planned,
            targets,
        }
    }

    /// The stage's identifier.
    #[must_use]
    pub fn stage_id(&self) -> &StageId {
        &self.stage_id
    }

    /// The owning run's identifier.
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// This stage's position within the run's ordered stage list.
    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// How many targets may run concurrently within this stage.
    #[must_use]
    pub fn concurrency(&self) -> u32 {
        self.concurrency
    }

    /// The stage's current state.
    #[must_use]
    pub fn state(&self) -> StageState {
        self.state
    }

    /// Set the stage's state directly; the coordinator derives this from
    /// its targets' terminal states.
    pub fn set_state(&mut self, state: StageState) {
        self.state = state;
    }

    /// This stage's targets.
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Mutable access to this stage's targets.
    pub fn targets_mut(&mut self) -> &mut [Target] {
        &mut self.targets
    }

    /// True once every target in the stage has reached a terminal state.
    #[must_use]
    pub fn all_targets_terminal(&self) -> bool {
        self.targets.iter().all(|t| t.state().is_terminal())
    }
}

/// A coordinated multi-router application (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutRun {
    run_id: RunId,
    initiated_by: String,
    strategy_name: String,
    created_at: Timestamp,
    state: RunState,
    stages: Vec<Stage>,
}

impl RolloutRun {
    /// Construct a planned run.
    #[must_use]
    pub fn new(
        run_id: RunId,
        initiated_by: impl Into<String>,
        strategy_name: impl Into<String>,
        created_at: Timestamp,
        stages: Vec<Stage>,
    ) -> Self {
        Self {
            run_id,
            initiated_by: initiated_by.into(),
            strategy_name: strategy_name.into(),
            created_at,
            state: RunState::Planned,
            stages,
        }
    }

    /// The run's identifier.
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Who or what initiated the run (operator, scheduler, CI).
    #[must_use]
    pub fn initiated_by(&self) -> &str {
        &self.initiated_by
    }

    /// The rollout strategy's name (`blast`, `phased`, `canary`).
    #[must_use]
    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    /// When the run was planned.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// The run's current state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Set the run's state directly.
    pub fn set_state(&mut self, state: RunState) {
        self.state = state;
    }

    /// The run's stages, in dispatch order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Mutable access to the run's stages.
    pub fn stages_mut(&mut self) -> &mut [Stage] {
        &mut self.stages
    }

    /// A run is `succeeded` only if every target state is `succeeded` or
    /// `skipped` (§3 cross-entity invariant).
    #[must_use]
    pub fn all_targets_succeeded_or_skipped(&self) -> bool {
        self.stages.iter().all(|stage| {
            stage
                .targets()
                .iter()
                .all(|t| matches!(t.state(), TargetState::Succeeded | TargetState::Skipped))
        })
    }
}

/// The kind of a durable [`RolloutEvent`] (§3, §4.6, non-exhaustive list
/// kept as named variants plus a fallback for forward compatibility).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutEventType {
    /// The pipeline started for a target.
    PipelineStart,
    /// The pipeline for a target completed successfully.
    PipelineSuccess,
    /// The pipeline for a target failed.
    PipelineFailed,
    /// A NETCONF commit succeeded.
    CommitOk,
    /// A NETCONF commit failed.
    CommitFailed,
    /// A rollback (candidate discard, not a router-side confirmed-commit
    /// revert) occurred for a target.
    TargetRollback,
    /// A run was planned.
    RunPlanned,
    /// A run started dispatching.
    RunStarted,
    /// A stage started dispatching.
    StageStart,
    /// A stage's targets all reached a terminal state.
    StageComplete,
    /// A target started dispatching.
    TargetStart,
    /// A run reached `succeeded`.
    RunSucceeded,
    /// A run reached `failed`.
    RunFailed,
    /// A run was cancelled.
    RunCancelled,
    /// An event type not covered by the named variants above.
    Other(String),
}

/// A durable, append-only audit record (§3).
///
/// # Invariants
/// - Never mutated after creation.
/// - `recorded_at` is monotonic per `run_id` (§3, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutEvent {
    event_id: EventId,
    run_id: RunId,
    event_type: RolloutEventType,
    payload: Value,
    recorded_at: Timestamp,
}

impl RolloutEvent {
    /// Construct an event record.
    #[must_use]
    pub fn new(
        event_id: EventId,
        run_id: RunId,
        event_type: RolloutEventType,
        payload: Value,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            event_id,
            run_id,
            event_type,
            payload,
            recorded_at,
        }
    }

    /// The event's identifier.
    #[must_use]
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    /// The run this event belongs to.
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// The event's type.
    #[must_use]
    pub fn event_type(&self) -> &RolloutEventType {
        &self.event_type
    }

    /// The event's structured payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// When the event was recorded.
    #[must_use]
    pub fn recorded_at(&self) -> Timestamp {
        self.recorded_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target::new(
            TargetId::new("t1"),
            StageId::new("s1"),
            Hostname::new("r1"),
            "bundle-1",
        )
    }

    #[test]
    fn pending_cannot_jump_directly_to_succeeded() {
        let mut t = target();
        let err = t.finish(TargetState::Succeeded, None, None).unwrap_err();
        assert_eq!(err.from, TargetState::Pending);
        assert_eq!(err.to, TargetState::Succeeded);
    }

    #[test]
    fn pending_to_running_to_succeeded_is_allowed() {
        let mut t = target();
        t.start().unwrap();
        assert_eq!(t.attempt_count(), 1);
        t.finish(TargetState::Succeeded, Some(CommitId::new("c1")), None)
            .unwrap();
        assert_eq!(t.state(), TargetState::Succeeded);
        assert_eq!(t.commit_id().unwrap().as_str(), "c1");
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut t = target();
        t.start().unwrap();
        t.finish(TargetState::Failed, None, Some("boom".into()))
            .unwrap();
        assert!(t.start().is_err());
    }

    #[test]
    fn attempt_count_is_monotonically_non_decreasing_across_retries() {
        let mut t = target();
        t.start().unwrap();
        t.finish(TargetState::Failed, None, Some("e1".into())).unwrap();
        assert_eq!(t.attempt_count(), 1);
    }

    #[test]
    fn run_succeeds_only_if_all_targets_succeeded_or_skipped() {
        let mut t1 = target();
        t1.start().unwrap();
        t1.finish(TargetState::Succeeded, None, None).unwrap();
        let mut t2 = Target::new(
            TargetId::new("t2"),
            StageId::new("s1"),
            Hostname::new("r2"),
            "bundle-1",
        );
        t2.retire_without_dispatch(TargetState::Skipped).unwrap();

        let stage = Stage::new(StageId::new("s1"), RunId::new("run-1"), 0, 2, vec![t1, t2]);
        let run = RolloutRun::new(
            RunId::new("run-1"),
            "operator",
            "blast",
            Timestamp::now(),
            vec![stage],
        );
        assert!(run.all_targets_succeeded_or_skipped());
    }

    #[test]
    fn stage_concurrency_is_clamped_to_at_least_one() {
        let stage = Stage::new(StageId::new("s1"), RunId::new("run-1"), 0, 0, Vec::new());
        assert_eq!(stage.concurrency(), 1);
    }
}
