// crates/otto-bgp-rollout/src/ids.rs
// ============================================================================
// Module: Identifier generation
// Description: Mints RunId/StageId/TargetId/EventId values: a timestamp
// compact-stamp plus a random suffix, matching the
// unified_safety_YYYYMMDD_HHMMSS shape used for Checkpoint ids elsewhere.
// Dependencies: otto-bgp-core, rand
// ============================================================================

use otto_bgp_core::EventId;
use otto_bgp_core::RunId;
use otto_bgp_core::StageId;
use otto_bgp_core::TargetId;
use otto_bgp_core::Timestamp;

fn stamped(prefix: &str) -> String {
    let suffix: u32 = rand::random();
    format!("{prefix}_{}_{:08x}", Timestamp::now().to_compact_stamp(), suffix)
}

pub fn new_run_id() -> RunId {
    RunId::new(stamped("run"))
}

pub fn new_stage_id(run_id: &RunId, ordinal: u32) -> StageId {
    StageId::new(format!("{}_stage{ordinal}", run_id.as_str()))
}

pub fn new_target_id(stage_id: &StageId, index: u32) -> TargetId {
    TargetId::new(format!("{}_target{index}", stage_id.as_str()))
}

pub fn new_event_id() -> EventId {
    EventId::new(stamped("evt"))
}
