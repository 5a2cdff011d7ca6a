// crates/otto-bgp-netconf/src/pipeline.rs
// ============================================================================
// Module: NETCONF apply pipeline
// Description: The transport-agnostic body of the seven-step apply pipeline
// (section 4.5), steps 1 and 3-7. Step 2 (RPKI/guardrail validation) is the
// Unified Safety Manager's responsibility and is run before this pipeline is
// ever invoked.
// Dependencies: otto-bgp-core
// ============================================================================

//! ## Overview
//! [`apply`] drives one router through lock → load-merge → diff →
//! commit-check → confirmed-commit → health-probe → finalize, guaranteeing
//! the candidate lock and configuration are released on every exit path.
//! It is generic over [`NetconfTransport`] so tests run against a fake.

use otto_bgp_core::{ApplicationResult, CommitInfo, CommitId, FinalizationMode, HealthResult, Hostname, SafetyCheckResult, Timestamp};

use crate::error::NetconfError;
use crate::rpc;
use crate::transport::NetconfTransport;

/// Whether the confirming second commit is issued and, for
/// `ManualConfirm`, what comment accompanies the initial confirmed commit.
pub struct ApplyOptions {
    pub finalization_mode: FinalizationMode,
    pub hold_minutes: u32,
    pub commit_comment: String,
    /// When set, the pipeline stops after computing the diff and never
    /// commits (§4.5 preview mode).
    pub preview_only: bool,
}

/// Run steps 1 and 3-7 of the apply pipeline against `transport` for
/// `hostname`, merging `configuration_text` into the candidate.
///
/// `safety` is attached to the returned [`ApplicationResult`] so callers
/// can see which guardrail run gated this attempt; this function does not
/// itself run any guardrail.
pub fn apply(
    transport: &mut dyn NetconfTransport,
    hostname: &Hostname,
    configuration_text: &str,
    options: &ApplyOptions,
    safety: Option<SafetyCheckResult>,
) -> ApplicationResult {
    match apply_inner(transport, hostname, configuration_text, options) {
        Ok(result) => attach_safety(result, safety),
        Err(err) => {
            let _ = transport.send_rpc(&rpc::discard_changes(90));
            let _ = transport.send_rpc(&rpc::unlock_candidate(91));
            ApplicationResult::failure(hostname.clone(), err.to_string(), safety)
        }
    }
}

fn attach_safety(result: ApplicationResult, safety: Option<SafetyCheckResult>) -> ApplicationResult {
    if result.safety().is_some() {
        return result;
    }
    ApplicationResult::new(
        result.hostname().clone(),
        result.success(),
        result.is_no_op(),
        result.diff().map(str::to_string),
        result.commit_info().cloned(),
        result.health().cloned(),
        result.finalized(),
        safety,
        result.error().map(str::to_string),
    )
}

fn apply_inner(
    transport: &mut dyn NetconfTransport,
    hostname: &Hostname,
    configuration_text: &str,
    options: &ApplyOptions,
) -> Result<ApplicationResult, NetconfError> {
    let mut message_id: u64 = 1;
    let mut next_id = || {
        message_id += 1;
        message_id
    };

    // Step 1: acquire the exclusive candidate lock.
    let lock_reply = transport.send_rpc(&rpc::lock_candidate(next_id()))?;
    if rpc::reply_is_error(&lock_reply) {
        return Err(NetconfError::LockFailed(lock_reply));
    }

    // From here on every early return must release the lock, so wrap the
    // remainder and unlock unconditionally before propagating.
    let outcome = apply_locked(transport, hostname, configuration_text, options, &mut next_id);

    let unlock_reply = transport.send_rpc(&rpc::unlock_candidate(next_id()));
    if let Err(unlock_err) = unlock_reply {
        return Err(unlock_err);
    }

    outcome
}

fn apply_locked(
    transport: &mut dyn NetconfTransport,
    hostname: &Hostname,
    configuration_text: &str,
    options: &ApplyOptions,
    next_id: &mut impl FnMut() -> u64,
) -> Result<ApplicationResult, NetconfError> {
    // Step 3: load the merge and compute the pending diff.
    let load_reply = transport.send_rpc(&rpc::load_merge(next_id(), configuration_text))?;
    if rpc::reply_is_error(&load_reply) {
        transport.send_rpc(&rpc::discard_changes(next_id()))?;
        return Err(NetconfError::CommitCheckFailed(load_reply));
    }

    let diff = transport.send_rpc(&rpc::compare_configuration(next_id()))?;
    if diff.trim().is_empty() {
        transport.send_rpc(&rpc::discard_changes(next_id()))?;
        return Ok(ApplicationResult::no_op(hostname.clone(), None));
    }

    let check_reply = transport.send_rpc(&rpc::commit_check(next_id()))?;
    if rpc::reply_is_error(&check_reply) {
        transport.send_rpc(&rpc::discard_changes(next_id()))?;
        return Err(NetconfError::CommitCheckFailed(check_reply));
    }

    if options.preview_only {
        transport.send_rpc(&rpc::discard_changes(next_id()))?;
        return Ok(ApplicationResult::new(
            hostname.clone(),
            true,
            false,
            Some(diff),
            None,
            None,
            false,
            None,
            None,
        ));
    }

    // Step 4: confirmed commit, synchronous, with an audit comment.
    let commit_reply = transport.send_rpc(&rpc::commit_confirmed(
        next_id(),
        options.hold_minutes,
        &options.commit_comment,
    ))?;
    let commit_timestamp = Timestamp::now();
    if rpc::reply_is_error(&commit_reply) {
        let rollback_reply = transport.send_rpc(&rpc::discard_changes(next_id()))?;
        if rpc::reply_is_error(&rollback_reply) {
            return Err(NetconfError::RollbackFailed(rollback_reply));
        }
        return Err(NetconfError::CommitFailed(commit_reply));
    }
    let commit_info = CommitInfo::new(
        CommitId::new(format!("{}-{}", hostname.as_str(), commit_timestamp.to_compact_stamp())),
        commit_timestamp,
        true,
        None,
    );

    // Step 5: post-commit health probe.
    let health = probe_health(transport, next_id)?;

    // Step 6: finalize per the configured strategy.
    let finalized = match options.finalization_mode {
        FinalizationMode::AutoFinalize if health.success() => {
            let final_reply = transport.send_rpc(&rpc::commit_final(next_id()))?;
            if rpc::reply_is_error(&final_reply) {
                return Err(NetconfError::CommitFailed(final_reply));
            }
            true
        }
        FinalizationMode::AutoFinalize => {
            // Unhealthy: let the confirmed-commit hold timer auto-revert.
            false
        }
        FinalizationMode::ManualConfirm => false,
    };

    Ok(ApplicationResult::new(
        hostname.clone(),
        health.success(),
        false,
        Some(diff),
        Some(commit_info),
        Some(health),
        finalized,
        None,
        None,
    ))
}

fn probe_health(
    transport: &mut dyn NetconfTransport,
    next_id: &mut impl FnMut() -> u64,
) -> Result<HealthResult, NetconfError> {
    let mut details = Vec::new();
    let mut error = None;

    match transport.send_rpc(&rpc::get_software_information(next_id())) {
        Ok(reply) if rpc::reply_is_error(&reply) => error = Some(reply),
        Ok(_) => details.push("software-information probe: ok".to_string()),
        Err(err) => error = Some(err.to_string()),
    }

    if error.is_none() {
        match transport.send_rpc(&rpc::get_bgp_summary(next_id())) {
            Ok(reply) if rpc::reply_is_error(&reply) => error = Some(reply),
            Ok(reply) => {
                let count = rpc::parse_established_peer_count(&reply).unwrap_or(0);
                details.push(format!("bgp peer-count: {count}"));
            }
            Err(err) => error = Some(err.to_string()),
        }
    }

    Ok(HealthResult::new(error.is_none(), details, error))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    struct FakeTransport {
        replies: VecDeque<String>,
    }

    impl FakeTransport {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: replies.into_iter().map(str::to_string).collect(),
            }
        }
    }

    impl NetconfTransport for FakeTransport {
        fn send_rpc(&mut self, _request: &str) -> Result<String, NetconfError> {
            Ok(self.replies.pop_front().unwrap_or_default())
        }

        fn close(&mut self) -> Result<(), NetconfError> {
            Ok(())
        }
    }

    fn options() -> ApplyOptions {
        ApplyOptions {
            finalization_mode: FinalizationMode::AutoFinalize,
            hold_minutes: 5,
            commit_comment: "otto-bgp apply".to_string(),
            preview_only: false,
        }
    }

    #[test]
    fn empty_diff_is_a_no_op() {
        let mut transport = FakeTransport::new(vec![
            "<ok/>",  // lock
            "<ok/>",  // load-merge
            "",       // compare-configuration: empty diff
            "<ok/>",  // discard-changes
            "<ok/>",  // unlock
        ]);
        let hostname = Hostname::new("r1");
        let result = apply(&mut transport, &hostname, "prefix-list AS1 { 1.2.3.0/24; }", &options(), None);
        assert!(result.success());
        assert!(result.is_no_op());
    }

    #[test]
    fn healthy_commit_auto_finalizes() {
        let mut transport = FakeTransport::new(vec![
            "<ok/>",                                           // lock
            "<ok/>",                                           // load-merge
            "diff: +1.2.3.0/24",                               // compare-configuration
            "<ok/>",                                           // commit-check
            "<ok/>",                                           // commit-confirmed
            "<ok/>",                                           // get-software-information
            "<bgp-information><peer-count>4</peer-count></bgp-information>", // get-bgp-summary
            "<ok/>",                                           // commit-final
            "<ok/>",                                           // unlock
        ]);
        let hostname = Hostname::new("r1");
        let result = apply(&mut transport, &hostname, "prefix-list AS1 { 1.2.3.0/24; }", &options(), None);
        assert!(result.success());
        assert!(!result.is_no_op());
        assert!(result.finalized());
        assert_eq!(result.commit_info().map(otto_bgp_core::CommitInfo::success), Some(true));
    }

    #[test]
    fn unhealthy_commit_does_not_finalize() {
        let mut transport = FakeTransport::new(vec![
            "<ok/>",
            "<ok/>",
            "diff: +1.2.3.0/24",
            "<ok/>",
            "<ok/>",
            "<rpc-error>unreachable</rpc-error>", // get-software-information fails
            "<ok/>",                              // unlock
        ]);
        let hostname = Hostname::new("r1");
        let result = apply(&mut transport, &hostname, "prefix-list AS1 { 1.2.3.0/24; }", &options(), None);
        assert!(!result.success());
        assert!(!result.finalized());
    }

    #[test]
    fn commit_check_failure_discards_and_reports() {
        let mut transport = FakeTransport::new(vec![
            "<ok/>",                               // lock
            "<ok/>",                               // load-merge
            "diff: +1.2.3.0/24",                   // compare-configuration
            "<rpc-error>bad syntax</rpc-error>",   // commit-check
            "<ok/>",                               // discard-changes
            "<ok/>",                               // unlock
        ]);
        let hostname = Hostname::new("r1");
        let result = apply(&mut transport, &hostname, "prefix-list AS1 { 1.2.3.0/24; }", &options(), None);
        assert!(!result.success());
        assert!(result.error().unwrap().contains("commit-check failed"));
    }

    #[test]
    fn preview_only_never_commits() {
        let mut transport = FakeTransport::new(vec![
            "<ok/>",             // lock
            "<ok/>",             // load-merge
            "diff: +1.2.3.0/24", // compare-configuration
            "<ok/>",             // commit-check
            "<ok/>",             // discard-changes
            "<ok/>",             // unlock
        ]);
        let mut preview = options();
        preview.preview_only = true;
        let hostname = Hostname::new("r1");
        let result = apply(&mut transport, &hostname, "prefix-list AS1 { 1.2.3.0/24; }", &preview, None);
        assert!(result.success());
        assert!(result.commit_info().is_none());
        assert_eq!(result.diff(), Some("diff: +1.2.3.0/24"));
    }
}
