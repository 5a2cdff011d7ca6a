// crates/otto-bgp-safety/src/manager.rs
// ============================================================================
// Module: Unified Safety Manager
// Description: Owns the guardrail set, aggregates per-guardrail results into
// a Safety Check Result, holds rollback callbacks and rollback checkpoints,
// and drives one router through the NETCONF apply pipeline (section 4.4).
// Dependencies: otto-bgp-core, otto-bgp-config, otto-bgp-guardrails,
// otto-bgp-rpki, otto-bgp-netconf
// ============================================================================

//! ## Overview
//! [`UnifiedSafetyManager`] is the one object every caller (direct-mode
//! pipeline, rollout coordinator, CLI `apply`) goes through. Its own mutable
//! state — rollback callbacks and rollback checkpoints — is protected so
//! that callback execution never happens with that lock held (§4.4/§5): a
//! callback that calls back into the manager, e.g. to register another
//! callback, must not deadlock.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use otto_bgp_config::GuardrailsConfig;
use otto_bgp_config::NetconfConfig;
use otto_bgp_config::NotificationConfig;
use otto_bgp_core::ApplicationResult;
use otto_bgp_core::FinalizationMode;
use otto_bgp_core::GuardrailResult;
use otto_bgp_core::Hostname;
use otto_bgp_core::Policy;
use otto_bgp_core::RiskLevel;
use otto_bgp_core::RunId;
use otto_bgp_core::SafetyCheckResult;
use otto_bgp_core::StageId;
use otto_bgp_core::TargetId;
use otto_bgp_core::Timestamp;
use otto_bgp_guardrails::BogonGuardrail;
use otto_bgp_guardrails::ConcurrentOperationGuardrail;
use otto_bgp_guardrails::Guardrail;
use otto_bgp_guardrails::GuardrailContext;
use otto_bgp_guardrails::GuardrailRegistry;
use otto_bgp_guardrails::LockOutcome;
use otto_bgp_guardrails::PrefixCountGuardrail;
use otto_bgp_guardrails::RollbackCallback;
use otto_bgp_guardrails::RpkiGuardrail;
use otto_bgp_guardrails::SignalHandlingGuardrail;
use otto_bgp_netconf::ApplyOptions;
use otto_bgp_netconf::NetconfTransport as _;
use otto_bgp_netconf::SshNetconfTransport;
use otto_bgp_rpki::RpkiValidator;

use crate::error::SafetyError;
use crate::notify::Notification;
use crate::notify::Notifier;
use crate::notify::notifier_from_config;

/// A rollback checkpoint recorded just before a commit attempt (§4.4).
#[derive(Debug, Clone)]
pub struct Checkpoint {
    id: String,
    operation: String,
    active_guardrails_count: usize,
}

impl Checkpoint {
    /// The checkpoint identifier, `unified_safety_YYYYMMDD_HHMMSS`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The operation this checkpoint guards (e.g. `apply:r1.example.net`).
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// How many guardrails were active when the checkpoint was recorded.
    #[must_use]
    pub fn active_guardrails_count(&self) -> usize {
        self.active_guardrails_count
    }
}

/// Run/stage/target identifiers plus an event sink, present when
/// `execute_pipeline` is called from the Rollout Coordinator rather than
/// direct mode (§4.7).
pub struct RolloutContext<'a> {
    pub run_id: RunId,
    pub stage_id: StageId,
    pub target_id: TargetId,
    pub recorder: &'a dyn EventRecorder,
}

/// Durable event sink the Rollout Coordinator implements; kept out of this
/// crate's dependency graph so `otto-bgp-safety` never depends on
/// `otto-bgp-rollout` (the dependency runs the other way).
pub trait EventRecorder: Send + Sync {
    fn record(&self, run_id: &RunId, stage_id: &StageId, target_id: &TargetId, event_type: &str, payload: &str);
}

/// SSH credentials the manager uses to open a NETCONF session. Fleet
/// inventory / credential storage is out of scope; the caller supplies
/// them once at construction.
pub struct SshCredentials {
    pub username: String,
    pub private_key_path: PathBuf,
}

struct CallbackState {
    rollback_callbacks: Arc<Mutex<Vec<RollbackCallback>>>,
}

/// State serialized under one mutex: checkpoints and the current
/// operation's description. Rollback callbacks live in their own
/// `Arc<Mutex<_>>` so the same storage can be handed to
/// [`SignalHandlingGuardrail::install`] directly (§4.4, §5).
struct ManagerState {
    checkpoints: Vec<Checkpoint>,
    current_operation: Option<String>,
}

/// Owns the guardrail set, the G3 lock, rollback callbacks, and
/// notification delivery for one process (§4.4).
pub struct UnifiedSafetyManager {
    guardrails_config: GuardrailsConfig,
    netconf_config: NetconfConfig,
    rpki_validator: RpkiValidator,
    concurrent_guardrail: ConcurrentOperationGuardrail,
    signal_guardrail: SignalHandlingGuardrail,
    notifier: Option<Box<dyn Notifier + Send + Sync>>,
    ssh_credentials: SshCredentials,
    emergency_override: bool,
    state: Mutex<ManagerState>,
    callbacks: CallbackState,
}

impl UnifiedSafetyManager {
    /// Construct the manager over already-loaded configuration and an
    /// already-populated RPKI validator.
    #[must_use]
    pub fn new(
        guardrails_config: GuardrailsConfig,
        netconf_config: NetconfConfig,
        notification_config: NotificationConfig,
        rpki_validator: RpkiValidator,
        ssh_credentials: SshCredentials,
    ) -> Self {
        let concurrent_guardrail = ConcurrentOperationGuardrail::from_config(&guardrails_config);
        let signal_guardrail = SignalHandlingGuardrail::from_config(&guardrails_config);
        let notifier = notifier_from_config(&notification_config);
        let emergency_override = guardrails_config.emergency_override;
        Self {
            guardrails_config,
            netconf_config,
            rpki_validator,
            concurrent_guardrail,
            signal_guardrail,
            notifier,
            ssh_credentials,
            emergency_override,
            state: Mutex::new(ManagerState {
                checkpoints: Vec::new(),
                current_operation: None,
            }),
            callbacks: CallbackState {
                rollback_callbacks: Arc::new(Mutex::new(Vec::new())),
            },
        }
    }

    /// Install OS signal handlers wired to the manager's rollback callback
    /// list. Call once per process, before the first `execute_pipeline`.
    ///
    /// # Errors
    /// Propagates the underlying I/O error if handlers are already
    /// installed elsewhere in the process.
    pub fn install_signal_handling(&self) -> std::io::Result<()> {
        self.signal_guardrail.install(Arc::clone(&self.callbacks.rollback_callbacks))
    }

    /// Register a rollback callback, run (outside any manager lock) on a
    /// termination signal or an in-pipeline rollback (§4.4).
    pub fn add_rollback_callback(&self, callback: RollbackCallback) {
        let mut guard = self
            .callbacks
            .rollback_callbacks
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        guard.push(callback);
    }

    /// Run every mandatory guardrail over `policies` and aggregate the
    /// result per the §4.3 rule: `overall_risk = max(per-guardrail risks
    /// ∪ {high if warnings>10, medium if warnings>5})`;
    /// `safe_to_proceed = (no errors) ∧ (overall_risk ≠ critical) ∨
    /// emergency_override`.
    #[must_use]
    pub fn validate_policies_before_apply(&self, policies: &[Policy]) -> SafetyCheckResult {
        let ctx = GuardrailContext::new(policies);

        let registry = GuardrailRegistry::new()
            .with(Box::new(PrefixCountGuardrail::from_config(&self.guardrails_config)))
            .with(Box::new(BogonGuardrail::from_config(&self.guardrails_config)))
            .with(Box::new(ConcurrentOperationGuardrail::from_config(&self.guardrails_config)));
        let mut results = registry.run_all(&ctx);

        // RpkiGuardrail borrows the validator with a non-'static lifetime,
        // so it cannot live inside GuardrailRegistry's Vec<Box<dyn
        // Guardrail + Send + Sync>> (that field type fixes 'static); run it
        // directly instead and fold its result in alongside the rest.
        let rpki_guardrail = RpkiGuardrail::new(&self.rpki_validator, &self.guardrails_config);
        if rpki_guardrail.is_enabled() {
            results.push(rpki_guardrail.check(&ctx));
        } else {
            tracing::error!(guardrail = "rpki_validation", "guardrail disabled via emergency override");
        }

        // Likewise self.signal_guardrail, not a fresh instance: its
        // `installed` flag only flips true once install_signal_handling
        // has run on this exact instance, and a freshly-built one would
        // always report not-installed.
        if self.signal_guardrail.is_enabled() {
            results.push(self.signal_guardrail.check(&ctx));
        }

        aggregate(&results, self.emergency_override)
    }

    /// Emit a best-effort notification for a NETCONF lifecycle event
    /// (`connect`, `preview`, `commit`, `rollback`, `disconnect`,
    /// `safety_critical`). A delivery failure is logged, never propagated:
    /// it must not mask the underlying operation's outcome (§4.4).
    pub fn send_netconf_event_notification(&self, event_type: &str, hostname: &Hostname, success: bool, details: &str) {
        let Some(notifier) = self.notifier.as_ref() else {
            return;
        };
        let subject = format!("{event_type} on {hostname} ({})", if success { "ok" } else { "failed" });
        let notification = Notification {
            subject: &subject,
            body: details,
        };
        if let Err(err) = notifier.send(&notification) {
            tracing::warn!(%err, event_type, %hostname, "notification delivery failed");
        }
    }

    fn record_checkpoint(&self, operation: impl Into<String>, active_guardrails_count: usize) {
        let checkpoint = Checkpoint {
            id: format!("unified_safety_{}", Timestamp::now().to_compact_stamp()),
            operation: operation.into(),
            active_guardrails_count,
        };
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.checkpoints.push(checkpoint);
    }

    fn set_current_operation(&self, operation: Option<String>) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.current_operation = operation;
    }

    /// Every checkpoint recorded so far, oldest first.
    #[must_use]
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).checkpoints.clone()
    }

    fn run_rollback_callbacks(&self) {
        let callbacks = Arc::clone(&self.callbacks.rollback_callbacks);
        // Never hold the manager's own state lock while running a
        // callback (§5 locking discipline): this only touches the
        // separate rollback_callbacks lock, and releases it before any
        // callback's return value is used.
        let guard = callbacks.lock().unwrap_or_else(|p| p.into_inner());
        for callback in guard.iter() {
            callback();
        }
    }

    /// Drive `hostname` through the full apply pipeline: acquire the G3
    /// lock, open a NETCONF session, hand off to `otto-bgp-netconf`'s
    /// pipeline, and notify/record events around it (§4.4/§4.5/§4.7).
    ///
    /// Guardrail validation is the caller's responsibility
    /// ([`validate_policies_before_apply`]); this method does not re-run
    /// it, matching the layering where the RPKI/guardrail check gates
    /// whether `execute_pipeline` is even called.
    pub fn execute_pipeline(
        &self,
        policies: &[Policy],
        hostname: &Hostname,
        address: &str,
        mode: FinalizationMode,
        safety: SafetyCheckResult,
        rollout_context: Option<RolloutContext<'_>>,
    ) -> ApplicationResult {
        if !safety.safe_to_proceed() {
            let result = ApplicationResult::failure(hostname.clone(), "guardrail check failed", Some(safety));
            self.record_event(&rollout_context, "pipeline_failed", result.error().unwrap_or_default());
            return result;
        }

        match self.concurrent_guardrail.acquire() {
            Ok(LockOutcome::Acquired) => {}
            Ok(LockOutcome::HeldByOther(pid)) => {
                let err = SafetyError::LockHeld(pid);
                let result = ApplicationResult::failure(hostname.clone(), err.to_string(), Some(safety));
                self.record_event(&rollout_context, "pipeline_failed", &err.to_string());
                return result;
            }
            Err(e) => {
                let err = SafetyError::LockIo(e);
                let result = ApplicationResult::failure(hostname.clone(), err.to_string(), Some(safety));
                self.record_event(&rollout_context, "pipeline_failed", &err.to_string());
                return result;
            }
        }

        self.set_current_operation(Some(format!("apply:{hostname}")));
        self.record_checkpoint(format!("apply:{hostname}"), self.guardrails_config_active_count());
        self.send_netconf_event_notification("connect", hostname, true, "opening NETCONF session");
        self.record_event(&rollout_context, "pipeline_start", "");

        let result = self.run_netconf_pipeline(policies, hostname, address, mode, safety);

        self.concurrent_guardrail.release();
        self.set_current_operation(None);

        if !result.success() {
            self.run_rollback_callbacks();
            self.send_netconf_event_notification("rollback", hostname, false, result.error().unwrap_or_default());
            self.record_event(&rollout_context, "pipeline_failed", result.error().unwrap_or_default());
        } else {
            self.send_netconf_event_notification("commit", hostname, true, "apply pipeline completed");
            self.record_event(&rollout_context, "pipeline_success", "");
        }
        self.send_netconf_event_notification("disconnect", hostname, result.success(), "NETCONF session closed");

        result
    }

    fn run_netconf_pipeline(
        &self,
        policies: &[Policy],
        hostname: &Hostname,
        address: &str,
        mode: FinalizationMode,
        safety: SafetyCheckResult,
    ) -> ApplicationResult {
        let mut transport = match SshNetconfTransport::connect(
            hostname.as_str(),
            address,
            &self.ssh_credentials.username,
            Path::new(&self.ssh_credentials.private_key_path),
            &self.netconf_config,
        ) {
            Ok(t) => t,
            Err(e) => return ApplicationResult::failure(hostname.clone(), e.to_string(), Some(safety)),
        };

        let configuration_text = policies
            .iter()
            .map(|p| p.content_str().into_owned())
            .collect::<Vec<_>>()
            .join("\n");

        let options = ApplyOptions {
            finalization_mode: mode,
            hold_minutes: self.netconf_config.hold_minutes,
            commit_comment: format!("otto-bgp apply: {} polic{}", policies.len(), if policies.len() == 1 { "y" } else { "ies" }),
            preview_only: false,
        };

        let result = otto_bgp_netconf::apply(&mut transport, hostname, &configuration_text, &options, Some(safety));
        let _ = transport.close();
        result
    }

    fn record_event(&self, rollout_context: &Option<RolloutContext<'_>>, event_type: &str, payload: &str) {
        if let Some(ctx) = rollout_context {
            ctx.recorder.record(&ctx.run_id, &ctx.stage_id, &ctx.target_id, event_type, payload);
        }
    }

    fn guardrails_config_active_count(&self) -> usize {
        [
            self.guardrails_config.prefix_count.enabled,
            self.guardrails_config.rpki.enabled,
            self.guardrails_config.bogon.enabled,
            self.guardrails_config.concurrent_operation.enabled,
            self.guardrails_config.signal_handling.enabled,
        ]
        .into_iter()
        .filter(|enabled| *enabled)
        .count()
    }
}

/// Aggregate raw per-guardrail results into a Safety Check Result per the
/// §4.3 rule: `safe_to_proceed = (no errors) ∧ (overall_risk ≠ critical) ∨
/// emergency_override`.
fn aggregate(results: &[GuardrailResult], emergency_override: bool) -> SafetyCheckResult {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    let mut bgp_impact = std::collections::BTreeMap::new();
    let mut overall_risk = RiskLevel::Low;

    for result in results {
        bgp_impact.insert(result.name().to_string(), format!("{:?}", result.risk_level()));
        if result.risk_level() > overall_risk {
            overall_risk = result.risk_level();
        }
        if result.passed() {
            warnings.push(result.message().to_string());
        } else {
            errors.push(format!("{}: {}", result.name(), result.message()));
        }
    }

    if warnings.len() > 10 {
        overall_risk = overall_risk.max(RiskLevel::High);
    } else if warnings.len() > 5 {
        overall_risk = overall_risk.max(RiskLevel::Medium);
    }

    let safe_to_proceed = (errors.is_empty() && overall_risk != RiskLevel::Critical) || emergency_override;
    if emergency_override && (!errors.is_empty() || overall_risk == RiskLevel::Critical) {
        tracing::error!(
            errors = errors.len(),
            risk = ?overall_risk,
            "emergency override bypassed a blocking safety decision"
        );
    }

    SafetyCheckResult::new(safe_to_proceed, overall_risk, warnings, errors, bgp_impact, results.to_vec(), None, false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use otto_bgp_core::Timestamp;

    use super::*;

    fn passing_result(name: &str, risk: RiskLevel) -> GuardrailResult {
        GuardrailResult::new(name, true, risk, "ok", std::collections::BTreeMap::new(), None, Timestamp::now())
    }

    fn failing_result(name: &str, risk: RiskLevel) -> GuardrailResult {
        GuardrailResult::new(name, false, risk, "bad", std::collections::BTreeMap::new(), None, Timestamp::now())
    }

    #[test]
    fn aggregate_is_safe_when_everything_passes_at_low_risk() {
        let results = vec![passing_result("a", RiskLevel::Low), passing_result("b", RiskLevel::Low)];
        let safety = aggregate(&results, false);
        assert!(safety.safe_to_proceed());
        assert_eq!(safety.overall_risk_level(), RiskLevel::Low);
    }

    #[test]
    fn any_error_blocks_regardless_of_risk_level() {
        let results = vec![passing_result("a", RiskLevel::Low), failing_result("b", RiskLevel::Medium)];
        let safety = aggregate(&results, false);
        assert!(!safety.safe_to_proceed());
        assert_eq!(safety.errors().len(), 1);
    }

    #[test]
    fn critical_overall_risk_blocks_even_with_no_errors() {
        let results = vec![passing_result("a", RiskLevel::Critical)];
        let safety = aggregate(&results, false);
        assert!(!safety.safe_to_proceed());
    }

    #[test]
    fn more_than_ten_warnings_escalates_overall_risk_to_high() {
        let results: Vec<_> = (0..11).map(|i| passing_result(&format!("g{i}"), RiskLevel::Low)).collect();
        let safety = aggregate(&results, false);
        assert_eq!(safety.overall_risk_level(), RiskLevel::High);
    }

    #[test]
    fn emergency_override_bypasses_errors_and_critical_risk() {
        let results = vec![failing_result("a", RiskLevel::Critical)];
        let safety = aggregate(&results, true);
        assert!(safety.safe_to_proceed());
        assert!(!safety.errors().is_empty());
        assert_eq!(safety.overall_risk_level(), RiskLevel::Critical);
    }
}
