// crates/otto-bgp-guardrails/src/signal_handling.rs
// ============================================================================
// Module: G4 Signal-handling guardrail
// Description: Installs SIGINT/SIGTERM/SIGUSR1 handlers; on a termination
// signal runs every registered rollback callback under a bounded budget
// then exits 128+signum (section 4.3, section 5).
// Dependencies: otto-bgp-core, otto-bgp-config, signal-hook, std::thread
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use otto_bgp_config::GuardrailsConfig;
use otto_bgp_core::ExitCode;
use otto_bgp_core::GuardrailResult;
use otto_bgp_core::RiskLevel;
use otto_bgp_core::Timestamp;
use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGTERM;
use signal_hook::consts::SIGUSR1;
use signal_hook::iterator::Signals;

use crate::guardrail::Guardrail;
use crate::guardrail::GuardrailContext;

/// A registered rollback callback. Run with no manager-internal lock held
/// (§4.4 locking discipline): the guardrail only ever invokes these from
/// its own dedicated signal-handling thread.
pub type RollbackCallback = Box<dyn Fn() + Send + Sync>;

/// G4: signal-handling guardrail.
pub struct SignalHandlingGuardrail {
    enabled: bool,
    installed: Arc<AtomicBool>,
    shutdown_initiated: Arc<AtomicBool>,
    rollback_budget: Duration,
}

impl SignalHandlingGuardrail {
    /// Build the guardrail from its slice of the shared guardrails config.
    /// Cannot be disabled via `emergency_override` (§6): always active.
    #[must_use]
    pub fn from_config(config: &GuardrailsConfig) -> Self {
        Self {
            enabled: true,
            installed: Arc::new(AtomicBool::new(false)),
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            rollback_budget: Duration::from_secs(config.rollback_callback_budget_secs),
        }
    }

    /// Whether a shutdown sequence has begun.
    #[must_use]
    pub fn shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Install OS signal handlers on a dedicated background thread. On
    /// `SIGINT`/`SIGTERM`, runs every callback in `rollback_callbacks`
    /// (within the configured budget, across all of them combined) then
    /// exits with `128 + signum`. A second termination signal forces
    /// immediate exit without waiting for callbacks. `SIGUSR1` is reserved
    /// for a config reload and otherwise ignored here.
    ///
    /// # Errors
    /// Returns the underlying I/O error if signal handlers cannot be
    /// registered (e.g. already registered elsewhere in the process).
    pub fn install(&self, rollback_callbacks: Arc<Mutex<Vec<RollbackCallback>>>) -> std::io::Result<()> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGUSR1])?;
        let shutdown_initiated = Arc::clone(&self.shutdown_initiated);
        let budget = self.rollback_budget;
        self.installed.store(true, Ordering::SeqCst);

        std::thread::spawn(move || {
            for signal in &mut signals {
                match signal {
                    SIGUSR1 => {
                        tracing::info!("SIGUSR1 received; reload requested");
                    }
                    SIGINT | SIGTERM => {
                        if shutdown_initiated.swap(true, Ordering::SeqCst) {
                            tracing::warn!(signal, "second termination signal, exiting immediately");
                            std::process::exit(i32::from(ExitCode::raw_for_signal(signal as u8)));
                        }
                        tracing::warn!(signal, "termination signal received, running rollback callbacks");
                        run_rollback_callbacks(&rollback_callbacks, budget);
                        std::process::exit(i32::from(ExitCode::raw_for_signal(signal as u8)));
                    }
                    _ => {}
                }
            }
        });
        Ok(())
    }
}

/// Run every rollback callback sequentially, aborting the wait (but not the
/// in-flight callback) once the combined budget is exhausted.
fn run_rollback_callbacks(callbacks: &Arc<Mutex<Vec<RollbackCallback>>>, budget: Duration) {
    let deadline = Instant::now() + budget;
    let guard = callbacks.lock().unwrap_or_else(|p| p.into_inner());
    for callback in guard.iter() {
        if Instant::now() >= deadline {
            tracing::error!("rollback callback budget exhausted; skipping remaining callbacks");
            break;
        }
        callback();
    }
}

impl Guardrail for SignalHandlingGuardrail {
    fn name(&self) -> &str {
        "signal_handling"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn check(&self, _context: &GuardrailContext<'_>) -> GuardrailResult {
        let mut details = BTreeMap::new();
        let installed = self.installed.load(Ordering::SeqCst);
        details.insert("handlers_installed".to_owned(), installed.to_string());

        if installed {
            GuardrailResult::new(
                self.name(),
                true,
                RiskLevel::Low,
                "signal handlers installed",
                details,
                None,
                Timestamp::now(),
            )
        } else {
            GuardrailResult::new(
                self.name(),
                false,
                RiskLevel::High,
                "signal handlers not yet installed; Ctrl-C/SIGTERM would bypass rollback callbacks",
                details,
                Some("call SignalHandlingGuardrail::install before applying any policy".to_owned()),
                Timestamp::now(),
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn reports_not_installed_before_install_is_called() {
        let guardrail = SignalHandlingGuardrail::from_config(&GuardrailsConfig::default());
        let ctx = GuardrailContext::new(&[]);
        let result = guardrail.check(&ctx);
        assert!(!result.passed());
    }

    #[test]
    fn run_rollback_callbacks_invokes_every_callback_within_budget() {
        let calls = Arc::new(Mutex::new(0u32));
        let callbacks: Arc<Mutex<Vec<RollbackCallback>>> = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            callbacks.lock().unwrap().push(Box::new(move || {
                *calls.lock().unwrap() += 1;
            }));
        }
        run_rollback_callbacks(&callbacks, Duration::from_secs(5));
        assert_eq!(*calls.lock().unwrap(), 3);
    }
}
