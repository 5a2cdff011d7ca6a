// crates/otto-bgp-guardrails/src/concurrent_operation.rs
// ============================================================================
// Module: G3 Concurrent-operation guardrail
// Description: Process-wide exclusive lock file with stale-owner reaping
// (section 4.3, section 6).
// Dependencies: otto-bgp-core, otto-bgp-config, std::fs
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::path::PathBuf;

use otto_bgp_config::GuardrailsConfig;
use otto_bgp_core::GuardrailResult;
use otto_bgp_core::RiskLevel;
use otto_bgp_core::Timestamp;

use crate::guardrail::Guardrail;
use crate::guardrail::GuardrailContext;

/// Whether `pid` names a currently running process, checked via `/proc`
/// (Linux) rather than signaling it.
fn pid_is_alive(pid: i32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

/// Whether this process currently holds the lock at `path`, used by the
/// safety manager to know whether to remove it on exit/rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// Lock acquired by this process.
    Acquired,
    /// Lock is held by another live process.
    HeldByOther(i32),
}

/// G3: process-wide exclusive-operation lock.
pub struct ConcurrentOperationGuardrail {
    enabled: bool,
    lock_path: PathBuf,
}

impl ConcurrentOperationGuardrail {
    /// Build the guardrail from its slice of the shared guardrails config.
    /// Cannot be disabled via `emergency_override` (§6): this guardrail is
    /// always active regardless of the config flag.
    #[must_use]
    pub fn from_config(config: &GuardrailsConfig) -> Self {
        Self {
            enabled: true,
            lock_path: PathBuf::from(&config.lock_file_path),
        }
    }

    /// Attempt exclusive creation of the lock file, reaping a stale lock
    /// (owner PID no longer running) first if one is found.
    ///
    /// # Errors
    /// Returns the underlying I/O error if the file cannot be created or
    /// written after reaping a stale lock.
    pub fn acquire(&self) -> std::io::Result<LockOutcome> {
        if let Some(owner) = self.read_owner() {
            if pid_is_alive(owner) {
                return Ok(LockOutcome::HeldByOther(owner));
            }
            let _ = fs::remove_file(&self.lock_path);
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o644)
            .open(&self.lock_path)?;
        write!(file, "{}", std::process::id())?;
        Ok(LockOutcome::Acquired)
    }

    /// Release the lock, regardless of which process currently owns it on
    /// disk. Called on clean exit and on rollback.
    pub fn release(&self) {
        let _ = fs::remove_file(&self.lock_path);
    }

    fn read_owner(&self) -> Option<i32> {
        fs::read_to_string(&self.lock_path).ok()?.trim().parse().ok()
    }

    fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Guardrail for ConcurrentOperationGuardrail {
    fn name(&self) -> &str {
        "concurrent_operation"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn check(&self, _context: &GuardrailContext<'_>) -> GuardrailResult {
        let mut details = BTreeMap::new();
        details.insert("lock_path".to_owned(), self.lock_path().display().to_string());

        match self.read_owner() {
            Some(owner) if pid_is_alive(owner) => {
                details.insert("owner_pid".to_owned(), owner.to_string());
                GuardrailResult::new(
                    self.name(),
                    false,
                    RiskLevel::Critical,
                    format!("lock file held by live process {owner}"),
                    details,
                    Some("wait for the other Otto BGP process to finish or investigate it".to_owned()),
                    Timestamp::now(),
                )
            }
            Some(stale) => {
                details.insert("reaped_stale_pid".to_owned(), stale.to_string());
                GuardrailResult::new(
                    self.name(),
                    true,
                    RiskLevel::Low,
                    format!("stale lock from dead process {stale} will be reaped"),
                    details,
                    None,
                    Timestamp::now(),
                )
            }
            None => GuardrailResult::new(
                self.name(),
                true,
                RiskLevel::Low,
                "no concurrent operation lock held",
                details,
                None,
                Timestamp::now(),
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn guardrail_at(path: &Path) -> ConcurrentOperationGuardrail {
        let mut config = GuardrailsConfig::default();
        config.lock_file_path = path.display().to_string();
        ConcurrentOperationGuardrail::from_config(&config)
    }

    #[test]
    fn acquires_lock_when_none_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("otto-bgp.lock");
        let guardrail = guardrail_at(&path);
        assert_eq!(guardrail.acquire().unwrap(), LockOutcome::Acquired);
        assert!(path.exists());
        guardrail.release();
        assert!(!path.exists());
    }

    #[test]
    fn reaps_a_stale_lock_left_by_a_dead_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("otto-bgp.lock");
        // PID 2^30 is never a live process in this sandbox.
        fs::write(&path, "1073741824").unwrap();
        let guardrail = guardrail_at(&path);
        assert_eq!(guardrail.acquire().unwrap(), LockOutcome::Acquired);
    }

    #[test]
    fn check_reports_lock_held_by_self_as_critical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("otto-bgp.lock");
        fs::write(&path, std::process::id().to_string()).unwrap();
        let guardrail = guardrail_at(&path);
        let ctx = GuardrailContext::new(&[]);
        let result = guardrail.check(&ctx);
        assert!(!result.passed());
        assert_eq!(result.risk_level(), RiskLevel::Critical);
    }
}
