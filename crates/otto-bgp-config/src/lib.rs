// crates/otto-bgp-config/src/lib.rs
// ============================================================================
// Module: Otto BGP Config
// Description: Typed configuration for the subsystems the core itself
// consumes (guardrails, safety-manager notifications, NETCONF session
// parameters, rollout strategy defaults, RPKI fail-open/closed policy).
// Purpose: One TOML-backed config model with documented defaults and the
// section-6 OTTO_BGP_* environment overrides. Fleet inventory and CLI
// argument parsing remain out of scope (section 1).
// Dependencies: serde, toml, thiserror, otto-bgp-core
// ============================================================================

//! ## Overview
//! `OttoConfig` loads from a TOML document and falls back to the defaults
//! documented throughout section 4 of the spec when a field is absent.
//! [`OttoConfig::apply_env_overrides`] then layers the environment
//! variables named in section 6 on top, matching the precedence the spec
//! describes: file defaults, overridden by environment.

use std::collections::BTreeMap;
use std::env;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Errors loading or validating an [`OttoConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// The path that failed to read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// `OTTO_BGP_MODE` held a value other than `system`/`autonomous`.
    #[error("invalid OTTO_BGP_MODE value: {0:?} (expected \"system\" or \"autonomous\")")]
    InvalidMode(String),
}

/// Finalization mode selector, driven by `OTTO_BGP_MODE` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Manual-confirm finalization; an operator confirms commits.
    System,
    /// Auto-finalize; health probes drive the confirming commit.
    Autonomous,
}

impl OperatingMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "system" => Ok(Self::System),
            "autonomous" => Ok(Self::Autonomous),
            other => Err(ConfigError::InvalidMode(other.to_owned())),
        }
    }
}

/// Guardrail strictness tier (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Warnings only.
    Low,
    /// Default operational tier.
    Medium,
    /// Fails on more categories.
    High,
    /// Fails on any bogon/violation.
    Strict,
}

/// Per-guardrail configuration shape (§4.3: `{enabled, strictness_level,
/// custom_thresholds, emergency_override}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Whether this guardrail runs at all.
    pub enabled: bool,
    /// The strictness tier this guardrail evaluates at.
    pub strictness_level: Strictness,
    /// Guardrail-specific threshold overrides (e.g. `max_prefixes_per_as`).
    pub custom_thresholds: BTreeMap<String, f64>,
    /// Disables the guardrail outright; MUST be logged at CRITICAL by the
    /// caller (§4.3) and never silently honored.
    pub emergency_override: bool,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strictness_level: Strictness::Medium,
            custom_thresholds: BTreeMap::new(),
            emergency_override: false,
        }
    }
}

/// All five mandatory guardrails' configuration (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailsConfig {
    /// G1: prefix-count guardrail.
    pub prefix_count: GuardrailConfig,
    /// G1.5: RPKI validation guardrail.
    pub rpki: GuardrailConfig,
    /// G2: bogon-prefix guardrail.
    pub bogon: GuardrailConfig,
    /// G3: concurrent-operation guardrail.
    pub concurrent_operation: GuardrailConfig,
    /// G4: signal-handling guardrail.
    pub signal_handling: GuardrailConfig,
    /// Maximum prefixes tolerated for a single AS (default 100,000, §4.3).
    pub max_prefixes_per_as: u64,
    /// Maximum prefixes tolerated across all policies (default 500,000).
    pub max_total_prefixes: u64,
    /// Maximum `INVALID`% tolerated by G1.5 (default 0).
    pub max_invalid_percent: f64,
    /// Maximum non-allowlisted `NOTFOUND`% tolerated by G1.5 (default 25).
    pub max_notfound_percent: f64,
    /// Whether G1.5 fails closed when no VRP dataset is loaded.
    pub require_vrp_data: bool,
    /// Path to the G3 lock file (default `/tmp/otto-bgp.lock`, §6).
    pub lock_file_path: String,
    /// Total rollback-callback budget on signal, in seconds (default 30,
    /// §5).
    pub rollback_callback_budget_secs: u64,
    /// Manager-level override: `safe_to_proceed` is forced `true` even with
    /// blocking errors or critical overall risk (§4.3). Distinct from each
    /// guardrail's own `emergency_override`, which disables that guardrail
    /// individually; this one bypasses the aggregated decision itself and
    /// MUST be logged at CRITICAL whenever it fires.
    pub emergency_override: bool,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            prefix_count: GuardrailConfig::default(),
            rpki: GuardrailConfig::default(),
            bogon: GuardrailConfig::default(),
            concurrent_operation: GuardrailConfig {
                // Critical guardrails cannot be disabled (§6); kept enabled
                // even if a caller tries to flip this in TOML.
                enabled: true,
                ..GuardrailConfig::default()
            },
            signal_handling: GuardrailConfig {
                enabled: true,
                ..GuardrailConfig::default()
            },
            max_prefixes_per_as: 100_000,
            max_total_prefixes: 500_000,
            max_invalid_percent: 0.0,
            max_notfound_percent: 25.0,
            require_vrp_data: false,
            lock_file_path: "/tmp/otto-bgp.lock".to_owned(),
            rollback_callback_budget_secs: 30,
            emergency_override: false,
        }
    }
}

impl GuardrailsConfig {
    /// G1's warning threshold: 80% of `max_total_prefixes` (§4.3).
    #[must_use]
    pub fn warning_threshold(&self) -> f64 {
        0.8 * self.max_total_prefixes as f64
    }

    /// G1's critical threshold: 95% of `max_total_prefixes` (§4.3).
    #[must_use]
    pub fn critical_threshold(&self) -> f64 {
        0.95 * self.max_total_prefixes as f64
    }
}

/// Notification delivery method (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Invoke a local `sendmail`-style program.
    Sendmail,
    /// Deliver over SMTP with STARTTLS.
    Smtp,
}

/// Safety-manager notification configuration (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Whether notifications are sent at all.
    pub enabled: bool,
    /// Which delivery method to use.
    pub delivery_method: DeliveryMethod,
    /// The notification `From:` address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Carbon-copy addresses.
    pub cc: Vec<String>,
    /// Subject-line prefix applied to every notification.
    pub subject_prefix: String,
    /// SMTP server hostname, when `delivery_method = smtp`.
    pub smtp_server: String,
    /// SMTP server port.
    pub smtp_port: u16,
    /// Whether to require STARTTLS.
    pub smtp_use_tls: bool,
    /// SMTP auth username.
    pub smtp_username: String,
    /// SMTP auth password. Never logged.
    pub smtp_password: String,
    /// Delivery timeout, in seconds (default 10, §5).
    pub delivery_timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delivery_method: DeliveryMethod::Sendmail,
            from: String::new(),
            to: Vec::new(),
            cc: Vec::new(),
            subject_prefix: "[otto-bgp]".to_owned(),
            smtp_server: String::new(),
            smtp_port: 587,
            smtp_use_tls: true,
            smtp_username: String::new(),
            smtp_password: String::new(),
            delivery_timeout_secs: 10,
        }
    }
}

/// NETCONF session and timing configuration (§4.5, §5, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetconfConfig {
    /// Path to the SSH known-hosts file (`SSH_KNOWN_HOSTS`, §6).
    pub known_hosts_path: String,
    /// Allowed SSH host-key algorithms.
    pub key_algorithms: Vec<String>,
    /// NETCONF session timeout, in seconds (minimum 60, §4.5).
    pub session_timeout_secs: u64,
    /// Per-RPC timeout, in seconds (default 30, §5).
    pub rpc_timeout_secs: u64,
    /// Confirmed-commit hold window, in minutes (default 5, range 1-60).
    pub hold_minutes: u32,
    /// Post-commit health-check timeout, in seconds (default 30).
    pub health_check_timeout_secs: u64,
    /// `bgpq4` subprocess timeout, in seconds (default 30).
    pub bgpq4_timeout_secs: u64,
}

impl Default for NetconfConfig {
    fn default() -> Self {
        Self {
            known_hosts_path: String::new(),
            key_algorithms: vec![
                "ssh-rsa".to_owned(),
                "ssh-ed25519".to_owned(),
                "ecdsa-sha2-nistp256".to_owned(),
            ],
            session_timeout_secs: 60,
            rpc_timeout_secs: 30,
            hold_minutes: 5,
            health_check_timeout_secs: 30,
            bgpq4_timeout_secs: 30,
        }
    }
}

impl NetconfConfig {
    /// Validate `hold_minutes` against the documented 1..=60 range (§5).
    ///
    /// # Errors
    /// Returns a message describing the violation.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=60).contains(&self.hold_minutes) {
            return Err(format!(
                "hold_minutes {} out of documented range 1..=60",
                self.hold_minutes
            ));
        }
        if self.session_timeout_secs < 60 {
            return Err(format!(
                "session_timeout_secs {} below the required minimum of 60",
                self.session_timeout_secs
            ));
        }
        Ok(())
    }
}

/// Rollout coordinator default concurrency per strategy (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Default concurrency for the Blast strategy (default 5).
    pub blast_concurrency: u32,
    /// Default concurrency for the Phased strategy (default 2).
    pub phased_concurrency: u32,
    /// Default concurrency for the Canary strategy's non-canary stage
    /// (default 5).
    pub canary_concurrency: u32,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            blast_concurrency: 5,
            phased_concurrency: 2,
            canary_concurrency: 5,
        }
    }
}

/// Whether RPKI validation fails open or closed when data is unavailable
/// (§4.2 step 1/2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpkiFailPolicy {
    /// Missing/stale data yields `ERROR`.
    FailClosed,
    /// Missing/stale data yields `NOTFOUND` with a warning.
    FailOpen,
}

/// RPKI validator configuration (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpkiConfig {
    /// Fail-open vs. fail-closed policy for missing/stale data.
    pub fail_policy: RpkiFailPolicy,
    /// VRP dataset max age, in hours, before it is stale (§3).
    pub max_age_hours: i64,
    /// Path to the canonical VRP cache file.
    pub vrp_cache_path: String,
    /// Path to the allowlist overlay file.
    pub allowlist_path: String,
    /// Sequential-vs-parallel chunking threshold (default 10, §4.2).
    pub parallel_chunk_threshold: usize,
}

impl Default for RpkiConfig {
    fn default() -> Self {
        Self {
            fail_policy: RpkiFailPolicy::FailClosed,
            max_age_hours: 24,
            vrp_cache_path: "/var/lib/otto-bgp/vrp_cache.json".to_owned(),
            allowlist_path: "/var/lib/otto-bgp/allowlist.json".to_owned(),
            parallel_chunk_threshold: 10,
        }
    }
}

/// Top-level Otto BGP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OttoConfig {
    /// Which finalization strategy mode to run in.
    pub mode: OperatingMode,
    /// Guardrail configuration.
    pub guardrails: GuardrailsConfig,
    /// Safety-manager notification configuration.
    pub notifications: NotificationConfig,
    /// NETCONF session/timing configuration.
    pub netconf: NetconfConfig,
    /// Rollout coordinator defaults.
    pub rollout: RolloutConfig,
    /// RPKI validator configuration.
    pub rpki: RpkiConfig,
    /// Cap on parallel worker count (`OTTO_BGP_BGP_MAX_WORKERS`, §6); `None`
    /// means use the `min(cpu_count, 8, chunks)` default.
    pub max_workers: Option<usize>,
    /// Force sequential execution (`OTTO_BGP_DISABLE_PARALLEL`, §6).
    pub disable_parallel: bool,
}

impl Default for OttoConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::System,
            guardrails: GuardrailsConfig::default(),
            notifications: NotificationConfig::default(),
            netconf: NetconfConfig::default(),
            rollout: RolloutConfig::default(),
            rpki: RpkiConfig::default(),
            max_workers: None,
            disable_parallel: false,
        }
    }
}

impl OttoConfig {
    /// Parse configuration from a TOML document, falling back to defaults
    /// for absent fields.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if the document is malformed.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is malformed TOML.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Layer the `OTTO_BGP_*` environment variables (§6) on top of an
    /// already-loaded config, mutating it in place.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidMode`] if `OTTO_BGP_MODE` is set to an
    /// unrecognized value.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(mode) = env::var("OTTO_BGP_MODE") {
            self.mode = OperatingMode::parse(&mode)?;
        }
        if let Ok(guardrails) = env::var("OTTO_BGP_GUARDRAILS") {
            self.apply_guardrail_allowlist(&guardrails);
        }
        if let Ok(workers) = env::var("OTTO_BGP_BGP_MAX_WORKERS") {
            if let Ok(n) = workers.parse::<usize>() {
                self.max_workers = Some(n);
            }
        }
        if let Ok(disable) = env::var("OTTO_BGP_DISABLE_PARALLEL") {
            self.disable_parallel = disable.eq_ignore_ascii_case("true");
        }
        if let Ok(known_hosts) = env::var("SSH_KNOWN_HOSTS") {
            self.netconf.known_hosts_path = known_hosts;
        }
        Ok(())
    }

    /// Disable every guardrail not named in the comma-separated allowlist,
    /// except the two critical ones (G3, G4) which §6 says cannot be
    /// disabled this way.
    fn apply_guardrail_allowlist(&mut self, csv: &str) {
        let named: Vec<&str> = csv.split(',').map(str::trim).collect();
        let enabled = |name: &str| named.contains(&name);
        self.guardrails.prefix_count.enabled = enabled("prefix_count") || enabled("g1");
        self.guardrails.rpki.enabled = enabled("rpki") || enabled("g1.5");
        self.guardrails.bogon.enabled = enabled("bogon") || enabled("g2");
        // G3 and G4 remain enabled regardless of the allowlist contents.
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let cfg = OttoConfig::default();
        assert_eq!(cfg.guardrails.max_prefixes_per_as, 100_000);
        assert_eq!(cfg.guardrails.max_total_prefixes, 500_000);
        assert!((cfg.guardrails.warning_threshold() - 400_000.0).abs() < f64::EPSILON);
        assert!((cfg.guardrails.critical_threshold() - 475_000.0).abs() < f64::EPSILON);
        assert_eq!(cfg.netconf.hold_minutes, 5);
        assert_eq!(cfg.guardrails.lock_file_path, "/tmp/otto-bgp.lock");
    }

    #[test]
    fn parses_partial_toml_and_keeps_defaults_elsewhere() {
        let cfg = OttoConfig::from_toml_str(
            r#"
            mode = "autonomous"

            [netconf]
            hold_minutes = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.mode, OperatingMode::Autonomous);
        assert_eq!(cfg.netconf.hold_minutes, 10);
        assert_eq!(cfg.rollout.blast_concurrency, 5);
    }

    #[test]
    fn hold_minutes_out_of_range_is_rejected_by_validate() {
        let mut cfg = NetconfConfig::default();
        cfg.hold_minutes = 61;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_override_disallows_disabling_critical_guardrails() {
        let mut cfg = OttoConfig::default();
        cfg.apply_guardrail_allowlist("bogon");
        assert!(!cfg.guardrails.prefix_count.enabled);
        assert!(cfg.guardrails.concurrent_operation.enabled);
        assert!(cfg.guardrails.signal_handling.enabled);
    }

    #[test]
    fn invalid_mode_env_var_is_rejected() {
        assert!(OperatingMode::parse("bogus").is_err());
    }
}
