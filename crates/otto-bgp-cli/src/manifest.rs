// crates/otto-bgp-cli/src/manifest.rs
// ============================================================================
// Module: Pipeline manifest
// Description: The JSON shape `pipeline` reads in place of invoking the
// fleet-inventory and policy-generation collaborators directly (§1
// Non-goals: those collaborators are out of scope for this workspace).
// Dependencies: serde_json, otto-bgp-core
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use otto_bgp_core::Hostname;
use otto_bgp_core::OttoError;
use otto_bgp_core::Policy;
use otto_bgp_core::RouterProfile;

/// `{"devices": [RouterProfile, ...], "policies_by_hostname": {hostname: [Policy, ...]}}`.
#[derive(Debug, Deserialize)]
pub struct PipelineManifest {
    pub devices: Vec<RouterProfile>,
    #[serde(default)]
    pub policies_by_hostname: BTreeMap<Hostname, Vec<Policy>>,
}

impl PipelineManifest {
    /// Read and parse a manifest file.
    ///
    /// # Errors
    /// Returns [`OttoError::Resource`] if the file cannot be read, or
    /// [`OttoError::InputValidation`] if it is malformed JSON.
    pub fn load(path: &Path) -> Result<Self, OttoError> {
        let bytes = std::fs::read(path).map_err(|err| OttoError::Resource(format!("reading {}: {err}", path.display())))?;
        serde_json::from_slice(&bytes).map_err(|err| OttoError::InputValidation(format!("parsing {}: {err}", path.display())))
    }

    /// Each device's management address, keyed by hostname, for direct mode.
    #[must_use]
    pub fn addresses(&self) -> BTreeMap<Hostname, String> {
        self.devices.iter().map(|d| (d.hostname().clone(), d.address().to_owned())).collect()
    }
}

/// Parsed form of the `--strategy` flag.
#[derive(Debug, Clone)]
pub enum StrategyChoiceArg {
    Blast,
    PhasedRegion,
    PhasedRole,
    Canary(Hostname),
}

impl StrategyChoiceArg {
    /// Parse `blast`, `phased-region`, `phased-role`, or `canary:<hostname>`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "blast" => Some(Self::Blast),
            "phased-region" => Some(Self::PhasedRegion),
            "phased-role" => Some(Self::PhasedRole),
            other => other.strip_prefix("canary:").map(|hostname| Self::Canary(Hostname::new(hostname))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_canary_with_a_hostname_suffix() {
        let parsed = StrategyChoiceArg::parse("canary:r1").unwrap();
        assert!(matches!(parsed, StrategyChoiceArg::Canary(hostname) if hostname == Hostname::new("r1")));
    }

    #[test]
    fn parse_rejects_an_unknown_strategy_name() {
        assert!(StrategyChoiceArg::parse("bogus").is_none());
    }
}
