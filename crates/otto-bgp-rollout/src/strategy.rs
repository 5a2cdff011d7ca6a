// crates/otto-bgp-rollout/src/strategy.rs
// ============================================================================
// Module: Rollout strategies
// Description: Blast, Phased, and Canary staging strategies (section 4.6).
// Each strategy only decides grouping and per-stage concurrency; the
// coordinator is responsible for turning the plan into durable Stage/Target
// entities and dispatching them.
// Dependencies: otto-bgp-core, otto-bgp-config
// ============================================================================

//! ## Overview
//! A [`Strategy`] maps a flat device list to an ordered list of
//! [`PlannedStage`]s. [`BlastStrategy`] puts everything in one stage,
//! [`PhasedStrategy`] groups by region or role, and [`CanaryStrategy`]
//! splits off one named device as stage 0.

use std::collections::BTreeMap;

use otto_bgp_core::Hostname;
use otto_bgp_core::RouterProfile;

use crate::error::RolloutError;

/// One stage's planned membership and concurrency, before Stage/Target
/// identifiers are minted.
#[derive(Debug, Clone)]
pub struct PlannedStage {
    pub concurrency: u32,
    pub hostnames: Vec<Hostname>,
}

/// Groups devices into an ordered list of stages (§4.6).
pub trait Strategy: Send + Sync {
    /// The strategy's name, persisted as `RolloutRun::strategy_name`.
    fn name(&self) -> &str;

    /// # Errors
    /// Returns [`RolloutError`] if `devices` doesn't satisfy the
    /// strategy's preconditions (e.g. Canary's named hostname is absent).
    fn plan(&self, devices: &[RouterProfile]) -> Result<Vec<PlannedStage>, RolloutError>;
}

/// A single stage containing every device (§4.6).
pub struct BlastStrategy {
    pub concurrency: u32,
}

impl Strategy for BlastStrategy {
    fn name(&self) -> &str {
        "blast"
    }

    fn plan(&self, devices: &[RouterProfile]) -> Result<Vec<PlannedStage>, RolloutError> {
        if devices.is_empty() {
            return Err(RolloutError::NoDevices);
        }
        Ok(vec![PlannedStage {
            concurrency: self.concurrency,
            hostnames: devices.iter().map(|d| d.hostname().clone()).collect(),
        }])
    }
}

/// The key `PhasedStrategy` groups devices by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKey {
    Region,
    Role,
}

/// One stage per distinct key value, ordered by sorted key, each waiting
/// for the prior stage to complete (§4.6).
pub struct PhasedStrategy {
    pub key: PhaseKey,
    pub concurrency: u32,
}

impl Strategy for PhasedStrategy {
    fn name(&self) -> &str {
        "phased"
    }

    fn plan(&self, devices: &[RouterProfile]) -> Result<Vec<PlannedStage>, RolloutError> {
        if devices.is_empty() {
            return Err(RolloutError::NoDevices);
        }
        let mut groups: BTreeMap<String, Vec<Hostname>> = BTreeMap::new();
        for device in devices {
            let key = match self.key {
                PhaseKey::Region => device.region().0.clone(),
                PhaseKey::Role => device.role().0.clone(),
            };
            groups.entry(key).or_default().push(device.hostname().clone());
        }
        Ok(groups
            .into_values()
            .map(|hostnames| PlannedStage {
                concurrency: self.concurrency,
                hostnames,
            })
            .collect())
    }
}

/// Stage 0 is exactly the named canary device at concurrency 1; stage 1 is
/// everything else. If the canary target fails the run is marked `failed`
/// and stage 1 is never dispatched (§4.6) — enforced by the coordinator,
/// not here.
pub struct CanaryStrategy {
    pub canary_hostname: Hostname,
    pub concurrency: u32,
}

impl Strategy for CanaryStrategy {
    fn name(&self) -> &str {
        "canary"
    }

    fn plan(&self, devices: &[RouterProfile]) -> Result<Vec<PlannedStage>, RolloutError> {
        if devices.is_empty() {
            return Err(RolloutError::NoDevices);
        }
        if !devices.iter().any(|d| d.hostname() == &self.canary_hostname) {
            return Err(RolloutError::UnknownCanary(self.canary_hostname.as_str().to_owned()));
        }
        let rest: Vec<Hostname> = devices
            .iter()
            .map(RouterProfile::hostname)
            .filter(|h| *h != &self.canary_hostname)
            .cloned()
            .collect();

        let mut stages = vec![PlannedStage {
            concurrency: 1,
            hostnames: vec![self.canary_hostname.clone()],
        }];
        if !rest.is_empty() {
            stages.push(PlannedStage {
                concurrency: self.concurrency,
                hostnames: rest,
            });
        }
        Ok(stages)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use otto_bgp_core::Region;
    use otto_bgp_core::Role;

    use super::*;

    fn device(name: &str, region: &str, role: &str) -> RouterProfile {
        RouterProfile::new(Hostname::new(name), "10.0.0.1", Role(role.to_owned()), Region(region.to_owned()))
    }

    #[test]
    fn blast_puts_everything_in_one_stage() {
        let devices = vec![device("r1", "us", "edge"), device("r2", "eu", "edge")];
        let stages = BlastStrategy { concurrency: 5 }.plan(&devices).unwrap();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].hostnames.len(), 2);
        assert_eq!(stages[0].concurrency, 5);
    }

    #[test]
    fn phased_groups_by_region_in_sorted_order() {
        let devices = vec![device("r1", "us", "edge"), device("r2", "eu", "edge"), device("r3", "us", "edge")];
        let stages = PhasedStrategy {
            key: PhaseKey::Region,
            concurrency: 2,
        }
        .plan(&devices)
        .unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].hostnames, vec![Hostname::new("r2")]);
        assert_eq!(stages[1].hostnames, vec![Hostname::new("r1"), Hostname::new("r3")]);
    }

    #[test]
    fn canary_splits_off_the_named_device_at_concurrency_one() {
        let devices = vec![device("c", "us", "edge"), device("r1", "us", "edge"), device("r2", "us", "edge")];
        let stages = CanaryStrategy {
            canary_hostname: Hostname::new("c"),
            concurrency: 5,
        }
        .plan(&devices)
        .unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].hostnames, vec![Hostname::new("c")]);
        assert_eq!(stages[0].concurrency, 1);
        assert_eq!(stages[1].hostnames.len(), 2);
    }

    #[test]
    fn canary_rejects_an_unknown_hostname() {
        let devices = vec![device("r1", "us", "edge")];
        let err = CanaryStrategy {
            canary_hostname: Hostname::new("missing"),
            concurrency: 5,
        }
        .plan(&devices)
        .unwrap_err();
        assert!(matches!(err, RolloutError::UnknownCanary(_)));
    }
}
