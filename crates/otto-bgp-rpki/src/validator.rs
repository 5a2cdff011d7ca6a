// crates/otto-bgp-rpki/src/validator.rs
// ============================================================================
// Module: RPKI Validator (C2)
// Description: RFC 6811 tri-state origin validation against the VRP store,
// with an allowlist overlay and a chunked parallel entry point (section
// 4.2).
// Dependencies: otto-bgp-core, otto-bgp-config, std::thread, regex
// ============================================================================

//! ## Overview
//! [`RpkiValidator`] wraps a [`VrpStore`] and an [`Allowlist`] behind the
//! fail-open/fail-closed policy from configuration. The single-prefix path
//! ([`RpkiValidator::validate_prefix_origin`]) is the one piece of logic
//! every other entry point composes: policy-prefix extraction chunks a
//! policy's body into prefixes and calls it per prefix; the parallel path
//! partitions a prefix list across worker threads and calls it per worker.

use std::sync::LazyLock;
use std::sync::OnceLock;

use ipnet::Ipv4Net;
use otto_bgp_config::RpkiConfig;
use otto_bgp_config::RpkiFailPolicy;
use otto_bgp_core::Asn;
use otto_bgp_core::Policy;
use otto_bgp_core::Timestamp;
use otto_bgp_core::ValidationResult;
use otto_bgp_core::ValidationState;
use otto_bgp_core::VrpEntry;
use regex::Regex;

use crate::allowlist::Allowlist;
use crate::store::VrpStore;

static CIDR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}/\d{1,2}\b").expect("static pattern is valid")
});

/// Extract every syntactically valid IPv4 CIDR from a policy body via
/// strict pattern match (§4.2), discarding any match that fails to parse
/// as a well-formed prefix (octet > 255, prefix length > 32).
#[must_use]
pub fn extract_prefixes_from_policy(content: &str) -> Vec<Ipv4Net> {
    CIDR_PATTERN
        .find_iter(content)
        .filter_map(|m| m.as_str().parse::<Ipv4Net>().ok())
        .collect()
}

/// RFC 6811 tri-state origin validator plus allowlist overlay.
pub struct RpkiValidator {
    store: VrpStore,
    allowlist: Allowlist,
    fail_policy: RpkiFailPolicy,
    max_age_seconds: i64,
}

impl RpkiValidator {
    /// Construct a validator over an already-populated store and allowlist.
    #[must_use]
    pub fn new(store: VrpStore, allowlist: Allowlist, config: &RpkiConfig) -> Self {
        Self {
            store,
            allowlist,
            fail_policy: config.fail_policy,
            max_age_seconds: config.max_age_hours.saturating_mul(3600),
        }
    }

    /// The underlying VRP store, for callers that need to trigger a reload.
    #[must_use]
    pub fn store(&self) -> &VrpStore {
        &self.store
    }

    /// The underlying allowlist, for callers that manage exemptions.
    #[must_use]
    pub fn allowlist(&self) -> &Allowlist {
        &self.allowlist
    }

    /// Mutable access to the allowlist, for callers adding/removing
    /// exemptions.
    pub fn allowlist_mut(&mut self) -> &mut Allowlist {
        &mut self.allowlist
    }

    /// Validate one `(prefix, asn)` pair against the current VRP dataset
    /// (§4.2's eight-step algorithm, with "length_ok dominates when
    /// present" resolving the ordering ambiguity the spec calls out).
    #[must_use]
    pub fn validate_prefix_origin(&self, prefix: Ipv4Net, asn: Asn) -> ValidationResult {
        let now = Timestamp::now();

        if !self.store.has_data() {
            return match self.fail_policy {
                RpkiFailPolicy::FailClosed => ValidationResult::new(
                    prefix,
                    asn,
                    ValidationState::Error,
                    "no VRP data available - failing closed",
                    None,
                    false,
                ),
                RpkiFailPolicy::FailOpen => ValidationResult::new(
                    prefix,
                    asn,
                    ValidationState::NotFound,
                    "no VRP data available - proceeding with warning",
                    None,
                    false,
                ),
            };
        }

        if self.store.is_stale(now, self.max_age_seconds) {
            return match self.fail_policy {
                RpkiFailPolicy::FailClosed => ValidationResult::new(
                    prefix,
                    asn,
                    ValidationState::Error,
                    "VRP data is stale - failing closed",
                    None,
                    false,
                ),
                RpkiFailPolicy::FailOpen => {
                    self.validate_core(prefix, asn, "VRP data is stale but proceeding (fail-open)")
                }
            };
        }

        self.validate_core(prefix, asn, "")
    }

    fn validate_core(&self, prefix: Ipv4Net, asn: Asn, staleness_note: &str) -> ValidationResult {
        let covering = self.store.lookup_covering(prefix);
        let note = |reason: String| -> String {
            if staleness_note.is_empty() {
                reason
            } else {
                format!("{reason} ({staleness_note})")
            }
        };

        if covering.is_empty() {
            let allowlisted = self.allowlist.contains(prefix, asn);
            let reason = if allowlisted {
                "no covering VRP found - allowlisted exception"
            } else {
                "no covering VRP found"
            };
            return ValidationResult::new(
                prefix,
                asn,
                ValidationState::NotFound,
                note(reason.to_owned()),
                None,
                allowlisted,
            );
        }

        let (length_ok, length_bad): (Vec<VrpEntry>, Vec<VrpEntry>) = covering
            .into_iter()
            .partition(|v| prefix.prefix_len() <= v.max_length());

        if length_ok.is_empty() {
            let worst = &length_bad[0];
            return ValidationResult::new(
                prefix,
                asn,
                ValidationState::Invalid,
                note(format!(
                    "prefix length {} exceeds max-length {} of covering VRP {}",
                    prefix.prefix_len(),
                    worst.max_length(),
                    worst.prefix()
                )),
                Some((worst.asn(), worst.prefix(), worst.max_length())),
                false,
            );
        }

        if let Some(matching) = length_ok.iter().find(|v| v.asn() == asn) {
            return ValidationResult::new(
                prefix,
                asn,
                ValidationState::Valid,
                note(format!(
                    "valid ROA found: {} max-length {}",
                    matching.prefix(),
                    matching.max_length()
                )),
                Some((matching.asn(), matching.prefix(), matching.max_length())),
                false,
            );
        }

        let reference = &length_ok[0];
        let origins: Vec<String> = length_ok.iter().map(|v| v.asn().to_string()).collect();
        ValidationResult::new(
            prefix,
            asn,
            ValidationState::Invalid,
            note(format!(
                "covered by VRP(s) for different AS(s): {}",
                origins.join(", ")
            )),
            Some((reference.asn(), reference.prefix(), reference.max_length())),
            false,
        )
    }

    /// Extract every CIDR from `policy`'s body and validate each against
    /// `policy`'s own origin AS (§4.2). A non-AS `ResourceId` (IRR object)
    /// yields no results, since origin validation needs a concrete AS.
    #[must_use]
    pub fn validate_policy_prefixes(&self, policy: &Policy) -> Vec<ValidationResult> {
        let otto_bgp_core::ResourceId::Asn(asn) = policy.resource_id() else {
            return Vec::new();
        };
        extract_prefixes_from_policy(&policy.content_str())
            .into_iter()
            .map(|prefix| self.validate_prefix_origin(prefix, *asn))
            .collect()
    }

    /// Validate `prefixes` against `asn`, parallelizing across worker
    /// threads when `prefixes.len() > 10` (§4.2's chunking contract).
    /// Results preserve input order regardless of chunking.
    #[must_use]
    pub fn validate_prefixes_parallel(
        &self,
        prefixes: &[Ipv4Net],
        asn: Asn,
        max_workers: Option<usize>,
        disable_parallel: bool,
    ) -> Vec<ValidationResult> {
        if disable_parallel || prefixes.len() <= 10 {
            return prefixes
                .iter()
                .map(|p| self.validate_prefix_origin(*p, asn))
                .collect();
        }

        let worker_cap = max_workers.unwrap_or_else(cpu_count).max(1).min(8);
        let chunk_size = prefixes.len().div_ceil(worker_cap).max(1);
        let chunks: Vec<&[Ipv4Net]> = prefixes.chunks(chunk_size).collect();

        let mut results: Vec<Option<ValidationResult>> = vec![None; prefixes.len()];
        let mut offset = 0usize;
        let mut ranges = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            ranges.push((offset, chunk.len()));
            offset += chunk.len();
        }

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(chunks.len());
            for (chunk, (start, len)) in chunks.iter().zip(ranges.iter()) {
                let start = *start;
                let len = *len;
                let chunk = *chunk;
                handles.push(scope.spawn(move || {
                    let outcomes: Vec<ValidationResult> = chunk
                        .iter()
                        .map(|p| self.validate_prefix_origin(*p, asn))
                        .collect();
                    (start, len, outcomes)
                }));
            }
            for handle in handles {
                match handle.join() {
                    Ok((start, _len, outcomes)) => {
                        for (i, outcome) in outcomes.into_iter().enumerate() {
                            results[start + i] = Some(outcome);
                        }
                    }
                    Err(_) => {
                        // A worker panicked; that chunk's range is filled
                        // with ERROR results below since its slots stay
                        // None, never silently dropped from the output.
                    }
                }
            }
        });

        results
            .into_iter()
            .zip(prefixes.iter())
            .map(|(maybe, prefix)| {
                maybe.unwrap_or_else(|| {
                    ValidationResult::new(
                        *prefix,
                        asn,
                        ValidationState::Error,
                        "worker panicked during parallel validation",
                        None,
                        false,
                    )
                })
            })
            .collect()
    }
}

static CPU_COUNT: OnceLock<usize> = OnceLock::new();

fn cpu_count() -> usize {
    *CPU_COUNT.get_or_init(num_cpus::get)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use otto_bgp_core::VrpDataset;
    use otto_bgp_core::VrpSourceFormat;

    fn validator_with(entries: Vec<VrpEntry>, fail_policy: RpkiFailPolicy) -> RpkiValidator {
        let store = VrpStore::new("/tmp/unused.json");
        store.install(VrpDataset::new(
            entries,
            Timestamp::now(),
            VrpSourceFormat::Cached,
            None,
        ));
        let config = RpkiConfig {
            fail_policy,
            ..RpkiConfig::default()
        };
        RpkiValidator::new(store, Allowlist::empty(), &config)
    }

    #[test]
    fn valid_when_covering_vrp_matches_origin_and_length() {
        let vrp = VrpEntry::new(Asn::new(13335), "1.1.1.0/24".parse().unwrap(), 24, "ripe").unwrap();
        let validator = validator_with(vec![vrp], RpkiFailPolicy::FailClosed);
        let result = validator.validate_prefix_origin("1.1.1.0/24".parse().unwrap(), Asn::new(13335));
        assert_eq!(result.state(), ValidationState::Valid);
    }

    #[test]
    fn invalid_when_covering_vrp_has_different_origin() {
        let vrp = VrpEntry::new(Asn::new(13335), "1.1.1.0/24".parse().unwrap(), 24, "ripe").unwrap();
        let validator = validator_with(vec![vrp], RpkiFailPolicy::FailClosed);
        let result = validator.validate_prefix_origin("1.1.1.0/24".parse().unwrap(), Asn::new(999));
        assert_eq!(result.state(), ValidationState::Invalid);
    }

    #[test]
    fn invalid_when_max_length_exceeded_and_length_ok_is_empty() {
        let vrp = VrpEntry::new(Asn::new(13335), "1.1.1.0/24".parse().unwrap(), 24, "ripe").unwrap();
        let validator = validator_with(vec![vrp], RpkiFailPolicy::FailClosed);
        let result = validator.validate_prefix_origin("1.1.1.0/25".parse().unwrap(), Asn::new(13335));
        assert_eq!(result.state(), ValidationState::Invalid);
    }

    #[test]
    fn length_ok_dominates_when_both_length_ok_and_length_bad_cover() {
        // Two VRPs cover the same /25: one permits it (max_length 25), one
        // would reject it (max_length 24). length_ok must win.
        let permits = VrpEntry::new(Asn::new(13335), "1.1.1.0/24".parse().unwrap(), 25, "ripe").unwrap();
        let rejects = VrpEntry::new(Asn::new(13335), "1.1.1.0/24".parse().unwrap(), 24, "ripe").unwrap();
        let validator = validator_with(vec![permits, rejects], RpkiFailPolicy::FailClosed);
        let result = validator.validate_prefix_origin("1.1.1.0/25".parse().unwrap(), Asn::new(13335));
        assert_eq!(result.state(), ValidationState::Valid);
    }

    #[test]
    fn notfound_when_no_covering_vrp_exists() {
        let validator = validator_with(Vec::new(), RpkiFailPolicy::FailClosed);
        let result = validator.validate_prefix_origin("203.0.113.0/24".parse().unwrap(), Asn::new(1));
        assert_eq!(result.state(), ValidationState::NotFound);
        assert!(!result.allowlisted());
    }

    #[test]
    fn error_when_no_dataset_and_fail_closed() {
        let store = VrpStore::new("/tmp/unused.json");
        let config = RpkiConfig {
            fail_policy: RpkiFailPolicy::FailClosed,
            ..RpkiConfig::default()
        };
        let validator = RpkiValidator::new(store, Allowlist::empty(), &config);
        let result = validator.validate_prefix_origin("1.1.1.0/24".parse().unwrap(), Asn::new(1));
        assert_eq!(result.state(), ValidationState::Error);
    }

    #[test]
    fn notfound_with_warning_when_no_dataset_and_fail_open() {
        let store = VrpStore::new("/tmp/unused.json");
        let config = RpkiConfig {
            fail_policy: RpkiFailPolicy::FailOpen,
            ..RpkiConfig::default()
        };
        let validator = RpkiValidator::new(store, Allowlist::empty(), &config);
        let result = validator.validate_prefix_origin("1.1.1.0/24".parse().unwrap(), Asn::new(1));
        assert_eq!(result.state(), ValidationState::NotFound);
    }

    #[test]
    fn extract_prefixes_ignores_non_cidr_text() {
        let content = "policy-options {\n  prefix-list AS13335 {\n    1.1.1.0/24;\n    not-a-prefix;\n    10.0.0.0/8;\n  }\n}\n";
        let prefixes = extract_prefixes_from_policy(content);
        assert_eq!(prefixes.len(), 2);
    }

    #[test]
    fn parallel_and_sequential_paths_agree_and_preserve_order() {
        let vrp = VrpEntry::new(Asn::new(13335), "1.1.1.0/24".parse().unwrap(), 32, "ripe").unwrap();
        let validator = validator_with(vec![vrp], RpkiFailPolicy::FailClosed);
        let prefixes: Vec<Ipv4Net> = (0..25)
            .map(|i| format!("1.1.1.{i}/32").parse().unwrap())
            .collect();

        let sequential: Vec<ValidationState> = prefixes
            .iter()
            .map(|p| validator.validate_prefix_origin(*p, Asn::new(13335)).state())
            .collect();
        let parallel: Vec<ValidationState> = validator
            .validate_prefixes_parallel(&prefixes, Asn::new(13335), Some(4), false)
            .into_iter()
            .map(|r| r.state())
            .collect();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn small_prefix_sets_run_sequentially_even_without_disable_flag() {
        let validator = validator_with(Vec::new(), RpkiFailPolicy::FailClosed);
        let prefixes: Vec<Ipv4Net> = (0..5).map(|i| format!("1.1.1.{i}/32").parse().unwrap()).collect();
        let results = validator.validate_prefixes_parallel(&prefixes, Asn::new(1), None, false);
        assert_eq!(results.len(), 5);
    }
}
