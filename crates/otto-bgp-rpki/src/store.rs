// crates/otto-bgp-rpki/src/store.rs
// ============================================================================
// Module: VRP Store (C1)
// Description: Loads, indexes, and hot-swaps the Validated ROA Payload
// dataset the RPKI validator queries (section 4.2, section 5).
// Purpose: Give C2 an O(log n) covering-VRP lookup and a single atomic
// dataset swap point so validation never observes a half-loaded dataset.
// Dependencies: otto-bgp-core, serde_json, std::sync::RwLock
// ============================================================================

//! ## Overview
//! [`VrpStore`] owns the current [`VrpDataset`] behind an `RwLock` so a
//! background refresh (re-running `rpki-client`/Routinator and reloading)
//! can swap in a new dataset without blocking concurrent validations; readers
//! always see either the old dataset or the new one, never a partial one.
//! The index is keyed by network address (§5's "index keyed by network
//! address" requirement) to cut the covering-VRP scan down to same-network
//! candidates before the containment check.

use std::collections::BTreeMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use ipnet::Ipv4Net;
use otto_bgp_core::Timestamp;
use otto_bgp_core::VrpDataset;
use otto_bgp_core::VrpEntry;
use otto_bgp_core::VrpSourceFormat;
use serde_json::Value;

use crate::error::RpkiError;
use crate::parser;

/// The VRP dataset plus a network-address index for fast covering lookups.
struct Indexed {
    dataset: VrpDataset,
    by_network: BTreeMap<Ipv4Addr, Vec<VrpEntry>>,
}

fn build_index(dataset: VrpDataset) -> Indexed {
    let mut by_network: BTreeMap<Ipv4Addr, Vec<VrpEntry>> = BTreeMap::new();
    for entry in dataset.entries() {
        by_network
            .entry(entry.prefix().network())
            .or_default()
            .push(entry.clone());
    }
    Indexed { dataset, by_network }
}

/// Hot-swappable holder for the current VRP dataset.
pub struct VrpStore {
    current: RwLock<Option<Arc<Indexed>>>,
    cache_path: PathBuf,
}

impl VrpStore {
    /// An empty store pointed at `cache_path` for future [`Self::persist`]
    /// calls.
    #[must_use]
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            current: RwLock::new(None),
            cache_path: cache_path.into(),
        }
    }

    /// Load a VRP document from `path`, auto-detecting its source format,
    /// and atomically install it as the current dataset.
    ///
    /// # Errors
    /// Returns [`RpkiError::Io`]/[`RpkiError::Json`] on read/parse failure,
    /// or [`RpkiError::UnknownFormat`] if the document matches none of the
    /// three known shapes.
    pub fn load_from(&self, path: &Path) -> Result<(), RpkiError> {
        let text = fs::read_to_string(path).map_err(|source| RpkiError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let document: Value = serde_json::from_str(&text).map_err(|source| RpkiError::Json {
            path: path.display().to_string(),
            source,
        })?;
        let format = parser::detect_format(&document).ok_or(RpkiError::UnknownFormat)?;
        let now = Timestamp::now();
        let dataset = match format {
            VrpSourceFormat::RpkiClient => parser::parse_rpki_client(&document, now),
            VrpSourceFormat::Routinator => parser::parse_routinator(&document, now),
            VrpSourceFormat::Cached => parser::parse_cached(&document, now)?,
        };
        self.install(dataset);
        Ok(())
    }

    /// Install an already-constructed dataset as current, rebuilding the
    /// index. Used directly by tests and by callers that fetch VRP data
    /// through means other than a file (e.g. an in-memory fixture).
    pub fn install(&self, dataset: VrpDataset) {
        let indexed = Arc::new(build_index(dataset));
        let mut guard = self.current.write().unwrap_or_else(|poison| poison.into_inner());
        *guard = Some(indexed);
    }

    /// The currently installed dataset, if any has been loaded yet.
    #[must_use]
    pub fn current_dataset(&self) -> Option<VrpDataset> {
        let guard = self.current.read().unwrap_or_else(|poison| poison.into_inner());
        guard.as_ref().map(|indexed| indexed.dataset.clone())
    }

    /// Whether any dataset is currently loaded.
    #[must_use]
    pub fn has_data(&self) -> bool {
        let guard = self.current.read().unwrap_or_else(|poison| poison.into_inner());
        guard.is_some()
    }

    /// Whether the current dataset is stale relative to `now`, per
    /// [`VrpDataset::is_stale`]. Returns `true` (treat as stale) if no
    /// dataset is loaded at all.
    #[must_use]
    pub fn is_stale(&self, now: Timestamp, max_age_seconds: i64) -> bool {
        let guard = self.current.read().unwrap_or_else(|poison| poison.into_inner());
        match guard.as_ref() {
            Some(indexed) => indexed.dataset.is_stale(now, max_age_seconds),
            None => true,
        }
    }

    /// All VRP entries whose network covers `prefix` (including an exact
    /// match), scanning only entries sharing `prefix`'s network or a less
    /// specific one reachable by widening the mask.
    #[must_use]
    pub fn lookup_covering(&self, prefix: Ipv4Net) -> Vec<VrpEntry> {
        let guard = self.current.read().unwrap_or_else(|poison| poison.into_inner());
        let Some(indexed) = guard.as_ref() else {
            return Vec::new();
        };
        let mut matches = Vec::new();
        // A covering VRP's network address is `prefix`'s network masked to
        // some shorter-or-equal length; walk every possible supernet mask
        // rather than scanning the whole index.
        for candidate_len in (0..=prefix.prefix_len()).rev() {
            let Ok(supernet) = Ipv4Net::new(prefix.network(), candidate_len) else {
                continue;
            };
            if let Some(entries) = indexed.by_network.get(&supernet.network()) {
                for entry in entries {
                    if entry.prefix().prefix_len() == candidate_len && entry.covers(prefix) {
                        matches.push(entry.clone());
                    }
                }
            }
        }
        matches
    }

    /// Atomically persist the current dataset to [`Self::cache_path`] in
    /// Otto BGP's own cached JSON shape, so a subsequent process start can
    /// reload it via [`Self::load_from`] without re-running upstream RPKI
    /// tooling.
    ///
    /// # Errors
    /// Returns [`RpkiError::CachePersist`] if no dataset is loaded or the
    /// write/rename fails.
    pub fn persist(&self) -> Result<(), RpkiError> {
        let dataset = self
            .current_dataset()
            .ok_or_else(|| RpkiError::CachePersist("no dataset loaded".to_owned()))?;
        let document = serde_json::json!({
            "vrp_entries": dataset.entries().iter().map(|e| {
                serde_json::json!({
                    "asn": e.asn().value(),
                    "prefix": e.prefix().to_string(),
                    "max_length": e.max_length(),
                    "ta": e.trust_anchor(),
                })
            }).collect::<Vec<_>>(),
            "generated_time": dataset.generated_time().to_rfc3339(),
            "source_format": "cached",
        });
        let text = serde_json::to_string_pretty(&document)
            .map_err(|e| RpkiError::CachePersist(e.to_string()))?;

        let dir = self
            .cache_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| RpkiError::CachePersist(e.to_string()))?;
        let tmp_path = dir.join(format!(
            ".{}.tmp",
            self.cache_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("vrp_cache")
        ));
        fs::write(&tmp_path, text).map_err(|e| RpkiError::CachePersist(e.to_string()))?;
        fs::rename(&tmp_path, &self.cache_path).map_err(|e| RpkiError::CachePersist(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use otto_bgp_core::Asn;

    fn sample_dataset() -> VrpDataset {
        let entries = vec![
            VrpEntry::new(Asn::new(13335), "1.1.1.0/24".parse().unwrap(), 24, "ripe").unwrap(),
            VrpEntry::new(Asn::new(64500), "10.0.0.0/8".parse().unwrap(), 16, "arin").unwrap(),
        ];
        VrpDataset::new(entries, Timestamp::now(), VrpSourceFormat::Cached, None)
    }

    #[test]
    fn lookup_covering_finds_exact_and_more_general_vrps() {
        let store = VrpStore::new("/tmp/does-not-matter.json");
        store.install(sample_dataset());

        let exact = store.lookup_covering("1.1.1.0/24".parse().unwrap());
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].asn().value(), 13335);

        let subnet = store.lookup_covering("10.1.0.0/24".parse().unwrap());
        assert_eq!(subnet.len(), 1);
        assert_eq!(subnet[0].asn().value(), 64500);

        let uncovered = store.lookup_covering("192.0.2.0/24".parse().unwrap());
        assert!(uncovered.is_empty());
    }

    #[test]
    fn empty_store_reports_stale_and_no_data() {
        let store = VrpStore::new("/tmp/does-not-matter.json");
        assert!(!store.has_data());
        assert!(store.is_stale(Timestamp::now(), 3600));
    }

    #[test]
    fn persist_then_load_round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("vrp_cache.json");
        let store = VrpStore::new(&cache_path);
        store.install(sample_dataset());
        store.persist().unwrap();

        let reloaded = VrpStore::new(&cache_path);
        reloaded.load_from(&cache_path).unwrap();
        let dataset = reloaded.current_dataset().unwrap();
        assert_eq!(dataset.entries().len(), 2);
        assert!(dataset.entries().iter().any(|e| e.trust_anchor() == "ripe"));
    }
}
