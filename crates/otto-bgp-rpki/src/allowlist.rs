// crates/otto-bgp-rpki/src/allowlist.rs
// ============================================================================
// Module: NOTFOUND allowlist
// Description: Operator-maintained exceptions for prefixes with no covering
// VRP that are nonetheless known-good (section 4.2).
// Dependencies: serde_json, ipnet, otto-bgp-core
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use ipnet::Ipv4Net;
use otto_bgp_core::Asn;
use serde::Deserialize;
use serde::Serialize;

use crate::error::RpkiError;

#[derive(Debug, Serialize, Deserialize)]
struct AllowlistEntry {
    prefix: String,
    asn: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AllowlistDocument {
    entries: Vec<AllowlistEntry>,
}

/// The set of `(prefix, asn)` pairs exempted from `NOTFOUND` blocking.
#[derive(Debug, Default, Clone)]
pub struct Allowlist {
    entries: BTreeSet<(Ipv4Net, Asn)>,
}

impl Allowlist {
    /// An empty allowlist.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load an allowlist document from disk. A missing file is not an
    /// error; it yields an empty allowlist, matching the "no allowlist
    /// file yet" case operators hit on first run.
    ///
    /// # Errors
    /// Returns [`RpkiError::Io`] for I/O failures other than not-found, or
    /// [`RpkiError::Json`] if the file is present but malformed.
    pub fn load_from(path: &Path) -> Result<Self, RpkiError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::empty()),
            Err(source) => {
                return Err(RpkiError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        let document: AllowlistDocument =
            serde_json::from_str(&text).map_err(|source| RpkiError::Json {
                path: path.display().to_string(),
                source,
            })?;
        let entries = document
            .entries
            .into_iter()
            .filter_map(|entry| {
                let prefix: Ipv4Net = entry.prefix.parse().ok()?;
                Some((prefix, Asn::new(entry.asn)))
            })
            .collect();
        Ok(Self { entries })
    }

    /// Persist the allowlist to disk as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`RpkiError::Io`] if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), RpkiError> {
        let document = AllowlistDocument {
            entries: self
                .entries
                .iter()
                .map(|(prefix, asn)| AllowlistEntry {
                    prefix: prefix.to_string(),
                    asn: asn.value(),
                })
                .collect(),
        };
        let text = serde_json::to_string_pretty(&document).unwrap_or_default();
        fs::write(path, text).map_err(|source| RpkiError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Whether `(prefix, asn)` is exempted.
    #[must_use]
    pub fn contains(&self, prefix: Ipv4Net, asn: Asn) -> bool {
        self.entries.contains(&(prefix, asn))
    }

    /// Add an exemption.
    pub fn insert(&mut self, prefix: Ipv4Net, asn: Asn) {
        self.entries.insert((prefix, asn));
    }

    /// Remove an exemption. Returns whether it had been present.
    pub fn remove(&mut self, prefix: Ipv4Net, asn: Asn) -> bool {
        self.entries.remove(&(prefix, asn))
    }

    /// Number of exemptions currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the allowlist has no exemptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_empty_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let allowlist = Allowlist::load_from(&path).unwrap();
        assert!(allowlist.is_empty());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allowlist.json");
        let mut allowlist = Allowlist::empty();
        let prefix: Ipv4Net = "203.0.113.0/24".parse().unwrap();
        allowlist.insert(prefix, Asn::new(64500));
        allowlist.save_to(&path).unwrap();

        let loaded = Allowlist::load_from(&path).unwrap();
        assert!(loaded.contains(prefix, Asn::new(64500)));
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn remove_reports_whether_entry_was_present() {
        let mut allowlist = Allowlist::empty();
        let prefix: Ipv4Net = "203.0.113.0/24".parse().unwrap();
        assert!(!allowlist.remove(prefix, Asn::new(1)));
        allowlist.insert(prefix, Asn::new(1));
        assert!(allowlist.remove(prefix, Asn::new(1)));
    }
}
