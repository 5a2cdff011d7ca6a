// crates/otto-bgp-rpki/src/error.rs
// ============================================================================
// Module: RPKI error taxonomy
// Description: Failure modes for loading VRP data, the allowlist, and
// performing validation (section 4.2, section 7).
// Dependencies: thiserror, std::io
// ============================================================================

use thiserror::Error;

/// Errors raised by the VRP store, parser, or validator.
#[derive(Debug, Error)]
pub enum RpkiError {
    /// The VRP cache or allowlist file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file was not valid JSON.
    #[error("failed to parse {path} as JSON: {source}")]
    Json {
        /// Path that failed to parse.
        path: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// Neither `roas` nor `validated-roa-payloads` nor the cached shape's
    /// `vrp_entries` key was present; format could not be auto-detected.
    #[error("could not detect VRP source format: no roas/validated-roa-payloads/vrp_entries key")]
    UnknownFormat,
    /// A VRP entry in the source document failed the
    /// `prefix_len <= max_length <= 32` invariant and was rejected.
    #[error("invalid VRP entry for prefix {prefix}: {reason}")]
    InvalidEntry {
        /// The offending prefix string.
        prefix: String,
        /// Why the entry was rejected.
        reason: String,
    },
    /// No VRP dataset is loaded and the validator is configured fail-closed.
    #[error("no VRP data available, failing closed")]
    NoDataFailClosed,
    /// The loaded dataset is stale and the validator is configured
    /// fail-closed.
    #[error("VRP data is stale (age exceeds configured max), failing closed")]
    StaleDataFailClosed,
    /// Atomically replacing the on-disk cache file failed.
    #[error("failed to persist VRP cache atomically: {0}")]
    CachePersist(String),
}
