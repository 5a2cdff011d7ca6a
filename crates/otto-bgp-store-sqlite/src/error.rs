// crates/otto-bgp-store-sqlite/src/error.rs
// ============================================================================
// Module: Store errors
// Description: Failure taxonomy for the durable rollout event store.
// Dependencies: thiserror, rusqlite
// ============================================================================

use thiserror::Error;

/// Failures surfaced by [`crate::EventStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open or migrate the database file.
    #[error("failed to open event store at {path}: {source}")]
    Open {
        /// The configured database path.
        path: String,
        /// The underlying `SQLite` error.
        #[source]
        source: rusqlite::Error,
    },
    /// A query or statement execution failed.
    #[error("event store query failed: {0}")]
    Query(#[source] rusqlite::Error),
    /// An event's JSON payload could not be (de)serialized.
    #[error("event payload (de)serialization failed: {0}")]
    Payload(#[source] serde_json::Error),
    /// A stored timestamp or event type failed to parse back.
    #[error("corrupt event record: {0}")]
    Corrupt(String),
}
