// crates/otto-bgp-bgpq4/src/error.rs
// ============================================================================
// Module: bgpq4 error taxonomy
// Description: Failure modes for argument validation, subprocess exec, and
// output parsing (section 6, section 7).
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Errors raised constructing, running, or parsing the output of a `bgpq4`
/// invocation.
#[derive(Debug, Error)]
pub enum Bgpq4Error {
    /// A would-be argument contained characters outside what a validated
    /// policy name or hostname may hold; rejected before exec (§6).
    #[error("rejected unsafe bgpq4 argument: {0:?}")]
    UnsafeArgument(String),
    /// The subprocess could not be spawned.
    #[error("failed to spawn bgpq4: {0}")]
    Spawn(String),
    /// The subprocess exceeded its timeout and was killed.
    #[error("bgpq4 timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The subprocess exited non-zero.
    #[error("bgpq4 exited with status {status}: {stderr}")]
    NonZeroExit {
        /// The process exit status, if one was observed.
        status: String,
        /// Captured stderr.
        stderr: String,
    },
    /// The subprocess's stdout could not be turned into a [`otto_bgp_core::Policy`].
    #[error("failed to build policy from bgpq4 output: {0}")]
    PolicyConstruction(String),
}
