// crates/otto-bgp-netconf/src/lib.rs
// ============================================================================
// Crate: otto-bgp-netconf
// Description: NETCONF Applier and Finalization (section 4.5, C5/C6). Drives
// one router through the lock/load/diff/commit/health/finalize pipeline over
// SSH. Does not itself run any guardrail — the Unified Safety Manager runs
// the guardrail registry before ever constructing a transport.
// ============================================================================

//! ## Overview
//! [`SshNetconfTransport`] is the real transport; [`apply`] is the
//! transport-agnostic pipeline body. `otto-bgp-safety` is the only expected
//! caller: it owns the exclusive-operation lock and the guardrail run, then
//! opens a transport and calls [`apply`] once per target.

mod error;
mod pipeline;
mod rpc;
mod transport;

pub use error::NetconfError;
pub use pipeline::{apply, ApplyOptions};
pub use transport::{NetconfTransport, SshNetconfTransport};
