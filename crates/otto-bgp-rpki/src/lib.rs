// crates/otto-bgp-rpki/src/lib.rs
// ============================================================================
// Module: Otto BGP RPKI
// Description: VRP store (C1) and RFC 6811 origin validator (C2).
// Purpose: The RPKI half of the safety pipeline; section 4.2. Full
// repository fetching (rpki-client/Routinator invocation itself) is out of
// scope — this crate consumes already-produced VRP JSON.
// Dependencies: otto-bgp-core, otto-bgp-config, serde_json, ipnet, regex
// ============================================================================

//! ## Overview
//! [`store::VrpStore`] loads and indexes VRP datasets; [`validator::RpkiValidator`]
//! answers origin-validation queries against the store plus an
//! [`allowlist::Allowlist`] overlay for `NOTFOUND` exceptions.

pub mod allowlist;
pub mod error;
pub mod parser;
pub mod store;
pub mod validator;

pub use allowlist::Allowlist;
pub use error::RpkiError;
pub use store::VrpStore;
pub use validator::RpkiValidator;
pub use validator::extract_prefixes_from_policy;
