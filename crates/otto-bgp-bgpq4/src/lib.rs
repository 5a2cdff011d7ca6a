// crates/otto-bgp-bgpq4/src/lib.rs
// ============================================================================
// Module: Otto BGP bgpq4
// Description: Parallel `bgpq4` subprocess wrapper and IRR SSH-tunnel
// endpoint type, specified at the contract level (section 1, section 6).
// Purpose: Feed the core pipeline with `Policy` values generated from IRR
// data, without reimplementing any IRR query logic.
// Dependencies: otto-bgp-core, thiserror, tracing
// ============================================================================

//! ## Overview
//! This crate only shells out. [`command::build_argv`] is the one place
//! that turns validated inputs into a process argv (no shell evaluation,
//! ever); [`runner::run_one`] enforces the subprocess timeout and parses
//! stdout into a [`otto_bgp_core::Policy`]; [`pool::generate_parallel`] is
//! the worker-pool entry point the pipeline calls for a whole fleet's
//! worth of AS numbers.

pub mod command;
pub mod error;
pub mod pool;
pub mod runner;

pub use command::TunnelEndpoint;
pub use command::build_argv;
pub use error::Bgpq4Error;
pub use pool::generate_parallel;
pub use runner::Bgpq4Request;
pub use runner::run_one;
