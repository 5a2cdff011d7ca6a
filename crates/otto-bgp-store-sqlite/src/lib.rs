// crates/otto-bgp-store-sqlite/src/lib.rs
// ============================================================================
// Crate: otto-bgp-store-sqlite
// Description: Durable append-only Rollout Event store backed by SQLite
// (section 4.6, section 6). Consumed by otto-bgp-rollout to persist events
// as a run progresses and by the CLI's `rollout status` command.
// ============================================================================

//! ## Overview
//! [`EventStore`] is the only public surface: open a database file, append
//! events, and read them back sorted by `recorded_at`. No in-place update or
//! delete is exposed, matching the append-only invariant.

mod error;
mod store;

pub use error::StoreError;
pub use store::EventStore;
