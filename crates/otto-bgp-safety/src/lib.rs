// crates/otto-bgp-safety/src/lib.rs
// ============================================================================
// Crate: otto-bgp-safety
// Description: Unified Safety Manager (section 4.4, C4): guardrail
// aggregation, the G3 exclusive-operation lock, rollback callbacks and
// checkpoints, notification delivery, and the NETCONF apply pipeline
// invocation that everything else gates.
// ============================================================================

//! ## Overview
//! [`UnifiedSafetyManager`] is the single object every caller — direct-mode
//! pipeline, rollout coordinator, CLI `apply` — goes through to validate a
//! policy set and then apply it. [`Notifier`] and its two implementations
//! deliver the lifecycle notifications the manager sends around each
//! attempt.

mod error;
mod manager;
mod notify;

pub use error::SafetyError;
pub use manager::Checkpoint;
pub use manager::EventRecorder;
pub use manager::RolloutContext;
pub use manager::SshCredentials;
pub use manager::UnifiedSafetyManager;
pub use notify::notifier_from_config;
pub use notify::Notification;
pub use notify::Notifier;
pub use notify::SendmailNotifier;
pub use notify::SmtpNotifier;
