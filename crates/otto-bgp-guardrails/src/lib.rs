// crates/otto-bgp-guardrails/src/lib.rs
// ============================================================================
// Crate: otto-bgp-guardrails
// Description: G1-G4 mandatory guardrails plus the registry that runs them
// as a unit (section 4.3). Aggregation into a Safety Check Result is the
// Unified Safety Manager's job (section 4.4, crate otto-bgp-safety).
// ============================================================================

//! ## Overview
//! Every guardrail implements [`Guardrail`]; [`GuardrailRegistry`] owns the
//! mandatory set and runs it over a [`GuardrailContext`]. Four components:
//! prefix-count ([`PrefixCountGuardrail`]), RPKI ([`RpkiGuardrail`]), bogon
//! ([`BogonGuardrail`]), concurrent-operation locking
//! ([`ConcurrentOperationGuardrail`]), and signal handling
//! ([`SignalHandlingGuardrail`]).

mod bogon;
mod concurrent_operation;
mod guardrail;
mod prefix_count;
mod registry;
mod rpki_guardrail;
mod signal_handling;

pub use bogon::BogonCategory;
pub use bogon::BogonGuardrail;
pub use concurrent_operation::ConcurrentOperationGuardrail;
pub use concurrent_operation::LockOutcome;
pub use guardrail::Guardrail;
pub use guardrail::GuardrailContext;
pub use prefix_count::PrefixCountGuardrail;
pub use registry::GuardrailRegistry;
pub use rpki_guardrail::RpkiGuardrail;
pub use signal_handling::RollbackCallback;
pub use signal_handling::SignalHandlingGuardrail;
