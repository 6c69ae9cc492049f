//! Redaction planning for selective disclosure.
//!
//! Callers describe what to hide as ranges over one direction's concatenated
//! plaintext. The planner maps them onto record blocks, hashes the ranges that
//! need a verifiable commitment through the OPRF, and drops blocks that end up
//! fully hidden.

pub mod planner;
pub mod primitives;

#[cfg(test)]
mod proptests;

pub use planner::{plan_reveals, plan_transcript, PlannedBlock, RevealPlan};
pub use primitives::{
    apply_redaction_mask, is_fully_redacted, is_redaction_congruent, normalize_ranges,
    redact_range, redaction_mask, RedactionKind, RedactionRange, REDACTION_CHAR,
};
