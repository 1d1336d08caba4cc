//! On-chain rules of the programmable token protocol
//!
//! Off-chain mirrors of the validators: the sorted registry and its proofs,
//! the credential lists used by compliance substandards, and the two-tier
//! coordinator that every programmable transaction must satisfy. Everything
//! here is a pure function of its inputs.
//!
//! # Modules
//! - `errors`: Registry and validation error types
//! - `linked_list`: Sorted linked list with covering-node proofs
//! - `registry`: Token registry entries and their datum codec
//! - `blacklist`: Deny/allow credential lists and their proofs
//! - `bootstrap`: Immutable protocol parameters
//! - `coordinator`: Per-item guard and per-transaction coordinator

pub mod blacklist;
pub mod bootstrap;
pub mod coordinator;
pub mod errors;
pub mod linked_list;
pub mod registry;

/// Datum layout version of registry and list nodes
pub const DATUM_VERSION: &str = "1.0.0";
