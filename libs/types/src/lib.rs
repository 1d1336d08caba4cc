//! Types library for the programmable token control plane
//!
//! Core definitions shared by the contracts, indexer, assembler and gateway.
//! Everything here is plain data with exact arithmetic and a stable wire
//! encoding.
//!
//! # Modules
//! - `ids`: Policy, script, key and transaction hashes; asset names; output refs
//! - `network`: Network selector
//! - `address`: Credentials and raw addresses
//! - `value`: Multi-asset values and signed diffs
//! - `plutus`: On-chain structured data
//! - `tx`: Transaction model
//! - `errors`: Error taxonomy

pub mod address;
pub mod errors;
pub mod ids;
pub mod network;
pub mod plutus;
pub mod tx;
pub mod value;

pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::address::*;
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::network::*;
    pub use crate::plutus::*;
    pub use crate::tx::*;
    pub use crate::value::*;
}
