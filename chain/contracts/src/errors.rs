//! Contract-specific error types
//!
//! Registry (sorted list) errors and coordinator validation errors.

use thiserror::Error;
use types::errors::{Classify, ErrorClass};
use types::value::ValueError;

/// Sorted-list and registry errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Key already registered: {key}")]
    AlreadyRegistered { key: String },

    #[error("Invalid key {key}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Covering node {key} was spent by a concurrent insertion")]
    CoveringNodeSpent { key: String },

    #[error("Node not found: {key}")]
    NodeNotFound { key: String },

    #[error("Chain broken: {reason}")]
    ChainBroken { reason: String },

    #[error("Malformed node datum: {0}")]
    Decode(String),
}

impl Classify for RegistryError {
    fn class(&self) -> ErrorClass {
        match self {
            RegistryError::InvalidKey { .. } => ErrorClass::InvalidRequest,
            RegistryError::NodeNotFound { .. } => ErrorClass::NotRegistered,
            RegistryError::ChainBroken { .. } | RegistryError::Decode(_) => ErrorClass::Internal,
            RegistryError::AlreadyRegistered { .. } | RegistryError::CoveringNodeSpent { .. } => {
                ErrorClass::ValidationFailure
            }
        }
    }
}

/// Coordinator and substandard validation failures. Any of these aborts the
/// whole transaction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Coordinator not invoked: no zero-value withdrawal from the global logic script")]
    CoordinatorNotInvoked,

    #[error("Invalid coordinator redeemer: {reason}")]
    InvalidRedeemer { reason: String },

    #[error("Proof count mismatch: {expected} policies touched, {actual} proofs supplied")]
    ProofCountMismatch { expected: usize, actual: usize },

    #[error("Reference input {index} does not exist")]
    ReferenceInputMissing { index: u32 },

    #[error("Reference input {index} is not an authentic registry node")]
    NotARegistryNode { index: u32 },

    #[error("Registry node at reference input {index} does not match policy {policy}")]
    KeyMismatch { index: u32, policy: String },

    #[error("Transfer logic for policy {policy} not invoked")]
    TransferLogicNotInvoked { policy: String },

    #[error("Third-party logic for policy {policy} not invoked")]
    ThirdPartyLogicNotInvoked { policy: String },

    #[error("Owner of input {input} did not authorize the transaction")]
    OwnerNotAuthorized { input: String },

    #[error("Value not conserved for policy {policy}: inputs {input}, minted {minted}, outputs {output}")]
    ValueNotConserved {
        policy: String,
        input: String,
        minted: String,
        output: String,
    },

    #[error("Issuance of policy {policy} not authorized: no mint redeemer")]
    IssuanceNotAuthorized { policy: String },

    #[error("Non-membership proof for {key} is invalid")]
    MembershipProofInvalid { key: String },

    #[error("Credential {credential} is frozen")]
    CredentialFrozen { credential: String },

    #[error("Credential {credential} is not on the allow list")]
    NotAllowListed { credential: String },

    #[error("Issuer {issuer} did not sign")]
    IssuerNotSigned { issuer: String },

    #[error("Value error: {0}")]
    Value(#[from] ValueError),
}

impl Classify for ValidationError {
    fn class(&self) -> ErrorClass {
        ErrorClass::ValidationFailure
    }
}
