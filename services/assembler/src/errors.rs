//! Assembler error types

use contracts::errors::{RegistryError, ValidationError};
use std::fmt;
use thiserror::Error;
use types::errors::{Classify, ErrorClass};
use types::value::{Value, ValueError};

use crate::substandard::Capability;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubstandardError {
    #[error("Substandard not found: {id}")]
    NotFound { id: String },

    #[error("Substandard disabled: {id}")]
    Disabled { id: String },

    #[error("Substandard {id} does not support {capability}")]
    CapabilityNotSupported { id: String, capability: Capability },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Transfer rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Value error: {0}")]
    Value(#[from] ValueError),
}

impl Classify for SubstandardError {
    fn class(&self) -> ErrorClass {
        match self {
            SubstandardError::NotFound { .. } | SubstandardError::Disabled { .. } => {
                ErrorClass::SubstandardNotFound
            }
            SubstandardError::CapabilityNotSupported { .. } => ErrorClass::CapabilityNotSupported,
            SubstandardError::InvalidRequest(_) => ErrorClass::InvalidRequest,
            SubstandardError::Registry(e) => e.class(),
            SubstandardError::Validation(e) => e.class(),
            SubstandardError::Value(e) => e.class(),
        }
    }
}

/// Amounts missing from the caller's UTxOs, rendered as `unit=amount` pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall(pub Value);

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(u, a)| format!("{}={}", u, a)).collect();
        f.write_str(&parts.join(", "))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    #[error("Policy {policy} is not registered")]
    NotRegistered { policy: String },

    #[error("Insufficient funds, short by {shortfall}")]
    InsufficientFunds { shortfall: Shortfall },

    #[error(transparent)]
    Substandard(#[from] SubstandardError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Assembled transaction rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    #[error("Conflicting redeemers for {purpose}")]
    ConflictingRedeemer { purpose: String },

    #[error("Redeemer names reference input {out_ref} which is not attached")]
    MissingReference { out_ref: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AssemblyError {
    pub fn insufficient(shortfall: Value) -> Self {
        AssemblyError::InsufficientFunds {
            shortfall: Shortfall(shortfall),
        }
    }

    /// Missing amounts when the error is `InsufficientFunds`
    pub fn shortfall(&self) -> Option<&Value> {
        match self {
            AssemblyError::InsufficientFunds { shortfall } => Some(&shortfall.0),
            _ => None,
        }
    }
}

impl Classify for AssemblyError {
    fn class(&self) -> ErrorClass {
        match self {
            AssemblyError::NotRegistered { .. } => ErrorClass::NotRegistered,
            AssemblyError::InsufficientFunds { .. } => ErrorClass::InsufficientFunds,
            AssemblyError::Substandard(e) => e.class(),
            AssemblyError::Registry(e) => e.class(),
            AssemblyError::Validation(e) => e.class(),
            AssemblyError::Value(e) => e.class(),
            AssemblyError::InvalidRequest(_) => ErrorClass::InvalidRequest,
            AssemblyError::ConflictingRedeemer { .. } | AssemblyError::MissingReference { .. } => {
                ErrorClass::Internal
            }
        }
    }
}
