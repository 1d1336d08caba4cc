//! Error taxonomy shared by every crate
//!
//! Each crate keeps its own `thiserror` enum; [`Classify`] maps those into a
//! small set of classes that decide how an error is handled at the edge:
//! retried, surfaced to the caller, absorbed or only logged.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    /// On-chain rule violated; the transaction can never succeed as built
    ValidationFailure,
    /// Token policy absent from the registry
    NotRegistered,
    /// Selected inputs cannot cover the request; carries a shortfall
    InsufficientFunds,
    /// Event already ingested
    DuplicateEvent,
    /// Chain reorganisation observed
    RollbackDetected,
    /// Substandard lacks the requested optional capability
    CapabilityNotSupported,
    /// Substandard id unknown or disabled
    SubstandardNotFound,
    /// Upstream ledger provider unreachable or timed out
    ServiceUnavailable,
    /// Malformed caller input
    InvalidRequest,
    Internal,
}

impl ErrorClass {
    /// Only provider outages are retried, and only by the calling layer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::ServiceUnavailable)
    }

    /// Whether the error is returned to API callers. Duplicates are absorbed
    /// and rollbacks are logged.
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, ErrorClass::DuplicateEvent | ErrorClass::RollbackDetected)
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorClass::ValidationFailure => "VALIDATION_FAILURE",
            ErrorClass::NotRegistered => "NOT_REGISTERED",
            ErrorClass::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorClass::DuplicateEvent => "DUPLICATE_EVENT",
            ErrorClass::RollbackDetected => "ROLLBACK_DETECTED",
            ErrorClass::CapabilityNotSupported => "CAPABILITY_NOT_SUPPORTED",
            ErrorClass::SubstandardNotFound => "SUBSTANDARD_NOT_FOUND",
            ErrorClass::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorClass::InvalidRequest => "INVALID_REQUEST",
            ErrorClass::Internal => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Implemented by every crate error to place it in the taxonomy
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

impl Classify for crate::ids::IdError {
    fn class(&self) -> ErrorClass {
        ErrorClass::InvalidRequest
    }
}

impl Classify for crate::address::AddressError {
    fn class(&self) -> ErrorClass {
        ErrorClass::InvalidRequest
    }
}

impl Classify for crate::value::ValueError {
    fn class(&self) -> ErrorClass {
        match self {
            crate::value::ValueError::Overflow { .. } => ErrorClass::Internal,
            _ => ErrorClass::InvalidRequest,
        }
    }
}
