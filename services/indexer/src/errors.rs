use contracts::errors::RegistryError;
use thiserror::Error;
use types::errors::{Classify, ErrorClass};
use types::value::ValueError;

use crate::events::ChainPoint;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Event at {point} is behind the cursor {cursor}")]
    OutOfOrder { point: ChainPoint, cursor: ChainPoint },

    #[error("Balance of {address} would go negative in tx {tx_id}: {source}")]
    NegativeBalance {
        address: String,
        tx_id: String,
        source: ValueError,
    },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for IndexerError {
    fn from(e: bincode::Error) -> Self {
        IndexerError::Serialization(e.to_string())
    }
}

impl Classify for IndexerError {
    fn class(&self) -> ErrorClass {
        match self {
            IndexerError::OutOfOrder { .. } => ErrorClass::InvalidRequest,
            _ => ErrorClass::Internal,
        }
    }
}
