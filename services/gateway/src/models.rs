use contracts::registry::DirectoryEntry;
use indexer::ChainPoint;
use indexer::balance::BalanceLogEntry;
use indexer::store::TokenRegistration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::address::Address;
use types::ids::{KeyHash, OutputRef, TxId};
use types::tx::Transaction;
use types::value::Value;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub address: Address,
    pub balance: Value,
    /// Chain point of the latest row; absent for an address never seen
    pub as_of: Option<ChainPoint>,
    pub tx_id: Option<TxId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub stake_key_hash: String,
    pub entries: Vec<BalanceLogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryResponse {
    #[serde(flatten)]
    pub registration: TokenRegistration,
    pub entry: DirectoryEntry,
    /// Output currently holding the registry node
    pub node: OutputRef,
}

/// Unsigned transaction returned for external signing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledResponse {
    pub transaction: Transaction,
    pub fee: Decimal,
    pub required_signers: Vec<KeyHash>,
}

impl From<Transaction> for AssembledResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            fee: transaction.fee,
            required_signers: transaction.required_signers.iter().copied().collect(),
            transaction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Signed transaction, hex-encoded CBOR
    pub cbor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub tx_id: TxId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub cursor: Option<ChainPoint>,
    pub tokens: usize,
    pub balance_rows: usize,
}
