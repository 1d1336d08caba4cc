//! Assembly requests
//!
//! Every request carries the caller's spendable UTxOs and a change address;
//! the assembler never queries the ledger itself.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::address::{Address, Credential};
use types::ids::{AssetName, KeyHash, PolicyId};
use types::tx::Utxo;

use crate::substandard::ListAction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub substandard_id: String,
    pub policy_id: PolicyId,
    pub issuer: KeyHash,
    /// Deny or allow list node policy, for substandards that keep one
    #[serde(default)]
    pub list_policy: Option<PolicyId>,
    pub utxos: Vec<Utxo>,
    pub change_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub policy_id: PolicyId,
    pub asset_name: AssetName,
    pub quantity: Decimal,
    pub issuer: KeyHash,
    /// Any address of the recipient; tokens go to its programmable address
    pub recipient: Address,
    pub utxos: Vec<Utxo>,
    pub change_address: Address,
}

/// Burns from the issuer's own programmable address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnRequest {
    pub policy_id: PolicyId,
    pub asset_name: AssetName,
    pub quantity: Decimal,
    pub issuer: KeyHash,
    pub utxos: Vec<Utxo>,
    pub change_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub policy_id: PolicyId,
    pub asset_name: AssetName,
    pub quantity: Decimal,
    pub sender: Address,
    pub recipient: Address,
    /// Sender's wallet UTxOs and programmable UTxOs
    pub utxos: Vec<Utxo>,
    pub change_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    pub policy_id: PolicyId,
    pub action: ListAction,
    #[serde(default)]
    pub target: Option<Credential>,
    pub issuer: KeyHash,
    pub utxos: Vec<Utxo>,
    pub change_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeizeRequest {
    pub policy_id: PolicyId,
    pub asset_name: AssetName,
    /// Everything the holder has when absent
    #[serde(default)]
    pub quantity: Option<Decimal>,
    pub holder: Address,
    pub issuer: KeyHash,
    /// Issuer's funding UTxOs plus the holder's programmable UTxOs
    pub utxos: Vec<Utxo>,
    pub change_address: Address,
}
