//! Protocol bootstrap parameters
//!
//! Script hashes and output references fixed when the protocol is deployed.
//! Every assembled transaction references them and every validator is
//! parameterized by them; they never change after genesis.

use serde::{Deserialize, Serialize};
use types::address::{Address, Credential};
use types::ids::{OutputRef, PolicyId, ScriptHash, TxId};
use types::network::Network;

/// Outputs holding the deployed scripts, used as reference scripts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceScripts {
    pub directory_spend: OutputRef,
    pub directory_mint: OutputRef,
    pub logic_base: OutputRef,
    pub logic_global: OutputRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolBootstrapParams {
    /// Identifies the deployment
    pub genesis_tx: TxId,
    pub network: Network,
    /// Output holding the protocol parameters datum
    pub protocol_params_ref: OutputRef,
    /// Minting policy of registry node authenticity markers
    pub directory_node_policy: PolicyId,
    /// Spending script guarding registry nodes
    pub directory_spend_script: ScriptHash,
    /// Per-item guard: payment credential of every programmable address
    pub programmable_logic_base: ScriptHash,
    /// Per-transaction coordinator, invoked as a stake script
    pub programmable_logic_global: ScriptHash,
    pub reference_scripts: ReferenceScripts,
}

impl ProtocolBootstrapParams {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Protocol payment credential combined with the holder's stake credential
    pub fn programmable_address(&self, owner: Credential) -> Address {
        Address::new(
            self.network.network_id(),
            Credential::Script(self.programmable_logic_base),
            Some(owner),
        )
    }

    pub fn is_programmable(&self, address: &Address) -> bool {
        address.payment == Credential::Script(self.programmable_logic_base)
    }

    /// Address holding registry nodes
    pub fn directory_address(&self) -> Address {
        Address::new(
            self.network.network_id(),
            Credential::Script(self.directory_spend_script),
            None,
        )
    }

    pub fn is_directory(&self, address: &Address) -> bool {
        address.payment == Credential::Script(self.directory_spend_script)
    }

    pub fn coordinator_credential(&self) -> Credential {
        Credential::Script(self.programmable_logic_global)
    }
}
