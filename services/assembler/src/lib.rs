//! Transaction Assembler
//!
//! Builds unsigned transactions for programmable token operations from a
//! request and the indexer's mirror. Substandard handlers contribute the
//! token-specific parts; the assembler owns input selection, change, the
//! registry proofs and the coordinator invocation.
//!
//! # Modules
//! - `fragment`: Composable partial transactions with late-bound redeemers
//! - `substandard`: Capability trait, built-in substandards and their registry
//! - `nodes`: Sorted list node split and unlink fragments
//! - `selection`: Candidate ordering and change settlement
//! - `address`: Owner credential and programmable address derivation
//! - `requests`: Operation requests
//! - `builder`: The assembler itself

pub mod address;
pub mod builder;
pub mod errors;
pub mod fragment;
pub mod nodes;
pub mod requests;
pub mod selection;
pub mod substandard;

pub use builder::TransactionAssembler;
pub use errors::{AssemblyError, SubstandardError};
pub use fragment::TxFragment;
pub use requests::{BurnRequest, ListRequest, MintRequest, RegisterRequest, SeizeRequest, TransferRequest};
pub use selection::SelectionConfig;
pub use substandard::{Capability, Substandard, SubstandardRegistry, SubstandardScripts};

#[cfg(test)]
pub(crate) mod testing {
    use contracts::bootstrap::{ProtocolBootstrapParams, ReferenceScripts};
    use contracts::registry::DirectoryEntry;
    use indexer::IndexerState;
    use types::address::{Address, Credential};
    use types::ids::{KeyHash, OutputRef, PolicyId, ScriptHash, TxId};
    use types::network::Network;
    use types::tx::{TxOutput, Utxo};
    use types::value::Value;

    use crate::selection::SelectionConfig;

    pub const POLICY: PolicyId = PolicyId::new([0x42; 28]);
    pub const DUMMY_TRANSFER_LOGIC: ScriptHash = ScriptHash::new([0x71; 28]);
    pub const DUMMY_ISSUER_LOGIC: ScriptHash = ScriptHash::new([0x72; 28]);

    pub fn params() -> ProtocolBootstrapParams {
        let r = |i: u32| OutputRef::new(TxId::new([0xee; 32]), i);
        ProtocolBootstrapParams {
            genesis_tx: TxId::new([0xee; 32]),
            network: Network::Preview,
            protocol_params_ref: r(0),
            directory_node_policy: PolicyId::new([0xd0; 28]),
            directory_spend_script: ScriptHash::new([0xd1; 28]),
            programmable_logic_base: ScriptHash::new([0xb0; 28]),
            programmable_logic_global: ScriptHash::new([0x90; 28]),
            reference_scripts: ReferenceScripts {
                directory_spend: r(1),
                directory_mint: r(2),
                logic_base: r(3),
                logic_global: r(4),
            },
        }
    }

    /// Key-based base address owned by `b`
    pub fn wallet(b: u8) -> Address {
        let key = Credential::Key(KeyHash::new([b; 28]));
        Address::new(0, key, Some(key))
    }

    pub fn wallet_utxo(tx: u8, owner: u8, lovelace: u64) -> Utxo {
        Utxo::new(
            OutputRef::new(TxId::new([tx; 32]), 0),
            TxOutput::new(wallet(owner), Value::lovelace(lovelace)),
        )
    }

    pub fn context_parts() -> (IndexerState, DirectoryEntry, SelectionConfig) {
        (
            IndexerState::default(),
            DirectoryEntry::new(DUMMY_TRANSFER_LOGIC, DUMMY_ISSUER_LOGIC),
            SelectionConfig::default(),
        )
    }
}
