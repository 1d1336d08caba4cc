//! Indexer projections
//!
//! [`IndexerState`] holds every table the indexer owns: the balance log, the
//! token registration mirror and the mirror of on-chain list nodes. All maps
//! are ordered so that the bincode encoding, and hence [`IndexerState::state_hash`],
//! is a pure function of the ingested events.

use contracts::blacklist::{CredentialList, ListNode};
use contracts::errors::RegistryError;
use contracts::linked_list::{Node, SortedList};
use contracts::registry::{DirectoryEntry, Registry};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use types::address::Address;
use types::ids::{AssetName, OutputRef, PolicyId, TxId};
use types::tx::Utxo;
use types::value::Value;

use crate::balance::BalanceLogEntry;
use crate::errors::IndexerError;
use crate::events::ChainPoint;

/// Routing record created when a token joins the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRegistration {
    pub policy_id: PolicyId,
    pub substandard_id: String,
    /// Empty until the policy is first minted
    pub asset_name: AssetName,
    pub tx_id: TxId,
    pub created: ChainPoint,
    pub named_at: Option<ChainPoint>,
}

/// Which sorted list a mirrored node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeList {
    Registry,
    /// Deny or allow list identified by its node policy
    Credentials(PolicyId),
}

/// Mirror of one on-chain list node output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub list: NodeList,
    pub utxo: Utxo,
    #[serde(with = "hex::serde")]
    pub key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub next: Vec<u8>,
    pub entry: Option<DirectoryEntry>,
    pub created: ChainPoint,
    pub spent: Option<ChainPoint>,
}

impl NodeRecord {
    pub fn is_live(&self) -> bool {
        self.spent.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerState {
    /// Per address, ordered by chain point
    pub balance_log: BTreeMap<Address, Vec<BalanceLogEntry>>,
    pub tokens: BTreeMap<PolicyId, TokenRegistration>,
    pub nodes: BTreeMap<OutputRef, NodeRecord>,
    /// Transactions that produced at least one row
    pub applied: BTreeMap<TxId, ChainPoint>,
    pub cursor: Option<ChainPoint>,
}

/// Counts of what a rollback deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackSummary {
    pub balance_rows: usize,
    pub tokens: usize,
    pub nodes_removed: usize,
    pub nodes_unspent: usize,
}

impl IndexerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// SHA-256 over the bincode encoding, hex encoded
    pub fn state_hash(&self) -> Result<String, IndexerError> {
        let bytes = bincode::serialize(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    // ── Balance queries ─────────────────────────────────────────────

    pub fn latest_entry(&self, address: &Address) -> Option<&BalanceLogEntry> {
        self.balance_log.get(address).and_then(|rows| rows.last())
    }

    pub fn latest_balance(&self, address: &Address) -> Option<&Value> {
        self.latest_entry(address).map(|e| &e.balance_snapshot)
    }

    pub fn history(&self, address: &Address) -> &[BalanceLogEntry] {
        self.balance_log.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_entry(&self, address: &Address, tx_id: &TxId) -> bool {
        self.history(address).iter().any(|e| &e.tx_id == tx_id)
    }

    /// Rows for every address with the given stake credential hash, newest first
    pub fn history_by_stake(&self, stake_hash: &str, limit: usize) -> Vec<&BalanceLogEntry> {
        let mut rows: Vec<&BalanceLogEntry> = self
            .balance_log
            .values()
            .flatten()
            .filter(|e| e.stake_credential_hash.as_deref() == Some(stake_hash))
            .collect();
        rows.sort_by(|a, b| b.point().cmp(&a.point()).then_with(|| a.address.cmp(&b.address)));
        rows.truncate(limit);
        rows
    }

    pub fn row_count(&self) -> usize {
        self.balance_log.values().map(Vec::len).sum()
    }

    // ── Registry mirror ─────────────────────────────────────────────

    pub fn token(&self, policy: &PolicyId) -> Option<&TokenRegistration> {
        self.tokens.get(policy)
    }

    pub fn live_nodes(&self, list: NodeList) -> impl Iterator<Item = &NodeRecord> {
        self.nodes
            .values()
            .filter(move |r| r.list == list && r.is_live())
    }

    /// Live registry node holding `key`
    pub fn registry_node(&self, key: &[u8]) -> Option<&NodeRecord> {
        self.live_nodes(NodeList::Registry).find(|r| r.key == key)
    }

    /// Live registry node whose range covers `key`
    pub fn covering_registry_node(&self, key: &[u8]) -> Option<&NodeRecord> {
        self.live_nodes(NodeList::Registry)
            .find(|r| r.key.as_slice() < key && key < r.next.as_slice())
    }

    /// Rebuild the registry from live mirrored nodes
    pub fn registry(&self) -> Result<Registry, RegistryError> {
        SortedList::from_nodes(self.live_nodes(NodeList::Registry).map(|r| {
            Node::new(
                r.key.clone(),
                r.next.clone(),
                r.entry.clone().unwrap_or_else(DirectoryEntry::sentinel),
            )
        }))
    }

    pub fn credential_list(&self, policy: PolicyId) -> Result<CredentialList, RegistryError> {
        SortedList::from_nodes(
            self.live_nodes(NodeList::Credentials(policy))
                .map(|r| ListNode::new(r.key.clone(), r.next.clone(), ())),
        )
    }

    // ── Rollback ────────────────────────────────────────────────────

    /// Delete everything recorded at or after `slot`
    pub fn truncate_from(&mut self, slot: u64) -> RollbackSummary {
        let mut summary = RollbackSummary::default();

        for rows in self.balance_log.values_mut() {
            let keep = rows.partition_point(|e| e.slot < slot);
            summary.balance_rows += rows.len() - keep;
            rows.truncate(keep);
        }
        self.balance_log.retain(|_, rows| !rows.is_empty());

        let before = self.tokens.len();
        self.tokens.retain(|_, t| t.created.slot < slot);
        summary.tokens = before - self.tokens.len();
        for token in self.tokens.values_mut() {
            if token.named_at.is_some_and(|p| p.slot >= slot) {
                token.asset_name = AssetName::default();
                token.named_at = None;
            }
        }

        let before = self.nodes.len();
        self.nodes.retain(|_, r| r.created.slot < slot);
        summary.nodes_removed = before - self.nodes.len();
        for record in self.nodes.values_mut() {
            if record.spent.is_some_and(|p| p.slot >= slot) {
                record.spent = None;
                summary.nodes_unspent += 1;
            }
        }

        self.applied.retain(|_, p| p.slot < slot);
        self.cursor = self.applied.values().max().copied();
        summary
    }
}
