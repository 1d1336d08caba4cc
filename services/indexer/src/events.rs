//! Ledger events consumed by the indexer
//!
//! The chain follower turns blocks into a stream of [`LedgerEvent`]s in block
//! order. Transaction inputs arrive resolved (with the outputs they spend) so
//! balance deltas can be computed without a UTxO lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use types::ids::{OutputRef, TxId};
use types::tx::{TxOutput, Utxo};
use types::value::ValueDiff;

/// Position of a transaction in the chain
///
/// Events are totally ordered by `(slot, block_height, tx_index)`, which also
/// settles which of two same-slot registrations spent a covering node first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainPoint {
    pub slot: u64,
    pub block_height: u64,
    pub tx_index: u32,
}

impl ChainPoint {
    pub fn new(slot: u64, block_height: u64, tx_index: u32) -> Self {
        Self {
            slot,
            block_height,
            tx_index,
        }
    }
}

impl fmt::Display for ChainPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.slot, self.block_height, self.tx_index)
    }
}

/// A confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedTx {
    pub point: ChainPoint,
    pub tx_id: TxId,
    /// Spent inputs with the outputs they consumed
    pub inputs: Vec<Utxo>,
    /// Created outputs; output `i` is `tx_id#i`
    pub outputs: Vec<TxOutput>,
    #[serde(default)]
    pub mint: ValueDiff,
}

impl ObservedTx {
    pub fn output_ref(&self, index: usize) -> OutputRef {
        OutputRef::new(self.tx_id, index as u32)
    }

    /// Created outputs paired with their references
    pub fn created(&self) -> impl Iterator<Item = Utxo> + '_ {
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, o)| Utxo::new(self.output_ref(i), o.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedgerEvent {
    Transaction(ObservedTx),
    /// Chain switched forks: everything at or after `slot` is void
    RolledBack { slot: u64 },
}

impl LedgerEvent {
    /// Label stored in the journal entry header
    pub fn event_type_label(&self) -> &'static str {
        match self {
            LedgerEvent::Transaction(_) => "Transaction",
            LedgerEvent::RolledBack { .. } => "RolledBack",
        }
    }

    pub fn slot(&self) -> u64 {
        match self {
            LedgerEvent::Transaction(tx) => tx.point.slot,
            LedgerEvent::RolledBack { slot } => *slot,
        }
    }
}
