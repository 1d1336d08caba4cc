//! Event ingestion
//!
//! Single-writer state machine over [`IndexerState`]. Each transaction is
//! filtered to tracked addresses and list nodes, all resulting rows are
//! computed against the current state, and only then committed, so a failed
//! event leaves the state untouched.
//!
//! Ordering rules:
//! - an event whose transaction was already applied is a duplicate
//! - an event at the cursor is a duplicate
//! - an event behind the cursor is rejected as out of order
//! - a rollback to slot `S` deletes everything at or after `S`

use contracts::blacklist::list_node_from_output;
use contracts::bootstrap::ProtocolBootstrapParams;
use contracts::registry::{node_from_output, node_policy, DirectoryEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};
use types::address::Address;
use types::ids::{AssetName, OutputRef, PolicyId, ScriptHash};
use types::value::Unit;

use crate::balance::{address_deltas, BalanceLogEntry, TxKind};
use crate::errors::IndexerError;
use crate::events::{ChainPoint, LedgerEvent, ObservedTx};
use crate::store::{IndexerState, NodeList, NodeRecord, RollbackSummary, TokenRegistration};

/// Substandard id recorded for transfer logic no handler claims
pub const UNKNOWN_SUBSTANDARD: &str = "unknown";

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerConfig {
    pub params: ProtocolBootstrapParams,
    /// Transfer logic script hash → substandard id
    #[serde(default)]
    pub substandards: BTreeMap<ScriptHash, String>,
    /// Non-programmable addresses to log balances for
    #[serde(default)]
    pub watched: BTreeSet<Address>,
    /// Node policies of deny/allow lists to mirror
    #[serde(default)]
    pub credential_lists: BTreeSet<PolicyId>,
}

impl IndexerConfig {
    pub fn new(params: ProtocolBootstrapParams) -> Self {
        Self {
            params,
            substandards: BTreeMap::new(),
            watched: BTreeSet::new(),
            credential_lists: BTreeSet::new(),
        }
    }

    pub fn with_substandard(mut self, transfer_logic: ScriptHash, id: impl Into<String>) -> Self {
        self.substandards.insert(transfer_logic, id.into());
        self
    }

    pub fn watch(mut self, address: Address) -> Self {
        self.watched.insert(address);
        self
    }

    pub fn with_credential_list(mut self, policy: PolicyId) -> Self {
        self.credential_lists.insert(policy);
        self
    }

    pub fn is_tracked(&self, address: &Address) -> bool {
        self.params.is_programmable(address)
            || self.params.is_directory(address)
            || self.watched.contains(address)
    }

    fn substandard_for(&self, entry: &DirectoryEntry) -> String {
        self.substandards
            .get(&entry.transfer_logic)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_SUBSTANDARD.to_string())
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Applied {
        entries: usize,
        registered: Vec<PolicyId>,
    },
    /// Already ingested; absorbed without changes
    Duplicate,
    /// Touches nothing the indexer tracks
    Ignored,
    RolledBack(RollbackSummary),
}

/// Everything a transaction changes, computed before anything is written
#[derive(Default)]
struct PendingChanges {
    entries: Vec<BalanceLogEntry>,
    created: Vec<NodeRecord>,
    spent: Vec<OutputRef>,
    registrations: Vec<TokenRegistration>,
    names: Vec<(PolicyId, AssetName)>,
}

impl PendingChanges {
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
            && self.created.is_empty()
            && self.spent.is_empty()
            && self.names.is_empty()
    }
}

/// An event checked against the state it was prepared on
pub struct Planned<'e>(Step<'e>);

enum Step<'e> {
    Skip(IngestOutcome),
    Apply(&'e ObservedTx, PendingChanges),
    Rollback(u64),
}

impl Planned<'_> {
    /// Whether committing changes the state; only these events are journaled
    pub fn changes_state(&self) -> bool {
        !matches!(self.0, Step::Skip(_))
    }
}

// ── Indexer ─────────────────────────────────────────────────────────

pub struct Indexer {
    config: IndexerConfig,
    state: IndexerState,
}

impl Indexer {
    pub fn new(config: IndexerConfig) -> Self {
        Self::with_state(config, IndexerState::new())
    }

    /// Resume from a recovered state
    pub fn with_state(config: IndexerConfig, state: IndexerState) -> Self {
        Self { config, state }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn state(&self) -> &IndexerState {
        &self.state
    }

    pub fn into_state(self) -> IndexerState {
        self.state
    }

    pub fn cursor(&self) -> Option<ChainPoint> {
        self.state.cursor
    }

    pub fn ingest(&mut self, event: &LedgerEvent) -> Result<IngestOutcome, IndexerError> {
        let planned = self.prepare(event)?;
        Ok(self.commit(planned))
    }

    /// Check `event` against the current state without changing it
    ///
    /// The result must be committed before any other event is prepared.
    pub fn prepare<'e>(&self, event: &'e LedgerEvent) -> Result<Planned<'e>, IndexerError> {
        match event {
            LedgerEvent::Transaction(tx) => self.prepare_tx(tx),
            LedgerEvent::RolledBack { slot } => Ok(Planned(Step::Rollback(*slot))),
        }
    }

    /// Apply a prepared event
    pub fn commit(&mut self, planned: Planned<'_>) -> IngestOutcome {
        match planned.0 {
            Step::Skip(outcome) => outcome,
            Step::Apply(tx, changes) => self.apply(tx, changes),
            Step::Rollback(slot) => {
                let summary = self.state.truncate_from(slot);
                warn!(
                    slot,
                    balance_rows = summary.balance_rows,
                    tokens = summary.tokens,
                    nodes_removed = summary.nodes_removed,
                    nodes_unspent = summary.nodes_unspent,
                    "Rollback applied"
                );
                IngestOutcome::RolledBack(summary)
            }
        }
    }

    fn prepare_tx<'e>(&self, tx: &'e ObservedTx) -> Result<Planned<'e>, IndexerError> {
        if self.state.applied.contains_key(&tx.tx_id) {
            debug!(tx_id = %tx.tx_id, "Duplicate transaction skipped");
            return Ok(Planned(Step::Skip(IngestOutcome::Duplicate)));
        }

        let planned = self.plan(tx);
        if planned.as_ref().is_ok_and(PendingChanges::is_empty) {
            return Ok(Planned(Step::Skip(IngestOutcome::Ignored)));
        }

        if let Some(cursor) = self.state.cursor {
            if tx.point == cursor {
                debug!(tx_id = %tx.tx_id, point = %tx.point, "Event at cursor skipped");
                return Ok(Planned(Step::Skip(IngestOutcome::Duplicate)));
            }
            if tx.point < cursor {
                return Err(IndexerError::OutOfOrder {
                    point: tx.point,
                    cursor,
                });
            }
        }

        Ok(Planned(Step::Apply(tx, planned?)))
    }

    /// Compute the rows and mirror updates of `tx` without touching state
    fn plan(&self, tx: &ObservedTx) -> Result<PendingChanges, IndexerError> {
        let mut changes = PendingChanges::default();
        let params = &self.config.params;

        changes.spent = tx
            .inputs
            .iter()
            .filter(|u| self.state.nodes.get(&u.out_ref).is_some_and(NodeRecord::is_live))
            .map(|u| u.out_ref)
            .collect();
        let spent_keys: BTreeSet<&[u8]> = changes
            .spent
            .iter()
            .filter_map(|r| self.state.nodes.get(r))
            .filter(|r| r.list == NodeList::Registry)
            .map(|r| r.key.as_slice())
            .collect();

        for utxo in tx.created() {
            if params.is_directory(&utxo.output.address)
                && utxo.output.value.policies().contains(&params.directory_node_policy)
            {
                let node = match node_from_output(&utxo.output, &params.directory_node_policy) {
                    Ok(node) => node,
                    Err(e) => {
                        warn!(out_ref = %utxo.out_ref, error = %e, "Registry node rejected");
                        continue;
                    }
                };
                if !node.is_head() && !spent_keys.contains(node.key.as_slice()) {
                    let policy_id = node_policy(&node)?;
                    if !self.state.tokens.contains_key(&policy_id) {
                        changes.registrations.push(TokenRegistration {
                            policy_id,
                            substandard_id: self.config.substandard_for(&node.payload),
                            asset_name: AssetName::default(),
                            tx_id: tx.tx_id,
                            created: tx.point,
                            named_at: None,
                        });
                    }
                }
                changes.created.push(NodeRecord {
                    list: NodeList::Registry,
                    entry: (!node.is_head()).then(|| node.payload.clone()),
                    key: node.key,
                    next: node.next,
                    utxo,
                    created: tx.point,
                    spent: None,
                });
                continue;
            }
            for policy in &self.config.credential_lists {
                if !utxo.output.value.policies().contains(policy) {
                    continue;
                }
                match list_node_from_output(&utxo.output, policy) {
                    Ok(node) => changes.created.push(NodeRecord {
                        list: NodeList::Credentials(*policy),
                        key: node.key.clone(),
                        next: node.next.clone(),
                        entry: None,
                        utxo: utxo.clone(),
                        created: tx.point,
                        spent: None,
                    }),
                    Err(e) => warn!(out_ref = %utxo.out_ref, error = %e, "Undecodable list node ignored"),
                }
            }
        }

        // The first mint of a registered policy names its token
        let mut named: BTreeSet<PolicyId> = BTreeSet::new();
        for (unit, amount) in tx.mint.iter() {
            let Unit::Asset { policy, name } = unit else {
                continue;
            };
            if !amount.is_sign_positive() || amount.is_zero() || !named.insert(*policy) {
                continue;
            }
            let unnamed = match self.state.tokens.get(policy) {
                Some(t) => t.asset_name.is_empty(),
                None => changes.registrations.iter().any(|r| &r.policy_id == policy),
            };
            if unnamed {
                changes.names.push((*policy, name.clone()));
            }
        }

        let kind = TxKind::classify(tx, !changes.registrations.is_empty())?;
        let deltas = address_deltas(tx, |a| self.config.is_tracked(a))?;
        for (address, delta) in deltas {
            let previous = self.state.latest_balance(&address);
            let entry = BalanceLogEntry::next(address, previous, &delta, tx.tx_id, tx.point, kind)
                .map_err(|source| IndexerError::NegativeBalance {
                    address: address.to_hex(),
                    tx_id: tx.tx_id.to_hex(),
                    source,
                })?;
            changes.entries.push(entry);
        }

        Ok(changes)
    }

    fn apply(&mut self, tx: &ObservedTx, changes: PendingChanges) -> IngestOutcome {
        let entries = changes.entries.len();
        for entry in changes.entries {
            self.state.balance_log.entry(entry.address).or_default().push(entry);
        }
        for out_ref in changes.spent {
            if let Some(record) = self.state.nodes.get_mut(&out_ref) {
                record.spent = Some(tx.point);
            }
        }
        for record in changes.created {
            self.state.nodes.insert(record.utxo.out_ref, record);
        }
        let registered: Vec<PolicyId> = changes.registrations.iter().map(|r| r.policy_id).collect();
        for registration in changes.registrations {
            info!(
                policy_id = %registration.policy_id,
                substandard = %registration.substandard_id,
                point = %tx.point,
                "Token registered"
            );
            self.state.tokens.insert(registration.policy_id, registration);
        }
        for (policy, name) in changes.names {
            if let Some(token) = self.state.tokens.get_mut(&policy) {
                token.asset_name = name;
                token.named_at = Some(tx.point);
            }
        }
        self.state.applied.insert(tx.tx_id, tx.point);
        self.state.cursor = Some(tx.point);

        debug!(tx_id = %tx.tx_id, point = %tx.point, entries = entries, "Transaction applied");
        IngestOutcome::Applied { entries, registered }
    }
}
