//! End-to-end indexer tests
//!
//! Drives the indexer with a register → mint → transfer history:
//! - Documented snapshots and diffs per address
//! - Duplicate and out-of-order handling
//! - Rollback then re-ingest reproduces the state hash
//! - Snapshot + journal recovery matches live ingestion
//! - Balance log chain property over random histories

use contracts::bootstrap::{ProtocolBootstrapParams, ReferenceScripts};
use contracts::registry::{empty_registry, encode_node, marker_name, DirectoryEntry};
use indexer::balance::TxKind;
use indexer::errors::IndexerError;
use indexer::journal::JournalConfig;
use indexer::recovery::{rebuild, JournaledIndexer, RecoveryError};
use indexer::snapshot::SnapshotConfig;
use indexer::{ChainPoint, Indexer, IndexerConfig, IngestOutcome, LedgerEvent, ObservedTx};
use proptest::prelude::*;
use rust_decimal::Decimal;
use tempfile::TempDir;
use types::address::{Address, Credential};
use types::ids::{AssetName, KeyHash, OutputRef, PolicyId, ScriptHash, TxId};
use types::network::Network;
use types::tx::{TxOutput, Utxo};
use types::value::{Unit, Value, ValueDiff};

const TRANSFER_LOGIC: ScriptHash = ScriptHash::new([0x71; 28]);
const ISSUER_LOGIC: ScriptHash = ScriptHash::new([0x72; 28]);
const POLICY: PolicyId = PolicyId::new([0x42; 28]);

fn params() -> ProtocolBootstrapParams {
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

fn config() -> IndexerConfig {
    IndexerConfig::new(params()).with_substandard(TRANSFER_LOGIC, "dummy")
}

fn token() -> Unit {
    Unit::asset(POLICY, AssetName::from_label("TKN").unwrap())
}

fn holder(b: u8) -> Address {
    params().programmable_address(Credential::Key(KeyHash::new([b; 28])))
}

fn wallet() -> Address {
    Address::new(0, Credential::Key(KeyHash::new([0x99; 28])), None)
}

fn tx(id: u8, slot: u64, inputs: Vec<Utxo>, outputs: Vec<TxOutput>, mint: ValueDiff) -> ObservedTx {
    ObservedTx {
        point: ChainPoint::new(slot, slot, 0),
        tx_id: TxId::new([id; 32]),
        inputs,
        outputs,
        mint,
    }
}

fn created(tx: &ObservedTx, index: usize) -> Utxo {
    Utxo::new(tx.output_ref(index), tx.outputs[index].clone())
}

fn node_output(node: &contracts::registry::RegistryNode) -> TxOutput {
    let p = params();
    TxOutput::new(
        p.directory_address(),
        Value::lovelace(1_500_000).with(Unit::asset(p.directory_node_policy, marker_name(&node.key).unwrap()), 1),
    )
    .with_datum(encode_node(node))
}

fn funding(id: u8) -> Utxo {
    Utxo::new(
        OutputRef::new(TxId::new([id; 32]), 0),
        TxOutput::new(wallet(), Value::lovelace(50_000_000)),
    )
}

/// Genesis, registration, mint 1000 to A, transfer 400 from A to B
fn history() -> Vec<ObservedTx> {
    let mut registry = empty_registry();
    let head = registry.head().unwrap().clone();
    let genesis = tx(1, 10, vec![funding(0xf1)], vec![node_output(&head)], ValueDiff::new());

    let (pred, new) = registry
        .insert(POLICY.as_bytes(), DirectoryEntry::new(TRANSFER_LOGIC, ISSUER_LOGIC))
        .unwrap();
    let mut marker = ValueDiff::new();
    marker
        .add_amount(
            Unit::asset(params().directory_node_policy, marker_name(&new.key).unwrap()),
            Decimal::ONE,
        )
        .unwrap();
    let register = tx(
        2,
        20,
        vec![created(&genesis, 0), funding(0xf2)],
        vec![node_output(&pred), node_output(&new)],
        marker,
    );

    let mut minted = ValueDiff::new();
    minted.add_amount(token(), Decimal::from(1000)).unwrap();
    let mint = tx(
        3,
        30,
        vec![funding(0xf3)],
        vec![TxOutput::new(holder(0xa1), Value::lovelace(2_000_000).with(token(), 1000))],
        minted,
    );

    let transfer = tx(
        4,
        40,
        vec![created(&mint, 0)],
        vec![
            TxOutput::new(holder(0xb1), Value::lovelace(1_000_000).with(token(), 400)),
            TxOutput::new(holder(0xa1), Value::lovelace(800_000).with(token(), 600)),
        ],
        ValueDiff::new(),
    );

    vec![genesis, register, mint, transfer]
}

fn ingest_all(indexer: &mut Indexer, txs: &[ObservedTx]) {
    for t in txs {
        indexer.ingest(&LedgerEvent::Transaction(t.clone())).unwrap();
    }
}

// ═══════════════════════════════════════════════════════════════════
// Scenario
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_register_mint_transfer_snapshots() {
    let mut indexer = Indexer::new(config());
    let txs = history();

    indexer.ingest(&LedgerEvent::Transaction(txs[0].clone())).unwrap();
    let outcome = indexer.ingest(&LedgerEvent::Transaction(txs[1].clone())).unwrap();
    assert!(matches!(outcome, IngestOutcome::Applied { ref registered, .. } if registered == &vec![POLICY]));
    ingest_all(&mut indexer, &txs[2..]);

    let state = indexer.state();
    let token_row = state.token(&POLICY).unwrap();
    assert_eq!(token_row.substandard_id, "dummy");
    assert_eq!(token_row.asset_name, AssetName::from_label("TKN").unwrap());

    let a = state.history(&holder(0xa1));
    assert_eq!(a.len(), 2);
    assert_eq!(a[0].tx_kind, TxKind::Mint);
    assert_eq!(a[0].balance_snapshot, Value::lovelace(2_000_000).with(token(), 1000));
    assert_eq!(a[0].balance_diff.get(&token()), Decimal::from(1000));
    assert_eq!(a[1].tx_kind, TxKind::Transfer);
    assert_eq!(a[1].balance_snapshot, Value::lovelace(800_000).with(token(), 600));
    assert_eq!(a[1].balance_diff.get(&token()), Decimal::from(-400));
    assert_eq!(a[1].balance_diff.get(&Unit::Lovelace), Decimal::from(-1_200_000));

    let b = state.latest_entry(&holder(0xb1)).unwrap();
    assert_eq!(b.balance_snapshot, Value::lovelace(1_000_000).with(token(), 400));
    assert_eq!(b.balance_diff, ValueDiff::from(Value::lovelace(1_000_000).with(token(), 400)));
    assert_eq!(b.stake_credential_hash.as_deref(), Some("b1".repeat(28).as_str()));

    let directory = state.history(&params().directory_address());
    assert_eq!(directory.len(), 2);
    assert_eq!(directory[1].tx_kind, TxKind::Register);

    let registry = state.registry().unwrap();
    assert!(registry.contains(POLICY.as_bytes()));
    registry.verify_chain().unwrap();
    assert!(state.registry_node(POLICY.as_bytes()).is_some());
    assert_eq!(
        state.covering_registry_node(&[0x43; 28]).unwrap().key,
        POLICY.as_bytes().to_vec()
    );
}

#[test]
fn test_wallet_outputs_are_ignored_unless_watched() {
    let payment = tx(
        9,
        50,
        vec![],
        vec![TxOutput::new(wallet(), Value::lovelace(49_000_000))],
        ValueDiff::new(),
    );
    let mut indexer = Indexer::new(config());
    assert_eq!(
        indexer.ingest(&LedgerEvent::Transaction(payment.clone())).unwrap(),
        IngestOutcome::Ignored
    );
    assert_eq!(indexer.cursor(), None);

    let mut watching = Indexer::new(config().watch(wallet()));
    let outcome = watching.ingest(&LedgerEvent::Transaction(payment)).unwrap();
    assert!(matches!(outcome, IngestOutcome::Applied { entries: 1, .. }));
}

// ═══════════════════════════════════════════════════════════════════
// Ordering and idempotency
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_duplicate_is_absorbed() {
    let mut indexer = Indexer::new(config());
    let txs = history();
    ingest_all(&mut indexer, &txs);
    let before = indexer.state().state_hash().unwrap();

    for t in &txs {
        let outcome = indexer.ingest(&LedgerEvent::Transaction(t.clone())).unwrap();
        assert_eq!(outcome, IngestOutcome::Duplicate);
    }
    assert_eq!(indexer.state().state_hash().unwrap(), before);
}

#[test]
fn test_event_behind_cursor_rejected() {
    let mut indexer = Indexer::new(config());
    ingest_all(&mut indexer, &history());

    let late = tx(
        7,
        25,
        vec![funding(0xf7)],
        vec![TxOutput::new(holder(0xc1), Value::lovelace(1_000_000))],
        ValueDiff::new(),
    );
    let before = indexer.state().clone();
    let err = indexer.ingest(&LedgerEvent::Transaction(late)).unwrap_err();
    assert!(matches!(err, IndexerError::OutOfOrder { .. }));
    assert_eq!(indexer.state(), &before);
}

#[test]
fn test_failed_event_leaves_state_untouched() {
    let mut indexer = Indexer::new(config());
    let txs = history();
    ingest_all(&mut indexer, &txs[..3]);
    let before = indexer.state().clone();

    // Spends more from A than A was ever credited
    let overdraw = tx(
        8,
        60,
        vec![Utxo::new(
            OutputRef::new(TxId::new([0x77; 32]), 0),
            TxOutput::new(holder(0xa1), Value::lovelace(9_000_000)),
        )],
        vec![TxOutput::new(holder(0xb1), Value::lovelace(9_000_000))],
        ValueDiff::new(),
    );
    let err = indexer.ingest(&LedgerEvent::Transaction(overdraw)).unwrap_err();
    assert!(matches!(err, IndexerError::NegativeBalance { .. }));
    assert_eq!(indexer.state(), &before);
}

// ═══════════════════════════════════════════════════════════════════
// Rollback
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_rollback_then_reingest_reproduces_hash() {
    let txs = history();
    let mut indexer = Indexer::new(config());
    ingest_all(&mut indexer, &txs);
    let full_hash = indexer.state().state_hash().unwrap();

    let outcome = indexer.ingest(&LedgerEvent::RolledBack { slot: 20 }).unwrap();
    let IngestOutcome::RolledBack(summary) = outcome else {
        panic!("expected rollback outcome, got {:?}", outcome);
    };
    assert_eq!(summary.tokens, 1);
    assert!(summary.nodes_unspent >= 1);

    let state = indexer.state();
    assert!(state.balance_log.values().flatten().all(|e| e.slot < 20));
    assert!(state.token(&POLICY).is_none());
    assert_eq!(state.cursor, Some(ChainPoint::new(10, 10, 0)));
    assert!(!state.registry().unwrap().contains(POLICY.as_bytes()));

    ingest_all(&mut indexer, &txs[1..]);
    assert_eq!(indexer.state().state_hash().unwrap(), full_hash);
}

#[test]
fn test_rollback_clears_late_asset_name() {
    let txs = history();
    let mut indexer = Indexer::new(config());
    ingest_all(&mut indexer, &txs);

    indexer.ingest(&LedgerEvent::RolledBack { slot: 30 }).unwrap();
    let token_row = indexer.state().token(&POLICY).unwrap();
    assert!(token_row.asset_name.is_empty());
    assert!(indexer.state().history(&holder(0xa1)).is_empty());
}

// ═══════════════════════════════════════════════════════════════════
// Journal and recovery
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_journal_rebuild_matches_live_state() {
    let dir = TempDir::new().unwrap();
    let txs = history();
    let live_hash = {
        let (mut journaled, report) =
            JournaledIndexer::open(config(), JournalConfig::new(dir.path().join("journal")), None).unwrap();
        assert_eq!(report.replayed, 0);
        for t in &txs {
            journaled.ingest(&LedgerEvent::Transaction(t.clone())).unwrap();
        }
        // Duplicates are not journaled
        journaled.ingest(&LedgerEvent::Transaction(txs[3].clone())).unwrap();
        journaled.state().state_hash().unwrap()
    };

    let (rebuilt, report) = rebuild(config(), &dir.path().join("journal"), Some(&live_hash)).unwrap();
    assert_eq!(report.replayed, 4);
    assert_eq!(report.final_sequence, 4);
    assert_eq!(rebuilt.state().state_hash().unwrap(), live_hash);
}

#[test]
fn test_failed_journal_write_leaves_state_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("journal");
    let moved = dir.path().join("moved");
    let mut journal = JournalConfig::new(&path);
    // Every append after the first rotates into a new file under `path`
    journal.max_file_size = 1;

    let txs = history();
    let (mut journaled, _) = JournaledIndexer::open(config(), journal, None).unwrap();
    journaled.ingest(&LedgerEvent::Transaction(txs[0].clone())).unwrap();
    let before = journaled.state().state_hash().unwrap();

    std::fs::rename(&path, &moved).unwrap();
    let err = journaled.ingest(&LedgerEvent::Transaction(txs[1].clone())).unwrap_err();
    assert!(matches!(err, RecoveryError::Journal(_)));
    assert_eq!(journaled.state().state_hash().unwrap(), before);
    assert_eq!(journaled.indexer().cursor(), Some(txs[0].point));
    assert!(journaled.state().token(&POLICY).is_none());

    // The retried event lands in both the journal and memory
    std::fs::rename(&moved, &path).unwrap();
    journaled.ingest(&LedgerEvent::Transaction(txs[1].clone())).unwrap();
    let live = journaled.state().state_hash().unwrap();
    let (rebuilt, report) = rebuild(config(), &path, Some(&live)).unwrap();
    assert_eq!(report.replayed, 2);
    assert_eq!(rebuilt.state().state_hash().unwrap(), live);
}

#[test]
fn test_snapshot_recovery_replays_tail() {
    let dir = TempDir::new().unwrap();
    let journal = JournalConfig::new(dir.path().join("journal"));
    let mut snapshots = SnapshotConfig::new(dir.path().join("snapshots"));
    snapshots.event_interval = 2;

    let txs = history();
    let live_hash = {
        let (mut journaled, _) =
            JournaledIndexer::open(config(), journal.clone(), Some(snapshots.clone())).unwrap();
        for t in &txs[..3] {
            journaled.ingest(&LedgerEvent::Transaction(t.clone())).unwrap();
        }
        journaled.state().state_hash().unwrap()
    };

    let (mut reopened, report) = JournaledIndexer::open(config(), journal, Some(snapshots)).unwrap();
    assert_eq!(report.snapshot_sequence, 2);
    assert_eq!(report.replayed, 1);
    assert_eq!(report.state_hash, live_hash);

    reopened.ingest(&LedgerEvent::Transaction(txs[3].clone())).unwrap();
    assert_eq!(
        reopened.state().latest_balance(&holder(0xb1)),
        Some(&Value::lovelace(1_000_000).with(token(), 400))
    );
}

// ═══════════════════════════════════════════════════════════════════
// Properties
// ═══════════════════════════════════════════════════════════════════

proptest! {
    /// Each row equals the previous row plus its diff, and the latest row
    /// equals the sum of the address's unspent outputs.
    #[test]
    fn prop_previous_plus_diff_is_current(steps in prop::collection::vec((1u64..5_000_000, any::<bool>()), 1..40)) {
        let target = wallet();
        let mut indexer = Indexer::new(config().watch(target));
        let mut unspent: Vec<Utxo> = Vec::new();

        for (i, (amount, spend)) in steps.iter().enumerate() {
            let inputs = if *spend && !unspent.is_empty() {
                vec![unspent.remove(0)]
            } else {
                vec![]
            };
            let observed = tx_n(i as u32, inputs, TxOutput::new(target, Value::lovelace(*amount)));
            unspent.push(created(&observed, 0));
            indexer.ingest(&LedgerEvent::Transaction(observed)).unwrap();
        }

        let rows = indexer.state().history(&target);
        prop_assert_eq!(rows.len(), steps.len());
        for pair in rows.windows(2) {
            let rebuilt = pair[0].balance_snapshot.apply(&pair[1].balance_diff).unwrap();
            prop_assert_eq!(&rebuilt, &pair[1].balance_snapshot);
        }
        let total: Decimal = unspent.iter().map(|u| u.value().coin()).sum();
        prop_assert_eq!(rows.last().unwrap().balance_snapshot.coin(), total);
    }
}

fn tx_n(n: u32, inputs: Vec<Utxo>, output: TxOutput) -> ObservedTx {
    let mut id = [0u8; 32];
    id[..4].copy_from_slice(&n.to_be_bytes());
    id[31] = 0x5e;
    ObservedTx {
        point: ChainPoint::new(u64::from(n) + 1, u64::from(n) + 1, 0),
        tx_id: TxId::new(id),
        inputs,
        outputs: vec![output],
        mint: ValueDiff::new(),
    }
}
