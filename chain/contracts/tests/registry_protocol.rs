//! Registry and coordinator protocol tests
//!
//! End-to-end checks across modules:
//! - Registration contention on a shared covering node
//! - Registry rebuilt from on-chain datums
//! - Transfer, seize and unregistered-token flows through the coordinator
//! - Frozen sender rejected by the deny list

use contracts::blacklist::{check_not_frozen, empty_list, encode_list_node};
use contracts::bootstrap::{ProtocolBootstrapParams, ReferenceScripts};
use contracts::coordinator::{validate_transaction, GlobalRedeemer, TokenProof};
use contracts::errors::{RegistryError, ValidationError};
use contracts::linked_list::SortedList;
use contracts::registry::{decode_node, empty_registry, encode_node, marker_name, DirectoryEntry, RegistryNode};
use rust_decimal::Decimal;
use types::address::{Address, Credential};
use types::ids::{AssetName, KeyHash, OutputRef, PolicyId, ScriptHash, TxId};
use types::network::Network;
use types::plutus::PlutusData;
use types::tx::{Redeemer, RedeemerPurpose, Transaction, TxOutput, Utxo, Withdrawal};
use types::value::{Unit, Value};

fn params() -> ProtocolBootstrapParams {
    let r = |i: u32| OutputRef::new(TxId::new([0xee; 32]), i);
    ProtocolBootstrapParams {
        genesis_tx: TxId::new([0xee; 32]),
        network: Network::Preprod,
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

const TRANSFER_LOGIC: ScriptHash = ScriptHash::new([0x71; 28]);
const ISSUER_LOGIC: ScriptHash = ScriptHash::new([0x72; 28]);

fn entry() -> DirectoryEntry {
    DirectoryEntry::new(TRANSFER_LOGIC, ISSUER_LOGIC)
}

fn unit(policy: PolicyId) -> Unit {
    Unit::asset(policy, AssetName::from_label("TKN1").unwrap())
}

fn node_utxo(p: &ProtocolBootstrapParams, tag: u8, node: &RegistryNode) -> Utxo {
    let value = Value::lovelace(1_500_000).with(
        Unit::asset(p.directory_node_policy, marker_name(&node.key).unwrap()),
        1,
    );
    Utxo::new(
        OutputRef::new(TxId::new([tag; 32]), 0),
        TxOutput::new(p.directory_address(), value).with_datum(encode_node(node)),
    )
}

fn invoke(tx: &mut Transaction, script: ScriptHash, data: PlutusData) {
    let credential = Credential::Script(script);
    tx.withdrawals.push(Withdrawal {
        credential,
        amount: Decimal::ZERO,
    });
    tx.redeemers.push(Redeemer {
        purpose: RedeemerPurpose::Reward(credential),
        data,
    });
}

fn holder(b: u8) -> Credential {
    Credential::Key(KeyHash::new([b; 28]))
}

// ═══════════════════════════════════════════════════════════════════
// Registration
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_two_registrations_against_one_covering_node() {
    let mut registry = empty_registry();
    let a = PolicyId::new([0x20; 28]);
    let b = PolicyId::new([0x30; 28]);

    // Both plans see the head as covering node
    let plan_a = registry.plan_insert(a.as_bytes(), entry()).unwrap();
    let plan_b = registry.plan_insert(b.as_bytes(), entry()).unwrap();
    assert!(plan_a.covering.is_head());
    assert!(plan_b.covering.is_head());

    // Earlier event commits, later one loses the race
    registry.commit(plan_a).unwrap();
    let err = registry.commit(plan_b).unwrap_err();
    assert!(matches!(err, RegistryError::CoveringNodeSpent { .. }));

    // Retrying against the new covering node succeeds
    let (pred, new) = registry.insert(b.as_bytes(), entry()).unwrap();
    assert_eq!(pred.key, a.as_bytes().to_vec());
    assert!(new.is_last());
    registry.verify_chain().unwrap();
}

#[test]
fn test_registry_rebuilt_from_datums() {
    let mut registry = empty_registry();
    for b in [0x50u8, 0x10, 0x90] {
        registry.insert(&[b; 28], entry()).unwrap();
    }
    let datums: Vec<PlutusData> = registry.iter().map(encode_node).collect();
    let json = serde_json::to_string(&datums).unwrap();
    let parsed: Vec<PlutusData> = serde_json::from_str(&json).unwrap();
    let nodes = parsed.iter().map(decode_node).collect::<Result<Vec<_>, _>>().unwrap();
    let rebuilt = SortedList::from_nodes(nodes).unwrap();
    assert_eq!(rebuilt.len(), 3);
    assert_eq!(
        rebuilt.find_covering(&[0x60; 28]).unwrap().key,
        vec![0x50; 28]
    );
}

// ═══════════════════════════════════════════════════════════════════
// Coordinator flows
// ═══════════════════════════════════════════════════════════════════

fn transfer(p: &ProtocolBootstrapParams, policy: PolicyId, node: &RegistryNode) -> Transaction {
    let mut tx = Transaction {
        inputs: vec![Utxo::new(
            OutputRef::new(TxId::new([0x02; 32]), 1),
            TxOutput::new(
                p.programmable_address(holder(0xa1)),
                Value::lovelace(2_000_000).with(unit(policy), 1000),
            ),
        )],
        reference_inputs: vec![node_utxo(p, 0x01, node)],
        outputs: vec![
            TxOutput::new(
                p.programmable_address(holder(0xb1)),
                Value::lovelace(1_000_000).with(unit(policy), 400),
            ),
            TxOutput::new(
                p.programmable_address(holder(0xa1)),
                Value::lovelace(800_000).with(unit(policy), 600),
            ),
        ],
        fee: Decimal::from(200_000),
        ..Default::default()
    };
    tx.required_signers.insert(KeyHash::new([0xa1; 28]));
    invoke(
        &mut tx,
        p.programmable_logic_global,
        GlobalRedeemer::transfer(vec![TokenProof::Exists { node_index: 0 }]).to_plutus(),
    );
    invoke(&mut tx, TRANSFER_LOGIC, PlutusData::unit());
    tx.canonicalize();
    tx
}

#[test]
fn test_registered_transfer_balances_and_validates() {
    let p = params();
    let policy = PolicyId::new([0x42; 28]);
    let mut registry = empty_registry();
    let (_, node) = registry.insert(policy.as_bytes(), entry()).unwrap();

    let tx = transfer(&p, policy, &node);
    assert!(tx.imbalance().unwrap().is_empty());
    let report = validate_transaction(&tx, &p).unwrap();
    assert_eq!(report.registered, vec![policy]);
}

#[test]
fn test_unregistered_token_cannot_claim_membership() {
    let p = params();
    let registered = PolicyId::new([0x42; 28]);
    let stranger = PolicyId::new([0x43; 28]);
    let mut registry = empty_registry();
    let (_, node) = registry.insert(registered.as_bytes(), entry()).unwrap();

    // The stranger is covered by the registered node, not held by it
    let tx = transfer(&p, stranger, &node);
    assert!(matches!(
        validate_transaction(&tx, &p),
        Err(ValidationError::KeyMismatch { .. })
    ));
}

#[test]
fn test_seize_uses_third_party_logic_without_owner_signature() {
    let p = params();
    let policy = PolicyId::new([0x42; 28]);
    let mut registry = empty_registry();
    let (_, node) = registry.insert(policy.as_bytes(), entry()).unwrap();

    let mut tx = transfer(&p, policy, &node);
    tx.required_signers.clear();
    tx.withdrawals.clear();
    tx.redeemers.clear();
    invoke(
        &mut tx,
        p.programmable_logic_global,
        GlobalRedeemer::third_party(vec![TokenProof::Exists { node_index: 0 }]).to_plutus(),
    );
    // Without the issuer logic the seize is rejected
    assert!(matches!(
        validate_transaction(&tx, &p),
        Err(ValidationError::ThirdPartyLogicNotInvoked { .. })
    ));

    invoke(&mut tx, ISSUER_LOGIC, PlutusData::unit());
    tx.canonicalize();
    validate_transaction(&tx, &p).unwrap();
}

#[test]
fn test_third_party_act_cannot_spend_lovelace_only_holdings() {
    let p = params();
    let mut tx = Transaction {
        inputs: vec![Utxo::new(
            OutputRef::new(TxId::new([0x03; 32]), 0),
            TxOutput::new(p.programmable_address(holder(0xa1)), Value::lovelace(50_000_000)),
        )],
        outputs: vec![TxOutput::new(
            Address::new(0, holder(0xee), None),
            Value::lovelace(49_800_000),
        )],
        fee: Decimal::from(200_000),
        ..Default::default()
    };
    invoke(&mut tx, p.programmable_logic_global, GlobalRedeemer::third_party(vec![]).to_plutus());
    tx.canonicalize();
    assert!(matches!(
        validate_transaction(&tx, &p),
        Err(ValidationError::OwnerNotAuthorized { .. })
    ));

    // The owner may still move their own ada this way
    tx.required_signers.insert(KeyHash::new([0xa1; 28]));
    validate_transaction(&tx, &p).unwrap();
}

#[test]
fn test_third_party_act_does_not_clear_unregistered_policies() {
    let p = params();
    let registered = PolicyId::new([0x42; 28]);
    let stranger = PolicyId::new([0x43; 28]);
    let mut registry = empty_registry();
    let (_, node) = registry.insert(registered.as_bytes(), entry()).unwrap();

    let mut tx = Transaction {
        inputs: vec![Utxo::new(
            OutputRef::new(TxId::new([0x04; 32]), 0),
            TxOutput::new(
                p.programmable_address(holder(0xa1)),
                Value::lovelace(2_000_000).with(unit(stranger), 100),
            ),
        )],
        reference_inputs: vec![node_utxo(&p, 0x01, &node)],
        outputs: vec![TxOutput::new(
            p.programmable_address(holder(0xee)),
            Value::lovelace(1_800_000).with(unit(stranger), 100),
        )],
        fee: Decimal::from(200_000),
        ..Default::default()
    };
    invoke(
        &mut tx,
        p.programmable_logic_global,
        GlobalRedeemer::third_party(vec![TokenProof::NotRegistered { node_index: 0 }]).to_plutus(),
    );
    invoke(&mut tx, ISSUER_LOGIC, PlutusData::unit());
    tx.canonicalize();
    assert!(matches!(
        validate_transaction(&tx, &p),
        Err(ValidationError::OwnerNotAuthorized { .. })
    ));

    tx.required_signers.insert(KeyHash::new([0xa1; 28]));
    let report = validate_transaction(&tx, &p).unwrap();
    assert_eq!(report.exempt, vec![stranger]);
}

// ═══════════════════════════════════════════════════════════════════
// Deny list
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_frozen_sender_rejected() {
    let list_policy = PolicyId::new([0xbb; 28]);
    let mut deny = empty_list();
    deny.insert(holder(0xa1).hash_bytes(), ()).unwrap();

    let reference_inputs = deny
        .iter()
        .enumerate()
        .map(|(i, n)| {
            Utxo::new(
                OutputRef::new(TxId::new([0x05; 32]), i as u32),
                TxOutput::new(
                    params().directory_address(),
                    Value::lovelace(1_000_000)
                        .with(Unit::asset(list_policy, AssetName::new(n.key.clone()).unwrap()), 1),
                )
                .with_datum(encode_list_node(n)),
            )
        })
        .collect();
    let tx = Transaction {
        reference_inputs,
        ..Default::default()
    };

    assert!(matches!(
        check_not_frozen(&tx, &list_policy, &[(holder(0xa1), 1)]),
        Err(ValidationError::CredentialFrozen { .. })
    ));
    check_not_frozen(&tx, &list_policy, &[(holder(0xb1), 1)]).unwrap();
}
