//! Balance log rows
//!
//! One [`BalanceLogEntry`] records the full balance of an address right after
//! a transaction touched it, together with the signed delta from the previous
//! row. The log is append-only; only rollback handling removes rows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::address::Address;
use types::ids::TxId;
use types::value::{Value, ValueDiff, ValueError};

use crate::events::{ChainPoint, ObservedTx};

/// What a transaction did, from the log's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxKind {
    Register,
    Mint,
    Burn,
    Transfer,
}

impl TxKind {
    /// Registration wins over issuance; a mint with net-negative quantity is a burn.
    pub fn classify(tx: &ObservedTx, registers: bool) -> Result<Self, ValueError> {
        if registers {
            return Ok(TxKind::Register);
        }
        let net = tx
            .mint
            .iter()
            .filter(|(unit, _)| unit.policy().is_some())
            .try_fold(Decimal::ZERO, |acc, (unit, amount)| {
                acc.checked_add(*amount).ok_or_else(|| ValueError::Overflow {
                    unit: unit.to_string(),
                })
            })?;
        Ok(if net.is_sign_positive() && !net.is_zero() {
            TxKind::Mint
        } else if net.is_sign_negative() && !net.is_zero() {
            TxKind::Burn
        } else {
            TxKind::Transfer
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceLogEntry {
    pub address: Address,
    pub payment_credential_hash: String,
    pub stake_credential_hash: Option<String>,
    pub tx_id: TxId,
    pub slot: u64,
    pub block_height: u64,
    pub tx_index: u32,
    pub balance_snapshot: Value,
    pub tx_kind: TxKind,
    pub balance_diff: ValueDiff,
}

impl BalanceLogEntry {
    /// Row for `address` given its previous snapshot and the transaction's net effect on it
    pub fn next(
        address: Address,
        previous: Option<&Value>,
        delta: &ValueDiff,
        tx_id: TxId,
        point: ChainPoint,
        tx_kind: TxKind,
    ) -> Result<Self, ValueError> {
        let empty = Value::new();
        let previous = previous.unwrap_or(&empty);
        let snapshot = previous.apply(delta)?;
        let balance_diff = ValueDiff::between(previous, &snapshot);
        Ok(Self {
            payment_credential_hash: address.payment_hash(),
            stake_credential_hash: address.stake_hash(),
            address,
            tx_id,
            slot: point.slot,
            block_height: point.block_height,
            tx_index: point.tx_index,
            balance_snapshot: snapshot,
            tx_kind,
            balance_diff,
        })
    }

    pub fn point(&self) -> ChainPoint {
        ChainPoint::new(self.slot, self.block_height, self.tx_index)
    }
}

/// Net value change per address: created outputs minus spent inputs
///
/// Addresses whose inputs and outputs cancel out still appear, with an empty
/// diff, so that the transaction is recorded against them.
pub fn address_deltas(
    tx: &ObservedTx,
    tracked: impl Fn(&Address) -> bool,
) -> Result<BTreeMap<Address, ValueDiff>, ValueError> {
    let mut deltas: BTreeMap<Address, ValueDiff> = BTreeMap::new();
    for input in tx.inputs.iter().filter(|u| tracked(u.address())) {
        let entry = deltas.entry(*input.address()).or_default();
        *entry = std::mem::take(entry).checked_sub_value(input.value())?;
    }
    for output in tx.outputs.iter().filter(|o| tracked(&o.address)) {
        let entry = deltas.entry(output.address).or_default();
        *entry = std::mem::take(entry).checked_add_value(&output.value)?;
    }
    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use types::address::Credential;
    use types::ids::{AssetName, KeyHash, OutputRef, PolicyId};
    use types::tx::{TxOutput, Utxo};
    use types::value::Unit;

    fn addr(b: u8) -> Address {
        Address::new(0, Credential::Key(KeyHash::new([b; 28])), Some(Credential::Key(KeyHash::new([b; 28]))))
    }

    fn token() -> Unit {
        Unit::asset(PolicyId::new([0x42; 28]), AssetName::from_label("TKN").unwrap())
    }

    fn observed(mint: ValueDiff) -> ObservedTx {
        ObservedTx {
            point: ChainPoint::new(100, 10, 0),
            tx_id: TxId::new([1; 32]),
            inputs: vec![],
            outputs: vec![],
            mint,
        }
    }

    #[test]
    fn test_classify() {
        let mut mint = ValueDiff::new();
        mint.add_amount(token(), Decimal::from(5)).unwrap();
        assert_eq!(TxKind::classify(&observed(mint.clone()), false), Ok(TxKind::Mint));
        assert_eq!(TxKind::classify(&observed(mint.negated()), false), Ok(TxKind::Burn));
        assert_eq!(TxKind::classify(&observed(ValueDiff::new()), false), Ok(TxKind::Transfer));
        assert_eq!(TxKind::classify(&observed(mint), true), Ok(TxKind::Register));
    }

    #[test]
    fn test_classify_rejects_overflowing_mint() {
        let other = Unit::asset(PolicyId::new([0x43; 28]), AssetName::from_label("OTH").unwrap());
        let mut mint = ValueDiff::new();
        mint.add_amount(token(), Decimal::MAX).unwrap();
        mint.add_amount(other, Decimal::MAX).unwrap();
        assert!(matches!(
            TxKind::classify(&observed(mint), false),
            Err(ValueError::Overflow { .. })
        ));
    }

    #[test]
    fn test_next_entry_from_empty() {
        let delta = ValueDiff::from(Value::lovelace(2_000_000).with(token(), 1000));
        let entry = BalanceLogEntry::next(
            addr(1),
            None,
            &delta,
            TxId::new([2; 32]),
            ChainPoint::new(5, 1, 0),
            TxKind::Mint,
        )
        .unwrap();
        assert_eq!(entry.balance_snapshot.get(&token()), Decimal::from(1000));
        assert_eq!(entry.balance_diff, delta);
        assert_eq!(entry.payment_credential_hash, "01".repeat(28));
    }

    #[test]
    fn test_next_entry_rejects_overdraw() {
        let delta = ValueDiff::from(Value::lovelace(5)).negated();
        let result = BalanceLogEntry::next(
            addr(1),
            Some(&Value::lovelace(4)),
            &delta,
            TxId::new([2; 32]),
            ChainPoint::default(),
            TxKind::Transfer,
        );
        assert!(matches!(result, Err(ValueError::Negative { .. })));
    }

    #[test]
    fn test_address_deltas_nets_change() {
        let a = addr(1);
        let b = addr(2);
        let mut tx = observed(ValueDiff::new());
        tx.inputs.push(Utxo::new(
            OutputRef::new(TxId::new([9; 32]), 0),
            TxOutput::new(a, Value::lovelace(10).with(token(), 1000)),
        ));
        tx.outputs.push(TxOutput::new(b, Value::lovelace(4).with(token(), 400)));
        tx.outputs.push(TxOutput::new(a, Value::lovelace(6).with(token(), 600)));

        let deltas = address_deltas(&tx, |_| true).unwrap();
        assert_eq!(deltas[&a].get(&token()), Decimal::from(-400));
        assert_eq!(deltas[&a].get(&Unit::Lovelace), Decimal::from(-4));
        assert_eq!(deltas[&b].get(&token()), Decimal::from(400));

        let only_b = address_deltas(&tx, |x| *x == b).unwrap();
        assert_eq!(only_b.len(), 1);
    }

    #[test]
    fn test_entry_json_field_names() {
        let entry = BalanceLogEntry::next(
            addr(1),
            None,
            &ValueDiff::from(Value::lovelace(1)),
            TxId::new([2; 32]),
            ChainPoint::new(7, 3, 1),
            TxKind::Transfer,
        )
        .unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["txKind"], "TRANSFER");
        assert_eq!(json["balanceDiff"]["lovelace"], "+1");
        assert_eq!(json["blockHeight"], 3);
    }
}
