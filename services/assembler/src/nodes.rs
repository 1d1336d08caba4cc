//! Sorted-list node transitions as transaction fragments
//!
//! The registry and the credential lists change the same way on chain: an
//! insertion spends the covering node and recreates it pointing at the new
//! key, a removal spends the node and its predecessor and recreates only the
//! predecessor. Each created node carries one marker token of the list's
//! node policy, named after its key.

use rust_decimal::Decimal;
use types::address::Address;
use types::plutus::PlutusData;
use types::tx::{TxOutput, Utxo};
use types::value::{Unit, Value, ValueError};

use crate::fragment::TxFragment;

/// Mint redeemer for inserting a node
pub fn insert_redeemer(key: &[u8]) -> PlutusData {
    PlutusData::constr(0, vec![PlutusData::bytes(key)])
}

/// Mint redeemer for removing a node
pub fn remove_redeemer(key: &[u8]) -> PlutusData {
    PlutusData::constr(1, vec![PlutusData::bytes(key)])
}

fn node_value(deposit: Decimal, marker: &Unit) -> Result<Value, ValueError> {
    let mut value = Value::new();
    value.insert(Unit::Lovelace, deposit)?;
    value.insert(marker.clone(), Decimal::ONE)?;
    Ok(value)
}

/// Create a list's head node at `address`
pub fn create_head(
    address: Address,
    datum: PlutusData,
    marker: Unit,
    deposit: Decimal,
) -> Result<TxFragment, ValueError> {
    let mut fragment = TxFragment::new();
    fragment.pay(TxOutput::new(address, node_value(deposit, &marker)?).with_datum(datum));
    fragment.mint(marker, Decimal::ONE, insert_redeemer(&[]))?;
    Ok(fragment)
}

/// Split `covering` around a new key
pub fn split(
    covering: &Utxo,
    predecessor_datum: PlutusData,
    new_key: &[u8],
    new_datum: PlutusData,
    marker: Unit,
    deposit: Decimal,
) -> Result<TxFragment, ValueError> {
    let address = *covering.address();
    let mut fragment = TxFragment::new();
    fragment.spend(covering.clone(), Some(PlutusData::unit()));
    fragment.pay(TxOutput::new(address, covering.value().clone()).with_datum(predecessor_datum));
    fragment.pay(TxOutput::new(address, node_value(deposit, &marker)?).with_datum(new_datum));
    fragment.mint(marker, Decimal::ONE, insert_redeemer(new_key))?;
    Ok(fragment)
}

/// Unlink `removed`, folding its range back into `predecessor`
pub fn unlink(
    predecessor: &Utxo,
    predecessor_datum: PlutusData,
    removed: &Utxo,
    removed_key: &[u8],
    marker: Unit,
) -> Result<TxFragment, ValueError> {
    let mut fragment = TxFragment::new();
    fragment.spend(predecessor.clone(), Some(PlutusData::unit()));
    fragment.spend(removed.clone(), Some(PlutusData::unit()));
    fragment.pay(TxOutput::new(*predecessor.address(), predecessor.value().clone()).with_datum(predecessor_datum));
    fragment.mint(marker, -Decimal::ONE, remove_redeemer(removed_key))?;
    Ok(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::address::Credential;
    use types::ids::{AssetName, OutputRef, PolicyId, ScriptHash, TxId};

    const LIST: PolicyId = PolicyId::new([0x5a; 28]);

    fn address() -> Address {
        Address::new(0, Credential::Script(ScriptHash::new([0x5b; 28])), None)
    }

    fn marker(key: &[u8]) -> Unit {
        Unit::asset(LIST, AssetName::new(key.to_vec()).unwrap())
    }

    fn node(tx: u8, key: &[u8]) -> Utxo {
        Utxo::new(
            OutputRef::new(TxId::new([tx; 32]), 0),
            TxOutput::new(address(), Value::lovelace(1_500_000).with(marker(key), 1))
                .with_datum(PlutusData::bytes(key)),
        )
    }

    #[test]
    fn test_split_conserves_covering_value() {
        let covering = node(1, &[]);
        let fragment = split(
            &covering,
            PlutusData::int(0),
            &[0x42; 28],
            PlutusData::int(1),
            marker(&[0x42; 28]),
            Decimal::from(1_500_000),
        )
        .unwrap();
        assert_eq!(fragment.inputs, vec![covering.clone()]);
        assert_eq!(fragment.outputs[0].value, covering.output.value);
        assert_eq!(fragment.outputs[1].value.get(&marker(&[0x42; 28])), Decimal::ONE);
        assert_eq!(fragment.mint.get(&marker(&[0x42; 28])), Decimal::ONE);
        // covering node spend + marker mint
        assert_eq!(fragment.redeemers.len(), 2);
    }

    #[test]
    fn test_unlink_burns_marker() {
        let predecessor = node(1, &[]);
        let removed = node(2, &[0x42; 28]);
        let fragment = unlink(&predecessor, PlutusData::int(0), &removed, &[0x42; 28], marker(&[0x42; 28])).unwrap();
        assert_eq!(fragment.inputs.len(), 2);
        assert_eq!(fragment.outputs.len(), 1);
        assert_eq!(fragment.mint.get(&marker(&[0x42; 28])), -Decimal::ONE);
    }
}
