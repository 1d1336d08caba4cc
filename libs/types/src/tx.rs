//! Transaction model
//!
//! The shape validators inspect and the assembler produces. Inputs and
//! reference inputs are kept sorted by [`OutputRef`], which is how the ledger
//! presents them to scripts, so any index a redeemer names is stable.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::address::{Address, Credential};
use crate::ids::{KeyHash, OutputRef, PolicyId, ScriptHash};
use crate::plutus::PlutusData;
use crate::value::{Unit, Value, ValueDiff, ValueError};

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: Address,
    pub value: Value,
    #[serde(default)]
    pub datum: Option<PlutusData>,
}

impl TxOutput {
    pub fn new(address: Address, value: Value) -> Self {
        Self {
            address,
            value,
            datum: None,
        }
    }

    pub fn with_datum(mut self, datum: PlutusData) -> Self {
        self.datum = Some(datum);
        self
    }
}

/// Unspent output together with its reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub out_ref: OutputRef,
    pub output: TxOutput,
}

impl Utxo {
    pub fn new(out_ref: OutputRef, output: TxOutput) -> Self {
        Self { out_ref, output }
    }

    pub fn value(&self) -> &Value {
        &self.output.value
    }

    pub fn address(&self) -> &Address {
        &self.output.address
    }
}

/// What a redeemer is attached to
///
/// Variant order puts zero-value withdrawal proofs first, then mints, then
/// spends: the order the assembler attaches them in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "purpose", content = "target", rename_all = "lowercase")]
pub enum RedeemerPurpose {
    Reward(Credential),
    Mint(PolicyId),
    Spend(OutputRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redeemer {
    pub purpose: RedeemerPurpose,
    pub data: PlutusData,
}

/// Withdrawal from a stake credential; a zero amount is a pure
/// authorization call proving the credential's script ran.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Withdrawal {
    pub credential: Credential,
    pub amount: Decimal,
}

/// Transaction body as seen by validators and returned unsigned to clients
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<Utxo>,
    pub reference_inputs: Vec<Utxo>,
    pub outputs: Vec<TxOutput>,
    #[serde(default)]
    pub mint: ValueDiff,
    #[serde(default)]
    pub withdrawals: Vec<Withdrawal>,
    #[serde(default)]
    pub redeemers: Vec<Redeemer>,
    #[serde(default)]
    pub required_signers: BTreeSet<KeyHash>,
    pub fee: Decimal,
}

impl Transaction {
    /// Sort inputs, reference inputs, withdrawals and redeemers into their
    /// canonical order.
    pub fn canonicalize(&mut self) {
        self.inputs.sort_by(|a, b| a.out_ref.cmp(&b.out_ref));
        self.inputs.dedup_by(|a, b| a.out_ref == b.out_ref);
        self.reference_inputs.sort_by(|a, b| a.out_ref.cmp(&b.out_ref));
        self.reference_inputs.dedup_by(|a, b| a.out_ref == b.out_ref);
        self.withdrawals.sort();
        self.withdrawals.dedup_by(|a, b| a.credential == b.credential);
        self.redeemers.sort_by(|a, b| a.purpose.cmp(&b.purpose));
    }

    pub fn redeemer(&self, purpose: &RedeemerPurpose) -> Option<&Redeemer> {
        self.redeemers.iter().find(|r| &r.purpose == purpose)
    }

    /// Whether a withdrawal from `credential` is present
    pub fn withdraws_from(&self, credential: &Credential) -> bool {
        self.withdrawals.iter().any(|w| &w.credential == credential)
    }

    /// Whether the stake script `hash` is invoked through a zero-value
    /// withdrawal carrying a redeemer.
    pub fn invokes_stake_script(&self, hash: &ScriptHash) -> bool {
        let credential = Credential::Script(*hash);
        self.withdrawals
            .iter()
            .any(|w| w.credential == credential && w.amount.is_zero())
            && self
                .redeemer(&RedeemerPurpose::Reward(credential))
                .is_some()
    }

    pub fn signed_by(&self, key: &KeyHash) -> bool {
        self.required_signers.contains(key)
    }

    /// Whether `credential` authorized this transaction: a key must be a
    /// required signer, a script must be invoked via withdrawal.
    pub fn authorized_by(&self, credential: &Credential) -> bool {
        match credential {
            Credential::Key(k) => self.signed_by(k),
            Credential::Script(s) => self.invokes_stake_script(s),
        }
    }

    pub fn input_position(&self, out_ref: &OutputRef) -> Option<usize> {
        self.inputs.iter().position(|u| &u.out_ref == out_ref)
    }

    pub fn reference_position(&self, out_ref: &OutputRef) -> Option<usize> {
        self.reference_inputs.iter().position(|u| &u.out_ref == out_ref)
    }

    pub fn total_input(&self) -> Result<Value, ValueError> {
        self.inputs
            .iter()
            .try_fold(Value::new(), |acc, u| acc.checked_add(&u.output.value))
    }

    pub fn total_output(&self) -> Result<Value, ValueError> {
        self.outputs
            .iter()
            .try_fold(Value::new(), |acc, o| acc.checked_add(&o.value))
    }

    /// `inputs + mint - outputs - fee`; empty when the transaction balances
    pub fn imbalance(&self) -> Result<ValueDiff, ValueError> {
        let mut diff = ValueDiff::from(self.total_input()?)
            .checked_add(&self.mint)?
            .checked_sub_value(&self.total_output()?)?;
        diff.add_amount(Unit::Lovelace, -self.fee)?;
        Ok(diff)
    }

    /// Outputs paying to `address`
    pub fn outputs_to<'a>(&'a self, address: &'a Address) -> impl Iterator<Item = &'a TxOutput> {
        self.outputs.iter().filter(move |o| &o.address == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TxId;

    fn addr(b: u8) -> Address {
        Address::new(0, Credential::Key(KeyHash::new([b; 28])), None)
    }

    fn utxo(tx: u8, idx: u32, lovelace: u64) -> Utxo {
        Utxo::new(
            OutputRef::new(TxId::new([tx; 32]), idx),
            TxOutput::new(addr(1), Value::lovelace(lovelace)),
        )
    }

    #[test]
    fn test_canonicalize_sorts_inputs_and_redeemers() {
        let mut tx = Transaction {
            inputs: vec![utxo(2, 0, 1), utxo(1, 3, 1), utxo(1, 1, 1)],
            redeemers: vec![
                Redeemer {
                    purpose: RedeemerPurpose::Spend(OutputRef::new(TxId::new([1; 32]), 1)),
                    data: PlutusData::unit(),
                },
                Redeemer {
                    purpose: RedeemerPurpose::Reward(Credential::Script(ScriptHash::new([5; 28]))),
                    data: PlutusData::unit(),
                },
            ],
            ..Default::default()
        };
        tx.canonicalize();
        let refs: Vec<u32> = tx.inputs.iter().map(|u| u.out_ref.index).collect();
        assert_eq!(refs, vec![1, 3, 0]);
        assert!(matches!(tx.redeemers[0].purpose, RedeemerPurpose::Reward(_)));
    }

    #[test]
    fn test_invokes_stake_script_requires_redeemer() {
        let script = ScriptHash::new([9; 28]);
        let mut tx = Transaction {
            withdrawals: vec![Withdrawal {
                credential: Credential::Script(script),
                amount: Decimal::ZERO,
            }],
            ..Default::default()
        };
        assert!(!tx.invokes_stake_script(&script));
        tx.redeemers.push(Redeemer {
            purpose: RedeemerPurpose::Reward(Credential::Script(script)),
            data: PlutusData::unit(),
        });
        assert!(tx.invokes_stake_script(&script));
    }

    #[test]
    fn test_imbalance_zero_when_balanced() {
        let tx = Transaction {
            inputs: vec![utxo(1, 0, 10_000_000)],
            outputs: vec![TxOutput::new(addr(2), Value::lovelace(9_800_000))],
            fee: Decimal::from(200_000),
            ..Default::default()
        };
        assert!(tx.imbalance().unwrap().is_empty());
    }

    #[test]
    fn test_transaction_json_roundtrip() {
        let tx = Transaction {
            inputs: vec![utxo(1, 0, 5)],
            outputs: vec![TxOutput::new(addr(2), Value::lovelace(5)).with_datum(PlutusData::int(1))],
            ..Default::default()
        };
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }
}
