//! Transaction fragments
//!
//! Substandard handlers and the assembler each contribute a [`TxFragment`];
//! fragments are merged and finally resolved into a [`Transaction`].
//!
//! Redeemers that name reference inputs by position stay symbolic
//! ([`RedeemerData`]) until the reference inputs are in canonical order, so
//! the indices the coordinator and list logic read always match the
//! attached nodes.

use contracts::blacklist::encode_proof_indices;
use contracts::coordinator::{CoordinatorAct, GlobalRedeemer, TokenProof};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use types::address::{Address, Credential};
use types::ids::{KeyHash, OutputRef, PolicyId, ScriptHash};
use types::plutus::PlutusData;
use types::tx::{Redeemer, RedeemerPurpose, Transaction, TxOutput, Utxo, Withdrawal};
use types::value::{Unit, ValueDiff, ValueError};

use crate::errors::AssemblyError;

/// Registry proof for one touched policy, naming the node by output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeProof {
    Exists(OutputRef),
    NotRegistered(OutputRef),
}

/// Redeemer data whose reference-input indices are resolved late
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemerData {
    Fixed(PlutusData),
    /// List of reference input positions, one per node, in order
    NodeIndices(Vec<OutputRef>),
    Coordinator {
        act: CoordinatorAct,
        proofs: Vec<NodeProof>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRedeemer {
    pub purpose: RedeemerPurpose,
    pub data: RedeemerData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxFragment {
    pub inputs: Vec<Utxo>,
    pub reference_inputs: Vec<Utxo>,
    pub outputs: Vec<TxOutput>,
    pub mint: ValueDiff,
    pub withdrawals: Vec<Withdrawal>,
    pub redeemers: Vec<PendingRedeemer>,
    pub required_signers: BTreeSet<KeyHash>,
}

impl TxFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spend `utxo`; script-locked outputs need a redeemer
    pub fn spend(&mut self, utxo: Utxo, redeemer: Option<PlutusData>) {
        if let Some(data) = redeemer {
            self.redeemers.push(PendingRedeemer {
                purpose: RedeemerPurpose::Spend(utxo.out_ref),
                data: RedeemerData::Fixed(data),
            });
        }
        self.inputs.push(utxo);
    }

    pub fn reference(&mut self, utxo: Utxo) {
        if !self.reference_inputs.iter().any(|u| u.out_ref == utxo.out_ref) {
            self.reference_inputs.push(utxo);
        }
    }

    pub fn pay(&mut self, output: TxOutput) {
        self.outputs.push(output);
    }

    /// Mint (or, with a negative amount, burn) `unit` under its policy's redeemer
    pub fn mint(&mut self, unit: Unit, amount: Decimal, redeemer: PlutusData) -> Result<(), ValueError> {
        if let Some(policy) = unit.policy() {
            self.redeemers.push(PendingRedeemer {
                purpose: RedeemerPurpose::Mint(*policy),
                data: RedeemerData::Fixed(redeemer),
            });
        }
        self.mint.add_amount(unit, amount)
    }

    /// Run a stake script through a zero-value withdrawal
    pub fn invoke(&mut self, script: ScriptHash, data: RedeemerData) {
        let credential = Credential::Script(script);
        self.withdrawals.push(Withdrawal {
            credential,
            amount: Decimal::ZERO,
        });
        self.redeemers.push(PendingRedeemer {
            purpose: RedeemerPurpose::Reward(credential),
            data,
        });
    }

    pub fn sign(&mut self, key: KeyHash) {
        self.required_signers.insert(key);
    }

    /// Key credentials sign; script credentials are invoked with a unit redeemer
    pub fn authorize(&mut self, credential: Credential) {
        match credential {
            Credential::Key(key) => self.sign(key),
            Credential::Script(script) => {
                self.invoke(script, RedeemerData::Fixed(PlutusData::unit()))
            }
        }
    }

    pub fn merge(mut self, other: TxFragment) -> Result<Self, ValueError> {
        for utxo in other.inputs {
            if !self.spends(&utxo.out_ref) {
                self.inputs.push(utxo);
            }
        }
        for utxo in other.reference_inputs {
            self.reference(utxo);
        }
        self.outputs.extend(other.outputs);
        self.mint = self.mint.checked_add(&other.mint)?;
        self.withdrawals.extend(other.withdrawals);
        self.redeemers.extend(other.redeemers);
        self.required_signers.extend(other.required_signers);
        Ok(self)
    }

    pub fn spends(&self, out_ref: &OutputRef) -> bool {
        self.inputs.iter().any(|u| &u.out_ref == out_ref)
    }

    pub fn is_attached(&self, out_ref: &OutputRef) -> bool {
        self.spends(out_ref) || self.reference_inputs.iter().any(|u| &u.out_ref == out_ref)
    }

    /// `inputs + mint - outputs - fee`
    pub fn surplus(&self, fee: Decimal) -> Result<ValueDiff, ValueError> {
        self.draft(fee).imbalance()
    }

    /// Policies held by spent inputs at `address`
    pub fn policies_at(&self, address: &Address) -> BTreeSet<PolicyId> {
        self.inputs
            .iter()
            .filter(|u| u.address() == address)
            .flat_map(|u| u.value().policies())
            .collect()
    }

    /// Canonical transaction without redeemers
    pub fn draft(&self, fee: Decimal) -> Transaction {
        let mut tx = Transaction {
            inputs: self.inputs.clone(),
            reference_inputs: self.reference_inputs.clone(),
            outputs: self.outputs.clone(),
            mint: self.mint.clone(),
            withdrawals: self.withdrawals.clone(),
            redeemers: Vec::new(),
            required_signers: self.required_signers.clone(),
            fee,
        };
        tx.canonicalize();
        tx
    }

    /// Fix the fee, order everything canonically and resolve redeemer data
    /// against the final reference input positions.
    pub fn into_transaction(self, fee: Decimal) -> Result<Transaction, AssemblyError> {
        let mut tx = self.draft(fee);
        let mut pending = self.redeemers;
        pending.sort_by(|a, b| a.purpose.cmp(&b.purpose));

        for redeemer in pending {
            let data = resolve(redeemer.data, &tx)?;
            match tx.redeemer(&redeemer.purpose) {
                Some(existing) if existing.data == data => continue,
                Some(_) => {
                    return Err(AssemblyError::ConflictingRedeemer {
                        purpose: format!("{:?}", redeemer.purpose),
                    })
                }
                None => tx.redeemers.push(Redeemer {
                    purpose: redeemer.purpose,
                    data,
                }),
            }
        }
        Ok(tx)
    }
}

fn position(tx: &Transaction, out_ref: &OutputRef) -> Result<u32, AssemblyError> {
    tx.reference_position(out_ref)
        .and_then(|i| u32::try_from(i).ok())
        .ok_or_else(|| AssemblyError::MissingReference {
            out_ref: out_ref.to_string(),
        })
}

fn resolve(data: RedeemerData, tx: &Transaction) -> Result<PlutusData, AssemblyError> {
    match data {
        RedeemerData::Fixed(data) => Ok(data),
        RedeemerData::NodeIndices(refs) => {
            let indices = refs
                .iter()
                .map(|r| position(tx, r))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(encode_proof_indices(&indices))
        }
        RedeemerData::Coordinator { act, proofs } => {
            let proofs = proofs
                .iter()
                .map(|p| match p {
                    NodeProof::Exists(r) => position(tx, r).map(|node_index| TokenProof::Exists { node_index }),
                    NodeProof::NotRegistered(r) => {
                        position(tx, r).map(|node_index| TokenProof::NotRegistered { node_index })
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(GlobalRedeemer { act, proofs }.to_plutus())
        }
    }
}
