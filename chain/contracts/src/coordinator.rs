//! Two-tier validation coordinator
//!
//! Programmable outputs share one payment script, the per-item guard. It runs
//! once per spent programmable input and checks only that the per-transaction
//! coordinator was invoked through a zero-value withdrawal. The coordinator
//! runs once and does the real work:
//!
//! 1. For each distinct policy touched, read the proof its redeemer names: a
//!    reference input holding either the policy's registry node or the node
//!    covering it (non-membership).
//! 2. Check each named node is authentic and its key matches the policy.
//! 3. Check the node's transfer logic (or third-party logic) was invoked.
//! 4. Check owner authorization of every spent programmable input.
//! 5. Check per-policy conservation across programmable inputs and outputs,
//!    counting minted quantity when the policy's mint redeemer is present.
//!
//! [`TransactionContext`] is computed once per transaction and shared by
//! reference across every per-item check.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use types::ids::{OutputRef, PolicyId};
use types::plutus::PlutusData;
use types::tx::{RedeemerPurpose, Transaction, TxOutput, Utxo};
use types::value::ValueError;

use crate::bootstrap::ProtocolBootstrapParams;
use crate::errors::ValidationError;
use crate::registry::{node_from_output, RegistryNode};

/// Proof for one touched policy, by reference input index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TokenProof {
    /// The node at `node_index` is the policy's registry entry
    Exists { node_index: u32 },
    /// The node at `node_index` covers the policy: it is not registered
    NotRegistered { node_index: u32 },
}

impl TokenProof {
    pub fn node_index(&self) -> u32 {
        match self {
            TokenProof::Exists { node_index } | TokenProof::NotRegistered { node_index } => *node_index,
        }
    }
}

/// Whose authority moves the tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoordinatorAct {
    /// Holders move their own tokens under the transfer logic
    Transfer,
    /// The issuer acts on holders' tokens (seize) under the third-party logic
    ThirdParty,
}

/// Redeemer of the coordinator's zero-value withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRedeemer {
    pub act: CoordinatorAct,
    /// One proof per touched policy, in ascending policy order
    pub proofs: Vec<TokenProof>,
}

fn invalid(reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidRedeemer {
        reason: reason.into(),
    }
}

impl GlobalRedeemer {
    pub fn transfer(proofs: Vec<TokenProof>) -> Self {
        Self {
            act: CoordinatorAct::Transfer,
            proofs,
        }
    }

    pub fn third_party(proofs: Vec<TokenProof>) -> Self {
        Self {
            act: CoordinatorAct::ThirdParty,
            proofs,
        }
    }

    pub fn to_plutus(&self) -> PlutusData {
        let tag = match self.act {
            CoordinatorAct::Transfer => 0,
            CoordinatorAct::ThirdParty => 1,
        };
        let proofs = self
            .proofs
            .iter()
            .map(|p| {
                let (tag, index) = match p {
                    TokenProof::Exists { node_index } => (0, *node_index),
                    TokenProof::NotRegistered { node_index } => (1, *node_index),
                };
                PlutusData::constr(tag, vec![PlutusData::int(i64::from(index))])
            })
            .collect();
        PlutusData::constr(tag, vec![PlutusData::List(proofs)])
    }

    pub fn from_plutus(data: &PlutusData) -> Result<Self, ValidationError> {
        let act = match data.constr_tag() {
            Some(0) => CoordinatorAct::Transfer,
            Some(1) => CoordinatorAct::ThirdParty,
            _ => return Err(invalid("unknown coordinator act")),
        };
        let items = data
            .positional_fields()
            .and_then(|f| f.first())
            .and_then(|l| match l {
                PlutusData::List(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| invalid("missing proof list"))?;

        let proofs = items
            .iter()
            .map(|item| {
                let index = item
                    .positional_fields()
                    .and_then(|f| f.first())
                    .and_then(PlutusData::as_int)
                    .and_then(|i| u32::try_from(i).ok())
                    .ok_or_else(|| invalid("proof index must be a non-negative integer"))?;
                match item.constr_tag() {
                    Some(0) => Ok(TokenProof::Exists { node_index: index }),
                    Some(1) => Ok(TokenProof::NotRegistered { node_index: index }),
                    _ => Err(invalid("unknown proof kind")),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { act, proofs })
    }
}

/// Outcome of a successful validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Policies checked against their registry entry
    pub registered: Vec<PolicyId>,
    /// Policies proven absent and exempt from conservation
    pub exempt: Vec<PolicyId>,
    pub programmable_inputs: usize,
}

/// Per-transaction facts shared by every per-item check
pub struct TransactionContext<'a> {
    pub tx: &'a Transaction,
    pub params: &'a ProtocolBootstrapParams,
    coordinator_invoked: bool,
    programmable_inputs: Vec<&'a Utxo>,
    programmable_outputs: Vec<&'a TxOutput>,
}

impl<'a> TransactionContext<'a> {
    pub fn new(tx: &'a Transaction, params: &'a ProtocolBootstrapParams) -> Self {
        Self {
            tx,
            params,
            coordinator_invoked: tx.invokes_stake_script(&params.programmable_logic_global),
            programmable_inputs: tx
                .inputs
                .iter()
                .filter(|u| params.is_programmable(u.address()))
                .collect(),
            programmable_outputs: tx
                .outputs
                .iter()
                .filter(|o| params.is_programmable(&o.address))
                .collect(),
        }
    }

    pub fn coordinator_invoked(&self) -> bool {
        self.coordinator_invoked
    }

    pub fn programmable_inputs(&self) -> &[&'a Utxo] {
        &self.programmable_inputs
    }

    /// Distinct policies in programmable inputs, programmable outputs and
    /// the mint, ascending.
    pub fn touched_policies(&self) -> Vec<PolicyId> {
        let mut policies = BTreeSet::new();
        for u in &self.programmable_inputs {
            policies.extend(u.value().policies());
        }
        for o in &self.programmable_outputs {
            policies.extend(o.value.policies());
        }
        policies.extend(self.tx.mint.policies());
        policies.into_iter().collect()
    }

    fn input_total(&self, policy: &PolicyId) -> Result<Decimal, ValueError> {
        sum_checked(policy, self.programmable_inputs.iter().map(|u| u.value().policy_total(policy)))
    }

    fn output_total(&self, policy: &PolicyId) -> Result<Decimal, ValueError> {
        sum_checked(policy, self.programmable_outputs.iter().map(|o| o.value.policy_total(policy)))
    }
}

fn sum_checked(
    policy: &PolicyId,
    mut amounts: impl Iterator<Item = Result<Decimal, ValueError>>,
) -> Result<Decimal, ValueError> {
    amounts.try_fold(Decimal::ZERO, |acc, a| {
        acc.checked_add(a?).ok_or_else(|| ValueError::Overflow {
            unit: policy.to_hex(),
        })
    })
}

/// Per-item guard, run for each spent programmable input
pub fn validate_base(ctx: &TransactionContext<'_>, _input: &OutputRef) -> Result<(), ValidationError> {
    if !ctx.coordinator_invoked() {
        return Err(ValidationError::CoordinatorNotInvoked);
    }
    Ok(())
}

fn registry_node(ctx: &TransactionContext<'_>, index: u32) -> Result<RegistryNode, ValidationError> {
    let utxo = ctx
        .tx
        .reference_inputs
        .get(index as usize)
        .ok_or(ValidationError::ReferenceInputMissing { index })?;
    node_from_output(&utxo.output, &ctx.params.directory_node_policy)
        .map_err(|_| ValidationError::NotARegistryNode { index })
}

/// Per-transaction coordinator
pub fn validate_global(
    ctx: &TransactionContext<'_>,
    redeemer: &GlobalRedeemer,
) -> Result<ValidationReport, ValidationError> {
    if !ctx.coordinator_invoked() {
        return Err(ValidationError::CoordinatorNotInvoked);
    }

    let policies = ctx.touched_policies();
    if policies.len() != redeemer.proofs.len() {
        return Err(ValidationError::ProofCountMismatch {
            expected: policies.len(),
            actual: redeemer.proofs.len(),
        });
    }

    let mut report = ValidationReport {
        programmable_inputs: ctx.programmable_inputs().len(),
        ..Default::default()
    };
    // Registered policies whose third-party logic ran in this transaction
    let mut third_party_cleared = BTreeSet::new();

    for (policy, proof) in policies.iter().zip(&redeemer.proofs) {
        let index = proof.node_index();
        let node = registry_node(ctx, index)?;
        match proof {
            TokenProof::NotRegistered { .. } => {
                if !node.covers(policy.as_bytes()) {
                    return Err(ValidationError::MembershipProofInvalid {
                        key: policy.to_hex(),
                    });
                }
                report.exempt.push(*policy);
            }
            TokenProof::Exists { .. } => {
                if node.key.as_slice() != policy.as_bytes() {
                    return Err(ValidationError::KeyMismatch {
                        index,
                        policy: policy.to_hex(),
                    });
                }
                match redeemer.act {
                    CoordinatorAct::Transfer => {
                        if !ctx.tx.invokes_stake_script(&node.payload.transfer_logic) {
                            return Err(ValidationError::TransferLogicNotInvoked {
                                policy: policy.to_hex(),
                            });
                        }
                    }
                    CoordinatorAct::ThirdParty => {
                        if !ctx.tx.invokes_stake_script(&node.payload.third_party_logic) {
                            return Err(ValidationError::ThirdPartyLogicNotInvoked {
                                policy: policy.to_hex(),
                            });
                        }
                        third_party_cleared.insert(*policy);
                    }
                }
                check_conservation(ctx, policy)?;
                report.registered.push(*policy);
            }
        }
    }

    check_owners(ctx, &third_party_cleared)?;

    Ok(report)
}

fn check_conservation(ctx: &TransactionContext<'_>, policy: &PolicyId) -> Result<(), ValidationError> {
    let minted = ctx.tx.mint.policy_total(policy)?;
    if !minted.is_zero() && ctx.tx.redeemer(&RedeemerPurpose::Mint(*policy)).is_none() {
        return Err(ValidationError::IssuanceNotAuthorized {
            policy: policy.to_hex(),
        });
    }
    let input = ctx.input_total(policy)?;
    let output = ctx.output_total(policy)?;
    let available = input.checked_add(minted).ok_or_else(|| ValueError::Overflow {
        unit: policy.to_hex(),
    })?;
    if available != output {
        return Err(ValidationError::ValueNotConserved {
            policy: policy.to_hex(),
            input: input.to_string(),
            minted: minted.to_string(),
            output: output.to_string(),
        });
    }
    Ok(())
}

/// Every spent programmable input needs its owner's authorization, unless
/// it holds tokens and each of its policies is in `cleared`: a registered
/// policy whose third-party logic ran. Lovelace-only inputs and inputs with
/// unregistered policies always need the owner.
fn check_owners(ctx: &TransactionContext<'_>, cleared: &BTreeSet<PolicyId>) -> Result<(), ValidationError> {
    for utxo in ctx.programmable_inputs() {
        let policies = utxo.value().policies();
        if !policies.is_empty() && policies.is_subset(cleared) {
            continue;
        }
        let authorized = utxo
            .address()
            .stake
            .as_ref()
            .is_some_and(|owner| ctx.tx.authorized_by(owner));
        if !authorized {
            return Err(ValidationError::OwnerNotAuthorized {
                input: utxo.out_ref.to_string(),
            });
        }
    }
    Ok(())
}

/// Run the guard for every programmable input, then the coordinator once.
/// A transaction touching no programmable input and not invoking the
/// coordinator is outside the protocol and passes with an empty report.
pub fn validate_transaction(
    tx: &Transaction,
    params: &ProtocolBootstrapParams,
) -> Result<ValidationReport, ValidationError> {
    let ctx = TransactionContext::new(tx, params);
    for utxo in ctx.programmable_inputs() {
        validate_base(&ctx, &utxo.out_ref)?;
    }
    if !ctx.coordinator_invoked() {
        return Ok(ValidationReport::default());
    }
    let redeemer = tx
        .redeemer(&RedeemerPurpose::Reward(params.coordinator_credential()))
        .ok_or(ValidationError::CoordinatorNotInvoked)?;
    let global = GlobalRedeemer::from_plutus(&redeemer.data)?;
    validate_global(&ctx, &global)
}
