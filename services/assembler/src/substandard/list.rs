//! Credential list management shared by the compliance substandards

use contracts::blacklist::{encode_list_node, CredentialList};
use contracts::errors::RegistryError;
use contracts::linked_list::{Node, Proof, TAIL_KEY};
use contracts::registry::marker_name;
use indexer::store::{NodeList, NodeRecord};
use types::address::{Address, Credential};
use types::ids::{OutputRef, PolicyId, ScriptHash};
use types::value::Unit;

use super::{ListAction, ListChange, TokenContext};
use crate::errors::SubstandardError;
use crate::fragment::TxFragment;
use crate::nodes;

/// Node policy of the token's credential list
pub(super) fn list_policy(ctx: &TokenContext<'_>) -> Result<PolicyId, SubstandardError> {
    ctx.entry.global_state.ok_or_else(|| {
        SubstandardError::InvalidRequest(format!("policy {} has no credential list", ctx.policy))
    })
}

pub(super) fn list_address(ctx: &TokenContext<'_>, list_spend: ScriptHash) -> Address {
    Address::new(ctx.params.network.network_id(), Credential::Script(list_spend), None)
}

fn record<'a>(ctx: &TokenContext<'a>, policy: PolicyId, key: &[u8]) -> Result<&'a NodeRecord, SubstandardError> {
    ctx.state
        .live_nodes(NodeList::Credentials(policy))
        .find(|r| r.key == key)
        .ok_or_else(|| {
            RegistryError::NodeNotFound {
                key: hex::encode(key),
            }
            .into()
        })
}

fn current(ctx: &TokenContext<'_>, policy: PolicyId) -> Result<CredentialList, SubstandardError> {
    if ctx.state.live_nodes(NodeList::Credentials(policy)).next().is_none() {
        return Err(SubstandardError::InvalidRequest(format!(
            "credential list {} is not initialized",
            policy
        )));
    }
    Ok(ctx.state.credential_list(policy)?)
}

/// Reference nodes proving each credential absent from the list
pub(super) fn non_membership(
    ctx: &TokenContext<'_>,
    policy: PolicyId,
    credentials: &[Credential],
) -> Result<Vec<OutputRef>, SubstandardError> {
    let list = current(ctx, policy)?;
    let mut refs = Vec::with_capacity(credentials.len());
    for credential in credentials {
        match list.lookup(credential.hash_bytes())? {
            Proof::Membership(_) => {
                return Err(contracts::errors::ValidationError::CredentialFrozen {
                    credential: credential.hash_hex(),
                }
                .into())
            }
            Proof::NonMembership(node) => refs.push(record(ctx, policy, &node.key)?.utxo.out_ref),
        }
    }
    Ok(refs)
}

/// Reference nodes proving each credential present in the list
pub(super) fn membership(
    ctx: &TokenContext<'_>,
    policy: PolicyId,
    credentials: &[Credential],
) -> Result<Vec<OutputRef>, SubstandardError> {
    let list = current(ctx, policy)?;
    let mut refs = Vec::with_capacity(credentials.len());
    for credential in credentials {
        if !list.contains(credential.hash_bytes()) {
            return Err(contracts::errors::ValidationError::NotAllowListed {
                credential: credential.hash_hex(),
            }
            .into());
        }
        refs.push(record(ctx, policy, credential.hash_bytes())?.utxo.out_ref);
    }
    Ok(refs)
}

/// Attach the nodes behind `refs` as reference inputs
pub(super) fn reference_nodes(ctx: &TokenContext<'_>, fragment: &mut TxFragment, refs: &[OutputRef]) {
    for out_ref in refs {
        if let Some(record) = ctx.state.nodes.get(out_ref) {
            fragment.reference(record.utxo.clone());
        }
    }
}

/// Issuer-signed init, insert or remove on the token's credential list
pub(super) fn change_list(
    ctx: &TokenContext<'_>,
    list_spend: ScriptHash,
    change: &ListChange,
) -> Result<TxFragment, SubstandardError> {
    let policy = list_policy(ctx)?;
    let deposit = ctx.selection.min_output_lovelace;
    let target = || {
        change
            .target
            .ok_or_else(|| SubstandardError::InvalidRequest("list change needs a target credential".to_string()))
    };

    let mut fragment = match change.action {
        ListAction::Init => {
            if ctx.state.live_nodes(NodeList::Credentials(policy)).next().is_some() {
                return Err(SubstandardError::InvalidRequest(format!(
                    "credential list {} already exists",
                    policy
                )));
            }
            let head = Node::new(Vec::new(), TAIL_KEY.to_vec(), ());
            nodes::create_head(
                list_address(ctx, list_spend),
                encode_list_node(&head),
                Unit::asset(policy, marker_name(&[])?),
                deposit,
            )?
        }
        ListAction::Add => {
            let key = target()?.hash_bytes().to_vec();
            let plan = current(ctx, policy)?.plan_insert(&key, ())?;
            let covering = record(ctx, policy, &plan.covering.key)?;
            nodes::split(
                &covering.utxo,
                encode_list_node(&plan.predecessor()),
                &key,
                encode_list_node(&plan.new_node()),
                Unit::asset(policy, marker_name(&key)?),
                deposit,
            )?
        }
        ListAction::Remove => {
            let key = target()?.hash_bytes().to_vec();
            let mut list = current(ctx, policy)?;
            let (predecessor, removed) = list.remove(&key)?;
            nodes::unlink(
                &record(ctx, policy, &predecessor.key)?.utxo,
                encode_list_node(&predecessor),
                &record(ctx, policy, &removed.key)?.utxo,
                &key,
                Unit::asset(policy, marker_name(&key)?),
            )?
        }
    };
    fragment.sign(change.issuer);
    Ok(fragment)
}
