//! Credential lists for compliance substandards
//!
//! Deny lists (freeze-and-seize) and allow lists share the registry's sorted
//! list, keyed by credential hash with no payload. Each node output carries a
//! token of the list's own node policy and a datum `Constr 0 [key, next]`.
//!
//! Transfer logic proves list status through reference inputs: a frozen
//! check needs a covering node for every sender credential, an allow-list
//! check needs a node whose key is the recipient credential.

use types::address::Credential;
use types::ids::PolicyId;
use types::plutus::PlutusData;
use types::tx::{Transaction, TxOutput};

use crate::errors::{RegistryError, ValidationError};
use crate::linked_list::{Node, SortedList};
use crate::registry::decode_link;

pub type ListNode = Node<()>;

pub type CredentialList = SortedList<()>;

pub fn empty_list() -> CredentialList {
    SortedList::new(())
}

pub fn encode_list_node(node: &ListNode) -> PlutusData {
    PlutusData::constr(0, vec![PlutusData::bytes(&node.key), PlutusData::bytes(&node.next)])
}

pub fn decode_list_node(data: &PlutusData) -> Result<ListNode, RegistryError> {
    let (key, next, _) = decode_link(data)?;
    Ok(Node::new(key, next, ()))
}

pub fn list_node_from_output(output: &TxOutput, list_policy: &PolicyId) -> Result<ListNode, RegistryError> {
    if !output.value.policies().contains(list_policy) {
        return Err(RegistryError::Decode("output lacks the list node marker".to_string()));
    }
    let datum = output
        .datum
        .as_ref()
        .ok_or_else(|| RegistryError::Decode("output has no inline datum".to_string()))?;
    decode_list_node(datum)
}

/// Redeemer of list-checking transfer logic: one reference input index per
/// credential, in the order the credentials are checked.
pub fn encode_proof_indices(indices: &[u32]) -> PlutusData {
    PlutusData::List(indices.iter().map(|i| PlutusData::int(i64::from(*i))).collect())
}

pub fn decode_proof_indices(data: &PlutusData) -> Result<Vec<u32>, ValidationError> {
    let items = data.positional_fields().ok_or_else(|| ValidationError::InvalidRedeemer {
        reason: "proof indices must be a list".to_string(),
    })?;
    items
        .iter()
        .map(|item| {
            item.as_int()
                .and_then(|i| u32::try_from(i).ok())
                .ok_or_else(|| ValidationError::InvalidRedeemer {
                    reason: "proof index must be a non-negative integer".to_string(),
                })
        })
        .collect()
}

fn reference_node(tx: &Transaction, index: u32, list_policy: &PolicyId) -> Result<ListNode, ValidationError> {
    let utxo = tx
        .reference_inputs
        .get(index as usize)
        .ok_or(ValidationError::ReferenceInputMissing { index })?;
    list_node_from_output(&utxo.output, list_policy).map_err(|_| ValidationError::NotARegistryNode { index })
}

fn check_proofs<F>(
    tx: &Transaction,
    list_policy: &PolicyId,
    proofs: &[(Credential, u32)],
    mut check: F,
) -> Result<(), ValidationError>
where
    F: FnMut(&Credential, &ListNode) -> Result<(), ValidationError>,
{
    for (credential, index) in proofs {
        let node = reference_node(tx, *index, list_policy)?;
        check(credential, &node)?;
    }
    Ok(())
}

/// Every credential must be covered (absent from the deny list)
pub fn check_not_frozen(
    tx: &Transaction,
    list_policy: &PolicyId,
    proofs: &[(Credential, u32)],
) -> Result<(), ValidationError> {
    check_proofs(tx, list_policy, proofs, |credential, node| {
        let key = credential.hash_bytes();
        if node.key.as_slice() == key {
            return Err(ValidationError::CredentialFrozen {
                credential: credential.hash_hex(),
            });
        }
        if !node.covers(key) {
            return Err(ValidationError::MembershipProofInvalid {
                key: credential.hash_hex(),
            });
        }
        Ok(())
    })
}

/// Every credential must be present in the allow list
pub fn check_allowed(
    tx: &Transaction,
    list_policy: &PolicyId,
    proofs: &[(Credential, u32)],
) -> Result<(), ValidationError> {
    check_proofs(tx, list_policy, proofs, |credential, node| {
        if node.key.as_slice() != credential.hash_bytes() {
            return Err(ValidationError::NotAllowListed {
                credential: credential.hash_hex(),
            });
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::address::Address;
    use types::ids::{AssetName, KeyHash, OutputRef, TxId};
    use types::tx::Utxo;
    use types::value::{Unit, Value};

    fn policy() -> PolicyId {
        PolicyId::new([0x77; 28])
    }

    fn node_utxo(i: u32, node: &ListNode) -> Utxo {
        let value = Value::lovelace(1_000_000).with(
            Unit::asset(policy(), AssetName::new(node.key.clone()).unwrap()),
            1,
        );
        Utxo::new(
            OutputRef::new(TxId::new([0x10; 32]), i),
            TxOutput::new(
                Address::new(0, Credential::Key(KeyHash::new([1; 28])), None),
                value,
            )
            .with_datum(encode_list_node(node)),
        )
    }

    fn tx_with(list: &CredentialList) -> Transaction {
        Transaction {
            reference_inputs: list
                .iter()
                .enumerate()
                .map(|(i, n)| node_utxo(i as u32, n))
                .collect(),
            ..Default::default()
        }
    }

    fn cred(b: u8) -> Credential {
        Credential::Key(KeyHash::new([b; 28]))
    }

    #[test]
    fn test_not_frozen_with_covering_node() {
        let mut list = empty_list();
        list.insert(&[0x50; 28], ()).unwrap();
        let tx = tx_with(&list);
        // head covers 0x20.., node 1 covers 0x60..
        check_not_frozen(&tx, &policy(), &[(cred(0x20), 0), (cred(0x60), 1)]).unwrap();
    }

    #[test]
    fn test_frozen_credential_rejected() {
        let mut list = empty_list();
        list.insert(&[0x50; 28], ()).unwrap();
        let tx = tx_with(&list);
        assert!(matches!(
            check_not_frozen(&tx, &policy(), &[(cred(0x50), 1)]),
            Err(ValidationError::CredentialFrozen { .. })
        ));
        // Wrong covering node is an invalid proof
        assert!(matches!(
            check_not_frozen(&tx, &policy(), &[(cred(0x60), 0)]),
            Err(ValidationError::MembershipProofInvalid { .. })
        ));
    }

    #[test]
    fn test_allow_list_membership() {
        let mut list = empty_list();
        list.insert(&[0x30; 28], ()).unwrap();
        let tx = tx_with(&list);
        check_allowed(&tx, &policy(), &[(cred(0x30), 1)]).unwrap();
        assert!(matches!(
            check_allowed(&tx, &policy(), &[(cred(0x31), 1)]),
            Err(ValidationError::NotAllowListed { .. })
        ));
        assert!(matches!(
            check_allowed(&tx, &policy(), &[(cred(0x30), 9)]),
            Err(ValidationError::ReferenceInputMissing { index: 9 })
        ));
    }

    #[test]
    fn test_proof_indices_codec() {
        let data = encode_proof_indices(&[0, 3, 7]);
        assert_eq!(decode_proof_indices(&data).unwrap(), vec![0, 3, 7]);
        assert!(decode_proof_indices(&PlutusData::List(vec![PlutusData::int(-1)])).is_err());
    }
}
